//! Agent State Serializers
//!
//! Two interchangeable encodings of an [`AgentRecord`]: compact `bincode`
//! and a readable JSON form with hand-written handling of numeric scalars,
//! sets, and reserved keys.

use std::collections::BTreeMap;

use serde_json::{Map as JsonMap, Number, Value as Json};

use crate::error::SerializationError;
use crate::id::AgentId;
use crate::store::AgentRecord;
use crate::value::{Params, Value};

const SET_KEY: &str = "$set";
const MAP_KEY: &str = "$map";

/// Encoding of persisted agents.
pub trait Serializer {
    fn name(&self) -> &'static str;

    fn encode(&self, record: &AgentRecord) -> Result<Vec<u8>, SerializationError>;

    fn decode(&self, bytes: &[u8]) -> Result<AgentRecord, SerializationError>;
}

/// Looks up a serializer by its configuration name.
pub fn serializer_by_name(name: &str) -> Option<Box<dyn Serializer>> {
    match name {
        "bincode" => Some(Box::new(BincodeSerializer)),
        "json" => Some(Box::new(JsonSerializer)),
        _ => None,
    }
}

/// Binary encoding through serde.
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeSerializer;

impl Serializer for BincodeSerializer {
    fn name(&self) -> &'static str {
        "bincode"
    }

    fn encode(&self, record: &AgentRecord) -> Result<Vec<u8>, SerializationError> {
        bincode::serialize(record).map_err(|e| SerializationError::Encode {
            what: format!("agent {}", record.id),
            reason: e.to_string(),
        })
    }

    fn decode(&self, bytes: &[u8]) -> Result<AgentRecord, SerializationError> {
        bincode::deserialize(bytes).map_err(|e| SerializationError::Decode(e.to_string()))
    }
}

/// JSON encoding.
///
/// Integers stay JSON integers and floats are always written with a
/// fractional part, so the two never collapse into each other. Non-finite
/// floats cannot be represented and fail to encode.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn name(&self) -> &'static str {
        "json"
    }

    fn encode(&self, record: &AgentRecord) -> Result<Vec<u8>, SerializationError> {
        let mut fields = JsonMap::new();
        for (key, value) in record.fields.iter() {
            fields.insert(key.to_string(), to_json(value, key)?);
        }
        let mut root = JsonMap::new();
        root.insert("id".into(), id_to_json(&record.id));
        root.insert("kind".into(), Json::String(record.kind.clone()));
        root.insert("fields".into(), Json::Object(fields));
        serde_json::to_vec(&Json::Object(root)).map_err(|e| SerializationError::Encode {
            what: format!("agent {}", record.id),
            reason: e.to_string(),
        })
    }

    fn decode(&self, bytes: &[u8]) -> Result<AgentRecord, SerializationError> {
        let root: Json =
            serde_json::from_slice(bytes).map_err(|e| SerializationError::Decode(e.to_string()))?;
        let id = match root.get("id") {
            Some(Json::Number(n)) => n
                .as_u64()
                .and_then(|n| usize::try_from(n).ok())
                .map(AgentId::Node),
            Some(Json::String(name)) => Some(AgentId::Service(name.clone())),
            _ => None,
        }
        .ok_or_else(|| SerializationError::Decode("missing or malformed id".into()))?;
        let kind = root
            .get("kind")
            .and_then(Json::as_str)
            .ok_or_else(|| SerializationError::Decode("missing kind".into()))?
            .to_string();
        let fields = match root.get("fields") {
            Some(Json::Object(map)) => map
                .iter()
                .map(|(key, value)| Ok((key.clone(), from_json(value)?)))
                .collect::<Result<Params, SerializationError>>()?,
            _ => return Err(SerializationError::Decode("missing fields".into())),
        };
        Ok(AgentRecord { id, kind, fields })
    }
}

fn id_to_json(id: &AgentId) -> Json {
    match id {
        AgentId::Node(n) => Json::Number(Number::from(*n as u64)),
        AgentId::Service(name) => Json::String(name.clone()),
    }
}

fn to_json(value: &Value, path: &str) -> Result<Json, SerializationError> {
    Ok(match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(i) => Json::Number(Number::from(*i)),
        Value::Float(x) => Json::Number(Number::from_f64(*x).ok_or_else(|| {
            SerializationError::Encode {
                what: format!("field '{path}'"),
                reason: format!("non-finite float {x}"),
            }
        })?),
        Value::Str(s) => Json::String(s.clone()),
        Value::List(items) => Json::Array(
            items
                .iter()
                .map(|item| to_json(item, path))
                .collect::<Result<_, _>>()?,
        ),
        Value::Set(items) => {
            let members = items
                .iter()
                .map(|item| to_json(item, path))
                .collect::<Result<_, _>>()?;
            let mut wrapper = JsonMap::new();
            wrapper.insert(SET_KEY.into(), Json::Array(members));
            Json::Object(wrapper)
        }
        Value::Map(map) => {
            let mut object = JsonMap::new();
            for (key, item) in map {
                object.insert(key.clone(), to_json(item, path)?);
            }
            if map.keys().any(|key| key.starts_with('$')) {
                let mut wrapper = JsonMap::new();
                wrapper.insert(MAP_KEY.into(), Json::Object(object));
                Json::Object(wrapper)
            } else {
                Json::Object(object)
            }
        }
    })
}

fn from_json(json: &Json) -> Result<Value, SerializationError> {
    Ok(match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else if n.is_u64() {
                return Err(SerializationError::Decode(format!(
                    "integer {n} out of range"
                )));
            } else {
                Value::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Json::String(s) => Value::Str(s.clone()),
        Json::Array(items) => Value::List(items.iter().map(from_json).collect::<Result<_, _>>()?),
        Json::Object(object) => {
            if object.len() == 1 {
                match object.iter().next() {
                    Some((key, Json::Array(items))) if key == SET_KEY => {
                        return Ok(Value::Set(
                            items.iter().map(from_json).collect::<Result<_, _>>()?,
                        ));
                    }
                    Some((key, Json::Object(inner))) if key == MAP_KEY => {
                        return map_from_json(inner);
                    }
                    _ => {}
                }
            }
            map_from_json(object)?
        }
    })
}

fn map_from_json(object: &JsonMap<String, Json>) -> Result<Value, SerializationError> {
    let map = object
        .iter()
        .map(|(key, value)| Ok((key.clone(), from_json(value)?)))
        .collect::<Result<BTreeMap<_, _>, SerializationError>>()?;
    Ok(Value::Map(map))
}
