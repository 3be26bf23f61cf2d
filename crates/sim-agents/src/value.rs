//! Message Values
//!
//! A small self-describing value model shared by message parameters, the
//! simulation parameter map, and persisted agent state.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sim_graph::NodeId;

use crate::error::AgentError;
use crate::id::AgentId;

/// Dynamically typed value.
///
/// `Set` holds distinct elements in insertion order; use [`Value::set`] to
/// build one from arbitrary items.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Set(Vec<Value>),
}

impl Value {
    /// Builds a set, dropping duplicates.
    pub fn set(items: impl IntoIterator<Item = Value>) -> Self {
        let mut unique: Vec<Value> = Vec::new();
        for item in items {
            if !unique.contains(&item) {
                unique.push(item);
            }
        }
        Value::Set(unique)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Floats, with integers promoted.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Lists and sets.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) | Value::Set(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_node_id(&self) -> Option<NodeId> {
        self.as_int().and_then(|i| usize::try_from(i).ok())
    }

    /// Name of the variant, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Set(_) => "set",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{item}")?;
            }
            Ok(())
        }
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::List(items) => {
                f.write_str("[")?;
                join(f, items)?;
                f.write_str("]")
            }
            Value::Set(items) => {
                f.write_str("{")?;
                join(f, items)?;
                f.write_str("}")
            }
            Value::Map(map) => {
                f.write_str("{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key:?}: {value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<u64> for Value {
    fn from(i: u64) -> Self {
        Value::Int(i64::try_from(i).unwrap_or(i64::MAX))
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        Value::Int(i64::try_from(i).unwrap_or(i64::MAX))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Map(map)
    }
}

impl From<Params> for Value {
    fn from(params: Params) -> Self {
        Value::Map(params.0)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// Keyword arguments of a message, and more generally any string-keyed
/// parameter map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Params(BTreeMap<String, Value>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Overlays `other` on top of `self`; keys in `other` win.
    pub fn merge(&mut self, other: &Params) {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    /// Layers the given maps, later ones taking precedence.
    pub fn layered<'a>(layers: impl IntoIterator<Item = &'a Params>) -> Params {
        let mut merged = Params::new();
        for layer in layers {
            merged.merge(layer);
        }
        merged
    }

    /// Sub-map restricted to the given keys.
    pub fn select<'a>(&self, keys: impl IntoIterator<Item = &'a str>) -> Params {
        keys.into_iter()
            .filter_map(|key| self.0.get(key).map(|v| (key.to_string(), v.clone())))
            .collect()
    }

    pub fn into_inner(self) -> BTreeMap<String, Value> {
        self.0
    }

    pub fn require(&self, key: &str) -> Result<&Value, AgentError> {
        self.0
            .get(key)
            .ok_or_else(|| AgentError::MissingParameter(key.to_string()))
    }

    pub fn int(&self, key: &str) -> Result<i64, AgentError> {
        self.require(key)?
            .as_int()
            .ok_or_else(|| invalid(key, "int"))
    }

    pub fn float(&self, key: &str) -> Result<f64, AgentError> {
        self.require(key)?
            .as_float()
            .ok_or_else(|| invalid(key, "float"))
    }

    pub fn bool(&self, key: &str) -> Result<bool, AgentError> {
        self.require(key)?
            .as_bool()
            .ok_or_else(|| invalid(key, "bool"))
    }

    pub fn str(&self, key: &str) -> Result<&str, AgentError> {
        self.require(key)?
            .as_str()
            .ok_or_else(|| invalid(key, "string"))
    }

    pub fn node_id(&self, key: &str) -> Result<NodeId, AgentError> {
        self.require(key)?
            .as_node_id()
            .ok_or_else(|| invalid(key, "node id"))
    }

    pub fn agent_id(&self, key: &str) -> Result<AgentId, AgentError> {
        AgentId::from_value(self.require(key)?).ok_or_else(|| invalid(key, "agent id"))
    }

    /// Sub-map stored under `key`; absent means empty.
    pub fn params(&self, key: &str) -> Result<Params, AgentError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(Params::new()),
            Some(Value::Map(map)) => Ok(Params(map.clone())),
            Some(_) => Err(invalid(key, "map")),
        }
    }

    pub fn int_or(&self, key: &str, default: i64) -> Result<i64, AgentError> {
        if self.contains(key) {
            self.int(key)
        } else {
            Ok(default)
        }
    }

    pub fn float_or(&self, key: &str, default: f64) -> Result<f64, AgentError> {
        if self.contains(key) {
            self.float(key)
        } else {
            Ok(default)
        }
    }

    pub fn bool_or(&self, key: &str, default: bool) -> Result<bool, AgentError> {
        if self.contains(key) {
            self.bool(key)
        } else {
            Ok(default)
        }
    }

    pub fn str_or<'a>(&'a self, key: &str, default: &'a str) -> Result<&'a str, AgentError> {
        if self.contains(key) {
            self.str(key)
        } else {
            Ok(default)
        }
    }

    /// Non-negative integer as `usize`.
    pub fn usize_or(&self, key: &str, default: usize) -> Result<usize, AgentError> {
        if !self.contains(key) {
            return Ok(default);
        }
        usize::try_from(self.int(key)?).map_err(|_| invalid(key, "non-negative int"))
    }
}

fn invalid(key: &str, expected: &'static str) -> AgentError {
    AgentError::InvalidParameter {
        name: key.to_string(),
        expected,
    }
}

impl From<BTreeMap<String, Value>> for Params {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Params(map)
    }
}

impl FromIterator<(String, Value)> for Params {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Params(iter.into_iter().collect())
    }
}

impl IntoIterator for Params {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
