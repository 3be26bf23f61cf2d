//! Agent Store
//!
//! Holds the serialized state of evicted agents, keyed by id. A node lives
//! either in the address book (running) or here (dormant), never both.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, SerializationError};
use crate::id::AgentId;
use crate::serializer::Serializer;
use crate::value::{Params, Value};

/// Persistable state of one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub id: AgentId,
    /// Registered kind used to pick the restore function.
    pub kind: String,
    pub fields: Params,
}

impl AgentRecord {
    pub fn new(id: AgentId, kind: impl Into<String>) -> Self {
        Self {
            id,
            kind: kind.into(),
            fields: Params::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name, value);
        self
    }

    /// Reads a field through `extract`, reporting which field was bad.
    pub fn field<T>(
        &self,
        name: &str,
        extract: impl FnOnce(&Value) -> Option<T>,
    ) -> Result<T, SerializationError> {
        self.fields
            .get(name)
            .and_then(extract)
            .ok_or_else(|| SerializationError::Field {
                kind: self.kind.clone(),
                field: name.to_string(),
            })
    }
}

/// Mapping from id to encoded agent state.
pub struct AgentStore {
    serializer: Box<dyn Serializer>,
    entries: HashMap<AgentId, Vec<u8>>,
}

impl AgentStore {
    pub fn new(serializer: Box<dyn Serializer>) -> Self {
        Self {
            serializer,
            entries: HashMap::new(),
        }
    }

    pub fn serializer_name(&self) -> &'static str {
        self.serializer.name()
    }

    /// Encodes and stores `record`, replacing any earlier entry.
    pub fn store(&mut self, record: &AgentRecord) -> Result<(), SerializationError> {
        let bytes = self.serializer.encode(record)?;
        self.entries.insert(record.id.clone(), bytes);
        Ok(())
    }

    /// Decodes the entry for `id` without removing it.
    pub fn recover(&self, id: &AgentId) -> Result<AgentRecord, AgentError> {
        let bytes = self
            .entries
            .get(id)
            .ok_or_else(|| AgentError::MissingNode(id.clone()))?;
        Ok(self.serializer.decode(bytes)?)
    }

    pub fn remove(&mut self, id: &AgentId) -> bool {
        self.entries.remove(id).is_some()
    }

    pub fn contains(&self, id: &AgentId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stored ids in ascending order.
    pub fn ids(&self) -> Vec<AgentId> {
        let mut ids: Vec<AgentId> = self.entries.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Total encoded size, in bytes.
    pub fn stored_bytes(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}

impl fmt::Debug for AgentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentStore")
            .field("serializer", &self.serializer.name())
            .field("entries", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serializer::{BincodeSerializer, JsonSerializer};

    #[test]
    fn test_store_and_recover() {
        for serializer in [
            Box::new(BincodeSerializer) as Box<dyn Serializer>,
            Box::new(JsonSerializer),
        ] {
            let mut store = AgentStore::new(serializer);
            let record = AgentRecord::new(AgentId::Node(4), "basic").with_field("activations", 9);
            store.store(&record).unwrap();
            assert!(store.contains(&AgentId::Node(4)));
            assert_eq!(store.recover(&AgentId::Node(4)).unwrap(), record);
            assert!(store.remove(&AgentId::Node(4)));
            assert!(store.is_empty());
        }
    }

    #[test]
    fn test_recover_missing_entry() {
        let store = AgentStore::new(Box::new(BincodeSerializer));
        assert_eq!(
            store.recover(&AgentId::Node(1)),
            Err(AgentError::MissingNode(AgentId::Node(1)))
        );
    }

    #[test]
    fn test_field_reports_kind_and_name() {
        let record = AgentRecord::new(AgentId::Node(0), "basic").with_field("count", "x");
        assert_eq!(
            record.field("count", Value::as_int),
            Err(SerializationError::Field {
                kind: "basic".into(),
                field: "count".into()
            })
        );
    }
}
