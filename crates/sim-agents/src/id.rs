//! Agent identities.

use std::fmt;

use serde::{Deserialize, Serialize};
use sim_graph::NodeId;

use crate::value::Value;

/// Well-known service names.
pub mod services {
    pub const CLOCK: &str = "clock";
    pub const ACTIVATOR: &str = "activator";
    pub const CONFIGURATOR: &str = "configurator";
    pub const MANAGER: &str = "manager";
    pub const LOGGER: &str = "logger";
    pub const TERMINATION_CHECKER: &str = "termination_checker";
}

/// Address of an agent: a graph node or a named service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AgentId {
    Node(NodeId),
    Service(String),
}

impl AgentId {
    pub fn service(name: impl Into<String>) -> Self {
        AgentId::Service(name.into())
    }

    pub fn node_id(&self) -> Option<NodeId> {
        match self {
            AgentId::Node(id) => Some(*id),
            AgentId::Service(_) => None,
        }
    }

    pub fn is_node(&self) -> bool {
        matches!(self, AgentId::Node(_))
    }

    /// Reads an id back from a message value: integers address nodes,
    /// strings address services.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(i) => usize::try_from(*i).ok().map(AgentId::Node),
            Value::Str(name) => Some(AgentId::Service(name.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentId::Node(id) => write!(f, "{id}"),
            AgentId::Service(name) => f.write_str(name),
        }
    }
}

impl From<NodeId> for AgentId {
    fn from(id: NodeId) -> Self {
        AgentId::Node(id)
    }
}

impl From<&str> for AgentId {
    fn from(name: &str) -> Self {
        AgentId::Service(name.to_string())
    }
}

impl From<String> for AgentId {
    fn from(name: String) -> Self {
        AgentId::Service(name)
    }
}

impl From<&AgentId> for AgentId {
    fn from(id: &AgentId) -> Self {
        id.clone()
    }
}

impl From<AgentId> for Value {
    fn from(id: AgentId) -> Self {
        match id {
            AgentId::Node(id) => Value::from(id),
            AgentId::Service(name) => Value::Str(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_round_trip() {
        for id in [AgentId::Node(12), AgentId::service(services::CLOCK)] {
            assert_eq!(AgentId::from_value(&Value::from(id.clone())), Some(id));
        }
        assert_eq!(AgentId::from_value(&Value::Int(-1)), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(AgentId::Node(3).to_string(), "3");
        assert_eq!(AgentId::service("logger").to_string(), "logger");
    }
}
