//! Agent runtime error types.
//!
//! [`AgentError`] is `Clone` because it is stored inside single-assignment
//! result cells that may be read more than once.

use sim_graph::GraphError;
use thiserror::Error;

use crate::id::AgentId;

/// Failures to route a message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressingError {
    #[error("no live agent bound to {0}")]
    NotFound(AgentId),
    #[error("{0} is already bound to a different mailbox")]
    RebindRefused(AgentId),
}

/// Failures to persist or restore agent state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SerializationError {
    #[error("agent kind '{0}' does not support eviction")]
    NotSerializable(String),
    #[error("cannot encode {what}: {reason}")]
    Encode { what: String, reason: String },
    #[error("cannot decode stored agent: {0}")]
    Decode(String),
    #[error("field '{field}' missing or malformed in stored {kind}")]
    Field { kind: String, field: String },
}

/// Errors observed through an [`AsyncResult`](crate::AsyncResult).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AgentError {
    #[error(transparent)]
    Addressing(#[from] AddressingError),
    #[error("agent store has no entry for {0}")]
    MissingNode(AgentId),
    #[error(transparent)]
    Serialization(#[from] SerializationError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("no message arrived before the timeout")]
    NoMessage,
    #[error("result not ready after {0:?}")]
    Timeout(std::time::Duration),
    #[error("request dropped before a reply was produced")]
    Shutdown,
    #[error("no node kind registered as '{0}'")]
    UnknownKind(String),
    #[error("{agent} has no handler for '{payload}'")]
    UnsupportedMessage { agent: AgentId, payload: String },
    #[error("missing parameter '{0}'")]
    MissingParameter(String),
    #[error("parameter '{name}' is not a valid {expected}")]
    InvalidParameter { name: String, expected: &'static str },
    #[error("handler '{payload}' panicked: {message}")]
    HandlerPanicked { payload: String, message: String },
    #[error("{0}")]
    Handler(String),
}

impl AgentError {
    /// Free-form handler failure.
    pub fn handler(message: impl Into<String>) -> Self {
        AgentError::Handler(message.into())
    }

    /// Whether the failure is an unknown receiver, which callers may recover
    /// from by creating the target first.
    pub fn is_addressing(&self) -> bool {
        matches!(
            self,
            AgentError::Addressing(_) | AgentError::MissingNode(_)
        )
    }
}

/// Result type of every message handler.
pub type HandlerResult = Result<crate::value::Value, AgentError>;
