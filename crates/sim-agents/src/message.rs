//! Messages and the envelopes that carry them through mailboxes.

use std::fmt;
use std::time::Duration;

use crate::error::AgentError;
use crate::id::AgentId;
use crate::result::AsyncResult;
use crate::value::{Params, Value};

/// An immutable request: `payload` names the handler, `parameters` are its
/// keyword arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub sender: AgentId,
    pub payload: String,
    pub parameters: Params,
}

impl Message {
    pub fn new(sender: AgentId, payload: impl Into<String>, parameters: Params) -> Self {
        Self {
            sender,
            payload: payload.into(),
            parameters,
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <- {}(", self.payload, self.sender)?;
        for (i, (key, value)) in self.parameters.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}={value}")?;
        }
        f.write_str(")")
    }
}

/// Reply side of a request.
///
/// A responder dropped without answering resolves the sender's result with
/// [`AgentError::Shutdown`], so draining a mailbox never leaves a waiter
/// hanging.
#[derive(Debug)]
pub struct Responder {
    result: Option<AsyncResult>,
}

impl Responder {
    pub fn new(result: AsyncResult) -> Self {
        Self {
            result: Some(result),
        }
    }

    /// Delivers the handler outcome.
    pub fn complete(mut self, outcome: Result<Value, AgentError>) {
        if let Some(result) = self.result.take() {
            result.complete(outcome);
        }
    }
}

impl Drop for Responder {
    fn drop(&mut self) {
        if let Some(result) = self.result.take() {
            if result.set_exception(AgentError::Shutdown) {
                tracing::debug!("request dropped without a reply");
            }
        }
    }
}

/// A queued request with its reply slot and the moment it was enqueued.
#[derive(Debug)]
pub struct Envelope {
    pub message: Message,
    pub responder: Responder,
    pub enqueued_at: Duration,
}

impl Envelope {
    /// Wraps a message, returning the envelope and the sender's result.
    pub fn new(message: Message, enqueued_at: Duration) -> (Self, AsyncResult) {
        let result = AsyncResult::new();
        let envelope = Self {
            message,
            responder: Responder::new(result.clone()),
            enqueued_at,
        };
        (envelope, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dropped_responder_signals_shutdown() {
        let message = Message::new(AgentId::Node(0), "activate", Params::new());
        let (envelope, result) = Envelope::new(message, Duration::ZERO);
        drop(envelope);
        assert_eq!(result.try_get(), Some(Err(AgentError::Shutdown)));
    }

    #[test]
    fn test_completed_responder_keeps_value() {
        let message = Message::new(AgentId::Node(0), "degree", Params::new());
        let (envelope, result) = Envelope::new(message, Duration::ZERO);
        envelope.responder.complete(Ok(Value::Int(3)));
        assert_eq!(result.try_get(), Some(Ok(Value::Int(3))));
    }

    #[test]
    fn test_display_lists_parameters() {
        let message = Message::new(
            AgentId::service("clock"),
            "check",
            Params::new().with("requester", "clock"),
        );
        assert_eq!(message.to_string(), "check <- clock(requester=\"clock\")");
    }
}
