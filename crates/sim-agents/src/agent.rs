//! Agents and their dispatch tables.
//!
//! An agent is plain state plus a table mapping payload names to handler
//! functions. Handlers borrow the state mutably for the whole invocation,
//! suspensions included; the runtime guarantees only one invocation per agent
//! is in flight.

use std::collections::BTreeMap;
use std::fmt;

use futures::future::LocalBoxFuture;
use sim_graph::NodeId;

use crate::context::AgentContext;
use crate::error::{AgentError, HandlerResult, SerializationError};
use crate::message::Message;
use crate::store::AgentRecord;
use crate::value::Params;

/// Signature of every message handler.
///
/// Write handlers as `fn name<'a>(agent: &'a mut A, ctx: &'a AgentContext,
/// params: Params) -> LocalBoxFuture<'a, HandlerResult>` returning
/// `async move { .. }.boxed_local()`.
pub type Handler<A> =
    for<'a> fn(&'a mut A, &'a AgentContext, Params) -> LocalBoxFuture<'a, HandlerResult>;

/// Payload handled by the kernel when the agent does not define it.
pub const KILL: &str = "kill";

/// Dispatch table of one agent type.
pub struct HandlerTable<A> {
    entries: BTreeMap<&'static str, Handler<A>>,
}

impl<A> HandlerTable<A> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Adds or replaces the handler for `payload`.
    pub fn on(mut self, payload: &'static str, handler: Handler<A>) -> Self {
        self.entries.insert(payload, handler);
        self
    }

    pub fn get(&self, payload: &str) -> Option<Handler<A>> {
        self.entries.get(payload).copied()
    }

    /// Whether `payload` is accepted, counting kernel payloads.
    pub fn accepts(&self, payload: &str) -> bool {
        payload == KILL || self.entries.contains_key(payload)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.entries.keys().copied().collect()
    }

    /// Payloads from `required` that the table does not accept.
    pub fn missing<'r>(&self, required: &[&'r str]) -> Vec<&'r str> {
        required
            .iter()
            .copied()
            .filter(|payload| !self.accepts(payload))
            .collect()
    }
}

impl<A> Default for HandlerTable<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> fmt::Debug for HandlerTable<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.keys()).finish()
    }
}

/// Behaviour shared by node and service agents.
pub trait Agent: Sized + 'static {
    /// Registered kind, persisted with evicted state.
    const KIND: &'static str;

    fn handlers() -> HandlerTable<Self>;

    /// Whether the agent may be evicted when its mailbox stays idle.
    fn can_be_collected(&self) -> bool {
        false
    }

    /// Declared persistent fields. Transient state (context, graph, mailbox)
    /// is re-established by the runtime on rehydration.
    fn save(&self, _record: AgentRecord) -> Result<AgentRecord, SerializationError> {
        Err(SerializationError::NotSerializable(Self::KIND.to_string()))
    }

    /// Fallback for payloads without a handler.
    fn unsupported_message(&mut self, ctx: &AgentContext, message: &Message) -> HandlerResult {
        Err(AgentError::UnsupportedMessage {
            agent: ctx.id().clone(),
            payload: message.payload.clone(),
        })
    }
}

/// Agents living on graph nodes, built by the node manager.
pub trait NodeAgent: Agent {
    fn create(id: NodeId, params: &Params) -> Result<Self, AgentError>;

    /// Rebuilds an evicted agent from its record.
    fn restore(record: &AgentRecord) -> Result<Self, SerializationError> {
        Err(SerializationError::NotSerializable(record.kind.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;

    use crate::value::Value;

    struct Echo;

    fn echo<'a>(
        _agent: &'a mut Echo,
        _ctx: &'a AgentContext,
        params: Params,
    ) -> LocalBoxFuture<'a, HandlerResult> {
        async move { Ok(params.get("value").cloned().unwrap_or(Value::Null)) }.boxed_local()
    }

    impl Agent for Echo {
        const KIND: &'static str = "echo";

        fn handlers() -> HandlerTable<Self> {
            HandlerTable::new().on("echo", echo)
        }
    }

    #[test]
    fn test_table_reports_missing_payloads() {
        let table = Echo::handlers();
        assert!(table.accepts("echo"));
        assert!(table.accepts(KILL));
        assert_eq!(table.missing(&["echo", "activate", "kill"]), vec!["activate"]);
        assert_eq!(table.names(), vec!["echo"]);
    }

    #[test]
    fn test_default_save_refuses() {
        let record = AgentRecord::new(crate::AgentId::Node(0), Echo::KIND);
        assert_eq!(
            Echo.save(record),
            Err(SerializationError::NotSerializable("echo".into()))
        );
    }
}
