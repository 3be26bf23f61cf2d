//! A node that accepts links and counts its activations.

use futures::future::LocalBoxFuture;
use futures::FutureExt;
use sim_agents::{
    Agent, AgentContext, AgentError, AgentRecord, HandlerResult, HandlerTable, NodeAgent, Params,
    SerializationError, Value,
};
use sim_graph::NodeId;

use super::{accept_link, node_of};

#[derive(Debug, Clone, PartialEq)]
pub struct BasicNode {
    pub id: NodeId,
    pub activations: u64,
    pub initialized: bool,
    pub evictable: bool,
}

fn activate<'a>(
    node: &'a mut BasicNode,
    _ctx: &'a AgentContext,
    _params: Params,
) -> LocalBoxFuture<'a, HandlerResult> {
    async move {
        node.activations += 1;
        Ok(Value::from(node.activations))
    }
    .boxed_local()
}

fn initialize<'a>(
    node: &'a mut BasicNode,
    _ctx: &'a AgentContext,
    _params: Params,
) -> LocalBoxFuture<'a, HandlerResult> {
    async move {
        node.initialized = true;
        Ok(Value::Null)
    }
    .boxed_local()
}

fn link<'a>(
    node: &'a mut BasicNode,
    ctx: &'a AgentContext,
    params: Params,
) -> LocalBoxFuture<'a, HandlerResult> {
    async move { accept_link(node.id, ctx, &params) }.boxed_local()
}

fn state<'a>(
    node: &'a mut BasicNode,
    _ctx: &'a AgentContext,
    _params: Params,
) -> LocalBoxFuture<'a, HandlerResult> {
    async move {
        Ok(Value::from(
            Params::new()
                .with("id", node.id)
                .with("activations", node.activations)
                .with("initialized", node.initialized),
        ))
    }
    .boxed_local()
}

impl Agent for BasicNode {
    const KIND: &'static str = "basic";

    fn handlers() -> HandlerTable<Self> {
        HandlerTable::new()
            .on("activate", activate)
            .on("accept_link", link)
            .on("initialize", initialize)
            .on("state", state)
    }

    fn can_be_collected(&self) -> bool {
        self.evictable
    }

    fn save(&self, record: AgentRecord) -> Result<AgentRecord, SerializationError> {
        Ok(record
            .with_field("activations", self.activations)
            .with_field("initialized", self.initialized))
    }
}

impl NodeAgent for BasicNode {
    fn create(id: NodeId, params: &Params) -> Result<Self, AgentError> {
        Ok(Self {
            id,
            activations: 0,
            initialized: false,
            evictable: params.bool_or("evictable", false)?,
        })
    }

    fn restore(record: &AgentRecord) -> Result<Self, SerializationError> {
        Ok(Self {
            id: node_of(record)?,
            activations: record.field("activations", |v| {
                v.as_int().and_then(|n| u64::try_from(n).ok())
            })?,
            initialized: record.field("initialized", Value::as_bool)?,
            evictable: true,
        })
    }
}
