//! Node Manager
//!
//! The only agent that adds nodes to or removes nodes from the graph. Ids
//! come from the graph's identifier store, so a destroyed node's id is the
//! first to be handed out again.

use futures::future::LocalBoxFuture;
use futures::FutureExt;
use sim_agents::{
    services, Agent, AgentContext, AgentError, AgentId, HandlerResult, HandlerTable, Params,
    Value, KILL,
};
use sim_graph::NodeId;

/// Counters reported by `statistics`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManagerStats {
    pub created: u64,
    pub destroyed: u64,
}

#[derive(Debug, Default)]
pub struct NodeManager {
    stats: ManagerStats,
}

impl NodeManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> ManagerStats {
        self.stats
    }

    pub fn id() -> AgentId {
        AgentId::service(services::MANAGER)
    }
}

/// `create_node(kind, parameters) -> id`
fn create_node<'a>(
    manager: &'a mut NodeManager,
    ctx: &'a AgentContext,
    params: Params,
) -> LocalBoxFuture<'a, HandlerResult> {
    async move {
        let kind = params.str("kind")?;
        let parameters = match params.get("parameters") {
            Some(Value::Null) | None => Params::new(),
            Some(_) => params.params("parameters")?,
        };
        let id = ctx.graph_mut().add_node()?;
        if let Err(err) = ctx.runtime().create_node(kind, id, &parameters) {
            // no agent behind the id, so the node must not stay either
            ctx.graph_mut().remove_node(id)?;
            return Err(err);
        }
        manager.stats.created += 1;
        Ok(Value::from(id))
    }
    .boxed_local()
}

/// `destroy_node(id)`: stops the agent, drops any stored state, and removes
/// the node with its edges.
fn destroy_node<'a>(
    manager: &'a mut NodeManager,
    ctx: &'a AgentContext,
    params: Params,
) -> LocalBoxFuture<'a, HandlerResult> {
    async move {
        let id = params.node_id("id")?;
        let agent = AgentId::Node(id);
        ctx.runtime().forget(&agent);
        if ctx.runtime().is_registered(&agent) {
            if let Err(err) = ctx.sync_send(agent.clone(), KILL, Params::new()).await {
                tracing::debug!(node = id, "kill before destroy failed: {err}");
            }
        }
        ctx.graph_mut().remove_node(id)?;
        manager.stats.destroyed += 1;
        Ok(Value::Null)
    }
    .boxed_local()
}

/// Kills every live node and returns how many were stopped.
fn simulation_ended<'a>(
    _manager: &'a mut NodeManager,
    ctx: &'a AgentContext,
    _params: Params,
) -> LocalBoxFuture<'a, HandlerResult> {
    async move {
        let live: Vec<NodeId> = ctx.runtime().live_nodes();
        let count = live.len();
        ctx.send_all(live.into_iter().map(AgentId::Node), KILL, Params::new(), &[])
            .settle()
            .await;
        tracing::debug!(count, "node agents stopped");
        Ok(Value::from(count))
    }
    .boxed_local()
}

fn statistics<'a>(
    manager: &'a mut NodeManager,
    ctx: &'a AgentContext,
    _params: Params,
) -> LocalBoxFuture<'a, HandlerResult> {
    async move {
        let runtime = ctx.runtime().stats();
        Ok(Value::from(
            Params::new()
                .with("created", manager.stats.created)
                .with("destroyed", manager.stats.destroyed)
                .with("live", ctx.runtime().live_nodes().len())
                .with("stored", runtime.stored),
        ))
    }
    .boxed_local()
}

impl Agent for NodeManager {
    const KIND: &'static str = "manager";

    fn handlers() -> HandlerTable<Self> {
        HandlerTable::new()
            .on("create_node", create_node)
            .on("destroy_node", destroy_node)
            .on("simulation_ended", simulation_ended)
            .on("statistics", statistics)
    }
}

/// Request parameters for `create_node`.
pub fn create_request(kind: &str, parameters: Params) -> Params {
    Params::new()
        .with("kind", kind)
        .with("parameters", parameters)
}

/// Reads the id returned by `create_node`.
pub fn created_id(reply: Value) -> Result<NodeId, AgentError> {
    reply
        .as_node_id()
        .ok_or_else(|| AgentError::handler(format!("create_node returned {reply}")))
}
