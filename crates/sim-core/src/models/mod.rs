//! Reference models
//!
//! Each model is a node kind plus a [`SimulationSpec`](crate::SimulationSpec)
//! that wires it into the control plane.
//!
//! - [`basic`]: isolated nodes activated at random
//! - [`preferential`]: growth by preferential attachment
//! - [`transitive`]: triadic closure with node replacement
//! - [`small_world`]: a Watts–Strogatz seed graph

pub mod basic;
pub mod preferential;
pub mod small_world;
pub mod transitive;

pub use basic::BasicNode;
pub use preferential::{PreferentialGrowth, PreferentialNode};
pub use transitive::{ReplacementPolicy, TransitiveNode};

use sim_agents::{AgentContext, AgentRecord, HandlerResult, Params, SerializationError, Value};
use sim_graph::NodeId;

/// `accept_link(originating_node)`: adds the edge `originating_node -> node`.
pub(crate) fn accept_link(node: NodeId, ctx: &AgentContext, params: &Params) -> HandlerResult {
    let from = params.node_id("originating_node")?;
    ctx.graph_mut().add_edge(from, node)?;
    Ok(Value::Null)
}

pub(crate) fn node_of(record: &AgentRecord) -> Result<NodeId, SerializationError> {
    record
        .id
        .node_id()
        .ok_or_else(|| SerializationError::Decode(format!("{} is not a node", record.id)))
}
