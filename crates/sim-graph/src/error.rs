//! Graph error types.

use thiserror::Error;

use crate::ids::NodeId;

/// Errors raised by the identifier store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    /// The id was never taken or has already been freed.
    #[error("id {0} is not live")]
    InvalidId(NodeId),
}

/// Topology violations and sampling failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("node {0} not found")]
    NodeNotFound(NodeId),
    #[error("edge ({0}, {1}) not found")]
    EdgeNotFound(NodeId, NodeId),
    #[error("self loop on node {0} is not allowed by this graph")]
    SelfLoop(NodeId),
    #[error("cannot sample from a graph without nodes")]
    EmptyGraph,
    #[error("cannot sample an edge from a graph without edges")]
    NoEdges,
    #[error("graph capacity of {0} nodes exceeded")]
    CapacityExceeded(usize),
    #[error(transparent)]
    Id(#[from] IdError),
}
