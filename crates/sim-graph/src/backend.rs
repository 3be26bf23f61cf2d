//! Storage back-ends for the evolving network.
//!
//! A back-end only stores topology. Id allocation and random sampling are
//! layered on top by [`Network`](crate::Network) so every back-end shares the
//! same contract.

use std::collections::{BTreeSet, HashMap};

use ndarray::Array2;

use crate::error::GraphError;
use crate::ids::NodeId;

/// Borrowed view of a back-end's underlying representation.
///
/// Handed to analysis routines through
/// [`SharedGraph::apply`](crate::SharedGraph::apply).
#[derive(Debug, Clone, Copy)]
pub enum RawGraph<'a> {
    /// Hash-of-sets adjacency. `predecessors` is `None` for undirected graphs.
    Adjacency {
        successors: &'a HashMap<NodeId, BTreeSet<NodeId>>,
        predecessors: Option<&'a HashMap<NodeId, BTreeSet<NodeId>>>,
    },
    /// Boolean adjacency matrix with a presence mask over its rows.
    Matrix {
        matrix: &'a Array2<bool>,
        present: &'a [bool],
    },
}

/// Topology storage operations.
///
/// Implementations never allocate ids and never validate endpoints against
/// the id store; [`Network`](crate::Network) does that before calling in.
pub trait Backend: Clone {
    /// Whether edges are ordered pairs.
    fn is_directed(&self) -> bool;

    /// Inserts an isolated node.
    fn insert_node(&mut self, id: NodeId) -> Result<(), GraphError>;

    /// Deletes a node and returns the incident edges that were removed.
    fn delete_node(&mut self, id: NodeId) -> Vec<(NodeId, NodeId)>;

    /// Inserts an edge, returning `false` if it was already present.
    fn insert_edge(&mut self, u: NodeId, v: NodeId) -> bool;

    /// Deletes an edge, returning `false` if it was absent.
    fn delete_edge(&mut self, u: NodeId, v: NodeId) -> bool;

    fn contains_node(&self, id: NodeId) -> bool;

    fn contains_edge(&self, u: NodeId, v: NodeId) -> bool;

    /// Out-neighbors (all neighbors when undirected), ascending.
    fn successors(&self, id: NodeId) -> Vec<NodeId>;

    /// In-neighbors (all neighbors when undirected), ascending.
    fn predecessors(&self, id: NodeId) -> Vec<NodeId>;

    fn raw(&self) -> RawGraph<'_>;
}
