//! The evolving network.
//!
//! [`Network`] combines a storage [`Backend`] with the [`IdentifierStore`]
//! and the [`RandomSelector`], and exposes the object-safe [`Graph`] trait
//! that agents and analysis code program against.

use std::fmt;

use crate::backend::{Backend, RawGraph};
use crate::dense::AdjacencyMatrix;
use crate::error::GraphError;
use crate::ids::{IdentifierStore, NodeId};
use crate::selector::{AttachmentStrategy, RandomSelector};
use crate::sparse::AdjacencySets;

/// Graph operations shared by every back-end.
///
/// Mutations keep the random selector and the id store consistent with the
/// topology. Adding an edge that already exists is a no-op.
pub trait Graph: fmt::Debug {
    fn is_directed(&self) -> bool;

    fn allows_self_loops(&self) -> bool;

    /// Reserves the next id and inserts an isolated node under it.
    fn add_node(&mut self) -> Result<NodeId, GraphError>;

    /// Removes a node with all incident edges and frees its id.
    fn remove_node(&mut self, id: NodeId) -> Result<(), GraphError>;

    fn add_edge(&mut self, u: NodeId, v: NodeId) -> Result<(), GraphError>;

    fn remove_edge(&mut self, u: NodeId, v: NodeId) -> Result<(), GraphError>;

    fn has_node(&self, id: NodeId) -> bool;

    fn has_edge(&self, u: NodeId, v: NodeId) -> bool;

    /// All adjacent nodes when undirected, successors when directed.
    fn neighbors(&self, id: NodeId) -> Result<Vec<NodeId>, GraphError>;

    fn predecessors(&self, id: NodeId) -> Result<Vec<NodeId>, GraphError>;

    fn successors(&self, id: NodeId) -> Result<Vec<NodeId>, GraphError>;

    /// Total degree. Undirected self loops count twice.
    fn degree(&self, id: NodeId) -> Result<usize, GraphError>;

    fn in_degree(&self, id: NodeId) -> Result<usize, GraphError>;

    fn out_degree(&self, id: NodeId) -> Result<usize, GraphError>;

    fn number_of_nodes(&self) -> usize;

    fn number_of_edges(&self) -> usize;

    /// Present nodes, ascending.
    fn nodes(&self) -> Vec<NodeId>;

    /// Present edges, ascending, each undirected edge once as `(min, max)`.
    fn edges(&self) -> Vec<(NodeId, NodeId)>;

    fn random_node(&mut self) -> Result<NodeId, GraphError>;

    fn random_edge(&mut self) -> Result<(NodeId, NodeId), GraphError>;

    /// Node drawn with probability proportional to `degree + 1`.
    fn preferential_attachment(&mut self) -> Result<NodeId, GraphError>;

    /// Float in `[0, 1)` from the graph's own generator.
    fn uniform(&mut self) -> f64;

    fn raw(&self) -> RawGraph<'_>;

    /// Deep copy, used for snapshots.
    fn boxed_clone(&self) -> Box<dyn Graph>;
}

/// A back-end plus id allocation and sampling.
#[derive(Clone)]
pub struct Network<B> {
    backend: B,
    ids: IdentifierStore,
    selector: RandomSelector,
    self_loops: bool,
}

/// Hash-of-sets network for dynamic mutation.
pub type SparseGraph = Network<AdjacencySets>;

/// Boolean-matrix network with a fixed node capacity.
pub type DenseGraph = Network<AdjacencyMatrix>;

impl SparseGraph {
    pub fn undirected(seed: u64) -> Self {
        Self::from_backend(AdjacencySets::undirected(), seed, AttachmentStrategy::default())
    }

    pub fn directed(seed: u64) -> Self {
        Self::from_backend(AdjacencySets::directed(), seed, AttachmentStrategy::default())
    }
}

impl DenseGraph {
    pub fn undirected(capacity: usize, seed: u64) -> Self {
        Self::from_backend(
            AdjacencyMatrix::undirected(capacity),
            seed,
            AttachmentStrategy::default(),
        )
    }

    pub fn directed(capacity: usize, seed: u64) -> Self {
        Self::from_backend(
            AdjacencyMatrix::directed(capacity),
            seed,
            AttachmentStrategy::default(),
        )
    }
}

impl<B: Backend + 'static> Network<B> {
    /// Wraps an empty back-end.
    pub fn from_backend(backend: B, seed: u64, strategy: AttachmentStrategy) -> Self {
        Self {
            backend,
            ids: IdentifierStore::new(),
            selector: RandomSelector::new(seed, strategy),
            self_loops: false,
        }
    }

    /// Switches the preferential-attachment strategy.
    pub fn with_strategy(mut self, strategy: AttachmentStrategy) -> Self {
        self.selector.set_strategy(strategy);
        self
    }

    /// Allows or forbids self loops.
    pub fn with_self_loops(mut self, allowed: bool) -> Self {
        self.self_loops = allowed;
        self
    }

    /// Adds `count` nodes, returning their ids in order.
    pub fn add_nodes(&mut self, count: usize) -> Result<Vec<NodeId>, GraphError> {
        (0..count).map(|_| self.add_node()).collect()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn ids(&self) -> &IdentifierStore {
        &self.ids
    }

    fn key(&self, u: NodeId, v: NodeId) -> (NodeId, NodeId) {
        if self.backend.is_directed() || u <= v {
            (u, v)
        } else {
            (v, u)
        }
    }

    fn require(&self, id: NodeId) -> Result<(), GraphError> {
        if self.backend.contains_node(id) {
            Ok(())
        } else {
            Err(GraphError::NodeNotFound(id))
        }
    }

    fn loop_bonus(&self, id: NodeId) -> usize {
        usize::from(!self.backend.is_directed() && self.backend.contains_edge(id, id))
    }

    fn degree_unchecked(&self, id: NodeId) -> usize {
        if self.backend.is_directed() {
            self.backend.successors(id).len() + self.backend.predecessors(id).len()
        } else {
            self.backend.successors(id).len() + self.loop_bonus(id)
        }
    }
}

impl<B: Backend> fmt::Debug for Network<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Network")
            .field("directed", &self.backend.is_directed())
            .field("nodes", &self.selector.nodes().len())
            .field("edges", &self.selector.edges().len())
            .finish()
    }
}

impl<B: Backend + 'static> Graph for Network<B> {
    fn is_directed(&self) -> bool {
        self.backend.is_directed()
    }

    fn allows_self_loops(&self) -> bool {
        self.self_loops
    }

    fn add_node(&mut self) -> Result<NodeId, GraphError> {
        let id = self.ids.peek();
        self.backend.insert_node(id)?;
        self.ids.take();
        self.selector.node_added(id);
        Ok(id)
    }

    fn remove_node(&mut self, id: NodeId) -> Result<(), GraphError> {
        self.require(id)?;
        for (u, v) in self.backend.delete_node(id) {
            let key = self.key(u, v);
            self.selector.edge_removed(key);
        }
        self.selector.node_removed(id);
        self.ids.free(id)?;
        Ok(())
    }

    fn add_edge(&mut self, u: NodeId, v: NodeId) -> Result<(), GraphError> {
        self.require(u)?;
        self.require(v)?;
        if u == v && !self.self_loops {
            return Err(GraphError::SelfLoop(u));
        }
        if self.backend.insert_edge(u, v) {
            let key = self.key(u, v);
            self.selector.edge_added(key);
        }
        Ok(())
    }

    fn remove_edge(&mut self, u: NodeId, v: NodeId) -> Result<(), GraphError> {
        if !self.backend.delete_edge(u, v) {
            return Err(GraphError::EdgeNotFound(u, v));
        }
        let key = self.key(u, v);
        self.selector.edge_removed(key);
        Ok(())
    }

    fn has_node(&self, id: NodeId) -> bool {
        self.backend.contains_node(id)
    }

    fn has_edge(&self, u: NodeId, v: NodeId) -> bool {
        self.backend.contains_edge(u, v)
    }

    fn neighbors(&self, id: NodeId) -> Result<Vec<NodeId>, GraphError> {
        self.successors(id)
    }

    fn predecessors(&self, id: NodeId) -> Result<Vec<NodeId>, GraphError> {
        self.require(id)?;
        Ok(self.backend.predecessors(id))
    }

    fn successors(&self, id: NodeId) -> Result<Vec<NodeId>, GraphError> {
        self.require(id)?;
        Ok(self.backend.successors(id))
    }

    fn degree(&self, id: NodeId) -> Result<usize, GraphError> {
        self.require(id)?;
        Ok(self.degree_unchecked(id))
    }

    fn in_degree(&self, id: NodeId) -> Result<usize, GraphError> {
        self.require(id)?;
        if self.backend.is_directed() {
            Ok(self.backend.predecessors(id).len())
        } else {
            Ok(self.degree_unchecked(id))
        }
    }

    fn out_degree(&self, id: NodeId) -> Result<usize, GraphError> {
        self.require(id)?;
        if self.backend.is_directed() {
            Ok(self.backend.successors(id).len())
        } else {
            Ok(self.degree_unchecked(id))
        }
    }

    fn number_of_nodes(&self) -> usize {
        self.selector.nodes().len()
    }

    fn number_of_edges(&self) -> usize {
        self.selector.edges().len()
    }

    fn nodes(&self) -> Vec<NodeId> {
        let mut nodes = self.selector.nodes().to_vec();
        nodes.sort_unstable();
        nodes
    }

    fn edges(&self) -> Vec<(NodeId, NodeId)> {
        let mut edges = self.selector.edges().to_vec();
        edges.sort_unstable();
        edges
    }

    fn random_node(&mut self) -> Result<NodeId, GraphError> {
        self.selector.random_node()
    }

    fn random_edge(&mut self) -> Result<(NodeId, NodeId), GraphError> {
        self.selector.random_edge()
    }

    fn preferential_attachment(&mut self) -> Result<NodeId, GraphError> {
        let Self {
            backend, selector, ..
        } = self;
        let directed = backend.is_directed();
        let backend = &*backend;
        selector.preferential_attachment(|id| {
            if directed {
                backend.successors(id).len() + backend.predecessors(id).len()
            } else {
                backend.successors(id).len() + usize::from(backend.contains_edge(id, id))
            }
        })
    }

    fn uniform(&mut self) -> f64 {
        self.selector.uniform()
    }

    fn raw(&self) -> RawGraph<'_> {
        self.backend.raw()
    }

    fn boxed_clone(&self) -> Box<dyn Graph> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> SparseGraph {
        let mut graph = SparseGraph::undirected(3);
        graph.add_nodes(3).unwrap();
        graph.add_edge(0, 1).unwrap();
        graph.add_edge(1, 2).unwrap();
        graph.add_edge(2, 0).unwrap();
        graph
    }

    #[test]
    fn test_add_edge_requires_endpoints() {
        let mut graph = SparseGraph::undirected(1);
        graph.add_node().unwrap();
        assert_eq!(graph.add_edge(0, 5), Err(GraphError::NodeNotFound(5)));
    }

    #[test]
    fn test_duplicate_edge_is_noop() {
        let mut graph = triangle();
        graph.add_edge(1, 0).unwrap();
        assert_eq!(graph.number_of_edges(), 3);
    }

    #[test]
    fn test_self_loops_are_opt_in() {
        let mut graph = SparseGraph::undirected(1);
        graph.add_node().unwrap();
        assert_eq!(graph.add_edge(0, 0), Err(GraphError::SelfLoop(0)));

        let mut graph = SparseGraph::undirected(1).with_self_loops(true);
        graph.add_node().unwrap();
        graph.add_edge(0, 0).unwrap();
        assert_eq!(graph.degree(0).unwrap(), 2);
    }

    #[test]
    fn test_remove_node_drops_incident_edges_and_frees_id() {
        let mut graph = triangle();
        graph.remove_node(1).unwrap();
        assert_eq!(graph.edges(), vec![(0, 2)]);
        assert_eq!(graph.number_of_nodes(), 2);
        assert_eq!(graph.add_node().unwrap(), 1);
        assert_eq!(graph.degree(1).unwrap(), 0);
    }

    #[test]
    fn test_remove_missing_edge_fails() {
        let mut graph = triangle();
        graph.remove_edge(0, 1).unwrap();
        assert_eq!(graph.remove_edge(1, 0), Err(GraphError::EdgeNotFound(1, 0)));
    }

    #[test]
    fn test_directed_degrees() {
        let mut graph = SparseGraph::directed(1);
        graph.add_nodes(3).unwrap();
        graph.add_edge(0, 1).unwrap();
        graph.add_edge(2, 1).unwrap();
        assert!(graph.is_directed());
        assert!(!graph.has_edge(1, 0));
        assert_eq!(graph.in_degree(1).unwrap(), 2);
        assert_eq!(graph.out_degree(1).unwrap(), 0);
        assert_eq!(graph.degree(1).unwrap(), 2);
        assert_eq!(graph.predecessors(1).unwrap(), vec![0, 2]);
    }

    #[test]
    fn test_dense_and_sparse_agree() {
        let mut sparse = SparseGraph::undirected(9);
        let mut dense = DenseGraph::undirected(8, 9);
        for graph in [&mut sparse as &mut dyn Graph, &mut dense as &mut dyn Graph] {
            for _ in 0..6 {
                graph.add_node().unwrap();
            }
            graph.add_edge(0, 1).unwrap();
            graph.add_edge(1, 2).unwrap();
            graph.add_edge(4, 5).unwrap();
            graph.remove_node(1).unwrap();
        }
        assert_eq!(sparse.nodes(), dense.nodes());
        assert_eq!(sparse.edges(), dense.edges());
    }

    #[test]
    fn test_dense_capacity_does_not_leak_ids() {
        let mut graph = DenseGraph::undirected(1, 0);
        graph.add_node().unwrap();
        assert_eq!(graph.add_node(), Err(GraphError::CapacityExceeded(1)));
        assert_eq!(graph.ids().live_count(), 1);
    }

    #[test]
    fn test_add_nodes_on_dense_backend() {
        let mut graph = DenseGraph::undirected(4, 0);
        assert_eq!(graph.add_nodes(3).unwrap(), vec![0, 1, 2]);
        graph.remove_node(1).unwrap();
        assert_eq!(graph.add_nodes(1).unwrap(), vec![1]);
        assert_eq!(graph.add_nodes(2), Err(GraphError::CapacityExceeded(4)));
    }

    #[test]
    fn test_sampling_tracks_mutations() {
        let mut graph = triangle();
        graph.remove_edge(0, 1).unwrap();
        for _ in 0..100 {
            let edge = graph.random_edge().unwrap();
            assert!(edge == (1, 2) || edge == (0, 2));
        }
        graph.remove_node(0).unwrap();
        for _ in 0..100 {
            let v = graph.preferential_attachment().unwrap();
            assert!(v == 1 || v == 2);
        }
    }
}
