//! Dense boolean-matrix back-end with a fixed node capacity.

use ndarray::Array2;

use crate::backend::{Backend, RawGraph};
use crate::error::GraphError;
use crate::ids::NodeId;

/// Adjacency matrix sized for at most `capacity` nodes.
#[derive(Debug, Clone)]
pub struct AdjacencyMatrix {
    directed: bool,
    matrix: Array2<bool>,
    present: Vec<bool>,
}

impl AdjacencyMatrix {
    /// Creates an undirected matrix for up to `capacity` nodes.
    pub fn undirected(capacity: usize) -> Self {
        Self::with_direction(capacity, false)
    }

    /// Creates a directed matrix for up to `capacity` nodes.
    pub fn directed(capacity: usize) -> Self {
        Self::with_direction(capacity, true)
    }

    fn with_direction(capacity: usize, directed: bool) -> Self {
        Self {
            directed,
            matrix: Array2::from_elem((capacity, capacity), false),
            present: vec![false; capacity],
        }
    }

    /// Maximum number of nodes.
    pub fn capacity(&self) -> usize {
        self.present.len()
    }

    /// The underlying matrix, for algebraic analysis.
    pub fn matrix(&self) -> &Array2<bool> {
        &self.matrix
    }
}

impl Backend for AdjacencyMatrix {
    fn is_directed(&self) -> bool {
        self.directed
    }

    fn insert_node(&mut self, id: NodeId) -> Result<(), GraphError> {
        if id >= self.capacity() {
            return Err(GraphError::CapacityExceeded(self.capacity()));
        }
        self.present[id] = true;
        Ok(())
    }

    fn delete_node(&mut self, id: NodeId) -> Vec<(NodeId, NodeId)> {
        let mut removed = Vec::new();
        if id >= self.capacity() {
            return removed;
        }
        for j in 0..self.capacity() {
            if self.matrix[[id, j]] {
                self.matrix[[id, j]] = false;
                if !self.directed {
                    self.matrix[[j, id]] = false;
                }
                removed.push((id, j));
            }
            if self.directed && j != id && self.matrix[[j, id]] {
                self.matrix[[j, id]] = false;
                removed.push((j, id));
            }
        }
        self.present[id] = false;
        removed
    }

    fn insert_edge(&mut self, u: NodeId, v: NodeId) -> bool {
        if self.matrix[[u, v]] {
            return false;
        }
        self.matrix[[u, v]] = true;
        if !self.directed {
            self.matrix[[v, u]] = true;
        }
        true
    }

    fn delete_edge(&mut self, u: NodeId, v: NodeId) -> bool {
        if !self.contains_edge(u, v) {
            return false;
        }
        self.matrix[[u, v]] = false;
        if !self.directed {
            self.matrix[[v, u]] = false;
        }
        true
    }

    fn contains_node(&self, id: NodeId) -> bool {
        self.present.get(id).copied().unwrap_or(false)
    }

    fn contains_edge(&self, u: NodeId, v: NodeId) -> bool {
        u < self.capacity() && v < self.capacity() && self.matrix[[u, v]]
    }

    fn successors(&self, id: NodeId) -> Vec<NodeId> {
        if id >= self.capacity() {
            return Vec::new();
        }
        self.matrix
            .row(id)
            .iter()
            .enumerate()
            .filter_map(|(j, &linked)| linked.then_some(j))
            .collect()
    }

    fn predecessors(&self, id: NodeId) -> Vec<NodeId> {
        if id >= self.capacity() {
            return Vec::new();
        }
        self.matrix
            .column(id)
            .iter()
            .enumerate()
            .filter_map(|(i, &linked)| linked.then_some(i))
            .collect()
    }

    fn raw(&self) -> RawGraph<'_> {
        RawGraph::Matrix {
            matrix: &self.matrix,
            present: &self.present,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_is_enforced() {
        let mut adj = AdjacencyMatrix::undirected(2);
        adj.insert_node(0).unwrap();
        adj.insert_node(1).unwrap();
        assert_eq!(adj.insert_node(2), Err(GraphError::CapacityExceeded(2)));
    }

    #[test]
    fn test_undirected_matrix_is_symmetric() {
        let mut adj = AdjacencyMatrix::undirected(3);
        for id in 0..3 {
            adj.insert_node(id).unwrap();
        }
        adj.insert_edge(0, 2);
        assert_eq!(adj.matrix(), &adj.matrix().t().to_owned());
        assert_eq!(adj.successors(2), vec![0]);
        assert_eq!(adj.delete_node(0), vec![(0, 2)]);
        assert!(adj.successors(2).is_empty());
    }
}
