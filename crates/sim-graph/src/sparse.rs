//! Sparse adjacency back-end.
//!
//! One neighbor set per node, tuned for frequent mutation. Neighbor sets are
//! ordered so that iteration is reproducible for a fixed seed.

use std::collections::{BTreeSet, HashMap};

use crate::backend::{Backend, RawGraph};
use crate::error::GraphError;
use crate::ids::NodeId;

/// Hash-of-sets adjacency storage.
#[derive(Debug, Clone, Default)]
pub struct AdjacencySets {
    directed: bool,
    successors: HashMap<NodeId, BTreeSet<NodeId>>,
    predecessors: HashMap<NodeId, BTreeSet<NodeId>>,
}

impl AdjacencySets {
    /// Creates an empty undirected adjacency.
    pub fn undirected() -> Self {
        Self::default()
    }

    /// Creates an empty directed adjacency.
    pub fn directed() -> Self {
        Self {
            directed: true,
            ..Self::default()
        }
    }
}

impl Backend for AdjacencySets {
    fn is_directed(&self) -> bool {
        self.directed
    }

    fn insert_node(&mut self, id: NodeId) -> Result<(), GraphError> {
        self.successors.entry(id).or_default();
        if self.directed {
            self.predecessors.entry(id).or_default();
        }
        Ok(())
    }

    fn delete_node(&mut self, id: NodeId) -> Vec<(NodeId, NodeId)> {
        let mut removed = Vec::new();
        let out = self.successors.remove(&id).unwrap_or_default();
        if self.directed {
            let inc = self.predecessors.remove(&id).unwrap_or_default();
            for v in out {
                if v != id {
                    if let Some(preds) = self.predecessors.get_mut(&v) {
                        preds.remove(&id);
                    }
                }
                removed.push((id, v));
            }
            for u in inc {
                if u == id {
                    continue;
                }
                if let Some(succs) = self.successors.get_mut(&u) {
                    succs.remove(&id);
                }
                removed.push((u, id));
            }
        } else {
            for v in out {
                if v != id {
                    if let Some(neighbors) = self.successors.get_mut(&v) {
                        neighbors.remove(&id);
                    }
                }
                removed.push((id, v));
            }
        }
        removed
    }

    fn insert_edge(&mut self, u: NodeId, v: NodeId) -> bool {
        let inserted = self.successors.entry(u).or_default().insert(v);
        if !inserted {
            return false;
        }
        if self.directed {
            self.predecessors.entry(v).or_default().insert(u);
        } else {
            self.successors.entry(v).or_default().insert(u);
        }
        true
    }

    fn delete_edge(&mut self, u: NodeId, v: NodeId) -> bool {
        let removed = self
            .successors
            .get_mut(&u)
            .map(|succs| succs.remove(&v))
            .unwrap_or(false);
        if !removed {
            return false;
        }
        if self.directed {
            if let Some(preds) = self.predecessors.get_mut(&v) {
                preds.remove(&u);
            }
        } else if let Some(neighbors) = self.successors.get_mut(&v) {
            neighbors.remove(&u);
        }
        true
    }

    fn contains_node(&self, id: NodeId) -> bool {
        self.successors.contains_key(&id)
    }

    fn contains_edge(&self, u: NodeId, v: NodeId) -> bool {
        self.successors
            .get(&u)
            .is_some_and(|succs| succs.contains(&v))
    }

    fn successors(&self, id: NodeId) -> Vec<NodeId> {
        self.successors
            .get(&id)
            .map(|succs| succs.iter().copied().collect())
            .unwrap_or_default()
    }

    fn predecessors(&self, id: NodeId) -> Vec<NodeId> {
        let source = if self.directed {
            &self.predecessors
        } else {
            &self.successors
        };
        source
            .get(&id)
            .map(|preds| preds.iter().copied().collect())
            .unwrap_or_default()
    }

    fn raw(&self) -> RawGraph<'_> {
        RawGraph::Adjacency {
            successors: &self.successors,
            predecessors: self.directed.then_some(&self.predecessors),
        }
    }
}
