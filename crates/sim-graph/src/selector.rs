//! Random Selection
//!
//! Constant-time uniform node and edge sampling plus preferential
//! attachment, kept in sync with every mutation of the owning network.

use std::collections::HashMap;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::ids::NodeId;

/// How preferential attachment draws are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentStrategy {
    /// Multiset holding every node `degree + 1` times, sampled by index.
    #[default]
    RepeatedNodes,
    /// Uniform node draws accepted with probability `(degree + 1) / (2|E| + |V|)`.
    Rejection,
}

/// Sampling facet of a network.
///
/// The owning [`Network`](crate::Network) reports every mutation; the selector
/// never inspects the back-end itself except through the degree function
/// passed to [`RandomSelector::preferential_attachment`].
#[derive(Debug, Clone)]
pub struct RandomSelector {
    rng: SmallRng,
    strategy: AttachmentStrategy,
    nodes: Vec<NodeId>,
    node_index: HashMap<NodeId, usize>,
    edges: Vec<(NodeId, NodeId)>,
    edge_index: HashMap<(NodeId, NodeId), usize>,
    repeated: Vec<NodeId>,
    stale: bool,
}

impl RandomSelector {
    /// Creates a selector with its own seeded generator.
    pub fn new(seed: u64, strategy: AttachmentStrategy) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
            strategy,
            nodes: Vec::new(),
            node_index: HashMap::new(),
            edges: Vec::new(),
            edge_index: HashMap::new(),
            repeated: Vec::new(),
            stale: false,
        }
    }

    pub fn strategy(&self) -> AttachmentStrategy {
        self.strategy
    }

    /// Changes strategy; the repeated-nodes array is rebuilt on next use.
    pub fn set_strategy(&mut self, strategy: AttachmentStrategy) {
        self.strategy = strategy;
        self.stale = true;
    }

    /// Present nodes in selector order.
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// Present edges in selector order, in canonical orientation.
    pub fn edges(&self) -> &[(NodeId, NodeId)] {
        &self.edges
    }

    pub(crate) fn node_added(&mut self, id: NodeId) {
        self.node_index.insert(id, self.nodes.len());
        self.nodes.push(id);
        if !self.stale {
            self.repeated.push(id);
        }
    }

    pub(crate) fn node_removed(&mut self, id: NodeId) {
        if let Some(pos) = self.node_index.remove(&id) {
            self.nodes.swap_remove(pos);
            if let Some(&moved) = self.nodes.get(pos) {
                self.node_index.insert(moved, pos);
            }
        }
        self.stale = true;
    }

    pub(crate) fn edge_added(&mut self, key: (NodeId, NodeId)) {
        self.edge_index.insert(key, self.edges.len());
        self.edges.push(key);
        if !self.stale {
            self.repeated.push(key.0);
            self.repeated.push(key.1);
        }
    }

    pub(crate) fn edge_removed(&mut self, key: (NodeId, NodeId)) {
        if let Some(pos) = self.edge_index.remove(&key) {
            self.edges.swap_remove(pos);
            if let Some(&moved) = self.edges.get(pos) {
                self.edge_index.insert(moved, pos);
            }
        }
        self.stale = true;
    }

    /// Uniform draw over present nodes.
    pub fn random_node(&mut self) -> Result<NodeId, GraphError> {
        if self.nodes.is_empty() {
            return Err(GraphError::EmptyGraph);
        }
        let pos = self.rng.gen_range(0..self.nodes.len());
        Ok(self.nodes[pos])
    }

    /// Uniform draw over present edges.
    pub fn random_edge(&mut self) -> Result<(NodeId, NodeId), GraphError> {
        if self.edges.is_empty() {
            return Err(GraphError::NoEdges);
        }
        let pos = self.rng.gen_range(0..self.edges.len());
        Ok(self.edges[pos])
    }

    /// Draw with `p(v) = (deg(v) + 1) / sum(deg(u) + 1)`.
    ///
    /// An edgeless graph degenerates to a uniform draw; a graph without nodes
    /// fails with [`GraphError::EmptyGraph`].
    pub fn preferential_attachment(
        &mut self,
        degree: impl Fn(NodeId) -> usize,
    ) -> Result<NodeId, GraphError> {
        if self.nodes.is_empty() {
            return Err(GraphError::EmptyGraph);
        }
        match self.strategy {
            AttachmentStrategy::RepeatedNodes => {
                if self.stale {
                    self.rebuild(&degree);
                }
                let pos = self.rng.gen_range(0..self.repeated.len());
                Ok(self.repeated[pos])
            }
            AttachmentStrategy::Rejection => {
                let total: usize = self.nodes.iter().map(|&v| degree(v) + 1).sum();
                loop {
                    let v = self.nodes[self.rng.gen_range(0..self.nodes.len())];
                    if self.rng.gen_range(0..total) < degree(v) + 1 {
                        return Ok(v);
                    }
                }
            }
        }
    }

    /// Draws a float in `[0, 1)` from the selector's generator.
    pub fn uniform(&mut self) -> f64 {
        self.rng.gen()
    }

    fn rebuild(&mut self, degree: &impl Fn(NodeId) -> usize) {
        self.repeated.clear();
        for &v in &self.nodes {
            let copies = degree(v) + 1;
            self.repeated.extend(std::iter::repeat(v).take(copies));
        }
        self.stale = false;
    }
}
