//! Summary statistics over a graph, used in run reports.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::network::Graph;

/// Aggregate counts for a graph at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphStats {
    pub nodes: usize,
    pub edges: usize,
    pub density: f64,
    pub mean_degree: f64,
    pub max_degree: usize,
}

impl GraphStats {
    pub fn collect(graph: &dyn Graph) -> Self {
        let nodes = graph.number_of_nodes();
        let edges = graph.number_of_edges();
        let degrees: Vec<usize> = graph
            .nodes()
            .into_iter()
            .filter_map(|v| graph.degree(v).ok())
            .collect();
        let pairs = if graph.is_directed() {
            nodes.saturating_mul(nodes.saturating_sub(1))
        } else {
            nodes.saturating_mul(nodes.saturating_sub(1)) / 2
        };
        let density = if pairs == 0 {
            0.0
        } else {
            edges as f64 / pairs as f64
        };
        let mean_degree = if nodes == 0 {
            0.0
        } else {
            degrees.iter().sum::<usize>() as f64 / nodes as f64
        };
        Self {
            nodes,
            edges,
            density,
            mean_degree,
            max_degree: degrees.into_iter().max().unwrap_or(0),
        }
    }
}

/// Number of nodes per degree.
pub fn degree_histogram(graph: &dyn Graph) -> BTreeMap<usize, usize> {
    let mut histogram = BTreeMap::new();
    for v in graph.nodes() {
        if let Ok(degree) = graph.degree(v) {
            *histogram.entry(degree).or_insert(0) += 1;
        }
    }
    histogram
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::{complete, ring_lattice};

    #[test]
    fn test_complete_graph_is_dense() {
        let graph = complete(5, 0).unwrap();
        let stats = GraphStats::collect(&graph);
        assert_eq!(stats.edges, 10);
        assert!((stats.density - 1.0).abs() < f64::EPSILON);
        assert_eq!(stats.max_degree, 4);
    }

    #[test]
    fn test_histogram_of_regular_graph() {
        let graph = ring_lattice(8, 1, 0).unwrap();
        let histogram = degree_histogram(&graph);
        assert_eq!(histogram.get(&2), Some(&8));
        assert_eq!(histogram.len(), 1);
    }
}
