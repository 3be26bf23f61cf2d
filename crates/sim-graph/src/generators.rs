//! Seed Graph Generators
//!
//! Builders for the initial topologies handed to seed-graph configurators.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::error::GraphError;
use crate::network::{Graph, SparseGraph};

/// `n` isolated nodes.
pub fn empty(n: usize, seed: u64) -> Result<SparseGraph, GraphError> {
    let mut graph = SparseGraph::undirected(seed);
    graph.add_nodes(n)?;
    Ok(graph)
}

/// Every pair of `n` nodes linked.
pub fn complete(n: usize, seed: u64) -> Result<SparseGraph, GraphError> {
    let mut graph = empty(n, seed)?;
    for u in 0..n {
        for v in (u + 1)..n {
            graph.add_edge(u, v)?;
        }
    }
    Ok(graph)
}

/// Ring of `n` nodes, each linked to its `k` nearest successors.
///
/// When `2k < n` every node ends up with degree `2k` and the ring has
/// `n * k` edges. Otherwise the neighbourhoods wrap onto each other and the
/// result is the complete graph on `n` nodes.
pub fn ring_lattice(n: usize, k: usize, seed: u64) -> Result<SparseGraph, GraphError> {
    if 2 * k >= n {
        return complete(n, seed);
    }
    let mut graph = empty(n, seed)?;
    for u in 0..n {
        for offset in 1..=k {
            graph.add_edge(u, (u + offset) % n)?;
        }
    }
    Ok(graph)
}

/// Watts–Strogatz small world: a ring lattice whose edges are rewired with
/// probability `p` to a uniformly chosen new endpoint.
///
/// Rewiring never creates self loops or duplicates, so the edge count of the
/// lattice is preserved. A lattice that collapsed into the complete graph
/// has nothing to rewire and is returned as is.
pub fn watts_strogatz(n: usize, k: usize, p: f64, seed: u64) -> Result<SparseGraph, GraphError> {
    let mut graph = ring_lattice(n, k, seed)?;
    let mut rng = SmallRng::seed_from_u64(seed);
    for offset in 1..=k {
        for u in 0..n {
            let v = (u + offset) % n;
            if v == u || !graph.has_edge(u, v) || rng.gen::<f64>() >= p {
                continue;
            }
            if graph.degree(u)? >= n - 1 {
                continue;
            }
            let w = loop {
                let candidate = rng.gen_range(0..n);
                if candidate != u && !graph.has_edge(u, candidate) {
                    break candidate;
                }
            };
            graph.remove_edge(u, v)?;
            graph.add_edge(u, w)?;
        }
    }
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_graph_edge_count() {
        let graph = complete(6, 0).unwrap();
        assert_eq!(graph.number_of_edges(), 15);
    }

    #[test]
    fn test_ring_lattice_degrees() {
        let graph = ring_lattice(10, 2, 0).unwrap();
        assert_eq!(graph.number_of_edges(), 20);
        for v in graph.nodes() {
            assert_eq!(graph.degree(v).unwrap(), 4);
        }
    }

    #[test]
    fn test_narrow_ring_collapses_to_complete_graph() {
        for (n, k, edges) in [(2, 1, 1), (4, 2, 6), (5, 3, 10), (3, 1, 3)] {
            let graph = ring_lattice(n, k, 0).unwrap();
            assert_eq!(graph.number_of_edges(), edges, "n={n} k={k}");
            for v in graph.nodes() {
                assert_eq!(graph.degree(v).unwrap(), n - 1);
            }
        }
        let rewired = watts_strogatz(4, 2, 1.0, 3).unwrap();
        assert_eq!(rewired.edges(), complete(4, 3).unwrap().edges());
    }

    #[test]
    fn test_watts_strogatz_preserves_edge_count() {
        let graph = watts_strogatz(1000, 2, 0.5, 42).unwrap();
        assert_eq!(graph.number_of_nodes(), 1000);
        assert_eq!(graph.number_of_edges(), 2000);
    }

    #[test]
    fn test_watts_strogatz_is_seeded() {
        let a = watts_strogatz(200, 3, 0.3, 7).unwrap();
        let b = watts_strogatz(200, 3, 0.3, 7).unwrap();
        assert_eq!(a.edges(), b.edges());
        let lattice = ring_lattice(200, 3, 7).unwrap();
        assert_ne!(a.edges(), lattice.edges());
    }
}
