//! Sampling distribution and determinism tests.
//!
//! Verifies preferential attachment against `p(v) ∝ deg(v) + 1` and that the
//! substrate is reproducible for a fixed seed.

use sim_graph::{AttachmentStrategy, Graph, SparseGraph};

const DRAWS: usize = 60_000;

/// 0.999 quantile of χ² with 5 degrees of freedom is 20.5; leave headroom.
const CHI_SQUARED_LIMIT: f64 = 25.0;

fn fixed_graph(strategy: AttachmentStrategy) -> SparseGraph {
    let mut graph = SparseGraph::undirected(2024).with_strategy(strategy);
    graph.add_nodes(6).unwrap();
    for (u, v) in [(0, 1), (0, 2), (0, 3), (0, 4), (1, 2), (3, 4)] {
        graph.add_edge(u, v).unwrap();
    }
    graph
}

fn chi_squared(graph: &mut SparseGraph) -> f64 {
    let nodes = graph.nodes();
    let weights: Vec<f64> = nodes
        .iter()
        .map(|&v| (graph.degree(v).unwrap() + 1) as f64)
        .collect();
    let total: f64 = weights.iter().sum();

    let mut observed = vec![0usize; nodes.len()];
    for _ in 0..DRAWS {
        let v = graph.preferential_attachment().unwrap();
        observed[v] += 1;
    }

    observed
        .iter()
        .zip(&weights)
        .map(|(&o, &w)| {
            let expected = DRAWS as f64 * w / total;
            (o as f64 - expected).powi(2) / expected
        })
        .sum()
}

/// Test repeated-nodes sampling matches the attachment distribution
#[test]
fn test_repeated_nodes_distribution() {
    let mut graph = fixed_graph(AttachmentStrategy::RepeatedNodes);
    let stat = chi_squared(&mut graph);
    assert!(stat < CHI_SQUARED_LIMIT, "χ² = {stat}");
}

/// Test rejection sampling matches the attachment distribution
#[test]
fn test_rejection_distribution() {
    let mut graph = fixed_graph(AttachmentStrategy::Rejection);
    let stat = chi_squared(&mut graph);
    assert!(stat < CHI_SQUARED_LIMIT, "χ² = {stat}");
}

/// Test the distribution still matches after removals invalidate the array
#[test]
fn test_distribution_after_removals() {
    let mut graph = fixed_graph(AttachmentStrategy::RepeatedNodes);
    graph.remove_edge(0, 4).unwrap();
    graph.remove_node(5).unwrap();
    let stat = chi_squared_without(&mut graph, 5);
    assert!(stat < CHI_SQUARED_LIMIT, "χ² = {stat}");
}

fn chi_squared_without(graph: &mut SparseGraph, missing: usize) -> f64 {
    let nodes = graph.nodes();
    assert!(!nodes.contains(&missing));
    let total: f64 = nodes
        .iter()
        .map(|&v| (graph.degree(v).unwrap() + 1) as f64)
        .sum();
    let mut observed = vec![0usize; missing + 1];
    for _ in 0..DRAWS {
        observed[graph.preferential_attachment().unwrap()] += 1;
    }
    assert_eq!(observed[missing], 0);
    nodes
        .iter()
        .map(|&v| {
            let expected = DRAWS as f64 * (graph.degree(v).unwrap() + 1) as f64 / total;
            (observed[v] as f64 - expected).powi(2) / expected
        })
        .sum()
}

/// Test that identical seeds produce identical draws
#[test]
fn test_sampling_determinism() {
    let mut a = fixed_graph(AttachmentStrategy::RepeatedNodes);
    let mut b = fixed_graph(AttachmentStrategy::RepeatedNodes);
    let draws_a: Vec<_> = (0..200).map(|_| a.preferential_attachment().unwrap()).collect();
    let draws_b: Vec<_> = (0..200).map(|_| b.preferential_attachment().unwrap()).collect();
    assert_eq!(draws_a, draws_b, "Sampling should be identical with same seed");

    let edges_a: Vec<_> = (0..50).map(|_| a.random_edge().unwrap()).collect();
    let edges_b: Vec<_> = (0..50).map(|_| b.random_edge().unwrap()).collect();
    assert_eq!(edges_a, edges_b);
}

/// Test that an edgeless graph samples uniformly instead of failing
#[test]
fn test_edgeless_attachment_is_uniform() {
    let mut graph = SparseGraph::undirected(5);
    graph.add_nodes(4).unwrap();
    let mut seen = [0usize; 4];
    for _ in 0..4_000 {
        seen[graph.preferential_attachment().unwrap()] += 1;
    }
    assert!(seen.iter().all(|&count| count > 800), "{seen:?}");
}
