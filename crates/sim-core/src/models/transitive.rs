//! Transitive linking with node replacement.
//!
//! An activated node introduces two of its neighbours to each other. A node
//! with fewer than two neighbours links to a random stranger instead. With
//! probability `death_prob` per tick a random node is replaced by a fresh
//! one, which is activated right away and so starts with a single edge.

use futures::future::LocalBoxFuture;
use futures::FutureExt;
use rand::seq::SliceRandom;
use rand::Rng;
use sim_agents::{
    Agent, AgentContext, AgentError, AgentRecord, HandlerResult, HandlerTable, NodeAgent, Params,
    SerializationError, Value,
};
use sim_graph::NodeId;

use super::{accept_link, node_of};
use crate::activator::{mode_from, ActivationPolicy, Activator, NodeSpec};
use crate::component::ComponentSpec;
use crate::options::OptionSpec;
use crate::simulation::{node_parameters, SimulationSpec};

#[derive(Debug, Clone, PartialEq)]
pub struct TransitiveNode {
    pub id: NodeId,
    pub evictable: bool,
}

impl TransitiveNode {
    /// Returns the edge added, if any.
    fn introduce(&self, ctx: &AgentContext) -> Result<Option<(NodeId, NodeId)>, AgentError> {
        let neighbors = ctx.graph().neighbors(self.id)?;
        let edge = if neighbors.len() >= 2 {
            ctx.with_rng(|rng| {
                let pair: Vec<NodeId> = neighbors.choose_multiple(rng, 2).copied().collect();
                Some((pair[0], pair[1]))
            })
        } else {
            let strangers: Vec<NodeId> = ctx
                .graph()
                .nodes()
                .into_iter()
                .filter(|v| *v != self.id && !neighbors.contains(v))
                .collect();
            ctx.with_rng(|rng| strangers.choose(rng).map(|&v| (self.id, v)))
        };
        if let Some((u, v)) = edge {
            ctx.graph_mut().add_edge(u, v)?;
        }
        Ok(edge)
    }
}

fn activate<'a>(
    node: &'a mut TransitiveNode,
    ctx: &'a AgentContext,
    _params: Params,
) -> LocalBoxFuture<'a, HandlerResult> {
    async move {
        let edge = node.introduce(ctx)?;
        Ok(Value::from(edge.map(|(u, v)| vec![u, v])))
    }
    .boxed_local()
}

fn link<'a>(
    node: &'a mut TransitiveNode,
    ctx: &'a AgentContext,
    params: Params,
) -> LocalBoxFuture<'a, HandlerResult> {
    async move { accept_link(node.id, ctx, &params) }.boxed_local()
}

impl Agent for TransitiveNode {
    const KIND: &'static str = "transitive";

    fn handlers() -> HandlerTable<Self> {
        HandlerTable::new()
            .on("activate", activate)
            .on("accept_link", link)
    }

    fn can_be_collected(&self) -> bool {
        self.evictable
    }

    fn save(&self, record: AgentRecord) -> Result<AgentRecord, SerializationError> {
        Ok(record)
    }
}

impl NodeAgent for TransitiveNode {
    fn create(id: NodeId, params: &Params) -> Result<Self, AgentError> {
        Ok(Self {
            id,
            evictable: params.bool_or("evictable", false)?,
        })
    }

    fn restore(record: &AgentRecord) -> Result<Self, SerializationError> {
        Ok(Self {
            id: node_of(record)?,
            evictable: true,
        })
    }
}

/// Replaces a random node with probability `death_prob`, otherwise
/// activates a random node.
#[derive(Debug, Clone)]
pub struct ReplacementPolicy {
    death_prob: f64,
    node: NodeSpec,
    replacing: bool,
}

impl ReplacementPolicy {
    pub fn new(death_prob: f64, node_params: Params) -> Self {
        Self {
            death_prob,
            node: NodeSpec::new(TransitiveNode::KIND, node_params),
            replacing: false,
        }
    }
}

impl ActivationPolicy for ReplacementPolicy {
    fn nodes_to_destroy(&mut self, ctx: &AgentContext, _tick: u64) -> Vec<NodeId> {
        let dies = ctx.with_rng(|rng| rng.gen::<f64>() < self.death_prob);
        if !dies {
            return Vec::new();
        }
        match ctx.graph_mut().random_node() {
            Ok(victim) => {
                self.replacing = true;
                vec![victim]
            }
            Err(_) => Vec::new(),
        }
    }

    fn nodes_to_create(&mut self, _ctx: &AgentContext, _tick: u64) -> Vec<NodeSpec> {
        if std::mem::take(&mut self.replacing) {
            vec![self.node.clone()]
        } else {
            Vec::new()
        }
    }

    fn nodes_to_activate(
        &mut self,
        ctx: &AgentContext,
        _tick: u64,
        created: &[NodeId],
    ) -> Vec<NodeId> {
        if created.is_empty() {
            ctx.graph_mut().random_node().into_iter().collect()
        } else {
            created.to_vec()
        }
    }
}

/// `--network-size` transitive nodes, replaced with `--death-prob`.
pub fn spec() -> SimulationSpec {
    SimulationSpec::basic("transitive")
        .with_options(vec![OptionSpec::float("death-prob")
            .default_value(0.01)
            .help("Per-tick probability that a random node is replaced")])
        .with_defaults(Params::new().with("node_kind", TransitiveNode::KIND))
        .with_node_kind::<TransitiveNode>()
        .with_activator(
            ComponentSpec::new("activator", |p: &Params| {
                let death_prob = p.float_or("death_prob", 0.01)?;
                if !(0.0..=1.0).contains(&death_prob) {
                    return Err(AgentError::InvalidParameter {
                        name: "death_prob".into(),
                        expected: "probability in [0, 1]",
                    });
                }
                let policy = ReplacementPolicy::new(death_prob, node_parameters(p)?);
                Ok(Activator::new(policy, mode_from(p)?))
            })
            .options(["death_prob", "sync_activator", "node_parameters"]),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_agents::{run_local, AgentId, AgentStore, BincodeSerializer, Runtime, RuntimeOptions};
    use sim_graph::{generators, Graph, SharedGraph, SparseGraph};

    fn runtime(graph: SparseGraph) -> Runtime {
        Runtime::new(
            SharedGraph::new(graph),
            AgentStore::new(Box::new(BincodeSerializer)),
            RuntimeOptions::default(),
        )
    }

    #[test]
    fn test_isolated_node_links_to_a_stranger() {
        run_local(async {
            let runtime = runtime(generators::empty(4, 1).unwrap());
            runtime
                .spawn(AgentId::Node(0), TransitiveNode { id: 0, evictable: false })
                .unwrap();
            let driver = runtime.context("driver");
            driver
                .sync_send(AgentId::Node(0), "activate", Params::new())
                .await
                .unwrap();
            assert_eq!(runtime.graph().with(|g| g.degree(0).unwrap()), 1);
            assert_eq!(runtime.graph().with(|g| g.number_of_edges()), 1);
        });
    }

    #[test]
    fn test_two_neighbours_get_introduced() {
        run_local(async {
            // star around node 0
            let mut graph = generators::empty(3, 1).unwrap();
            graph.add_edge(0, 1).unwrap();
            graph.add_edge(0, 2).unwrap();
            let runtime = runtime(graph);
            runtime
                .spawn(AgentId::Node(0), TransitiveNode { id: 0, evictable: false })
                .unwrap();
            let driver = runtime.context("driver");
            let edge = driver
                .sync_send(AgentId::Node(0), "activate", Params::new())
                .await
                .unwrap();
            assert_eq!(edge.as_list().map(<[Value]>::len), Some(2));
            assert!(runtime.graph().with(|g| g.has_edge(1, 2)));
        });
    }
}
