//! Preferential-attachment growth.
//!
//! Every tick adds one node, which links to `links` distinct existing nodes
//! drawn with probability proportional to `degree + 1`. The run starts from
//! a ring of `network_size` nodes.
//!
//! With `cooperate` set the new node yields between draws, so nodes created
//! in the same window see each other's partial links. This changes the
//! degree distribution measurably; both behaviours are supported.

use futures::future::LocalBoxFuture;
use futures::FutureExt;
use sim_agents::{
    Agent, AgentContext, AgentError, AgentRecord, HandlerResult, HandlerTable, NodeAgent, Params,
    SerializationError, Value,
};
use sim_graph::{generators, NodeId};

use super::{accept_link, node_of};
use crate::activator::{mode_from, ActivationPolicy, Activator, NodeSpec};
use crate::component::ComponentSpec;
use crate::configurator::Population;
use crate::options::OptionSpec;
use crate::simulation::{configurator_for, node_parameters, seed_of, SimulationSpec};

#[derive(Debug, Clone, PartialEq)]
pub struct PreferentialNode {
    pub id: NodeId,
    pub links: usize,
    pub cooperate: bool,
    pub evictable: bool,
}

impl PreferentialNode {
    /// Nodes this one could still link to.
    fn available(&self, ctx: &AgentContext) -> Result<usize, AgentError> {
        let graph = ctx.graph();
        let linked = graph.neighbors(self.id)?.len();
        Ok(graph
            .number_of_nodes()
            .saturating_sub(1)
            .saturating_sub(linked))
    }

    async fn attach(&self, ctx: &AgentContext) -> Result<usize, AgentError> {
        let mut made = 0;
        while made < self.links && self.available(ctx)? > 0 {
            let target = ctx.graph_mut().preferential_attachment()?;
            if target == self.id || ctx.graph().has_edge(self.id, target) {
                continue;
            }
            ctx.graph_mut().add_edge(self.id, target)?;
            made += 1;
            if self.cooperate {
                ctx.cooperate().await;
            }
        }
        Ok(made)
    }
}

fn activate<'a>(
    node: &'a mut PreferentialNode,
    ctx: &'a AgentContext,
    _params: Params,
) -> LocalBoxFuture<'a, HandlerResult> {
    async move {
        let made = node.attach(ctx).await?;
        Ok(Value::from(made))
    }
    .boxed_local()
}

fn link<'a>(
    node: &'a mut PreferentialNode,
    ctx: &'a AgentContext,
    params: Params,
) -> LocalBoxFuture<'a, HandlerResult> {
    async move { accept_link(node.id, ctx, &params) }.boxed_local()
}

impl Agent for PreferentialNode {
    const KIND: &'static str = "preferential";

    fn handlers() -> HandlerTable<Self> {
        HandlerTable::new()
            .on("activate", activate)
            .on("accept_link", link)
    }

    fn can_be_collected(&self) -> bool {
        self.evictable
    }

    fn save(&self, record: AgentRecord) -> Result<AgentRecord, SerializationError> {
        Ok(record
            .with_field("links", self.links)
            .with_field("cooperate", self.cooperate))
    }
}

impl NodeAgent for PreferentialNode {
    fn create(id: NodeId, params: &Params) -> Result<Self, AgentError> {
        Ok(Self {
            id,
            links: params.usize_or("links", 1)?,
            cooperate: params.bool_or("cooperate", false)?,
            evictable: params.bool_or("evictable", false)?,
        })
    }

    fn restore(record: &AgentRecord) -> Result<Self, SerializationError> {
        Ok(Self {
            id: node_of(record)?,
            links: record.field("links", |v| {
                v.as_int().and_then(|n| usize::try_from(n).ok())
            })?,
            cooperate: record.field("cooperate", Value::as_bool)?,
            evictable: true,
        })
    }
}

/// Creates one node per tick and activates only that node.
#[derive(Debug, Clone)]
pub struct PreferentialGrowth {
    node: NodeSpec,
}

impl PreferentialGrowth {
    pub fn new(node_params: Params) -> Self {
        Self {
            node: NodeSpec::new(PreferentialNode::KIND, node_params),
        }
    }
}

impl ActivationPolicy for PreferentialGrowth {
    fn nodes_to_create(&mut self, _ctx: &AgentContext, _tick: u64) -> Vec<NodeSpec> {
        vec![self.node.clone()]
    }

    fn nodes_to_activate(
        &mut self,
        _ctx: &AgentContext,
        _tick: u64,
        created: &[NodeId],
    ) -> Vec<NodeId> {
        created.to_vec()
    }
}

/// Growth from a ring of `--network-size` nodes, `--links` per new node.
pub fn spec() -> SimulationSpec {
    SimulationSpec::basic("preferential")
        .with_options(vec![
            OptionSpec::int("links")
                .short('m')
                .default_value(5)
                .help("Links made by every new node"),
            OptionSpec::flag("cooperate").help("Yield between link draws"),
        ])
        .with_defaults(
            Params::new()
                .with("starting_network_size", 5)
                .with("node_kind", PreferentialNode::KIND),
        )
        .with_node_kind::<PreferentialNode>()
        .with_node_parameters(["links", "cooperate"])
        .with_configurator(
            ComponentSpec::new("configurator", |p: &Params| {
                let size = p.usize_or("starting_network_size", 5)?;
                let ring = generators::ring_lattice(size, 1, seed_of(p)?)?;
                configurator_for(Population::Seed(Box::new(ring)), p)
            })
            .options([
                "starting_network_size",
                "seed",
                "node_kind",
                "node_parameters",
                "initialize_nodes",
            ]),
        )
        .with_activator(
            ComponentSpec::new("activator", |p: &Params| {
                let policy = PreferentialGrowth::new(node_parameters(p)?);
                Ok(Activator::new(policy, mode_from(p)?))
            })
            .options(["sync_activator", "node_parameters"]),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::{create_request, created_id, NodeManager};
    use sim_agents::{run_local, AgentStore, BincodeSerializer, Runtime, RuntimeOptions};
    use sim_graph::SharedGraph;

    #[test]
    fn test_new_node_links_to_distinct_targets() {
        run_local(async {
            let runtime = Runtime::new(
                SharedGraph::new(generators::complete(3, 9).unwrap()),
                AgentStore::new(Box::new(BincodeSerializer)),
                RuntimeOptions::default(),
            );
            runtime.register_node_kind::<PreferentialNode>();
            runtime.spawn(NodeManager::id(), NodeManager::new()).unwrap();
            let driver = runtime.context("driver");

            // five links wanted, only three other nodes exist
            let reply = driver
                .sync_send(
                    NodeManager::id(),
                    "create_node",
                    create_request("preferential", Params::new().with("links", 5)),
                )
                .await
                .unwrap();
            let id = created_id(reply).unwrap();
            let made = driver
                .sync_send(sim_agents::AgentId::Node(id), "activate", Params::new())
                .await
                .unwrap();
            assert_eq!(made, Value::Int(3));
            assert_eq!(runtime.graph().with(|g| g.degree(id).unwrap()), 3);
            assert_eq!(runtime.graph().with(|g| g.number_of_edges()), 6);
        });
    }
}
