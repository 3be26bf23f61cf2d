//! Configurator
//!
//! Builds the starting population before the clock runs, either as a number
//! of isolated nodes or by replaying a seed graph through the manager.

use std::collections::HashMap;
use std::fmt;

use futures::future::LocalBoxFuture;
use futures::FutureExt;
use sim_agents::{
    services, Agent, AgentContext, AgentError, AgentId, HandlerResult, HandlerTable, Params,
    Value,
};
use sim_graph::{DynGraph, NodeId};

use crate::manager::{create_request, created_id};

/// Shape of the starting population.
pub enum Population {
    /// `count` nodes, no edges.
    Size { count: usize },
    /// One node per seed node, linked like the seed.
    Seed(Box<DynGraph>),
}

impl fmt::Debug for Population {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Population::Size { count } => f.debug_struct("Size").field("count", count).finish(),
            Population::Seed(graph) => f
                .debug_struct("Seed")
                .field("nodes", &graph.number_of_nodes())
                .field("edges", &graph.number_of_edges())
                .finish(),
        }
    }
}

#[derive(Debug)]
pub struct Configurator {
    population: Population,
    node_kind: String,
    node_params: Params,
    initialize_nodes: bool,
}

impl Configurator {
    pub fn new(population: Population, node_kind: impl Into<String>) -> Self {
        Self {
            population,
            node_kind: node_kind.into(),
            node_params: Params::new(),
            initialize_nodes: false,
        }
    }

    pub fn id() -> AgentId {
        AgentId::service(services::CONFIGURATOR)
    }

    pub fn with_node_params(mut self, params: Params) -> Self {
        self.node_params = params;
        self
    }

    /// Sends `initialize` to every created node once all exist.
    pub fn initializing(mut self, initialize: bool) -> Self {
        self.initialize_nodes = initialize;
        self
    }

    pub fn node_kind(&self) -> &str {
        &self.node_kind
    }

    pub fn initializes_nodes(&self) -> bool {
        self.initialize_nodes
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    /// Payloads node agents must handle for this setup.
    pub fn required_handlers(&self) -> Vec<&'static str> {
        let mut required = Vec::new();
        if matches!(self.population, Population::Seed(_)) {
            required.push("accept_link");
        }
        if self.initialize_nodes {
            required.push("initialize");
        }
        required
    }

    async fn create(&self, ctx: &AgentContext, count: usize) -> Result<Vec<NodeId>, AgentError> {
        let mut ids = Vec::with_capacity(count);
        for _ in 0..count {
            let reply = ctx
                .sync_send(
                    AgentId::service(services::MANAGER),
                    "create_node",
                    create_request(&self.node_kind, self.node_params.clone()),
                )
                .await?;
            ids.push(created_id(reply)?);
        }
        Ok(ids)
    }

    async fn link_like(
        &self,
        ctx: &AgentContext,
        seed: &DynGraph,
        ids: &[NodeId],
    ) -> Result<(), AgentError> {
        let mapping: HashMap<NodeId, NodeId> = seed.nodes().into_iter().zip(ids.iter().copied()).collect();
        let mut pending = Vec::new();
        for (u, v) in seed.edges() {
            let (Some(&from), Some(&to)) = (mapping.get(&u), mapping.get(&v)) else {
                continue;
            };
            pending.push(ctx.send(
                AgentId::Node(to),
                "accept_link",
                Params::new().with("originating_node", from),
            ));
        }
        for result in pending {
            result.get().await?;
        }
        Ok(())
    }

    async fn setup(&self, ctx: &AgentContext) -> Result<Vec<NodeId>, AgentError> {
        let ids = match &self.population {
            Population::Size { count } => self.create(ctx, *count).await?,
            Population::Seed(seed) => {
                let ids = self.create(ctx, seed.number_of_nodes()).await?;
                self.link_like(ctx, seed.as_ref(), &ids).await?;
                ids
            }
        };
        if self.initialize_nodes {
            ctx.sync_send_all(ids.iter().copied().map(AgentId::Node), "initialize", Params::new(), &[])
                .await?;
        }
        ctx.log(format!("created {} starting nodes", ids.len()));
        Ok(ids)
    }
}

/// `setup() -> [id]`
fn setup<'a>(
    configurator: &'a mut Configurator,
    ctx: &'a AgentContext,
    _params: Params,
) -> LocalBoxFuture<'a, HandlerResult> {
    async move {
        let ids = configurator.setup(ctx).await?;
        Ok(Value::from(ids))
    }
    .boxed_local()
}

impl Agent for Configurator {
    const KIND: &'static str = "configurator";

    fn handlers() -> HandlerTable<Self> {
        HandlerTable::new().on("setup", setup)
    }
}
