//! Activator
//!
//! Turns every `tick` into three phases: destroy nodes, create nodes,
//! activate nodes. What each phase selects is decided by an
//! [`ActivationPolicy`]; how the requests are sent depends on the
//! [`ActivationMode`].

use std::fmt;

use futures::future::LocalBoxFuture;
use futures::FutureExt;
use sim_agents::{
    services, Agent, AgentContext, AgentError, AgentId, AsyncResult, HandlerResult, HandlerTable,
    Params, Value,
};
use sim_graph::NodeId;

use crate::manager::{create_request, created_id};

/// A node to be built by the manager.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSpec {
    pub kind: String,
    pub params: Params,
}

impl NodeSpec {
    pub fn new(kind: impl Into<String>, params: Params) -> Self {
        Self {
            kind: kind.into(),
            params,
        }
    }
}

/// Per-tick selection hooks.
///
/// The graph may be read or sampled from the context but not mutated: nodes
/// and edges only change through the manager and the nodes themselves.
pub trait ActivationPolicy {
    fn nodes_to_destroy(&mut self, _ctx: &AgentContext, _tick: u64) -> Vec<NodeId> {
        Vec::new()
    }

    fn nodes_to_create(&mut self, _ctx: &AgentContext, _tick: u64) -> Vec<NodeSpec> {
        Vec::new()
    }

    /// Defaults to one node drawn uniformly at random.
    fn nodes_to_activate(
        &mut self,
        ctx: &AgentContext,
        _tick: u64,
        _created: &[NodeId],
    ) -> Vec<NodeId> {
        ctx.graph_mut().random_node().into_iter().collect()
    }
}

/// Activates one random node per tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomActivation;

impl ActivationPolicy for RandomActivation {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActivationMode {
    /// Destructions and activations are fired without waiting.
    #[default]
    Async,
    /// Every request is awaited before the next one is sent.
    Sync,
}

/// Totals over the whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActivatorStats {
    pub ticks: u64,
    /// Destroys the manager has confirmed.
    pub destroyed: u64,
    pub created: u64,
    pub activated: u64,
}

pub struct Activator {
    policy: Box<dyn ActivationPolicy>,
    mode: ActivationMode,
    stats: ActivatorStats,
    /// Unanswered destroy requests of async mode.
    pending_destroys: Vec<(NodeId, AsyncResult)>,
}

impl Activator {
    pub fn new(policy: impl ActivationPolicy + 'static, mode: ActivationMode) -> Self {
        Self {
            policy: Box::new(policy),
            mode,
            stats: ActivatorStats::default(),
            pending_destroys: Vec::new(),
        }
    }

    pub fn id() -> AgentId {
        AgentId::service(services::ACTIVATOR)
    }

    pub fn mode(&self) -> ActivationMode {
        self.mode
    }

    pub fn stats(&self) -> ActivatorStats {
        self.stats
    }

    async fn destroy_nodes(&mut self, ctx: &AgentContext, tick: u64) {
        let doomed = self.policy.nodes_to_destroy(ctx, tick);
        for id in doomed {
            let pending = ctx.send(
                AgentId::service(services::MANAGER),
                "destroy_node",
                Params::new().with("id", id),
            );
            match self.mode {
                ActivationMode::Sync => {
                    let outcome = pending.get().await;
                    self.record_destroy(ctx, id, outcome);
                }
                ActivationMode::Async => self.pending_destroys.push((id, pending)),
            }
        }
    }

    fn record_destroy(&mut self, ctx: &AgentContext, id: NodeId, outcome: Result<Value, AgentError>) {
        match outcome {
            Ok(_) => self.stats.destroyed += 1,
            Err(err) => ctx.error(format!("destroying node {id} failed: {err}")),
        }
    }

    /// Counts the async destroys answered so far, without waiting.
    fn reap_destroys(&mut self, ctx: &AgentContext) {
        let mut waiting = Vec::new();
        for (id, pending) in std::mem::take(&mut self.pending_destroys) {
            match pending.try_get() {
                Some(outcome) => self.record_destroy(ctx, id, outcome),
                None => waiting.push((id, pending)),
            }
        }
        self.pending_destroys = waiting;
    }

    /// Waits for every outstanding async destroy.
    async fn settle_destroys(&mut self, ctx: &AgentContext) {
        for (id, pending) in std::mem::take(&mut self.pending_destroys) {
            let outcome = pending.get().await;
            self.record_destroy(ctx, id, outcome);
        }
    }

    /// Always awaited, since activation may target the new ids.
    async fn create_nodes(&mut self, ctx: &AgentContext, tick: u64) -> Vec<NodeId> {
        let specs = self.policy.nodes_to_create(ctx, tick);
        let mut created = Vec::with_capacity(specs.len());
        for spec in specs {
            let reply = ctx
                .sync_send(
                    AgentId::service(services::MANAGER),
                    "create_node",
                    create_request(&spec.kind, spec.params),
                )
                .await
                .and_then(created_id);
            match reply {
                Ok(id) => created.push(id),
                Err(err) => ctx.error(format!("creating a '{}' node failed: {err}", spec.kind)),
            }
        }
        self.stats.created += created.len() as u64;
        created
    }

    async fn activate_nodes(&mut self, ctx: &AgentContext, tick: u64, created: &[NodeId]) {
        let targets = self.policy.nodes_to_activate(ctx, tick, created);
        let params = Params::new().with("tick", tick);
        match self.mode {
            ActivationMode::Async => {
                let count = targets.len();
                ctx.send_all(targets.into_iter().map(AgentId::Node), "activate", params, &[]);
                self.stats.activated += count as u64;
            }
            ActivationMode::Sync => {
                for id in targets {
                    match ctx.sync_send(AgentId::Node(id), "activate", params.clone()).await {
                        Ok(_) => self.stats.activated += 1,
                        Err(err) => ctx.error(format!("activating node {id} failed: {err}")),
                    }
                }
            }
        }
    }
}

impl fmt::Debug for Activator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Activator")
            .field("mode", &self.mode)
            .field("stats", &self.stats)
            .finish()
    }
}

fn tick<'a>(
    activator: &'a mut Activator,
    ctx: &'a AgentContext,
    params: Params,
) -> LocalBoxFuture<'a, HandlerResult> {
    async move {
        let tick = params
            .get("tick")
            .and_then(Value::as_int)
            .and_then(|t| u64::try_from(t).ok())
            .unwrap_or(activator.stats.ticks);
        activator.reap_destroys(ctx);
        activator.destroy_nodes(ctx, tick).await;
        let created = activator.create_nodes(ctx, tick).await;
        activator.activate_nodes(ctx, tick, &created).await;
        activator.stats.ticks += 1;
        Ok(Value::from(created))
    }
    .boxed_local()
}

fn simulation_ended<'a>(
    activator: &'a mut Activator,
    ctx: &'a AgentContext,
    params: Params,
) -> LocalBoxFuture<'a, HandlerResult> {
    async move {
        activator.settle_destroys(ctx).await;
        ctx.sync_send(
            AgentId::service(services::MANAGER),
            "simulation_ended",
            params,
        )
        .await
    }
    .boxed_local()
}

/// Forwards to the termination checker and waits for the acknowledgement.
fn signal_termination<'a>(
    _activator: &'a mut Activator,
    ctx: &'a AgentContext,
    params: Params,
) -> LocalBoxFuture<'a, HandlerResult> {
    async move {
        ctx.sync_send(
            AgentId::service(services::TERMINATION_CHECKER),
            "signal_termination",
            params,
        )
        .await
    }
    .boxed_local()
}

fn statistics<'a>(
    activator: &'a mut Activator,
    ctx: &'a AgentContext,
    _params: Params,
) -> LocalBoxFuture<'a, HandlerResult> {
    async move {
        activator.settle_destroys(ctx).await;
        let stats = activator.stats;
        Ok(Value::from(
            Params::new()
                .with("ticks", stats.ticks)
                .with("destroyed", stats.destroyed)
                .with("created", stats.created)
                .with("activated", stats.activated),
        ))
    }
    .boxed_local()
}

impl Agent for Activator {
    const KIND: &'static str = "activator";

    fn handlers() -> HandlerTable<Self> {
        HandlerTable::new()
            .on("tick", tick)
            .on("simulation_ended", simulation_ended)
            .on("signal_termination", signal_termination)
            .on("statistics", statistics)
    }
}

/// Builds the activation mode from the `sync_activator` flag.
pub fn mode_from(params: &Params) -> Result<ActivationMode, AgentError> {
    Ok(if params.bool_or("sync_activator", false)? {
        ActivationMode::Sync
    } else {
        ActivationMode::Async
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::NodeManager;
    use crate::models::BasicNode;
    use sim_agents::{run_local, AgentStore, BincodeSerializer, Runtime, RuntimeOptions};
    use sim_graph::{Graph, SharedGraph, SparseGraph};

    /// Destroys a live node and one that never existed on the first tick.
    struct DestroyTwice;

    impl ActivationPolicy for DestroyTwice {
        fn nodes_to_destroy(&mut self, _ctx: &AgentContext, tick: u64) -> Vec<NodeId> {
            if tick == 0 {
                vec![1, 42]
            } else {
                Vec::new()
            }
        }

        fn nodes_to_activate(&mut self, _: &AgentContext, _: u64, _: &[NodeId]) -> Vec<NodeId> {
            Vec::new()
        }
    }

    fn runtime() -> Runtime {
        let mut graph = SparseGraph::undirected(1);
        graph.add_nodes(3).unwrap();
        Runtime::new(
            SharedGraph::new(graph),
            AgentStore::new(Box::new(BincodeSerializer)),
            RuntimeOptions::default(),
        )
    }

    #[test]
    fn test_only_confirmed_destroys_are_counted() {
        for mode in [ActivationMode::Sync, ActivationMode::Async] {
            run_local(async {
                let runtime = runtime();
                runtime.register_node_kind::<BasicNode>();
                runtime.spawn(NodeManager::id(), NodeManager::new()).unwrap();
                runtime
                    .spawn(Activator::id(), Activator::new(DestroyTwice, mode))
                    .unwrap();
                let driver = runtime.context("driver");
                for tick in 0..2 {
                    driver
                        .sync_send(Activator::id(), "tick", Params::new().with("tick", tick))
                        .await
                        .unwrap();
                }

                let stats = driver
                    .sync_send(Activator::id(), "statistics", Params::new())
                    .await
                    .unwrap();
                let stats = stats.as_map().unwrap();
                assert_eq!(stats.get("destroyed"), Some(&Value::Int(1)), "{mode:?}");
                assert_eq!(stats.get("ticks"), Some(&Value::Int(2)));
                assert_eq!(runtime.graph().with(|g| g.nodes()), vec![0, 2]);
            });
        }
    }

    #[test]
    fn test_mode_from_flag() {
        assert_eq!(mode_from(&Params::new()).unwrap(), ActivationMode::Async);
        assert_eq!(
            mode_from(&Params::new().with("sync_activator", true)).unwrap(),
            ActivationMode::Sync
        );
    }
}
