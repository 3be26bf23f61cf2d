//! Agent Context
//!
//! The execution context handed to every handler: identity, messaging
//! primitives, suspension points, and access to the shared graph.

use std::cell::{Cell, Ref, RefMut};
use std::fmt;
use std::time::Duration;

use rand::rngs::SmallRng;
use sim_graph::{DynGraph, NodeId, SharedGraph};

use crate::error::{AgentError, HandlerResult};
use crate::id::{services, AgentId};
use crate::result::{AsyncResult, SequenceAsyncResult};
use crate::runtime::Runtime;
use crate::timestamp::RelativeTime;
use crate::value::{Params, Value};

/// Per-recipient parameter computed from the recipient id during a
/// broadcast.
pub struct Projector {
    key: String,
    project: Box<dyn Fn(&AgentId) -> Value>,
}

impl Projector {
    pub fn new(key: impl Into<String>, project: impl Fn(&AgentId) -> Value + 'static) -> Self {
        Self {
            key: key.into(),
            project: Box::new(project),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Debug for Projector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Projector").field("key", &self.key).finish()
    }
}

/// Handle through which an agent acts on the simulation.
pub struct AgentContext {
    id: AgentId,
    runtime: Runtime,
    killed: Cell<bool>,
}

impl AgentContext {
    pub(crate) fn new(id: AgentId, runtime: Runtime) -> Self {
        Self {
            id,
            runtime,
            killed: Cell::new(false),
        }
    }

    pub fn id(&self) -> &AgentId {
        &self.id
    }

    /// The graph node this agent lives on, if it is a node agent.
    pub fn node_id(&self) -> Option<NodeId> {
        self.id.node_id()
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Enqueues a request and returns its reply cell without waiting.
    ///
    /// An unknown receiver does not fail here: the returned result already
    /// holds the addressing error.
    pub fn send(&self, to: impl Into<AgentId>, payload: &str, params: Params) -> AsyncResult {
        self.runtime.deliver(&self.id, &to.into(), payload, params)
    }

    /// Sends and waits for the reply.
    pub async fn sync_send(
        &self,
        to: impl Into<AgentId>,
        payload: &str,
        params: Params,
    ) -> HandlerResult {
        self.send(to, payload, params).get().await
    }

    /// Sends the same request to every id, in iteration order.
    ///
    /// Each projector adds one parameter computed from the recipient id.
    pub fn send_all(
        &self,
        ids: impl IntoIterator<Item = AgentId>,
        payload: &str,
        params: Params,
        projectors: &[Projector],
    ) -> SequenceAsyncResult {
        let results = ids
            .into_iter()
            .map(|to| {
                let mut params = params.clone();
                for projector in projectors {
                    params.insert(projector.key.clone(), (projector.project)(&to));
                }
                self.runtime.deliver(&self.id, &to, payload, params)
            })
            .collect();
        SequenceAsyncResult::new(results)
    }

    /// Broadcasts and waits for every reply, failing on the first error.
    pub async fn sync_send_all(
        &self,
        ids: impl IntoIterator<Item = AgentId>,
        payload: &str,
        params: Params,
        projectors: &[Projector],
    ) -> Result<Vec<Value>, AgentError> {
        self.send_all(ids, payload, params, projectors).get().await
    }

    /// Lets other agents run.
    pub async fn cooperate(&self) {
        tokio::task::yield_now().await;
    }

    /// Suspends for at least `duration` of wall time.
    pub async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    /// Stops the agent once the current handler returns. Queued messages are
    /// dropped and their senders observe a shutdown error.
    pub fn kill(&self) {
        self.killed.set(true);
    }

    pub fn is_killed(&self) -> bool {
        self.killed.get()
    }

    /// Shared borrow of the graph. Do not hold it across a suspension point.
    pub fn graph(&self) -> Ref<'_, DynGraph> {
        self.runtime.graph().handle()
    }

    /// Exclusive borrow of the graph. Do not hold it across a suspension
    /// point.
    pub fn graph_mut(&self) -> RefMut<'_, DynGraph> {
        self.runtime.graph().handle_mut()
    }

    pub fn shared_graph(&self) -> &SharedGraph {
        self.runtime.graph()
    }

    /// Runs `func` with the simulation random generator.
    pub fn with_rng<R>(&self, func: impl FnOnce(&mut SmallRng) -> R) -> R {
        self.runtime.with_rng(func)
    }

    pub fn now(&self) -> RelativeTime {
        self.runtime.now()
    }

    /// Writes a line to the simulation log. The timestamp is taken now, not
    /// when the logger gets around to writing it.
    pub fn log(&self, message: impl Into<String>) {
        let message = message.into();
        let logger = AgentId::service(services::LOGGER);
        if !self.runtime.is_registered(&logger) {
            tracing::info!(agent = %self.id, "{message}");
            return;
        }
        self.send(
            logger,
            "log_entry",
            Params::new()
                .with("sender", self.id.clone())
                .with("message", message)
                .with("when", self.now()),
        );
    }

    /// Writes an error record to the simulation log.
    pub fn error(&self, text: impl Into<String>) {
        let text = text.into();
        let logger = AgentId::service(services::LOGGER);
        if !self.runtime.is_registered(&logger) {
            tracing::error!(agent = %self.id, "{text}");
            return;
        }
        self.send(
            logger,
            "error_message",
            Params::new()
                .with("sender", self.id.clone())
                .with("text", text),
        );
    }
}

impl fmt::Debug for AgentContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentContext")
            .field("id", &self.id)
            .field("killed", &self.killed.get())
            .finish()
    }
}
