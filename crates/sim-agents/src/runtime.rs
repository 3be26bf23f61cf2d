//! Cooperative Runtime
//!
//! Every agent runs as one local task on a single-threaded tokio runtime.
//! Tasks only yield at explicit suspension points, so a handler owns the
//! thread (and may touch the shared graph freely) between awaits.
//!
//! The [`Runtime`] value is threaded through every context. It holds the
//! address book, the store of evicted agents, the node kinds that can be
//! created or rehydrated, the shared graph, and the simulation random
//! generator.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::rc::Rc;
use std::time::Duration;

use futures::FutureExt;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use sim_graph::{NodeId, SharedGraph};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::address_book::SimulationAddressBook;
use crate::agent::{Agent, HandlerTable, NodeAgent, KILL};
use crate::context::AgentContext;
use crate::error::{AgentError, HandlerResult};
use crate::id::AgentId;
use crate::mailbox::{Endpoint, Mailbox};
use crate::message::{Envelope, Message};
use crate::result::AsyncResult;
use crate::store::{AgentRecord, AgentStore};
use crate::timestamp::RelativeTime;
use crate::value::{Params, Value};

/// Default idle time after which a collectable agent is evicted.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Runs `future` to completion on a fresh current-thread runtime with a
/// [`LocalSet`](tokio::task::LocalSet), so agents can be spawned.
pub fn try_run_local<F: Future>(future: F) -> std::io::Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(tokio::task::LocalSet::new().block_on(&runtime, future))
}

/// Like [`try_run_local`].
///
/// # Panics
///
/// Panics if the tokio runtime cannot be built.
pub fn run_local<F: Future>(future: F) -> F::Output {
    try_run_local(future).expect("failed to build the tokio runtime")
}

/// Knobs of a [`Runtime`].
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    /// Seed of the generator shared by agents.
    pub seed: u64,
    pub poll_interval: Duration,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            seed: 42,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Why an agent task stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The agent killed itself or received `kill`.
    Killed,
    /// The agent was idle and moved to the store.
    Evicted,
    /// The mailbox was closed from outside, as at shutdown.
    Closed,
}

/// Final state of an agent task.
#[derive(Debug)]
pub struct Exit<A> {
    pub agent: A,
    pub reason: ExitReason,
}

/// Join handle of a spawned agent.
#[derive(Debug)]
pub struct AgentHandle<A> {
    id: AgentId,
    join: JoinHandle<Exit<A>>,
}

impl<A> AgentHandle<A> {
    pub fn id(&self) -> &AgentId {
        &self.id
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Waits for the task and hands back the agent state.
    pub async fn join(self) -> Result<Exit<A>, AgentError> {
        let id = self.id;
        self.join.await.map_err(|e| {
            if e.is_cancelled() {
                AgentError::Shutdown
            } else {
                AgentError::handler(format!("{id} stopped abnormally: {e}"))
            }
        })
    }
}

/// Counters kept by the runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeStats {
    pub spawned: usize,
    pub evictions: usize,
    pub rehydrations: usize,
    pub stored: usize,
}

type CreateFn = fn(&Runtime, NodeId, &Params) -> Result<(), AgentError>;
type RestoreFn = fn(&Runtime, &AgentRecord) -> Result<(), AgentError>;

struct NodeKind {
    create: CreateFn,
    restore: RestoreFn,
    handlers: Vec<&'static str>,
}

fn spawn_created<A: NodeAgent>(
    runtime: &Runtime,
    id: NodeId,
    params: &Params,
) -> Result<(), AgentError> {
    let agent = A::create(id, params)?;
    runtime.spawn(AgentId::Node(id), agent)?;
    Ok(())
}

fn spawn_restored<A: NodeAgent>(runtime: &Runtime, record: &AgentRecord) -> Result<(), AgentError> {
    let agent = A::restore(record)?;
    runtime.spawn(record.id.clone(), agent)?;
    Ok(())
}

struct RuntimeInner {
    book: RefCell<SimulationAddressBook>,
    store: RefCell<AgentStore>,
    kinds: RefCell<HashMap<&'static str, NodeKind>>,
    graph: SharedGraph,
    rng: RefCell<SmallRng>,
    started: Instant,
    poll_interval: Duration,
    spawned: Cell<usize>,
    evictions: Cell<usize>,
    rehydrations: Cell<usize>,
}

/// Shared state of one simulation. Cloning is cheap.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl Runtime {
    pub fn new(graph: SharedGraph, store: AgentStore, options: RuntimeOptions) -> Self {
        Self {
            inner: Rc::new(RuntimeInner {
                book: RefCell::new(SimulationAddressBook::new()),
                store: RefCell::new(store),
                kinds: RefCell::new(HashMap::new()),
                graph,
                rng: RefCell::new(SmallRng::seed_from_u64(options.seed)),
                started: Instant::now(),
                poll_interval: options.poll_interval,
                spawned: Cell::new(0),
                evictions: Cell::new(0),
                rehydrations: Cell::new(0),
            }),
        }
    }

    pub fn graph(&self) -> &SharedGraph {
        &self.inner.graph
    }

    pub fn with_rng<R>(&self, func: impl FnOnce(&mut SmallRng) -> R) -> R {
        func(&mut self.inner.rng.borrow_mut())
    }

    /// Wall time since the runtime was built.
    pub fn elapsed(&self) -> Duration {
        self.inner.started.elapsed()
    }

    pub fn now(&self) -> RelativeTime {
        RelativeTime::from(self.elapsed())
    }

    pub fn poll_interval(&self) -> Duration {
        self.inner.poll_interval
    }

    /// Makes `A` available to [`Runtime::create_node`] and to rehydration.
    pub fn register_node_kind<A: NodeAgent>(&self) {
        let kind = NodeKind {
            create: spawn_created::<A>,
            restore: spawn_restored::<A>,
            handlers: A::handlers().names(),
        };
        self.inner.kinds.borrow_mut().insert(A::KIND, kind);
    }

    pub fn node_kinds(&self) -> Vec<&'static str> {
        let mut kinds: Vec<_> = self.inner.kinds.borrow().keys().copied().collect();
        kinds.sort_unstable();
        kinds
    }

    /// Payloads the kind handles, if registered.
    pub fn handlers_of(&self, kind: &str) -> Option<Vec<&'static str>> {
        self.inner
            .kinds
            .borrow()
            .get(kind)
            .map(|entry| entry.handlers.clone())
    }

    /// Builds a node agent of a registered kind and starts it under `id`.
    pub fn create_node(&self, kind: &str, id: NodeId, params: &Params) -> Result<(), AgentError> {
        let create = self
            .inner
            .kinds
            .borrow()
            .get(kind)
            .map(|entry| entry.create)
            .ok_or_else(|| AgentError::UnknownKind(kind.to_string()))?;
        create(self, id, params)
    }

    /// Starts an agent task and binds `id` to its mailbox.
    ///
    /// Must be called from inside a [`LocalSet`](tokio::task::LocalSet),
    /// e.g. under [`run_local`].
    pub fn spawn<A: Agent>(&self, id: AgentId, agent: A) -> Result<AgentHandle<A>, AgentError> {
        let mailbox = Mailbox::new(id.clone());
        self.inner
            .book
            .borrow_mut()
            .register(&id, mailbox.endpoint())?;
        let context = AgentContext::new(id.clone(), self.clone());
        let join = tokio::task::spawn_local(dispatch(agent, context, mailbox));
        self.inner.spawned.set(self.inner.spawned.get() + 1);
        tracing::debug!(agent = %id, kind = A::KIND, "spawned");
        Ok(AgentHandle { id, join })
    }

    /// A context not bound to any mailbox, for code driving the simulation
    /// from outside an agent.
    pub fn context(&self, id: impl Into<AgentId>) -> AgentContext {
        AgentContext::new(id.into(), self.clone())
    }

    /// Live endpoint of `id`, rehydrating it from the store if it was
    /// evicted.
    pub fn resolve(&self, id: &AgentId) -> Result<Endpoint, AgentError> {
        let lookup = self.inner.book.borrow().resolve(id);
        match lookup {
            Ok(endpoint) => Ok(endpoint),
            Err(err) => {
                if !self.inner.store.borrow().contains(id) {
                    return Err(err.into());
                }
                self.rehydrate(id)?;
                Ok(self.inner.book.borrow().resolve(id)?)
            }
        }
    }

    fn rehydrate(&self, id: &AgentId) -> Result<(), AgentError> {
        let record = self.inner.store.borrow().recover(id)?;
        let restore = self
            .inner
            .kinds
            .borrow()
            .get(record.kind.as_str())
            .map(|entry| entry.restore)
            .ok_or_else(|| AgentError::UnknownKind(record.kind.clone()))?;
        restore(self, &record)?;
        self.inner.store.borrow_mut().remove(id);
        self.inner
            .rehydrations
            .set(self.inner.rehydrations.get() + 1);
        tracing::debug!(agent = %id, kind = %record.kind, "rehydrated");
        Ok(())
    }

    /// Whether `id` has a live mailbox. Does not rehydrate.
    pub fn is_registered(&self, id: &AgentId) -> bool {
        self.inner.book.borrow().contains(id)
    }

    /// Whether `id` is dormant in the store.
    pub fn is_stored(&self, id: &AgentId) -> bool {
        self.inner.store.borrow().contains(id)
    }

    /// Live node agents, ascending. Evicted nodes are not included.
    pub fn live_nodes(&self) -> Vec<NodeId> {
        self.inner.book.borrow().live_nodes()
    }

    /// Drops the stored state of `id`. Returns whether there was any.
    pub fn forget(&self, id: &AgentId) -> bool {
        self.inner.store.borrow_mut().remove(id)
    }

    pub fn stats(&self) -> RuntimeStats {
        RuntimeStats {
            spawned: self.inner.spawned.get(),
            evictions: self.inner.evictions.get(),
            rehydrations: self.inner.rehydrations.get(),
            stored: self.inner.store.borrow().len(),
        }
    }

    /// Closes every live mailbox. Pending requests resolve to
    /// [`AgentError::Shutdown`] and idle tasks exit. Returns how many queued
    /// messages were dropped.
    pub fn shutdown(&self) -> usize {
        let endpoints = self.inner.book.borrow().endpoints();
        endpoints.iter().map(Endpoint::close).sum()
    }

    pub(crate) fn deliver(
        &self,
        sender: &AgentId,
        to: &AgentId,
        payload: &str,
        params: Params,
    ) -> AsyncResult {
        let endpoint = match self.resolve(to) {
            Ok(endpoint) => endpoint,
            Err(err) => return AsyncResult::failed(err),
        };
        let message = Message::new(sender.clone(), payload, params);
        let (envelope, result) = Envelope::new(message, self.elapsed());
        if let Err(rejected) = endpoint.deliver(envelope) {
            rejected
                .responder
                .complete(Err(crate::error::AddressingError::NotFound(to.clone()).into()));
        }
        result
    }

    /// Unbinds `id` if it is still bound to `mailbox`, then closes it.
    fn release(&self, id: &AgentId, mailbox: &Mailbox) {
        {
            let mut book = self.inner.book.borrow_mut();
            let ours = book
                .resolve(id)
                .map(|bound| bound.same_mailbox(&mailbox.endpoint()))
                .unwrap_or(false);
            if ours {
                book.unregister(id);
            }
        }
        mailbox.close();
    }

    fn evict<A: Agent>(
        &self,
        context: &AgentContext,
        agent: &A,
        mailbox: &Mailbox,
    ) -> Result<(), AgentError> {
        let record = agent.save(AgentRecord::new(context.id().clone(), A::KIND))?;
        self.inner.store.borrow_mut().store(&record)?;
        self.release(context.id(), mailbox);
        self.inner.evictions.set(self.inner.evictions.get() + 1);
        tracing::debug!(agent = %context.id(), "evicted");
        Ok(())
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("stats", &self.stats())
            .field("kinds", &self.node_kinds())
            .finish()
    }
}

/// The per-agent loop: read, dispatch, reply, yield.
async fn dispatch<A: Agent>(mut agent: A, context: AgentContext, mailbox: Mailbox) -> Exit<A> {
    let handlers = A::handlers();
    let runtime = context.runtime().clone();
    let mut may_evict = true;
    loop {
        let timeout = (may_evict && agent.can_be_collected()).then(|| runtime.poll_interval());
        let envelope = match mailbox.read(timeout).await {
            Ok(envelope) => envelope,
            Err(_) if mailbox.is_closed() => {
                return Exit {
                    agent,
                    reason: ExitReason::Closed,
                }
            }
            Err(_) => match runtime.evict(&context, &agent, &mailbox) {
                Ok(()) => {
                    return Exit {
                        agent,
                        reason: ExitReason::Evicted,
                    }
                }
                Err(err) => {
                    // stays live; retried after the next message
                    may_evict = false;
                    tracing::warn!(agent = %context.id(), "eviction failed: {err}");
                    context.error(format!(
                        "eviction failed: {err}\nmailbox: {:?}",
                        mailbox.snapshot()
                    ));
                    continue;
                }
            },
        };

        let Envelope {
            message, responder, ..
        } = envelope;
        let outcome = invoke(&mut agent, &context, &handlers, message).await;
        responder.complete(outcome);
        may_evict = true;

        if context.is_killed() {
            let dropped = mailbox.snapshot();
            if !dropped.is_empty() {
                tracing::debug!(agent = %context.id(), ?dropped, "killed with queued messages");
            }
            runtime.release(context.id(), &mailbox);
            return Exit {
                agent,
                reason: ExitReason::Killed,
            };
        }
        tokio::task::yield_now().await;
    }
}

async fn invoke<A: Agent>(
    agent: &mut A,
    context: &AgentContext,
    handlers: &HandlerTable<A>,
    message: Message,
) -> HandlerResult {
    let Some(handler) = handlers.get(&message.payload) else {
        if message.payload == KILL {
            context.kill();
            return Ok(Value::Null);
        }
        return agent.unsupported_message(context, &message);
    };
    let Message {
        payload, parameters, ..
    } = message;
    match AssertUnwindSafe(handler(agent, context, parameters))
        .catch_unwind()
        .await
    {
        Ok(outcome) => outcome,
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            tracing::warn!(agent = %context.id(), payload = %payload, "handler panicked: {message}");
            Err(AgentError::HandlerPanicked { payload, message })
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(text) = panic.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = panic.downcast_ref::<String>() {
        text.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serializer::BincodeSerializer;
    use sim_graph::SparseGraph;

    fn runtime() -> Runtime {
        Runtime::new(
            SharedGraph::new(SparseGraph::undirected(1)),
            AgentStore::new(Box::new(BincodeSerializer)),
            RuntimeOptions::default(),
        )
    }

    #[test]
    fn test_unknown_receiver_fails_lazily() {
        run_local(async {
            let runtime = runtime();
            let driver = runtime.context("driver");
            let result = driver.send(AgentId::Node(99), "activate", Params::new());
            assert!(result.ready());
            let err = result.get().await.unwrap_err();
            assert!(err.is_addressing(), "unexpected error: {err}");
        });
    }

    #[test]
    fn test_create_unknown_kind() {
        run_local(async {
            let runtime = runtime();
            assert_eq!(
                runtime.create_node("missing", 0, &Params::new()),
                Err(AgentError::UnknownKind("missing".into()))
            );
        });
    }

    #[test]
    fn test_panic_message_extraction() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");
        let boxed: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(boxed.as_ref()), "non-string panic payload");
    }
}
