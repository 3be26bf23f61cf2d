//! Cooperative agent kernel for graph simulations.
//!
//! Each agent owns a mailbox and runs as a single local task; agents talk
//! only through messages whose replies arrive in [`AsyncResult`]s. Idle
//! agents may be evicted into an [`AgentStore`] and come back transparently
//! on the next message addressed to them.
//!
//! # Example
//!
//! ```
//! use futures::future::LocalBoxFuture;
//! use futures::FutureExt;
//! use sim_agents::{
//!     run_local, Agent, AgentContext, AgentId, AgentStore, BincodeSerializer, HandlerResult,
//!     HandlerTable, Params, Runtime, RuntimeOptions, Value,
//! };
//! use sim_graph::{SharedGraph, SparseGraph};
//!
//! struct Counter(i64);
//!
//! fn bump<'a>(c: &'a mut Counter, _: &'a AgentContext, p: Params) -> LocalBoxFuture<'a, HandlerResult> {
//!     async move {
//!         c.0 += p.int_or("by", 1)?;
//!         Ok(Value::Int(c.0))
//!     }
//!     .boxed_local()
//! }
//!
//! impl Agent for Counter {
//!     const KIND: &'static str = "counter";
//!     fn handlers() -> HandlerTable<Self> {
//!         HandlerTable::new().on("bump", bump)
//!     }
//! }
//!
//! let total = run_local(async {
//!     let runtime = Runtime::new(
//!         SharedGraph::new(SparseGraph::undirected(0)),
//!         AgentStore::new(Box::new(BincodeSerializer)),
//!         RuntimeOptions::default(),
//!     );
//!     runtime.spawn(AgentId::service("counter"), Counter(0)).unwrap();
//!     let driver = runtime.context("driver");
//!     driver.send("counter", "bump", Params::new());
//!     driver.sync_send("counter", "bump", Params::new().with("by", 4)).await
//! });
//! assert_eq!(total, Ok(Value::Int(5)));
//! ```

pub mod address_book;
pub mod agent;
pub mod context;
pub mod error;
pub mod id;
pub mod logger;
pub mod mailbox;
pub mod message;
pub mod result;
pub mod runtime;
pub mod serializer;
pub mod store;
pub mod timestamp;
pub mod value;

pub use address_book::{AddressBook, SimulationAddressBook};
pub use agent::{Agent, Handler, HandlerTable, NodeAgent, KILL};
pub use context::{AgentContext, Projector};
pub use error::{AddressingError, AgentError, HandlerResult, SerializationError};
pub use id::{services, AgentId};
pub use logger::{LogSink, Logger, SharedBuffer};
pub use mailbox::{Endpoint, Mailbox};
pub use message::{Envelope, Message, Responder};
pub use result::{AsyncResult, SequenceAsyncResult};
pub use runtime::{
    run_local, try_run_local, AgentHandle, Exit, ExitReason, Runtime, RuntimeOptions,
    RuntimeStats, DEFAULT_POLL_INTERVAL,
};
pub use serializer::{serializer_by_name, BincodeSerializer, JsonSerializer, Serializer};
pub use store::{AgentRecord, AgentStore};
pub use timestamp::{ParseTimeError, RelativeTime};
pub use value::{Params, Value};
