//! Graph substrate for agent-based network simulations.
//!
//! This crate contains the evolving network and nothing else: dense id
//! allocation, storage back-ends, random sampling, and seed generators. It
//! has no notion of agents or time.
//!
//! # Modules
//!
//! - [`ids`]: Dense identifier allocation with hole recycling
//! - [`backend`]: Storage contract and raw representations
//! - [`sparse`] / [`dense`]: Hash-of-sets and boolean-matrix back-ends
//! - [`selector`]: Uniform and preferential-attachment sampling
//! - [`network`]: The [`Graph`] trait and the [`Network`] that implements it
//! - [`shared`]: Scoped single-threaded sharing
//! - [`generators`]: Seed topologies
//! - [`stats`]: Summary statistics

pub mod backend;
pub mod dense;
pub mod error;
pub mod generators;
pub mod ids;
pub mod network;
pub mod selector;
pub mod shared;
pub mod sparse;
pub mod stats;

pub use backend::{Backend, RawGraph};
pub use dense::AdjacencyMatrix;
pub use error::{GraphError, IdError};
pub use ids::{IdentifierStore, NodeId};
pub use network::{DenseGraph, Graph, Network, SparseGraph};
pub use selector::{AttachmentStrategy, RandomSelector};
pub use shared::{DynGraph, SharedGraph};
pub use sparse::AdjacencySets;
pub use stats::{degree_histogram, GraphStats};
