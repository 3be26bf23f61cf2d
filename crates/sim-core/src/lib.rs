//! Simulation control plane.
//!
//! The service agents that drive a run (node manager, clock, activator,
//! termination checker, configurator), the parameter and option layers they
//! are configured from, and the [`Simulation`] driver that assembles them.
//!
//! # Modules
//!
//! - [`options`] / [`config`] / [`parameters`]: CLI options, TOML files, and
//!   their precedence
//! - [`component`]: Building a role from the parameter map
//! - [`manager`], [`clock`], [`activator`], [`termination`], [`configurator`]:
//!   Service agents
//! - [`simulation`]: The driver and its report
//! - [`models`]: Reference node kinds and the simulations built on them

pub mod activator;
pub mod clock;
pub mod component;
pub mod config;
pub mod configurator;
pub mod error;
pub mod manager;
pub mod models;
pub mod options;
pub mod parameters;
pub mod simulation;
pub mod termination;

pub use activator::{ActivationMode, ActivationPolicy, Activator, NodeSpec, RandomActivation};
pub use clock::{Clock, ClockMode};
pub use component::{ComponentBuilder, ComponentSpec};
pub use configurator::{Configurator, Population};
pub use error::{ComponentError, ConfigurationError, SimulationError};
pub use manager::NodeManager;
pub use options::{OptionKind, OptionSet, OptionSpec};
pub use parameters::{Layer, ParameterSources};
pub use simulation::{NodeKindSpec, Simulation, SimulationReport, SimulationSpec};
pub use termination::{TerminationChecker, TerminationCondition, COUNT_DOWN_MOTIVE};
