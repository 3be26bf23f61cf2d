//! Driver-level error types.

use std::path::PathBuf;

use sim_agents::AgentError;
use sim_graph::GraphError;
use thiserror::Error;

/// Problems with options, parameters, or the configuration file.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("option '{0}' is declared more than once")]
    DuplicateOption(String),
    #[error("missing required parameter '{0}'")]
    MissingParameter(String),
    #[error("malformed option '{name}': {reason}")]
    MalformedOption { name: String, reason: String },
    #[error("invalid value for '{name}': {reason}")]
    InvalidValue { name: String, reason: String },
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error(transparent)]
    Cli(#[from] clap::Error),
}

/// Problems building a component from the parameter map.
#[derive(Debug, Error)]
pub enum ComponentError {
    #[error("no factory for component '{0}'")]
    FactoryMissing(String),
    #[error("component '{component}' needs parameter '{parameter}'")]
    MissingParameter { component: String, parameter: String },
    #[error("component '{component}': parameter '{parameter}' must be a {expected}")]
    InvalidParameter {
        component: String,
        parameter: String,
        expected: &'static str,
    },
    #[error("component '{component}' rejected its parameters: {reason}")]
    Rejected { component: String, reason: String },
    #[error("node kind '{kind}' has no handler for {missing:?}")]
    MissingHandler { kind: String, missing: Vec<String> },
    #[error("node kind '{0}' is not registered")]
    UnknownKind(String),
}

impl ComponentError {
    /// Attributes a parameter lookup failure to `component`.
    pub fn from_agent(component: &str, error: AgentError) -> Self {
        match error {
            AgentError::MissingParameter(parameter) => ComponentError::MissingParameter {
                component: component.to_string(),
                parameter,
            },
            AgentError::InvalidParameter { name, expected } => ComponentError::InvalidParameter {
                component: component.to_string(),
                parameter: name,
                expected,
            },
            AgentError::UnknownKind(kind) => ComponentError::UnknownKind(kind),
            other => ComponentError::Rejected {
                component: component.to_string(),
                reason: other.to_string(),
            },
        }
    }
}

/// Any failure of [`Simulation`](crate::Simulation).
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Component(#[from] ComponentError),
    #[error(transparent)]
    Agent(#[from] AgentError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("runtime error: {0}")]
    Io(#[from] std::io::Error),
}

impl SimulationError {
    /// Process exit status for this failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            SimulationError::Configuration(_) | SimulationError::Component(_) => 2,
            _ => 1,
        }
    }
}
