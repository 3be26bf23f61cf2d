//! Simulation Driver
//!
//! A [`SimulationSpec`] names one [`ComponentSpec`] per role plus the options
//! and node kinds the run needs. Models are built by starting from
//! [`SimulationSpec::basic`] and swapping roles or appending option layers.
//!
//! [`Simulation`] merges the parameter layers, builds every component and
//! runs the lifecycle:
//!
//! 1. spawn logger, termination checker and node manager
//! 2. run the configurator's `setup` to completion
//! 3. spawn activator and clock, send `start`
//! 4. wait for the clock to stop, then collect the report

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::Serialize;
use sim_agents::{
    serializer_by_name, services, try_run_local, Agent, AgentContext, AgentError, AgentId,
    AgentStore, LogSink, Logger, NodeAgent, Params, Runtime, RuntimeOptions, Value, KILL,
};
use sim_graph::{degree_histogram, DenseGraph, DynGraph, GraphStats, SharedGraph, SparseGraph};

use crate::activator::{mode_from, Activator, RandomActivation};
use crate::clock::Clock;
use crate::component::{ComponentBuilder, ComponentSpec};
use crate::config;
use crate::configurator::{Configurator, Population};
use crate::error::{ComponentError, ConfigurationError, SimulationError};
use crate::manager::NodeManager;
use crate::models::BasicNode;
use crate::options::{OptionSet, OptionSpec};
use crate::parameters::{Layer, ParameterSources};
use crate::termination::{TerminationChecker, TerminationCondition};

/// Payload every node kind must handle.
const ACTIVATE: &str = "activate";

/// A node kind the runtime can create and rehydrate.
#[derive(Clone)]
pub struct NodeKindSpec {
    kind: &'static str,
    handlers: Vec<&'static str>,
    register: fn(&Runtime),
}

fn register<A: NodeAgent>(runtime: &Runtime) {
    runtime.register_node_kind::<A>();
}

impl NodeKindSpec {
    pub fn of<A: NodeAgent>() -> Self {
        Self {
            kind: A::KIND,
            handlers: A::handlers().names(),
            register: register::<A>,
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn handles(&self, payload: &str) -> bool {
        payload == KILL || self.handlers.contains(&payload)
    }
}

impl fmt::Debug for NodeKindSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeKindSpec")
            .field("kind", &self.kind)
            .field("handlers", &self.handlers)
            .finish()
    }
}

/// Everything needed to assemble one kind of simulation.
#[derive(Debug, Clone)]
pub struct SimulationSpec {
    name: String,
    option_layers: Vec<Vec<OptionSpec>>,
    defaults: Params,
    node_kinds: Vec<NodeKindSpec>,
    node_parameter_keys: Vec<String>,
    pub graph: ComponentSpec<Box<DynGraph>>,
    pub logger: ComponentSpec<Logger>,
    pub termination: ComponentSpec<TerminationChecker>,
    pub configurator: ComponentSpec<Configurator>,
    pub activator: ComponentSpec<Activator>,
    pub clock: ComponentSpec<Clock>,
}

impl SimulationSpec {
    /// `--steps` ticks of random activation over a population of isolated
    /// [`BasicNode`]s.
    pub fn basic(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            option_layers: vec![OptionSet::baseline().iter().cloned().collect()],
            defaults: Params::new().with("node_kind", BasicNode::KIND),
            node_kinds: vec![NodeKindSpec::of::<BasicNode>()],
            node_parameter_keys: vec!["evictable".to_string()],
            graph: ComponentSpec::new("graph", build_graph).options([
                "graph_type",
                "max_nodes",
                "seed",
                "self_loops",
            ]),
            logger: ComponentSpec::new("logger", build_logger).options(["log_file", "quiet"]),
            termination: ComponentSpec::new("termination_checker", build_termination)
                .options(["steps"]),
            configurator: ComponentSpec::new("configurator", build_configurator).options([
                "starting_network_size",
                "node_kind",
                "node_parameters",
                "initialize_nodes",
            ]),
            activator: ComponentSpec::new("activator", |p: &Params| {
                Ok(Activator::new(RandomActivation, mode_from(p)?))
            })
            .options(["sync_activator"]),
            clock: ComponentSpec::new("clock", build_clock).options(["pipelined", "steps"]),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Appends a layer of options. Clashes surface in [`Simulation::new`].
    pub fn with_options(mut self, options: Vec<OptionSpec>) -> Self {
        self.option_layers.push(options);
        self
    }

    /// Factory defaults, above the option defaults.
    pub fn with_defaults(mut self, defaults: Params) -> Self {
        self.defaults.merge(&defaults);
        self
    }

    pub fn with_node_kind<A: NodeAgent>(mut self) -> Self {
        self.node_kinds.retain(|spec| spec.kind != A::KIND);
        self.node_kinds.push(NodeKindSpec::of::<A>());
        self
    }

    /// Parameters copied into `node_parameters` for every created node.
    pub fn with_node_parameters<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for key in keys {
            let key = key.into();
            if !self.node_parameter_keys.contains(&key) {
                self.node_parameter_keys.push(key);
            }
        }
        self
    }

    pub fn with_graph(mut self, graph: ComponentSpec<Box<DynGraph>>) -> Self {
        self.graph = graph;
        self
    }

    pub fn with_logger(mut self, logger: ComponentSpec<Logger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_termination(mut self, termination: ComponentSpec<TerminationChecker>) -> Self {
        self.termination = termination;
        self
    }

    pub fn with_configurator(mut self, configurator: ComponentSpec<Configurator>) -> Self {
        self.configurator = configurator;
        self
    }

    pub fn with_activator(mut self, activator: ComponentSpec<Activator>) -> Self {
        self.activator = activator;
        self
    }

    pub fn with_clock(mut self, clock: ComponentSpec<Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn node_kinds(&self) -> impl Iterator<Item = &NodeKindSpec> {
        self.node_kinds.iter()
    }
}

fn build_graph(params: &Params) -> Result<Box<DynGraph>, AgentError> {
    let seed = seed_of(params)?;
    let capacity = params.usize_or("max_nodes", 10_000)?;
    let self_loops = params.bool_or("self_loops", false)?;
    let graph: Box<DynGraph> = match params.str_or("graph_type", "sparse")? {
        "sparse" => Box::new(SparseGraph::undirected(seed).with_self_loops(self_loops)),
        "directed-sparse" => Box::new(SparseGraph::directed(seed).with_self_loops(self_loops)),
        "dense" => Box::new(DenseGraph::undirected(capacity, seed).with_self_loops(self_loops)),
        "directed-dense" => {
            Box::new(DenseGraph::directed(capacity, seed).with_self_loops(self_loops))
        }
        _ => {
            return Err(AgentError::InvalidParameter {
                name: "graph_type".into(),
                expected: "graph type (sparse, dense, directed-sparse, directed-dense)",
            })
        }
    };
    Ok(graph)
}

fn build_logger(params: &Params) -> Result<Logger, AgentError> {
    if params.bool_or("quiet", false)? {
        return Ok(Logger::null());
    }
    match params.get("log_file").and_then(Value::as_str) {
        Some(path) => {
            let sink = LogSink::file(path).map_err(|e| {
                AgentError::handler(format!("cannot open log file {path}: {e}"))
            })?;
            Ok(Logger::new(sink, LogSink::Stderr))
        }
        None => Ok(Logger::console()),
    }
}

fn build_termination(params: &Params) -> Result<TerminationChecker, AgentError> {
    let steps = non_negative(params, "steps", 100)?;
    Ok(TerminationChecker::new(vec![TerminationCondition::count_down(steps)]))
}

fn build_configurator(params: &Params) -> Result<Configurator, AgentError> {
    let count = params.usize_or("starting_network_size", 100)?;
    configurator_for(Population::Size { count }, params)
}

/// A configurator over `population` using the node template in `params`.
pub fn configurator_for(
    population: Population,
    params: &Params,
) -> Result<Configurator, AgentError> {
    let kind = params.str_or("node_kind", BasicNode::KIND)?;
    Ok(Configurator::new(population, kind)
        .with_node_params(node_parameters(params)?)
        .initializing(params.bool_or("initialize_nodes", false)?))
}

/// The `node_parameters` map, empty when absent.
pub fn node_parameters(params: &Params) -> Result<Params, AgentError> {
    match params.get("node_parameters") {
        Some(Value::Null) | None => Ok(Params::new()),
        Some(_) => params.params("node_parameters"),
    }
}

fn build_clock(params: &Params) -> Result<Clock, AgentError> {
    if params.bool_or("pipelined", false)? {
        Ok(Clock::pipelined(non_negative(params, "steps", 100)?))
    } else {
        Ok(Clock::synchronous())
    }
}

/// Reads `seed`, defaulting to 42.
pub fn seed_of(params: &Params) -> Result<u64, AgentError> {
    non_negative(params, "seed", 42)
}

fn non_negative(params: &Params, key: &str, default: u64) -> Result<u64, AgentError> {
    let default = i64::try_from(default).unwrap_or(i64::MAX);
    u64::try_from(params.int_or(key, default)?).map_err(|_| {
        AgentError::InvalidParameter {
            name: key.to_string(),
            expected: "non-negative integer",
        }
    })
}

/// Outcome of one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationReport {
    pub name: String,
    pub ticks: u64,
    pub motive: Option<String>,
    pub initial_nodes: usize,
    /// Nodes created by the activator, not counting the starting
    /// population.
    pub nodes_created: u64,
    pub nodes_destroyed: u64,
    pub graph: GraphStats,
    /// Degree to number of nodes with that degree, at the end of the run.
    pub degrees: BTreeMap<usize, usize>,
    pub evictions: usize,
    pub rehydrations: usize,
    pub log_entries: u64,
}

impl fmt::Display for SimulationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Simulation: {}", self.name)?;
        writeln!(f, "  Ticks: {}", self.ticks)?;
        writeln!(
            f,
            "  Motive: {}",
            self.motive.as_deref().unwrap_or("(none)")
        )?;
        writeln!(
            f,
            "  Nodes: {} (started {}, +{} -{})",
            self.graph.nodes, self.initial_nodes, self.nodes_created, self.nodes_destroyed
        )?;
        writeln!(
            f,
            "  Edges: {} (density {:.4}, mean degree {:.2}, max degree {})",
            self.graph.edges, self.graph.density, self.graph.mean_degree, self.graph.max_degree
        )?;
        write!(
            f,
            "  Evictions: {}, rehydrations: {}",
            self.evictions, self.rehydrations
        )
    }
}

/// A configured run.
#[derive(Debug)]
pub struct Simulation {
    spec: SimulationSpec,
    options: OptionSet,
    sources: ParameterSources,
}

impl Simulation {
    /// Merges the option layers and checks every node kind handles
    /// `activate`.
    pub fn new(spec: SimulationSpec) -> Result<Self, SimulationError> {
        let mut options = OptionSet::new();
        for layer in &spec.option_layers {
            for option in layer {
                options.add(option.clone())?;
            }
        }
        for kind in &spec.node_kinds {
            if !kind.handles(ACTIVATE) {
                return Err(ComponentError::MissingHandler {
                    kind: kind.kind.to_string(),
                    missing: vec![ACTIVATE.to_string()],
                }
                .into());
            }
        }
        let mut sources = ParameterSources::new();
        let mut defaults = options.defaults();
        defaults.merge(&spec.defaults);
        sources.set(Layer::Defaults, defaults);
        Ok(Self {
            spec,
            options,
            sources,
        })
    }

    pub fn spec(&self) -> &SimulationSpec {
        &self.spec
    }

    pub fn options(&self) -> &OptionSet {
        &self.options
    }

    pub fn sources(&self) -> &ParameterSources {
        &self.sources
    }

    /// Parses command-line arguments; the first one is the program name.
    /// Loads `--config` if given.
    pub fn parse_args<I, T>(&mut self, args: I) -> Result<(), ConfigurationError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let cli = self.options.parse_from(&self.spec.name, args)?;
        if let Some(path) = cli.get("config").and_then(Value::as_str) {
            self.load_config(Path::new(path))?;
        }
        self.sources.set(Layer::CommandLine, cli);
        Ok(())
    }

    pub fn load_config(&mut self, path: &Path) -> Result<(), ConfigurationError> {
        let params = config::from_file(path)?;
        tracing::debug!(path = %path.display(), keys = params.len(), "loaded config");
        self.sources.set(Layer::File, params);
        Ok(())
    }

    /// Call-site overrides, above every other layer.
    pub fn setup_parameters(&mut self, overrides: Params) {
        self.sources.extend(Layer::Overrides, &overrides);
    }

    /// The effective parameter map.
    pub fn parameters(&self) -> Params {
        self.sources.merged()
    }

    /// The effective parameters as a TOML document that `--config` accepts.
    pub fn effective_config(&self) -> Result<String, ConfigurationError> {
        let mut params = self.parameters();
        params.remove("config");
        config::to_toml(&params)
    }

    pub fn run(&mut self) -> Result<SimulationReport, SimulationError> {
        self.run_with(Params::new())
    }

    /// Runs on a fresh single-threaded runtime.
    pub fn run_with(&mut self, overrides: Params) -> Result<SimulationReport, SimulationError> {
        self.setup_parameters(overrides);
        let params = self.parameters();
        try_run_local(self.execute(params))?
    }

    /// Runs the lifecycle with `params` as the effective map. Must be
    /// awaited inside the local task set that [`sim_agents::run_local`] sets up.
    pub async fn execute(&self, mut params: Params) -> Result<SimulationReport, SimulationError> {
        self.fill_node_template(&mut params);
        let builder = ComponentBuilder::new(&params);

        let graph = builder.build(&self.spec.graph)?;
        let serializer_name = params
            .str_or("serializer", "bincode")
            .map_err(|e| ComponentError::from_agent("agent_store", e))?;
        let serializer =
            serializer_by_name(serializer_name).ok_or_else(|| ConfigurationError::InvalidValue {
                name: "serializer".into(),
                reason: format!("unknown serializer '{serializer_name}'"),
            })?;
        let options = RuntimeOptions {
            seed: seed_of(&params).map_err(|e| ComponentError::from_agent("runtime", e))?,
            poll_interval: params
                .int_or("poll_interval_ms", 10)
                .ok()
                .and_then(|ms| u64::try_from(ms).ok())
                .map(Duration::from_millis)
                .ok_or_else(|| ConfigurationError::InvalidValue {
                    name: "poll_interval_ms".into(),
                    reason: "expected a non-negative integer".into(),
                })?,
        };
        let runtime = Runtime::new(
            SharedGraph::from_boxed(graph),
            AgentStore::new(serializer),
            options,
        );
        for kind in &self.spec.node_kinds {
            (kind.register)(&runtime);
        }

        let logger = builder.build(&self.spec.logger)?;
        let checker = builder.build(&self.spec.termination)?;
        let configurator = builder.build(&self.spec.configurator)?;
        self.check_node_kind(&runtime, &configurator)?;
        let activator = builder.build(&self.spec.activator)?;
        let clock = builder.build(&self.spec.clock)?;

        tracing::info!(simulation = %self.spec.name, "starting");
        let outcome = self
            .lifecycle(&runtime, logger, checker, configurator, activator, clock)
            .await;
        let dropped = runtime.shutdown();
        if dropped > 0 {
            tracing::debug!(dropped, "messages dropped at shutdown");
        }
        outcome
    }

    fn fill_node_template(&self, params: &mut Params) {
        if params.contains("node_parameters") {
            return;
        }
        let template = params.select(self.spec.node_parameter_keys.iter().map(String::as_str));
        params.insert("node_parameters", template);
    }

    fn check_node_kind(
        &self,
        runtime: &Runtime,
        configurator: &Configurator,
    ) -> Result<(), ComponentError> {
        let kind = configurator.node_kind();
        let handlers = runtime
            .handlers_of(kind)
            .ok_or_else(|| ComponentError::UnknownKind(kind.to_string()))?;
        let missing: Vec<String> = configurator
            .required_handlers()
            .into_iter()
            .filter(|payload| !handlers.contains(payload))
            .map(str::to_string)
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ComponentError::MissingHandler {
                kind: kind.to_string(),
                missing,
            })
        }
    }

    async fn lifecycle(
        &self,
        runtime: &Runtime,
        logger: Logger,
        checker: TerminationChecker,
        configurator: Configurator,
        activator: Activator,
        clock: Clock,
    ) -> Result<SimulationReport, SimulationError> {
        let logger_id = AgentId::service(services::LOGGER);
        runtime.spawn(logger_id.clone(), logger)?;
        runtime.spawn(TerminationChecker::id(), checker)?;
        runtime.spawn(NodeManager::id(), NodeManager::new())?;
        runtime.spawn(Configurator::id(), configurator)?;
        let driver = runtime.context("simulation");

        let initial = driver
            .sync_send(Configurator::id(), "setup", Params::new())
            .await?;
        let initial_nodes = initial.as_list().map_or(0, <[Value]>::len);
        driver.send(Configurator::id(), KILL, Params::new());

        runtime.spawn(Activator::id(), activator)?;
        let clock = runtime.spawn(Clock::id(), clock)?;
        driver.sync_send(Clock::id(), "start", Params::new()).await?;
        let exit = clock.join().await?;
        tracing::info!(ticks = exit.agent.ticks(), reason = ?exit.reason, "clock stopped");

        let stats = manager_stats(&driver).await?;
        let log_entries = driver
            .sync_send(logger_id, "stop_receiving", Params::new())
            .await?
            .as_int()
            .and_then(|n| u64::try_from(n).ok())
            .unwrap_or(0);
        let (graph, degrees) = runtime
            .graph()
            .with(|g| (GraphStats::collect(g), degree_histogram(g)));
        let runtime_stats = runtime.stats();
        let initial = u64::try_from(initial_nodes).unwrap_or(u64::MAX);

        Ok(SimulationReport {
            name: self.spec.name.clone(),
            ticks: exit.agent.ticks(),
            motive: exit.agent.motive().map(str::to_string),
            initial_nodes,
            nodes_created: stats.0.saturating_sub(initial),
            nodes_destroyed: stats.1,
            graph,
            degrees,
            evictions: runtime_stats.evictions,
            rehydrations: runtime_stats.rehydrations,
            log_entries,
        })
    }
}

/// `(created, destroyed)` as counted by the manager.
async fn manager_stats(driver: &AgentContext) -> Result<(u64, u64), SimulationError> {
    let reply = driver
        .sync_send(NodeManager::id(), "statistics", Params::new())
        .await?;
    let count = |key: &str| {
        reply
            .as_map()
            .and_then(|map| map.get(key))
            .and_then(Value::as_int)
            .and_then(|n| u64::try_from(n).ok())
            .unwrap_or(0)
    };
    Ok((count("created"), count("destroyed")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_option_fails_construction() {
        let spec = SimulationSpec::basic("dup").with_options(vec![OptionSpec::int("steps")]);
        assert!(matches!(
            Simulation::new(spec),
            Err(SimulationError::Configuration(ConfigurationError::DuplicateOption(_)))
        ));
    }

    #[test]
    fn test_parameter_precedence() {
        let spec = SimulationSpec::basic("layers").with_defaults(Params::new().with("steps", 7));
        let mut simulation = Simulation::new(spec).unwrap();
        assert_eq!(simulation.parameters().get("steps"), Some(&Value::Int(7)));
        assert_eq!(simulation.parameters().get("seed"), Some(&Value::Int(42)));

        simulation.parse_args(["layers", "--steps", "12"]).unwrap();
        assert_eq!(simulation.parameters().get("steps"), Some(&Value::Int(12)));
        assert_eq!(simulation.sources().origin("steps"), Some(Layer::CommandLine));

        simulation.setup_parameters(Params::new().with("steps", 3));
        assert_eq!(simulation.parameters().get("steps"), Some(&Value::Int(3)));
    }

    #[test]
    fn test_node_template_is_filled_once() {
        let simulation = Simulation::new(SimulationSpec::basic("template")).unwrap();
        let mut params = simulation.parameters().with("evictable", true);
        simulation.fill_node_template(&mut params);
        assert_eq!(
            params.params("node_parameters").unwrap(),
            Params::new().with("evictable", true)
        );
    }

    #[test]
    fn test_execute_on_caller_local_set() {
        let mut simulation = Simulation::new(SimulationSpec::basic("embedded")).unwrap();
        simulation.setup_parameters(
            Params::new()
                .with("quiet", true)
                .with("steps", 4)
                .with("starting_network_size", 6),
        );
        let params = simulation.parameters();
        let report = sim_agents::run_local(simulation.execute(params)).unwrap();
        assert_eq!(report.ticks, 4);
        assert_eq!(report.initial_nodes, 6);
    }

    #[test]
    fn test_report_display() {
        let report = SimulationReport {
            name: "basic".into(),
            ticks: 10,
            motive: Some("Exhausted Count Down.".into()),
            initial_nodes: 100,
            nodes_created: 0,
            nodes_destroyed: 0,
            graph: GraphStats {
                nodes: 100,
                edges: 0,
                density: 0.0,
                mean_degree: 0.0,
                max_degree: 0,
            },
            degrees: BTreeMap::from([(0, 100)]),
            evictions: 0,
            rehydrations: 0,
            log_entries: 2,
        };
        let text = report.to_string();
        assert!(text.contains("Ticks: 10"));
        assert!(text.contains("Exhausted Count Down."));
    }
}
