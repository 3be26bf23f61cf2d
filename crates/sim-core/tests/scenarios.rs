//! End-to-end runs of the reference models.

use std::cell::Cell;
use std::io::Write;
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use futures::FutureExt;
use sim_agents::{
    Agent, AgentContext, AgentError, HandlerResult, HandlerTable, NodeAgent, Params, Value,
};
use sim_core::models::{preferential, small_world, transitive};
use sim_core::{
    ComponentError, ComponentSpec, ConfigurationError, OptionSpec, Simulation, SimulationError,
    SimulationSpec, TerminationChecker, TerminationCondition, COUNT_DOWN_MOTIVE,
};
use sim_graph::{generators, DynGraph, Graph, NodeId};

fn quiet() -> Params {
    Params::new().with("quiet", true)
}

/// Scenario a: default simulation over 100 nodes for 10 steps
#[test]
fn test_default_simulation() {
    let mut simulation = Simulation::new(SimulationSpec::basic("basic")).unwrap();
    let report = simulation.run_with(quiet().with("steps", 10)).unwrap();

    assert_eq!(report.ticks, 10);
    assert_eq!(report.motive.as_deref(), Some(COUNT_DOWN_MOTIVE));
    assert_eq!(report.initial_nodes, 100);
    assert_eq!(
        report.graph.nodes as u64,
        100 + report.nodes_created - report.nodes_destroyed
    );
    assert_eq!(report.graph.edges, 0);
}

/// The synchronous clock with count_down(N) performs exactly N ticks
#[test]
fn test_count_down_runs_exact_ticks() {
    for steps in [1, 3, 25] {
        for sync in [false, true] {
            let mut simulation = Simulation::new(SimulationSpec::basic("basic")).unwrap();
            let report = simulation
                .run_with(
                    quiet()
                        .with("steps", steps)
                        .with("starting_network_size", 10)
                        .with("sync_activator", sync),
                )
                .unwrap();
            assert_eq!(report.ticks, steps as u64, "steps={steps} sync={sync}");
        }
    }
}

#[test]
fn test_pipelined_clock_runs_tick_budget() {
    let mut simulation = Simulation::new(SimulationSpec::basic("basic")).unwrap();
    let report = simulation
        .run_with(quiet().with("steps", 7).with("pipelined", true))
        .unwrap();
    assert_eq!(report.ticks, 7);
    assert_eq!(report.motive.as_deref(), Some("Exhausted Tick Budget."));
}

/// Discrete power-law exponent estimate over degrees >= `k_min`.
fn tail_exponent(degrees: &std::collections::BTreeMap<usize, usize>, k_min: usize) -> f64 {
    let mut count = 0.0;
    let mut log_sum = 0.0;
    for (&degree, &nodes) in degrees.range(k_min..) {
        count += nodes as f64;
        log_sum += nodes as f64 * (degree as f64 / (k_min as f64 - 0.5)).ln();
    }
    1.0 + count / log_sum
}

/// Scenario b: preferential attachment with m=5, N0=5 over 1000 steps
#[test]
fn test_preferential_attachment_growth() {
    let mut simulation = Simulation::new(preferential::spec()).unwrap();
    let report = simulation
        .run_with(
            quiet()
                .with("links", 5)
                .with("starting_network_size", 5)
                .with("steps", 1000),
        )
        .unwrap();

    assert_eq!(report.graph.nodes, 1005);
    assert_eq!(report.graph.edges, 5 + 5 * 1000);
    assert_eq!(report.nodes_created, 1000);
    let exponent = tail_exponent(&report.degrees, 5);
    assert!(
        (2.5..=3.5).contains(&exponent),
        "tail exponent {exponent} out of range"
    );
}

#[test]
fn test_preferential_attachment_with_cooperation() {
    let mut simulation = Simulation::new(preferential::spec()).unwrap();
    simulation
        .parse_args(["preferential", "--cooperate", "-m", "3", "-s", "50"])
        .unwrap();
    let report = simulation.run_with(quiet()).unwrap();
    assert_eq!(report.graph.nodes, 55);
    assert_eq!(report.graph.edges, 5 + 3 * 50);
}

/// Scenario c: Watts–Strogatz seed with N=1000, k=2, p=0.5
#[test]
fn test_small_world_seed() {
    let mut simulation = Simulation::new(small_world::spec()).unwrap();
    let report = simulation
        .run_with(
            quiet()
                .with("starting_network_size", 1000)
                .with("neighbors", 2)
                .with("rewire", 0.5)
                .with("seed", 11)
                .with("steps", 2),
        )
        .unwrap();

    let reference = generators::watts_strogatz(1000, 2, 0.5, 11).unwrap();
    assert_eq!(report.graph.nodes, 1000);
    assert_eq!(report.graph.edges, 2000);
    assert_eq!(report.graph.edges, reference.number_of_edges());
}

/// Scenario d: transitive linking keeps the population size fixed
#[test]
fn test_transitive_linking_keeps_size() {
    let deviated = Rc::new(Cell::new(false));
    let seen = Rc::clone(&deviated);
    let spec = transitive::spec().with_termination(
        ComponentSpec::new("termination_checker", move |p: &Params| {
            let steps = p.int("steps")? as u64;
            let seen = Rc::clone(&seen);
            Ok(TerminationChecker::new(vec![
                TerminationCondition::new("Size changed.", move |g: &DynGraph| {
                    if g.number_of_nodes() != 100 {
                        seen.set(true);
                    }
                    false
                }),
                TerminationCondition::count_down(steps),
            ]))
        })
        .options(["steps"]),
    );
    let mut simulation = Simulation::new(spec).unwrap();
    let report = simulation
        .run_with(
            quiet()
                .with("starting_network_size", 100)
                .with("steps", 1000)
                .with("death_prob", 0.01)
                .with("sync_activator", true),
        )
        .unwrap();

    assert!(!deviated.get(), "population size changed during the run");
    assert_eq!(report.ticks, 1000);
    assert_eq!(report.graph.nodes, 100);
    assert_eq!(report.nodes_created, report.nodes_destroyed);
    assert!(report.graph.edges > 0);
}

/// Scenario e in a full run: idle nodes are evicted and come back on
/// activation
#[test]
fn test_evicted_nodes_are_rehydrated_during_run() {
    for serializer in ["bincode", "json"] {
        let mut simulation = Simulation::new(SimulationSpec::basic("basic")).unwrap();
        let report = simulation
            .run_with(
                quiet()
                    .with("starting_network_size", 20)
                    .with("steps", 10)
                    .with("evictable", true)
                    .with("poll_interval_ms", 0)
                    .with("serializer", serializer)
                    .with("sync_activator", true),
            )
            .unwrap();
        assert_eq!(report.ticks, 10);
        assert!(report.evictions >= 20, "{serializer}: {report:?}");
        assert!(report.rehydrations >= 1, "{serializer}: {report:?}");
        assert_eq!(report.graph.nodes, 20);
    }
}

/// Scenario f: declaring --steps twice fails driver construction
#[test]
fn test_duplicate_option_is_rejected() {
    let spec = SimulationSpec::basic("basic").with_options(vec![OptionSpec::int("steps")]);
    let err = Simulation::new(spec).unwrap_err();
    assert!(matches!(
        err,
        SimulationError::Configuration(ConfigurationError::DuplicateOption(ref name)) if name == "steps"
    ));
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn test_config_file_below_command_line() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "steps = 4\nseed = 9\n\n[starting]\nnetwork-size = 12").unwrap();
    let path = file.path().to_str().unwrap().to_string();

    let mut simulation = Simulation::new(SimulationSpec::basic("basic")).unwrap();
    simulation
        .parse_args(["basic", "--config", path.as_str(), "--seed", "5"])
        .unwrap();
    let params = simulation.parameters();
    assert_eq!(params.get("steps"), Some(&Value::Int(4)));
    assert_eq!(params.get("seed"), Some(&Value::Int(5)));
    assert_eq!(params.get("starting_network_size"), Some(&Value::Int(12)));

    let report = simulation.run_with(quiet()).unwrap();
    assert_eq!(report.ticks, 4);
    assert_eq!(report.initial_nodes, 12);
}

/// The printed effective config loads back into the same parameters
#[test]
fn test_effective_config_reloads() {
    let mut original = Simulation::new(small_world::spec()).unwrap();
    original
        .parse_args(["small_world", "-k", "3", "--rewire", "0.25", "--steps", "6"])
        .unwrap();
    let dumped = original.effective_config().unwrap();
    assert!(!dumped.contains("config ="));

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(dumped.as_bytes()).unwrap();
    let path = file.path().to_str().unwrap().to_string();
    let mut reloaded = Simulation::new(small_world::spec()).unwrap();
    reloaded
        .parse_args(["small_world", "--config", path.as_str()])
        .unwrap();

    let mut expected = original.parameters();
    expected.remove("config");
    let mut actual = reloaded.parameters();
    actual.remove("config");
    assert_eq!(actual, expected);

    let first = original.run_with(quiet().with("starting_network_size", 30)).unwrap();
    let second = reloaded.run_with(quiet().with("starting_network_size", 30)).unwrap();
    assert_eq!(first.ticks, 6);
    assert_eq!(first.graph.edges, second.graph.edges);
}

#[test]
fn test_log_file_receives_records() {
    let log = tempfile::NamedTempFile::new().unwrap();
    let path = log.path().to_str().unwrap().to_string();
    let mut simulation = Simulation::new(SimulationSpec::basic("basic")).unwrap();
    let report = simulation
        .run_with(
            Params::new()
                .with("log_file", path.as_str())
                .with("steps", 3)
                .with("starting_network_size", 4),
        )
        .unwrap();
    assert!(report.log_entries >= 2);

    let written = std::fs::read_to_string(log.path()).unwrap();
    assert!(written.contains("[configurator: r"));
    assert!(written.contains("created 4 starting nodes"));
    assert!(written.contains("clock stopped after 3 ticks: Exhausted Count Down."));
}

#[test]
fn test_unknown_node_kind_is_a_component_error() {
    let mut simulation = Simulation::new(SimulationSpec::basic("basic")).unwrap();
    let err = simulation
        .run_with(quiet().with("node_kind", "ghost"))
        .unwrap_err();
    assert!(matches!(
        err,
        SimulationError::Component(ComponentError::UnknownKind(ref kind)) if kind == "ghost"
    ));
    assert_eq!(err.exit_code(), 2);
}

/// Node kind that cannot be activated.
struct Inert;

fn noop<'a>(_: &'a mut Inert, _: &'a AgentContext, _: Params) -> LocalBoxFuture<'a, HandlerResult> {
    async move { Ok(Value::Null) }.boxed_local()
}

impl Agent for Inert {
    const KIND: &'static str = "inert";

    fn handlers() -> HandlerTable<Self> {
        HandlerTable::new().on("initialize", noop)
    }
}

impl NodeAgent for Inert {
    fn create(_id: NodeId, _params: &Params) -> Result<Self, AgentError> {
        Ok(Inert)
    }
}

#[test]
fn test_node_kind_without_activate_is_rejected() {
    let spec = SimulationSpec::basic("inert").with_node_kind::<Inert>();
    assert!(matches!(
        Simulation::new(spec),
        Err(SimulationError::Component(ComponentError::MissingHandler { ref kind, .. })) if kind == "inert"
    ));
}

#[test]
fn test_bad_parameter_names_component() {
    let mut simulation = Simulation::new(transitive::spec()).unwrap();
    let err = simulation
        .run_with(quiet().with("death_prob", 3.0))
        .unwrap_err();
    assert!(matches!(
        err,
        SimulationError::Component(ComponentError::InvalidParameter { ref component, .. })
            if component == "activator"
    ));
}
