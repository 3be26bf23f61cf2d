//! Small world: [`BasicNode`]s laid out as a Watts–Strogatz graph.

use sim_agents::{Agent, Params};
use sim_graph::generators;

use super::BasicNode;
use crate::component::ComponentSpec;
use crate::configurator::Population;
use crate::options::OptionSpec;
use crate::simulation::{configurator_for, seed_of, SimulationSpec};

/// Ring of `--network-size` nodes with `--neighbors` successors each,
/// edges rewired with probability `--rewire`.
pub fn spec() -> SimulationSpec {
    SimulationSpec::basic("small_world")
        .with_options(vec![
            OptionSpec::int("neighbors")
                .short('k')
                .default_value(2)
                .help("Successors each node links to on the ring"),
            OptionSpec::float("rewire")
                .short('p')
                .default_value(0.1)
                .help("Probability that a ring edge is rewired"),
        ])
        .with_defaults(Params::new().with("node_kind", BasicNode::KIND))
        .with_configurator(
            ComponentSpec::new("configurator", |p: &Params| {
                let n = p.usize_or("starting_network_size", 100)?;
                let k = p.usize_or("neighbors", 2)?;
                let rewire = p.float_or("rewire", 0.1)?;
                let seed = generators::watts_strogatz(n, k, rewire, seed_of(p)?)?;
                configurator_for(Population::Seed(Box::new(seed)), p)
            })
            .options([
                "starting_network_size",
                "neighbors",
                "rewire",
                "seed",
                "node_kind",
                "node_parameters",
                "initialize_nodes",
            ]),
        )
}
