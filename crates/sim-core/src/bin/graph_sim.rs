//! Graph simulation runner
//!
//! ```text
//! graph_sim [--json] [--print-config] <MODEL> [MODEL OPTIONS...]
//! graph_sim preferential --steps 1000 --links 5 --network-size 5
//! ```

use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::{Parser, ValueEnum};
use sim_core::models::{preferential, small_world, transitive};
use sim_core::{ConfigurationError, Simulation, SimulationError, SimulationSpec};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Model {
    Basic,
    Preferential,
    Transitive,
    SmallWorld,
}

impl Model {
    fn spec(self) -> SimulationSpec {
        match self {
            Model::Basic => SimulationSpec::basic("basic"),
            Model::Preferential => preferential::spec(),
            Model::Transitive => transitive::spec(),
            Model::SmallWorld => small_world::spec(),
        }
    }
}

/// Command line arguments for the runner
#[derive(Parser, Debug)]
#[command(name = "graph_sim")]
#[command(about = "Agent-based simulation of evolving graphs")]
struct Cli {
    /// Print the final report as JSON
    #[arg(long)]
    json: bool,

    /// Print the effective parameters as TOML and exit without running
    #[arg(long)]
    print_config: bool,

    /// Model to run
    #[arg(value_enum)]
    model: Model,

    /// Options of the model; `graph_sim <MODEL> --help` lists them
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

fn run(cli: Cli) -> Result<(), SimulationError> {
    let spec = cli.model.spec();
    let program = format!("graph_sim {}", spec.name());
    let mut simulation = Simulation::new(spec)?;
    match simulation.parse_args(std::iter::once(program).chain(cli.args)) {
        Err(ConfigurationError::Cli(e))
            if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) =>
        {
            e.exit()
        }
        other => other?,
    }

    if cli.print_config {
        print!("{}", simulation.effective_config()?);
        return Ok(());
    }

    let report = simulation.run()?;
    if cli.json {
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        println!("{json}");
    } else {
        println!("{report}");
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}
