//! Headless settlement runner.
//!
//! # Usage
//!
//! ```bash
//! # Play a scenario, printing stats every simulated second
//! cargo run -p hearth_headless -- run --scenario village.ron --ticks 2400 --seed 42
//!
//! # Interactive mode - read requests from stdin
//! cargo run -p hearth_headless -- interactive
//! ```
//!
//! Output (stdout): JSON, one object per line
//! Logs (stderr): `RUST_LOG` filter, `--verbose` for debug

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use hearth_headless::{run_match, Scenario, ScenarioError, Session};

#[derive(Parser)]
#[command(name = "hearth_headless")]
#[command(about = "Headless settlement simulation runner")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a scenario for a fixed number of ticks
    Run {
        /// Scenario file to load (built-in village if omitted)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Number of ticks to simulate
        #[arg(short, long, default_value = "1200")]
        ticks: u64,

        /// Override the scenario's random seed
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Serve JSON-lines requests on stdin
    Interactive {
        /// Scenario file to load (built-in village if omitted)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Override the scenario's random seed
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // stdout is reserved for protocol output
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let result = match cli.command {
        Some(Commands::Run { scenario, ticks, seed }) => cmd_run(scenario, ticks, seed),
        Some(Commands::Interactive { scenario, seed }) => cmd_interactive(scenario, seed),
        None => cmd_interactive(None, None),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Runner failed");
            ExitCode::FAILURE
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Failed to encode summary: {0}")]
    Json(#[from] serde_json::Error),
}

fn load_scenario(path: Option<PathBuf>) -> Result<Scenario, ScenarioError> {
    match path {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading scenario");
            Scenario::load(path)
        }
        None => Ok(Scenario::village()),
    }
}

/// Play a scenario and print the summary last.
fn cmd_run(scenario: Option<PathBuf>, ticks: u64, seed: Option<u64>) -> Result<(), CliError> {
    let mut sim = load_scenario(scenario)?.build(seed)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let summary = run_match(&mut sim, ticks, &mut out)?;
    let line = serde_json::to_string(&summary)?;
    writeln!(out, "{line}")?;
    Ok(())
}

/// Serve an interactive session on stdin/stdout.
fn cmd_interactive(scenario: Option<PathBuf>, seed: Option<u64>) -> Result<(), CliError> {
    tracing::info!("Starting interactive session");
    let sim = load_scenario(scenario)?.build(seed)?;
    let mut session = Session::new(sim);
    let stdout = io::stdout();
    session.serve(io::stdin().lock(), &mut stdout.lock())?;
    Ok(())
}
