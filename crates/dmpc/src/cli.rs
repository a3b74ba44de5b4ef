//! Command-line argument parsing for the headless planner run.

use std::path::PathBuf;

use clap::Parser;

/// Computes collision-free trajectories for a team of agents from a
/// configuration document.
#[derive(Parser)]
#[clap(version, author, about)]
pub struct Cli {
    /// Path to the configuration document.
    #[arg(value_name = "CONFIG_FILE", required_unless_present = "dump_default_config")]
    pub config: Option<PathBuf>,

    /// Print a fully-populated default configuration document as JSON to
    /// stdout and exit, instead of running a simulation.
    #[arg(long)]
    pub dump_default_config: bool,

    /// Seed for the process-noise PRNG. Not a documented configuration
    /// key; exposed as a CLI-only, reproducibility-oriented addition (see
    /// `DESIGN.md`).
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
}

#[must_use]
pub fn parse_arguments() -> Cli {
    Cli::parse()
}
