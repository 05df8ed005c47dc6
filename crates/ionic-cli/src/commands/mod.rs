//! CLI command implementations for ionic

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::config::CliConfig;
use crate::error::CliResult;

pub mod check;
pub mod clocks;
pub mod run;
pub mod sweep;
pub mod tables;

/// ionic - compartmental neuron models from the command line
#[derive(Parser, Debug)]
#[command(
    name = "ionic",
    version,
    about = "Check, run and sweep conductance-based neuron models",
    long_about = "ionic loads declarative multi-compartment neuron models, tabulates their \
                  channel kinetics, schedules them on a seven-slot clock and runs single \
                  simulations or parameter sweeps."
)]
pub struct IonicCli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true, env = "IONIC_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate a model file and summarise it
    Check(check::CheckCommand),

    /// Run one simulation and write its traces
    #[command(alias = "sim")]
    Run(run::RunCommand),

    /// Dump the rate tables of one channel
    Tables(tables::TablesCommand),

    /// Show the clock schedule of a model
    Clocks(clocks::ClocksCommand),

    /// Run a parameter sweep from a study file
    #[command(alias = "study")]
    Sweep(sweep::SweepCommand),
}

impl IonicCli {
    /// Execute the CLI command
    pub fn execute(self, config: &CliConfig) -> CliResult<()> {
        match self.command {
            Commands::Check(cmd) => cmd.execute(),
            Commands::Run(cmd) => cmd.execute(config),
            Commands::Tables(cmd) => cmd.execute(),
            Commands::Clocks(cmd) => cmd.execute(),
            Commands::Sweep(cmd) => cmd.execute(config),
        }
    }
}

/// File stem used to name output products
pub(crate) fn model_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "model".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        IonicCli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = IonicCli::try_parse_from(["ionic", "check", "m.toml", "-v"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Check(_)));
    }

    #[test]
    fn test_model_stem() {
        assert_eq!(model_stem(Path::new("models/hh_single.toml")), "hh_single");
        assert_eq!(model_stem(Path::new("/")), "model");
    }
}
