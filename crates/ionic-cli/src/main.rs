//! # ionic CLI
//!
//! Check, run and sweep compartmental neuron models from the command line.

use clap::Parser;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ionic_cli::config::CliConfig;
use ionic_cli::IonicCli;

fn main() {
    let cli = IonicCli::parse();

    let config = match CliConfig::resolve(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}", err);
            std::process::exit(err.exit_code());
        }
    };

    // RUST_LOG wins over --verbose, which wins over the configured level
    let default_level = if cli.verbose {
        "debug".to_string()
    } else {
        config.log_level.clone().unwrap_or_else(|| "info".to_string())
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    if let Err(err) = cli.execute(&config) {
        error!("Command failed: {}", err);
        std::process::exit(err.exit_code());
    }
}
