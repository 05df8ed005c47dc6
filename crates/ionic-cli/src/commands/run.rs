//! Single simulation runs

use clap::Args;
use ionic_runtime::{setup_and_run, Deadline, ModelDefinition, RunOptions, RunResult, TraceKind};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use super::model_stem;
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};

/// Run one simulation
#[derive(Args, Debug)]
pub struct RunCommand {
    /// Model file (.toml)
    pub model: PathBuf,

    /// Conductance variant (defaults to the one the file selects)
    #[arg(long)]
    pub variant: Option<String>,

    /// Simulated time (s)
    #[arg(long, default_value_t = 0.1)]
    pub stop: f64,

    /// Seed for per-instance conductance variance
    #[arg(long, default_value_t = 1)]
    pub seed: u64,

    /// Use the implicit (Hines) solver
    #[arg(long, conflicts_with = "explicit")]
    pub implicit: bool,

    /// Use the explicit exponential-Euler integrator
    #[arg(long)]
    pub explicit: bool,

    /// Record every channel current
    #[arg(long)]
    pub currents: bool,

    /// Wall-clock budget (s); the run fails once exceeded
    #[arg(long)]
    pub budget: Option<f64>,

    /// Only simulate these cell types (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub cells: Vec<String>,

    /// Output directory
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Also write the result as JSON
    #[arg(long)]
    pub json: bool,
}

impl RunCommand {
    /// Run options requested on the command line
    pub fn options(&self) -> CliResult<RunOptions> {
        let mut options = RunOptions::new(self.stop)?.with_seed(self.seed);
        if self.implicit {
            options = options.with_implicit(true);
        } else if self.explicit {
            options = options.with_implicit(false);
        }
        if self.currents {
            options = options.with_currents(true);
        }
        if let Some(budget) = self.budget {
            if !budget.is_finite() || budget <= 0.0 {
                return Err(CliError::invalid_args(format!(
                    "budget must be a positive number of seconds, got {}",
                    budget
                )));
            }
            options = options.with_deadline(Deadline::new(Duration::from_secs_f64(budget)));
        }
        Ok(options)
    }

    pub fn execute(self, config: &CliConfig) -> CliResult<()> {
        let options = self.options()?;
        let mut def = ModelDefinition::load(&self.model, self.variant.as_deref())?;
        if !self.cells.is_empty() {
            let keep: Vec<&str> = self.cells.iter().map(String::as_str).collect();
            let removed = def.limit_cells(&keep);
            if !removed.is_empty() {
                info!("Not simulating {}", removed.join(", "));
            }
        }
        let result = setup_and_run(&def, &options)?;

        let out_dir = config.output_dir(self.out.as_deref());
        std::fs::create_dir_all(&out_dir)?;
        let stem = model_stem(&self.model);
        let traces = out_dir.join(format!("{}_traces.txt", stem));
        result.save_text(&traces)?;
        info!("Traces written to {}", traces.display());

        if self.json || config.preferences.write_json {
            let json = out_dir.join(format!("{}.json", stem));
            result.save_json(&json)?;
            info!("Result written to {}", json.display());
        }

        print!("{}", report(&result, &traces));
        Ok(())
    }
}

/// Short textual report of a finished run
pub fn report(result: &RunResult, traces: &Path) -> String {
    let mut out = format!(
        "{} (variant {}, seed {}): {} ticks to t = {} s\n",
        result.model, result.variant, result.seed, result.ticks, result.stop_time
    );
    for trace in result
        .traces()
        .iter()
        .filter(|t| t.key.kind == TraceKind::Voltage)
    {
        out.push_str(&format!(
            "  {:<24} peak {:+.2} mV, final {:+.2} mV\n",
            trace.key.to_string(),
            trace.max() * 1e3,
            trace.last().unwrap_or(f64::NAN) * 1e3
        ));
    }
    for (instance, spikes) in &result.spikes {
        out.push_str(&format!("  {:<24} {} spike(s)\n", instance, spikes.len()));
    }
    out.push_str(&format!("traces: {}\n", traces.display()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::IonicCli;
    use clap::Parser;

    fn parse(args: &[&str]) -> RunCommand {
        let mut argv = vec!["ionic", "run", "model.toml"];
        argv.extend_from_slice(args);
        match IonicCli::try_parse_from(argv).unwrap().command {
            crate::commands::Commands::Run(cmd) => cmd,
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_solver_flags() {
        assert_eq!(parse(&[]).options().unwrap().implicit, None);
        assert_eq!(parse(&["--implicit"]).options().unwrap().implicit, Some(true));
        assert_eq!(parse(&["--explicit"]).options().unwrap().implicit, Some(false));
        let both = IonicCli::try_parse_from(["ionic", "run", "m.toml", "--implicit", "--explicit"]);
        assert!(both.is_err());
    }

    #[test]
    fn test_invalid_options_are_rejected() {
        assert!(parse(&["--stop=-1"]).options().is_err());
        let err = parse(&["--budget", "0"]).options().unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_cell_subset_list() {
        assert!(parse(&[]).cells.is_empty());
        assert_eq!(parse(&["--cells", "D1,D2"]).cells, vec!["D1", "D2"]);
    }

    #[test]
    fn test_seed_and_budget() {
        let options = parse(&["--seed", "7", "--budget", "2.5", "--currents"]).options().unwrap();
        assert_eq!(options.seed, 7);
        assert_eq!(options.currents, Some(true));
        assert_eq!(options.deadline.map(|d| d.budget_secs()), Some(2.5));
    }
}
