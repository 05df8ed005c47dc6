//! Parameter sweeps on a worker pool

use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use ionic_runtime::sweep::save_param_sets;
use ionic_runtime::{run_sweep, ModelDefinition, StudyConfig, SweepOptions, SweepOutcome};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::CliConfig;
use crate::error::{CliError, CliResult};

/// Run a parameter sweep
#[derive(Args, Debug)]
pub struct SweepCommand {
    /// Study configuration file (.toml)
    pub study: PathBuf,

    /// Number of parallel workers
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Simulated time per run (s), overriding the study file
    #[arg(long)]
    pub stop: Option<f64>,

    /// Output directory
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Save the parameter sets as JSON for later reuse
    #[arg(long)]
    pub save_sets: Option<PathBuf>,

    /// Write the traces of every completed run
    #[arg(long)]
    pub traces: bool,
}

impl SweepCommand {
    pub fn execute(self, config: &CliConfig) -> CliResult<()> {
        let study = StudyConfig::load(&self.study)?;
        let def = ModelDefinition::load(&study.model, study.variant.as_deref())?;
        let sets = study.param_sets()?;
        if sets.is_empty() {
            return Err(CliError::invalid_args("study has no runs"));
        }
        if let Some(path) = &self.save_sets {
            save_param_sets(path, &sets)?;
            info!("Parameter sets written to {}", path.display());
        }

        let stop_time = self.stop.unwrap_or(study.stop_time);
        if !stop_time.is_finite() || stop_time <= 0.0 {
            return Err(CliError::invalid_args(format!("stop time must be > 0, got {}", stop_time)));
        }
        let jobs = config.jobs(self.jobs.or(study.jobs));
        let mut options = SweepOptions::new(jobs, stop_time).with_implicit(study.implicit);
        if let Some(budget) = study.budget_secs {
            options = options.with_budget(Duration::from_secs_f64(budget));
        }

        let progress = if config.preferences.show_progress {
            let bar = ProgressBar::new(sets.len() as u64);
            let style = ProgressStyle::with_template("{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} runs {msg}")
                .map_err(|e| CliError::Generic(anyhow::anyhow!(e)))?;
            bar.set_style(style);
            bar
        } else {
            ProgressBar::hidden()
        };

        let outcomes = run_sweep(&def, &sets, &options, |outcome| {
            progress.inc(1);
            if let Err(e) = &outcome.result {
                progress.set_message(format!("run {} failed", outcome.params.index));
                warn!("Run {} failed: {}", outcome.params.index, e);
            }
        })?;
        progress.finish_and_clear();

        let out_dir = config.output_dir(self.out.as_deref());
        std::fs::create_dir_all(&out_dir)?;
        if self.traces {
            for outcome in &outcomes {
                if let Ok(result) = &outcome.result {
                    result.save_text(out_dir.join(format!("run_{:03}_traces.txt", outcome.params.index)))?;
                }
            }
        }

        let summary_path = out_dir.join("sweep_summary.txt");
        let mut writer = BufWriter::new(File::create(&summary_path)?);
        write_summary(&outcomes, &mut writer)?;
        writer.flush()?;

        let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
        let timed_out = outcomes.iter().filter(|o| o.timed_out()).count();
        println!(
            "{} runs: {} completed, {} timed out, {} failed otherwise",
            outcomes.len(),
            outcomes.len() - failed,
            timed_out,
            failed - timed_out
        );
        println!("summary: {}", summary_path.display());

        if failed > 0 {
            return Err(CliError::RunsFailed {
                failed,
                total: outcomes.len(),
            });
        }
        Ok(())
    }
}

/// One line per run: index, seed, status, spike count and scale factors
pub fn write_summary<W: Write>(outcomes: &[SweepOutcome], out: &mut W) -> std::io::Result<()> {
    writeln!(out, "# run seed status spikes factors")?;
    for outcome in outcomes {
        let (status, spikes) = match &outcome.result {
            Ok(result) => ("ok", result.total_spikes().to_string()),
            Err(_) if outcome.timed_out() => ("timeout", "-".to_string()),
            Err(_) => ("error", "-".to_string()),
        };
        let factors: Vec<String> = outcome
            .params
            .factors
            .iter()
            .map(|f| format!("{}/{}={:.4}", f.cell, f.channel, f.factor))
            .collect();
        writeln!(
            out,
            "{} {} {} {} {}",
            outcome.params.index,
            outcome.params.seed,
            status,
            spikes,
            factors.join(",")
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ionic_runtime::sweep::ScaleFactor;
    use ionic_runtime::{ParamSet, RuntimeError};

    fn params(index: usize) -> ParamSet {
        ParamSet {
            index,
            seed: 10 + index as u64,
            factors: vec![ScaleFactor {
                cell: "hh".into(),
                channel: "HHNa".into(),
                factor: 1.05,
            }],
        }
    }

    #[test]
    fn test_summary_marks_timeouts_and_errors() {
        let outcomes = vec![
            SweepOutcome {
                params: params(0),
                result: Err(RuntimeError::WorkerTimeout { run: 0, budget_secs: 1.0 }),
            },
            SweepOutcome {
                params: params(1),
                result: Err(RuntimeError::invalid_model("broken")),
            },
        ];
        let mut out = Vec::new();
        write_summary(&outcomes, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "0 10 timeout - hh/HHNa=1.0500");
        assert_eq!(lines[2], "1 11 error - hh/HHNa=1.0500");
    }
}
