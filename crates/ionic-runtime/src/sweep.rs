//! Parameter sweeps: random conductance scale factors run on a worker pool
//!
//! Every run owns a clone of the model with its factors applied, its own
//! seed and its own output. Workers pull run indices from a shared queue;
//! a wall-clock budget covers the whole sweep and is checked at every tick.

use crate::{
    error::*,
    model::ModelDefinition,
    recording::RunResult,
    simulation::{setup_and_run, Deadline, RunOptions},
};
use crossbeam::channel;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Uniform range of a conductance scale factor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorRange {
    /// Cell type
    pub cell: String,
    /// Channel name
    pub channel: String,
    /// Lower factor
    pub low: f64,
    /// Upper factor
    pub high: f64,
}

impl FactorRange {
    /// Validate bounds
    pub fn validate(&self) -> Result<()> {
        if !(self.low > 0.0) || !(self.high >= self.low) || !self.high.is_finite() {
            return Err(RuntimeError::invalid_parameter(
                format!("{}/{} factor range", self.cell, self.channel),
                format!("[{}, {}]", self.low, self.high),
                "0 < low <= high",
            ));
        }
        Ok(())
    }
}

/// One drawn scale factor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleFactor {
    /// Cell type
    pub cell: String,
    /// Channel name
    pub channel: String,
    /// Multiplier of every band of the channel
    pub factor: f64,
}

/// Factors and seed of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSet {
    /// Run index
    pub index: usize,
    /// Seed for the run's instance variance
    pub seed: u64,
    /// Scale factors
    pub factors: Vec<ScaleFactor>,
}

impl ParamSet {
    /// Copy of `def` with the factors applied
    pub fn apply(&self, def: &ModelDefinition) -> Result<ModelDefinition> {
        let mut scaled = def.clone();
        for f in &self.factors {
            scaled.conductances.scale_channel(&f.cell, &f.channel, f.factor)?;
        }
        Ok(scaled)
    }
}

/// Draw `n` parameter sets with factors uniform in `ranges`
pub fn random_param_sets(ranges: &[FactorRange], n: usize, seed: u64) -> Result<Vec<ParamSet>> {
    for range in ranges {
        range.validate()?;
    }
    let mut rng = StdRng::seed_from_u64(seed);
    Ok((0..n)
        .map(|index| ParamSet {
            index,
            seed: rng.gen(),
            factors: ranges
                .iter()
                .map(|r| ScaleFactor {
                    cell: r.cell.clone(),
                    channel: r.channel.clone(),
                    factor: rng.gen_range(r.low..=r.high),
                })
                .collect(),
        })
        .collect())
}

/// Save parameter sets as JSON
pub fn save_param_sets(path: impl AsRef<Path>, sets: &[ParamSet]) -> Result<()> {
    let text = serde_json::to_string_pretty(sets)?;
    std::fs::write(path.as_ref(), text)?;
    log::info!("Saved {} parameter sets to {}", sets.len(), path.as_ref().display());
    Ok(())
}

/// Load parameter sets saved by [`save_param_sets`]
pub fn load_param_sets(path: impl AsRef<Path>) -> Result<Vec<ParamSet>> {
    let text = std::fs::read_to_string(path.as_ref())?;
    serde_json::from_str(&text).map_err(|e| RuntimeError::parse(path.as_ref(), e.to_string()))
}

/// Study file: which model to sweep and how
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyConfig {
    /// Model file, relative to the study file
    pub model: PathBuf,
    /// Conductance variant
    #[serde(default)]
    pub variant: Option<String>,
    /// Number of random parameter sets
    #[serde(default = "default_runs")]
    pub runs: usize,
    /// Seed of the parameter draw
    #[serde(default)]
    pub seed: u64,
    /// Simulated time per run (s)
    pub stop_time: f64,
    /// Worker threads; the CLI default applies when unset
    #[serde(default)]
    pub jobs: Option<usize>,
    /// Wall-clock budget of the whole sweep (s)
    #[serde(default)]
    pub budget_secs: Option<f64>,
    /// Use the implicit solver
    #[serde(default)]
    pub implicit: bool,
    /// Parameter sets to reuse instead of drawing new ones
    #[serde(default)]
    pub param_sets: Option<PathBuf>,
    /// Factor ranges
    #[serde(default)]
    pub ranges: Vec<FactorRange>,
}

fn default_runs() -> usize {
    10
}

impl StudyConfig {
    /// Read a study file; relative paths are resolved against its directory
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let mut study: StudyConfig =
            toml::from_str(&text).map_err(|e| RuntimeError::parse(path, e.to_string()))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        study.model = base.join(&study.model);
        study.param_sets = study.param_sets.map(|p| base.join(p));
        study.validate()?;
        Ok(study)
    }

    /// Validate settings
    pub fn validate(&self) -> Result<()> {
        if !(self.stop_time > 0.0) || !self.stop_time.is_finite() {
            return Err(RuntimeError::invalid_parameter(
                "stop_time",
                self.stop_time.to_string(),
                "> 0.0",
            ));
        }
        if self.jobs == Some(0) {
            return Err(RuntimeError::invalid_parameter("jobs", "0", ">= 1"));
        }
        if let Some(budget) = self.budget_secs {
            if !(budget > 0.0) || !budget.is_finite() {
                return Err(RuntimeError::invalid_parameter(
                    "budget_secs",
                    budget.to_string(),
                    "> 0.0",
                ));
            }
        }
        for range in &self.ranges {
            range.validate()?;
        }
        Ok(())
    }

    /// Parameter sets of the study, loaded or drawn
    pub fn param_sets(&self) -> Result<Vec<ParamSet>> {
        match &self.param_sets {
            Some(path) => load_param_sets(path),
            None => random_param_sets(&self.ranges, self.runs, self.seed),
        }
    }
}

/// Pool settings
#[derive(Debug, Clone, PartialEq)]
pub struct SweepOptions {
    /// Worker threads
    pub jobs: usize,
    /// Simulated time per run (s)
    pub stop_time: f64,
    /// Wall-clock budget of the whole sweep
    pub budget: Option<Duration>,
    /// Use the implicit solver
    pub implicit: bool,
}

impl SweepOptions {
    /// Options for runs of `stop_time` seconds on `jobs` workers
    pub fn new(jobs: usize, stop_time: f64) -> Self {
        Self {
            jobs: jobs.max(1),
            stop_time,
            budget: None,
            implicit: false,
        }
    }

    /// Limit the whole sweep to `budget`
    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = Some(budget);
        self
    }

    /// Use the implicit solver
    pub fn with_implicit(mut self, implicit: bool) -> Self {
        self.implicit = implicit;
        self
    }
}

/// Result of one sweep run
#[derive(Debug)]
pub struct SweepOutcome {
    /// Parameters of the run
    pub params: ParamSet,
    /// Run result or the reason it failed
    pub result: Result<RunResult>,
}

impl SweepOutcome {
    /// Whether the run hit the budget
    pub fn timed_out(&self) -> bool {
        matches!(self.result, Err(RuntimeError::WorkerTimeout { .. }))
    }
}

fn run_one(def: &ModelDefinition, params: &ParamSet, options: &SweepOptions, deadline: Option<Deadline>) -> Result<RunResult> {
    if let Some(deadline) = deadline {
        if deadline.expired() {
            return Err(RuntimeError::WorkerTimeout {
                run: params.index,
                budget_secs: deadline.budget_secs(),
            });
        }
    }
    let scaled = params.apply(def)?;
    let mut run = RunOptions::new(options.stop_time)?
        .with_seed(params.seed)
        .with_implicit(options.implicit)
        .with_run_index(params.index);
    if let Some(deadline) = deadline {
        run = run.with_deadline(deadline);
    }
    setup_and_run(&scaled, &run)
}

/// Run every parameter set on a pool of `options.jobs` threads.
///
/// `on_done` is called on the calling thread as each run finishes. Outcomes
/// are returned in parameter set order; one failing run never affects the
/// others.
pub fn run_sweep<F>(
    def: &ModelDefinition,
    sets: &[ParamSet],
    options: &SweepOptions,
    mut on_done: F,
) -> Result<Vec<SweepOutcome>>
where
    F: FnMut(&SweepOutcome),
{
    let deadline = options.budget.map(Deadline::new);
    let (job_tx, job_rx) = channel::unbounded::<usize>();
    let (out_tx, out_rx) = channel::unbounded::<(usize, Result<RunResult>)>();
    for i in 0..sets.len() {
        job_tx
            .send(i)
            .map_err(|e| RuntimeError::Worker { reason: e.to_string() })?;
    }
    drop(job_tx);

    let workers = options.jobs.min(sets.len()).max(1);
    log::info!("Sweep of {} runs on {} workers", sets.len(), workers);

    let mut slots: Vec<Option<Result<RunResult>>> = sets.iter().map(|_| None).collect();
    crossbeam::scope(|scope| {
        for _ in 0..workers {
            let job_rx = job_rx.clone();
            let out_tx = out_tx.clone();
            scope.spawn(move |_| {
                for i in job_rx.iter() {
                    let result = run_one(def, &sets[i], options, deadline);
                    if let Err(e) = &result {
                        log::warn!("Run {} failed: {}", sets[i].index, e);
                    }
                    if out_tx.send((i, result)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(out_tx);

        for (i, result) in out_rx.iter() {
            let outcome = SweepOutcome {
                params: sets[i].clone(),
                result,
            };
            on_done(&outcome);
            slots[i] = Some(outcome.result);
        }
    })
    .map_err(|_| RuntimeError::Worker {
        reason: "worker thread panicked".into(),
    })?;

    slots
        .into_iter()
        .zip(sets)
        .map(|(result, params)| {
            let result = result.ok_or_else(|| RuntimeError::Worker {
                reason: format!("run {} produced no result", params.index),
            })?;
            Ok(SweepOutcome {
                params: params.clone(),
                result,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranges() -> Vec<FactorRange> {
        vec![
            FactorRange {
                cell: "hh".into(),
                channel: "HHNa".into(),
                low: 0.5,
                high: 1.5,
            },
            FactorRange {
                cell: "hh".into(),
                channel: "HHK".into(),
                low: 1.0,
                high: 1.0,
            },
        ]
    }

    #[test]
    fn test_random_sets_are_reproducible() {
        let a = random_param_sets(&ranges(), 5, 11).unwrap();
        let b = random_param_sets(&ranges(), 5, 11).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 5);
        for set in &a {
            assert!((0.5..=1.5).contains(&set.factors[0].factor));
            assert_eq!(set.factors[1].factor, 1.0);
        }
        let c = random_param_sets(&ranges(), 5, 12).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_invalid_range() {
        let mut bad = ranges();
        bad[0].low = 2.0;
        assert!(random_param_sets(&bad, 1, 0).is_err());
    }

    #[test]
    fn test_param_sets_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sets.json");
        let sets = random_param_sets(&ranges(), 3, 1).unwrap();
        save_param_sets(&path, &sets).unwrap();
        assert_eq!(load_param_sets(&path).unwrap(), sets);
    }

    #[test]
    fn test_study_paths_resolve_against_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("study.toml");
        std::fs::write(
            &path,
            r#"
model = "model.toml"
stop_time = 0.01
runs = 3
[[ranges]]
cell = "hh"
channel = "HHNa"
low = 0.9
high = 1.1
"#,
        )
        .unwrap();
        let study = StudyConfig::load(&path).unwrap();
        assert_eq!(study.model, dir.path().join("model.toml"));
        assert_eq!(study.param_sets().unwrap().len(), 3);
    }
}
