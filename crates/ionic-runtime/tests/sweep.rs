use ionic_runtime::sweep::{FactorRange, StudyConfig};
use ionic_runtime::*;
use std::path::PathBuf;
use std::time::Duration;

fn models_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../models")
}

fn sodium_range() -> Vec<FactorRange> {
    vec![FactorRange {
        cell: "hh".into(),
        channel: "HHNa".into(),
        low: 0.9,
        high: 1.1,
    }]
}

#[test]
fn sweep_runs_every_set_in_order() {
    let def = ModelDefinition::load(models_dir().join("hh_single.toml"), None).unwrap();
    let sets = random_param_sets(&sodium_range(), 4, 99).unwrap();
    let mut seen = Vec::new();
    let outcomes = run_sweep(&def, &sets, &SweepOptions::new(2, 2e-3), |o| seen.push(o.params.index)).unwrap();

    assert_eq!(outcomes.len(), 4);
    seen.sort_unstable();
    assert_eq!(seen, vec![0, 1, 2, 3]);
    for (i, outcome) in outcomes.iter().enumerate() {
        assert_eq!(outcome.params.index, i);
        let result = outcome.result.as_ref().unwrap();
        assert_eq!(result.seed, sets[i].seed);
    }
}

#[test]
fn scaled_runs_match_a_direct_run() {
    let def = ModelDefinition::load(models_dir().join("hh_single.toml"), None).unwrap();
    let sets = random_param_sets(&sodium_range(), 1, 3).unwrap();
    let outcomes = run_sweep(&def, &sets, &SweepOptions::new(1, 2e-3), |_| {}).unwrap();

    let scaled = sets[0].apply(&def).unwrap();
    let direct = setup_and_run(&scaled, &RunOptions::new(2e-3).unwrap().with_seed(sets[0].seed)).unwrap();
    assert_eq!(outcomes[0].result.as_ref().unwrap(), &direct);
}

#[test]
fn exhausted_budget_times_out_every_run() {
    let def = ModelDefinition::load(models_dir().join("hh_single.toml"), None).unwrap();
    let sets = random_param_sets(&sodium_range(), 3, 1).unwrap();
    let options = SweepOptions::new(2, 5e-3).with_budget(Duration::ZERO);
    let outcomes = run_sweep(&def, &sets, &options, |_| {}).unwrap();
    assert!(outcomes.iter().all(SweepOutcome::timed_out));
}

#[test]
fn study_file_drives_a_sweep() {
    let study = StudyConfig::load(models_dir().join("study.toml")).unwrap();
    let def = ModelDefinition::load(&study.model, study.variant.as_deref()).unwrap();
    let sets = study.param_sets().unwrap();
    assert_eq!(sets.len(), study.runs);
    let options = SweepOptions::new(study.jobs.unwrap_or(2), 1e-3);
    let outcomes = run_sweep(&def, &sets[..2], &options, |_| {}).unwrap();
    assert!(outcomes.iter().all(|o| o.result.is_ok()));
}
