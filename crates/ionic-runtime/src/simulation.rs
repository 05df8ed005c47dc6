//! Simulation engine for compartmental models

use crate::{
    cell::CellInstance,
    error::*,
    model::{instance_path, ModelDefinition},
    recording::{Recorder, RunResult},
    solver::Integrator,
    sources::PulseGenerator,
};
use ionic_core::{
    CalciumPlasticityRule, ClockScheduler, ElementCategory, Phase, TableCache, TableGrids,
};
use rand::{rngs::StdRng, SeedableRng};
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Wall-clock budget shared by the runs of a sweep
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Deadline {
    start: Instant,
    budget: Duration,
}

impl Deadline {
    /// Budget starting now
    pub fn new(budget: Duration) -> Self {
        Self::starting_at(Instant::now(), budget)
    }

    /// Budget starting at `start`
    pub fn starting_at(start: Instant, budget: Duration) -> Self {
        Self { start, budget }
    }

    /// Whether the budget is used up
    pub fn expired(&self) -> bool {
        self.start.elapsed() >= self.budget
    }

    /// Budget in seconds
    pub fn budget_secs(&self) -> f64 {
        self.budget.as_secs_f64()
    }
}

/// Per-run options
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    /// Simulated time (s)
    pub stop_time: f64,
    /// Seed for the per-instance conductance variance
    pub seed: u64,
    /// Override the model's solver choice
    pub implicit: Option<bool>,
    /// Override the model's channel current recording
    pub currents: Option<bool>,
    /// Wall-clock budget, checked at every tick
    pub deadline: Option<Deadline>,
    /// Index reported in timeout errors
    pub run_index: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            stop_time: 0.1,
            seed: 1,
            implicit: None,
            currents: None,
            deadline: None,
            run_index: 0,
        }
    }
}

impl RunOptions {
    /// Options for a run of `stop_time` seconds
    pub fn new(stop_time: f64) -> Result<Self> {
        if !(stop_time > 0.0) || !stop_time.is_finite() {
            return Err(RuntimeError::invalid_parameter(
                "stop_time",
                stop_time.to_string(),
                "> 0.0",
            ));
        }
        Ok(Self {
            stop_time,
            ..Default::default()
        })
    }

    /// Set the seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Force the implicit or explicit solver
    pub fn with_implicit(mut self, implicit: bool) -> Self {
        self.implicit = Some(implicit);
        self
    }

    /// Force channel current recording on or off
    pub fn with_currents(mut self, currents: bool) -> Self {
        self.currents = Some(currents);
        self
    }

    /// Abort when `deadline` expires
    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Set the run index
    pub fn with_run_index(mut self, index: usize) -> Self {
        self.run_index = index;
        self
    }

    /// Validate options
    pub fn validate(&self) -> Result<()> {
        Self::new(self.stop_time)?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct Stimulus {
    pulse: PulseGenerator,
    cell: usize,
    compartment: usize,
}

type SlotPlan = SmallVec<[(ElementCategory, Phase); 4]>;

/// One run: instantiated cells, their clocks and recorders
#[derive(Debug)]
pub struct Simulation {
    model: String,
    variant: String,
    seed: u64,
    scheduler: ClockScheduler,
    plan: Vec<SlotPlan>,
    cells: Vec<CellInstance>,
    integrators: Vec<Integrator>,
    stimuli: Vec<Stimulus>,
    plasticity: Option<CalciumPlasticityRule>,
    recorder: Recorder,
    dt: f64,
    tick: u64,
    deadline: Option<Deadline>,
    run_index: usize,
}

impl Simulation {
    /// Build every cell instance, assign clocks and take the initial sample
    pub fn setup(def: &ModelDefinition, options: &RunOptions) -> Result<Self> {
        options.validate()?;
        let mut clocks = def.clocks;
        if let Some(implicit) = options.implicit {
            clocks.implicit = implicit;
        }

        let mut cache = TableCache::new();
        let grids = TableGrids::standard();
        let mut rng = StdRng::seed_from_u64(options.seed);
        let mut cells = Vec::new();
        for cell in &def.cells {
            for index in 0..cell.instances {
                cells.push(CellInstance::build(def, cell, index, &mut cache, &grids, &mut rng)?);
            }
        }
        log::info!(
            "Instantiated {} cells of model {} ({} rate tables)",
            cells.len(),
            def.name,
            cache.len()
        );

        let stimuli = def
            .stimuli
            .iter()
            .map(|p| {
                let path = instance_path(&p.cell, p.instance);
                let cell = cells
                    .iter()
                    .position(|c| c.path == path)
                    .ok_or_else(|| RuntimeError::invalid_model(format!("no cell instance {}", path)))?;
                let compartment = cells[cell].compartment_index(&p.compartment).ok_or_else(|| {
                    RuntimeError::invalid_model(format!("{} has no compartment {}", path, p.compartment))
                })?;
                Ok(Stimulus {
                    pulse: PulseGenerator::new(p),
                    cell,
                    compartment,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut scheduler = ClockScheduler::new();
        scheduler.assign(&def.instance_paths(), &clocks)?;
        scheduler.begin_integration()?;
        let plan = scheduler
            .assignments()
            .iter()
            .map(|slot| {
                let mut kinds = SlotPlan::new();
                for entry in &slot.entries {
                    let kind = (entry.category, entry.phase);
                    if !kinds.contains(&kind) {
                        kinds.push(kind);
                    }
                }
                kinds
            })
            .collect();

        let integrators = cells
            .iter()
            .map(|c| Integrator::for_cell(c, clocks.implicit))
            .collect();
        let currents = options.currents.unwrap_or(def.recording.currents);
        let mut recorder = Recorder::new(&cells, &def.recording.compartments, currents);
        recorder.sample(0.0, &cells);

        Ok(Self {
            model: def.name.clone(),
            variant: def.variant.clone(),
            seed: options.seed,
            scheduler,
            plan,
            cells,
            integrators,
            stimuli,
            plasticity: def.plasticity.clone(),
            recorder,
            dt: clocks.sim_dt,
            tick: 0,
            deadline: options.deadline,
            run_index: options.run_index,
        })
    }

    /// Simulated time at the start of the next tick (s)
    pub fn time(&self) -> f64 {
        self.tick as f64 * self.dt
    }

    /// Ticks executed so far
    pub fn ticks(&self) -> u64 {
        self.tick
    }

    /// Clock assignment of this run
    pub fn scheduler(&self) -> &ClockScheduler {
        &self.scheduler
    }

    /// Cell instances
    pub fn cells(&self) -> &[CellInstance] {
        &self.cells
    }

    /// Execute one tick: every due slot in slot order
    pub fn step(&mut self) -> Result<()> {
        if let Some(deadline) = self.deadline {
            if deadline.expired() {
                return Err(RuntimeError::WorkerTimeout {
                    run: self.run_index,
                    budget_secs: deadline.budget_secs(),
                });
            }
        }

        let t_end = (self.tick + 1) as f64 * self.dt;
        let due: SmallVec<[(usize, f64); 7]> = self
            .scheduler
            .due_slots(self.tick)
            .map(|s| (s.slot.index(), s.dt))
            .collect();
        for (slot, dt) in due {
            for k in 0..self.plan[slot].len() {
                let (category, phase) = self.plan[slot][k];
                self.process(category, phase, dt, t_end)?;
            }
        }
        self.tick += 1;
        Ok(())
    }

    fn process(&mut self, category: ElementCategory, phase: Phase, dt: f64, t: f64) -> Result<()> {
        match (category, phase) {
            (ElementCategory::Compartment, Phase::Init) => {
                self.cells.iter_mut().for_each(CellInstance::take_snapshot);
            }
            (ElementCategory::Compartment, Phase::Process) | (ElementCategory::ImplicitSolver, _) => {
                for (cell, integrator) in self.cells.iter_mut().zip(&mut self.integrators) {
                    integrator.advance(cell, dt);
                    if let Some(comp) = cell.compartments.iter().find(|c| !c.vm.is_finite()) {
                        return Err(RuntimeError::simulation_step(
                            t,
                            format!("membrane potential of {}/{} diverged", cell.path, comp.name),
                        ));
                    }
                }
            }
            (ElementCategory::CalciumPool, _) => {
                self.cells.iter_mut().for_each(|c| c.advance_pools(dt));
            }
            (ElementCategory::IonChannel, _) => {
                self.cells.iter_mut().for_each(|c| c.advance_channels(dt));
            }
            (ElementCategory::SynapticChannel, _) => {
                self.cells.iter_mut().for_each(|c| c.advance_synapses(dt));
            }
            (ElementCategory::PlasticityFunction, _) => {
                if let Some(rule) = &self.plasticity {
                    for cell in &mut self.cells {
                        cell.apply_plasticity(rule, dt);
                    }
                }
            }
            (ElementCategory::SpikeGenerator, _) => {
                for cell in &mut self.cells {
                    let vm = cell.soma_vm();
                    if cell.spikes.process(vm, t) {
                        log::trace!("{} spiked at {} s", cell.path, t);
                    }
                }
            }
            (ElementCategory::TimeTable, _) => {
                self.cells.iter_mut().for_each(|c| c.deliver_events(t));
            }
            (ElementCategory::PulseGenerator, _) => {
                for comp in self.cells.iter_mut().flat_map(|c| c.compartments.iter_mut()) {
                    comp.inject = 0.0;
                }
                for stim in &mut self.stimuli {
                    self.cells[stim.cell].compartments[stim.compartment].inject += stim.pulse.process(t);
                }
            }
            (ElementCategory::Recorder, _) => {
                self.recorder.sample(t, &self.cells);
            }
        }
        Ok(())
    }

    /// Run until `stop_time` and collect the results
    pub fn run(mut self, stop_time: f64) -> Result<RunResult> {
        let ticks = (stop_time / self.dt).round().max(0.0) as u64;
        log::info!(
            "Running {} (variant {}) for {} s: {} ticks of {} s",
            self.model,
            self.variant,
            stop_time,
            ticks,
            self.dt
        );
        let started = Instant::now();
        let report_every = (ticks / 10).max(1);
        while self.tick < ticks {
            self.step()?;
            if self.tick % report_every == 0 {
                log::debug!("Progress: {:.0}%", self.tick as f64 / ticks as f64 * 100.0);
            }
        }

        let spikes: BTreeMap<String, Vec<f64>> = self
            .cells
            .iter()
            .map(|c| (c.path.clone(), c.spikes.spikes.clone()))
            .collect();
        let (times, traces) = self.recorder.finish();
        let result = RunResult {
            model: self.model,
            variant: self.variant,
            seed: self.seed,
            stop_time,
            ticks: self.tick,
            times,
            traces,
            spikes,
        };
        log::info!(
            "Run completed in {:.2?}: {} spikes, {} samples",
            started.elapsed(),
            result.total_spikes(),
            result.times.len()
        );
        Ok(result)
    }
}

/// Instantiate `def`, assign clocks and run it to `options.stop_time`
pub fn setup_and_run(def: &ModelDefinition, options: &RunOptions) -> Result<RunResult> {
    Simulation::setup(def, options)?.run(options.stop_time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelConfig;
    use crate::recording::TraceKind;
    use ionic_core::{ClockSlot, SchedulerState};
    use std::path::Path;

    const PASSIVE: &str = r#"
name = "passive"

[clocks]
sim_dt = 25e-6
plot_dt = 100e-6

[[channels]]
preset = "HHK"

[variants.default]

[[cells]]
name = "ball"
instances = 2
passive = { cm = 0.01, rm = 1.0, ra = 1.0, em = -0.07 }
compartments = [{ name = "soma", length = 20e-6, diameter = 20e-6, region = "soma" }]

[[stimuli]]
cell = "ball"
instance = 1
compartment = "soma"
delay = 1e-3
width = 2e-3
amplitude = 10e-12
"#;

    fn passive() -> ModelDefinition {
        ModelConfig::from_toml_str(PASSIVE, Path::new("passive.toml"))
            .unwrap()
            .into_definition(None)
            .unwrap()
    }

    #[test]
    fn test_run_options_validation() {
        assert!(RunOptions::new(0.0).is_err());
        assert!(RunOptions::new(f64::NAN).is_err());
        let opts = RunOptions::new(0.01).unwrap().with_seed(3).with_implicit(true);
        assert_eq!(opts.seed, 3);
        assert_eq!(opts.implicit, Some(true));
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_setup_assigns_clocks() {
        let sim = Simulation::setup(&passive(), &RunOptions::new(1e-3).unwrap()).unwrap();
        assert_eq!(sim.scheduler().state(), SchedulerState::Running);
        assert!(sim.scheduler().is_scheduled("/ball_0"));
        assert!(sim.scheduler().is_scheduled("/ball_1"));
        let recording = sim.scheduler().assignment(ClockSlot::Recording).unwrap();
        assert_eq!(recording.stride, 4);
        assert_eq!(sim.cells().len(), 2);
    }

    #[test]
    fn test_recording_grid() {
        let result = setup_and_run(&passive(), &RunOptions::new(2e-3).unwrap()).unwrap();
        assert_eq!(result.ticks, 80);
        assert_eq!(result.times.len(), 21);
        for (i, t) in result.times.iter().enumerate() {
            assert!((t - i as f64 * 1e-4).abs() < 1e-12);
        }
    }

    #[test]
    fn test_pulse_reaches_only_its_target() {
        let result = setup_and_run(&passive(), &RunOptions::new(3e-3).unwrap()).unwrap();
        let quiet = result.trace("/ball_0", "soma", TraceKind::Voltage).unwrap();
        let driven = result.trace("/ball_1", "soma", TraceKind::Voltage).unwrap();
        assert!(quiet.values.iter().all(|v| (v + 0.07).abs() < 1e-12));
        assert!(driven.max() > -0.07 + 1e-4);
        // nothing happens before the pulse starts
        assert!((driven.values[10] + 0.07).abs() < 1e-12);
    }

    #[test]
    fn test_solvers_agree_on_passive_response() {
        let explicit = setup_and_run(&passive(), &RunOptions::new(3e-3).unwrap()).unwrap();
        let implicit =
            setup_and_run(&passive(), &RunOptions::new(3e-3).unwrap().with_implicit(true)).unwrap();
        let e = explicit.trace("/ball_1", "soma", TraceKind::Voltage).unwrap();
        let i = implicit.trace("/ball_1", "soma", TraceKind::Voltage).unwrap();
        for (a, b) in e.values.iter().zip(&i.values) {
            assert!((a - b).abs() < 2e-4);
        }
    }

    #[test]
    fn test_expired_deadline_times_out() {
        let opts = RunOptions::new(1e-3)
            .unwrap()
            .with_run_index(4)
            .with_deadline(Deadline::new(Duration::ZERO));
        let err = setup_and_run(&passive(), &opts).unwrap_err();
        assert!(matches!(err, RuntimeError::WorkerTimeout { run: 4, .. }));
    }
}
