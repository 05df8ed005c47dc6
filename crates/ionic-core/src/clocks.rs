//! Clock slots and the per-run clock scheduler
//!
//! Every simulated element category is assigned to one of seven fixed slots.
//! Within a tick, due slots are processed in slot order. A slot with stride
//! `k` is due on every k-th tick, so its updates land on multiples of its
//! own timestep.

use crate::error::*;
use std::collections::BTreeSet;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Fixed update slots, in processing order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ClockSlot {
    /// Compartment init phase (axial exchange)
    CompartmentInit = 0,
    /// Voltage integration and calcium pools
    Voltage = 1,
    /// Channel gating and synaptic conductances
    Gating = 2,
    /// Functional blocks such as plasticity
    Function = 3,
    /// Spike generators and time tables
    SpikeSource = 4,
    /// Pulse generators
    Stimulus = 5,
    /// Recorders
    Recording = 6,
}

impl ClockSlot {
    /// All slots in processing order
    pub const ALL: [ClockSlot; 7] = [
        ClockSlot::CompartmentInit,
        ClockSlot::Voltage,
        ClockSlot::Gating,
        ClockSlot::Function,
        ClockSlot::SpikeSource,
        ClockSlot::Stimulus,
        ClockSlot::Recording,
    ];

    /// Slot number
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ClockSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClockSlot::CompartmentInit => "compartment-init",
            ClockSlot::Voltage => "voltage",
            ClockSlot::Gating => "gating",
            ClockSlot::Function => "function",
            ClockSlot::SpikeSource => "spike-source",
            ClockSlot::Stimulus => "stimulus",
            ClockSlot::Recording => "recording",
        };
        write!(f, "{}", name)
    }
}

/// Structural category of a simulated element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementCategory {
    /// Individually integrated compartment
    Compartment,
    /// Aggregate implicit solver for a whole compartment tree
    ImplicitSolver,
    /// Calcium concentration pool
    CalciumPool,
    /// Voltage/calcium gated ion channel
    IonChannel,
    /// Synaptic conductance
    SynapticChannel,
    /// Plasticity function
    PlasticityFunction,
    /// Spike generator
    SpikeGenerator,
    /// Spike time table
    TimeTable,
    /// Current pulse generator
    PulseGenerator,
    /// Trace recorder
    Recorder,
}

/// Which operation of an element a slot drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    /// Preparation before the voltage update
    Init,
    /// State update
    Process,
}

/// Timesteps of every slot
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClockConfig {
    /// Finest timestep, used by slots 0 and 1 (s)
    pub sim_dt: f64,
    /// Gating and function timestep (s)
    pub gating_dt: f64,
    /// Spike source timestep (s)
    pub spike_dt: f64,
    /// Stimulus timestep (s)
    pub stimulus_dt: f64,
    /// Recording timestep (s)
    pub plot_dt: f64,
    /// Solve the cable equations with the implicit tree solver
    #[cfg_attr(feature = "serde", serde(default))]
    pub implicit: bool,
}

impl ClockConfig {
    /// All slots at `sim_dt` except recording at `plot_dt`
    pub fn new(sim_dt: f64, plot_dt: f64) -> Self {
        Self {
            sim_dt,
            gating_dt: sim_dt,
            spike_dt: sim_dt,
            stimulus_dt: sim_dt,
            plot_dt,
            implicit: false,
        }
    }

    /// Set the gating timestep
    pub fn with_gating_dt(mut self, dt: f64) -> Self {
        self.gating_dt = dt;
        self
    }

    /// Set the spike source timestep
    pub fn with_spike_dt(mut self, dt: f64) -> Self {
        self.spike_dt = dt;
        self
    }

    /// Set the stimulus timestep
    pub fn with_stimulus_dt(mut self, dt: f64) -> Self {
        self.stimulus_dt = dt;
        self
    }

    /// Select the implicit solver
    pub fn with_implicit(mut self, implicit: bool) -> Self {
        self.implicit = implicit;
        self
    }

    /// Timestep of a slot
    pub fn dt(&self, slot: ClockSlot) -> f64 {
        match slot {
            ClockSlot::CompartmentInit | ClockSlot::Voltage => self.sim_dt,
            ClockSlot::Gating | ClockSlot::Function => self.gating_dt,
            ClockSlot::SpikeSource => self.spike_dt,
            ClockSlot::Stimulus => self.stimulus_dt,
            ClockSlot::Recording => self.plot_dt,
        }
    }

    /// Number of sim ticks per update of a slot
    pub fn stride(&self, slot: ClockSlot) -> Result<u64> {
        let dt = self.dt(slot);
        let ratio = dt / self.sim_dt;
        let rounded = ratio.round();
        if rounded < 1.0 || (ratio - rounded).abs() > 1e-6 * rounded {
            return Err(CoreError::invalid_clock(format!(
                "{} dt {} is not an integer multiple of sim dt {}",
                slot, dt, self.sim_dt
            )));
        }
        Ok(rounded as u64)
    }

    /// Check positivity, integer strides and slot ordering
    pub fn validate(&self) -> Result<()> {
        for slot in ClockSlot::ALL {
            let dt = self.dt(slot);
            if !dt.is_finite() || dt <= 0.0 {
                return Err(CoreError::invalid_clock(format!("{} dt {} must be > 0", slot, dt)));
            }
        }
        for slot in ClockSlot::ALL {
            self.stride(slot)?;
        }
        if ClockSlot::ALL.iter().any(|s| self.dt(*s) > self.plot_dt) {
            return Err(CoreError::invalid_clock(format!(
                "plot dt {} must be the coarsest timestep",
                self.plot_dt
            )));
        }
        Ok(())
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self::new(25e-6, 100e-6)
    }
}

/// One scheduled `(target, category, phase)` entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScheduledEntry {
    /// Cell instance path, or `/` for global elements
    pub target: String,
    /// Element category
    pub category: ElementCategory,
    /// Phase driven by the slot
    pub phase: Phase,
}

/// Timestep, stride and entries of one slot
#[derive(Debug, Clone, PartialEq)]
pub struct SlotAssignment {
    /// Slot
    pub slot: ClockSlot,
    /// Timestep (s)
    pub dt: f64,
    /// Sim ticks per update
    pub stride: u64,
    /// Scheduled entries, in assignment order
    pub entries: Vec<ScheduledEntry>,
}

impl SlotAssignment {
    /// Distinct categories scheduled on the slot
    pub fn categories(&self) -> BTreeSet<ElementCategory> {
        self.entries.iter().map(|e| e.category).collect()
    }
}

/// Lifecycle of a scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Nothing assigned yet
    Unscheduled,
    /// Slots assigned, integration not started
    Scheduled,
    /// Integration has begun; assignment is closed
    Running,
}

/// Global elements are scheduled under this target
pub const GLOBAL_TARGET: &str = "/";

/// Per-run clock scheduler
#[derive(Debug, Clone)]
pub struct ClockScheduler {
    state: SchedulerState,
    config: Option<ClockConfig>,
    slots: Vec<SlotAssignment>,
    targets: BTreeSet<String>,
}

impl Default for ClockScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockScheduler {
    /// Create an unscheduled scheduler
    pub fn new() -> Self {
        Self {
            state: SchedulerState::Unscheduled,
            config: None,
            slots: Vec::new(),
            targets: BTreeSet::new(),
        }
    }

    /// Current state
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Configuration fixed by the first assignment
    pub fn config(&self) -> Option<&ClockConfig> {
        self.config.as_ref()
    }

    /// Assign every element category of `targets` to its slot.
    ///
    /// Targets that are already scheduled are skipped, so repeated calls
    /// never double-schedule. Returns the number of newly scheduled targets.
    pub fn assign<S: AsRef<str>>(&mut self, targets: &[S], config: &ClockConfig) -> Result<usize> {
        if self.state == SchedulerState::Running {
            return Err(CoreError::scheduling_violation(
                "clocks assigned after integration began",
            ));
        }
        let config = match self.config {
            Some(existing) => {
                if existing != *config {
                    log::warn!("Clock configuration already fixed for this run, ignoring new timesteps");
                }
                existing
            }
            None => {
                config.validate()?;
                self.slots = ClockSlot::ALL
                    .iter()
                    .map(|&slot| {
                        Ok(SlotAssignment {
                            slot,
                            dt: config.dt(slot),
                            stride: config.stride(slot)?,
                            entries: Vec::new(),
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                log::info!(
                    "Clocks: sim dt {} s, gating dt {} s, plot dt {} s{}",
                    config.sim_dt,
                    config.gating_dt,
                    config.plot_dt,
                    if config.implicit { ", implicit solver" } else { "" }
                );
                self.config = Some(*config);
                self.schedule_globals();
                *config
            }
        };

        let mut added = 0;
        for target in targets {
            let target = target.as_ref();
            if !self.targets.insert(target.to_string()) {
                log::debug!("{} already scheduled, skipping", target);
                continue;
            }
            self.schedule_target(target, config.implicit);
            added += 1;
        }
        self.state = SchedulerState::Scheduled;
        Ok(added)
    }

    fn push(&mut self, slot: ClockSlot, target: &str, category: ElementCategory, phase: Phase) {
        self.slots[slot.index()].entries.push(ScheduledEntry {
            target: target.to_string(),
            category,
            phase,
        });
    }

    fn schedule_target(&mut self, target: &str, implicit: bool) {
        use ElementCategory::*;
        if implicit {
            self.push(ClockSlot::Voltage, target, ImplicitSolver, Phase::Process);
        } else {
            self.push(ClockSlot::CompartmentInit, target, Compartment, Phase::Init);
            self.push(ClockSlot::Voltage, target, Compartment, Phase::Process);
        }
        self.push(ClockSlot::Voltage, target, CalciumPool, Phase::Process);
        self.push(ClockSlot::Gating, target, IonChannel, Phase::Process);
        self.push(ClockSlot::Gating, target, SynapticChannel, Phase::Process);
        self.push(ClockSlot::Function, target, PlasticityFunction, Phase::Process);
        self.push(ClockSlot::SpikeSource, target, SpikeGenerator, Phase::Process);
        self.push(ClockSlot::SpikeSource, target, TimeTable, Phase::Process);
        log::debug!("Scheduled elements under {}", target);
    }

    fn schedule_globals(&mut self) {
        self.push(ClockSlot::Stimulus, GLOBAL_TARGET, ElementCategory::PulseGenerator, Phase::Process);
        self.push(ClockSlot::Recording, GLOBAL_TARGET, ElementCategory::Recorder, Phase::Process);
    }

    /// Close assignment; the first integration step may follow
    pub fn begin_integration(&mut self) -> Result<()> {
        match self.state {
            SchedulerState::Unscheduled => Err(CoreError::scheduling_violation(
                "integration started before clocks were assigned",
            )),
            SchedulerState::Scheduled => {
                self.state = SchedulerState::Running;
                Ok(())
            }
            SchedulerState::Running => Ok(()),
        }
    }

    /// Discard every assignment, as when the whole simulation is rebuilt
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Whether `target` has been scheduled
    pub fn is_scheduled(&self, target: &str) -> bool {
        self.targets.contains(target)
    }

    /// Assignment of one slot, once clocks are assigned
    pub fn assignment(&self, slot: ClockSlot) -> Option<&SlotAssignment> {
        self.slots.get(slot.index())
    }

    /// All slot assignments in processing order
    pub fn assignments(&self) -> &[SlotAssignment] {
        &self.slots
    }

    /// Slot a category is processed on, with the phase
    pub fn slot_for(&self, category: ElementCategory, phase: Phase) -> Option<ClockSlot> {
        self.slots
            .iter()
            .find(|s| s.entries.iter().any(|e| e.category == category && e.phase == phase))
            .map(|s| s.slot)
    }

    /// Slots due on sim tick `tick` (covering `[tick·dt, (tick+1)·dt)`), in
    /// processing order
    pub fn due_slots(&self, tick: u64) -> impl Iterator<Item = &SlotAssignment> + '_ {
        self.slots.iter().filter(move |s| (tick + 1) % s.stride == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        assert!(ClockConfig::default().validate().is_ok());
        assert!(ClockConfig::new(0.0, 1e-4).validate().is_err());
        assert!(ClockConfig::new(25e-6, 30e-6).validate().is_err());
        assert!(ClockConfig::new(25e-6, 10e-6).validate().is_err());
        let coarse_gating = ClockConfig::new(25e-6, 1e-4).with_gating_dt(50e-6);
        assert!(coarse_gating.validate().is_ok());
        assert_eq!(coarse_gating.stride(ClockSlot::Gating).unwrap(), 2);
        assert_eq!(coarse_gating.stride(ClockSlot::Recording).unwrap(), 4);
    }

    #[test]
    fn test_assign_explicit() {
        let mut sched = ClockScheduler::new();
        assert_eq!(sched.state(), SchedulerState::Unscheduled);
        let added = sched.assign(&["/D1_0"], &ClockConfig::default()).unwrap();
        assert_eq!(added, 1);
        assert_eq!(sched.state(), SchedulerState::Scheduled);

        assert_eq!(
            sched.slot_for(ElementCategory::Compartment, Phase::Init),
            Some(ClockSlot::CompartmentInit)
        );
        assert_eq!(
            sched.slot_for(ElementCategory::Compartment, Phase::Process),
            Some(ClockSlot::Voltage)
        );
        assert_eq!(
            sched.slot_for(ElementCategory::CalciumPool, Phase::Process),
            Some(ClockSlot::Voltage)
        );
        assert_eq!(
            sched.slot_for(ElementCategory::Recorder, Phase::Process),
            Some(ClockSlot::Recording)
        );
        assert_eq!(sched.slot_for(ElementCategory::ImplicitSolver, Phase::Process), None);
    }

    #[test]
    fn test_assign_implicit_substitutes_solver() {
        let mut sched = ClockScheduler::new();
        let config = ClockConfig::default().with_implicit(true);
        sched.assign(&["/D1_0", "/D2_0"], &config).unwrap();
        let voltage = sched.assignment(ClockSlot::Voltage).unwrap();
        assert!(voltage.categories().contains(&ElementCategory::ImplicitSolver));
        assert!(!voltage.categories().contains(&ElementCategory::Compartment));
        assert!(sched.assignment(ClockSlot::CompartmentInit).unwrap().entries.is_empty());
        // timing is unchanged
        assert_eq!(voltage.dt, config.sim_dt);
    }

    #[test]
    fn test_assign_is_idempotent() {
        let config = ClockConfig::default();
        let mut once = ClockScheduler::new();
        once.assign(&["/a", "/b"], &config).unwrap();

        let mut twice = ClockScheduler::new();
        twice.assign(&["/a", "/b"], &config).unwrap();
        assert_eq!(twice.assign(&["/a", "/b"], &config).unwrap(), 0);
        assert_eq!(once.assignments(), twice.assignments());
    }

    #[test]
    fn test_assign_after_start_is_violation() {
        let mut sched = ClockScheduler::new();
        sched.assign(&["/a"], &ClockConfig::default()).unwrap();
        sched.begin_integration().unwrap();
        let err = sched.assign(&["/b"], &ClockConfig::default()).unwrap_err();
        assert!(matches!(err, CoreError::SchedulingViolation { .. }));
        assert!(!err.is_configuration_error());
    }

    #[test]
    fn test_begin_requires_assignment() {
        let mut sched = ClockScheduler::new();
        assert!(sched.begin_integration().is_err());
    }

    #[test]
    fn test_reset_allows_new_run() {
        let mut sched = ClockScheduler::new();
        sched.assign(&["/a"], &ClockConfig::default()).unwrap();
        sched.begin_integration().unwrap();
        sched.reset();
        assert_eq!(sched.state(), SchedulerState::Unscheduled);
        assert!(!sched.is_scheduled("/a"));
        assert_eq!(sched.assign(&["/a"], &ClockConfig::new(50e-6, 1e-4)).unwrap(), 1);
    }

    #[test]
    fn test_due_slots_follow_strides() {
        let mut sched = ClockScheduler::new();
        let config = ClockConfig::new(25e-6, 100e-6).with_gating_dt(50e-6);
        sched.assign(&["/a"], &config).unwrap();
        let due = |tick| sched.due_slots(tick).map(|s| s.slot).collect::<Vec<_>>();
        assert_eq!(due(3).len(), 7);
        assert_eq!(
            due(0),
            vec![
                ClockSlot::CompartmentInit,
                ClockSlot::Voltage,
                ClockSlot::SpikeSource,
                ClockSlot::Stimulus
            ]
        );
        assert!(due(1).contains(&ClockSlot::Gating));
        assert!(!due(1).contains(&ClockSlot::Recording));
        assert!(due(7).contains(&ClockSlot::Recording));
    }

    #[test]
    fn test_invalid_config_is_configuration_error() {
        let mut sched = ClockScheduler::new();
        let err = sched.assign(&["/a"], &ClockConfig::new(25e-6, 33e-6)).unwrap_err();
        assert!(err.is_configuration_error());
        assert_eq!(sched.state(), SchedulerState::Unscheduled);
    }
}
