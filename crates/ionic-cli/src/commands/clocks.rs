//! Clock schedule inspection

use clap::Args;
use ionic_core::ClockScheduler;
use ionic_runtime::{ModelDefinition, RunOptions, Simulation};
use std::path::PathBuf;

use crate::error::CliResult;

/// Show which element categories each clock slot drives
#[derive(Args, Debug)]
pub struct ClocksCommand {
    /// Model file (.toml)
    pub model: PathBuf,

    /// Conductance variant (defaults to the one the file selects)
    #[arg(long)]
    pub variant: Option<String>,

    /// Schedule for the implicit solver
    #[arg(long)]
    pub implicit: bool,
}

impl ClocksCommand {
    pub fn execute(self) -> CliResult<()> {
        let def = ModelDefinition::load(&self.model, self.variant.as_deref())?;
        let options = RunOptions::default().with_implicit(self.implicit || def.clocks.implicit);
        let sim = Simulation::setup(&def, &options)?;
        print!("{}", schedule_table(sim.scheduler()));
        Ok(())
    }
}

/// One line per assigned slot: number, name, timestep, stride and categories
pub fn schedule_table(scheduler: &ClockScheduler) -> String {
    let mut out = String::from("slot name             dt (s)     stride  categories\n");
    for assignment in scheduler.assignments() {
        let categories: Vec<String> = assignment
            .categories()
            .iter()
            .map(|c| format!("{:?}", c))
            .collect();
        out.push_str(&format!(
            "{:<4} {:<16} {:<10e} {:<7} {}\n",
            assignment.slot.index(),
            assignment.slot.to_string(),
            assignment.dt,
            assignment.stride,
            categories.join(", ")
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ionic_core::ClockConfig;

    #[test]
    fn test_schedule_table_lists_assigned_slots() {
        let mut scheduler = ClockScheduler::new();
        let config = ClockConfig::new(25e-6, 100e-6);
        scheduler.assign(&["/cell_0"], &config).unwrap();
        let table = schedule_table(&scheduler);

        let voltage = table.lines().find(|l| l.contains("voltage")).unwrap();
        assert!(voltage.contains("Compartment"));
        let recording = table.lines().find(|l| l.contains("recording")).unwrap();
        assert!(recording.split_whitespace().any(|c| c == "4"));
        assert!(recording.contains("Recorder"));
        assert!(!table.contains("ImplicitSolver"));
    }
}
