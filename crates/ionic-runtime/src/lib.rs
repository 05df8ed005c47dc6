//! Compartmental simulation runtime for ionic neuron models
//!
//! This crate turns declarative model files into running simulations:
//! compartment trees with passive cable parameters, channel instances driven
//! by the shared rate tables of `ionic-core`, calcium pools, synapses, pulse
//! stimuli and trace recorders, advanced on the seven-slot clock schedule by
//! either an explicit or an implicit (Hines) voltage integrator. Parameter
//! sweeps run independent simulations on a worker pool.

#![deny(missing_docs)]
#![warn(clippy::all)]

// Core modules
pub mod error;
pub mod morphology;
pub mod calcium;
pub mod sources;
pub mod synapse;
pub mod model;
pub mod cell;
pub mod solver;
pub mod recording;
pub mod simulation;
pub mod sweep;

// Re-export essential types
pub use error::{RuntimeError, Result};
pub use model::{ModelConfig, ModelDefinition};
pub use recording::{RunResult, Trace, TraceKey, TraceKind};
pub use simulation::{setup_and_run, Deadline, RunOptions, Simulation};
pub use sweep::{random_param_sets, run_sweep, ParamSet, StudyConfig, SweepOptions, SweepOutcome};

/// Runtime crate version for compatibility checking
pub const RUNTIME_VERSION: u32 = 1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_integration() {
        let opts = RunOptions::default();
        assert!(opts.validate().is_ok());
        assert!(opts.stop_time > 0.0);

        let sets = random_param_sets(&[], 2, 0).unwrap();
        assert_eq!(sets.len(), 2);
        assert!(sets[0].factors.is_empty());
    }
}
