//! Channel kinetics, conductance sets and clock scheduling for
//! multi-compartment neuron models
//!
//! This crate holds the model-definition layer: closed-form gating kinetics
//! and their tabulation, per cell type conductance densities by distance band,
//! the seven-slot clock scheduler and the calcium-threshold plasticity rule.
//! It has no notion of a running simulation; see `ionic-runtime` for that.

#![warn(missing_docs)]
#![warn(clippy::all)]

// Core modules
pub mod error;
pub mod grid;
pub mod kinetics;
pub mod tables;
pub mod presets;
pub mod conductance;
pub mod clocks;
pub mod plasticity;

// Re-export essential types
pub use error::{CoreError, Result};
pub use grid::Grid;
pub use kinetics::{
    AlphaBetaParams, CalciumGate, ChannelKineticsSpec, GateId, GateRates, GateValues, RateLaw,
    SigmoidRate, TauInfMinParams, TauInfParams, TauPower, VoltageGate, ZGate,
};
pub use tables::{GateTable, RateTable, TableCache, TableGrids};
pub use conductance::{
    ConductanceSet, ConductanceSetBuilder, DistanceBand, GapPolicy, Location, OverlapPolicy, Region,
};
pub use clocks::{
    ClockConfig, ClockScheduler, ClockSlot, ElementCategory, Phase, SchedulerState, SlotAssignment,
};
pub use plasticity::{
    CalciumBand, CalciumPlasticityRule, PlasticityParams, PlasticityRule, PlasticityState,
};

/// Faraday constant (C/mol)
pub const FARADAY: f64 = 96485.33212;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_integration() {
        let spec = presets::hh_naf();
        assert!(spec.validate().is_ok());

        let clocks = ClockConfig::default();
        assert!(clocks.validate().is_ok());

        let rule = CalciumPlasticityRule::new(PlasticityParams::default()).unwrap();
        assert!(rule.thresholds().0 < rule.thresholds().1);
    }
}
