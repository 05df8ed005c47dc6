//! Dual-exponential synaptic conductances

use crate::error::*;
use serde::{Deserialize, Serialize};

/// Synapse driven by a spike time table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynapseConfig {
    /// Synapse name, unique per compartment
    pub name: String,
    /// Cell type
    pub cell: String,
    /// Instance index within the cell type
    #[serde(default)]
    pub instance: usize,
    /// Compartment name
    pub compartment: String,
    /// Peak conductance for a unit-weight event (S)
    pub gbar: f64,
    /// Reversal potential (V)
    pub erev: f64,
    /// Rise time constant (s)
    pub tau_rise: f64,
    /// Decay time constant (s)
    pub tau_decay: f64,
    /// Presynaptic spike times (s)
    #[serde(default)]
    pub spike_times: Vec<f64>,
    /// Initial event weight
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// Whether the calcium plasticity rule scales the weight
    #[serde(default)]
    pub plastic: bool,
}

fn default_weight() -> f64 {
    1.0
}

impl SynapseConfig {
    /// Validate kinetics and strength
    pub fn validate(&self) -> Result<()> {
        if !(self.tau_rise > 0.0) || !(self.tau_decay > self.tau_rise) || !self.tau_decay.is_finite() {
            return Err(RuntimeError::invalid_parameter(
                format!("synapse {} time constants", self.name),
                format!("rise={} decay={}", self.tau_rise, self.tau_decay),
                "0 < tau_rise < tau_decay",
            ));
        }
        if !(self.gbar >= 0.0) || !self.gbar.is_finite() {
            return Err(RuntimeError::invalid_parameter(
                format!("synapse {} gbar", self.name),
                self.gbar.to_string(),
                ">= 0.0",
            ));
        }
        if !self.erev.is_finite() || !(self.weight >= 0.0) {
            return Err(RuntimeError::invalid_parameter(
                format!("synapse {} erev/weight", self.name),
                format!("erev={} weight={}", self.erev, self.weight),
                "finite reversal and weight >= 0",
            ));
        }
        if self.spike_times.iter().any(|t| !t.is_finite() || *t < 0.0) {
            return Err(RuntimeError::invalid_model(format!(
                "synapse {} has negative or non-finite spike times",
                self.name
            )));
        }
        Ok(())
    }
}

/// Conductance `g = gbar·(d - r)` with `r` and `d` decaying at the rise and
/// decay rates; normalised so a unit event peaks at `gbar`
#[derive(Debug, Clone, PartialEq)]
pub struct SynapticChannel {
    gbar: f64,
    erev: f64,
    tau_rise: f64,
    tau_decay: f64,
    norm: f64,
    rise: f64,
    decay: f64,
    /// Current conductance (S)
    pub g: f64,
}

impl SynapticChannel {
    /// Create from a validated config
    pub fn new(config: &SynapseConfig) -> Self {
        let (tr, td) = (config.tau_rise, config.tau_decay);
        let t_peak = tr * td / (td - tr) * (td / tr).ln();
        let peak = (-t_peak / td).exp() - (-t_peak / tr).exp();
        Self {
            gbar: config.gbar,
            erev: config.erev,
            tau_rise: tr,
            tau_decay: td,
            norm: 1.0 / peak,
            rise: 0.0,
            decay: 0.0,
            g: 0.0,
        }
    }

    /// Register a presynaptic event of the given weight
    pub fn deliver(&mut self, weight: f64) {
        self.rise += weight * self.norm;
        self.decay += weight * self.norm;
    }

    /// Advance by `dt`
    pub fn advance(&mut self, dt: f64) {
        self.rise *= (-dt / self.tau_rise).exp();
        self.decay *= (-dt / self.tau_decay).exp();
        self.g = self.gbar * (self.decay - self.rise);
    }

    /// Reversal potential (V)
    pub fn erev(&self) -> f64 {
        self.erev
    }

    /// Inward current at voltage `v` (A)
    pub fn current(&self, v: f64) -> f64 {
        self.g * (self.erev - v)
    }
}
