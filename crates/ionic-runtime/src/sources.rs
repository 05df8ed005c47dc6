//! Pulse generators, spike time tables and spike detectors

use crate::error::*;
use serde::{Deserialize, Serialize};

/// Rectangular current pulse into one compartment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PulseConfig {
    /// Cell type
    pub cell: String,
    /// Instance index within the cell type
    #[serde(default)]
    pub instance: usize,
    /// Compartment name
    pub compartment: String,
    /// Onset (s)
    #[serde(default)]
    pub delay: f64,
    /// Duration (s)
    pub width: f64,
    /// Amplitude (A)
    pub amplitude: f64,
}

impl PulseConfig {
    /// Validate timing
    pub fn validate(&self) -> Result<()> {
        if !(self.delay >= 0.0) || !self.delay.is_finite() {
            return Err(RuntimeError::invalid_parameter("pulse delay", self.delay.to_string(), ">= 0.0"));
        }
        if !(self.width > 0.0) {
            return Err(RuntimeError::invalid_parameter("pulse width", self.width.to_string(), "> 0.0"));
        }
        if !self.amplitude.is_finite() {
            return Err(RuntimeError::invalid_parameter(
                "pulse amplitude",
                self.amplitude.to_string(),
                "finite",
            ));
        }
        Ok(())
    }
}

/// Pulse generator state
#[derive(Debug, Clone, PartialEq)]
pub struct PulseGenerator {
    delay: f64,
    width: f64,
    amplitude: f64,
    /// Current output (A)
    pub output: f64,
}

impl PulseGenerator {
    /// Create from a validated config
    pub fn new(config: &PulseConfig) -> Self {
        Self {
            delay: config.delay,
            width: config.width,
            amplitude: config.amplitude,
            output: 0.0,
        }
    }

    /// Output at time `t`: active for `delay <= t < delay + width`
    pub fn process(&mut self, t: f64) -> f64 {
        self.output = if t >= self.delay && t < self.delay + self.width {
            self.amplitude
        } else {
            0.0
        };
        self.output
    }
}

/// Replays a fixed list of spike times
#[derive(Debug, Clone, PartialEq)]
pub struct TimeTable {
    times: Vec<f64>,
    next: usize,
}

impl TimeTable {
    /// Create from spike times (s), in any order
    pub fn new(mut times: Vec<f64>) -> Self {
        times.sort_by(|a, b| a.total_cmp(b));
        Self { times, next: 0 }
    }

    /// Number of spikes that became due up to time `t`
    pub fn process(&mut self, t: f64) -> usize {
        let start = self.next;
        while self.next < self.times.len() && self.times[self.next] < t {
            self.next += 1;
        }
        self.next - start
    }
}

/// Threshold-crossing spike detector
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpikeDetectorConfig {
    /// Threshold (V)
    #[serde(default)]
    pub threshold: f64,
    /// Minimum interval between spikes (s)
    #[serde(default = "default_refractory")]
    pub refractory: f64,
}

fn default_refractory() -> f64 {
    1e-3
}

impl Default for SpikeDetectorConfig {
    fn default() -> Self {
        Self {
            threshold: 0.0,
            refractory: default_refractory(),
        }
    }
}

impl SpikeDetectorConfig {
    /// Validate threshold and refractory period
    pub fn validate(&self) -> Result<()> {
        if !self.threshold.is_finite() {
            return Err(RuntimeError::invalid_parameter(
                "spike threshold",
                self.threshold.to_string(),
                "finite",
            ));
        }
        if !(self.refractory >= 0.0) || !self.refractory.is_finite() {
            return Err(RuntimeError::invalid_parameter(
                "spike refractory period",
                self.refractory.to_string(),
                ">= 0.0",
            ));
        }
        Ok(())
    }
}

/// Spike generator watching one compartment
#[derive(Debug, Clone, PartialEq)]
pub struct SpikeGenerator {
    config: SpikeDetectorConfig,
    above: bool,
    last: Option<f64>,
    /// Detected spike times (s)
    pub spikes: Vec<f64>,
}

impl SpikeGenerator {
    /// Create a detector
    pub fn new(config: SpikeDetectorConfig) -> Self {
        Self {
            config,
            above: false,
            last: None,
            spikes: Vec::new(),
        }
    }

    /// Check voltage `v` at time `t`; returns whether a spike was emitted
    pub fn process(&mut self, v: f64, t: f64) -> bool {
        let was_above = self.above;
        self.above = v > self.config.threshold;
        if !self.above || was_above {
            return false;
        }
        if let Some(last) = self.last {
            if t - last < self.config.refractory {
                return false;
            }
        }
        self.last = Some(t);
        self.spikes.push(t);
        true
    }
}
