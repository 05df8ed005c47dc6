//! Single-shell calcium concentration pools

use crate::error::*;
use ionic_core::FARADAY;
use serde::{Deserialize, Serialize};

/// Pool parameters of a cell type
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalciumPoolConfig {
    /// Decay time constant (s)
    pub tau: f64,
    /// Resting concentration (mM)
    #[serde(default = "default_basal")]
    pub ca_basal: f64,
    /// Submembrane shell thickness (m)
    #[serde(default = "default_thickness")]
    pub shell_thickness: f64,
}

fn default_basal() -> f64 {
    50e-6
}

fn default_thickness() -> f64 {
    0.1e-6
}

impl CalciumPoolConfig {
    /// Validate parameters
    pub fn validate(&self) -> Result<()> {
        if !(self.tau > 0.0) || !self.tau.is_finite() {
            return Err(RuntimeError::invalid_parameter("calcium tau", self.tau.to_string(), "> 0.0"));
        }
        if !(self.ca_basal >= 0.0) || !self.ca_basal.is_finite() {
            return Err(RuntimeError::invalid_parameter(
                "ca_basal",
                self.ca_basal.to_string(),
                ">= 0.0",
            ));
        }
        if !(self.shell_thickness > 0.0) || !self.shell_thickness.is_finite() {
            return Err(RuntimeError::invalid_parameter(
                "shell_thickness",
                self.shell_thickness.to_string(),
                "> 0.0",
            ));
        }
        Ok(())
    }
}

/// Calcium pool of one compartment.
///
/// `dCa/dt = B·I - (Ca - Ca_basal)/tau` with inward current `I` (A) and
/// `B = 1/(2·F·volume)`.
#[derive(Debug, Clone, PartialEq)]
pub struct CalciumPool {
    /// Current concentration (mM)
    pub ca: f64,
    ca_basal: f64,
    tau: f64,
    b: f64,
    influx: f64,
}

impl CalciumPool {
    /// Pool for a shell of `volume` (m³)
    pub fn new(config: &CalciumPoolConfig, volume: f64) -> Self {
        Self {
            ca: config.ca_basal,
            ca_basal: config.ca_basal,
            tau: config.tau,
            b: 1.0 / (2.0 * FARADAY * volume),
            influx: 0.0,
        }
    }

    /// Conversion factor from current to concentration rate
    pub fn b(&self) -> f64 {
        self.b
    }

    /// Add inward calcium current (A) for the next update
    pub fn add_current(&mut self, current: f64) {
        self.influx += current;
    }

    /// Advance by `dt` with the accumulated current, then clear it
    pub fn advance(&mut self, dt: f64) {
        let a = self.b * self.influx + self.ca_basal / self.tau;
        let rate = 1.0 / self.tau;
        let steady = a / rate;
        self.ca = (steady + (self.ca - steady) * (-rate * dt).exp()).max(0.0);
        self.influx = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CalciumPoolConfig {
        CalciumPoolConfig {
            tau: 20e-3,
            ca_basal: 50e-6,
            shell_thickness: 0.1e-6,
        }
    }

    #[test]
    fn test_rests_at_basal() {
        let mut pool = CalciumPool::new(&config(), 1e-18);
        for _ in 0..100 {
            pool.advance(25e-6);
        }
        assert!((pool.ca - 50e-6).abs() < 1e-15);
    }

    #[test]
    fn test_influx_raises_and_decays() {
        let mut pool = CalciumPool::new(&config(), 1e-18);
        pool.add_current(1e-12);
        pool.advance(25e-6);
        let peak = pool.ca;
        assert!(peak > 50e-6);
        for _ in 0..20000 {
            pool.advance(25e-6);
        }
        assert!(pool.ca < peak);
        assert!((pool.ca - 50e-6).abs() < 1e-9);
    }

    #[test]
    fn test_validation() {
        assert!(config().validate().is_ok());
        assert!(CalciumPoolConfig { tau: 0.0, ..config() }.validate().is_err());
        assert!(CalciumPoolConfig { shell_thickness: -1.0, ..config() }.validate().is_err());
    }
}
