//! Calcium-threshold plasticity rule for synaptic weights

use crate::error::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Thresholds and scale factors of the dual-threshold calcium rule
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PlasticityParams {
    /// Potentiation threshold (mM)
    pub high_threshold: f64,
    /// Depression threshold (mM)
    pub low_threshold: f64,
    /// Potentiation rate per mM above threshold (1/(mM·s))
    pub high_factor: f64,
    /// Depression rate per mM above the low threshold (1/(mM·s))
    pub low_factor: f64,
}

impl Default for PlasticityParams {
    fn default() -> Self {
        Self {
            high_threshold: 0.46e-3,
            low_threshold: 0.2e-3,
            high_factor: 2000.0,
            low_factor: 1000.0,
        }
    }
}

impl PlasticityParams {
    /// Create new plasticity parameters with validation
    pub fn new(high_threshold: f64, low_threshold: f64, high_factor: f64, low_factor: f64) -> Result<Self> {
        if !high_threshold.is_finite() || !low_threshold.is_finite() || low_threshold >= high_threshold {
            return Err(CoreError::InvalidThresholds {
                low: low_threshold,
                high: high_threshold,
            });
        }
        if low_threshold < 0.0 {
            return Err(CoreError::invalid_parameter(
                "low_threshold",
                low_threshold.to_string(),
                ">= 0.0",
            ));
        }
        if !high_factor.is_finite() || high_factor <= 0.0 {
            return Err(CoreError::invalid_parameter(
                "high_factor",
                high_factor.to_string(),
                "> 0.0",
            ));
        }
        if !low_factor.is_finite() || low_factor <= 0.0 {
            return Err(CoreError::invalid_parameter(
                "low_factor",
                low_factor.to_string(),
                "> 0.0",
            ));
        }

        Ok(Self {
            high_threshold,
            low_threshold,
            high_factor,
            low_factor,
        })
    }

    /// Validate parameters
    pub fn validate(&self) -> Result<()> {
        Self::new(
            self.high_threshold,
            self.low_threshold,
            self.high_factor,
            self.low_factor,
        )?;
        Ok(())
    }
}

/// Calcium band of one sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CalciumBand {
    /// At or below the low threshold
    #[default]
    Quiescent,
    /// Between the thresholds, high inclusive
    Depressing,
    /// Above the high threshold
    Potentiating,
}

/// Plasticity state of one synapse
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PlasticityState {
    /// Accumulated threshold-crossing integral
    pub integral: f64,
    /// Multiplicative weight factor, never negative
    pub weight_factor: f64,
    /// Band of the most recent sample
    pub band: CalciumBand,
}

impl Default for PlasticityState {
    fn default() -> Self {
        Self {
            integral: 0.0,
            weight_factor: 1.0,
            band: CalciumBand::Quiescent,
        }
    }
}

/// Trait for plasticity rules
pub trait PlasticityRule {
    /// Band a calcium sample falls in
    fn band(&self, calcium: f64) -> CalciumBand;

    /// Weight change contributed by one evaluation tick
    fn delta(&self, calcium: f64, dt: f64) -> f64;

    /// Apply one evaluation tick to `state`
    fn update(&self, state: &mut PlasticityState, calcium: f64, dt: f64) -> CalciumBand {
        let delta = self.delta(calcium, dt);
        state.band = self.band(calcium);
        state.integral += delta;
        state.weight_factor = (state.weight_factor * (1.0 + delta)).max(0.0);
        state.band
    }

    /// Get thresholds
    fn thresholds(&self) -> (f64, f64); // (low, high)
}

/// Dual-threshold calcium rule: potentiation above `high`, depression
/// between `low` and `high`, nothing below `low`. No hysteresis.
#[derive(Debug, Clone, PartialEq)]
pub struct CalciumPlasticityRule {
    /// Rule parameters
    pub params: PlasticityParams,
}

impl CalciumPlasticityRule {
    /// Create a new rule
    pub fn new(params: PlasticityParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }
}

impl PlasticityRule for CalciumPlasticityRule {
    fn band(&self, calcium: f64) -> CalciumBand {
        if calcium > self.params.high_threshold {
            CalciumBand::Potentiating
        } else if calcium > self.params.low_threshold {
            CalciumBand::Depressing
        } else {
            CalciumBand::Quiescent
        }
    }

    fn delta(&self, calcium: f64, dt: f64) -> f64 {
        match self.band(calcium) {
            CalciumBand::Potentiating => {
                self.params.high_factor * (calcium - self.params.high_threshold) * dt
            }
            CalciumBand::Depressing => {
                -self.params.low_factor * (calcium - self.params.low_threshold) * dt
            }
            CalciumBand::Quiescent => 0.0,
        }
    }

    fn thresholds(&self) -> (f64, f64) {
        (self.params.low_threshold, self.params.high_threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule() -> CalciumPlasticityRule {
        CalciumPlasticityRule::new(PlasticityParams::default()).unwrap()
    }

    fn run(trace: &[f64]) -> Vec<PlasticityState> {
        let rule = rule();
        let mut state = PlasticityState::default();
        trace
            .iter()
            .map(|&ca| {
                rule.update(&mut state, ca, 100e-6);
                state
            })
            .collect()
    }

    #[test]
    fn test_params_validation() {
        assert!(PlasticityParams::default().validate().is_ok());
        let err = PlasticityParams::new(0.4e-3, 0.6e-3, 1.0, 1.0).unwrap_err();
        assert_eq!(err, CoreError::InvalidThresholds { low: 0.6e-3, high: 0.4e-3 });
        assert!(err.is_configuration_error());
        assert!(PlasticityParams::new(0.4e-3, 0.4e-3, 1.0, 1.0).is_err());
        assert!(PlasticityParams::new(0.6e-3, 0.4e-3, 0.0, 1.0).is_err());
        assert!(PlasticityParams::new(0.6e-3, 0.4e-3, 1.0, f64::NAN).is_err());
    }

    #[test]
    fn test_bands() {
        let rule = rule();
        assert_eq!(rule.band(1e-3), CalciumBand::Potentiating);
        assert_eq!(rule.band(0.46e-3), CalciumBand::Depressing);
        assert_eq!(rule.band(0.3e-3), CalciumBand::Depressing);
        assert_eq!(rule.band(0.2e-3), CalciumBand::Quiescent);
        assert_eq!(rule.band(50e-6), CalciumBand::Quiescent);
    }

    #[test]
    fn test_above_high_strictly_increases() {
        let states = run(&[0.8e-3, 1.0e-3, 0.5e-3, 2.0e-3, 0.47e-3]);
        let mut prev = PlasticityState::default();
        for s in states {
            assert_eq!(s.band, CalciumBand::Potentiating);
            assert!(s.integral > prev.integral);
            assert!(s.weight_factor > prev.weight_factor);
            prev = s;
        }
    }

    #[test]
    fn test_between_thresholds_strictly_decreases() {
        let states = run(&[0.3e-3, 0.45e-3, 0.21e-3, 0.4e-3]);
        let mut prev = PlasticityState::default();
        for s in states {
            assert_eq!(s.band, CalciumBand::Depressing);
            assert!(s.integral < prev.integral);
            assert!(s.weight_factor < prev.weight_factor);
            prev = s;
        }
    }

    #[test]
    fn test_below_low_unchanged() {
        let states = run(&[50e-6, 0.1e-3, 0.2e-3, 0.0]);
        for s in states {
            assert_eq!(s, PlasticityState::default());
        }
    }

    #[test]
    fn test_no_hysteresis() {
        let rule = rule();
        let mut state = PlasticityState::default();
        rule.update(&mut state, 1e-3, 1e-4);
        assert_eq!(rule.update(&mut state, 0.1e-3, 1e-4), CalciumBand::Quiescent);
        assert_eq!(rule.update(&mut state, 0.3e-3, 1e-4), CalciumBand::Depressing);
    }

    #[test]
    fn test_weight_factor_never_negative() {
        let rule = CalciumPlasticityRule::new(PlasticityParams::new(10.0, 0.0, 1.0, 1e6).unwrap()).unwrap();
        let mut state = PlasticityState::default();
        rule.update(&mut state, 5.0, 1.0);
        assert_eq!(state.weight_factor, 0.0);
    }
}
