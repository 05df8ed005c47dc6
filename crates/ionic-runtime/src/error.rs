//! Error types for model loading, simulation and sweeps

use ionic_core::CoreError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Errors that can occur while loading or running a model
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Model-definition error from the core layer
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Invalid model structure
    #[error("Invalid model: {reason}")]
    InvalidModel {
        /// Reason the model was rejected
        reason: String,
    },

    /// Invalid parameter value
    #[error("Invalid parameter {parameter}: {value} (expected {constraint})")]
    InvalidParameter {
        /// Parameter name
        parameter: String,
        /// Invalid value
        value: String,
        /// Constraint description
        constraint: String,
    },

    /// Simulation step failed
    #[error("Simulation step failed at t={time}s: {reason}")]
    SimulationStep {
        /// Simulation time of the failing tick (s)
        time: f64,
        /// Reason for failure
        reason: String,
    },

    /// A run exceeded its wall-clock budget
    #[error("Run {run} exceeded the wall-clock budget of {budget_secs}s")]
    WorkerTimeout {
        /// Run index within the sweep
        run: usize,
        /// Budget in seconds
        budget_secs: f64,
    },

    /// A sweep worker thread died
    #[error("Sweep worker failed: {reason}")]
    Worker {
        /// Failure description
        reason: String,
    },

    /// Model or study file could not be parsed
    #[error("Failed to parse {path}: {reason}")]
    Parse {
        /// File path
        path: PathBuf,
        /// Parser message
        reason: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RuntimeError {
    /// Create an invalid model error
    pub fn invalid_model(reason: impl Into<String>) -> Self {
        Self::InvalidModel {
            reason: reason.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(
        parameter: impl Into<String>,
        value: impl Into<String>,
        constraint: impl Into<String>,
    ) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            value: value.into(),
            constraint: constraint.into(),
        }
    }

    /// Create a simulation step error
    pub fn simulation_step(time: f64, reason: impl Into<String>) -> Self {
        Self::SimulationStep {
            time,
            reason: reason.into(),
        }
    }

    /// Create a parse error
    pub fn parse(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error means the model itself is invalid (fatal before any
    /// integration step)
    pub fn is_configuration_error(&self) -> bool {
        match self {
            Self::Core(e) => e.is_configuration_error(),
            Self::InvalidModel { .. } | Self::InvalidParameter { .. } | Self::Parse { .. } => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = RuntimeError::invalid_model("no cell types");
        assert!(matches!(err, RuntimeError::InvalidModel { .. }));
        assert!(err.is_configuration_error());

        let err = RuntimeError::invalid_parameter("stop_time", "-1", "> 0.0");
        assert!(matches!(err, RuntimeError::InvalidParameter { .. }));
    }

    #[test]
    fn test_error_display() {
        let err = RuntimeError::WorkerTimeout { run: 3, budget_secs: 2.5 };
        let msg = format!("{}", err);
        assert!(msg.contains("Run 3"));
        assert!(!err.is_configuration_error());
    }

    #[test]
    fn test_core_error_passthrough() {
        let err: RuntimeError = CoreError::scheduling_violation("late").into();
        assert!(!err.is_configuration_error());
        assert!(err.to_string().contains("late"));
    }
}
