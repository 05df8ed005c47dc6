//! Error types for model definition and scheduling

use thiserror::Error;

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised while defining channels, conductances, clocks and plasticity
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// Channel kinetics specification is invalid
    #[error("Invalid channel {channel}: {reason}")]
    InvalidChannel {
        /// Channel name
        channel: String,
        /// Reason the specification was rejected
        reason: String,
    },

    /// A calcium-gated channel was tabulated without a concentration grid
    #[error("Channel {channel} has a calcium-dependent gate but no calcium grid was supplied")]
    MissingCalciumGrid {
        /// Channel name
        channel: String,
    },

    /// Two different specifications were registered under one channel name
    #[error("Conflicting definitions for channel {channel}")]
    ConflictingChannel {
        /// Channel name
        channel: String,
    },

    /// Plasticity thresholds are not ordered low < high
    #[error("Invalid plasticity thresholds: low={low} must be below high={high}")]
    InvalidThresholds {
        /// Low (depression) threshold
        low: f64,
        /// High (potentiation) threshold
        high: f64,
    },

    /// Two distance bands of one channel overlap
    #[error("Overlapping distance bands for {cell_type}/{channel}: {first} and {second}")]
    OverlappingBands {
        /// Cell type name
        cell_type: String,
        /// Channel name
        channel: String,
        /// First band
        first: String,
        /// Second band
        second: String,
    },

    /// No band covers a compartment location and gaps are configured as fatal
    #[error("No distance band of {cell_type}/{channel} covers {location}")]
    CoverageGap {
        /// Cell type name
        cell_type: String,
        /// Channel name
        channel: String,
        /// Location description
        location: String,
    },

    /// Cell type is not part of the conductance set
    #[error("Unknown cell type {cell_type}")]
    UnknownCellType {
        /// Cell type name
        cell_type: String,
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

    /// Clock timesteps are inconsistent
    #[error("Invalid clock configuration: {reason}")]
    InvalidClock {
        /// Reason for invalid clock setup
        reason: String,
    },

    /// Clocks were (re)assigned at a point where the ordering is undefined
    #[error("Scheduling violation: {reason}")]
    SchedulingViolation {
        /// Reason for the violation
        reason: String,
    },
}

impl CoreError {
    /// Create an invalid channel error
    pub fn invalid_channel(channel: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidChannel {
            channel: channel.into(),
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

    /// Create an invalid clock error
    pub fn invalid_clock(reason: impl Into<String>) -> Self {
        Self::InvalidClock {
            reason: reason.into(),
        }
    }

    /// Create a scheduling violation
    pub fn scheduling_violation(reason: impl Into<String>) -> Self {
        Self::SchedulingViolation {
            reason: reason.into(),
        }
    }

    /// Whether this error describes an invalid model definition.
    ///
    /// Configuration errors are fatal to the run that meets them and are
    /// raised before any integration step.
    pub fn is_configuration_error(&self) -> bool {
        !matches!(self, Self::SchedulingViolation { .. })
    }
}
