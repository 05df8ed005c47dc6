//! Error handling for the ionic CLI

use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Model definition layer error
    #[error("Model error: {0}")]
    Core(#[from] ionic_core::CoreError),

    /// Runtime layer error
    #[error("Runtime error: {0}")]
    Runtime(#[from] ionic_runtime::RuntimeError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serde(#[from] toml::de::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("Error: {0}")]
    Generic(#[from] anyhow::Error),

    /// Invalid command arguments
    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),

    /// Missing required file or resource
    #[error("Missing resource: {0}")]
    MissingResource(String),

    /// Some sweep runs did not complete
    #[error("{failed} of {total} runs failed")]
    RunsFailed {
        /// Failed or timed-out runs
        failed: usize,
        /// Runs in the sweep
        total: usize,
    },
}

impl CliError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid arguments error
    pub fn invalid_args(msg: impl Into<String>) -> Self {
        Self::InvalidArgs(msg.into())
    }

    /// Create a missing resource error
    pub fn missing_resource(msg: impl Into<String>) -> Self {
        Self::MissingResource(msg.into())
    }

    /// Process exit code: 2 for bad input, 1 for everything else
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) | CliError::InvalidArgs(_) | CliError::MissingResource(_) => 2,
            CliError::Core(e) if e.is_configuration_error() => 2,
            CliError::Runtime(e) if e.is_configuration_error() => 2,
            _ => 1,
        }
    }
}
