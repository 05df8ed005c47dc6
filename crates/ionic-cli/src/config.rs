//! Configuration management for the ionic CLI

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CliError, CliResult};

/// Global CLI configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Directory run outputs are written to when `--out` is not given
    pub output_dir: Option<PathBuf>,

    /// Default logging level
    pub log_level: Option<String>,

    /// Default number of sweep workers
    pub default_jobs: Option<usize>,

    /// User preferences
    pub preferences: UserPreferences,
}

/// Output preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserPreferences {
    /// Show progress bars
    pub show_progress: bool,

    /// Also write a JSON copy of every run result
    pub write_json: bool,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            show_progress: true,
            write_json: false,
        }
    }
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            log_level: Some("info".to_string()),
            default_jobs: None,
            preferences: UserPreferences::default(),
        }
    }
}

impl CliConfig {
    /// Load configuration from file, falling back to defaults when it does not exist
    pub fn load_from_file(path: &Path) -> CliResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content)
                .map_err(|e| CliError::config(format!("Invalid config file {}: {}", path.display(), e)))
        } else {
            Ok(Self::default())
        }
    }

    /// Load from `path`, or from the default location when `None`
    pub fn resolve(path: Option<&Path>) -> CliResult<Self> {
        match path {
            Some(p) => {
                if !p.exists() {
                    return Err(CliError::missing_resource(format!(
                        "config file {}",
                        p.display()
                    )));
                }
                Self::load_from_file(p)
            }
            None => match Self::default_config_path() {
                Ok(p) => Self::load_from_file(&p),
                Err(_) => Ok(Self::default()),
            },
        }
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: &Path) -> CliResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| CliError::config(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> CliResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| CliError::config("Could not determine config directory"))?;
        Ok(config_dir.join("ionic").join("config.toml"))
    }

    /// Output directory for run products
    pub fn output_dir(&self, requested: Option<&Path>) -> PathBuf {
        requested
            .map(Path::to_path_buf)
            .or_else(|| self.output_dir.clone())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Number of sweep workers
    pub fn jobs(&self, requested: Option<usize>) -> usize {
        requested
            .or(self.default_jobs)
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
            .max(1)
    }
}
