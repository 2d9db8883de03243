//! User configuration: catalog path, strictness, and log level loaded from ~/.sonority/config.yaml.

use std::path::{Path, PathBuf};

use log::LevelFilter;
use serde::{Deserialize, Serialize};

/// Errors raised while reading an explicit config file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Settings loaded from YAML. Command-line flags take precedence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Schema catalog to use instead of the built-in one.
    #[serde(default)]
    pub catalog: Option<PathBuf>,
    /// Reject the old single-line modulation form.
    #[serde(default)]
    pub strict: bool,
    /// One of off, error, warn, info, debug, trace.
    #[serde(default = "Config::default_log_level")]
    pub log_level: String,
}

impl Config {
    /// The standard config path, `~/.sonority/config.yaml`.
    pub fn path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".sonority").join("config.yaml"))
    }

    /// Load config from the standard path.
    /// Returns None if the file doesn't exist or can't be parsed.
    pub fn load() -> Option<Self> {
        let content = std::fs::read_to_string(Self::path()?).ok()?;
        serde_yaml::from_str(&content).ok()
    }

    /// Load config from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The configured log level, or `warn` if it isn't a level name.
    pub fn level_filter(&self) -> LevelFilter {
        self.log_level.parse().unwrap_or(LevelFilter::Warn)
    }

    fn default_log_level() -> String {
        "warn".to_string()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catalog: None,
            strict: false,
            log_level: Self::default_log_level(),
        }
    }
}
