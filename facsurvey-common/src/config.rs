//! Bootstrap configuration loading and default path resolution
//!
//! The TOML file is optional. A missing file is not an error: callers get
//! `TomlConfig::default()` and resolve every value from CLI arguments,
//! environment variables or compiled defaults instead.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Application directory name under the platform config/data dirs
pub const APP_DIR: &str = "facsurvey";

/// Bootstrap configuration read from `config.toml`
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct TomlConfig {
    /// Path to the SQLite database file
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// External survey API settings
    #[serde(default)]
    pub source: SourceSection,

    /// Batch import settings
    #[serde(default)]
    pub import: ImportSection,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// `[source]` table
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct SourceSection {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    /// Tag recorded on every staged raw import (e.g. "kobo")
    pub source_tag: Option<String>,
    pub timeout_secs: Option<u64>,
    /// Client-side request ceiling; unset means unthrottled
    pub requests_per_second: Option<u32>,
}

/// `[import]` table
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ImportSection {
    pub concurrency: Option<usize>,
    pub owner_user_id: Option<String>,
    pub max_lock_wait_ms: Option<u64>,
}

/// `[logging]` table
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level or EnvFilter directive (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Platform config file location (`~/.config/facsurvey/config.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join("config.toml"))
}

/// OS-dependent default database location
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join(APP_DIR).join("facsurvey.db"))
        .unwrap_or_else(|| PathBuf::from("./facsurvey_data/facsurvey.db"))
}

/// Parse a TOML document into a `TomlConfig`
pub fn parse_toml_config(content: &str) -> Result<TomlConfig> {
    toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

/// Load the bootstrap configuration
///
/// An explicitly requested file must exist. The platform default file is
/// optional: when absent, defaults are returned with a warning.
pub fn load_toml_config(explicit_path: Option<&Path>) -> Result<TomlConfig> {
    if let Some(path) = explicit_path {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Read TOML failed ({}): {}", path.display(), e))
        })?;
        info!("Loaded configuration from {}", path.display());
        return parse_toml_config(&content);
    }

    match default_config_path() {
        Some(path) if path.exists() => {
            let content = std::fs::read_to_string(&path)?;
            info!("Loaded configuration from {}", path.display());
            parse_toml_config(&content)
        }
        Some(path) => {
            warn!(
                "Config file not found at {}, using environment and defaults",
                path.display()
            );
            Ok(TomlConfig::default())
        }
        None => {
            warn!("Could not determine config directory, using environment and defaults");
            Ok(TomlConfig::default())
        }
    }
}
