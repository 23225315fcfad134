//! Configuration resolution for facsurvey-import
//!
//! Every value is resolved in priority order CLI → ENV → TOML → default and
//! validated once at process start. The resulting `ImportConfig` is passed by
//! reference into the source client and the orchestrator; nothing in the
//! pipeline reads the environment afterwards.

use facsurvey_common::config::{default_database_path, TomlConfig};
use facsurvey_common::{Error, Result};
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

pub const ENV_BASE_URL: &str = "FACSURVEY_BASE_URL";
pub const ENV_API_KEY: &str = "FACSURVEY_API_KEY";
pub const ENV_SOURCE_TAG: &str = "FACSURVEY_SOURCE_TAG";
pub const ENV_TIMEOUT_SECS: &str = "FACSURVEY_TIMEOUT_SECS";
pub const ENV_REQUESTS_PER_SECOND: &str = "FACSURVEY_REQUESTS_PER_SECOND";
pub const ENV_DATABASE_PATH: &str = "FACSURVEY_DATABASE_PATH";
pub const ENV_CONCURRENCY: &str = "FACSURVEY_CONCURRENCY";
pub const ENV_OWNER_USER_ID: &str = "FACSURVEY_OWNER_USER_ID";
pub const ENV_MAX_LOCK_WAIT_MS: &str = "FACSURVEY_MAX_LOCK_WAIT_MS";

pub const DEFAULT_SOURCE_TAG: &str = "kobo";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Values given on the command line (highest priority)
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub database_path: Option<PathBuf>,
    pub concurrency: Option<usize>,
    pub owner_user_id: Option<String>,
}

/// Source API connection settings
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Data endpoint; range queries hit it directly, by-id queries `<base>/<id>`
    pub base_url: String,
    pub api_key: String,
    /// Tag written to `raw_imports.source`
    pub source_tag: String,
    pub timeout: Duration,
    pub requests_per_second: Option<NonZeroU32>,
}

/// Fully resolved, validated configuration
#[derive(Debug, Clone)]
pub struct ImportConfig {
    pub source: SourceConfig,
    pub database_path: PathBuf,
    pub concurrency: usize,
    pub owner_user_id: Option<String>,
    /// `None` defers to the `import_max_lock_wait_ms` database setting
    pub max_lock_wait_ms: Option<u64>,
}

impl ImportConfig {
    /// Resolve configuration from CLI, environment, TOML and defaults
    pub fn resolve(cli: &CliOverrides, toml: &TomlConfig) -> Result<Self> {
        let base_url = pick(
            "base URL",
            cli.base_url.clone(),
            env_string(ENV_BASE_URL),
            toml.source.base_url.clone(),
        )
        .ok_or_else(|| {
            Error::Config(format!(
                "Source base URL not configured. Use --base-url, {} or [source] base_url",
                ENV_BASE_URL
            ))
        })?;

        let api_key = pick(
            "API key",
            cli.api_key.clone().filter(|k| is_valid_key(k)),
            env_string(ENV_API_KEY).filter(|k| is_valid_key(k)),
            toml.source.api_key.clone().filter(|k| is_valid_key(k)),
        )
        .ok_or_else(|| {
            Error::Config(format!(
                "Source API key not configured. Use --api-key, {} or [source] api_key",
                ENV_API_KEY
            ))
        })?;

        let source_tag = pick(
            "source tag",
            None,
            env_string(ENV_SOURCE_TAG),
            toml.source.source_tag.clone(),
        )
        .unwrap_or_else(|| DEFAULT_SOURCE_TAG.to_string());

        let timeout_secs = pick(
            "timeout",
            None,
            env_parsed::<u64>(ENV_TIMEOUT_SECS)?,
            toml.source.timeout_secs,
        )
        .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let requests_per_second = pick(
            "requests per second",
            None,
            env_parsed::<u32>(ENV_REQUESTS_PER_SECOND)?,
            toml.source.requests_per_second,
        )
        .and_then(NonZeroU32::new);

        let database_path = pick(
            "database path",
            cli.database_path.clone(),
            env_string(ENV_DATABASE_PATH).map(PathBuf::from),
            toml.database_path.clone(),
        )
        .unwrap_or_else(default_database_path);

        let concurrency = pick(
            "concurrency",
            cli.concurrency,
            env_parsed::<usize>(ENV_CONCURRENCY)?,
            toml.import.concurrency,
        )
        .unwrap_or(DEFAULT_CONCURRENCY);

        let owner_user_id = pick(
            "owner user id",
            cli.owner_user_id.clone(),
            env_string(ENV_OWNER_USER_ID),
            toml.import.owner_user_id.clone(),
        );

        let max_lock_wait_ms = pick(
            "max lock wait",
            None,
            env_parsed::<u64>(ENV_MAX_LOCK_WAIT_MS)?,
            toml.import.max_lock_wait_ms,
        );

        let config = Self {
            source: SourceConfig {
                base_url: base_url.trim_end_matches('/').to_string(),
                api_key,
                source_tag,
                timeout: Duration::from_secs(timeout_secs),
                requests_per_second,
            },
            database_path,
            concurrency,
            owner_user_id,
            max_lock_wait_ms,
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if !is_valid_base_url(&self.source.base_url) {
            return Err(Error::Config(format!(
                "Source base URL must be an http(s) URL: {}",
                self.source.base_url
            )));
        }
        if !is_valid_key(&self.source.api_key) {
            return Err(Error::Config("Source API key is blank".to_string()));
        }
        if self.concurrency < 1 {
            return Err(Error::Config("Concurrency must be at least 1".to_string()));
        }
        if self.source.timeout.is_zero() {
            return Err(Error::Config("Source timeout must be positive".to_string()));
        }
        Ok(())
    }
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Absolute http or https URL with a host
pub fn is_valid_base_url(url: &str) -> bool {
    match reqwest::Url::parse(url) {
        Ok(parsed) => {
            matches!(parsed.scheme(), "http" | "https") && parsed.host_str().is_some()
        }
        Err(_) => false,
    }
}

/// First present tier wins; a lower tier that is shadowed is logged
fn pick<T>(what: &str, cli: Option<T>, env: Option<T>, toml: Option<T>) -> Option<T> {
    let present = [cli.is_some(), env.is_some(), toml.is_some()]
        .iter()
        .filter(|p| **p)
        .count();
    if present > 1 {
        debug!("{} set in multiple sources, using highest priority", what);
    }

    if cli.is_some() {
        debug!("{} loaded from command line", what);
        return cli;
    }
    if env.is_some() {
        debug!("{} loaded from environment", what);
        return env;
    }
    if toml.is_some() {
        debug!("{} loaded from TOML config", what);
    }
    toml
}

fn env_string(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        Ok(_) => None,
        Err(std::env::VarError::NotPresent) => None,
        Err(std::env::VarError::NotUnicode(_)) => {
            warn!("Ignoring {}: value is not valid unicode", name);
            None
        }
    }
}

fn env_parsed<T: FromStr>(name: &str) -> Result<Option<T>> {
    match env_string(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| Error::Config(format!("{} has an invalid value: {}", name, raw))),
        None => Ok(None),
    }
}
