//! Configuration management.
//!
//! Settings come from built-in defaults, an optional TOML file and
//! `EJUSTICE_`-prefixed environment variables (nested keys separated by `__`,
//! e.g. `EJUSTICE_RESOLVER__MAX_CONCURRENT=4`).
//!
//! ```toml
//! [backend]
//! base_url = "https://www.ejustice.just.fgov.be"
//! request_timeout_secs = 30
//! connect_timeout_secs = 10
//! requests_per_second = 5
//!
//! [resolver]
//! max_concurrent = 8
//! failure_policy = "isolate"
//!
//! [server]
//! host = "127.0.0.1"
//! port = 3000
//! max_count = 100
//!
//! [logging]
//! level = "info"
//! format = "text"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::portal::DEFAULT_BASE_URL;

/// File name looked up by [`find_config_file`]
pub const CONFIG_FILE_NAME: &str = "ejustice.toml";

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub resolver: ResolverConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Render as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }
}

/// Portal connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Origin of the portal
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Whole-request timeout
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Request pacing towards the portal; 0 disables pacing
    #[serde(default = "default_rps")]
    pub requests_per_second: u32,

    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            requests_per_second: default_rps(),
            user_agent: None,
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_rps() -> u32 {
    5
}

/// What to do when one record of a batch cannot be resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Fail the whole run
    Abort,
    /// Keep the record without a document URL
    #[default]
    Isolate,
}

/// Document resolution settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Maximum number of records resolved at the same time
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

fn default_max_concurrent() -> usize {
    8
}

/// HTTP server settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Largest `count + offset` a single HTTP request may ask for
    #[serde(default = "default_max_count")]
    pub max_count: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_count: default_max_count(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_max_count() -> usize {
    100
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config error: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Serialize error: {0}")]
    Serialize(String),
}

/// Load configuration from a file, with environment overrides
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::from(path))
        .add_source(
            config::Environment::with_prefix("EJUSTICE")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}

/// Load configuration from environment variables and defaults only
pub fn load_env_config() -> Result<Config, ConfigError> {
    let settings = config::Config::builder()
        .add_source(
            config::Environment::with_prefix("EJUSTICE")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}

/// Look for a config file in the working directory, then the user config dir
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.is_file() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join("ejustice").join(CONFIG_FILE_NAME))
        .filter(|path| path.is_file())
}
