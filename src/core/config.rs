//! # Configuration Module
//!
//! Process-wide configuration, read once at startup and immutable thereafter.
//!
//! ## Key Features
//! - YAML configuration parsing with serde
//! - Environment variable override support
//! - Validation with detailed error messages before the server starts

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Complete engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Transport binding and request limits
    pub server: ServerConfig,

    /// Route discovery settings
    pub routes: RoutesConfig,

    /// Query-string coercion toggles
    pub query: QueryConfig,
}

/// Transport-facing server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address the dispatcher binds to
    pub bind_addr: SocketAddr,

    /// Maximum request body size in bytes; exceeding it aborts the request
    /// with a 413 before any buffering past the limit
    pub max_body_size: usize,

    /// Per-request deadline
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".parse().expect("static addr"),
            max_body_size: 1024 * 1024,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Where route files live and how their paths are exposed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutesConfig {
    /// Root directory scanned for handler files
    pub dir: PathBuf,

    /// Global URL prefix prepended to every discovered route path
    pub url_prefix: String,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("routes"),
            url_prefix: String::new(),
        }
    }
}

/// Query-string parsing behavior.
///
/// With everything disabled all values stay strings. Coercion applies to
/// each scalar after optional array splitting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Split values on `array_delimiter` (and accumulate repeated keys)
    pub parse_arrays: bool,

    /// Delimiter used when `parse_arrays` is on
    pub array_delimiter: String,

    /// Coerce numeric-looking values to numbers
    pub parse_numbers: bool,

    /// Coerce `true`/`false` to booleans
    pub parse_booleans: bool,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            parse_arrays: false,
            array_delimiter: ",".to_string(),
            parse_numbers: false,
            parse_booleans: false,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            routes: RoutesConfig::default(),
            query: QueryConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a YAML file, apply environment overrides and
    /// validate. Any failure here is fatal: the process must not serve with
    /// a config it could not fully load.
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| ConfigError::Unreadable {
                    path: path.to_path_buf(),
                    source,
                })?;

        let mut config: AppConfig = serde_yaml::from_str(&content)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Environment overrides follow the pattern `DIRROUTE_<SECTION>_<FIELD>`,
    /// e.g. `DIRROUTE_SERVER_BIND_ADDR=0.0.0.0:8080`.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        use std::env;

        if let Ok(addr) = env::var("DIRROUTE_SERVER_BIND_ADDR") {
            self.server.bind_addr = addr
                .parse()
                .map_err(|e| ConfigError::Invalid(format!("DIRROUTE_SERVER_BIND_ADDR: {e}")))?;
        }

        if let Ok(size) = env::var("DIRROUTE_SERVER_MAX_BODY_SIZE") {
            self.server.max_body_size = size
                .parse()
                .map_err(|e| ConfigError::Invalid(format!("DIRROUTE_SERVER_MAX_BODY_SIZE: {e}")))?;
        }

        if let Ok(timeout) = env::var("DIRROUTE_SERVER_REQUEST_TIMEOUT") {
            self.server.request_timeout = humantime::parse_duration(&timeout).map_err(|e| {
                ConfigError::Invalid(format!("DIRROUTE_SERVER_REQUEST_TIMEOUT: {e}"))
            })?;
        }

        if let Ok(dir) = env::var("DIRROUTE_ROUTES_DIR") {
            self.routes.dir = PathBuf::from(dir);
        }

        if let Ok(prefix) = env::var("DIRROUTE_ROUTES_URL_PREFIX") {
            self.routes.url_prefix = prefix;
        }

        Ok(())
    }

    /// Validate the configuration before any request is served.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.max_body_size == 0 {
            return Err(ConfigError::Invalid(
                "server.max_body_size must be greater than zero".to_string(),
            ));
        }

        if self.server.request_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "server.request_timeout must be greater than zero".to_string(),
            ));
        }

        if self.query.parse_arrays && self.query.array_delimiter.is_empty() {
            return Err(ConfigError::Invalid(
                "query.array_delimiter must not be empty when query.parse_arrays is on".to_string(),
            ));
        }

        if !self.routes.url_prefix.is_empty() && !self.routes.url_prefix.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "routes.url_prefix must start with '/', got {:?}",
                self.routes.url_prefix
            )));
        }

        Ok(())
    }
}
