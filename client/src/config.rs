//! Configuration management for the client.

use std::env;
use std::time::Duration;

const DEFAULT_URL: &str = "http://localhost:5984";
const DEFAULT_DATABASE: &str = "ottoman_demo";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Server base URL
    pub url: String,
    /// Prepended to every database name
    pub prefix: String,
    /// Database the demo binary works in
    pub database: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            prefix: String::new(),
            database: DEFAULT_DATABASE.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup.
    ///
    /// Reads `COUCH_URL`, `COUCH_DB_PREFIX`, `COUCH_DATABASE` and
    /// `COUCH_TIMEOUT_SECS`, falling back to defaults for unset keys.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let url = lookup("COUCH_URL").unwrap_or_else(|| DEFAULT_URL.to_string());
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::InvalidUrl(url));
        }

        let prefix = lookup("COUCH_DB_PREFIX").unwrap_or_default();
        let database = lookup("COUCH_DATABASE").unwrap_or_else(|| DEFAULT_DATABASE.to_string());

        let timeout = match lookup("COUCH_TIMEOUT_SECS") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidTimeout(raw))?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            url,
            prefix,
            database,
            timeout: Duration::from_secs(timeout),
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid COUCH_TIMEOUT_SECS value: {0}")]
    InvalidTimeout(String),
}
