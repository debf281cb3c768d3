//! Store configuration.

use std::collections::HashMap;
use std::env;
use std::path::Path;

/// Default number of records a scan may visit before it is logged as slow.
pub const DEFAULT_SCAN_WARN_THRESHOLD: usize = 10_000;

/// Configuration shared by every collection of a registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Keep the last sync failure of a key after it is later acknowledged.
    ///
    /// When false, a successful acknowledgement clears the key's entry in
    /// the error table.
    pub retain_sync_errors: bool,
    /// Scans visiting more records than this are logged at warn level
    pub scan_warn_threshold: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            retain_sync_errors: false,
            scan_warn_threshold: DEFAULT_SCAN_WARN_THRESHOLD,
        }
    }
}

impl StoreConfig {
    /// Load configuration from a `.env` file, if present, and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    /// Load configuration from the env file at `path` and the environment.
    ///
    /// Variables already set in the environment take precedence over the
    /// file, as with [`load`](Self::load). The process environment is not
    /// modified.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file: HashMap<String, String> = dotenvy::from_path_iter(path.as_ref())
            .and_then(|entries| entries.collect())
            .map_err(|e| ConfigError::EnvFile(e.to_string()))?;

        Self::from_lookup(|name| env::var(name).ok().or_else(|| file.get(name).cloned()))
    }

    /// Load configuration from environment variables.
    ///
    /// - `MEMORIA_RETAIN_SYNC_ERRORS`: `true`/`false`/`1`/`0`
    /// - `MEMORIA_SCAN_WARN_THRESHOLD`: record count
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let retain_sync_errors = match lookup("MEMORIA_RETAIN_SYNC_ERRORS") {
            None => defaults.retain_sync_errors,
            Some(raw) => parse_bool(&raw)
                .ok_or(ConfigError::InvalidBool("MEMORIA_RETAIN_SYNC_ERRORS"))?,
        };

        let scan_warn_threshold = match lookup("MEMORIA_SCAN_WARN_THRESHOLD") {
            None => defaults.scan_warn_threshold,
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidNumber("MEMORIA_SCAN_WARN_THRESHOLD"))?,
        };

        Ok(Self {
            retain_sync_errors,
            scan_warn_threshold,
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid boolean value for {0}")]
    InvalidBool(&'static str),

    #[error("Invalid numeric value for {0}")]
    InvalidNumber(&'static str),

    #[error("Failed to read env file: {0}")]
    EnvFile(String),
}
