use anyhow::{Context as _, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::paths::sqlnote::config_path;

pub const DATABASE_ENV: &str = "SQLNOTE_DB";
pub const LOG_LEVEL_ENV: &str = "SQLNOTE_LOG_LEVEL";
pub const TIMEOUT_ENV: &str = "SQLNOTE_TIMEOUT_MS";

/// Runtime settings: built-in defaults, then `config.toml`, then environment.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Connection string handed to the database backend.
    pub database: String,
    pub log_level: String,
    /// Per-statement deadline; `None` means no deadline.
    pub timeout_ms: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: "sqlite::memory:".to_string(),
            log_level: "info".to_string(),
            timeout_ms: Some(30_000),
        }
    }
}

impl Config {
    /// Resolve the configuration from `$SQLNOTE_DIR/config.toml` and the process environment.
    pub fn load() -> Result<Self> {
        let path = config_path()?;
        Self::from_file(&path)?.apply_env(|key| std::env::var(key).ok())
    }

    /// Read `path` over the defaults. A missing file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Override fields with any variables `lookup` returns.
    pub fn apply_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(database) = lookup(DATABASE_ENV) {
            self.database = database;
        }
        if let Some(log_level) = lookup(LOG_LEVEL_ENV) {
            self.log_level = log_level;
        }
        if let Some(timeout) = lookup(TIMEOUT_ENV) {
            // 0 disables the deadline
            let timeout_ms: u64 = timeout
                .trim()
                .parse()
                .with_context(|| format!("{} must be a number of milliseconds", TIMEOUT_ENV))?;
            self.timeout_ms = (timeout_ms > 0).then_some(timeout_ms);
        }
        Ok(self)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}
