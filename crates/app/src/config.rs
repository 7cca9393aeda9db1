//! Hub configuration
//!
//! Loaded from TOML. Every field has a default, so an absent file means
//! a stock hub storing its database in the platform data directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use lounge_core::{RetryPolicy, StoreOptions};
use serde::Deserialize;

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "LOUNGE_HUB_CONFIG";

const CONFIG_FILE_NAME: &str = "lounge-hub.toml";
const DB_FILE_NAME: &str = "lounge_hub.db";

/// Longest accepted liveness window: 100 years
const MAX_LIVENESS_WINDOW_SECS: i64 = 100 * 365 * 24 * 60 * 60;

/// Errors raised while loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Could not determine data directory")]
    NoDataDir,
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Database file; defaults to the platform data directory
    pub database_path: Option<PathBuf>,
    /// Log filter used when `RUST_LOG` is unset
    pub log_filter: String,
    pub sweep: SweepConfig,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub interval_secs: u64,
    /// Lounges silent for longer than this are demoted
    pub liveness_window_secs: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub backoff_ms: u64,
    pub jitter_ms: u64,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            log_filter: "info".to_string(),
            sweep: SweepConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            liveness_window_secs: 24 * 60 * 60,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            backoff_ms: policy.backoff.as_millis() as u64,
            jitter_ms: policy.jitter.as_millis() as u64,
        }
    }
}

impl HubConfig {
    /// Load configuration
    ///
    /// Uses the file named by `LOUNGE_HUB_CONFIG` if set, else
    /// `lounge-hub.toml` in the data directory if present, else defaults.
    pub fn load() -> Result<Self, ConfigError> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Self::load_from(Path::new(&path));
        }

        if let Ok(dir) = data_dir() {
            let path = dir.join(CONFIG_FILE_NAME);
            if path.exists() {
                return Self::load_from(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a TOML file
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: HubConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.sweep.interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "sweep.interval_secs must be positive".to_string(),
            ));
        }
        if self.sweep.liveness_window_secs <= 0 {
            return Err(ConfigError::Invalid(
                "sweep.liveness_window_secs must be positive".to_string(),
            ));
        }
        if self.sweep.liveness_window_secs > MAX_LIVENESS_WINDOW_SECS {
            return Err(ConfigError::Invalid(format!(
                "sweep.liveness_window_secs must be at most {MAX_LIVENESS_WINDOW_SECS}"
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolved database location
    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()?.join(DB_FILE_NAME)),
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep.interval_secs)
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            retry: RetryPolicy {
                max_attempts: self.retry.max_attempts,
                backoff: Duration::from_millis(self.retry.backoff_ms),
                jitter: Duration::from_millis(self.retry.jitter_ms),
            },
            liveness_window: chrono::TimeDelta::try_seconds(self.sweep.liveness_window_secs)
                .unwrap_or(chrono::TimeDelta::MAX),
        }
    }
}

fn data_dir() -> Result<PathBuf, ConfigError> {
    let dirs = ProjectDirs::from("dev", "lounge", "lounge-hub").ok_or(ConfigError::NoDataDir)?;
    Ok(dirs.data_dir().to_path_buf())
}
