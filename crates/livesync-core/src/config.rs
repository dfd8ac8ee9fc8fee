//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/livesync/config.toml)
//! 3. Environment variables (LIVESYNC_* prefix)
//!
//! Environment variables take precedence over config file values.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::models::DEFAULT_KEY_FIELD;
use crate::sync::{Backoff, RetryConfig};

/// Environment variable prefix
const ENV_PREFIX: &str = "LIVESYNC";

/// Keys accepted by [`Config::set`]
pub const CONFIG_KEYS: &[&str] = &[
    "snapshot_url",
    "stream_url",
    "retry_interval_ms",
    "max_retry_interval_ms",
    "max_attempts",
    "backoff",
    "envelope_field",
    "key_field",
    "request_timeout_secs",
];

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Endpoint serving the full dataset
    #[serde(default = "default_snapshot_url")]
    pub snapshot_url: String,

    /// WebSocket endpoint streaming dataset updates
    #[serde(default = "default_stream_url")]
    pub stream_url: String,

    /// Delay before a reconnection attempt
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,

    /// Upper bound on the delay when backoff is exponential
    #[serde(default = "default_max_retry_interval_ms")]
    pub max_retry_interval_ms: u64,

    /// Consecutive failed attempts before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay growth between attempts
    #[serde(default)]
    pub backoff: Backoff,

    /// Field holding the records when the snapshot is wrapped in an object
    #[serde(default = "default_envelope_field")]
    pub envelope_field: String,

    /// Identifier field of a record
    #[serde(default = "default_key_field")]
    pub key_field: String,

    /// Snapshot request timeout, 0 for none
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            snapshot_url: default_snapshot_url(),
            stream_url: default_stream_url(),
            retry_interval_ms: default_retry_interval_ms(),
            max_retry_interval_ms: default_max_retry_interval_ms(),
            max_attempts: default_max_attempts(),
            backoff: Backoff::default(),
            envelope_field: default_envelope_field(),
            key_field: default_key_field(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (LIVESYNC_SNAPSHOT_URL, LIVESYNC_STREAM_URL, ...)
    /// 2. Config file (~/.config/livesync/config.toml or LIVESYNC_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // LIVESYNC_SNAPSHOT_URL
        if let Ok(val) = std::env::var(format!("{}_SNAPSHOT_URL", ENV_PREFIX)) {
            if !val.is_empty() {
                self.snapshot_url = val;
            }
        }

        // LIVESYNC_STREAM_URL
        if let Ok(val) = std::env::var(format!("{}_STREAM_URL", ENV_PREFIX)) {
            if !val.is_empty() {
                self.stream_url = val;
            }
        }

        // LIVESYNC_RETRY_INTERVAL_MS
        if let Ok(val) = std::env::var(format!("{}_RETRY_INTERVAL_MS", ENV_PREFIX)) {
            if let Ok(ms) = val.parse() {
                self.retry_interval_ms = ms;
            }
        }

        // LIVESYNC_MAX_ATTEMPTS
        if let Ok(val) = std::env::var(format!("{}_MAX_ATTEMPTS", ENV_PREFIX)) {
            if let Ok(n) = val.parse() {
                self.max_attempts = n;
            }
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "snapshot_url" => self.snapshot_url = value.to_string(),
            "stream_url" => self.stream_url = value.to_string(),
            "retry_interval_ms" => {
                self.retry_interval_ms = value
                    .parse()
                    .context("Invalid value for retry_interval_ms. Use a number of milliseconds.")?;
            }
            "max_retry_interval_ms" => {
                self.max_retry_interval_ms = value.parse().context(
                    "Invalid value for max_retry_interval_ms. Use a number of milliseconds.",
                )?;
            }
            "max_attempts" => {
                self.max_attempts = value
                    .parse()
                    .context("Invalid value for max_attempts. Use a whole number.")?;
            }
            "backoff" => {
                self.backoff = value.parse()?;
            }
            "envelope_field" => self.envelope_field = value.to_string(),
            "key_field" => self.key_field = value.to_string(),
            "request_timeout_secs" => {
                self.request_timeout_secs = value
                    .parse()
                    .context("Invalid value for request_timeout_secs. Use a number of seconds.")?;
            }
            _ => {
                bail!(
                    "Unknown configuration key: '{}'\nValid keys: {}",
                    key,
                    CONFIG_KEYS.join(", ")
                );
            }
        }
        Ok(())
    }

    /// Save configuration to the default file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific file
    pub fn save_to_path(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with LIVESYNC_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("livesync")
            .join("config.toml")
    }

    /// Reconnection policy parameters
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            retry_interval: Duration::from_millis(self.retry_interval_ms),
            max_retry_interval: Duration::from_millis(self.max_retry_interval_ms),
            max_attempts: self.max_attempts,
            backoff: self.backoff,
        }
    }

    /// Snapshot request timeout, `None` when disabled with 0
    pub fn request_timeout(&self) -> Option<Duration> {
        match self.request_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

fn default_snapshot_url() -> String {
    "http://localhost:8000/api/games".to_string()
}

fn default_stream_url() -> String {
    "ws://localhost:8000/ws".to_string()
}

fn default_retry_interval_ms() -> u64 {
    5000
}

fn default_max_retry_interval_ms() -> u64 {
    30000
}

fn default_max_attempts() -> u32 {
    10
}

fn default_envelope_field() -> String {
    "games".to_string()
}

fn default_key_field() -> String {
    DEFAULT_KEY_FIELD.to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}
