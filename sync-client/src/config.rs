//! Configuration loading for the session engine.
//!
//! Configuration is loaded from a TOML file (default: `writerlink.toml`).
//! Every section and field is optional.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use sync_core::DEFAULT_PORT;

/// Root configuration for the session engine.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientConfig {
    /// Connection configuration.
    #[serde(default)]
    pub connection: ConnectionConfig,
    /// Heartbeat configuration.
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
    /// Message bus configuration.
    #[serde(default)]
    pub bus: BusConfig,
}

/// Connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    /// Port the mobile app listens on (default: 19621).
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Heartbeat configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HeartbeatConfig {
    /// Tick period in milliseconds (default: 1000).
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Connect to the remembered address at startup, and re-submit the last
    /// address on ticks that find the session idle and disconnected
    /// (default: true).
    #[serde(default = "default_auto_reconnect")]
    pub auto_reconnect: bool,
}

/// Message bus configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BusConfig {
    /// Per-variant channel capacity before slow subscribers lag (default: 64).
    #[serde(default = "default_bus_capacity")]
    pub capacity: usize,
}

// Default value functions
fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_auto_reconnect() -> bool {
    true
}

fn default_bus_capacity() -> usize {
    64
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            auto_reconnect: default_auto_reconnect(),
        }
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            capacity: default_bus_capacity(),
        }
    }
}

impl HeartbeatConfig {
    /// Tick period as a [`Duration`].
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl ClientConfig {
    /// Parse configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: None,
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub async fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::ReadError {
                path: path.to_path_buf(),
                source: e,
            })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: Some(path.to_path_buf()),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise use defaults.
    pub async fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match tokio::fs::try_exists(path).await {
            Ok(true) => Self::from_file(path).await,
            _ => {
                tracing::debug!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
        }
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.connection.port == 0 {
            return Err(ConfigError::Invalid("connection.port must be non-zero".into()));
        }
        if self.heartbeat.interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "heartbeat.interval_ms must be non-zero".into(),
            ));
        }
        if self.bus.capacity == 0 {
            return Err(ConfigError::Invalid("bus.capacity must be non-zero".into()));
        }
        Ok(())
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration.
    #[error("failed to parse config: {source}")]
    ParseError {
        /// Path to the configuration file, if loaded from disk.
        path: Option<PathBuf>,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// A value is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}
