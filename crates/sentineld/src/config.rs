//! sentineld.toml configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use sentinel_monitor::{ConnectOptions, Sentinel};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DaemonConfig {
    /// Seed sentinels; peers are discovered from these.
    pub sentinels: Vec<Sentinel>,
    #[serde(default = "default_tcp_keepalive_secs")]
    pub tcp_keepalive_secs: u32,
    /// Delay before re-creating a lost monitor.
    #[serde(default = "default_restart_delay_secs")]
    pub restart_delay_secs: u64,
    /// Capacity of the master-switch and connection event channels.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_tcp_keepalive_secs() -> u32 {
    30
}

fn default_restart_delay_secs() -> u64 {
    5
}

fn default_event_buffer() -> usize {
    16
}

impl DaemonConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: DaemonConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sentinels.is_empty() {
            return Err(ConfigError::Invalid("at least one sentinel is required".to_string()));
        }
        for s in &self.sentinels {
            if s.host.trim().is_empty() {
                return Err(ConfigError::Invalid("sentinel host must not be empty".to_string()));
            }
            if s.port == 0 {
                return Err(ConfigError::Invalid(format!("sentinel {} has port 0", s.host)));
            }
        }
        if self.event_buffer == 0 {
            return Err(ConfigError::Invalid("event_buffer must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            tcp_keepalive_secs: self.tcp_keepalive_secs,
        }
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_secs(self.restart_delay_secs)
    }
}
