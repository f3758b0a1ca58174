//! Daemon configuration.
//!
//! Values come from built-in defaults, then an optional TOML file, then
//! command-line/environment overrides, each layer replacing the last.
//!
//! ```toml
//! listen = "0.0.0.0:8080"
//! tick_interval_ms = 100
//! grace_delay_ms = 3000
//! screen_buffer = 256
//! ```

use std::fs;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::effects::SCREEN_BUFFER;
use crate::hub::{HubSettings, DEFAULT_GRACE_DELAY, DEFAULT_TICK_INTERVAL};

/// Default WebSocket listen port
pub const DEFAULT_PORT: u16 = 8080;

/// Daemon configuration. Every field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HubConfig {
    /// WebSocket listen address
    pub listen: SocketAddr,

    /// Countdown tick period in milliseconds
    pub tick_interval_ms: u64,

    /// Delay before a config connection's count announcement, in milliseconds
    pub grace_delay_ms: u64,

    /// Capacity of the screen event channel
    pub screen_buffer: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            tick_interval_ms: DEFAULT_TICK_INTERVAL.as_millis() as u64,
            grace_delay_ms: DEFAULT_GRACE_DELAY.as_millis() as u64,
            screen_buffer: SCREEN_BUFFER,
        }
    }
}

impl HubConfig {
    /// Reads and validates a TOML config file.
    ///
    /// # Errors
    ///
    /// - `ConfigError::Read` if the file cannot be read
    /// - `ConfigError::Parse` if it is not valid config TOML
    /// - `ConfigError::Invalid` if a value is out of range
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::from_toml_str(&raw).map_err(|e| match e {
            ConfigError::Parse { error, .. } => ConfigError::Parse {
                path: Some(path.to_path_buf()),
                error,
            },
            other => other,
        })
    }

    /// Parses and validates config TOML.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw).map_err(|e| ConfigError::Parse {
            path: None,
            error: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Applies command-line/environment overrides, then re-validates.
    pub fn with_overrides(mut self, overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        if let Some(listen) = overrides.listen {
            self.listen = listen;
        }
        if let Some(ms) = overrides.tick_interval_ms {
            self.tick_interval_ms = ms;
        }
        if let Some(ms) = overrides.grace_delay_ms {
            self.grace_delay_ms = ms;
        }
        self.validate()?;
        Ok(self)
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "tick_interval_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.screen_buffer == 0 {
            return Err(ConfigError::Invalid {
                field: "screen_buffer",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Timing settings for the hub actor.
    pub fn hub_settings(&self) -> HubSettings {
        HubSettings {
            tick_interval: Duration::from_millis(self.tick_interval_ms),
            grace_delay: Duration::from_millis(self.grace_delay_ms),
        }
    }
}

/// Values given on the command line or through the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub listen: Option<SocketAddr>,
    pub tick_interval_ms: Option<u64>,
    pub grace_delay_ms: Option<u64>,
}

/// Errors that can occur while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {}: {error}", .path.display())]
    Read { path: PathBuf, error: String },

    #[error("Invalid config{}: {error}", display_path(.path))]
    Parse {
        path: Option<PathBuf>,
        error: String,
    },

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn display_path(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| format!(" {}", p.display()))
        .unwrap_or_default()
}
