//! Application settings

use crate::core::protocol::{code_for_baud, NavigationMode, ReceiveOptions};
use crate::core::provision::RetryPolicy;
use crate::core::receiver::LinkSettings;
use crate::core::transport::{LineSettings, SerialConfig, SerialParity};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No per-user config directory on this platform
    #[error("could not determine config directory")]
    NoConfigDir,

    /// Reading or writing the file failed
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// File is not valid TOML for this layout
    #[error("invalid config {}: {source}", path.display())]
    Parse {
        /// File involved
        path: PathBuf,
        /// Underlying error
        source: toml::de::Error,
    },

    /// Serializing failed
    #[error("could not serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value is out of range
    #[error("invalid setting {field}: {reason}")]
    Invalid {
        /// Setting name, `section.key`
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GnssConfig {
    /// Serial port settings
    pub serial: SerialSettings,
    /// Receiver settings
    pub receiver: ReceiverSettings,
    /// Receive timeouts
    pub timing: TimingSettings,
    /// Retry settings
    pub retry: RetrySettings,
}

/// Serial port settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSettings {
    /// Port name
    pub port: String,
    /// Data bits
    pub data_bits: u8,
    /// Parity
    pub parity: SerialParity,
    /// Stop bits
    pub stop_bits: u8,
    /// Baud rate the port is opened at
    pub initial_baud: u32,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port: default_port().to_string(),
            data_bits: 8,
            parity: SerialParity::None,
            stop_bits: 1,
            initial_baud: 9600,
        }
    }
}

#[cfg(windows)]
fn default_port() -> &'static str {
    "COM3"
}

#[cfg(not(windows))]
fn default_port() -> &'static str {
    "/dev/ttyUSB0"
}

/// Receiver settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverSettings {
    /// Baud rate the receiver is switched to
    pub target_baud: u32,
    /// Dynamics model
    pub navigation_mode: NavigationMode,
    /// Navigation data message interval
    pub navigation_interval: u8,
    /// Delay before the first provisioning attempt (ms)
    pub startup_delay_ms: u64,
    /// Logging sample rate (Hz)
    pub sample_rate_hz: u32,
}

impl Default for ReceiverSettings {
    fn default() -> Self {
        Self {
            target_baud: 921_600,
            navigation_mode: NavigationMode::Automobile,
            navigation_interval: 1,
            startup_delay_ms: 500,
            sample_rate_hz: 10,
        }
    }
}

/// Receive timeouts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingSettings {
    /// Wait for each byte (ms)
    pub byte_timeout_ms: u64,
    /// Wait for a whole frame (ms)
    pub receive_budget_ms: u64,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            byte_timeout_ms: 2000,
            receive_budget_ms: 2000,
        }
    }
}

/// Retry settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Provisioning attempts
    pub max_attempts: u32,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self { max_attempts: 10 }
    }
}

impl GnssConfig {
    /// Load config from the default location, defaults if there is no file
    pub fn load() -> Result<Self, ConfigError> {
        let path = super::config_path().ok_or(ConfigError::NoConfigDir)?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a file
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = super::config_path().ok_or(ConfigError::NoConfigDir)?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save config to a file, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_error = |source: std::io::Error| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(io_error)
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject settings the link cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.max_attempts == 0 {
            return Err(invalid("retry.max_attempts", "must be at least 1"));
        }
        if self.timing.byte_timeout_ms == 0 {
            return Err(invalid("timing.byte_timeout_ms", "must be greater than 0"));
        }
        if self.timing.receive_budget_ms == 0 {
            return Err(invalid("timing.receive_budget_ms", "must be greater than 0"));
        }
        if code_for_baud(self.receiver.target_baud).is_none() {
            return Err(invalid(
                "receiver.target_baud",
                format!("{} is not a receiver baud rate", self.receiver.target_baud),
            ));
        }
        if self.receiver.navigation_interval == 0 {
            return Err(invalid("receiver.navigation_interval", "0 disables navigation output"));
        }
        if self.serial.port.is_empty() {
            return Err(invalid("serial.port", "must not be empty"));
        }
        Ok(())
    }

    /// Link parameters for the receiver
    pub fn link_settings(&self) -> LinkSettings {
        LinkSettings {
            target_baud: self.receiver.target_baud,
            navigation_mode: self.receiver.navigation_mode,
            navigation_interval: self.receiver.navigation_interval,
            receive: ReceiveOptions {
                byte_timeout: Duration::from_millis(self.timing.byte_timeout_ms),
                budget: Duration::from_millis(self.timing.receive_budget_ms),
            },
            retry: RetryPolicy {
                max_attempts: self.retry.max_attempts,
                startup_delay: Duration::from_millis(self.receiver.startup_delay_ms),
            },
        }
    }

    /// Serial port configuration, optionally for another port
    pub fn serial_config(&self, port: Option<&str>) -> SerialConfig {
        SerialConfig {
            port: port.unwrap_or(&self.serial.port).to_string(),
            line: LineSettings {
                data_bits: self.serial.data_bits,
                parity: self.serial.parity,
                stop_bits: self.serial.stop_bits,
                baud_rate: self.serial.initial_baud,
            },
        }
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}
