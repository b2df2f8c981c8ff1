//! Configuration types for the DNS rotator
//!
//! The configuration is a small YAML file. If it does not exist, a default is
//! written and then read back, so the file on disk always reflects what the
//! daemon is running with.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Interval used when the file holds zero or a negative number of hours
pub const DEFAULT_CHANGE_INTERVAL_HOURS: i64 = 6;

/// Longest accepted interval (ten years); larger values are clamped
pub const MAX_CHANGE_INTERVAL_HOURS: i64 = 24 * 365 * 10;

/// Deadline for a single OS command when the file holds zero
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 30;

/// macOS network service targeted when none is configured
pub const DEFAULT_NETWORK_SERVICE: &str = "Wi-Fi";

/// Main rotation configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationConfig {
    /// Resolver addresses, rotated in order
    #[serde(default)]
    pub dns_addresses: Vec<String>,

    /// Register the daemon to start with the user session
    #[serde(default)]
    pub run_on_startup: bool,

    /// Hours between timer-driven rotations
    #[serde(default = "default_change_interval_hours")]
    pub change_interval_hours: i64,

    /// Show a notification after every successful rotation
    #[serde(default)]
    pub notify_user: bool,

    /// What to do after a failed rotation cycle
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// When the rotation cursor moves past an address
    #[serde(default)]
    pub advance_policy: AdvancePolicy,

    /// Deadline for each OS command, in seconds
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,

    /// macOS network services to configure
    #[serde(default = "default_network_services")]
    pub network_services: Vec<String>,
}

impl RotationConfig {
    /// Create a configuration rotating through `addresses` with defaults elsewhere
    pub fn with_addresses<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            dns_addresses: addresses.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Replace out-of-range values with their defaults
    ///
    /// Called on every load. An empty address list is left alone: it is only
    /// an error once a rotation is attempted.
    pub fn normalize(&mut self) {
        if self.change_interval_hours <= 0 {
            tracing::warn!(
                configured = self.change_interval_hours,
                default = DEFAULT_CHANGE_INTERVAL_HOURS,
                "change_interval_hours must be positive, using default"
            );
            self.change_interval_hours = DEFAULT_CHANGE_INTERVAL_HOURS;
        } else if self.change_interval_hours > MAX_CHANGE_INTERVAL_HOURS {
            tracing::warn!(
                configured = self.change_interval_hours,
                max = MAX_CHANGE_INTERVAL_HOURS,
                "change_interval_hours too large, clamping"
            );
            self.change_interval_hours = MAX_CHANGE_INTERVAL_HOURS;
        }
        if self.command_timeout_secs == 0 {
            self.command_timeout_secs = DEFAULT_COMMAND_TIMEOUT_SECS;
        }
        if self.network_services.is_empty() {
            self.network_services = default_network_services();
        }
    }

    /// Timer interval for normal operation
    pub fn change_interval(&self) -> Duration {
        let hours = if self.change_interval_hours > 0 {
            self.change_interval_hours.min(MAX_CHANGE_INTERVAL_HOURS) as u64
        } else {
            DEFAULT_CHANGE_INTERVAL_HOURS as u64
        };
        Duration::from_secs(hours.saturating_mul(3600))
    }

    /// Deadline applied to each OS command
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(if self.command_timeout_secs == 0 {
            DEFAULT_COMMAND_TIMEOUT_SECS
        } else {
            self.command_timeout_secs
        })
    }

    /// Parse a configuration from YAML and normalize it
    pub fn from_yaml(content: &str) -> Result<Self> {
        let mut config: Self = serde_yaml::from_str(content)?;
        config.normalize();
        Ok(config)
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            dns_addresses: vec![
                "1.1.1.1".to_string(),
                "1.0.0.1".to_string(),
                "9.9.9.9".to_string(),
            ],
            run_on_startup: true,
            change_interval_hours: DEFAULT_CHANGE_INTERVAL_HOURS,
            notify_user: true,
            failure_policy: FailurePolicy::default(),
            advance_policy: AdvancePolicy::default(),
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECS,
            network_services: default_network_services(),
        }
    }
}

/// Reaction to a failed rotation cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop the controller and exit non-zero
    #[default]
    FailStop,
    /// Log the failure and wait for the next trigger
    KeepRunning,
}

/// When the rotation cursor advances
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvancePolicy {
    /// Advance before applying; a failed address is skipped next time
    #[default]
    SkipForward,
    /// Advance only after a successful cycle; a failed address is retried
    RetrySame,
}

fn default_change_interval_hours() -> i64 {
    DEFAULT_CHANGE_INTERVAL_HOURS
}

fn default_command_timeout_secs() -> u64 {
    DEFAULT_COMMAND_TIMEOUT_SECS
}

fn default_network_services() -> Vec<String> {
    vec![DEFAULT_NETWORK_SERVICE.to_string()]
}

/// Loads and persists [`RotationConfig`] at a fixed path
#[derive(Debug, Clone)]
pub struct ConfigFile {
    path: PathBuf,
}

impl ConfigFile {
    /// Create a handle for the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the configuration file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the configuration, writing the default first if the file is missing
    pub fn load_or_create(&self) -> Result<RotationConfig> {
        if !self.path.exists() {
            tracing::info!(path = %self.path.display(), "Config file not found, writing default");
            self.write(&RotationConfig::default())?;
        }
        self.load()
    }

    /// Load and normalize the configuration
    pub fn load(&self) -> Result<RotationConfig> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            Error::config(format!(
                "Failed to read config file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        let config = RotationConfig::from_yaml(&content).map_err(|e| {
            Error::config(format!(
                "Failed to parse config file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        tracing::debug!(
            path = %self.path.display(),
            addresses = config.dns_addresses.len(),
            interval_hours = config.change_interval_hours,
            "Loaded config"
        );
        Ok(config)
    }

    /// Write the configuration atomically (temp file, then rename)
    pub fn write(&self, config: &RotationConfig) -> Result<()> {
        let yaml = config.to_yaml()?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::config(format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let temp_path = self.temp_path();
        std::fs::write(&temp_path, yaml).map_err(|e| {
            Error::config(format!(
                "Failed to write temp file {}: {}",
                temp_path.display(),
                e
            ))
        })?;

        std::fs::rename(&temp_path, &self.path).map_err(|e| {
            Error::config(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!(path = %self.path.display(), "Config written");
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }
}
