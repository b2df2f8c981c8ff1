//! Error types for the DNS rotator
//!
//! This module defines all error types used throughout the crate.

use crate::traits::ApplyFailures;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for rotation operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the DNS rotator
#[derive(Error, Debug)]
pub enum Error {
    /// The configured address list is empty
    #[error("no DNS addresses specified in config")]
    NoAddressesConfigured,

    /// The host OS family has no DNS applier
    #[error("unsupported operating system: {0}")]
    UnsupportedPlatform(String),

    /// Active network interfaces could not be enumerated
    #[error("failed to discover network interfaces: {0}")]
    InterfaceDiscovery(String),

    /// One or more targets rejected the new address
    #[error("{0}")]
    PartialApply(ApplyFailures),

    /// An external command exceeded its deadline
    #[error("command `{command}` timed out after {after:?}")]
    Timeout {
        /// The command line that was running
        command: String,
        /// The deadline that elapsed
        after: Duration,
    },

    /// An external command was cancelled by shutdown
    #[error("command `{command}` was cancelled")]
    Cancelled {
        /// The command line that was running
        command: String,
    },

    /// A command could not be spawned at all
    #[error("failed to execute `{command}`: {source}")]
    Spawn {
        /// The command line that failed to start
        command: String,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// The notification channel refused a message
    #[error("notification delivery failed: {0}")]
    Notification(String),

    /// The process lacks administrative rights
    #[error("{0}")]
    Privilege(String),

    /// Autostart registration failed
    #[error("failed to set run on startup: {0}")]
    Autostart(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

/// Coarse classification of errors, used by the daemon to choose a reaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Aborts the process before the controller loop starts
    FatalStartup,
    /// Fatal to a rotation cycle
    Rotation,
    /// Some targets failed; the failures are carried as a list
    PartialApply,
    /// The success/failure notification could not be shown
    NotificationDelivery,
}

impl Error {
    /// Create an unsupported platform error
    pub fn unsupported_platform(os: impl Into<String>) -> Self {
        Self::UnsupportedPlatform(os.into())
    }

    /// Create an interface discovery error
    pub fn interface_discovery(msg: impl Into<String>) -> Self {
        Self::InterfaceDiscovery(msg.into())
    }

    /// Create a notification error
    pub fn notification(msg: impl Into<String>) -> Self {
        Self::Notification(msg.into())
    }

    /// Create a privilege error
    pub fn privilege(msg: impl Into<String>) -> Self {
        Self::Privilege(msg.into())
    }

    /// Create an autostart error
    pub fn autostart(msg: impl Into<String>) -> Self {
        Self::Autostart(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Classify this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Privilege(_)
            | Self::Autostart(_)
            | Self::Config(_)
            | Self::Io(_)
            | Self::Yaml(_) => ErrorCategory::FatalStartup,
            Self::PartialApply(_) => ErrorCategory::PartialApply,
            Self::Notification(_) => ErrorCategory::NotificationDelivery,
            Self::NoAddressesConfigured
            | Self::UnsupportedPlatform(_)
            | Self::InterfaceDiscovery(_)
            | Self::Timeout { .. }
            | Self::Cancelled { .. }
            | Self::Spawn { .. }
            | Self::Other(_) => ErrorCategory::Rotation,
        }
    }

    /// Returns `true` if this error was caused by shutdown cancelling a command
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
