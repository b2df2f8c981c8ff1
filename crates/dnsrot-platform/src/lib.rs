// # dnsrot-platform
//
// OS-specific pieces of the DNS rotator.
//
// ## Contents
//
// - [`TokioCommandRunner`]: runs commands with a deadline and a quit token
// - [`WindowsAdapterApplier`], [`ResolvConfApplier`], [`NetworkServiceApplier`]:
//   the three `DnsApplier` variants, selected once by [`PlatformStrategy`]
// - [`check_privileges`]: startup gate requiring admin/root
// - [`Autostart`]: run-on-startup registration
// - [`DesktopNotifier`]: desktop notifications via `notify-rust`
//
// All appliers build commands through the `CommandRunner` trait, so every
// variant compiles and is tested on every host; only the strategy picked at
// startup decides which one touches the real system.

pub mod autostart;
pub mod command;
pub mod linux;
pub mod macos;
pub mod notify;
pub mod privilege;
pub mod windows;

pub use autostart::{AUTOSTART_NAME, Autostart, AutostartEntry};
pub use command::TokioCommandRunner;
pub use linux::ResolvConfApplier;
pub use macos::NetworkServiceApplier;
pub use notify::DesktopNotifier;
pub use privilege::check_privileges;
pub use windows::WindowsAdapterApplier;

use async_trait::async_trait;
use dnsrot_core::{ApplyReport, CommandRunner, DnsApplier, Error, Result, RotationConfig};
use std::fmt;
use std::sync::Arc;

/// How DNS is configured on this host, chosen once at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformStrategy {
    /// Per-adapter DNS via PowerShell
    Windows,
    /// Global `/etc/resolv.conf`
    Linux,
    /// Named network services via `networksetup`
    MacOs,
    /// No applier exists for this OS
    Unsupported(String),
}

impl PlatformStrategy {
    /// Strategy for the OS this binary was built for
    pub fn detect() -> Self {
        Self::from_os(std::env::consts::OS)
    }

    /// Strategy for an OS name as reported by `std::env::consts::OS`
    pub fn from_os(os: &str) -> Self {
        match os {
            "windows" => Self::Windows,
            "linux" => Self::Linux,
            "macos" => Self::MacOs,
            other => Self::Unsupported(other.to_string()),
        }
    }

    /// OS name
    pub fn os_name(&self) -> &str {
        match self {
            Self::Windows => "windows",
            Self::Linux => "linux",
            Self::MacOs => "macos",
            Self::Unsupported(os) => os,
        }
    }

    /// Returns `true` unless the strategy is `Unsupported`
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unsupported(_))
    }

    /// Build the applier for this strategy
    pub fn create_applier(
        &self,
        config: &RotationConfig,
        runner: Arc<dyn CommandRunner>,
    ) -> Box<dyn DnsApplier> {
        match self {
            Self::Windows => Box::new(WindowsAdapterApplier::new(runner)),
            Self::Linux => Box::new(ResolvConfApplier::new(runner)),
            Self::MacOs => Box::new(NetworkServiceApplier::new(
                runner,
                config.network_services.clone(),
            )),
            Self::Unsupported(os) => Box::new(UnsupportedApplier { os: os.clone() }),
        }
    }
}

impl fmt::Display for PlatformStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.os_name())
    }
}

/// Applier for OS families without DNS support; fails before any command
pub struct UnsupportedApplier {
    os: String,
}

#[async_trait]
impl DnsApplier for UnsupportedApplier {
    async fn apply(&self, _address: &str) -> Result<ApplyReport> {
        Err(Error::unsupported_platform(&self.os))
    }

    async fn active_targets(&self) -> Result<Vec<String>> {
        Err(Error::unsupported_platform(&self.os))
    }

    fn applier_name(&self) -> &'static str {
        "unsupported"
    }
}
