//! Startup privilege gate
//!
//! Changing the system resolver needs administrative rights on every
//! supported OS. This check runs once, before the controller starts.

use crate::PlatformStrategy;
use dnsrot_core::{CommandRunner, CommandSpec, Error, Result};
use tracing::debug;

/// Fail unless the process holds admin (Windows) or root (Unix) rights
pub async fn check_privileges(
    strategy: &PlatformStrategy,
    runner: &dyn CommandRunner,
) -> Result<()> {
    debug!(os = %strategy, "Checking privileges");

    match strategy {
        PlatformStrategy::Windows => {
            // `net session` only succeeds in an elevated shell
            match runner.run(&CommandSpec::new("net").arg("session")).await {
                Ok(out) if out.is_success() => Ok(()),
                _ => Err(Error::privilege(
                    "this program must be run as an administrator",
                )),
            }
        }
        PlatformStrategy::Linux | PlatformStrategy::MacOs => {
            if is_root() {
                Ok(())
            } else {
                Err(Error::privilege("this program must be run as root"))
            }
        }
        PlatformStrategy::Unsupported(os) => Err(Error::unsupported_platform(os)),
    }
}

#[cfg(unix)]
fn is_root() -> bool {
    nix::unistd::geteuid().is_root()
}

#[cfg(not(unix))]
fn is_root() -> bool {
    false
}
