//! Linux: rewrite the global resolver file
//!
//! One shell pipeline replaces `/etc/resolv.conf` with a single `nameserver`
//! line. The address and path are passed as positional parameters so neither
//! is interpreted by the shell.

use async_trait::async_trait;
use dnsrot_core::{ApplyReport, CommandRunner, CommandSpec, DnsApplier, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// Default resolver configuration file
pub const ETC_RESOLV_CONF: &str = "/etc/resolv.conf";

const WRITE_RESOLV_CONF: &str = r#"echo "nameserver $1" | tee "$2""#;

/// Applies DNS by rewriting resolv.conf
pub struct ResolvConfApplier {
    runner: Arc<dyn CommandRunner>,
    path: PathBuf,
}

impl ResolvConfApplier {
    /// Target the system `/etc/resolv.conf`
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            path: PathBuf::from(ETC_RESOLV_CONF),
        }
    }

    /// Target a different file (useful for testing)
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    fn target(&self) -> String {
        self.path.display().to_string()
    }

    fn command(&self, address: &str) -> CommandSpec {
        CommandSpec::new("sh")
            .args(["-c", WRITE_RESOLV_CONF, "sh"])
            .arg(address)
            .arg(self.target())
    }
}

#[async_trait]
impl DnsApplier for ResolvConfApplier {
    async fn apply(&self, address: &str) -> Result<ApplyReport> {
        let target = self.target();
        let mut report = ApplyReport::new(address);

        debug!(%address, path = %target, "Setting DNS on Linux");
        match self.runner.run(&self.command(address)).await {
            Ok(out) if out.is_success() => report.applied(target, out.output),
            Ok(out) => {
                warn!(%address, status = %out.status(), "Failed to set DNS on Linux");
                report.failed(target, out.status(), out.output);
            }
            Err(e) => {
                warn!(%address, error = %e, "Failed to set DNS on Linux");
                report.failed(target, e.to_string(), "");
            }
        }

        Ok(report)
    }

    async fn active_targets(&self) -> Result<Vec<String>> {
        Ok(vec![self.target()])
    }

    fn applier_name(&self) -> &'static str {
        "linux-resolv-conf"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedRunner;
    use dnsrot_core::CommandOutput;

    #[tokio::test]
    async fn address_is_a_positional_parameter() {
        let runner = Arc::new(ScriptedRunner::new([Ok(CommandOutput::success(
            "nameserver 1.1.1.1\n",
        ))]));
        let applier = ResolvConfApplier::new(runner.clone());

        let report = applier.apply("1.1.1.1").await.unwrap();
        assert!(report.is_success());

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program, "sh");
        assert_eq!(
            calls[0].args,
            vec!["-c", WRITE_RESOLV_CONF, "sh", "1.1.1.1", "/etc/resolv.conf"]
        );
    }

    #[tokio::test]
    async fn failure_is_a_single_entry() {
        let runner = Arc::new(ScriptedRunner::new([Ok(CommandOutput::failure(
            1,
            "tee: /etc/resolv.conf: Read-only file system\n",
        ))]));
        let applier = ResolvConfApplier::new(runner);

        let report = applier.apply("9.9.9.9").await.unwrap();
        let failures = report.failures().unwrap();
        assert_eq!(failures.len(), 1);
        assert!(failures.to_string().contains("Read-only file system"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn rewrites_the_file() {
        use crate::TokioCommandRunner;
        use std::time::Duration;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resolv.conf");
        std::fs::write(&path, "nameserver 192.168.1.1\nsearch lan\n").unwrap();

        let runner = Arc::new(TokioCommandRunner::new(Duration::from_secs(5)));
        let applier = ResolvConfApplier::new(runner).with_path(&path);

        let report = applier.apply("9.9.9.9").await.unwrap();
        assert!(report.is_success(), "{report:?}");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "nameserver 9.9.9.9\n");
    }
}
