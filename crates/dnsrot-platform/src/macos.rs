//! macOS: set DNS on named network services
//!
//! Services are not discovered; they come from configuration and default to
//! `Wi-Fi`.

use async_trait::async_trait;
use dnsrot_core::config::DEFAULT_NETWORK_SERVICE;
use dnsrot_core::{ApplyReport, CommandRunner, CommandSpec, DnsApplier, Result};
use std::sync::Arc;
use tracing::{debug, warn};

/// Applies DNS with `networksetup -setdnsservers`
pub struct NetworkServiceApplier {
    runner: Arc<dyn CommandRunner>,
    services: Vec<String>,
}

impl NetworkServiceApplier {
    pub fn new(runner: Arc<dyn CommandRunner>, services: Vec<String>) -> Self {
        let services = if services.is_empty() {
            vec![DEFAULT_NETWORK_SERVICE.to_string()]
        } else {
            services
        };
        Self { runner, services }
    }
}

#[async_trait]
impl DnsApplier for NetworkServiceApplier {
    async fn apply(&self, address: &str) -> Result<ApplyReport> {
        let mut report = ApplyReport::new(address);

        for service in &self.services {
            let command = CommandSpec::new("networksetup")
                .args(["-setdnsservers", service.as_str(), address]);

            match self.runner.run(&command).await {
                Ok(out) if out.is_success() => {
                    debug!(%service, %address, "Changed DNS for network service");
                    report.applied(service, out.output);
                }
                Ok(out) => {
                    warn!(%service, %address, status = %out.status(), "Failed to set DNS on macOS");
                    report.failed(service, out.status(), out.output);
                }
                Err(e) => {
                    warn!(%service, %address, error = %e, "Failed to set DNS on macOS");
                    report.failed(service, e.to_string(), "");
                }
            }
        }

        Ok(report)
    }

    async fn active_targets(&self) -> Result<Vec<String>> {
        Ok(self.services.clone())
    }

    fn applier_name(&self) -> &'static str {
        "macos-network-services"
    }
}
