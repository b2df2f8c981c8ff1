//! Windows: one DNS setting per network adapter
//!
//! Active adapters are discovered on every apply with `Get-NetAdapter`, then
//! each one is configured with `Set-DnsClientServerAddress`. A failing
//! adapter never stops the others from being attempted.

use async_trait::async_trait;
use dnsrot_core::{ApplyReport, CommandRunner, CommandSpec, DnsApplier, Error, Result};
use std::sync::Arc;
use tracing::{debug, warn};

const POWERSHELL: &str = "powershell";

const LIST_ACTIVE_ADAPTERS: &str =
    "Get-NetAdapter | Where-Object { $_.Status -eq 'Up' } | Select-Object -ExpandProperty Name";

/// Applies DNS to every adapter whose status is Up
pub struct WindowsAdapterApplier {
    runner: Arc<dyn CommandRunner>,
}

impl WindowsAdapterApplier {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

/// Quote a value as a PowerShell single-quoted string
pub(crate) fn ps_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn powershell(script: impl Into<String>) -> CommandSpec {
    CommandSpec::new(POWERSHELL)
        .args(["-NoProfile", "-NonInteractive", "-Command"])
        .arg(script)
}

fn set_dns_command(adapter: &str, address: &str) -> CommandSpec {
    powershell(format!(
        "Set-DnsClientServerAddress -InterfaceAlias {} -ServerAddresses {}",
        ps_quote(adapter),
        ps_quote(address)
    ))
}

/// One adapter name per output line; names may contain spaces
fn parse_adapter_names(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl DnsApplier for WindowsAdapterApplier {
    async fn apply(&self, address: &str) -> Result<ApplyReport> {
        let adapters = self.active_targets().await?;
        let mut report = ApplyReport::new(address);

        for adapter in &adapters {
            match self.runner.run(&set_dns_command(adapter, address)).await {
                Ok(out) if out.is_success() => {
                    debug!(
                        %adapter,
                        %address,
                        output = %out.output.trim_end(),
                        "Changed DNS for adapter"
                    );
                    report.applied(adapter, out.output);
                }
                Ok(out) => {
                    warn!(
                        %adapter,
                        %address,
                        status = %out.status(),
                        "Failed to change DNS for adapter"
                    );
                    report.failed(adapter, out.status(), out.output);
                }
                Err(e) => {
                    warn!(%adapter, %address, error = %e, "Failed to change DNS for adapter");
                    report.failed(adapter, e.to_string(), "");
                }
            }
        }

        Ok(report)
    }

    async fn active_targets(&self) -> Result<Vec<String>> {
        let out = self
            .runner
            .run(&powershell(LIST_ACTIVE_ADAPTERS))
            .await
            .map_err(|e| Error::interface_discovery(e.to_string()))?;

        if !out.is_success() {
            return Err(Error::interface_discovery(format!(
                "Get-NetAdapter failed with {}, output: {}",
                out.status(),
                out.output.trim_end()
            )));
        }

        let adapters = parse_adapter_names(&out.output);
        if adapters.is_empty() {
            return Err(Error::interface_discovery("no network adapters are up"));
        }
        Ok(adapters)
    }

    fn applier_name(&self) -> &'static str {
        "windows-adapters"
    }
}
