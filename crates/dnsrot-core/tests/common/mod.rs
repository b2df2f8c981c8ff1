//! Test doubles and common utilities for controller contract tests
//!
//! These doubles record what the controller asked for without touching any
//! OS state.

#![allow(dead_code)]

use dnsrot_core::error::Result;
use dnsrot_core::traits::{ApplyReport, DnsApplier, Notifier};
use dnsrot_core::{Error, RotationConfig, RotationEvent};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// An applier whose per-address outcome is scripted by the test
pub struct ScriptedApplier {
    /// Addresses passed to apply(), in call order
    calls: Arc<Mutex<Vec<String>>>,
    /// Addresses whose single target fails
    failing: Arc<Mutex<HashSet<String>>>,
}

impl ScriptedApplier {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            failing: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Make apply() report a target failure for `address`
    pub fn fail_on(self, address: &str) -> Self {
        self.failing.lock().unwrap().insert(address.to_string());
        self
    }

    /// Create a ScriptedApplier that shares state with an existing one
    pub fn sharing_state_with(other: &Self) -> Self {
        Self {
            calls: Arc::clone(&other.calls),
            failing: Arc::clone(&other.failing),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl DnsApplier for ScriptedApplier {
    async fn apply(&self, address: &str) -> Result<ApplyReport> {
        self.calls.lock().unwrap().push(address.to_string());

        let mut report = ApplyReport::new(address);
        if self.failing.lock().unwrap().contains(address) {
            report.failed("Wi-Fi", "exit status 1", "The parameter is incorrect.");
        } else {
            report.applied("Wi-Fi", "");
        }
        Ok(report)
    }

    async fn active_targets(&self) -> Result<Vec<String>> {
        Ok(vec!["Wi-Fi".to_string()])
    }

    fn applier_name(&self) -> &'static str {
        "scripted"
    }
}

/// An applier whose first apply takes `first_delay`; records when each call began
pub struct SlowApplier {
    started: tokio::time::Instant,
    first_delay: Duration,
    calls: Arc<Mutex<Vec<(String, Duration)>>>,
}

impl SlowApplier {
    pub fn new(first_delay: Duration) -> Self {
        Self {
            started: tokio::time::Instant::now(),
            first_delay,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a SlowApplier that shares state with an existing one
    pub fn sharing_state_with(other: &Self) -> Self {
        Self {
            started: other.started,
            first_delay: other.first_delay,
            calls: Arc::clone(&other.calls),
        }
    }

    /// Addresses with their start time relative to creation
    pub fn calls(&self) -> Vec<(String, Duration)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl DnsApplier for SlowApplier {
    async fn apply(&self, address: &str) -> Result<ApplyReport> {
        let first = {
            let mut calls = self.calls.lock().unwrap();
            calls.push((address.to_string(), self.started.elapsed()));
            calls.len() == 1
        };
        if first {
            tokio::time::sleep(self.first_delay).await;
        }

        let mut report = ApplyReport::new(address);
        report.applied("Wi-Fi", "");
        Ok(report)
    }

    async fn active_targets(&self) -> Result<Vec<String>> {
        Ok(vec!["Wi-Fi".to_string()])
    }

    fn applier_name(&self) -> &'static str {
        "slow"
    }
}

/// An applier that blocks until the quit token fires, like a hung command
pub struct HangingApplier {
    pub token: CancellationToken,
}

#[async_trait::async_trait]
impl DnsApplier for HangingApplier {
    async fn apply(&self, address: &str) -> Result<ApplyReport> {
        self.token.cancelled().await;
        Err(Error::Cancelled {
            command: format!("set dns {address}"),
        })
    }

    async fn active_targets(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    fn applier_name(&self) -> &'static str {
        "hanging"
    }
}

/// A notifier that records every message
#[derive(Clone)]
pub struct RecordingNotifier {
    notifications: Arc<Mutex<Vec<(String, String)>>>,
    alerts: Arc<Mutex<Vec<(String, String)>>>,
    fail_notify: Arc<AtomicBool>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self {
            notifications: Arc::new(Mutex::new(Vec::new())),
            alerts: Arc::new(Mutex::new(Vec::new())),
            fail_notify: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make notify() fail, as if the desktop session were gone
    pub fn failing(self) -> Self {
        self.fail_notify.store(true, Ordering::SeqCst);
        self
    }

    pub fn notifications(&self) -> Vec<(String, String)> {
        self.notifications.lock().unwrap().clone()
    }

    pub fn alerts(&self) -> Vec<(String, String)> {
        self.alerts.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, title: &str, body: &str) -> Result<()> {
        if self.fail_notify.load(Ordering::SeqCst) {
            return Err(Error::notification("no notification daemon"));
        }
        self.notifications
            .lock()
            .unwrap()
            .push((title.to_string(), body.to_string()));
        Ok(())
    }

    async fn alert(&self, title: &str, body: &str) -> Result<()> {
        self.alerts
            .lock()
            .unwrap()
            .push((title.to_string(), body.to_string()));
        Ok(())
    }
}

/// Config rotating through `addresses` with a long interval so only the
/// immediate first tick fires during a test
pub fn test_config(addresses: &[&str], notify_user: bool) -> RotationConfig {
    RotationConfig {
        dns_addresses: addresses.iter().map(|a| a.to_string()).collect(),
        run_on_startup: false,
        change_interval_hours: 6,
        notify_user,
        ..RotationConfig::default()
    }
}

/// Wait for the next event matching `pred`, failing the test after 5 seconds
pub async fn wait_for_event<F>(rx: &mut mpsc::Receiver<RotationEvent>, pred: F) -> RotationEvent
where
    F: Fn(&RotationEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match rx.recv().await {
                Some(event) if pred(&event) => return event,
                Some(_) => continue,
                None => panic!("event channel closed before expected event"),
            }
        }
    })
    .await
    .expect("expected event within 5 seconds")
}
