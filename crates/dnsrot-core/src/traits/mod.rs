//! Core traits for the DNS rotator
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`DnsApplier`]: Push a resolver address into the OS configuration
//! - [`Notifier`]: Show notifications and alerts to the user
//! - [`CommandRunner`]: Execute OS commands with a deadline

pub mod command_runner;
pub mod dns_applier;
pub mod notifier;

pub use command_runner::{CommandOutput, CommandRunner, CommandSpec};
pub use dns_applier::{ApplyFailures, ApplyReport, DnsApplier, TargetFailure, TargetOutcome};
pub use notifier::{LogNotifier, Notifier};
