// # dnsrot-core
//
// Core library for the rotating DNS resolver daemon.
//
// ## Architecture Overview
//
// This library provides the platform-independent part of DNS rotation:
// - **DnsApplier**: Trait for pushing one resolver address into the OS
// - **Notifier**: Trait for user-visible notifications and alerts
// - **CommandRunner**: Trait for executing OS commands with a deadline
// - **RotationState**: The rotation cursor, owned by the controller loop
// - **RotationController**: Serialized loop merging timer, change and quit
//
// ## Design Principles
//
// 1. **One cycle at a time**: Mutual exclusion is structural, not a lock
// 2. **Explicit policies**: Failure and advance behaviour are named config values
// 3. **Platform code at the edge**: OS commands live in `dnsrot-platform`
// 4. **No hidden retries**: Every failure is reported exactly once

pub mod config;
pub mod engine;
pub mod error;
pub mod rotation;
pub mod traits;

// Re-export core types for convenience
pub use config::{AdvancePolicy, ConfigFile, FailurePolicy, RotationConfig};
pub use engine::{
    ControlEvent, ControllerHandle, CycleReport, RotationController, RotationEvent, StopReason,
    Trigger,
};
pub use error::{Error, ErrorCategory, Result};
pub use rotation::{RotationState, Selection};
pub use traits::{
    ApplyFailures, ApplyReport, CommandOutput, CommandRunner, CommandSpec, DnsApplier,
    LogNotifier, Notifier, TargetFailure, TargetOutcome,
};
