// # DNS Applier Trait
//
// Defines the interface for pushing one resolver address into the host's
// DNS configuration.
//
// ## Implementations
//
// - `dnsrot-platform`: Windows adapters, Linux resolv.conf, macOS network services
//
// ## Usage
//
// ```rust,ignore
// use dnsrot_core::DnsApplier;
//
// let report = applier.apply("1.1.1.1").await?;
// if !report.is_success() {
//     eprintln!("{}", report.failures());
// }
// ```

use async_trait::async_trait;
use std::fmt;

/// A target that rejected the address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetFailure {
    /// Interface alias, network service name, or resolver file
    pub target: String,
    /// The address that was being applied
    pub address: String,
    /// Description of the command error (exit status, spawn failure, timeout)
    pub error: String,
    /// Raw combined command output
    pub output: String,
}

impl fmt::Display for TargetFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Error changing DNS for {} to {}: {}. Output: {}",
            self.target,
            self.address,
            self.error,
            self.output.trim_end()
        )
    }
}

/// Outcome of applying the address to a single target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetOutcome {
    /// The command completed successfully
    Applied {
        /// Target identifier
        target: String,
        /// Raw combined command output
        output: String,
    },
    /// The command failed
    Failed(TargetFailure),
}

impl TargetOutcome {
    /// Target identifier for either variant
    pub fn target(&self) -> &str {
        match self {
            Self::Applied { target, .. } => target,
            Self::Failed(failure) => &failure.target,
        }
    }

    /// Returns `true` if the target accepted the address
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

/// Non-empty, ordered list of per-target failures
///
/// Renders as one line per failed target so a partial failure across several
/// interfaces is never collapsed into a single message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyFailures(Vec<TargetFailure>);

impl ApplyFailures {
    /// Wrap a list of failures, returning `None` if it is empty
    pub fn new(failures: Vec<TargetFailure>) -> Option<Self> {
        if failures.is_empty() {
            None
        } else {
            Some(Self(failures))
        }
    }

    /// Iterate over the failures in attempt order
    pub fn iter(&self) -> std::slice::Iter<'_, TargetFailure> {
        self.0.iter()
    }

    /// Number of failed targets
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ApplyFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{failure}")?;
        }
        Ok(())
    }
}

/// Aggregated result of one `apply` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyReport {
    /// The address that was applied
    pub address: String,
    /// One entry per attempted target, in attempt order
    pub outcomes: Vec<TargetOutcome>,
}

impl ApplyReport {
    /// Create an empty report for an address
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            outcomes: Vec::new(),
        }
    }

    /// Record a successful target
    pub fn applied(&mut self, target: impl Into<String>, output: impl Into<String>) {
        self.outcomes.push(TargetOutcome::Applied {
            target: target.into(),
            output: output.into(),
        });
    }

    /// Record a failed target
    pub fn failed(
        &mut self,
        target: impl Into<String>,
        error: impl Into<String>,
        output: impl Into<String>,
    ) {
        self.outcomes.push(TargetOutcome::Failed(TargetFailure {
            target: target.into(),
            address: self.address.clone(),
            error: error.into(),
            output: output.into(),
        }));
    }

    /// Returns `true` if no target failed
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(TargetOutcome::is_applied)
    }

    /// Collect the failed targets, if any
    pub fn failures(&self) -> Option<ApplyFailures> {
        ApplyFailures::new(
            self.outcomes
                .iter()
                .filter_map(|outcome| match outcome {
                    TargetOutcome::Failed(failure) => Some(failure.clone()),
                    TargetOutcome::Applied { .. } => None,
                })
                .collect(),
        )
    }

    /// Convert into `Err(Error::PartialApply)` if any target failed
    pub fn into_result(self) -> Result<Self, crate::Error> {
        match self.failures() {
            Some(failures) => Err(crate::Error::PartialApply(failures)),
            None => Ok(self),
        }
    }
}

/// Trait for OS-specific DNS appliers
///
/// An applier turns one logical "set DNS to address A" intent into one or
/// more OS commands and aggregates their outcomes.
///
/// # Contract
///
/// - Every attempted target gets an entry in the returned [`ApplyReport`]
/// - A failing target never stops the remaining targets from being attempted
/// - Errors that prevent *any* target from being attempted (unsupported OS,
///   no enumerable interfaces) are returned as `Err`, not as a report
/// - No retries; the controller owns all policy
#[async_trait]
pub trait DnsApplier: Send + Sync {
    /// Apply `address` as the system resolver
    async fn apply(&self, address: &str) -> Result<ApplyReport, crate::Error>;

    /// List the targets the next `apply` would configure
    async fn active_targets(&self) -> Result<Vec<String>, crate::Error>;

    /// Short name for logging (e.g. "windows-adapters")
    fn applier_name(&self) -> &'static str;
}
