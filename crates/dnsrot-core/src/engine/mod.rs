//! Rotation controller
//!
//! The RotationController is responsible for:
//! - Merging timer ticks, manual change requests and quit into one loop
//! - Picking the next address from the rotation state
//! - Applying it via the DnsApplier
//! - Reporting the outcome via the Notifier
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌─────────────┐
//! │  Interval   │   │ change_rx    │   │  shutdown   │
//! │  (timer)    │   │ (depth 1)    │   │  (token)    │
//! └──────┬──────┘   └──────┬───────┘   └──────┬──────┘
//!        └─────────────────┼──────────────────┘
//!                          ▼
//!                 ┌──────────────────┐
//!                 │RotationController│──── RotationEvent ───▶ monitor
//!                 └──────────────────┘
//!                          │
//!         ┌────────────────┼────────────────┐
//!         ▼                ▼                ▼
//! ┌──────────────┐ ┌──────────────┐ ┌──────────────┐
//! │RotationState │ │ DnsApplier   │ │  Notifier    │
//! │ (select)     │ │ (apply)      │ │ (report)     │
//! └──────────────┘ └──────────────┘ └──────────────┘
//! ```
//!
//! ## Serialization
//!
//! Cycles run inline in the select loop, so there is never more than one
//! apply in flight. Timer ticks that come due during a cycle are dropped,
//! not queued: after a cycle that overran a tick, the timer restarts one full
//! interval from the cycle's end. A second change request while one is pending is dropped by
//! [`ControllerHandle::request_change`]. Quit is polled first, so it wins
//! when several sources are ready at the same instant.

use crate::config::{AdvancePolicy, FailurePolicy, RotationConfig};
use crate::error::{Error, Result};
use crate::rotation::{RotationState, Selection};
use crate::traits::{ApplyReport, DnsApplier, Notifier};
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::IntervalStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Capacity of the monitoring event channel
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Title of the success notification
pub const CHANGED_TITLE: &str = "DNS Change";

/// Title of the failure alert
pub const ERROR_TITLE: &str = "DNS Change Error";

/// What started a rotation cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// The rotation interval elapsed
    Timer,
    /// The user asked for a change
    Manual,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timer => f.write_str("timer"),
            Self::Manual => f.write_str("manual"),
        }
    }
}

/// Signals forwarded by the UI shell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    /// Rotate to the next address now
    ChangeRequested,
    /// Stop the controller
    QuitRequested,
}

/// Why the controller loop ended without an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The user asked to quit
    Quit,
}

/// Events emitted by the RotationController
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotationEvent {
    /// Controller loop started
    Started {
        addresses: usize,
        interval: Duration,
    },

    /// A cycle picked an address and is applying it
    CycleStarted {
        trigger: Trigger,
        address: String,
    },

    /// The address was applied (and notified, if enabled)
    CycleSucceeded {
        trigger: Trigger,
        address: String,
        applied_at: chrono::DateTime<chrono::Utc>,
    },

    /// The cycle failed
    CycleFailed {
        trigger: Trigger,
        error: String,
    },

    /// Timer ticks came due while a cycle was running and were dropped
    TicksDropped {
        count: u64,
    },

    /// Controller loop stopped
    Stopped {
        reason: String,
    },
}

/// Outcome of a successful cycle
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// What started the cycle
    pub trigger: Trigger,
    /// The address and its list position
    pub selection: Selection,
    /// Per-target outcomes
    pub report: ApplyReport,
    /// When the address was applied
    pub applied_at: chrono::DateTime<chrono::Utc>,
}

/// Cloneable handle for feeding UI signals into a running controller
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    change_tx: mpsc::Sender<()>,
    shutdown: CancellationToken,
}

impl ControllerHandle {
    /// Forward a UI signal
    pub fn send(&self, event: ControlEvent) {
        match event {
            ControlEvent::ChangeRequested => {
                self.request_change();
            }
            ControlEvent::QuitRequested => self.request_quit(),
        }
    }

    /// Ask for a rotation now
    ///
    /// Returns `false` if a request is already pending or the controller has
    /// stopped; the request is dropped in that case.
    pub fn request_change(&self) -> bool {
        match self.change_tx.try_send(()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(())) => {
                warn!("Change already pending, dropping request");
                false
            }
            Err(mpsc::error::TrySendError::Closed(())) => {
                debug!("Controller stopped, ignoring change request");
                false
            }
        }
    }

    /// Stop the controller, cancelling any running command
    pub fn request_quit(&self) {
        self.shutdown.cancel();
    }
}

/// Serialized rotation loop
///
/// ## Lifecycle
///
/// 1. Create with [`RotationController::new()`]
/// 2. Take a [`ControllerHandle`] for the UI shell
/// 3. Start with [`RotationController::run()`]; the first tick fires at once
/// 4. The loop ends on quit (`Ok`) or, under [`FailurePolicy::FailStop`], on
///    the first failed cycle (`Err`)
pub struct RotationController {
    /// Applies an address to the OS
    applier: Box<dyn DnsApplier>,

    /// Success notifications and failure alerts
    notifier: Box<dyn Notifier>,

    /// Candidate addresses, copied into a fresh RotationState by `run`
    addresses: Vec<String>,

    /// Time between timer-driven cycles
    tick_interval: Duration,

    /// Notify after successful cycles; also gates timer failure alerts
    notify_user: bool,

    failure_policy: FailurePolicy,

    advance_policy: AdvancePolicy,

    /// Depth-1 change request queue
    change_tx: mpsc::Sender<()>,
    change_rx: mpsc::Receiver<()>,

    /// Quit signal, shared with the command runner
    shutdown: CancellationToken,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<RotationEvent>,
}

impl RotationController {
    /// Create a controller from configuration
    ///
    /// # Returns
    ///
    /// A tuple of (controller, event_receiver) where event_receiver yields
    /// [`RotationEvent`]s
    pub fn new(
        applier: Box<dyn DnsApplier>,
        notifier: Box<dyn Notifier>,
        config: &RotationConfig,
    ) -> (Self, mpsc::Receiver<RotationEvent>) {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (change_tx, change_rx) = mpsc::channel(1);

        let controller = Self {
            applier,
            notifier,
            addresses: config.dns_addresses.clone(),
            tick_interval: config.change_interval(),
            notify_user: config.notify_user,
            failure_policy: config.failure_policy,
            advance_policy: config.advance_policy,
            change_tx,
            change_rx,
            shutdown: CancellationToken::new(),
            event_tx,
        };

        (controller, event_rx)
    }

    /// Override the timer interval (diagnostic mode uses seconds, not hours)
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Share a quit token with other components (e.g. the command runner)
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Handle for forwarding UI signals
    pub fn handle(&self) -> ControllerHandle {
        ControllerHandle {
            change_tx: self.change_tx.clone(),
            shutdown: self.shutdown.clone(),
        }
    }

    /// Run the controller loop
    ///
    /// # Returns
    ///
    /// - `Ok(StopReason::Quit)`: Quit was requested
    /// - `Err(Error)`: A cycle failed under the fail-stop policy
    pub async fn run(mut self) -> Result<StopReason> {
        if self.tick_interval.is_zero() {
            return Err(Error::config("rotation interval must be greater than zero"));
        }

        let mut state = RotationState::new(self.addresses.clone());

        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut ticks = IntervalStream::new(interval);
        // Deadline of the most recent tick; the first one fires now
        let mut last_tick = Instant::now();

        info!(
            applier = self.applier.applier_name(),
            addresses = state.len(),
            interval = ?self.tick_interval,
            "Rotation controller started"
        );
        self.emit_event(RotationEvent::Started {
            addresses: state.len(),
            interval: self.tick_interval,
        });

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => {
                    return Ok(self.stop_on_quit());
                }

                Some(()) = self.change_rx.recv() => {
                    if let Some(exit) = self.on_trigger(&mut state, Trigger::Manual).await {
                        return exit;
                    }
                    self.drop_overdue_ticks(&mut ticks, &mut last_tick);
                }

                Some(deadline) = ticks.next() => {
                    debug!("Tick");
                    last_tick = deadline;
                    if let Some(exit) = self.on_trigger(&mut state, Trigger::Timer).await {
                        return exit;
                    }
                    self.drop_overdue_ticks(&mut ticks, &mut last_tick);
                }
            }
        }
    }

    /// Execute one rotation cycle
    ///
    /// 1. Pick the next address (fails with `NoAddressesConfigured` on an empty list)
    /// 2. Apply it
    /// 3. Notify on success, if enabled
    ///
    /// No retries. A failed notification fails the cycle.
    pub async fn run_cycle(
        &self,
        state: &mut RotationState,
        trigger: Trigger,
    ) -> Result<CycleReport> {
        let selection = state.select(self.advance_policy)?;

        info!(%trigger, address = %selection.address, index = selection.index, "Changing DNS");
        self.emit_event(RotationEvent::CycleStarted {
            trigger,
            address: selection.address.clone(),
        });

        let report = self
            .applier
            .apply(&selection.address)
            .await?
            .into_result()?;

        for outcome in &report.outcomes {
            debug!(target = outcome.target(), address = %selection.address, "DNS applied");
        }

        if self.notify_user {
            let body = format!("DNS has been changed to {}", selection.address);
            self.notifier
                .notify(CHANGED_TITLE, &body)
                .await
                .map_err(|e| match e {
                    Error::Notification(_) => e,
                    other => Error::notification(other.to_string()),
                })?;
        }

        state.complete(&selection, self.advance_policy);

        let applied_at = chrono::Utc::now();
        info!(address = %selection.address, "DNS changed");
        self.emit_event(RotationEvent::CycleSucceeded {
            trigger,
            address: selection.address.clone(),
            applied_at,
        });

        Ok(CycleReport {
            trigger,
            selection,
            report,
            applied_at,
        })
    }

    /// Run a cycle and apply the failure policy
    ///
    /// Returns `Some` if the loop must exit.
    async fn on_trigger(
        &self,
        state: &mut RotationState,
        trigger: Trigger,
    ) -> Option<Result<StopReason>> {
        let result = self.run_cycle(state, trigger).await;

        let error = match result {
            Ok(_) => return None,
            Err(e) => e,
        };

        // A command killed by quit is not a rotation failure
        if self.shutdown.is_cancelled() {
            debug!(error = %error, "Cycle interrupted by quit");
            return Some(Ok(self.stop_on_quit()));
        }

        self.report_failure(trigger, &error).await;
        self.emit_event(RotationEvent::CycleFailed {
            trigger,
            error: error.to_string(),
        });

        match self.failure_policy {
            FailurePolicy::FailStop => {
                error!("Stopping after failed DNS change");
                self.emit_event(RotationEvent::Stopped {
                    reason: format!("{trigger} cycle failed"),
                });
                Some(Err(error))
            }
            FailurePolicy::KeepRunning => {
                warn!("Keeping previous DNS, waiting for next trigger");
                None
            }
        }
    }

    /// Log a failure and alert the user where the trigger warrants it
    ///
    /// Manual changes always alert; timer failures alert only when
    /// notifications are enabled.
    async fn report_failure(&self, trigger: Trigger, error: &Error) {
        error!(%trigger, category = ?error.category(), "DNS change failed: {}", error);

        let should_alert = match trigger {
            Trigger::Manual => true,
            Trigger::Timer => self.notify_user,
        };

        if should_alert
            && let Err(alert_err) = self.notifier.alert(ERROR_TITLE, &error.to_string()).await
        {
            warn!(error = %alert_err, "Failed to show alert");
        }
    }

    /// Discard ticks that came due while a cycle ran
    ///
    /// Counts the deadlines passed since `last_tick` and, if any, restarts the
    /// timer so the next tick is a full interval away.
    fn drop_overdue_ticks(&self, ticks: &mut IntervalStream, last_tick: &mut Instant) {
        let now = Instant::now();
        let overdue = now.saturating_duration_since(*last_tick);
        let count = (overdue.as_nanos() / self.tick_interval.as_nanos()) as u64;
        if count == 0 {
            return;
        }

        ticks.as_mut().reset();
        *last_tick = now;

        warn!(count, ?overdue, "Cycle outlasted the rotation interval, ticks dropped");
        self.emit_event(RotationEvent::TicksDropped { count });
    }

    fn stop_on_quit(&self) -> StopReason {
        info!("Quit requested");
        self.emit_event(RotationEvent::Stopped {
            reason: "Quit requested".to_string(),
        });
        StopReason::Quit
    }

    /// Emit a monitoring event, dropping it if the channel is full
    fn emit_event(&self, event: RotationEvent) {
        if self.event_tx.try_send(event).is_err() {
            debug!("Event channel full or closed, dropping event");
        }
    }
}
