// # Notifier Trait
//
// Defines the interface for user-visible notifications and alerts.
//
// ## Implementations
//
// - Desktop notifications: `dnsrot-platform::DesktopNotifier`
// - Log only: [`LogNotifier`]

use async_trait::async_trait;
use tracing::{info, warn};

/// Trait for notification channels
///
/// Delivery may fail; the controller folds a failed success-notification into
/// the cycle's failure outcome.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Show an informational notification
    async fn notify(&self, title: &str, body: &str) -> Result<(), crate::Error>;

    /// Show an alert about a failure
    ///
    /// Defaults to [`Notifier::notify`].
    async fn alert(&self, title: &str, body: &str) -> Result<(), crate::Error> {
        self.notify(title, body).await
    }
}

/// Notifier that only writes to the log
///
/// Used when no desktop session is available.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, title: &str, body: &str) -> Result<(), crate::Error> {
        info!(%title, %body, "Notification");
        Ok(())
    }

    async fn alert(&self, title: &str, body: &str) -> Result<(), crate::Error> {
        warn!(%title, %body, "Alert");
        Ok(())
    }
}
