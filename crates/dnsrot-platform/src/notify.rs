//! Desktop notifications via `notify-rust`

use async_trait::async_trait;
use dnsrot_core::{Error, Notifier, Result};

/// Shows notifications in the desktop session
#[derive(Debug, Clone)]
pub struct DesktopNotifier {
    app_name: String,
}

impl DesktopNotifier {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
        }
    }

    async fn show(&self, title: &str, body: &str, sticky: bool) -> Result<()> {
        let app_name = self.app_name.clone();
        let title = title.to_string();
        let body = body.to_string();

        // `show` talks to the notification daemon synchronously
        tokio::task::spawn_blocking(move || {
            let mut notification = notify_rust::Notification::new();
            notification.appname(&app_name).summary(&title).body(&body);
            if sticky {
                notification.timeout(notify_rust::Timeout::Never);
            }
            notification.show().map(|_| ())
        })
        .await
        .map_err(|e| Error::notification(format!("notification task failed: {e}")))?
        .map_err(|e| Error::notification(e.to_string()))
    }
}

#[async_trait]
impl Notifier for DesktopNotifier {
    async fn notify(&self, title: &str, body: &str) -> Result<()> {
        self.show(title, body, false).await
    }

    /// Alerts stay on screen until dismissed
    async fn alert(&self, title: &str, body: &str) -> Result<()> {
        self.show(title, body, true).await
    }
}
