// src/notify/desktop.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use notify_rust::{Notification, Timeout};

use super::{headline, NotificationSink};
use crate::event::StreamEvent;

/// Native desktop popup (D-Bus / Windows toast / macOS notification center).
pub struct DesktopSink {
    app_name: String,
    timeout_ms: u32,
}

impl Default for DesktopSink {
    fn default() -> Self {
        Self {
            app_name: "livewatch".to_string(),
            timeout_ms: 10_000,
        }
    }
}

#[async_trait]
impl NotificationSink for DesktopSink {
    async fn notify(&self, event: &StreamEvent) -> Result<()> {
        let summary = headline(event);
        let body = event.title.clone();
        let app_name = self.app_name.clone();
        let timeout = Timeout::Milliseconds(self.timeout_ms);

        // The platform backends block; keep them off the runtime threads.
        tokio::task::spawn_blocking(move || {
            Notification::new()
                .appname(&app_name)
                .summary(&summary)
                .body(&body)
                .timeout(timeout)
                .show()
                .map(|_| ())
        })
        .await
        .context("desktop notification task")?
        .context("show desktop notification")
    }

    fn name(&self) -> &'static str {
        "desktop"
    }
}
