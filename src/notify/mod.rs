// src/notify/mod.rs
//! Notification sinks: where newly detected broadcasts are surfaced.
//!
//! Delivery is best-effort. The scheduler records a broadcast as notified
//! before calling a sink, so a failed send is never retried.

pub mod console;
#[cfg(feature = "desktop")]
pub mod desktop;
pub mod discord;
pub mod slack;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use metrics::counter;
use std::sync::Arc;

use crate::config::NotifyConfig;
use crate::event::StreamEvent;

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, event: &StreamEvent) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Fans one event out to every configured sink.
#[derive(Clone, Default)]
pub struct NotifierMux {
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl NotifierMux {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub fn sink_names(&self) -> Vec<&'static str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    /// Build the sinks enabled in `cfg`.
    pub fn from_config(cfg: &NotifyConfig) -> Self {
        let mut mux = Self::new();
        if cfg.console {
            mux = mux.with(Arc::new(console::ConsoleSink::stdout()));
        }
        if cfg.desktop {
            #[cfg(feature = "desktop")]
            {
                mux = mux.with(Arc::new(desktop::DesktopSink::default()));
            }
            #[cfg(not(feature = "desktop"))]
            tracing::warn!("desktop notifications requested but built without feature `desktop`");
        }
        if let Some(url) = cfg.discord_webhook.as_deref().filter(|u| !u.trim().is_empty()) {
            mux = mux.with(Arc::new(
                discord::DiscordSink::new(url.to_string())
                    .with_timeout(cfg.webhook_timeout_secs)
                    .with_retries(cfg.webhook_retries),
            ));
        }
        if let Some(url) = cfg.slack_webhook.as_deref().filter(|u| !u.trim().is_empty()) {
            mux = mux.with(Arc::new(
                slack::SlackSink::new(url.to_string()).with_timeout(cfg.webhook_timeout_secs),
            ));
        }
        mux
    }
}

#[async_trait]
impl NotificationSink for NotifierMux {
    /// Ok if any sink delivered (or there are none); Err only when all failed.
    async fn notify(&self, event: &StreamEvent) -> Result<()> {
        let mut failures = 0usize;
        for sink in &self.sinks {
            if let Err(e) = sink.notify(event).await {
                failures += 1;
                counter!("livewatch_sink_errors_total", "sink" => sink.name()).increment(1);
                tracing::warn!(sink = sink.name(), key = %event.dedup_key, "notify failed: {e:#}");
            }
        }
        if !self.sinks.is_empty() && failures == self.sinks.len() {
            return Err(anyhow!("all {failures} sinks failed"));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mux"
    }
}

/// Summary line used by the desktop and webhook sinks.
pub fn headline(event: &StreamEvent) -> String {
    format!("{} is live!", event.streamer_name)
}
