// src/notify/slack.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::{headline, NotificationSink};
use crate::event::StreamEvent;

pub struct SlackSink {
    webhook_url: String,
    client: Client,
    timeout: Duration,
}

impl SlackSink {
    pub fn new(url: String) -> Self {
        Self {
            webhook_url: url,
            client: Client::new(),
            timeout: Duration::from_secs(5),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }
}

#[async_trait]
impl NotificationSink for SlackSink {
    async fn notify(&self, event: &StreamEvent) -> Result<()> {
        let text = format!(
            "*{}* ({})\n{}\n<{}>",
            headline(event),
            event.platform,
            event.title,
            event.url
        );
        let body = serde_json::json!({ "text": text });

        self.client
            .post(&self.webhook_url)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(reqwest::Error::without_url)
            .context("slack post")?
            .error_for_status()
            .map_err(reqwest::Error::without_url)
            .context("slack non-2xx")?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "slack"
    }
}
