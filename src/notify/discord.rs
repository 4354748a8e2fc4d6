// src/notify/discord.rs
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::{headline, NotificationSink};
use crate::event::StreamEvent;

#[derive(Clone)]
pub struct DiscordSink {
    webhook: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
    base_delay: Duration,
}

impl DiscordSink {
    pub fn new(webhook: String) -> Self {
        Self {
            webhook,
            client: Client::new(),
            timeout: Duration::from_secs(5),
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    /// Delay before retry `n` is `base * 2^(n-1)`.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }
}

#[async_trait]
impl NotificationSink for DiscordSink {
    async fn notify(&self, event: &StreamEvent) -> Result<()> {
        let payload = DiscordWebhookPayload::embed(event);

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&self.webhook)
                .timeout(self.timeout)
                .json(&payload)
                .send()
                .await;

            let err = match res {
                Ok(rsp) => match rsp.error_for_status() {
                    Ok(_) => return Ok(()),
                    Err(e) => anyhow!("Discord webhook HTTP error: {}", e.without_url()),
                },
                Err(e) => anyhow!("Discord webhook request failed: {}", e.without_url()),
            };

            if attempt >= self.max_retries {
                return Err(err);
            }
            tokio::time::sleep(self.base_delay * (1u32 << (attempt - 1).min(10))).await;
        }
    }

    fn name(&self) -> &'static str {
        "discord"
    }
}

#[derive(Serialize)]
struct DiscordEmbed {
    title: String,
    description: String,
    url: String,
}

#[derive(Serialize)]
struct DiscordWebhookPayload {
    content: Option<String>,
    embeds: Vec<DiscordEmbed>,
}

impl DiscordWebhookPayload {
    fn embed(event: &StreamEvent) -> Self {
        Self {
            content: None,
            embeds: vec![DiscordEmbed {
                title: headline(event),
                description: format!("**{}**\n{}", event.platform, event.title),
                url: event.url.clone(),
            }],
        }
    }
}
