// src/platforms/youtube.rs
//! YouTube Data API v3 adapter: live video search by keyword.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::{records_from_body, PlatformAdapter};
use crate::config::YouTubeConfig;
use crate::error::{InitError, QueryError};
use crate::event::{Platform, RawRecord};

const PLATFORM: Platform = Platform::YouTube;
const MAX_RESULTS_LIMIT: u32 = 50;

/// Quota units one `search.list` call costs.
pub const SEARCH_QUOTA_COST: u64 = 100;
/// Daily quota a Data API project gets unless more was granted.
pub const DEFAULT_DAILY_QUOTA: u64 = 10_000;

/// Quota units spent per day when searching every `interval`.
pub fn daily_quota_cost(interval: Duration) -> u64 {
    let secs = interval.as_secs().max(1);
    86_400u64.div_ceil(secs) * SEARCH_QUOTA_COST
}

/// API key session. YouTube needs no token exchange.
#[derive(Clone)]
pub struct YouTubeSession {
    api_key: String,
}

impl YouTubeSession {
    pub fn from_api_key(api_key: &str) -> Result<Self, InitError> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(InitError::Auth {
                platform: PLATFORM,
                reason: "api key is empty".into(),
            });
        }
        Ok(Self {
            api_key: api_key.to_string(),
        })
    }
}

impl std::fmt::Debug for YouTubeSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("YouTubeSession(<redacted>)")
    }
}

pub struct YouTubeAdapter {
    client: Client,
    api_base: String,
    session: YouTubeSession,
    max_results: u32,
}

impl YouTubeAdapter {
    pub fn new(client: Client, cfg: &YouTubeConfig, session: YouTubeSession) -> Self {
        Self {
            client,
            api_base: cfg.api_base.trim_end_matches('/').to_string(),
            session,
            max_results: cfg.max_results.clamp(1, MAX_RESULTS_LIMIT),
        }
    }
}

#[async_trait]
impl PlatformAdapter for YouTubeAdapter {
    fn platform(&self) -> Platform {
        PLATFORM
    }

    async fn list_live_streams(&self, search_term: &str) -> Result<Vec<RawRecord>, QueryError> {
        let max = self.max_results.to_string();
        // The key travels in the query string, so strip URLs from errors.
        let resp = self
            .client
            .get(format!("{}/search", self.api_base))
            .query(&[
                ("part", "snippet"),
                ("eventType", "live"),
                ("type", "video"),
                ("q", search_term),
                ("maxResults", max.as_str()),
                ("key", self.session.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| QueryError::Http {
                platform: PLATFORM,
                source: e.without_url(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(QueryError::Status {
                platform: PLATFORM,
                status: status.as_u16(),
            });
        }

        let body: serde_json::Value = resp.json().await.map_err(|e| QueryError::Decode {
            platform: PLATFORM,
            reason: e.without_url().to_string(),
        })?;
        records_from_body(PLATFORM, &body, "items")
    }
}
