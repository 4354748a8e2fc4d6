// src/platforms/mod.rs
pub mod twitch;
pub mod youtube;

use async_trait::async_trait;
use metrics::counter;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::config::WatchConfig;
use crate::error::{InitError, QueryError};
use crate::event::{Platform, RawRecord};

const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

/// One live-stream source. Pure query: no state changes between calls.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    /// Snapshot of broadcasts currently live for `search_term` (one bounded page).
    async fn list_live_streams(&self, search_term: &str) -> Result<Vec<RawRecord>, QueryError>;
}

/// Adapters keyed by platform, iterated in [`Platform`] order.
#[derive(Default)]
pub struct AdapterSet {
    inner: BTreeMap<Platform, Box<dyn PlatformAdapter>>,
}

impl AdapterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `adapter`, replacing any previous adapter for the same platform.
    pub fn insert(&mut self, adapter: Box<dyn PlatformAdapter>) {
        self.inner.insert(adapter.platform(), adapter);
    }

    pub fn with(mut self, adapter: Box<dyn PlatformAdapter>) -> Self {
        self.insert(adapter);
        self
    }

    pub fn platforms(&self) -> Vec<Platform> {
        self.inner.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Platform, &dyn PlatformAdapter)> {
        self.inner.iter().map(|(p, a)| (*p, a.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Shared HTTP client for all platform calls.
pub fn http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .user_agent(concat!("livewatch/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Build every enabled adapter, including one-time session and category
/// resolution. The first failure aborts; there is no partial start.
pub async fn build_adapters(
    cfg: &WatchConfig,
    client: &reqwest::Client,
) -> Result<AdapterSet, InitError> {
    let mut set = AdapterSet::new();
    for platform in &cfg.platforms {
        let adapter: Box<dyn PlatformAdapter> = match platform {
            Platform::Twitch => Box::new(
                twitch::TwitchAdapter::connect(client.clone(), &cfg.twitch, &cfg.search_term)
                    .await?,
            ),
            Platform::YouTube => {
                let cost = youtube::daily_quota_cost(cfg.poll_interval());
                if cost > youtube::DEFAULT_DAILY_QUOTA {
                    tracing::warn!(
                        interval_secs = cfg.poll_interval_secs,
                        daily_units = cost,
                        default_quota = youtube::DEFAULT_DAILY_QUOTA,
                        "youtube polling will exceed the default daily API quota"
                    );
                }
                Box::new(youtube::YouTubeAdapter::new(
                    client.clone(),
                    &cfg.youtube,
                    youtube::YouTubeSession::from_api_key(&cfg.youtube.api_key)?,
                ))
            }
        };
        tracing::info!(platform = %platform, "platform ready");
        set.insert(adapter);
    }
    Ok(set)
}

/// Pull the array under `field` out of a JSON body. A missing field reads as empty.
/// Entries that are not objects are dropped one by one; only a non-array field
/// fails the whole query.
pub(crate) fn records_from_body(
    platform: Platform,
    body: &serde_json::Value,
    field: &str,
) -> Result<Vec<RawRecord>, QueryError> {
    let Some(items) = body.get(field) else {
        return Ok(Vec::new());
    };
    let arr = items.as_array().ok_or_else(|| QueryError::Decode {
        platform,
        reason: format!("'{field}' is not an array"),
    })?;
    let mut records = Vec::with_capacity(arr.len());
    for (idx, v) in arr.iter().enumerate() {
        match RawRecord::from_value(v.clone()) {
            Some(record) => records.push(record),
            None => {
                tracing::error!(
                    platform = %platform,
                    idx,
                    entry = %v,
                    "dropping non-object '{field}' entry"
                );
                counter!("livewatch_normalization_errors_total", "platform" => platform.as_str())
                    .increment(1);
            }
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Fixed(Platform);

    #[async_trait]
    impl PlatformAdapter for Fixed {
        fn platform(&self) -> Platform {
            self.0
        }
        async fn list_live_streams(&self, _term: &str) -> Result<Vec<RawRecord>, QueryError> {
            Ok(vec![])
        }
    }

    #[test]
    fn set_iterates_in_platform_order_and_replaces() {
        let set = AdapterSet::new()
            .with(Box::new(Fixed(Platform::YouTube)))
            .with(Box::new(Fixed(Platform::Twitch)))
            .with(Box::new(Fixed(Platform::YouTube)));
        assert_eq!(set.len(), 2);
        assert_eq!(set.platforms(), vec![Platform::Twitch, Platform::YouTube]);
    }

    #[test]
    fn records_from_body_handles_missing_and_bad_shapes() {
        let p = Platform::Twitch;
        assert!(records_from_body(p, &json!({}), "data").unwrap().is_empty());
        assert_eq!(
            records_from_body(p, &json!({"data": [{"id": "1"}]}), "data")
                .unwrap()
                .len(),
            1
        );
        assert!(records_from_body(p, &json!({"data": {}}), "data").is_err());
        let kept = records_from_body(p, &json!({"data": [1, "oops", {"id": "2"}]}), "data")
            .unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].get("id"), Some(&json!("2")));
    }
}
