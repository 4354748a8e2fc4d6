// tests/common/mod.rs
#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use livewatch::{
    NotificationSink, Platform, PlatformAdapter, QueryError, RawRecord, StreamEvent,
};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What a scripted adapter answers on one call.
pub enum Step {
    Records(Vec<Value>),
    Fail,
}

/// Adapter that replays a script, one step per call; the last step repeats.
pub struct ScriptedAdapter {
    platform: Platform,
    steps: Mutex<VecDeque<Step>>,
    last: Mutex<Option<Vec<Value>>>,
    pub calls: Arc<AtomicUsize>,
}

impl ScriptedAdapter {
    pub fn new(platform: Platform, steps: Vec<Step>) -> Self {
        Self {
            platform,
            steps: Mutex::new(steps.into()),
            last: Mutex::new(None),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Same answer on every call.
    pub fn always(platform: Platform, records: Vec<Value>) -> Self {
        Self::new(platform, vec![Step::Records(records)])
    }

    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl PlatformAdapter for ScriptedAdapter {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn list_live_streams(&self, _search_term: &str) -> Result<Vec<RawRecord>, QueryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self.steps.lock().unwrap().pop_front();
        let records = match step {
            Some(Step::Records(r)) => {
                *self.last.lock().unwrap() = Some(r.clone());
                r
            }
            Some(Step::Fail) => {
                *self.last.lock().unwrap() = None;
                return Err(QueryError::Status {
                    platform: self.platform,
                    status: 503,
                });
            }
            None => match self.last.lock().unwrap().clone() {
                Some(r) => r,
                None => {
                    return Err(QueryError::Status {
                        platform: self.platform,
                        status: 503,
                    })
                }
            },
        };
        Ok(records
            .into_iter()
            .map(|v| RawRecord::from_value(v).expect("fixture records are objects"))
            .collect())
    }
}

/// Sink that records `(streamer, title, platform)` per call.
#[derive(Default)]
pub struct RecordingSink {
    pub calls: Mutex<Vec<(String, String, String)>>,
    pub fail: bool,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Self::default()
        })
    }

    pub fn calls(&self) -> Vec<(String, String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn notify(&self, event: &StreamEvent) -> Result<()> {
        self.calls.lock().unwrap().push((
            event.streamer_name.clone(),
            event.title.clone(),
            event.platform.to_string(),
        ));
        if self.fail {
            anyhow::bail!("sink unavailable");
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Sink that takes `delay` per call and then fails, like a webhook that is down.
pub struct StallingSink {
    pub delay: Duration,
    pub calls: AtomicUsize,
}

impl StallingSink {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl NotificationSink for StallingSink {
    async fn notify(&self, _event: &StreamEvent) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        anyhow::bail!("webhook unreachable")
    }

    fn name(&self) -> &'static str {
        "stalling"
    }
}

pub fn twitch_record(user: &str, id: &str, title: &str) -> Value {
    serde_json::json!({ "user_name": user, "id": id, "title": title })
}

pub fn youtube_record(channel: &str, video_id: &str, title: &str) -> Value {
    serde_json::json!({
        "id": { "kind": "youtube#video", "videoId": video_id },
        "snippet": { "channelTitle": channel, "title": title }
    })
}
