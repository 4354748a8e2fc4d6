// src/event.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Streaming platform tag. Ordering defines the fixed visit order within a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Twitch,
    YouTube,
}

impl Platform {
    /// Stable lowercase tag, used in dedup keys and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Twitch => "twitch",
            Platform::YouTube => "youtube",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::Twitch => "Twitch",
            Platform::YouTube => "YouTube",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "twitch" => Ok(Platform::Twitch),
            "youtube" | "yt" => Ok(Platform::YouTube),
            other => Err(format!("unknown platform '{other}'")),
        }
    }
}

/// One broadcast exactly as a platform API reported it (a JSON object).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(pub Map<String, Value>);

impl RawRecord {
    /// Returns `None` unless `value` is a JSON object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Walks nested objects, e.g. `["snippet", "title"]`.
    pub fn pointer(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        rest.iter()
            .try_fold(self.0.get(*first)?, |v, seg| v.as_object()?.get(*seg))
    }
}

impl From<Map<String, Value>> for RawRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Identity of one broadcast across every platform, e.g. `twitch:Ada_123`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DedupKey {
    platform: Platform,
    value: String,
}

impl DedupKey {
    /// Key for platforms whose broadcast id is stable for the whole session.
    pub fn new(platform: Platform, stream_id: &str) -> Self {
        Self {
            platform,
            value: stream_id.to_string(),
        }
    }

    /// Key that also pins the broadcaster identity next to the stream id.
    pub fn scoped(platform: Platform, streamer: &str, stream_id: &str) -> Self {
        Self {
            platform,
            value: format!("{streamer}_{stream_id}"),
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.platform.as_str(), self.value)
    }
}

/// A normalized live broadcast observed at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    pub platform: Platform,
    pub stream_id: String,
    pub streamer_name: String,
    pub title: String,
    pub dedup_key: DedupKey,
    pub url: String,
    pub started_at: Option<DateTime<Utc>>,
    pub viewer_count: Option<u64>,
}
