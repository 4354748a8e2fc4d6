// src/normalize.rs
//! Raw platform record → [`StreamEvent`].
//!
//! Pure and total over the records the adapters produce. A record missing a
//! required field is a contract violation and is reported, never patched over.

use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;
use serde_json::Value;

use crate::error::NormalizationError;
use crate::event::{DedupKey, Platform, RawRecord, StreamEvent};

/// Clean display text: decode HTML entities, collapse whitespace, trim.
/// Punctuation is kept ("Live!" stays "Live!").
pub fn normalize_text(s: &str) -> String {
    let decoded = html_escape::decode_html_entities(s);

    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").expect("static regex"));
    re_ws.replace_all(&decoded, " ").trim().to_string()
}

/// Derive the dedup key for a record without building the full event.
pub fn dedup_key(platform: Platform, record: &RawRecord) -> Result<DedupKey, NormalizationError> {
    match platform {
        Platform::Twitch => {
            let id = required_id(platform, record, &["id"], "id")?;
            let user = required_str(platform, record, &["user_name"], "user_name")?;
            Ok(DedupKey::scoped(platform, user, id))
        }
        Platform::YouTube => {
            let id = required_id(platform, record, &["id", "videoId"], "id.videoId")?;
            Ok(DedupKey::new(platform, id))
        }
    }
}

pub fn normalize(platform: Platform, record: &RawRecord) -> Result<StreamEvent, NormalizationError> {
    let key = dedup_key(platform, record)?;
    match platform {
        Platform::Twitch => normalize_twitch(record, key),
        Platform::YouTube => normalize_youtube(record, key),
    }
}

fn normalize_twitch(
    record: &RawRecord,
    dedup_key: DedupKey,
) -> Result<StreamEvent, NormalizationError> {
    let platform = Platform::Twitch;
    let stream_id = required_id(platform, record, &["id"], "id")?;
    let user_name = required_str(platform, record, &["user_name"], "user_name")?;
    let title = required_str(platform, record, &["title"], "title")?;

    let login = record
        .get("user_login")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(user_name);

    Ok(StreamEvent {
        platform,
        stream_id: stream_id.to_string(),
        streamer_name: normalize_text(user_name),
        title: normalize_text(title),
        dedup_key,
        url: format!("https://www.twitch.tv/{}", login.trim().to_ascii_lowercase()),
        started_at: record
            .get("started_at")
            .and_then(Value::as_str)
            .and_then(parse_rfc3339),
        viewer_count: record.get("viewer_count").and_then(Value::as_u64),
    })
}

fn normalize_youtube(
    record: &RawRecord,
    dedup_key: DedupKey,
) -> Result<StreamEvent, NormalizationError> {
    let platform = Platform::YouTube;
    let video_id = required_id(platform, record, &["id", "videoId"], "id.videoId")?;
    let channel = required_str(
        platform,
        record,
        &["snippet", "channelTitle"],
        "snippet.channelTitle",
    )?;
    let title = required_str(platform, record, &["snippet", "title"], "snippet.title")?;

    Ok(StreamEvent {
        platform,
        stream_id: video_id.to_string(),
        streamer_name: normalize_text(channel),
        title: normalize_text(title),
        dedup_key,
        url: format!("https://www.youtube.com/watch?v={video_id}"),
        started_at: record
            .pointer(&["snippet", "publishedAt"])
            .and_then(Value::as_str)
            .and_then(parse_rfc3339),
        viewer_count: None,
    })
}

fn required_str<'a>(
    platform: Platform,
    record: &'a RawRecord,
    path: &[&str],
    field: &'static str,
) -> Result<&'a str, NormalizationError> {
    match record.pointer(path) {
        None | Some(Value::Null) => Err(NormalizationError::MissingField { platform, field }),
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(other) => Err(NormalizationError::InvalidField {
            platform,
            field,
            reason: format!("expected string, got {other}"),
        }),
    }
}

/// Like [`required_str`] but also rejects blank ids, which would collapse keys.
fn required_id<'a>(
    platform: Platform,
    record: &'a RawRecord,
    path: &[&str],
    field: &'static str,
) -> Result<&'a str, NormalizationError> {
    let s = required_str(platform, record, path, field)?;
    if s.trim().is_empty() {
        return Err(NormalizationError::InvalidField {
            platform,
            field,
            reason: "empty identifier".to_string(),
        });
    }
    Ok(s)
}

fn parse_rfc3339(ts: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(ts)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
