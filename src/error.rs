// src/error.rs
//! Error taxonomy for the watcher.
//!
//! - [`InitError`]: startup is impossible (bad config, auth, unknown game). Fatal.
//! - [`QueryError`]: one platform query failed during a tick. Logged, retried next tick.
//! - [`NormalizationError`]: one raw record did not match the adapter contract. That
//!   record is dropped, the rest of the batch continues.

use crate::event::Platform;

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("{platform} authentication failed: {reason}")]
    Auth { platform: Platform, reason: String },

    #[error("{platform}: could not resolve '{term}': {reason}")]
    Resolve {
        platform: Platform,
        term: String,
        reason: String,
    },

    #[error("{platform} init request failed: {source}")]
    Http {
        platform: Platform,
        #[source]
        source: reqwest::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("{platform} request failed: {source}")]
    Http {
        platform: Platform,
        #[source]
        source: reqwest::Error,
    },

    #[error("{platform} returned HTTP {status}")]
    Status { platform: Platform, status: u16 },

    #[error("{platform} response could not be decoded: {reason}")]
    Decode { platform: Platform, reason: String },

    #[error("{platform} has no resolved category for '{term}'")]
    UnresolvedTerm { platform: Platform, term: String },
}

impl QueryError {
    pub fn platform(&self) -> Platform {
        match self {
            QueryError::Http { platform, .. }
            | QueryError::Status { platform, .. }
            | QueryError::Decode { platform, .. }
            | QueryError::UnresolvedTerm { platform, .. } => *platform,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizationError {
    #[error("{platform} record is missing required field '{field}'")]
    MissingField {
        platform: Platform,
        field: &'static str,
    },

    #[error("{platform} record field '{field}' is invalid: {reason}")]
    InvalidField {
        platform: Platform,
        field: &'static str,
        reason: String,
    },
}
