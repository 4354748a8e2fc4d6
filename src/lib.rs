// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod dedup;
pub mod error;
pub mod event;
pub mod normalize;
pub mod notify;
pub mod platforms;
pub mod scheduler;
pub mod telemetry;

// ---- Re-exports for stable public API ----
pub use crate::config::WatchConfig;
pub use crate::dedup::{DedupStore, Retention};
pub use crate::error::{InitError, NormalizationError, QueryError};
pub use crate::event::{DedupKey, Platform, RawRecord, StreamEvent};
pub use crate::notify::{NotificationSink, NotifierMux};
pub use crate::platforms::{AdapterSet, PlatformAdapter};
pub use crate::scheduler::{FailureIsolation, Monitor, MonitorSettings, TickReport};
