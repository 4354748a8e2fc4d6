// src/scheduler.rs
//! Poll loop: query every platform, normalize, drop already-seen broadcasts,
//! notify the rest, sleep, repeat.
//!
//! One tick runs to completion before the next starts. Platforms are visited in
//! [`Platform`] order. A broadcast's key is recorded in the [`DedupStore`] before
//! its delivery is spawned, so a slow or failing sink never causes a second alert.
//! Deliveries run beside the platform queries; a tick waits for them at most
//! `delivery_timeout` before closing.

use metrics::{counter, gauge};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

use crate::config::WatchConfig;
use crate::dedup::{DedupStore, Retention};
use crate::error::InitError;
use crate::event::{Platform, RawRecord, StreamEvent};
use crate::normalize::normalize;
use crate::notify::NotificationSink;
use crate::platforms::{build_adapters, AdapterSet};

/// What a platform failure does to the rest of the tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureIsolation {
    /// Other platforms are still queried in the same tick.
    #[default]
    PerPlatform,
    /// The first failure ends the tick; remaining platforms wait for the next one.
    SharedBoundary,
}

fn default_max_skip_ticks() -> u64 {
    10
}

/// Exponential backoff for a failing platform, counted in ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct BackoffPolicy {
    #[serde(default = "default_max_skip_ticks")]
    pub max_skip_ticks: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_skip_ticks: default_max_skip_ticks(),
        }
    }
}

impl BackoffPolicy {
    /// Ticks to sit out after `failures` consecutive failures: 0, 1, 3, 7, ... capped.
    pub fn skip_ticks(&self, failures: u32) -> u64 {
        if failures == 0 {
            return 0;
        }
        let exp = failures - 1;
        let raw = if exp >= 63 {
            u64::MAX
        } else {
            (1u64 << exp) - 1
        };
        raw.min(self.max_skip_ticks)
    }
}

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub search_term: String,
    pub poll_interval: Duration,
    pub isolation: FailureIsolation,
    pub backoff: Option<BackoffPolicy>,
    pub retention: Retention,
    /// Upper bound for one sink delivery, and for how long a tick waits on them.
    pub delivery_timeout: Duration,
}

pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(30);

impl MonitorSettings {
    pub fn new(search_term: impl Into<String>, poll_interval: Duration) -> Self {
        Self {
            search_term: search_term.into(),
            poll_interval,
            isolation: FailureIsolation::default(),
            backoff: None,
            retention: Retention::default(),
            delivery_timeout: DEFAULT_DELIVERY_TIMEOUT,
        }
    }

    pub fn from_config(cfg: &WatchConfig) -> Self {
        Self {
            search_term: cfg.search_term.clone(),
            poll_interval: cfg.poll_interval(),
            isolation: cfg.isolation,
            backoff: cfg.backoff,
            retention: cfg.dedup,
            delivery_timeout: cfg.notify.delivery_timeout(),
        }
    }
}

/// Outcome of one tick.
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub tick: u64,
    /// Broadcasts seen for the first time, in the order they were sent to the sink.
    pub notified: Vec<StreamEvent>,
    pub failed: Vec<(Platform, String)>,
    /// Platforms not queried this tick (backoff or shared failure boundary).
    pub skipped: Vec<Platform>,
    pub observed: usize,
    pub duplicates: usize,
    pub normalization_errors: usize,
    pub evicted: usize,
    /// Deliveries still running when the tick closed; they finish in the background.
    pub pending_deliveries: usize,
}

#[derive(Debug, Clone, Copy, Default)]
struct PlatformHealth {
    consecutive_failures: u32,
    resume_at_tick: u64,
}

pub struct Monitor {
    adapters: AdapterSet,
    sink: Arc<dyn NotificationSink>,
    store: DedupStore,
    settings: MonitorSettings,
    health: HashMap<Platform, PlatformHealth>,
    deliveries: JoinSet<()>,
    tick: u64,
}

impl Monitor {
    pub fn new(
        adapters: AdapterSet,
        sink: Arc<dyn NotificationSink>,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            adapters,
            sink,
            store: DedupStore::new(settings.retention),
            settings,
            health: HashMap::new(),
            deliveries: JoinSet::new(),
            tick: 0,
        }
    }

    /// Validate `cfg` and build every enabled platform. Any failure aborts startup.
    pub async fn initialize(
        cfg: &WatchConfig,
        client: &reqwest::Client,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<Self, InitError> {
        cfg.validate()?;
        let adapters = build_adapters(cfg, client).await?;
        Ok(Self::new(adapters, sink, MonitorSettings::from_config(cfg)))
    }

    pub fn store(&self) -> &DedupStore {
        &self.store
    }

    pub fn platforms(&self) -> Vec<Platform> {
        self.adapters.platforms()
    }

    /// Number of ticks run so far.
    pub fn ticks(&self) -> u64 {
        self.tick
    }

    pub async fn run_tick(&mut self) -> TickReport {
        self.tick += 1;
        let tick = self.tick;
        let Monitor {
            adapters,
            sink,
            store,
            settings,
            health,
            deliveries,
            ..
        } = self;

        let mut report = TickReport {
            tick,
            ..TickReport::default()
        };
        let mut healthy = HashSet::new();
        let mut boundary_tripped = false;

        for (platform, adapter) in adapters.iter() {
            let state = health.entry(platform).or_default();
            if boundary_tripped || tick < state.resume_at_tick {
                tracing::debug!(platform = %platform, tick, "platform skipped this tick");
                report.skipped.push(platform);
                continue;
            }

            match adapter.list_live_streams(&settings.search_term).await {
                Ok(records) => {
                    if state.consecutive_failures > 0 {
                        tracing::info!(platform = %platform, "platform recovered");
                    }
                    *state = PlatformHealth::default();
                    healthy.insert(platform);
                    counter!("livewatch_streams_seen_total", "platform" => platform.as_str())
                        .increment(records.len() as u64);
                    report.observed += records.len();

                    for record in records {
                        let Some(event) = admit_record(platform, &record, store, &mut report)
                        else {
                            continue;
                        };
                        spawn_delivery(
                            deliveries,
                            Arc::clone(sink),
                            event.clone(),
                            settings.delivery_timeout,
                        );
                        report.notified.push(event);
                    }
                }
                Err(e) => {
                    tracing::warn!(platform = %platform, tick, "error during stream check: {e}");
                    counter!("livewatch_platform_errors_total", "platform" => platform.as_str())
                        .increment(1);
                    state.consecutive_failures = state.consecutive_failures.saturating_add(1);
                    if let Some(policy) = settings.backoff {
                        let skip = policy.skip_ticks(state.consecutive_failures);
                        state.resume_at_tick = tick.saturating_add(1).saturating_add(skip);
                        if skip > 0 {
                            tracing::info!(platform = %platform, skip, "backing off");
                        }
                    }
                    report.failed.push((platform, e.to_string()));
                    if settings.isolation == FailureIsolation::SharedBoundary {
                        boundary_tripped = true;
                    }
                }
            }
        }

        report.evicted = store.sweep(&healthy);
        report.pending_deliveries = settle_deliveries(deliveries, settings.delivery_timeout).await;

        counter!("livewatch_ticks_total").increment(1);
        gauge!("livewatch_dedup_keys").set(store.len() as f64);

        if report.observed == 0 && report.failed.is_empty() && !healthy.is_empty() {
            tracing::info!("No streams found.");
        }
        tracing::info!(
            tick,
            observed = report.observed,
            new = report.notified.len(),
            duplicates = report.duplicates,
            failed = report.failed.len(),
            skipped = report.skipped.len(),
            pending = report.pending_deliveries,
            known = store.len(),
            "poll tick done"
        );
        report
    }

    /// Tick, sleep, repeat until `shutdown` resolves. A running tick is always
    /// finished; shutdown is observed while sleeping.
    pub async fn run_until<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        tracing::info!(
            term = %self.settings.search_term,
            platforms = ?self.adapters.platforms(),
            interval_secs = self.settings.poll_interval.as_secs(),
            "monitor running"
        );
        loop {
            self.run_tick().await;
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
            }
        }
        let left = settle_deliveries(&mut self.deliveries, self.settings.delivery_timeout).await;
        if left > 0 {
            tracing::warn!(left, "stopping with deliveries still in flight");
            self.deliveries.abort_all();
        }
        tracing::info!(ticks = self.tick, "monitor stopped");
    }
}

/// Normalize and dedup one record. Returns the event if it is new; its key is
/// already in the store when this returns.
fn admit_record(
    platform: Platform,
    record: &RawRecord,
    store: &mut DedupStore,
    report: &mut TickReport,
) -> Option<StreamEvent> {
    let event = match normalize(platform, record) {
        Ok(ev) => ev,
        Err(e) => {
            tracing::error!(platform = %platform, record = ?record, "dropping record: {e}");
            counter!("livewatch_normalization_errors_total", "platform" => platform.as_str())
                .increment(1);
            report.normalization_errors += 1;
            return None;
        }
    };

    if !store.check_and_insert(&event.dedup_key) {
        tracing::debug!(key = %event.dedup_key, "already notified");
        counter!("livewatch_duplicates_total").increment(1);
        report.duplicates += 1;
        return None;
    }

    tracing::info!(
        platform = %platform,
        streamer = %event.streamer_name,
        title = %event.title,
        "new live stream"
    );
    counter!("livewatch_notified_total", "platform" => platform.as_str()).increment(1);
    Some(event)
}

fn spawn_delivery(
    deliveries: &mut JoinSet<()>,
    sink: Arc<dyn NotificationSink>,
    event: StreamEvent,
    timeout: Duration,
) {
    deliveries.spawn(async move {
        match tokio::time::timeout(timeout, sink.notify(&event)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(key = %event.dedup_key, "sink failed; not retrying: {e:#}")
            }
            Err(_) => tracing::warn!(
                key = %event.dedup_key,
                timeout_secs = timeout.as_secs(),
                "sink timed out; not retrying"
            ),
        }
    });
}

/// Reap finished deliveries, waiting up to `limit` for the rest.
/// Returns how many are still running.
async fn settle_deliveries(deliveries: &mut JoinSet<()>, limit: Duration) -> usize {
    let drain = async {
        while let Some(res) = deliveries.join_next().await {
            if let Err(e) = res {
                tracing::warn!("delivery task failed: {e}");
            }
        }
    };
    let _ = tokio::time::timeout(limit, drain).await;
    deliveries.len()
}
