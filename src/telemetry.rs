// src/telemetry.rs
//! Logging and metrics setup.

use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;
use std::net::SocketAddr;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const ENV_LOG_JSON: &str = "LIVEWATCH_LOG_JSON";

/// Install the global tracing subscriber.
/// Filter comes from `RUST_LOG`, defaulting to `livewatch=info,warn`;
/// `LIVEWATCH_LOG_JSON=1` switches to JSON lines.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("livewatch=info,warn"));
    let json = std::env::var(ENV_LOG_JSON).is_ok_and(|v| v == "1");

    let registry = tracing_subscriber::registry().with(filter);
    let res = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

/// One-time metrics registration (so series show up on the scrape endpoint).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("livewatch_ticks_total", "Completed poll ticks.");
        describe_counter!(
            "livewatch_platform_errors_total",
            "Platform queries that failed during a tick."
        );
        describe_counter!(
            "livewatch_streams_seen_total",
            "Live broadcasts reported by platforms, duplicates included."
        );
        describe_counter!(
            "livewatch_notified_total",
            "Broadcasts surfaced to the user for the first time."
        );
        describe_counter!(
            "livewatch_duplicates_total",
            "Broadcasts skipped because they were already notified."
        );
        describe_counter!(
            "livewatch_normalization_errors_total",
            "Raw records dropped because required fields were missing."
        );
        describe_counter!("livewatch_sink_errors_total", "Failed sink deliveries.");
        describe_gauge!("livewatch_dedup_keys", "Broadcast keys currently remembered.");
    });
}

/// Serve Prometheus metrics on `addr`. Must be called inside a tokio runtime.
pub fn install_exporter(addr: SocketAddr) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("prometheus exporter on {addr}: {e}"))?;
    ensure_metrics_described();
    tracing::info!(%addr, "metrics exporter listening");
    Ok(())
}
