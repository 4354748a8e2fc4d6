//! livewatch binary entrypoint.
//! Loads config, authenticates against every enabled platform, then polls
//! until Ctrl-C, alerting once per newly started broadcast.

use anyhow::Context;
use std::process::ExitCode;
use std::sync::Arc;

use livewatch::{platforms, telemetry, Monitor, NotifierMux, WatchConfig};

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env in local/dev so credentials can stay out of the config file.
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("Failed to initialize: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let cfg = WatchConfig::load_default()?;

    if let Some(addr) = cfg.metrics_addr {
        telemetry::install_exporter(addr)?;
    }

    let mux = NotifierMux::from_config(&cfg.notify);
    if mux.is_empty() {
        tracing::warn!("no notification sinks enabled; new streams will only be logged");
    } else {
        tracing::info!(sinks = ?mux.sink_names(), "notification sinks ready");
    }

    let client = platforms::http_client().context("building HTTP client")?;
    let mut monitor = Monitor::initialize(&cfg, &client, Arc::new(mux)).await?;

    println!("Monitoring streams for game: {}...", cfg.search_term);
    monitor.run_until(shutdown_signal()).await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        // Without a signal handler the process runs until killed.
        tracing::warn!("ctrl-c handler unavailable: {e}");
        std::future::pending::<()>().await;
    }
}
