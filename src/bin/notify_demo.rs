//! Sends one sample broadcast through the configured sinks, to check
//! desktop/webhook setup without waiting for a real stream.

use livewatch::{DedupKey, NotificationSink, NotifierMux, Platform, StreamEvent, WatchConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_target(false).init();

    let notify_cfg = WatchConfig::load_default()
        .map(|c| c.notify)
        .unwrap_or_default();
    let mux = NotifierMux::from_config(&notify_cfg);

    let ev = StreamEvent {
        platform: Platform::Twitch,
        stream_id: "0".into(),
        streamer_name: "livewatch".into(),
        title: "Test notification".into(),
        dedup_key: DedupKey::scoped(Platform::Twitch, "livewatch", "0"),
        url: "https://www.twitch.tv/".into(),
        started_at: Some(chrono::Utc::now()),
        viewer_count: None,
    };
    mux.notify(&ev).await?;

    println!("notify-demo done ({} sinks)", mux.len());
    Ok(())
}
