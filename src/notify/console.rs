// src/notify/console.rs
use anyhow::Result;
use async_trait::async_trait;
use std::io::Write;
use std::sync::{Arc, Mutex};

use super::NotificationSink;
use crate::event::StreamEvent;

/// Prints a banner per new broadcast.
pub struct ConsoleSink {
    out: Arc<Mutex<dyn Write + Send>>,
}

impl ConsoleSink {
    pub fn stdout() -> Self {
        Self {
            out: Arc::new(Mutex::new(std::io::stdout())),
        }
    }

    /// Write into any shared writer (tests capture into a `Vec<u8>`).
    pub fn with_writer(out: Arc<Mutex<dyn Write + Send>>) -> Self {
        Self { out }
    }
}

pub fn banner(event: &StreamEvent) -> String {
    format!(
        "\n===============\nStreamer: {}\nTitle: {}\nPlatform: {}\nWatch: {}\n===============",
        event.streamer_name, event.title, event.platform, event.url
    )
}

#[async_trait]
impl NotificationSink for ConsoleSink {
    async fn notify(&self, event: &StreamEvent) -> Result<()> {
        let text = banner(event);
        let mut out = self
            .out
            .lock()
            .map_err(|_| anyhow::anyhow!("console writer poisoned"))?;
        writeln!(out, "{text}")?;
        out.flush()?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "console"
    }
}
