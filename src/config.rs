// src/config.rs
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::dedup::Retention;
use crate::error::InitError;
use crate::event::Platform;
use crate::scheduler::{BackoffPolicy, FailureIsolation};

pub const ENV_CONFIG_PATH: &str = "LIVEWATCH_CONFIG";
pub const ENV_SEARCH_TERM: &str = "LIVEWATCH_SEARCH_TERM";
pub const ENV_POLL_INTERVAL: &str = "LIVEWATCH_POLL_INTERVAL_SECS";

const FALLBACK_PATHS: [&str; 2] = ["config/livewatch.toml", "livewatch.toml"];

fn default_poll_interval_secs() -> u64 {
    60
}
fn default_platforms() -> Vec<Platform> {
    vec![Platform::Twitch]
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct WatchConfig {
    /// Game / category name to watch for.
    #[serde(default)]
    pub search_term: String,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Enabled platforms; duplicates are ignored.
    #[serde(default = "default_platforms")]
    pub platforms: Vec<Platform>,
    #[serde(default)]
    pub twitch: TwitchConfig,
    #[serde(default)]
    pub youtube: YouTubeConfig,
    #[serde(default)]
    pub dedup: Retention,
    #[serde(default)]
    pub isolation: FailureIsolation,
    #[serde(default)]
    pub backoff: Option<BackoffPolicy>,
    #[serde(default)]
    pub notify: NotifyConfig,
    /// Serve Prometheus metrics on this address when set.
    #[serde(default)]
    pub metrics_addr: Option<SocketAddr>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TwitchConfig {
    /// "ENV" means: read from TWITCH_CLIENT_ID
    #[serde(default)]
    pub client_id: String,
    /// "ENV" means: read from TWITCH_CLIENT_SECRET
    #[serde(default)]
    pub client_secret: String,
    #[serde(default = "TwitchConfig::default_api_base")]
    pub api_base: String,
    #[serde(default = "TwitchConfig::default_auth_base")]
    pub auth_base: String,
    #[serde(default = "TwitchConfig::default_page_size")]
    pub page_size: u32,
}

impl TwitchConfig {
    fn default_api_base() -> String {
        "https://api.twitch.tv/helix".to_string()
    }
    fn default_auth_base() -> String {
        "https://id.twitch.tv/oauth2".to_string()
    }
    fn default_page_size() -> u32 {
        100
    }
}

impl Default for TwitchConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            api_base: Self::default_api_base(),
            auth_base: Self::default_auth_base(),
            page_size: Self::default_page_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct YouTubeConfig {
    /// "ENV" means: read from YOUTUBE_API_KEY
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "YouTubeConfig::default_api_base")]
    pub api_base: String,
    #[serde(default = "YouTubeConfig::default_max_results")]
    pub max_results: u32,
}

impl YouTubeConfig {
    fn default_api_base() -> String {
        "https://www.googleapis.com/youtube/v3".to_string()
    }
    fn default_max_results() -> u32 {
        50
    }
}

impl Default for YouTubeConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: Self::default_api_base(),
            max_results: Self::default_max_results(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotifyConfig {
    #[serde(default = "default_true")]
    pub console: bool,
    #[serde(default = "default_true")]
    pub desktop: bool,
    #[serde(default)]
    pub discord_webhook: Option<String>,
    #[serde(default)]
    pub slack_webhook: Option<String>,
    #[serde(default = "NotifyConfig::default_timeout_secs")]
    pub webhook_timeout_secs: u64,
    #[serde(default = "NotifyConfig::default_retries")]
    pub webhook_retries: u8,
    /// Cap on one delivery across all sinks, retries included.
    #[serde(default = "NotifyConfig::default_delivery_timeout_secs")]
    pub delivery_timeout_secs: u64,
}

impl NotifyConfig {
    fn default_timeout_secs() -> u64 {
        5
    }
    fn default_retries() -> u8 {
        3
    }
    fn default_delivery_timeout_secs() -> u64 {
        30
    }

    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_secs(self.delivery_timeout_secs)
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            console: true,
            desktop: true,
            discord_webhook: None,
            slack_webhook: None,
            webhook_timeout_secs: Self::default_timeout_secs(),
            webhook_retries: Self::default_retries(),
            delivery_timeout_secs: Self::default_delivery_timeout_secs(),
        }
    }
}

impl WatchConfig {
    /// Parse TOML and apply env overrides / `"ENV"` indirection.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: WatchConfig = toml::from_str(s).context("parsing livewatch config")?;
        cfg.apply_env()?;
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Load using env var + fallbacks:
    /// 1) $LIVEWATCH_CONFIG
    /// 2) config/livewatch.toml
    /// 3) livewatch.toml
    ///
    /// With no file at all, the config is built from env vars alone.
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            return Self::load_from(&pb);
        }
        for candidate in FALLBACK_PATHS {
            let pb = PathBuf::from(candidate);
            if pb.exists() {
                return Self::load_from(&pb);
            }
        }
        Self::from_toml_str("")
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(term) = std::env::var(ENV_SEARCH_TERM) {
            if !term.trim().is_empty() {
                self.search_term = term;
            }
        }
        if let Ok(v) = std::env::var(ENV_POLL_INTERVAL) {
            self.poll_interval_secs = v
                .trim()
                .parse()
                .with_context(|| format!("{ENV_POLL_INTERVAL} must be an integer, got '{v}'"))?;
        }
        self.search_term = self.search_term.trim().to_string();

        resolve_secret(&mut self.twitch.client_id, "TWITCH_CLIENT_ID");
        resolve_secret(&mut self.twitch.client_secret, "TWITCH_CLIENT_SECRET");
        resolve_secret(&mut self.youtube.api_key, "YOUTUBE_API_KEY");

        let mut seen = Vec::with_capacity(self.platforms.len());
        self.platforms.retain(|p| {
            let fresh = !seen.contains(p);
            seen.push(*p);
            fresh
        });
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn is_enabled(&self, platform: Platform) -> bool {
        self.platforms.contains(&platform)
    }

    /// Reject configs the monitor cannot start with.
    pub fn validate(&self) -> Result<(), InitError> {
        if self.search_term.is_empty() {
            return Err(InitError::Config("search_term is empty".into()));
        }
        if self.poll_interval_secs == 0 {
            return Err(InitError::Config(
                "poll_interval_secs must be at least 1".into(),
            ));
        }
        if self.platforms.is_empty() {
            return Err(InitError::Config("no platforms enabled".into()));
        }
        if self.is_enabled(Platform::Twitch)
            && (self.twitch.client_id.is_empty() || self.twitch.client_secret.is_empty())
        {
            return Err(InitError::Config(
                "twitch enabled but client_id/client_secret missing".into(),
            ));
        }
        if self.is_enabled(Platform::YouTube) && self.youtube.api_key.is_empty() {
            return Err(InitError::Config(
                "youtube enabled but api_key missing".into(),
            ));
        }
        if let Retention::GracePeriod { ticks: 0 } = self.dedup {
            return Err(InitError::Config(
                "dedup grace period must be at least 1 tick".into(),
            ));
        }
        if self.notify.delivery_timeout_secs == 0 {
            return Err(InitError::Config(
                "notify.delivery_timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// `"ENV"` (or an empty value) is replaced by the named env var when it is set.
fn resolve_secret(slot: &mut String, env_key: &str) {
    let wants_env = slot.trim().is_empty() || slot.trim().eq_ignore_ascii_case("env");
    if !wants_env {
        return;
    }
    *slot = std::env::var(env_key)
        .map(|v| v.trim().to_string())
        .unwrap_or_default();
}
