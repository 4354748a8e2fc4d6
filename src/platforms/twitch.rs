// src/platforms/twitch.rs
//! Twitch Helix adapter.
//!
//! Startup: app access token via client-credentials, then game name → game id.
//! Each poll: `GET /streams?game_id=<id>&first=<page_size>`.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;

use super::{records_from_body, PlatformAdapter};
use crate::config::TwitchConfig;
use crate::error::{InitError, QueryError};
use crate::event::{Platform, RawRecord};

const PLATFORM: Platform = Platform::Twitch;
const MAX_PAGE_SIZE: u32 = 100;

/// App access token plus the client id it was issued to, as ready-made
/// request headers.
#[derive(Clone)]
pub struct TwitchSession {
    client_id: String,
    headers: HeaderMap,
}

impl TwitchSession {
    /// Fails if either value cannot be sent as an HTTP header.
    pub fn new(client_id: &str, access_token: &str) -> Result<Self, InitError> {
        let invalid = |what: &str| InitError::Auth {
            platform: PLATFORM,
            reason: format!("{what} is not a valid header value"),
        };
        let id = HeaderValue::from_str(client_id).map_err(|_| invalid("client id"))?;
        let mut bearer = HeaderValue::from_str(&format!("Bearer {access_token}"))
            .map_err(|_| invalid("access token"))?;
        bearer.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert("client-id", id);
        headers.insert(AUTHORIZATION, bearer);
        Ok(Self {
            client_id: client_id.to_string(),
            headers,
        })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }
}

impl std::fmt::Debug for TwitchSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwitchSession")
            .field("client_id", &self.client_id)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Client-credentials token exchange against `<auth_base>/token`.
pub async fn acquire_session(
    client: &Client,
    auth_base: &str,
    client_id: &str,
    client_secret: &str,
) -> Result<TwitchSession, InitError> {
    let url = format!("{}/token", auth_base.trim_end_matches('/'));
    let resp = client
        .post(&url)
        .query(&[
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("grant_type", "client_credentials"),
        ])
        .send()
        .await
        .map_err(|e| InitError::Http {
            platform: PLATFORM,
            source: e.without_url(),
        })?;

    let status = resp.status();
    if !status.is_success() {
        return Err(InitError::Auth {
            platform: PLATFORM,
            reason: format!("token endpoint returned HTTP {}", status.as_u16()),
        });
    }

    let token: TokenResponse = resp.json().await.map_err(|e| InitError::Auth {
        platform: PLATFORM,
        reason: format!("unreadable token response: {e}"),
    })?;

    TwitchSession::new(client_id, &token.access_token)
}

pub struct TwitchAdapter {
    client: Client,
    api_base: String,
    session: TwitchSession,
    page_size: u32,
    // lowercased search term -> game id
    categories: HashMap<String, String>,
}

impl TwitchAdapter {
    pub fn new(client: Client, api_base: &str, session: TwitchSession, page_size: u32) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            session,
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
            categories: HashMap::new(),
        }
    }

    /// Acquire a session and resolve `search_term`; both are fatal on failure.
    pub async fn connect(
        client: Client,
        cfg: &TwitchConfig,
        search_term: &str,
    ) -> Result<Self, InitError> {
        let session =
            acquire_session(&client, &cfg.auth_base, &cfg.client_id, &cfg.client_secret).await?;
        let mut adapter = Self::new(client, &cfg.api_base, session, cfg.page_size);
        let game_id = adapter.resolve_category(search_term).await?;
        tracing::info!(term = search_term, game_id = %game_id, "twitch category resolved");
        Ok(adapter)
    }

    /// Look up the game id for `name` once and remember it.
    pub async fn resolve_category(&mut self, name: &str) -> Result<String, InitError> {
        let resp = self
            .client
            .get(format!("{}/games", self.api_base))
            .headers(self.session.headers.clone())
            .query(&[("name", name)])
            .send()
            .await
            .map_err(|e| InitError::Http {
                platform: PLATFORM,
                source: e,
            })?;

        match resp.status() {
            s if s.is_success() => {}
            s if s == StatusCode::UNAUTHORIZED || s == StatusCode::FORBIDDEN => {
                return Err(InitError::Auth {
                    platform: PLATFORM,
                    reason: format!("games lookup rejected with HTTP {}", s.as_u16()),
                })
            }
            s => {
                return Err(InitError::Resolve {
                    platform: PLATFORM,
                    term: name.to_string(),
                    reason: format!("games lookup returned HTTP {}", s.as_u16()),
                })
            }
        }

        let body: serde_json::Value = resp.json().await.map_err(|e| InitError::Resolve {
            platform: PLATFORM,
            term: name.to_string(),
            reason: format!("unreadable games response: {e}"),
        })?;

        let id = body
            .get("data")
            .and_then(|d| d.as_array())
            .and_then(|d| d.first())
            .and_then(|g| g.get("id"))
            .and_then(|id| id.as_str())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| InitError::Resolve {
                platform: PLATFORM,
                term: name.to_string(),
                reason: "no such game".to_string(),
            })?
            .to_string();

        self.categories.insert(category_key(name), id.clone());
        Ok(id)
    }

    pub fn category_id(&self, search_term: &str) -> Option<&str> {
        self.categories
            .get(&category_key(search_term))
            .map(String::as_str)
    }
}

fn category_key(term: &str) -> String {
    term.trim().to_lowercase()
}

#[async_trait]
impl PlatformAdapter for TwitchAdapter {
    fn platform(&self) -> Platform {
        PLATFORM
    }

    async fn list_live_streams(&self, search_term: &str) -> Result<Vec<RawRecord>, QueryError> {
        let game_id = self
            .category_id(search_term)
            .ok_or_else(|| QueryError::UnresolvedTerm {
                platform: PLATFORM,
                term: search_term.to_string(),
            })?;

        let first = self.page_size.to_string();
        let resp = self
            .client
            .get(format!("{}/streams", self.api_base))
            .headers(self.session.headers.clone())
            .query(&[("game_id", game_id), ("first", first.as_str())])
            .send()
            .await
            .map_err(|e| QueryError::Http {
                platform: PLATFORM,
                source: e,
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(QueryError::Status {
                platform: PLATFORM,
                status: status.as_u16(),
            });
        }

        let body: serde_json::Value = resp.json().await.map_err(|e| QueryError::Decode {
            platform: PLATFORM,
            reason: e.to_string(),
        })?;
        records_from_body(PLATFORM, &body, "data")
    }
}
