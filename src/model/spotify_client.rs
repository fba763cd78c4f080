//! Raw Spotify Web API access
//!
//! Player-state responses are returned as raw body strings; the extractor
//! deals with the partial and error shapes the player endpoint produces.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde_json::json;
use tokio::sync::RwLock;

use crate::auth::AuthSession;

const API_BASE: &str = "https://api.spotify.com/v1";
const PROBE_ADDR: &str = "api.spotify.com:443";
const PROBE_TIMEOUT: Duration = Duration::from_millis(1500);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Why a poll fetch produced no payload.
#[derive(Debug)]
pub enum FetchError {
    /// Connectivity probe failed before the request was attempted.
    Offline,
    /// The request itself failed.
    Transport(reqwest::Error),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Offline => write!(f, "no internet connection"),
            FetchError::Transport(err) => write!(f, "request failed: {err}"),
        }
    }
}

impl std::error::Error for FetchError {}

/// Cheap reachability check, consulted before every request.
#[derive(Clone, Copy, Debug, Default)]
pub struct Connectivity;

impl Connectivity {
    pub async fn is_online(&self) -> bool {
        matches!(
            tokio::time::timeout(PROBE_TIMEOUT, tokio::net::TcpStream::connect(PROBE_ADDR)).await,
            Ok(Ok(_))
        )
    }
}

/// The read side of the poll cycle. Split out so the tick can be driven by
/// canned payloads in tests.
pub trait PlayerStateSource {
    /// Raw body of the player-state endpoint. An empty body means no active
    /// playback session.
    fn player_state(&self) -> impl std::future::Future<Output = Result<String, FetchError>> + Send;

    /// Raw body of the saved-tracks check for one track id.
    fn like_status(
        &self,
        track_id: &str,
    ) -> impl std::future::Future<Output = Result<String, FetchError>> + Send;

    /// Raw body of an artist lookup by full API href.
    fn artist(
        &self,
        href: &str,
    ) -> impl std::future::Future<Output = Result<String, FetchError>> + Send;
}

/// Spotify API client carrying the shared auth session.
#[derive(Clone)]
pub struct SpotifyClient {
    http: reqwest::Client,
    session: Arc<RwLock<AuthSession>>,
    probe: Connectivity,
}

impl SpotifyClient {
    pub fn new(session: Arc<RwLock<AuthSession>>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { http, session, probe: Connectivity })
    }

    pub fn session(&self) -> Arc<RwLock<AuthSession>> {
        self.session.clone()
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    async fn bearer(&self) -> String {
        self.session.read().await.access_token.clone()
    }

    async fn get_body(&self, url: &str) -> Result<String, FetchError> {
        if !self.probe.is_online().await {
            return Err(FetchError::Offline);
        }
        let response = self
            .http
            .get(url)
            .bearer_auth(self.bearer().await)
            .send()
            .await
            .map_err(FetchError::Transport)?;
        response.text().await.map_err(FetchError::Transport)
    }

    /// Send a state-changing request. Non-success statuses become errors
    /// carrying the status text so the controller can map them to messages.
    async fn send_command(&self, request: reqwest::RequestBuilder, what: &str) -> Result<()> {
        if !self.probe.is_online().await {
            bail!("No internet connection");
        }
        let response = request
            .bearer_auth(self.bearer().await)
            .send()
            .await
            .with_context(|| format!("Failed to send {what} request"))?;
        let status = response.status();
        if !status.is_success() {
            bail!("{what} request failed: {status}");
        }
        Ok(())
    }

    pub async fn set_playing(&self, playing: bool) -> Result<()> {
        let endpoint = if playing { "play" } else { "pause" };
        tracing::debug!(playing, "API: set playback");
        self.send_command(self.http.put(format!("{API_BASE}/me/player/{endpoint}")), endpoint)
            .await
    }

    pub async fn skip(&self, forward: bool) -> Result<()> {
        let endpoint = if forward { "next" } else { "previous" };
        tracing::debug!(forward, "API: skip");
        self.send_command(self.http.post(format!("{API_BASE}/me/player/{endpoint}")), endpoint)
            .await
    }

    pub async fn set_shuffle(&self, shuffle: bool) -> Result<()> {
        tracing::debug!(shuffle, "API: set shuffle");
        self.send_command(
            self.http
                .put(format!("{API_BASE}/me/player/shuffle"))
                .query(&[("state", shuffle)]),
            "shuffle",
        )
        .await
    }

    pub async fn set_liked(&self, track_id: &str, liked: bool) -> Result<()> {
        tracing::debug!(track_id, liked, "API: set like");
        let url = format!("{API_BASE}/me/tracks");
        let body = json!({ "ids": [track_id] });
        let request = if liked {
            self.http.put(url).json(&body)
        } else {
            self.http.delete(url).json(&body)
        };
        self.send_command(request, "like").await
    }

    pub async fn seek(&self, position_ms: u64) -> Result<()> {
        tracing::debug!(position_ms, "API: seek");
        self.send_command(
            self.http
                .put(format!("{API_BASE}/me/player/seek"))
                .query(&[("position_ms", position_ms)]),
            "seek",
        )
        .await
    }

    pub async fn set_volume(&self, percent: u8) -> Result<()> {
        tracing::debug!(percent, "API: set volume");
        self.send_command(
            self.http
                .put(format!("{API_BASE}/me/player/volume"))
                .query(&[("volume_percent", u32::from(percent))]),
            "volume",
        )
        .await
    }
}

impl PlayerStateSource for SpotifyClient {
    async fn player_state(&self) -> Result<String, FetchError> {
        self.get_body(&format!("{API_BASE}/me/player")).await
    }

    async fn like_status(&self, track_id: &str) -> Result<String, FetchError> {
        self.get_body(&format!("{API_BASE}/me/tracks/contains?ids={track_id}"))
            .await
    }

    async fn artist(&self, href: &str) -> Result<String, FetchError> {
        self.get_body(href).await
    }
}
