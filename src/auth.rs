use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing;

use crate::prefs::PrefStore;

const TOKEN_ENDPOINT: &str = "https://accounts.spotify.com/api/token";

/// Access token considered expired this long before the recorded deadline,
/// so a token never dies mid-poll.
const EXPIRY_MARGIN_MINUTES: i64 = 5;

/// Tokens obtained out of band (the authorization-code dance happens in a
/// browser, not here) and kept fresh by [`refresh_access_token`].
#[derive(Clone, Debug)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl AuthSession {
    pub fn is_expired(&self) -> bool {
        Utc::now() + Duration::minutes(EXPIRY_MARGIN_MINUTES) > self.expires_at
    }

    /// Load the stored session. Missing tokens mean the user never completed
    /// the initial authorization.
    pub fn load(prefs: &PrefStore) -> Result<Self> {
        let access_token = prefs.get_str("access_token").unwrap_or_default();
        let refresh_token = prefs.get_str("refresh_token").unwrap_or_default();
        if access_token.is_empty() || refresh_token.is_empty() {
            bail!(
                "No stored Spotify session. Put access_token, refresh_token and \
                 client_id into {}",
                prefs.path().display()
            );
        }
        let expires_at = prefs
            .get_i64("expiration_time")
            .and_then(|ms| DateTime::<Utc>::from_timestamp_millis(ms))
            .unwrap_or_else(Utc::now);
        Ok(Self { access_token, refresh_token, expires_at })
    }

    pub fn store(&self, prefs: &PrefStore) -> Result<()> {
        prefs.set("access_token", Value::from(self.access_token.clone()))?;
        prefs.set("refresh_token", Value::from(self.refresh_token.clone()))?;
        prefs.set(
            "expiration_time",
            Value::from(self.expires_at.timestamp_millis()),
        )?;
        Ok(())
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    refresh_token: Option<String>,
}

/// Exchange the refresh token for a fresh access token. The response may
/// rotate the refresh token; when it does not, the old one stays valid.
pub async fn refresh_access_token(
    http: &reqwest::Client,
    refresh_token: &str,
    client_id: &str,
) -> Result<AuthSession> {
    tracing::info!("Refreshing access token");

    let response = http
        .post(TOKEN_ENDPOINT)
        .form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", client_id),
        ])
        .send()
        .await
        .context("Failed to reach the token endpoint")?;

    let status = response.status();
    if !status.is_success() {
        bail!("Token refresh rejected: {status}");
    }

    let token: TokenResponse = response
        .json()
        .await
        .context("Malformed token response")?;

    let session = AuthSession {
        access_token: token.access_token,
        refresh_token: token
            .refresh_token
            .unwrap_or_else(|| refresh_token.to_owned()),
        expires_at: Utc::now() + Duration::seconds(token.expires_in),
    };
    tracing::info!(expires_at = %session.expires_at, "Token refreshed successfully");
    Ok(session)
}
