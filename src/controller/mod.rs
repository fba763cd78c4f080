//! Controller module - polling, commands and input handling
//!
//! Organized into submodules by responsibility:
//!
//! - `poll`: the 1 Hz poll scheduler and the poll tick itself
//! - `commands`: fire-and-forget playback commands with optimistic updates
//! - `timers`: auto-hide countdowns for controls and the volume indicator
//! - `input`: key event handling

mod commands;
mod input;
mod poll;
mod timers;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::model::{PlayerScreenState, SnapshotExtractor, SpotifyClient};
use crate::prefs::PrefStore;
use crate::settings::AppSettings;
use poll::PollScheduler;
use timers::TimerManager;

#[derive(Clone)]
pub struct PlayerController {
    pub(crate) state: Arc<Mutex<PlayerScreenState>>,
    pub(crate) client: SpotifyClient,
    pub(crate) settings: AppSettings,
    pub(crate) prefs: Arc<PrefStore>,
    pub(crate) extractor: Arc<Mutex<SnapshotExtractor>>,
    pub(crate) scheduler: Arc<Mutex<PollScheduler>>,
    pub(crate) timers: Arc<Mutex<TimerManager>>,
}

impl PlayerController {
    pub fn new(
        state: Arc<Mutex<PlayerScreenState>>,
        client: SpotifyClient,
        settings: AppSettings,
        prefs: Arc<PrefStore>,
    ) -> Self {
        Self {
            state,
            client,
            settings,
            prefs,
            extractor: Arc::new(Mutex::new(SnapshotExtractor::new())),
            scheduler: Arc::new(Mutex::new(PollScheduler::new())),
            timers: Arc::new(Mutex::new(TimerManager::new())),
        }
    }

    /// Screen became visible. Forces a full refresh on the next poll and
    /// brings the poll loop up, refreshing the token first when needed.
    pub async fn resume(&self) {
        tracing::info!("Screen resumed");
        {
            let mut state = self.state.lock().await;
            state.first_poll = true;
            if state.message.is_none() {
                state.message = Some(crate::model::ScreenMessage::Loading);
            }
        }
        self.show_controls().await;

        if self.client.session().read().await.is_expired() {
            self.reauthorize().await;
        } else {
            self.start_polling().await;
        }
    }

    /// Screen lost visibility. Stops polling and pending auto-hides.
    pub async fn suspend(&self) {
        tracing::info!("Screen suspended");
        self.scheduler.lock().await.stop();
        self.timers.lock().await.cancel_all();
    }

    pub async fn start_polling(&self) {
        let mut scheduler = self.scheduler.lock().await;
        scheduler.start(self.clone());
    }

    /// Make the control row visible and (re)arm its auto-hide countdown.
    pub async fn show_controls(&self) {
        self.state.lock().await.controls_visible = true;
        if !self.settings.hide_controls {
            return;
        }
        let state = self.state.clone();
        self.timers.lock().await.controls.start(
            Duration::from_secs(self.settings.display_time_secs),
            move || async move {
                state.lock().await.controls_visible = false;
            },
        );
    }

    /// Refresh the expiring token, persist the new session and restart the
    /// poll loop. Polling stays down if the refresh fails.
    pub(crate) async fn reauthorize(&self) {
        let session = self.client.session();
        let (refresh_token, client_id) = {
            let current = session.read().await;
            let client_id = self.prefs.get_str("client_id").unwrap_or_default();
            (current.refresh_token.clone(), client_id)
        };

        match crate::auth::refresh_access_token(self.client.http(), &refresh_token, &client_id)
            .await
        {
            Ok(new_session) => {
                if let Err(e) = new_session.store(&self.prefs) {
                    tracing::warn!(error = %e, "Failed to persist refreshed session");
                }
                *session.write().await = new_session;
                self.start_polling().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Token refresh failed");
                let mut state = self.state.lock().await;
                state.push_notice(
                    "Authentication failed. Check the stored refresh token and client id."
                        .to_string(),
                );
            }
        }
    }

    /// Clear the on-disk cache and report how much was freed.
    pub async fn clear_cache(&self) {
        let freed_kb = self.prefs.cache_size_bytes() / 1024;
        let result = self.prefs.clear_cache();
        let mut state = self.state.lock().await;
        match result {
            Ok(()) => state.push_notice(format!("Cleared {freed_kb} KB of cached data")),
            Err(e) => state.push_notice(format!("Error: {e:#}")),
        }
    }

    pub(crate) fn format_error(error: &anyhow::Error) -> String {
        let error_str = error.to_string();

        // Map common Spotify API statuses to actionable messages
        if error_str.contains("404") {
            "No active device found. Start playing on Spotify and try again.".to_string()
        } else if error_str.contains("403") {
            "Action forbidden. Check your Spotify Premium status.".to_string()
        } else if error_str.contains("401") {
            "Authentication expired. Please restart the app.".to_string()
        } else if error_str.contains("429") {
            "Rate limited. Please wait a moment.".to_string()
        } else if error_str.contains("No internet connection") {
            "No internet connection".to_string()
        } else {
            format!("Error: {}", error_str)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_formatting_maps_statuses() {
        let err = anyhow::anyhow!("play request failed: 404 Not Found");
        assert!(PlayerController::format_error(&err).contains("No active device"));

        let err = anyhow::anyhow!("like request failed: 429 Too Many Requests");
        assert!(PlayerController::format_error(&err).contains("Rate limited"));

        let err = anyhow::anyhow!("something odd");
        assert_eq!(
            PlayerController::format_error(&err),
            "Error: something odd"
        );
    }
}
