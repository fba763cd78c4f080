//! The 1 Hz poll loop keeping the screen in sync with remote playback

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::model::{
    parse_api_error, parse_like_status, reconcile, ArtistImageUpdate, FetchError, LikeStatus,
    PlayerScreenState, PlayerStateSource, ScreenMessage, SnapshotExtractor,
};

use super::PlayerController;

const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Owns the background task driving the poll ticks. Ticks are awaited inside
/// one task, so they can never overlap; `stop` aborts between ticks.
#[derive(Debug, Default)]
pub struct PollScheduler {
    handle: Option<JoinHandle<()>>,
}

impl PollScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Bring the loop up. A no-op while already active. The first tick fires
    /// one interval after start.
    pub fn start(&mut self, ctrl: PlayerController) {
        if self.is_active() {
            return;
        }
        tracing::debug!("Poll loop starting");
        self.handle = Some(tokio::spawn(run_loop(ctrl)));
    }

    /// Take the loop down. Idempotent.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            tracing::debug!("Poll loop stopped");
        }
    }
}

async fn run_loop(ctrl: PlayerController) {
    let mut interval = interval_at(Instant::now() + POLL_INTERVAL, POLL_INTERVAL);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;

        // Expiring token suspends polling until the refresh brings it back up
        if ctrl.client.session().read().await.is_expired() {
            tracing::info!("Access token expiring, suspending poll loop for refresh");
            let ctrl = ctrl.clone();
            tokio::spawn(async move { ctrl.reauthorize().await });
            return;
        }

        if ctrl.poll_tick().await {
            tracing::info!("Token rejected by the API, suspending poll loop for refresh");
            let ctrl = ctrl.clone();
            tokio::spawn(async move { ctrl.reauthorize().await });
            return;
        }
    }
}

/// What one poll cycle did, as seen by the scheduler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CycleStatus {
    Ran { first_refresh: bool },
    /// The API rejected the token; stop polling and refresh it.
    AuthFailure,
}

impl PlayerController {
    /// Returns true when the token was rejected and polling must stop.
    pub(crate) async fn poll_tick(&self) -> bool {
        match poll_cycle(&self.client, &self.extractor, &self.state).await {
            CycleStatus::AuthFailure => true,
            CycleStatus::Ran { first_refresh } => {
                if first_refresh {
                    self.show_controls().await;
                }
                false
            }
        }
    }
}

/// One poll cycle: fetch, extract, reconcile, then run the follow-up
/// like-status and artist lookups.
pub(crate) async fn poll_cycle<S: PlayerStateSource>(
    source: &S,
    extractor: &Mutex<SnapshotExtractor>,
    state: &Mutex<PlayerScreenState>,
) -> CycleStatus {
    let body = match source.player_state().await {
        Ok(body) => body,
        Err(FetchError::Offline) => {
            state.lock().await.set_offline();
            return CycleStatus::Ran { first_refresh: false };
        }
        Err(FetchError::Transport(err)) => {
            // The probe passed but the request still died; treat it like a
            // connectivity drop and try again next tick
            tracing::warn!(error = %err, "Player state fetch failed");
            state.lock().await.set_offline();
            return CycleStatus::Ran { first_refresh: false };
        }
    };

    // A rejected request comes back with an error-object body that also has
    // no `item`; it must never read as "nothing playing"
    if let Some(err) = parse_api_error(&body) {
        let mut st = state.lock().await;
        st.set_online();
        if err.is_auth_failure() {
            tracing::info!(message = %err.message, "Player state rejected, token no longer valid");
            return CycleStatus::AuthFailure;
        }
        tracing::warn!(status = err.status, message = %err.message, "Player state error body");
        st.push_notice(if err.message.is_empty() {
            "Error fetching player state".to_string()
        } else {
            format!("Error fetching player state: {}", err.message)
        });
        return CycleStatus::Ran { first_refresh: false };
    }

    if !SnapshotExtractor::has_active_item(&body) {
        let mut st = state.lock().await;
        st.set_online();
        st.set_no_track();
        return CycleStatus::Ran { first_refresh: false };
    }

    let snap = extractor.lock().await.extract(&body);
    if snap.is_empty() {
        return CycleStatus::Ran { first_refresh: false };
    }

    let outcome = {
        let mut st = state.lock().await;
        st.set_online();
        st.clear_no_track();
        let outcome = reconcile(&mut st, &snap);
        if outcome.first_refresh
            && matches!(
                st.message,
                Some(ScreenMessage::Initializing) | Some(ScreenMessage::Loading)
            )
        {
            st.message = None;
        }
        st.expire_old_notice();
        outcome
    };

    let like_fut = async {
        match &outcome.like_query {
            Some(track_id) => Some(source.like_status(track_id).await),
            None => None,
        }
    };
    let artist_fut = async {
        match &outcome.artist_lookup {
            Some(href) => Some(source.artist(href).await),
            None => None,
        }
    };
    let (like_result, artist_result) = futures::join!(like_fut, artist_fut);

    match like_result {
        Some(Ok(body)) => apply_like_status(state, &body).await,
        Some(Err(err)) => tracing::debug!(error = %err, "Like status fetch failed"),
        None => {}
    }
    match artist_result {
        Some(Ok(body)) => {
            let update = extractor.lock().await.extract_artist_image(&body);
            apply_artist_image(state, update).await;
        }
        Some(Err(err)) => tracing::debug!(error = %err, "Artist lookup failed"),
        None => {}
    }

    CycleStatus::Ran { first_refresh: outcome.first_refresh }
}

async fn apply_like_status(state: &Mutex<PlayerScreenState>, body: &str) {
    match parse_like_status(body) {
        LikeStatus::Liked(liked) => {
            let mut st = state.lock().await;
            if st.is_liked != liked {
                st.is_liked = liked;
            }
        }
        LikeStatus::RateLimited => {
            state.lock().await.push_notice(
                "Too many like requests, please use only one device at a time with the same \
                 client ID"
                    .to_string(),
            );
        }
        LikeStatus::ApiError(message) => {
            state
                .lock()
                .await
                .push_notice(format!("Error in like request: {message}"));
        }
        LikeStatus::Malformed => {
            state
                .lock()
                .await
                .push_notice("Error processing like response".to_string());
        }
        LikeStatus::Unparseable => {}
    }
}

async fn apply_artist_image(state: &Mutex<PlayerScreenState>, update: ArtistImageUpdate) {
    match update {
        ArtistImageUpdate::Apply(url) => {
            state.lock().await.artist_image_url = url;
        }
        ArtistImageUpdate::ApiError(message) => {
            state
                .lock()
                .await
                .push_notice(format!("Error fetching artist image: {message}"));
        }
        ArtistImageUpdate::Unchanged | ArtistImageUpdate::Ignored => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    use serde_json::json;

    /// Feeds scripted responses to the poll cycle and counts the follow-up
    /// lookups it launches.
    #[derive(Default)]
    struct ScriptedSource {
        player: StdMutex<VecDeque<Result<String, FetchError>>>,
        like: StdMutex<VecDeque<String>>,
        artist: StdMutex<VecDeque<String>>,
        like_calls: AtomicUsize,
        artist_calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn push_player(&self, response: Result<String, FetchError>) {
            self.player.lock().unwrap().push_back(response);
        }

        fn push_like(&self, body: &str) {
            self.like.lock().unwrap().push_back(body.to_string());
        }

        fn push_artist(&self, body: &str) {
            self.artist.lock().unwrap().push_back(body.to_string());
        }
    }

    impl PlayerStateSource for ScriptedSource {
        async fn player_state(&self) -> Result<String, FetchError> {
            self.player
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(String::new()))
        }

        async fn like_status(&self, _track_id: &str) -> Result<String, FetchError> {
            self.like_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .like
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| "[false]".to_string()))
        }

        async fn artist(&self, _href: &str) -> Result<String, FetchError> {
            self.artist_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .artist
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| "{}".to_string()))
        }
    }

    fn player_payload(track_id: &str, playing: bool, progress: u64) -> String {
        json!({
            "is_playing": playing,
            "shuffle_state": false,
            "progress_ms": progress,
            "device": { "name": "Desk", "volume_percent": 40, "supports_volume": true },
            "actions": { "disallows": { "toggling_shuffle": false } },
            "item": {
                "id": track_id,
                "name": "Song",
                "duration_ms": 180_000,
                "artists": [ { "name": "A", "href": "https://api.spotify.com/v1/artists/a" } ],
                "album": { "images": [ { "url": format!("img-{track_id}") } ] }
            }
        })
        .to_string()
    }

    fn harness() -> (ScriptedSource, Mutex<SnapshotExtractor>, Mutex<PlayerScreenState>) {
        (
            ScriptedSource::default(),
            Mutex::new(SnapshotExtractor::new()),
            Mutex::new(PlayerScreenState::new()),
        )
    }

    #[tokio::test]
    async fn first_cycle_populates_everything() {
        let (source, extractor, state) = harness();
        source.push_player(Ok(player_payload("t1", true, 42_000)));
        source.push_like("[true]");
        source.push_artist(&json!({ "images": [ { "url": "artist-img" } ] }).to_string());

        let status = poll_cycle(&source, &extractor, &state).await;
        assert_eq!(status, CycleStatus::Ran { first_refresh: true });

        let st = state.lock().await;
        assert_eq!(st.track_id, "t1");
        assert_eq!(st.title, "Song");
        assert_eq!(st.progress_ms, 42_000);
        assert!(st.is_playing);
        assert!(st.is_liked);
        assert_eq!(st.artist_image_url.as_deref(), Some("artist-img"));
        assert_eq!(st.message, None);
        assert_eq!(source.like_calls.load(Ordering::SeqCst), 1);
        assert_eq!(source.artist_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn same_track_skips_artist_lookup_but_not_like() {
        let (source, extractor, state) = harness();
        source.push_player(Ok(player_payload("t1", true, 1000)));
        source.push_player(Ok(player_payload("t1", true, 2000)));
        poll_cycle(&source, &extractor, &state).await;
        poll_cycle(&source, &extractor, &state).await;

        assert_eq!(source.artist_calls.load(Ordering::SeqCst), 1);
        assert_eq!(source.like_calls.load(Ordering::SeqCst), 2);
        assert_eq!(state.lock().await.progress_ms, 2000);
    }

    #[tokio::test]
    async fn pending_like_skips_exactly_one_status_fetch() {
        let (source, extractor, state) = harness();
        for progress in [1000, 2000, 3000] {
            source.push_player(Ok(player_payload("t1", true, progress)));
        }
        poll_cycle(&source, &extractor, &state).await;
        assert_eq!(source.like_calls.load(Ordering::SeqCst), 1);

        state.lock().await.like_sync.mark_pending();
        poll_cycle(&source, &extractor, &state).await;
        assert_eq!(source.like_calls.load(Ordering::SeqCst), 1);

        poll_cycle(&source, &extractor, &state).await;
        assert_eq!(source.like_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn offline_message_appears_once_over_repeated_failures() {
        let (source, extractor, state) = harness();
        for _ in 0..3 {
            source.push_player(Err(FetchError::Offline));
        }
        state.lock().await.message = None;

        poll_cycle(&source, &extractor, &state).await;
        assert_eq!(state.lock().await.message, Some(ScreenMessage::NoInternet));

        // User-visible message stays put; no re-trigger on later failures
        state.lock().await.message = None;
        poll_cycle(&source, &extractor, &state).await;
        poll_cycle(&source, &extractor, &state).await;
        assert_eq!(state.lock().await.message, None);

        // Recovery clears the offline latch, next drop shows it again
        source.push_player(Ok(player_payload("t1", true, 0)));
        poll_cycle(&source, &extractor, &state).await;
        source.push_player(Err(FetchError::Offline));
        poll_cycle(&source, &extractor, &state).await;
        assert_eq!(state.lock().await.message, Some(ScreenMessage::NoInternet));
    }

    #[tokio::test]
    async fn no_track_message_is_edge_triggered() {
        let (source, extractor, state) = harness();
        source.push_player(Ok(String::new()));
        poll_cycle(&source, &extractor, &state).await;
        assert_eq!(state.lock().await.message, Some(ScreenMessage::NoTrack));

        source.push_player(Ok(json!({ "item": null }).to_string()));
        state.lock().await.message = None;
        poll_cycle(&source, &extractor, &state).await;
        assert_eq!(state.lock().await.message, None);

        source.push_player(Ok(player_payload("t1", true, 0)));
        poll_cycle(&source, &extractor, &state).await;
        let st = state.lock().await;
        assert!(!st.no_track);
        assert_eq!(st.track_id, "t1");
    }

    #[tokio::test]
    async fn rejected_token_body_requests_refresh_instead_of_no_track() {
        let (source, extractor, state) = harness();
        state.lock().await.message = None;
        source.push_player(Ok(json!({
            "error": { "status": 401, "message": "The access token expired" }
        })
        .to_string()));

        let status = poll_cycle(&source, &extractor, &state).await;
        assert_eq!(status, CycleStatus::AuthFailure);

        let st = state.lock().await;
        assert!(!st.no_track);
        assert_eq!(st.message, None);
        // No follow-up lookups off a rejected poll
        assert_eq!(source.like_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn non_auth_error_body_reported_without_no_track() {
        let (source, extractor, state) = harness();
        state.lock().await.message = None;
        source.push_player(Ok(json!({
            "error": { "status": 429, "message": "Too many requests" }
        })
        .to_string()));

        let status = poll_cycle(&source, &extractor, &state).await;
        assert_eq!(status, CycleStatus::Ran { first_refresh: false });

        let st = state.lock().await;
        assert!(!st.no_track);
        assert_eq!(st.message, None);
        let (notice, _) = st.notice.as_ref().expect("notice expected");
        assert!(notice.contains("player state"));
    }

    #[tokio::test]
    async fn rate_limited_like_response_raises_a_notice() {
        let (source, extractor, state) = harness();
        source.push_player(Ok(player_payload("t1", true, 0)));
        source.push_like("Too many requests hitting the API");
        poll_cycle(&source, &extractor, &state).await;

        let st = state.lock().await;
        let (notice, _) = st.notice.as_ref().expect("notice expected");
        assert!(notice.contains("Too many like requests"));
        // Displayed like flag untouched by the failed lookup
        assert!(!st.is_liked);
    }

    #[tokio::test]
    async fn unchanged_artist_image_not_reapplied() {
        let (source, extractor, state) = harness();
        let artist_body = json!({ "images": [ { "url": "artist-img" } ] }).to_string();
        source.push_player(Ok(player_payload("t1", true, 0)));
        source.push_artist(&artist_body);
        poll_cycle(&source, &extractor, &state).await;
        assert_eq!(
            state.lock().await.artist_image_url.as_deref(),
            Some("artist-img")
        );

        // New track by the same artist; lookup runs, image stays
        source.push_player(Ok(player_payload("t2", true, 0)));
        source.push_artist(&artist_body);
        state.lock().await.artist_image_url = Some("artist-img".to_string());
        poll_cycle(&source, &extractor, &state).await;
        assert_eq!(source.artist_calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            state.lock().await.artist_image_url.as_deref(),
            Some("artist-img")
        );
    }
}
