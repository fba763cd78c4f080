//! Reconciliation of polled snapshots into the displayed state
//!
//! Local actions are applied optimistically and marked pending; a pending
//! field ignores exactly one polled value, then server truth wins again.

use super::player::PlayerScreenState;
use super::snapshot::TrackSnapshot;

/// Sync state of one displayed field with respect to the server.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FieldSync {
    /// Displayed value came from the server.
    #[default]
    Synced,
    /// A local command just changed the value; the next polled value is
    /// presumed to predate it.
    PendingLocal,
    /// The suppressed cycle has passed; the next polled value applies
    /// unconditionally.
    Stale,
}

impl FieldSync {
    pub fn mark_pending(&mut self) {
        *self = FieldSync::PendingLocal;
    }

    /// Advance by one reconciliation attempt. Returns true when the polled
    /// value must be ignored this cycle.
    pub fn suppresses(&mut self) -> bool {
        match *self {
            FieldSync::PendingLocal => {
                *self = FieldSync::Stale;
                true
            }
            FieldSync::Stale => {
                *self = FieldSync::Synced;
                false
            }
            FieldSync::Synced => false,
        }
    }

    /// True when the polled value must apply even if it equals the displayed
    /// one. Relevant right after a suppressed cycle.
    fn forces_apply(self) -> bool {
        self == FieldSync::Synced
    }
}

/// Follow-up work the poll tick must launch after a reconciliation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// First reconciliation since the screen resumed.
    pub first_refresh: bool,
    /// The displayed track changed.
    pub track_changed: bool,
    /// Track id whose like status should be queried.
    pub like_query: Option<String>,
    /// Artist href to look up for the artist image.
    pub artist_lookup: Option<String>,
}

/// Apply one snapshot to the displayed state.
///
/// Refresh rules, in precedence order: empty snapshot is a no-op; the first
/// poll after resume refreshes everything; track metadata refreshes on track
/// change; pending fields skip one cycle; everything else refreshes only on
/// value change.
pub fn reconcile(state: &mut PlayerScreenState, snap: &TrackSnapshot) -> ReconcileOutcome {
    let mut outcome = ReconcileOutcome::default();
    if snap.is_empty() {
        return outcome;
    }

    let force = state.first_poll;
    if force {
        state.first_poll = false;
        outcome.first_refresh = true;
    }

    if force || !snap.is_same_track {
        state.track_id = snap.track_id.clone();
        state.title = snap.title.clone();
        state.artist_line = snap.artist_line();
        state.duration_ms = snap.duration_ms;
        outcome.track_changed = true;

        // A repeated album image (singles off the same album) keeps the
        // current display unless nothing is shown yet.
        if force || !snap.is_same_image || state.image_url.is_none() {
            if state.swipe_in_progress {
                state.deferred_image = snap.image_url.clone();
            } else {
                state.image_url = snap.image_url.clone();
            }
        }

        outcome.artist_lookup = snap
            .artists
            .first()
            .filter(|a| !a.href.is_empty())
            .map(|a| a.href.clone());
    }

    if !state.like_sync.suppresses() {
        outcome.like_query = Some(snap.track_id.clone());
    }

    if force
        || snap.is_shuffle != state.is_shuffle
        || snap.is_smart_shuffle != state.is_smart_shuffle
        || snap.is_shuffle_allowed != state.is_shuffle_allowed
    {
        state.is_shuffle = snap.is_shuffle;
        state.is_smart_shuffle = snap.is_smart_shuffle;
        state.is_shuffle_allowed = snap.is_shuffle_allowed;
    }

    let playback_forced = !state.playback_sync.forces_apply();
    if state.playback_sync.suppresses() {
        // Local play/pause in flight, this polled value predates it
    } else if force || playback_forced || snap.is_playing != state.is_playing {
        state.is_playing = snap.is_playing;
    }

    let volume_forced = !state.volume_sync.forces_apply();
    if state.volume_sync.suppresses() {
        // Local volume change in flight
    } else {
        if let Some(volume) = snap.volume_percent {
            if force || volume_forced || volume != state.volume_percent {
                state.volume_percent = volume;
            }
        }
        if let Some(supports) = snap.supports_volume {
            if supports != state.supports_volume {
                state.supports_volume = supports;
            }
        }
    }

    if !state.seek_hold {
        state.progress_ms = snap.progress_ms;
    }

    if let Some(name) = snap.device_name.as_deref() {
        if !name.is_empty() && (force || name != state.device_name) {
            state.device_name = name.to_owned();
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::snapshot::ArtistRef;

    fn snapshot(track_id: &str, same_track: bool) -> TrackSnapshot {
        TrackSnapshot {
            track_id: track_id.to_owned(),
            title: format!("title-{track_id}"),
            artists: vec![
                ArtistRef { name: "A".into(), href: "href-a".into() },
                ArtistRef { name: "B".into(), href: "href-b".into() },
            ],
            duration_ms: 200_000,
            progress_ms: 10_000,
            image_url: Some(format!("img-{track_id}")),
            is_playing: true,
            is_shuffle: false,
            is_smart_shuffle: false,
            is_shuffle_allowed: true,
            volume_percent: Some(50),
            supports_volume: Some(true),
            device_name: Some("Kitchen".into()),
            is_same_track: same_track,
            is_same_image: same_track,
        }
    }

    fn resumed_state() -> PlayerScreenState {
        let mut state = PlayerScreenState::new();
        state.first_poll = true;
        state
    }

    #[test]
    fn empty_snapshot_is_a_no_op() {
        let mut state = resumed_state();
        let outcome = reconcile(&mut state, &TrackSnapshot::default());
        assert_eq!(outcome, ReconcileOutcome::default());
        assert!(state.first_poll);
    }

    #[test]
    fn first_poll_refreshes_everything_once() {
        let mut state = resumed_state();
        let outcome = reconcile(&mut state, &snapshot("t1", false));
        assert!(outcome.first_refresh);
        assert!(outcome.track_changed);
        assert_eq!(outcome.like_query.as_deref(), Some("t1"));
        assert_eq!(outcome.artist_lookup.as_deref(), Some("href-a"));
        assert_eq!(state.title, "title-t1");
        assert_eq!(state.artist_line, "A, B");
        assert_eq!(state.volume_percent, 50);
        assert!(state.supports_volume);
        assert_eq!(state.device_name, "Kitchen");
        assert!(!state.first_poll);

        let outcome = reconcile(&mut state, &snapshot("t1", true));
        assert!(!outcome.first_refresh);
        assert!(!outcome.track_changed);
        assert_eq!(outcome.artist_lookup, None);
    }

    #[test]
    fn same_track_keeps_metadata_but_still_queries_like() {
        let mut state = resumed_state();
        reconcile(&mut state, &snapshot("t1", false));
        state.title = "edited".into();
        let outcome = reconcile(&mut state, &snapshot("t1", true));
        assert_eq!(state.title, "edited");
        assert_eq!(outcome.like_query.as_deref(), Some("t1"));
    }

    #[test]
    fn pending_playback_suppresses_exactly_one_cycle() {
        let mut state = resumed_state();
        let mut snap = snapshot("t1", false);
        snap.is_playing = false;
        reconcile(&mut state, &snap);
        assert!(!state.is_playing);

        // Local play command applied optimistically
        state.is_playing = true;
        state.playback_sync.mark_pending();

        // Poll 1 still reports paused; suppressed
        let stale = snapshot("t1", true);
        let mut stale_paused = stale.clone();
        stale_paused.is_playing = false;
        reconcile(&mut state, &stale_paused);
        assert!(state.is_playing);

        // Poll 2 reports paused again; server wins now
        reconcile(&mut state, &stale_paused);
        assert!(!state.is_playing);
        assert_eq!(state.playback_sync, FieldSync::Synced);
    }

    #[test]
    fn stale_cycle_applies_even_when_values_match() {
        let mut state = resumed_state();
        reconcile(&mut state, &snapshot("t1", false));
        state.is_playing = false;
        state.playback_sync.mark_pending();

        let playing = snapshot("t1", true);
        reconcile(&mut state, &playing);
        assert!(!state.is_playing);
        reconcile(&mut state, &playing);
        assert!(state.is_playing);
    }

    #[test]
    fn pending_like_skips_one_status_query() {
        let mut state = resumed_state();
        reconcile(&mut state, &snapshot("t1", false));

        state.like_sync.mark_pending();
        let outcome = reconcile(&mut state, &snapshot("t1", true));
        assert_eq!(outcome.like_query, None);

        let outcome = reconcile(&mut state, &snapshot("t1", true));
        assert_eq!(outcome.like_query.as_deref(), Some("t1"));
    }

    #[test]
    fn pending_volume_suppresses_then_server_wins() {
        let mut state = resumed_state();
        reconcile(&mut state, &snapshot("t1", false));
        assert_eq!(state.volume_percent, 50);

        state.volume_percent = 60;
        state.volume_sync.mark_pending();

        let stale = snapshot("t1", true);
        reconcile(&mut state, &stale);
        assert_eq!(state.volume_percent, 60);
        reconcile(&mut state, &stale);
        assert_eq!(state.volume_percent, 50);
    }

    #[test]
    fn seek_hold_freezes_progress() {
        let mut state = resumed_state();
        reconcile(&mut state, &snapshot("t1", false));
        state.seek_hold = true;
        state.progress_ms = 99_000;

        let mut snap = snapshot("t1", true);
        snap.progress_ms = 11_000;
        reconcile(&mut state, &snap);
        assert_eq!(state.progress_ms, 99_000);

        state.seek_hold = false;
        reconcile(&mut state, &snap);
        assert_eq!(state.progress_ms, 11_000);
    }

    #[test]
    fn swipe_defers_image_refresh() {
        let mut state = resumed_state();
        reconcile(&mut state, &snapshot("t1", false));
        state.swipe_in_progress = true;

        reconcile(&mut state, &snapshot("t2", false));
        assert_eq!(state.image_url.as_deref(), Some("img-t1"));
        assert_eq!(state.deferred_image.as_deref(), Some("img-t2"));
        assert_eq!(state.title, "title-t2");
    }

    #[test]
    fn repeated_album_image_not_reapplied() {
        let mut state = resumed_state();
        reconcile(&mut state, &snapshot("t1", false));

        // Different track, same album image
        let mut snap = snapshot("t2", false);
        snap.image_url = Some("img-t1".into());
        snap.is_same_image = true;
        state.image_url = Some("img-t1".into());
        reconcile(&mut state, &snap);
        assert_eq!(state.image_url.as_deref(), Some("img-t1"));

        // But it does apply when nothing is displayed yet
        state.image_url = None;
        let mut again = snapshot("t3", false);
        again.image_url = Some("img-t1".into());
        again.is_same_image = true;
        reconcile(&mut state, &again);
        assert_eq!(state.image_url.as_deref(), Some("img-t1"));
    }

    #[test]
    fn device_name_updates_on_change_only() {
        let mut state = resumed_state();
        reconcile(&mut state, &snapshot("t1", false));
        assert_eq!(state.device_name, "Kitchen");

        let mut snap = snapshot("t1", true);
        snap.device_name = Some("Bedroom".into());
        reconcile(&mut state, &snap);
        assert_eq!(state.device_name, "Bedroom");

        snap.device_name = Some(String::new());
        reconcile(&mut state, &snap);
        assert_eq!(state.device_name, "Bedroom");
    }
}
