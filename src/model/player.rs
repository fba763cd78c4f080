//! Displayed player state and time/progress helpers

use std::time::Instant;

use super::reconcile::FieldSync;

/// Full-screen status message replacing the player widgets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScreenMessage {
    Initializing,
    Loading,
    NoInternet,
    NoTrack,
}

impl ScreenMessage {
    pub fn text(self) -> &'static str {
        match self {
            ScreenMessage::Initializing => "Initializing...",
            ScreenMessage::Loading => "Loading...",
            ScreenMessage::NoInternet => "No internet connection",
            ScreenMessage::NoTrack => "No track currently playing",
        }
    }

}

/// Everything the player screen displays, plus the bookkeeping used to
/// reconcile it against polled server state.
///
/// Single logical owner: the UI loop. Network tasks re-acquire the mutex
/// around this struct to publish results; nothing mutates it cross-thread.
#[derive(Clone)]
pub struct PlayerScreenState {
    // Displayed track fields
    pub track_id: String,
    pub title: String,
    pub artist_line: String,
    pub duration_ms: u64,
    pub progress_ms: u64,
    pub image_url: Option<String>,
    pub artist_image_url: Option<String>,
    pub is_playing: bool,
    pub is_liked: bool,
    pub is_shuffle: bool,
    pub is_smart_shuffle: bool,
    pub is_shuffle_allowed: bool,
    pub volume_percent: u8,
    pub supports_volume: bool,
    pub device_name: String,

    // Per-field sync state for optimistic local actions
    pub playback_sync: FieldSync,
    pub volume_sync: FieldSync,
    pub like_sync: FieldSync,

    // Poll/interaction bookkeeping
    pub first_poll: bool,
    pub seek_hold: bool,
    pub seek_target_ms: u64,
    /// Bumped whenever a new hold starts, so a delayed release from an
    /// earlier commit cannot clear a hold it does not own.
    pub seek_epoch: u32,
    pub swipe_in_progress: bool,
    pub deferred_image: Option<String>,
    pub online: bool,
    pub no_track: bool,

    // Visibility and messaging
    pub message: Option<ScreenMessage>,
    pub notice: Option<(String, Instant)>,
    pub controls_visible: bool,
    pub volume_visible: bool,
    pub should_quit: bool,
}

impl Default for PlayerScreenState {
    fn default() -> Self {
        Self {
            track_id: String::new(),
            title: String::new(),
            artist_line: String::new(),
            duration_ms: 0,
            progress_ms: 0,
            image_url: None,
            artist_image_url: None,
            is_playing: false,
            is_liked: false,
            is_shuffle: false,
            is_smart_shuffle: false,
            is_shuffle_allowed: false,
            volume_percent: 100,
            supports_volume: false,
            device_name: String::new(),
            playback_sync: FieldSync::Synced,
            volume_sync: FieldSync::Synced,
            like_sync: FieldSync::Synced,
            first_poll: true,
            seek_hold: false,
            seek_target_ms: 0,
            seek_epoch: 0,
            swipe_in_progress: false,
            deferred_image: None,
            online: true,
            no_track: false,
            message: Some(ScreenMessage::Initializing),
            notice: None,
            controls_visible: true,
            volume_visible: false,
            should_quit: false,
        }
    }
}

const NOTICE_LIFETIME_SECS: u64 = 5;

impl PlayerScreenState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connectivity transition connected -> disconnected. The message is shown
    /// once; subsequent offline ticks are no-ops.
    pub fn set_offline(&mut self) {
        if self.online {
            self.online = false;
            self.message = Some(ScreenMessage::NoInternet);
            tracing::info!("Connectivity lost");
        }
    }

    /// Connectivity transition disconnected -> connected.
    pub fn set_online(&mut self) {
        if !self.online {
            self.online = true;
            if self.message == Some(ScreenMessage::NoInternet) {
                self.message = None;
            }
            tracing::info!("Connectivity restored");
        }
    }

    /// "No track playing" transition, edge-triggered like connectivity.
    pub fn set_no_track(&mut self) {
        if !self.no_track {
            self.no_track = true;
            self.message = Some(ScreenMessage::NoTrack);
        }
    }

    pub fn clear_no_track(&mut self) {
        if self.no_track {
            self.no_track = false;
            if self.message == Some(ScreenMessage::NoTrack) {
                self.message = None;
            }
        }
    }

    pub fn push_notice(&mut self, text: String) {
        self.notice = Some((text, Instant::now()));
    }

    /// Drop the transient notice once it has been on screen long enough.
    pub fn expire_old_notice(&mut self) {
        if let Some((_, shown_at)) = &self.notice {
            if shown_at.elapsed().as_secs() > NOTICE_LIFETIME_SECS {
                self.notice = None;
            }
        }
    }

    /// Progress clamped for display; the API does not guarantee
    /// `progress <= duration`.
    pub fn display_progress_ms(&self) -> u64 {
        if self.seek_hold {
            self.seek_target_ms.min(self.duration_ms)
        } else {
            self.progress_ms.min(self.duration_ms)
        }
    }

    pub fn progress_permille(&self) -> u16 {
        progress_permille(self.display_progress_ms(), self.duration_ms)
    }
}

/// Progress as 0..=1000, guarding the zero-duration case.
pub fn progress_permille(progress_ms: u64, duration_ms: u64) -> u16 {
    if duration_ms == 0 {
        return 0;
    }
    ((progress_ms as f64 / duration_ms as f64) * 1000.0).min(1000.0) as u16
}

/// "MM:SS" formatting used for both the progress and total time displays.
pub fn format_time(ms: u64) -> String {
    let minutes = ms / 60_000;
    let seconds = (ms % 60_000) / 1000;
    format!("{:02}:{:02}", minutes, seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permille_guards_zero_duration() {
        assert_eq!(progress_permille(50_000, 0), 0);
        assert_eq!(progress_permille(0, 0), 0);
    }

    #[test]
    fn permille_of_quarter() {
        assert_eq!(progress_permille(50_000, 200_000), 250);
    }

    #[test]
    fn permille_clamps_overshoot() {
        // Server progress may exceed the reported duration
        assert_eq!(progress_permille(210_000, 200_000), 1000);
    }

    #[test]
    fn time_formatting() {
        assert_eq!(format_time(50_000), "00:50");
        assert_eq!(format_time(200_000), "03:20");
        assert_eq!(format_time(0), "00:00");
        assert_eq!(format_time(3_599_000), "59:59");
    }

    #[test]
    fn offline_message_shown_once() {
        let mut state = PlayerScreenState::new();
        state.message = None;
        state.set_offline();
        assert_eq!(state.message, Some(ScreenMessage::NoInternet));

        // Simulate the user dismissing it; further offline ticks stay silent
        state.message = None;
        state.set_offline();
        state.set_offline();
        assert_eq!(state.message, None);

        state.set_online();
        state.set_offline();
        assert_eq!(state.message, Some(ScreenMessage::NoInternet));
    }

    #[test]
    fn no_track_message_cleared_on_recovery() {
        let mut state = PlayerScreenState::new();
        state.message = None;
        state.set_no_track();
        assert_eq!(state.message, Some(ScreenMessage::NoTrack));
        state.clear_no_track();
        assert_eq!(state.message, None);
    }

    #[test]
    fn display_progress_follows_seek_target_while_held() {
        let mut state = PlayerScreenState::new();
        state.duration_ms = 200_000;
        state.progress_ms = 10_000;
        state.seek_hold = true;
        state.seek_target_ms = 90_000;
        assert_eq!(state.display_progress_ms(), 90_000);
        state.seek_hold = false;
        assert_eq!(state.display_progress_ms(), 10_000);
    }
}
