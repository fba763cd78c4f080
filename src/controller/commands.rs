//! Playback commands: fire-and-forget requests with optimistic UI updates
//!
//! Every command spawns its request so the input loop never blocks. A
//! successful command marks the touched field pending; the next polled value
//! for it is presumed stale and skipped once.

use std::time::Duration;

use super::timers::VOLUME_HIDE_DELAY;
use super::PlayerController;

/// Progress refresh stays suppressed this long after a committed seek, so
/// the bar does not jump back before the server catches up.
const SEEK_RELEASE_DELAY: Duration = Duration::from_millis(750);

/// Track-change keys play a short slide animation; the new album image is
/// held back until it settles.
const SWIPE_SETTLE_DELAY: Duration = Duration::from_millis(400);

/// One seek key press moves the target this far.
pub(crate) const SEEK_STEP_MS: u64 = 5_000;

const VOLUME_STEP: u8 = 10;

impl PlayerController {
    pub async fn toggle_playback(&self) {
        let target = {
            let state = self.state.lock().await;
            !state.is_playing
        };
        let client = self.client.clone();
        let state = self.state.clone();
        tokio::spawn(async move {
            match client.set_playing(target).await {
                Ok(()) => {
                    let mut st = state.lock().await;
                    st.is_playing = target;
                    st.playback_sync.mark_pending();
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Playback toggle failed");
                    state.lock().await.push_notice(Self::format_error(&e));
                }
            }
        });
    }

    /// Skip to the next or previous track. On success the poll loop is
    /// nudged immediately instead of waiting out the interval.
    pub async fn skip_track(&self, forward: bool) {
        {
            let mut state = self.state.lock().await;
            state.swipe_in_progress = true;
        }
        let ctrl = self.clone();
        tokio::spawn(async move {
            match ctrl.client.skip(forward).await {
                Ok(()) => {
                    ctrl.poll_tick().await;
                    tokio::time::sleep(SWIPE_SETTLE_DELAY).await;
                    let mut st = ctrl.state.lock().await;
                    st.swipe_in_progress = false;
                    if let Some(url) = st.deferred_image.take() {
                        st.image_url = Some(url);
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, forward, "Skip failed");
                    let mut st = ctrl.state.lock().await;
                    st.swipe_in_progress = false;
                    st.push_notice(Self::format_error(&e));
                }
            }
        });
    }

    pub async fn toggle_shuffle(&self) {
        let target = {
            let mut state = self.state.lock().await;
            if !state.is_shuffle_allowed {
                state.push_notice("Shuffle is not allowed for this playback".to_string());
                return;
            }
            // Smart shuffle counts as shuffle being on
            !(state.is_shuffle || state.is_smart_shuffle)
        };
        let client = self.client.clone();
        let state = self.state.clone();
        tokio::spawn(async move {
            match client.set_shuffle(target).await {
                Ok(()) => {
                    let mut st = state.lock().await;
                    st.is_shuffle = target;
                    st.is_smart_shuffle = false;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Shuffle toggle failed");
                    state.lock().await.push_notice(Self::format_error(&e));
                }
            }
        });
    }

    /// Toggle the like on the displayed track. With `only_like` set (the
    /// quick-like binding) an already-liked track is left alone.
    pub async fn toggle_like(&self, only_like: bool) {
        let (track_id, target) = {
            let mut state = self.state.lock().await;
            if state.track_id.is_empty() {
                return;
            }
            if only_like && state.is_liked {
                return;
            }
            // Optimistic flip right away; the cooldown keeps the next poll
            // from undoing it
            let target = !state.is_liked;
            state.is_liked = target;
            state.like_sync.mark_pending();
            (state.track_id.clone(), target)
        };
        let client = self.client.clone();
        let state = self.state.clone();
        tokio::spawn(async move {
            match client.set_liked(&track_id, target).await {
                Ok(()) => {
                    let text = if target { "Track liked" } else { "Track unliked" };
                    state.lock().await.push_notice(text.to_string());
                }
                Err(e) => {
                    tracing::warn!(error = %e, track_id, "Like request failed");
                    state.lock().await.push_notice(Self::format_error(&e));
                }
            }
        });
    }

    /// Commit the held seek target. The hold releases after a fixed delay so
    /// polled progress from before the seek never flashes through.
    pub async fn commit_seek(&self) {
        let (target, epoch) = {
            let state = self.state.lock().await;
            if !state.seek_hold {
                return;
            }
            (state.seek_target_ms.min(state.duration_ms), state.seek_epoch)
        };
        let ctrl = self.clone();
        tokio::spawn(async move {
            let result = ctrl.client.seek(target).await;
            if let Err(e) = &result {
                tracing::warn!(error = %e, target, "Seek failed");
                ctrl.state.lock().await.push_notice(Self::format_error(e));
            } else {
                ctrl.state.lock().await.progress_ms = target;
            }
            tokio::time::sleep(SEEK_RELEASE_DELAY).await;
            ctrl.release_seek_hold(epoch).await;
        });
    }

    /// Drop the seek hold, unless a newer hold started since `epoch` and
    /// owns the bar now.
    pub(crate) async fn release_seek_hold(&self, epoch: u32) {
        let mut state = self.state.lock().await;
        if state.seek_epoch == epoch {
            state.seek_hold = false;
        }
    }

    pub async fn volume_up(&self) {
        self.step_volume(true).await;
    }

    pub async fn volume_down(&self) {
        self.step_volume(false).await;
    }

    async fn step_volume(&self, up: bool) {
        let target = {
            let mut state = self.state.lock().await;
            if !state.supports_volume {
                let device = if state.device_name.is_empty() {
                    "This device".to_string()
                } else {
                    state.device_name.clone()
                };
                state.push_notice(format!("{device} does not support volume control"));
                return;
            }
            stepped_volume(state.volume_percent, up)
        };
        self.show_volume_indicator().await;

        let Some(target) = target else { return };
        let client = self.client.clone();
        let state = self.state.clone();
        tokio::spawn(async move {
            match client.set_volume(target).await {
                Ok(()) => {
                    let mut st = state.lock().await;
                    st.volume_percent = target;
                    st.volume_sync.mark_pending();
                }
                Err(e) => {
                    tracing::warn!(error = %e, target, "Volume request failed");
                    state.lock().await.push_notice(Self::format_error(&e));
                }
            }
        });
    }

    /// Show the volume bar and (re)arm its auto-hide.
    async fn show_volume_indicator(&self) {
        self.state.lock().await.volume_visible = true;
        let state = self.state.clone();
        self.timers
            .lock()
            .await
            .volume
            .start(VOLUME_HIDE_DELAY, move || async move {
                state.lock().await.volume_visible = false;
            });
    }
}

/// Next volume to request for one step, or `None` when already at the end
/// of the range. Steps by 10 and snaps the last stretch to the bound.
pub(crate) fn stepped_volume(current: u8, up: bool) -> Option<u8> {
    if up {
        match current {
            0..=90 => Some(current + VOLUME_STEP),
            91..=99 => Some(100),
            _ => None,
        }
    } else {
        match current {
            0 => None,
            1..=9 => Some(0),
            _ => Some(current - VOLUME_STEP),
        }
    }
}
