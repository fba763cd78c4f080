//! Key event handling
//!
//! Terminal bindings for what the touch UI does with gestures: arrow keys
//! skip tracks and step the volume, `,`/`.` nudge a held seek target and
//! Enter commits it. Any key press counts as activity and re-arms the
//! controls auto-hide.

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};

use super::commands::SEEK_STEP_MS;
use super::PlayerController;

impl PlayerController {
    pub async fn handle_key_event(&self, key: KeyEvent) -> Result<()> {
        if key.kind != KeyEventKind::Press {
            return Ok(());
        }

        // Every key press counts as user activity
        self.show_controls().await;

        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') => {
                self.state.lock().await.should_quit = true;
            }
            KeyCode::Char(' ') => {
                self.toggle_playback().await;
            }
            KeyCode::Right | KeyCode::Char('n') => {
                if self.settings.horizontal_swipe {
                    self.skip_track(true).await;
                }
            }
            KeyCode::Left | KeyCode::Char('p') => {
                if self.settings.horizontal_swipe {
                    self.skip_track(false).await;
                }
            }
            KeyCode::Up | KeyCode::Char('+') => {
                if self.settings.vertical_swipe {
                    self.volume_up().await;
                }
            }
            KeyCode::Down | KeyCode::Char('-') => {
                if self.settings.vertical_swipe {
                    self.volume_down().await;
                }
            }
            KeyCode::Char('s') | KeyCode::Char('S') => {
                self.toggle_shuffle().await;
            }
            KeyCode::Char('l') => {
                self.toggle_like(false).await;
            }
            // Quick-like: likes only, never unlikes
            KeyCode::Char('L') => {
                if self.settings.double_tap_like {
                    self.toggle_like(true).await;
                }
            }
            KeyCode::Char('c') | KeyCode::Char('C') => {
                self.clear_cache().await;
            }
            KeyCode::Char(',') => {
                self.nudge_seek_target(false).await;
            }
            KeyCode::Char('.') => {
                self.nudge_seek_target(true).await;
            }
            KeyCode::Enter => {
                self.commit_seek().await;
            }
            KeyCode::Esc => {
                self.cancel_seek().await;
            }
            _ => {}
        }
        Ok(())
    }

    /// Start or extend a seek hold. Polled progress leaves the bar alone
    /// while the hold is up.
    async fn nudge_seek_target(&self, forward: bool) {
        let mut state = self.state.lock().await;
        if state.track_id.is_empty() {
            return;
        }
        if !state.seek_hold {
            state.seek_hold = true;
            state.seek_target_ms = state.progress_ms;
            // Invalidates any release still pending from an earlier commit
            state.seek_epoch = state.seek_epoch.wrapping_add(1);
        }
        state.seek_target_ms = if forward {
            (state.seek_target_ms + SEEK_STEP_MS).min(state.duration_ms)
        } else {
            state.seek_target_ms.saturating_sub(SEEK_STEP_MS)
        };
    }

    async fn cancel_seek(&self) {
        let mut state = self.state.lock().await;
        state.seek_hold = false;
        state.seek_target_ms = 0;
    }
}
