//! One-shot countdown timers for auto-hiding UI elements
//!
//! Restarting a running countdown always yields one full new period;
//! cancellation aborts the backing task, so a cancelled countdown can never
//! fire late.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

/// A restartable one-shot timer.
#[derive(Debug, Default)]
pub struct Countdown {
    handle: Option<JoinHandle<()>>,
}

impl Countdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or restart) the countdown. Any previous run is cancelled first.
    pub fn start<F, Fut>(&mut self, duration: Duration, action: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            action().await;
        }));
    }

    /// Stop the countdown without firing. Safe to call repeatedly or when
    /// nothing is running.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// The two countdowns the player screen uses.
#[derive(Debug, Default)]
pub struct TimerManager {
    /// Hides the control row after the configured idle time.
    pub controls: Countdown,
    /// Hides the volume indicator 3 s after the last volume key.
    pub volume: Countdown,
}

impl TimerManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel_all(&mut self) {
        self.controls.cancel();
        self.volume.cancel();
    }
}

/// How long the volume indicator stays up after the last volume key.
pub const VOLUME_HIDE_DELAY: Duration = Duration::from_secs(3);
