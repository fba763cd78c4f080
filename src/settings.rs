//! User settings, loaded from and written through the preference store

use anyhow::Result;
use serde_json::Value;

use crate::prefs::PrefStore;

const KEY_HIDE_CONTROLS: &str = "hide_controls";
const KEY_DISPLAY_TIME: &str = "display_time";
const KEY_DARKEN_VALUE: &str = "darken_value";
const KEY_HORIZONTAL_SWIPE: &str = "horizontal_swipe";
const KEY_VERTICAL_SWIPE: &str = "vertical_swipe";
const KEY_DOUBLE_TAP: &str = "double_tap";

/// Behavior and appearance knobs for the player screen.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppSettings {
    /// Auto-hide the control row after [`display_time_secs`] of inactivity.
    pub hide_controls: bool,
    pub display_time_secs: u64,
    /// How much to dim secondary text, 0..=100.
    pub darken_value: u8,
    /// Left/Right keys skip tracks.
    pub horizontal_swipe: bool,
    /// Up/Down keys step the volume.
    pub vertical_swipe: bool,
    /// Quick-like binding enabled (likes only, never unlikes).
    pub double_tap_like: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            hide_controls: false,
            display_time_secs: 10,
            darken_value: 60,
            horizontal_swipe: true,
            vertical_swipe: true,
            double_tap_like: true,
        }
    }
}

impl AppSettings {
    pub fn load(prefs: &PrefStore) -> Self {
        let defaults = Self::default();
        Self {
            hide_controls: prefs
                .get_bool(KEY_HIDE_CONTROLS)
                .unwrap_or(defaults.hide_controls),
            display_time_secs: prefs
                .get_i64(KEY_DISPLAY_TIME)
                .filter(|&t| t > 0)
                .map(|t| t as u64)
                .unwrap_or(defaults.display_time_secs),
            darken_value: prefs
                .get_i64(KEY_DARKEN_VALUE)
                .filter(|&v| (0..=100).contains(&v))
                .map(|v| v as u8)
                .unwrap_or(defaults.darken_value),
            horizontal_swipe: prefs
                .get_bool(KEY_HORIZONTAL_SWIPE)
                .unwrap_or(defaults.horizontal_swipe),
            vertical_swipe: prefs
                .get_bool(KEY_VERTICAL_SWIPE)
                .unwrap_or(defaults.vertical_swipe),
            double_tap_like: prefs
                .get_bool(KEY_DOUBLE_TAP)
                .unwrap_or(defaults.double_tap_like),
        }
    }

    pub fn store(&self, prefs: &PrefStore) -> Result<()> {
        prefs.set(KEY_HIDE_CONTROLS, Value::from(self.hide_controls))?;
        prefs.set(KEY_DISPLAY_TIME, Value::from(self.display_time_secs))?;
        prefs.set(KEY_DARKEN_VALUE, Value::from(self.darken_value))?;
        prefs.set(KEY_HORIZONTAL_SWIPE, Value::from(self.horizontal_swipe))?;
        prefs.set(KEY_VERTICAL_SWIPE, Value::from(self.vertical_swipe))?;
        prefs.set(KEY_DOUBLE_TAP, Value::from(self.double_tap_like))?;
        Ok(())
    }
}
