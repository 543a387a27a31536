//! Editor configuration.

use kurbo::Size;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default key of the persisted design record.
pub const DEFAULT_STORAGE_KEY: &str = "captionkit.design";

/// Tunables for the editing engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Canvas size when no background is set.
    pub default_canvas_size: Size,
    /// Bounding box background images are scaled into.
    pub max_canvas_size: Size,
    /// Maximum number of retained history snapshots.
    pub history_depth: usize,
    /// Quiet period after the last change before an autosave fires.
    pub autosave_debounce_ms: u64,
    /// Distance from the canvas center at which dragged layers snap.
    pub snap_threshold: f64,
    /// How many times a background load waits for the canvas surface.
    pub surface_retry_attempts: u32,
    pub surface_retry_delay_ms: u64,
    /// Key of the design record in the local store.
    pub storage_key: String,
    /// Largest raw image kept inline in the local store.
    pub max_inline_image_bytes: usize,
    pub min_font_size: f64,
    pub max_font_size: f64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            default_canvas_size: Size::new(800.0, 600.0),
            max_canvas_size: Size::new(1200.0, 800.0),
            history_depth: crate::history::MAX_HISTORY_DEPTH,
            autosave_debounce_ms: crate::storage::DEFAULT_DEBOUNCE_MS,
            snap_threshold: crate::binding::snap::CENTER_SNAP_THRESHOLD,
            surface_retry_attempts: 10,
            surface_retry_delay_ms: 100,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            max_inline_image_bytes: 2 * 1024 * 1024,
            min_font_size: 8.0,
            max_font_size: 200.0,
        }
    }
}

impl EditorConfig {
    /// Parse a configuration from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Autosave debounce window.
    pub fn autosave_debounce(&self) -> Duration {
        Duration::from_millis(self.autosave_debounce_ms)
    }

    /// Delay between surface readiness checks.
    pub fn surface_retry_delay(&self) -> Duration {
        Duration::from_millis(self.surface_retry_delay_ms)
    }
}
