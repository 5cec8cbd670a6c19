//! Engine tuning knobs.

use serde::{Deserialize, Serialize};

/// Maximum number of history snapshots kept per document.
pub const MAX_UNDO_HISTORY: usize = 50;

/// Distance (in canvas units) within which a guide captures an edge.
pub const SNAP_DISTANCE: f64 = 10.0;

/// Offset applied to copies made by the duplicate shortcut.
pub const DUPLICATE_OFFSET: f64 = 30.0;

/// Smallest width/height produced when a transform is baked.
pub const MIN_DIMENSION: f64 = 5.0;

/// Opacity of transient alt-drag clones.
pub const CLONE_OPACITY: f64 = 0.6;

/// Effective print resolution below which layouts carry an advisory.
pub const MIN_PRINT_DPI: f64 = 150.0;

/// Drags that never move further than this commit nothing.
pub const DRAG_THRESHOLD: f64 = 0.1;

/// Behavioural configuration shared by every document in a workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub history_capacity: usize,
    pub snap_distance: f64,
    pub duplicate_offset: f64,
    pub min_dimension: f64,
    pub clone_opacity: f64,
    pub min_print_dpi: f64,
    pub drag_threshold: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_capacity: MAX_UNDO_HISTORY,
            snap_distance: SNAP_DISTANCE,
            duplicate_offset: DUPLICATE_OFFSET,
            min_dimension: MIN_DIMENSION,
            clone_opacity: CLONE_OPACITY,
            min_print_dpi: MIN_PRINT_DPI,
            drag_threshold: DRAG_THRESHOLD,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let mut config: Self = serde_json::from_str(json)?;
        if config.history_capacity == 0 {
            log::warn!("history_capacity of 0 is not usable, falling back to 1");
            config.history_capacity = 1;
        }
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
