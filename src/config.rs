// ============================================================================
// EDITOR CONFIG: per-session tunables, loadable from JSON by the CLI
// ============================================================================

use serde::Deserialize;

/// Default number of history snapshots kept per session.
pub const DEFAULT_MAX_HISTORY: usize = 20;

/// Session configuration. Every field falls back to its default when absent
/// from a config file.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Maximum number of snapshots retained by the history manager.
    pub max_history: usize,
    /// Colour distance used by magic wand / select similar when the caller
    /// does not pass one.
    pub default_tolerance: f32,
    /// Export quality in (0, 1].
    pub default_quality: f32,
    /// Export format name ("png", "jpeg", "bmp").
    pub default_format: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            max_history: DEFAULT_MAX_HISTORY,
            default_tolerance: 32.0,
            default_quality: 0.9,
            default_format: "png".to_string(),
        }
    }
}

impl EditorConfig {
    /// Parse a JSON config document. Unknown keys are ignored.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let cfg: EditorConfig = serde_json::from_str(text)?;
        Ok(cfg.normalized())
    }

    /// Coerce out-of-range values into something usable.
    pub fn normalized(mut self) -> Self {
        self.max_history = self.max_history.max(1);
        if !(self.default_quality > 0.0 && self.default_quality <= 1.0) {
            self.default_quality = 0.9;
        }
        self.default_tolerance = self.default_tolerance.max(0.0);
        self
    }
}
