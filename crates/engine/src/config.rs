use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::range::{DEFAULT_LEAVE_MS, SILENCE_THRESHOLD};

/// Tunables shared by silence detection and export planning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Normalized peak amplitude below which audio counts as silent.
    pub silence_threshold: f32,
    /// Padding kept by `tighten` commands that omit `leave N ms`.
    pub default_leave_ms: f64,
    /// Cuts shorter than this are dropped when building an export plan.
    pub min_cut_seconds: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            silence_threshold: SILENCE_THRESHOLD,
            default_leave_ms: DEFAULT_LEAVE_MS,
            min_cut_seconds: 0.001,
        }
    }
}

impl EngineConfig {
    /// Reads a JSON config file. Missing fields keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let invalid = |reason: String| EngineError::InvalidConfig {
            path: path.to_path_buf(),
            reason,
        };
        let raw = std::fs::read_to_string(path).map_err(|error| invalid(error.to_string()))?;
        let config: Self = serde_json::from_str(&raw).map_err(|error| invalid(error.to_string()))?;
        config.validate().map_err(invalid)?;
        Ok(config)
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if !(self.silence_threshold.is_finite() && (0.0..=1.0).contains(&self.silence_threshold)) {
            return Err(format!(
                "silence_threshold must be within [0, 1], got {}",
                self.silence_threshold
            ));
        }
        if !(self.default_leave_ms.is_finite() && self.default_leave_ms >= 0.0) {
            return Err(format!(
                "default_leave_ms must be non-negative, got {}",
                self.default_leave_ms
            ));
        }
        if !(self.min_cut_seconds.is_finite() && self.min_cut_seconds >= 0.0) {
            return Err(format!(
                "min_cut_seconds must be non-negative, got {}",
                self.min_cut_seconds
            ));
        }
        Ok(())
    }
}
