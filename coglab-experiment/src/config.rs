use coglab_core::{KeySet, Position};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read runner config: {0}")]
    Io(#[from] std::io::Error),
    #[error("runner config is not valid: {0}")]
    Json(#[from] serde_json::Error),
}

/// Runner settings that are not part of the experiment document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub completion_message: String,
    /// Keys that dismiss the completion screen. `None` reuses the design's
    /// break keys.
    pub completion_keys: Option<KeySet>,
    /// Where a placement without positions is drawn.
    pub fallback_position: Position,
    /// Fixes text and position sampling for reproducible runs.
    pub seed: Option<u64>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            completion_message: "Experiment Complete!".to_string(),
            completion_keys: None,
            fallback_position: Position::centre(),
            seed: None,
        }
    }
}

impl RunnerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn completion_keys<'a>(&'a self, break_keys: &'a KeySet) -> &'a KeySet {
        self.completion_keys.as_ref().unwrap_or(break_keys)
    }
}
