//! Synchronization settings

use crate::error::{SyncError, SyncResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings for cell synchronization
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncConfig {
    /// Whether text applied from a peer is highlighted on the surface
    pub highlight_remote_edits: bool,
    /// CSS for the remote edit highlight
    pub highlight_style: String,
    /// Tooltip for the remote edit highlight
    pub highlight_title: String,
    /// Source used for cells that arrive without one
    pub default_cell_source: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            highlight_remote_edits: true,
            highlight_style: "background-color: #DDF;".to_string(),
            highlight_title: "Remote edit".to_string(),
            default_cell_source: String::new(),
        }
    }
}

impl SyncConfig {
    /// Enable or disable remote edit highlighting (builder style)
    pub fn with_highlight(mut self, enabled: bool) -> Self {
        self.highlight_remote_edits = enabled;
        self
    }

    pub fn with_default_cell_source(mut self, source: impl Into<String>) -> Self {
        self.default_cell_source = source.into();
        self
    }

    /// Parse settings from JSON. Missing keys take their defaults.
    pub fn from_json_str(json: &str) -> SyncResult<Self> {
        serde_json::from_str(json).map_err(|e| SyncError::Config(e.to_string()))
    }

    /// Load settings from a JSON file.
    ///
    /// A missing file yields defaults. So does a file that fails to parse,
    /// after logging a warning. Other I/O errors are returned.
    pub fn load(path: &Path) -> SyncResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| SyncError::Config(format!("{}: {}", path.display(), e)))?;
        match Self::from_json_str(&content) {
            Ok(config) => Ok(config),
            Err(e) => {
                tracing::warn!("Failed to parse sync settings, using defaults: {}", e);
                Ok(Self::default())
            }
        }
    }

    /// Save settings to a JSON file, creating parent directories
    pub fn save(&self, path: &Path) -> SyncResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SyncError::Config(e.to_string()))?;
        }
        let content =
            serde_json::to_string_pretty(self).map_err(|e| SyncError::Config(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| SyncError::Config(e.to_string()))
    }
}
