//! Notebook cell records

use crate::format::deserialize_multiline;
use crate::{CellId, Output};
use serde::{Deserialize, Serialize};

/// Kind of a notebook cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellKind {
    Code,
    Markdown,
    Raw,
}

impl CellKind {
    /// Whether cells of this kind can be executed and carry outputs
    pub fn is_executable(&self) -> bool {
        matches!(self, CellKind::Code)
    }
}

/// Free-form cell metadata (`collapsed`, `scrolled`, `name`, `tags`, ...)
pub type CellMetadata = serde_json::Map<String, serde_json::Value>;

/// One cell as stored in a notebook.
///
/// `source` holds the joined in-memory text; the on-disk line array form is
/// handled by [`crate::format`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellRecord {
    #[serde(default)]
    pub id: CellId,
    pub cell_type: CellKind,
    #[serde(default, deserialize_with = "deserialize_multiline")]
    pub source: String,
    #[serde(default)]
    pub metadata: CellMetadata,
    #[serde(default)]
    pub outputs: Vec<Output>,
    #[serde(default)]
    pub execution_count: Option<u32>,
}

impl CellRecord {
    /// Create an empty code cell
    pub fn code(source: impl Into<String>) -> Self {
        Self::new(CellKind::Code, source)
    }

    /// Create a markdown cell
    pub fn markdown(source: impl Into<String>) -> Self {
        Self::new(CellKind::Markdown, source)
    }

    pub fn new(cell_type: CellKind, source: impl Into<String>) -> Self {
        Self {
            id: CellId::new(),
            cell_type,
            source: source.into(),
            metadata: CellMetadata::new(),
            outputs: Vec::new(),
            execution_count: None,
        }
    }

    /// Attach outputs (builder style). Ignored for non-executable cells.
    pub fn with_outputs(mut self, outputs: Vec<Output>) -> Self {
        if self.cell_type.is_executable() {
            self.outputs = outputs;
        }
        self
    }

    /// Tags from the `tags` metadata entry, if any
    pub fn tags(&self) -> Vec<&str> {
        self.metadata
            .get("tags")
            .and_then(|t| t.as_array())
            .map(|tags| tags.iter().filter_map(|t| t.as_str()).collect())
            .unwrap_or_default()
    }
}
