//! Notebook document and metadata

use crate::{CellRecord, NotebookError, Result};
use serde::{Deserialize, Serialize};

/// Kernel the notebook was written for
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KernelSpec {
    pub name: String,
    pub display_name: String,
}

/// Language of the notebook's code cells
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codemirror_mode: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_extension: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mimetype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pygments_lexer: Option<String>,
}

impl Default for LanguageInfo {
    fn default() -> Self {
        Self {
            name: "python".to_string(),
            codemirror_mode: None,
            file_extension: None,
            mimetype: None,
            pygments_lexer: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotebookMetadata {
    #[serde(default)]
    pub kernelspec: KernelSpec,
    #[serde(default)]
    pub language_info: LanguageInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orig_nbformat: Option<u32>,
}

fn default_nbformat() -> u32 {
    4
}

/// A notebook: metadata plus an ordered list of cells
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notebook {
    #[serde(default)]
    pub metadata: NotebookMetadata,
    #[serde(default = "default_nbformat")]
    pub nbformat: u32,
    #[serde(default)]
    pub nbformat_minor: u32,
    pub cells: Vec<CellRecord>,
}

impl Notebook {
    /// Create a notebook with the given cells and default metadata
    pub fn with_cells(cells: Vec<CellRecord>) -> Self {
        Self {
            metadata: NotebookMetadata::default(),
            nbformat: default_nbformat(),
            nbformat_minor: 0,
            cells,
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cell(&self, index: usize) -> Option<&CellRecord> {
        self.cells.get(index)
    }

    /// Insert a cell at `index` (0..=len)
    pub fn insert_cell(&mut self, index: usize, cell: CellRecord) -> Result<()> {
        if index > self.cells.len() {
            return Err(NotebookError::CellOutOfRange {
                index,
                len: self.cells.len(),
            });
        }
        self.cells.insert(index, cell);
        Ok(())
    }

    /// Replace the cell at `index`
    pub fn set_cell(&mut self, index: usize, cell: CellRecord) -> Result<()> {
        let len = self.cells.len();
        let slot = self
            .cells
            .get_mut(index)
            .ok_or(NotebookError::CellOutOfRange { index, len })?;
        *slot = cell;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_cell_bounds() {
        let mut nb = Notebook::with_cells(vec![CellRecord::code("a")]);
        nb.insert_cell(0, CellRecord::markdown("# h")).unwrap();
        nb.insert_cell(2, CellRecord::code("b")).unwrap();
        assert_eq!(nb.len(), 3);
        assert_eq!(nb.cell(0).unwrap().source, "# h");
        assert_eq!(nb.cell(2).unwrap().source, "b");

        let err = nb.insert_cell(9, CellRecord::code("c")).unwrap_err();
        assert!(matches!(err, NotebookError::CellOutOfRange { index: 9, len: 3 }));
    }

    #[test]
    fn test_set_cell() {
        let mut nb = Notebook::with_cells(vec![CellRecord::code("a")]);
        nb.set_cell(0, CellRecord::code("z")).unwrap();
        assert_eq!(nb.cell(0).unwrap().source, "z");
        assert!(nb.set_cell(1, CellRecord::code("y")).is_err());
    }

    #[test]
    fn test_metadata_defaults_when_missing() {
        let nb: Notebook = serde_json::from_str(r#"{"cells": []}"#).unwrap();
        assert_eq!(nb.nbformat, 4);
        assert_eq!(nb.metadata.language_info.name, "python");
        assert!(nb.is_empty());
    }
}
