//! Error types for notebook model operations

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotebookError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Notebook has no cells array")]
    MissingCells,

    #[error("Cell index {index} out of range (notebook has {len} cells)")]
    CellOutOfRange { index: usize, len: usize },
}

pub type Result<T> = std::result::Result<T, NotebookError>;
