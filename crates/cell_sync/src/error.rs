//! Error types for the cell synchronization crate.

use thiserror::Error;

/// Result type alias for synchronization operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while synchronizing a cell.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// A line/column position does not exist in the text it was applied to.
    #[error("Invalid position: line {line}, column {column}")]
    InvalidPosition { line: usize, column: usize },

    /// A range whose start lies after its end, or that overlaps another
    /// range of the same batch.
    #[error("Invalid range: {from} to {to}")]
    InvalidRange { from: usize, to: usize },

    /// The remote document backing a collaborative string has not loaded yet.
    #[error("Collaborative string is not ready: remote document still loading")]
    NotReady,

    /// The collaborative string is already bound to a remote handle.
    #[error("Collaborative string is already bound")]
    AlreadyBound,

    /// A named shared string does not exist in the remote document.
    #[error("Shared string not found: {0}")]
    StringNotFound(String),

    /// Cell index outside the notebook.
    #[error("Cell index {index} out of range (notebook has {len} cells)")]
    CellOutOfRange { index: usize, len: usize },

    /// The cell is already attached to a text surface.
    #[error("Cell {0} is already attached to a text surface")]
    AlreadyAttached(usize),

    /// The cell is not attached to a text surface.
    #[error("Cell {0} is not attached to a text surface")]
    NotAttached(usize),

    /// Configuration could not be read or parsed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Notebook (de)serialization failure.
    #[error("Notebook error: {0}")]
    Notebook(String),
}

impl From<notebook_model::NotebookError> for SyncError {
    fn from(err: notebook_model::NotebookError) -> Self {
        SyncError::Notebook(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Notebook(err.to_string())
    }
}
