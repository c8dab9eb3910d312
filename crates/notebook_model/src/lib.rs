//! Notebook Model - Cells, outputs and the nbformat file representation
//!
//! This crate provides the in-memory notebook model used by the editor and
//! the codec between that model and the on-disk nbformat JSON, where
//! multiline strings are stored as arrays of lines.

mod cell;
mod cell_id;
mod error;
pub mod format;
mod notebook;
mod output;

pub use cell::*;
pub use cell_id::*;
pub use error::*;
pub use format::{file_contents_from_notebook, new_notebook, notebook_from_file_contents};
pub use notebook::*;
pub use output::*;
