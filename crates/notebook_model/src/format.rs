//! Conversion between the in-memory notebook and nbformat file contents.
//!
//! On disk every multiline string (cell sources, stream text, mime bundle
//! payloads) may be stored either as one string or as an array of lines that
//! keep their trailing newline. In memory they are always joined.

use crate::{CellKind, CellRecord, Notebook, NotebookError, Result};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Accept either a string or an array of line strings
pub(crate) fn deserialize_multiline<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Multiline {
        Joined(String),
        Lines(Vec<String>),
    }

    Ok(match Multiline::deserialize(deserializer)? {
        Multiline::Joined(text) => text,
        Multiline::Lines(lines) => lines.concat(),
    })
}

/// Parse notebook file contents.
///
/// Some stores have been seen to serialize the notebook JSON twice, so a
/// top-level JSON string is decoded a second time.
pub fn notebook_from_file_contents(contents: &str) -> Result<Notebook> {
    let mut value: Value = serde_json::from_str(contents)?;
    if let Value::String(inner) = &value {
        tracing::warn!("Notebook content was serialized twice, decoding again");
        value = serde_json::from_str(inner)?;
    }

    if !value.get("cells").is_some_and(Value::is_array) {
        return Err(NotebookError::MissingCells);
    }

    transform_notebook(&mut value, join_lines);
    Ok(serde_json::from_value(value)?)
}

/// Serialize a notebook to file contents with multiline strings split into
/// line arrays.
pub fn file_contents_from_notebook(notebook: &Notebook) -> Result<String> {
    let mut value = serde_json::to_value(notebook)?;
    transform_notebook(&mut value, split_lines);

    let cells = value
        .get_mut("cells")
        .and_then(Value::as_array_mut)
        .ok_or(NotebookError::MissingCells)?;
    for (cell, record) in cells.iter_mut().zip(&notebook.cells) {
        if !record.cell_type.is_executable() {
            if let Some(obj) = cell.as_object_mut() {
                obj.remove("outputs");
                obj.remove("execution_count");
            }
        }
    }

    Ok(serde_json::to_string_pretty(&value)?)
}

/// A fresh notebook holding one empty code cell
pub fn new_notebook() -> Notebook {
    Notebook::with_cells(vec![CellRecord::new(CellKind::Code, "")])
}

/// Apply `f` to every value that may be a multiline string
fn transform_notebook(notebook: &mut Value, f: fn(&mut Value)) {
    let Some(cells) = notebook.get_mut("cells").and_then(Value::as_array_mut) else {
        return;
    };
    for cell in cells {
        if let Some(source) = cell.get_mut("source") {
            f(source);
        }
        let Some(outputs) = cell.get_mut("outputs").and_then(Value::as_array_mut) else {
            continue;
        };
        for output in outputs {
            if let Some(text) = output.get_mut("text") {
                f(text);
            }
            if let Some(data) = output.get_mut("data").and_then(Value::as_object_mut) {
                for (mime, payload) in data.iter_mut() {
                    if mime != "application/json" {
                        f(payload);
                    }
                }
            }
        }
    }
}

fn join_lines(value: &mut Value) {
    if let Value::Array(lines) = value {
        if lines.iter().all(Value::is_string) {
            let joined: String = lines.iter().filter_map(Value::as_str).collect();
            *value = Value::String(joined);
        }
    }
}

/// Split a string into lines that keep their `\n`.
///
/// No empty trailing line is emitted: `""` becomes `[]` and `"a\n"` becomes
/// `["a\n"]`. Joining the array gives back the original string, which is
/// all readers of the format rely on.
fn split_lines(value: &mut Value) {
    if let Value::String(text) = value {
        let lines = text
            .split_inclusive('\n')
            .map(|line| Value::String(line.to_string()))
            .collect();
        *value = Value::Array(lines);
    }
}
