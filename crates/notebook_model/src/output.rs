//! Cell output records

use crate::format::deserialize_multiline;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mime type to content map carried by rich outputs.
///
/// Values are strings for every textual and base64 payload; only
/// `application/json` holds a structured value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MimeBundle(BTreeMap<String, serde_json::Value>);

/// The representation a renderer should draw for a bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MimeContent<'a> {
    /// Base64-encoded PNG data
    Png(&'a str),
    /// Base64-encoded JPEG data
    Jpeg(&'a str),
    /// Plain text
    Text(&'a str),
}

impl MimeBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry (builder style)
    pub fn with(mut self, mime: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.0.insert(mime.into(), value.into());
        self
    }

    /// Get the string content for a mime type
    pub fn text(&self, mime: &str) -> Option<&str> {
        self.0.get(mime).and_then(|v| v.as_str())
    }

    pub fn get(&self, mime: &str) -> Option<&serde_json::Value> {
        self.0.get(mime)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Pick the richest representation the renderer supports: PNG, then
    /// JPEG, then plain text.
    pub fn preferred(&self) -> Option<MimeContent<'_>> {
        if let Some(png) = self.text("image/png") {
            return Some(MimeContent::Png(png));
        }
        if let Some(jpg) = self.text("image/jpeg").or_else(|| self.text("image/jpg")) {
            return Some(MimeContent::Jpeg(jpg));
        }
        self.text("text/plain").map(MimeContent::Text)
    }
}

/// An immutable output record attached to a code cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "output_type", rename_all = "snake_case")]
pub enum Output {
    ExecuteResult {
        execution_count: Option<u32>,
        data: MimeBundle,
        #[serde(default)]
        metadata: serde_json::Map<String, serde_json::Value>,
    },
    DisplayData {
        data: MimeBundle,
        #[serde(default)]
        metadata: serde_json::Map<String, serde_json::Value>,
    },
    Stream {
        name: String,
        #[serde(deserialize_with = "deserialize_multiline")]
        text: String,
    },
    Error {
        ename: String,
        evalue: String,
        #[serde(default)]
        traceback: Vec<String>,
    },
}

impl Output {
    /// Create a stream output
    pub fn stream(name: impl Into<String>, text: impl Into<String>) -> Self {
        Output::Stream {
            name: name.into(),
            text: text.into(),
        }
    }

    /// Create a display_data output
    pub fn display(data: MimeBundle) -> Self {
        Output::DisplayData {
            data,
            metadata: serde_json::Map::new(),
        }
    }

    /// The bundle of rich outputs, if this output carries one
    pub fn data(&self) -> Option<&MimeBundle> {
        match self {
            Output::ExecuteResult { data, .. } | Output::DisplayData { data, .. } => Some(data),
            Output::Stream { .. } | Output::Error { .. } => None,
        }
    }

    /// Plain-text rendering used by text renderers
    pub fn plain_text(&self) -> Option<String> {
        match self {
            Output::ExecuteResult { data, .. } | Output::DisplayData { data, .. } => {
                data.text("text/plain").map(str::to_string)
            }
            Output::Stream { text, .. } => Some(text.clone()),
            Output::Error {
                ename,
                evalue,
                traceback,
            } => Some(format!("{}\n{}\n{}", ename, evalue, traceback.join("\n"))),
        }
    }
}
