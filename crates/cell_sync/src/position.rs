//! Conversion between absolute character offsets and line/column positions.
//!
//! The collaborative string addresses text by absolute offset, counting every
//! newline as one character. Text surfaces address it by line and column.
//! All lengths here are in `char`s, never bytes.

use crate::error::{SyncError, SyncResult};
use serde::{Deserialize, Serialize};

/// A line/column position in a text surface.
///
/// Only meaningful for the snapshot it was taken from. Ordering is by line,
/// then column, which is document order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Immutable snapshot of the length of every line of a text.
///
/// A text always has at least one (possibly empty) line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineLengths(Vec<usize>);

impl LineLengths {
    /// Snapshot the line lengths of `text`
    pub fn from_text(text: &str) -> Self {
        Self(text.split('\n').map(|line| line.chars().count()).collect())
    }

    /// Build from explicit lengths. An empty list means one empty line.
    pub fn from_lengths(lengths: impl IntoIterator<Item = usize>) -> Self {
        let lengths: Vec<usize> = lengths.into_iter().collect();
        if lengths.is_empty() {
            Self(vec![0])
        } else {
            Self(lengths)
        }
    }

    pub fn line_count(&self) -> usize {
        self.0.len()
    }

    pub fn line_len(&self, line: usize) -> Option<usize> {
        self.0.get(line).copied()
    }

    /// Total characters, newlines included
    pub fn total_len(&self) -> usize {
        self.0.iter().sum::<usize>() + self.0.len() - 1
    }

    /// Position just past the last character
    pub fn end(&self) -> Position {
        let line = self.0.len() - 1;
        Position::new(line, self.0[line])
    }

    /// Check that `position` exists in this snapshot
    pub fn validate(&self, position: Position) -> SyncResult<()> {
        match self.line_len(position.line) {
            Some(len) if position.column <= len => Ok(()),
            _ => Err(SyncError::InvalidPosition {
                line: position.line,
                column: position.column,
            }),
        }
    }

    /// Update the snapshot for the replacement of `from..to` by `inserted`
    /// (one entry per line of the new text).
    pub fn splice(&mut self, from: Position, to: Position, inserted: &[String]) -> SyncResult<()> {
        self.validate(from)?;
        self.validate(to)?;
        if to < from {
            return Err(SyncError::InvalidRange {
                from: to_absolute_offset(self, from)?,
                to: to_absolute_offset(self, to)?,
            });
        }

        let head = from.column;
        let tail = self.0[to.line] - to.column;
        let mut replacement: Vec<usize> = if inserted.is_empty() {
            vec![0]
        } else {
            inserted.iter().map(|line| line.chars().count()).collect()
        };
        replacement[0] += head;
        if let Some(last) = replacement.last_mut() {
            *last += tail;
        }
        self.0.splice(from.line..=to.line, replacement);
        Ok(())
    }
}

/// Convert a position to an absolute offset.
///
/// Fails with [`SyncError::InvalidPosition`] when the line does not exist or
/// the column lies past the end of its line.
pub fn to_absolute_offset(lines: &LineLengths, position: Position) -> SyncResult<usize> {
    lines.validate(position)?;
    let before: usize = lines.0[..position.line].iter().map(|len| len + 1).sum();
    Ok(before + position.column)
}

/// Convert an absolute offset to a position.
///
/// An offset at the end of a line maps to that line, not the start of the
/// next. Offsets past the end of the text clamp to [`LineLengths::end`].
pub fn from_absolute_offset(lines: &LineLengths, offset: usize) -> Position {
    let mut start = 0;
    for (line, &len) in lines.0.iter().enumerate() {
        if offset <= start + len {
            return Position::new(line, offset - start);
        }
        start += len + 1;
    }
    lines.end()
}

/// Byte index of the `char_index`-th character, clamped to the end of `text`
pub(crate) fn byte_index(text: &str, char_index: usize) -> usize {
    text.char_indices()
        .nth(char_index)
        .map(|(byte, _)| byte)
        .unwrap_or(text.len())
}
