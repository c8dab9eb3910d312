//! Text surface contract and an in-memory line buffer.
//!
//! A text surface is the line-structured editing widget a cell is shown in.
//! Every mutation is reported as a [`ChangeBatch`] carrying the origin the
//! mutator supplied, which is how the sync engine tells its own replays apart
//! from user edits.

use crate::change::{bottom_to_top, split_lines, ChangeBatch, ChangeRecord};
use crate::error::{SyncError, SyncResult};
use crate::origin::EditOrigin;
use crate::position::{byte_index, to_absolute_offset, LineLengths, Position};
use std::collections::VecDeque;

/// A visual marker over a range of text
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RangeMark {
    pub from: Position,
    pub to: Position,
    /// CSS applied to the range
    pub style: String,
    /// Tooltip
    pub title: String,
}

/// The editing widget a cell's text is shown in
pub trait TextSurface {
    fn line_count(&self) -> usize;

    fn line(&self, index: usize) -> Option<&str>;

    /// Full text, lines joined with `\n`
    fn value(&self) -> String;

    /// Replace `from..to` with `text`, reporting the change tagged `origin`
    fn replace_range(
        &mut self,
        text: &str,
        from: Position,
        to: Position,
        origin: EditOrigin,
    ) -> SyncResult<()>;

    /// Replace the whole value, reporting a [`EditOrigin::FullReset`] change
    fn set_value(&mut self, value: &str);

    /// Take every change batch reported since the last call, oldest first
    fn take_changes(&mut self) -> Vec<ChangeBatch>;

    /// Highlight a range. Surfaces without decorations ignore this.
    fn mark_range(&mut self, _mark: RangeMark) {}

    /// Snapshot of the current line lengths
    fn line_lengths(&self) -> LineLengths {
        LineLengths::from_lengths(
            (0..self.line_count()).map(|i| self.line(i).map_or(0, |line| line.chars().count())),
        )
    }
}

/// One edit of a multi-cursor operation, in pre-operation coordinates
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SurfaceEdit {
    pub from: Position,
    pub to: Position,
    pub text: String,
}

impl SurfaceEdit {
    pub fn new(from: Position, to: Position, text: impl Into<String>) -> Self {
        Self {
            from,
            to,
            text: text.into(),
        }
    }

    pub fn insert(at: Position, text: impl Into<String>) -> Self {
        Self::new(at, at, text)
    }

    pub fn delete(from: Position, to: Position) -> Self {
        Self::new(from, to, "")
    }
}

/// In-memory text surface storing one `String` per line
#[derive(Clone, Debug)]
pub struct LineBuffer {
    lines: Vec<String>,
    pending: VecDeque<ChangeBatch>,
    marks: Vec<RangeMark>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::from_text("")
    }

    /// A buffer holding `text`. Nothing is reported for the initial value.
    pub fn from_text(text: &str) -> Self {
        Self {
            lines: split_lines(text),
            pending: VecDeque::new(),
            marks: Vec::new(),
        }
    }

    /// Marks placed on this buffer, oldest first
    pub fn marks(&self) -> &[RangeMark] {
        &self.marks
    }

    /// Apply several edits as one operation (multi-cursor editing).
    ///
    /// All edit coordinates refer to the text before the operation, and
    /// ranges must not overlap. The reported batch lists one record per edit
    /// in the order given.
    pub fn apply_batch(&mut self, edits: Vec<SurfaceEdit>, origin: EditOrigin) -> SyncResult<()> {
        let lengths = self.line_lengths();
        for edit in &edits {
            lengths.validate(edit.from)?;
            lengths.validate(edit.to)?;
            if edit.to < edit.from {
                return Err(SyncError::InvalidRange {
                    from: to_absolute_offset(&lengths, edit.from)?,
                    to: to_absolute_offset(&lengths, edit.to)?,
                });
            }
        }

        let mut sorted: Vec<&SurfaceEdit> = edits.iter().collect();
        sorted.sort_by_key(|edit| (edit.from, edit.to));
        for pair in sorted.windows(2) {
            if pair[0].to > pair[1].from {
                return Err(SyncError::InvalidRange {
                    from: to_absolute_offset(&lengths, pair[1].from)?,
                    to: to_absolute_offset(&lengths, pair[0].to)?,
                });
            }
        }

        let mut records: Vec<Option<ChangeRecord>> = vec![None; edits.len()];
        for index in bottom_to_top(&edits, |edit| (edit.from, edit.to)) {
            let edit = &edits[index];
            if edit.from == edit.to && edit.text.is_empty() {
                continue;
            }
            let removed = self.splice(edit.from, edit.to, &edit.text);
            records[index] = Some(ChangeRecord::new(
                origin.clone(),
                edit.from,
                edit.to,
                split_lines(&edit.text),
                removed,
            ));
        }

        let batch: ChangeBatch = records.into_iter().flatten().collect();
        if !batch.is_empty() {
            self.pending.push_back(batch);
        }
        Ok(())
    }

    /// Replace `from..to` with `text`; positions already validated.
    /// Returns the removed lines.
    fn splice(&mut self, from: Position, to: Position, text: &str) -> Vec<String> {
        let start_line = &self.lines[from.line];
        let end_line = &self.lines[to.line];
        let head_end = byte_index(start_line, from.column);
        let tail_start = byte_index(end_line, to.column);

        let head = start_line[..head_end].to_string();
        let tail = end_line[tail_start..].to_string();

        let removed = if from.line == to.line {
            vec![start_line[head_end..tail_start].to_string()]
        } else {
            let mut removed = vec![start_line[head_end..].to_string()];
            removed.extend(self.lines[from.line + 1..to.line].iter().cloned());
            removed.push(end_line[..tail_start].to_string());
            removed
        };

        let mut replacement = split_lines(text);
        replacement[0].insert_str(0, &head);
        if let Some(last) = replacement.last_mut() {
            last.push_str(&tail);
        }
        self.lines.splice(from.line..=to.line, replacement);
        removed
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextSurface for LineBuffer {
    fn line_count(&self) -> usize {
        self.lines.len()
    }

    fn line(&self, index: usize) -> Option<&str> {
        self.lines.get(index).map(String::as_str)
    }

    fn value(&self) -> String {
        self.lines.join("\n")
    }

    fn replace_range(
        &mut self,
        text: &str,
        from: Position,
        to: Position,
        origin: EditOrigin,
    ) -> SyncResult<()> {
        self.apply_batch(vec![SurfaceEdit::new(from, to, text)], origin)
    }

    fn set_value(&mut self, value: &str) {
        let removed = std::mem::replace(&mut self.lines, split_lines(value));
        let to = LineLengths::from_lengths(removed.iter().map(|line| line.chars().count())).end();
        self.marks.clear();
        self.pending.push_back(vec![ChangeRecord::new(
            EditOrigin::FullReset,
            Position::default(),
            to,
            split_lines(value),
            removed,
        )]);
    }

    fn take_changes(&mut self) -> Vec<ChangeBatch> {
        self.pending.drain(..).collect()
    }

    fn mark_range(&mut self, mark: RangeMark) {
        self.marks.push(mark);
    }
}
