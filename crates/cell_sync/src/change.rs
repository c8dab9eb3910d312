//! Change records reported by a text surface.

use crate::origin::EditOrigin;
use crate::position::Position;
use serde::{Deserialize, Serialize};

/// One mutation of a text surface.
///
/// `inserted` and `removed` are split on newlines: `["ab", "c"]` is the text
/// `"ab\nc"`. A pure insertion removes `[""]` (or nothing).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub origin: EditOrigin,
    pub from: Position,
    pub to: Position,
    pub inserted: Vec<String>,
    pub removed: Vec<String>,
}

/// All records reported for one surface operation, in reported order.
///
/// Every record's coordinates refer to the text as it was before the batch.
pub type ChangeBatch = Vec<ChangeRecord>;

impl ChangeRecord {
    pub fn new(
        origin: EditOrigin,
        from: Position,
        to: Position,
        inserted: Vec<String>,
        removed: Vec<String>,
    ) -> Self {
        Self {
            origin,
            from,
            to,
            inserted,
            removed,
        }
    }

    /// Insertion of `text` at `at`
    pub fn insertion(origin: EditOrigin, at: Position, text: &str) -> Self {
        Self::new(origin, at, at, split_lines(text), vec![String::new()])
    }

    /// The inserted text, lines joined with `\n`
    pub fn inserted_text(&self) -> String {
        self.inserted.join("\n")
    }

    /// The removed text, lines joined with `\n`
    pub fn removed_text(&self) -> String {
        self.removed.join("\n")
    }

    /// Number of removed characters, each line boundary counting as one
    pub fn removed_len(&self) -> usize {
        if self.removed.is_empty() {
            return 0;
        }
        let chars: usize = self.removed.iter().map(|line| line.chars().count()).sum();
        chars + self.removed.len() - 1
    }
}

/// Split text into lines the way change records store it
pub fn split_lines(text: &str) -> Vec<String> {
    text.split('\n').map(str::to_string).collect()
}

/// Order in which to apply edits that share one pre-batch snapshot:
/// bottom-to-top, so applying one never moves the text under the next.
///
/// `range` gives each edit's `(from, to)`. Among edits starting at the same
/// position the longer range goes first, so an insertion there never lands
/// inside a pending deletion. Identical ranges keep their reported order.
pub fn bottom_to_top<T>(items: &[T], range: impl Fn(&T) -> (Position, Position)) -> Vec<usize> {
    let mut order: Vec<usize> = (0..items.len()).collect();
    order.sort_by(|&a, &b| range(&items[b]).cmp(&range(&items[a])));
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removed_len_counts_line_breaks() {
        let record = ChangeRecord::new(
            EditOrigin::Delete,
            Position::new(1, 2),
            Position::new(2, 2),
            vec![String::new()],
            vec!["ne2".to_string(), "li".to_string()],
        );
        assert_eq!(record.removed_len(), 6);
        assert_eq!(record.removed_text(), "ne2\nli");
    }

    #[test]
    fn test_insertion_removes_nothing() {
        let record = ChangeRecord::insertion(EditOrigin::Paste, Position::new(0, 0), "a\nb");
        assert_eq!(record.inserted, vec!["a", "b"]);
        assert_eq!(record.inserted_text(), "a\nb");
        assert_eq!(record.removed_len(), 0);
    }

    #[test]
    fn test_bottom_to_top_is_stable() {
        let positions = [
            Position::new(0, 1),
            Position::new(2, 0),
            Position::new(0, 1),
            Position::new(1, 4),
        ];
        assert_eq!(bottom_to_top(&positions, |p| (*p, *p)), vec![1, 3, 0, 2]);
    }

    #[test]
    fn test_bottom_to_top_deletion_before_insertion_at_same_start() {
        let insert = (Position::new(0, 3), Position::new(0, 3));
        let delete = (Position::new(0, 3), Position::new(0, 5));
        assert_eq!(bottom_to_top(&[insert, delete], |r| *r), vec![1, 0]);
    }
}
