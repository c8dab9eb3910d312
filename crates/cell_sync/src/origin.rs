//! Edit origins and the change classifier.
//!
//! A text surface cannot tell a user keystroke from an edit the sync engine
//! made to mirror a peer, except through the origin tag attached by whoever
//! performed the mutation. The tag is trusted as given and never re-derived.

use crate::change::ChangeRecord;
use serde::{Deserialize, Serialize};

/// Who or what caused a text surface mutation
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EditOrigin {
    UserInput,
    Paste,
    Composition,
    Delete,
    Cut,
    Drag,
    Undo,
    Redo,
    /// The sync engine mirroring a peer's edit
    RemoteReplay,
    /// Wholesale replacement of the surface value
    FullReset,
    /// A surface tag this crate does not know
    Unrecognized(String),
}

impl EditOrigin {
    /// Parse a raw surface tag such as `+input`, `*compose` or `setValue`.
    ///
    /// A single leading `+` or `*` (edit-merging hints) is ignored.
    pub fn from_tag(tag: &str) -> Self {
        let name = tag
            .strip_prefix('+')
            .or_else(|| tag.strip_prefix('*'))
            .unwrap_or(tag);
        match name {
            "input" => EditOrigin::UserInput,
            "paste" => EditOrigin::Paste,
            "compose" => EditOrigin::Composition,
            "delete" => EditOrigin::Delete,
            "cut" => EditOrigin::Cut,
            "drag" => EditOrigin::Drag,
            "undo" => EditOrigin::Undo,
            "redo" => EditOrigin::Redo,
            "remote_sync" => EditOrigin::RemoteReplay,
            "setValue" => EditOrigin::FullReset,
            _ => EditOrigin::Unrecognized(tag.to_string()),
        }
    }

    /// The canonical surface tag for this origin
    pub fn tag(&self) -> &str {
        match self {
            EditOrigin::UserInput => "+input",
            EditOrigin::Paste => "paste",
            EditOrigin::Composition => "*compose",
            EditOrigin::Delete => "+delete",
            EditOrigin::Cut => "cut",
            EditOrigin::Drag => "drag",
            EditOrigin::Undo => "undo",
            EditOrigin::Redo => "redo",
            EditOrigin::RemoteReplay => "+remote_sync",
            EditOrigin::FullReset => "setValue",
            EditOrigin::Unrecognized(tag) => tag,
        }
    }

    /// Whether the edit came from the local user and must reach peers
    pub fn is_local(&self) -> bool {
        disposition(self) == Disposition::Forward
    }
}

impl std::fmt::Display for EditOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// What the sync engine does with a change record
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    /// Replay into the collaborative string
    Forward,
    /// Drop; the collaborative string already has it or must never see it
    Suppress,
}

fn disposition(origin: &EditOrigin) -> Disposition {
    match origin {
        EditOrigin::UserInput
        | EditOrigin::Paste
        | EditOrigin::Composition
        | EditOrigin::Delete
        | EditOrigin::Cut
        | EditOrigin::Drag
        | EditOrigin::Undo
        | EditOrigin::Redo => Disposition::Forward,
        EditOrigin::RemoteReplay | EditOrigin::FullReset | EditOrigin::Unrecognized(_) => {
            Disposition::Suppress
        }
    }
}

/// Classify a change record by its origin tag.
///
/// Unrecognized origins are suppressed so an unknown surface behavior can
/// never loop an internal mutation back to peers.
pub fn classify(record: &ChangeRecord) -> Disposition {
    if let EditOrigin::Unrecognized(tag) = &record.origin {
        tracing::warn!(
            tag = %tag,
            from = %record.from,
            to = %record.to,
            "Unrecognized edit origin, not forwarding change"
        );
    }
    disposition(&record.origin)
}
