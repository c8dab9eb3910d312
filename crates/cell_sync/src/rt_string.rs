//! The text of one cell, optionally shared with remote peers.
//!
//! [`CollabString`] has two variants behind one interface:
//!
//! - `Passive`: owns its value; edits apply in place and never raise events.
//! - `Collaborative`: delegates to a [`RemoteText`] handle; edits become
//!   visible to peers, and peer edits surface through subscriptions.
//!
//! Callers never branch on the variant. A subscription only ever yields
//! remote-origin events: an edit made through this string is not echoed back
//! to its own subscriptions.

use crate::error::{SyncError, SyncResult};
use crate::position::byte_index;
use crate::remote::{RemoteText, TextEvent, TextEventKind};
use std::fmt;
use tokio::sync::mpsc;

/// A remote edit to replay locally
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StringEvent {
    /// Absolute character offset
    pub index: usize,
    /// Inserted or deleted text
    pub text: String,
    seq: u64,
}

impl StringEvent {
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
            seq: 0,
        }
    }

    /// Position in the shared string's edit history, used to interleave
    /// insert and delete subscriptions in arrival order
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

/// An owned registration for remote insert or delete events.
///
/// Events queue until drained. Dropping the subscription (or calling
/// [`Subscription::close`]) unregisters it.
pub struct Subscription {
    kind: TextEventKind,
    rx: Option<mpsc::UnboundedReceiver<TextEvent>>,
    peeked: Option<StringEvent>,
}

impl Subscription {
    fn remote(kind: TextEventKind, rx: mpsc::UnboundedReceiver<TextEvent>) -> Self {
        Self {
            kind,
            rx: Some(rx),
            peeked: None,
        }
    }

    /// A subscription with no event source, for passive strings
    fn inert(kind: TextEventKind) -> Self {
        Self {
            kind,
            rx: None,
            peeked: None,
        }
    }

    pub fn kind(&self) -> TextEventKind {
        self.kind
    }

    /// Whether this subscription can still receive events
    pub fn is_active(&self) -> bool {
        self.rx.is_some()
    }

    /// The next queued remote event, without consuming it
    pub fn peek(&mut self) -> Option<&StringEvent> {
        if self.peeked.is_none() {
            self.peeked = self.receive();
        }
        self.peeked.as_ref()
    }

    /// Take the next queued remote event
    pub fn next_event(&mut self) -> Option<StringEvent> {
        self.peeked.take().or_else(|| self.receive())
    }

    /// Take every queued remote event
    pub fn drain(&mut self) -> Vec<StringEvent> {
        std::iter::from_fn(|| self.next_event()).collect()
    }

    /// Unregister. Queued events are discarded.
    pub fn close(&mut self) {
        self.peeked = None;
        if let Some(mut rx) = self.rx.take() {
            rx.close();
        }
    }

    fn receive(&mut self) -> Option<StringEvent> {
        let rx = self.rx.as_mut()?;
        while let Ok(event) = rx.try_recv() {
            if event.is_local {
                continue;
            }
            return Some(StringEvent {
                index: event.index,
                text: event.text,
                seq: event.seq,
            });
        }
        None
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("kind", &self.kind)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Single-user string that owns its value
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PassiveString {
    value: String,
}

/// String backed by a remote shared document
pub struct RemoteString {
    handle: Option<Box<dyn RemoteText>>,
}

impl RemoteString {
    fn handle(&self) -> SyncResult<&dyn RemoteText> {
        self.handle.as_deref().ok_or(SyncError::NotReady)
    }
}

impl fmt::Debug for RemoteString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteString")
            .field("ready", &self.handle.is_some())
            .finish()
    }
}

/// The source text of one cell
#[derive(Debug)]
pub enum CollabString {
    Passive(PassiveString),
    Collaborative(RemoteString),
}

impl CollabString {
    /// A single-user string holding `value`
    pub fn passive(value: impl Into<String>) -> Self {
        CollabString::Passive(PassiveString {
            value: value.into(),
        })
    }

    /// A collaborative string bound to `handle`
    pub fn collaborative(handle: impl RemoteText + 'static) -> Self {
        CollabString::Collaborative(RemoteString {
            handle: Some(Box::new(handle)),
        })
    }

    /// A collaborative string whose remote document is still loading.
    ///
    /// Every operation fails with [`SyncError::NotReady`] until
    /// [`CollabString::bind`] is called.
    pub fn loading() -> Self {
        CollabString::Collaborative(RemoteString { handle: None })
    }

    /// Bind a loading collaborative string to its remote handle
    pub fn bind(&mut self, handle: impl RemoteText + 'static) -> SyncResult<()> {
        match self {
            CollabString::Collaborative(remote) if remote.handle.is_none() => {
                remote.handle = Some(Box::new(handle));
                tracing::info!("Collaborative string bound to remote handle");
                Ok(())
            }
            _ => Err(SyncError::AlreadyBound),
        }
    }

    pub fn is_collaborative(&self) -> bool {
        matches!(self, CollabString::Collaborative(_))
    }

    /// False only for a collaborative string that is still loading
    pub fn is_ready(&self) -> bool {
        match self {
            CollabString::Passive(_) => true,
            CollabString::Collaborative(remote) => remote.handle.is_some(),
        }
    }

    /// Current full value
    pub fn read(&self) -> SyncResult<String> {
        match self {
            CollabString::Passive(passive) => Ok(passive.value.clone()),
            CollabString::Collaborative(remote) => Ok(remote.handle()?.text()),
        }
    }

    /// Length in characters
    pub fn len(&self) -> SyncResult<usize> {
        match self {
            CollabString::Passive(passive) => Ok(passive.value.chars().count()),
            CollabString::Collaborative(remote) => Ok(remote.handle()?.len()),
        }
    }

    /// Replace the whole value. Only for full resets, never incremental sync.
    pub fn write(&mut self, value: &str) -> SyncResult<()> {
        match self {
            CollabString::Passive(passive) => passive.value = value.to_string(),
            CollabString::Collaborative(remote) => remote.handle()?.set_text(value),
        }
        Ok(())
    }

    /// Insert `text` at character offset `index` (clamped to the length)
    pub fn insert(&mut self, index: usize, text: &str) -> SyncResult<()> {
        match self {
            CollabString::Passive(passive) => {
                let at = byte_index(&passive.value, index);
                passive.value.insert_str(at, text);
            }
            CollabString::Collaborative(remote) => remote.handle()?.insert_string(index, text),
        }
        Ok(())
    }

    /// Remove characters `from..to`; `to` past the end is clamped
    pub fn delete_range(&mut self, from: usize, to: usize) -> SyncResult<()> {
        if from > to {
            return Err(SyncError::InvalidRange { from, to });
        }
        match self {
            CollabString::Passive(passive) => {
                let start = byte_index(&passive.value, from);
                let end = byte_index(&passive.value, to);
                passive.value.replace_range(start..end, "");
            }
            CollabString::Collaborative(remote) => remote.handle()?.remove_range(from, to),
        }
        Ok(())
    }

    /// Subscribe to remote insertions
    pub fn subscribe_insert(&self) -> SyncResult<Subscription> {
        self.subscribe(TextEventKind::Inserted)
    }

    /// Subscribe to remote deletions
    pub fn subscribe_delete(&self) -> SyncResult<Subscription> {
        self.subscribe(TextEventKind::Deleted)
    }

    fn subscribe(&self, kind: TextEventKind) -> SyncResult<Subscription> {
        match self {
            CollabString::Passive(_) => Ok(Subscription::inert(kind)),
            CollabString::Collaborative(remote) => {
                Ok(Subscription::remote(kind, remote.handle()?.listen(kind)))
            }
        }
    }
}
