//! Remote document service contract and an in-memory implementation.
//!
//! A realtime document service hands each peer a handle onto a shared
//! document holding named fields and named shared strings. Edits through any
//! handle are visible to every handle; listeners receive an event for every
//! edit, flagged `is_local` when the edit was made through the listener's own
//! handle.
//!
//! [`SharedDocument`] keeps everything in one process, which is what tests
//! and single-process hosts need. Replication between processes is the
//! service's concern, not this crate's.

use crate::error::{SyncError, SyncResult};
use crate::position::byte_index;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use tokio::sync::mpsc;

/// Identifies a peer connected to a shared document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClientId(pub u64);

impl ClientId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Client({})", self.0)
    }
}

impl From<u64> for ClientId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Kind of change a shared string reports
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextEventKind {
    Inserted,
    Deleted,
}

/// A change to a shared string as seen by one listener
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextEvent {
    pub kind: TextEventKind,
    /// Absolute character offset of the change
    pub index: usize,
    /// Inserted or deleted text
    pub text: String,
    /// True when the edit was made through the listener's own handle
    pub is_local: bool,
    /// Position of this edit in the string's edit history
    pub seq: u64,
}

/// The string handle a collaborative string talks to.
///
/// Offsets are in characters. Methods take `&self`: the handle is shared
/// with the service and with peers.
pub trait RemoteText {
    /// Current full text
    fn text(&self) -> String;

    /// Replace the whole text
    fn set_text(&self, text: &str);

    /// Insert `text` at `index` (clamped to the length)
    fn insert_string(&self, index: usize, text: &str);

    /// Remove characters `from..to` (clamped to the length)
    fn remove_range(&self, from: usize, to: usize);

    /// Length in characters
    fn len(&self) -> usize {
        self.text().chars().count()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Register for events of `kind`. Dropping the receiver unregisters.
    fn listen(&self, kind: TextEventKind) -> mpsc::UnboundedReceiver<TextEvent>;
}

struct Listener {
    owner: ClientId,
    kind: TextEventKind,
    tx: mpsc::UnboundedSender<TextEvent>,
}

#[derive(Default)]
struct StringState {
    text: String,
    seq: u64,
    listeners: Vec<Listener>,
}

impl StringState {
    fn broadcast(&mut self, origin: ClientId, kind: TextEventKind, index: usize, text: &str) {
        self.seq += 1;
        let seq = self.seq;
        self.listeners.retain(|listener| {
            if listener.kind != kind {
                return !listener.tx.is_closed();
            }
            let event = TextEvent {
                kind,
                index,
                text: text.to_string(),
                is_local: listener.owner == origin,
                seq,
            };
            listener.tx.send(event).is_ok()
        });
    }
}

#[derive(Default)]
struct DocumentState {
    fields: HashMap<String, serde_json::Value>,
    strings: HashMap<String, Rc<RefCell<StringState>>>,
}

/// An in-memory shared document.
///
/// Cloning yields another reference to the same document.
#[derive(Clone, Default)]
pub struct SharedDocument {
    state: Rc<RefCell<DocumentState>>,
}

impl SharedDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a handle for peer `client`
    pub fn connect(&self, client: u64) -> DocumentHandle {
        DocumentHandle {
            document: self.clone(),
            client: ClientId::new(client),
        }
    }
}

impl fmt::Debug for SharedDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("SharedDocument")
            .field("fields", &state.fields.len())
            .field("strings", &state.strings.len())
            .finish()
    }
}

/// One peer's view of a [`SharedDocument`]
#[derive(Clone, Debug)]
pub struct DocumentHandle {
    document: SharedDocument,
    client: ClientId,
}

impl DocumentHandle {
    pub fn client(&self) -> ClientId {
        self.client
    }

    /// Read a named field
    pub fn get(&self, name: &str) -> Option<serde_json::Value> {
        self.document.state.borrow().fields.get(name).cloned()
    }

    /// Write a named field
    pub fn set(&self, name: impl Into<String>, value: serde_json::Value) {
        self.document
            .state
            .borrow_mut()
            .fields
            .insert(name.into(), value);
    }

    pub fn has_string(&self, name: &str) -> bool {
        self.document.state.borrow().strings.contains_key(name)
    }

    /// Create a shared string holding `initial`.
    ///
    /// An existing string of that name is left untouched and returned.
    pub fn create_string(&self, name: impl Into<String>, initial: &str) -> SharedText {
        let name = name.into();
        let state = self
            .document
            .state
            .borrow_mut()
            .strings
            .entry(name)
            .or_insert_with(|| {
                Rc::new(RefCell::new(StringState {
                    text: initial.to_string(),
                    ..StringState::default()
                }))
            })
            .clone();
        SharedText {
            state,
            client: self.client,
        }
    }

    /// Open an existing shared string
    pub fn string(&self, name: &str) -> SyncResult<SharedText> {
        let state = self
            .document
            .state
            .borrow()
            .strings
            .get(name)
            .cloned()
            .ok_or_else(|| SyncError::StringNotFound(name.to_string()))?;
        Ok(SharedText {
            state,
            client: self.client,
        })
    }
}

/// One peer's handle onto a shared string
#[derive(Clone)]
pub struct SharedText {
    state: Rc<RefCell<StringState>>,
    client: ClientId,
}

impl SharedText {
    pub fn client(&self) -> ClientId {
        self.client
    }

    /// Number of registered listeners still alive
    pub fn listener_count(&self) -> usize {
        self.state
            .borrow()
            .listeners
            .iter()
            .filter(|listener| !listener.tx.is_closed())
            .count()
    }
}

impl fmt::Debug for SharedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedText")
            .field("client", &self.client)
            .field("text", &self.state.borrow().text)
            .finish()
    }
}

impl RemoteText for SharedText {
    fn text(&self) -> String {
        self.state.borrow().text.clone()
    }

    fn set_text(&self, text: &str) {
        let mut state = self.state.borrow_mut();
        let old = std::mem::take(&mut state.text);
        if !old.is_empty() {
            state.broadcast(self.client, TextEventKind::Deleted, 0, &old);
        }
        state.text = text.to_string();
        if !text.is_empty() {
            state.broadcast(self.client, TextEventKind::Inserted, 0, text);
        }
    }

    fn insert_string(&self, index: usize, text: &str) {
        if text.is_empty() {
            return;
        }
        let mut state = self.state.borrow_mut();
        let len = state.text.chars().count();
        let index = index.min(len);
        let at = byte_index(&state.text, index);
        state.text.insert_str(at, text);
        state.broadcast(self.client, TextEventKind::Inserted, index, text);
    }

    fn remove_range(&self, from: usize, to: usize) {
        let mut state = self.state.borrow_mut();
        let len = state.text.chars().count();
        let to = to.min(len);
        if from >= to {
            return;
        }
        let start = byte_index(&state.text, from);
        let end = byte_index(&state.text, to);
        let removed: String = state.text.drain(start..end).collect();
        state.broadcast(self.client, TextEventKind::Deleted, from, &removed);
    }

    fn listen(&self, kind: TextEventKind) -> mpsc::UnboundedReceiver<TextEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state.borrow_mut().listeners.push(Listener {
            owner: self.client,
            kind,
            tx,
        });
        rx
    }
}
