//! Cell synchronization for realtime collaborative notebooks.
//!
//! This crate keeps the text shown in a cell editor consistent with a cell
//! source that may be shared with remote peers. Local edits are published to
//! the shared string; remote edits are replayed into the editor without
//! being published again.
//!
//! # Modules
//!
//! - `position`: line/column positions and absolute character offsets
//! - `change`: change records reported by a text surface
//! - `origin`: edit origins and the forward/suppress classifier
//! - `remote`: the remote document contract and an in-memory document
//! - `rt_string`: passive and collaborative cell source strings
//! - `surface`: the text surface contract and a line buffer
//! - `sync`: the engine moving edits in both directions
//! - `cell`: cells whose source is a collaborative string
//! - `session`: a notebook of cells, single-user or shared
//! - `config`: synchronization settings
//! - `error`: error types for this crate
//!
//! # Example
//!
//! ```
//! use cell_sync::{
//!     CollabString, EditOrigin, LineBuffer, Position, SharedDocument, SyncConfig, SyncEngine,
//!     TextSurface,
//! };
//!
//! let doc = SharedDocument::new();
//! let alice_text = doc.connect(1).create_string("cells/a/source", "hello");
//! let bob_text = doc.connect(2).string("cells/a/source").unwrap();
//!
//! let mut alice = SyncEngine::attach(
//!     LineBuffer::new(),
//!     CollabString::collaborative(alice_text),
//!     SyncConfig::default(),
//! )
//! .unwrap();
//! let mut bob = SyncEngine::attach(
//!     LineBuffer::new(),
//!     CollabString::collaborative(bob_text),
//!     SyncConfig::default(),
//! )
//! .unwrap();
//!
//! // Alice types; the edit reaches the shared string
//! alice
//!     .surface_mut()
//!     .replace_range(" world", Position::new(0, 5), Position::new(0, 5), EditOrigin::UserInput)
//!     .unwrap();
//! alice.pump_local().unwrap();
//!
//! // Bob's editor catches up
//! bob.pump_remote().unwrap();
//! assert_eq!(bob.surface().value(), "hello world");
//! ```

pub mod cell;
pub mod change;
pub mod config;
pub mod error;
pub mod origin;
pub mod position;
pub mod remote;
pub mod rt_string;
pub mod session;
pub mod surface;
pub mod sync;

// Re-export commonly used types
pub use cell::{source_string_name, AttachedCell, Cell, CellInfo};
pub use change::{bottom_to_top, split_lines, ChangeBatch, ChangeRecord};
pub use config::SyncConfig;
pub use error::{SyncError, SyncResult};
pub use origin::{classify, Disposition, EditOrigin};
pub use position::{from_absolute_offset, to_absolute_offset, LineLengths, Position};
pub use remote::{ClientId, DocumentHandle, RemoteText, SharedDocument, SharedText, TextEvent, TextEventKind};
pub use rt_string::{CollabString, StringEvent, Subscription};
pub use session::{NotebookSession, SessionCell};
pub use surface::{LineBuffer, RangeMark, SurfaceEdit, TextSurface};
pub use sync::{AttachError, SyncEngine, SyncStats};
