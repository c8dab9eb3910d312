//! A notebook being edited: ordered cells, some of them attached to text
//! surfaces.
//!
//! A session is either single-user (built from a [`Notebook`]) or
//! collaborative (built from a shared document). In a shared document the
//! notebook is stored as the fields `metadata`, `nbformat`, `nbformat_minor`
//! and `cells`, the last holding the cell records with empty sources. Each
//! cell's text is a separate shared string named by
//! [`source_string_name`].

use crate::cell::{source_string_name, AttachedCell, Cell, CellInfo};
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::remote::DocumentHandle;
use crate::surface::TextSurface;
use notebook_model::{CellId, CellRecord, Notebook, NotebookMetadata};
use serde_json::Value;

const METADATA_FIELD: &str = "metadata";
const NBFORMAT_FIELD: &str = "nbformat";
const NBFORMAT_MINOR_FIELD: &str = "nbformat_minor";
const CELLS_FIELD: &str = "cells";

/// One cell of a session
pub enum SessionCell<S: TextSurface> {
    Detached(Cell),
    Attached(AttachedCell<S>),
}

impl<S: TextSurface> SessionCell<S> {
    pub fn id(&self) -> &CellId {
        &self.info().id
    }

    pub fn info(&self) -> &CellInfo {
        match self {
            SessionCell::Detached(cell) => cell.info(),
            SessionCell::Attached(cell) => cell.info(),
        }
    }

    pub fn is_attached(&self) -> bool {
        matches!(self, SessionCell::Attached(_))
    }

    pub fn is_ready(&self) -> bool {
        match self {
            SessionCell::Detached(cell) => cell.is_ready(),
            SessionCell::Attached(_) => true,
        }
    }

    /// Current source text
    pub fn source_text(&self) -> SyncResult<String> {
        match self {
            SessionCell::Detached(cell) => cell.source().read(),
            SessionCell::Attached(cell) => cell.engine().source().read(),
        }
    }

    pub fn to_record(&self) -> SyncResult<CellRecord> {
        match self {
            SessionCell::Detached(cell) => cell.to_record(),
            SessionCell::Attached(cell) => cell.to_record(),
        }
    }
}

/// Cells of one notebook plus the notebook-level fields
pub struct NotebookSession<S: TextSurface> {
    metadata: NotebookMetadata,
    nbformat: u32,
    nbformat_minor: u32,
    cells: Vec<SessionCell<S>>,
    document: Option<DocumentHandle>,
    config: SyncConfig,
}

impl<S: TextSurface> NotebookSession<S> {
    /// A single-user session over `notebook`
    pub fn from_notebook(notebook: Notebook, config: SyncConfig) -> Self {
        let cells = notebook
            .cells
            .into_iter()
            .map(|record| SessionCell::Detached(Cell::from_record(record, &config)))
            .collect();
        Self {
            metadata: notebook.metadata,
            nbformat: notebook.nbformat,
            nbformat_minor: notebook.nbformat_minor,
            cells,
            document: None,
            config,
        }
    }

    /// A collaborative session whose shared document is still loading.
    ///
    /// Every cell is pending until [`NotebookSession::finish_loading`].
    pub fn loading(notebook: Notebook, config: SyncConfig) -> Self {
        let cells = notebook
            .cells
            .into_iter()
            .map(|record| SessionCell::Detached(Cell::pending(record)))
            .collect();
        Self {
            metadata: notebook.metadata,
            nbformat: notebook.nbformat,
            nbformat_minor: notebook.nbformat_minor,
            cells,
            document: None,
            config,
        }
    }

    /// Bind pending cells to their shared strings in `document`.
    ///
    /// A missing string is created holding the configured default source.
    /// Returns the number of cells bound.
    pub fn finish_loading(&mut self, document: DocumentHandle) -> SyncResult<usize> {
        let mut bound = 0;
        for slot in &mut self.cells {
            let SessionCell::Detached(cell) = slot else {
                continue;
            };
            if cell.is_ready() {
                continue;
            }
            let name = source_string_name(cell.id());
            let text = document.create_string(name, &self.config.default_cell_source);
            cell.finish_loading(text)?;
            bound += 1;
        }
        tracing::info!(cells = bound, client = %document.client(), "Shared document loaded");
        self.document = Some(document);
        Ok(bound)
    }

    /// Store `notebook` in a shared document so peers can open it with
    /// [`NotebookSession::from_shared_document`]. Existing shared strings
    /// keep their text.
    pub fn publish(notebook: &Notebook, document: &DocumentHandle) -> SyncResult<()> {
        document.set(METADATA_FIELD, serde_json::to_value(&notebook.metadata)?);
        document.set(NBFORMAT_FIELD, Value::from(notebook.nbformat));
        document.set(NBFORMAT_MINOR_FIELD, Value::from(notebook.nbformat_minor));
        for record in &notebook.cells {
            document.create_string(source_string_name(&record.id), &record.source);
        }
        publish_cells(document, notebook.cells.iter().cloned())?;
        tracing::info!(cells = notebook.cells.len(), "Published notebook");
        Ok(())
    }

    /// Open a notebook stored in a shared document.
    ///
    /// Fails with [`SyncError::NotReady`] if the document holds no cell
    /// list yet. A cell whose shared string is missing gets one created from
    /// the record's source.
    pub fn from_shared_document(document: DocumentHandle, config: SyncConfig) -> SyncResult<Self> {
        let records: Vec<CellRecord> = match document.get(CELLS_FIELD) {
            Some(cells) => serde_json::from_value(cells)?,
            None => return Err(SyncError::NotReady),
        };
        let metadata = match document.get(METADATA_FIELD) {
            Some(metadata) => serde_json::from_value(metadata)?,
            None => NotebookMetadata::default(),
        };
        let nbformat = read_u32(&document, NBFORMAT_FIELD).unwrap_or(4);
        let nbformat_minor = read_u32(&document, NBFORMAT_MINOR_FIELD).unwrap_or(0);

        let cells = records
            .into_iter()
            .map(|record| {
                let text = document.create_string(source_string_name(&record.id), &record.source);
                SessionCell::Detached(Cell::bind_remote(record, text))
            })
            .collect::<Vec<_>>();
        tracing::info!(
            cells = cells.len(),
            client = %document.client(),
            "Opened shared notebook"
        );

        Ok(Self {
            metadata,
            nbformat,
            nbformat_minor,
            cells,
            document: Some(document),
            config,
        })
    }

    pub fn is_collaborative(&self) -> bool {
        self.document.is_some()
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cell(&self, index: usize) -> Option<&SessionCell<S>> {
        self.cells.get(index)
    }

    pub fn cell_mut(&mut self, index: usize) -> Option<&mut SessionCell<S>> {
        self.cells.get_mut(index)
    }

    /// Index of the cell with `id`
    pub fn position(&self, id: &CellId) -> Option<usize> {
        self.cells.iter().position(|cell| cell.id() == id)
    }

    /// Insert a new cell at `index` (0..=len).
    ///
    /// In a collaborative session the cell's shared string is created and
    /// the shared cell list is rewritten.
    pub fn insert_cell(&mut self, index: usize, record: CellRecord) -> SyncResult<()> {
        if index > self.cells.len() {
            return Err(SyncError::CellOutOfRange {
                index,
                len: self.cells.len(),
            });
        }

        let cell = match &self.document {
            Some(document) => {
                let text = document.create_string(source_string_name(&record.id), &record.source);
                Cell::bind_remote(record, text)
            }
            None => Cell::from_record(record, &self.config),
        };
        tracing::debug!(index, cell = %cell.id(), "Inserted cell");
        self.cells.insert(index, SessionCell::Detached(cell));

        if let Some(document) = &self.document {
            publish_cells(
                document,
                self.cells
                    .iter()
                    .map(|cell| cell.info().to_record(String::new())),
            )?;
        }
        Ok(())
    }

    /// Attach `surface` to the cell at `index`.
    ///
    /// If attaching fails the cell stays in place, detached, and the surface
    /// is dropped.
    pub fn attach(&mut self, index: usize, surface: S) -> SyncResult<()> {
        match self.slot(index)? {
            SessionCell::Attached(_) => return Err(SyncError::AlreadyAttached(index)),
            SessionCell::Detached(cell) if !cell.is_ready() => return Err(SyncError::NotReady),
            SessionCell::Detached(_) => {}
        }

        let SessionCell::Detached(cell) = self.cells.remove(index) else {
            return Err(SyncError::AlreadyAttached(index));
        };
        match cell.attach(surface, self.config.clone()) {
            Ok(attached) => {
                self.cells.insert(index, SessionCell::Attached(attached));
                Ok(())
            }
            Err((error, cell, _surface)) => {
                self.cells.insert(index, SessionCell::Detached(cell));
                Err(error)
            }
        }
    }

    /// The attached cell at `index`
    pub fn attached_mut(&mut self, index: usize) -> SyncResult<&mut AttachedCell<S>> {
        let len = self.cells.len();
        match self.cells.get_mut(index) {
            Some(SessionCell::Attached(cell)) => Ok(cell),
            Some(SessionCell::Detached(_)) => Err(SyncError::NotAttached(index)),
            None => Err(SyncError::CellOutOfRange { index, len }),
        }
    }

    /// Detach the surface from the cell at `index` and return it
    pub fn detach(&mut self, index: usize) -> SyncResult<S> {
        if let SessionCell::Detached(_) = self.slot(index)? {
            return Err(SyncError::NotAttached(index));
        }
        let SessionCell::Attached(attached) = self.cells.remove(index) else {
            return Err(SyncError::NotAttached(index));
        };
        let (cell, surface) = attached.detach();
        self.cells.insert(index, SessionCell::Detached(cell));
        Ok(surface)
    }

    /// Publish local edits and apply remote edits for every attached cell.
    /// Returns the number of remote events applied.
    pub fn pump(&mut self) -> SyncResult<usize> {
        let mut applied = 0;
        for cell in &mut self.cells {
            if let SessionCell::Attached(cell) = cell {
                applied += cell.engine_mut().pump_remote()?;
            }
        }
        Ok(applied)
    }

    /// Current source text of the cell at `index`
    pub fn source_text(&self, index: usize) -> SyncResult<String> {
        self.slot(index)?.source_text()
    }

    /// Snapshot of the whole notebook with current cell sources
    pub fn to_notebook(&self) -> SyncResult<Notebook> {
        let cells = self
            .cells
            .iter()
            .map(SessionCell::to_record)
            .collect::<SyncResult<Vec<_>>>()?;
        Ok(Notebook {
            metadata: self.metadata.clone(),
            nbformat: self.nbformat,
            nbformat_minor: self.nbformat_minor,
            cells,
        })
    }

    fn slot(&self, index: usize) -> SyncResult<&SessionCell<S>> {
        self.cells.get(index).ok_or(SyncError::CellOutOfRange {
            index,
            len: self.cells.len(),
        })
    }
}

/// Write the shared cell list; sources are carried by the shared strings
fn publish_cells(
    document: &DocumentHandle,
    records: impl Iterator<Item = CellRecord>,
) -> SyncResult<()> {
    let records: Vec<CellRecord> = records
        .map(|record| CellRecord {
            source: String::new(),
            ..record
        })
        .collect();
    document.set(CELLS_FIELD, serde_json::to_value(records)?);
    Ok(())
}

fn read_u32(document: &DocumentHandle, field: &str) -> Option<u32> {
    document
        .get(field)
        .and_then(|value| value.as_u64())
        .and_then(|value| u32::try_from(value).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::{split_lines, ChangeBatch, ChangeRecord};
    use crate::origin::EditOrigin;
    use crate::position::Position;
    use crate::remote::SharedDocument;
    use crate::surface::LineBuffer;

    fn sample() -> Notebook {
        Notebook::with_cells(vec![
            CellRecord::markdown("# Title"),
            CellRecord::code("x = 1\nprint(x)"),
        ])
    }

    #[test]
    fn test_single_user_roundtrip() {
        let notebook = sample();
        let session: NotebookSession<LineBuffer> =
            NotebookSession::from_notebook(notebook.clone(), SyncConfig::default());
        assert!(!session.is_collaborative());
        assert_eq!(session.len(), 2);
        assert_eq!(session.to_notebook().unwrap(), notebook);
    }

    #[test]
    fn test_attach_and_detach() {
        let mut session: NotebookSession<LineBuffer> =
            NotebookSession::from_notebook(sample(), SyncConfig::default());
        session.attach(1, LineBuffer::new()).unwrap();
        assert!(session.cell(1).unwrap().is_attached());
        assert_eq!(
            session.attach(1, LineBuffer::new()),
            Err(SyncError::AlreadyAttached(1))
        );

        let cell = session.attached_mut(1).unwrap();
        cell.engine_mut()
            .surface_mut()
            .replace_range("2", Position::new(0, 4), Position::new(0, 5), EditOrigin::UserInput)
            .unwrap();
        session.pump().unwrap();
        assert_eq!(session.source_text(1).unwrap(), "x = 2\nprint(x)");

        let surface = session.detach(1).unwrap();
        assert_eq!(surface.value(), "x = 2\nprint(x)");
        assert_eq!(session.detach(1).unwrap_err(), SyncError::NotAttached(1));
        assert_eq!(session.attached_mut(0).err(), Some(SyncError::NotAttached(0)));
    }

    /// Surface whose reset reports a range past its own text
    struct MisreportingSurface {
        buffer: LineBuffer,
        pending: Vec<ChangeBatch>,
    }

    impl TextSurface for MisreportingSurface {
        fn line_count(&self) -> usize {
            self.buffer.line_count()
        }

        fn line(&self, index: usize) -> Option<&str> {
            self.buffer.line(index)
        }

        fn value(&self) -> String {
            self.buffer.value()
        }

        fn replace_range(
            &mut self,
            text: &str,
            from: Position,
            to: Position,
            origin: EditOrigin,
        ) -> SyncResult<()> {
            self.buffer.replace_range(text, from, to, origin)
        }

        fn set_value(&mut self, value: &str) {
            self.buffer.set_value(value);
            self.buffer.take_changes();
            self.pending.push(vec![ChangeRecord::new(
                EditOrigin::FullReset,
                Position::default(),
                Position::new(7, 0),
                split_lines(value),
                vec![String::new()],
            )]);
        }

        fn take_changes(&mut self) -> Vec<ChangeBatch> {
            let mut batches: Vec<ChangeBatch> = self.pending.drain(..).collect();
            batches.extend(self.buffer.take_changes());
            batches
        }
    }

    #[test]
    fn test_failed_attach_keeps_cell() {
        let notebook = Notebook::with_cells(vec![CellRecord::code("a"), CellRecord::code("b")]);
        let mut session: NotebookSession<MisreportingSurface> =
            NotebookSession::from_notebook(notebook.clone(), SyncConfig::default());

        let surface = MisreportingSurface {
            buffer: LineBuffer::new(),
            pending: Vec::new(),
        };
        assert_eq!(
            session.attach(0, surface),
            Err(SyncError::InvalidPosition { line: 7, column: 0 })
        );

        assert_eq!(session.len(), 2);
        assert!(!session.cell(0).unwrap().is_attached());
        assert_eq!(session.source_text(0).unwrap(), "a");
        assert_eq!(session.to_notebook().unwrap(), notebook);
    }

    #[test]
    fn test_out_of_range() {
        let mut session: NotebookSession<LineBuffer> =
            NotebookSession::from_notebook(sample(), SyncConfig::default());
        assert_eq!(
            session.attach(5, LineBuffer::new()),
            Err(SyncError::CellOutOfRange { index: 5, len: 2 })
        );
        assert_eq!(
            session.insert_cell(3, CellRecord::code("")),
            Err(SyncError::CellOutOfRange { index: 3, len: 2 })
        );
        assert_eq!(
            session.attached_mut(7).err(),
            Some(SyncError::CellOutOfRange { index: 7, len: 2 })
        );
    }

    #[test]
    fn test_publish_and_open() {
        let doc = SharedDocument::new();
        let notebook = sample();
        NotebookSession::<LineBuffer>::publish(&notebook, &doc.connect(1)).unwrap();

        let stored = doc.connect(9).get(CELLS_FIELD).unwrap();
        assert_eq!(stored[1]["source"], "");

        let session: NotebookSession<LineBuffer> =
            NotebookSession::from_shared_document(doc.connect(2), SyncConfig::default()).unwrap();
        assert!(session.is_collaborative());
        assert_eq!(session.to_notebook().unwrap(), notebook);
    }

    #[test]
    fn test_open_empty_document_is_not_ready() {
        let doc = SharedDocument::new();
        let result =
            NotebookSession::<LineBuffer>::from_shared_document(doc.connect(1), SyncConfig::default());
        assert!(matches!(result, Err(SyncError::NotReady)));
    }

    #[test]
    fn test_insert_cell_in_shared_document() {
        let doc = SharedDocument::new();
        NotebookSession::<LineBuffer>::publish(&sample(), &doc.connect(1)).unwrap();
        let mut alice: NotebookSession<LineBuffer> =
            NotebookSession::from_shared_document(doc.connect(1), SyncConfig::default()).unwrap();

        let record = CellRecord::code("y = 2");
        let id = record.id.clone();
        alice.insert_cell(1, record).unwrap();

        let bob: NotebookSession<LineBuffer> =
            NotebookSession::from_shared_document(doc.connect(2), SyncConfig::default()).unwrap();
        assert_eq!(bob.len(), 3);
        assert_eq!(bob.position(&id), Some(1));
        assert_eq!(bob.source_text(1).unwrap(), "y = 2");
    }

    #[test]
    fn test_loading_session() {
        let notebook = sample();
        let mut session: NotebookSession<LineBuffer> =
            NotebookSession::loading(notebook.clone(), SyncConfig::default());
        assert!(!session.cell(0).unwrap().is_ready());
        assert_eq!(session.attach(0, LineBuffer::new()), Err(SyncError::NotReady));
        assert_eq!(session.to_notebook(), Err(SyncError::NotReady));

        let doc = SharedDocument::new();
        NotebookSession::<LineBuffer>::publish(&notebook, &doc.connect(1)).unwrap();
        assert_eq!(session.finish_loading(doc.connect(2)).unwrap(), 2);
        assert_eq!(session.to_notebook().unwrap(), notebook);
        session.attach(0, LineBuffer::new()).unwrap();
    }
}
