//! Notebook cells whose source text lives in a [`CollabString`].

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::remote::RemoteText;
use crate::rt_string::CollabString;
use crate::surface::TextSurface;
use crate::sync::{AttachError, SyncEngine};
use notebook_model::{CellId, CellKind, CellMetadata, CellRecord, Output};

/// Name of the shared string holding a cell's source
pub fn source_string_name(id: &CellId) -> String {
    format!("cells/{}/source", id)
}

/// Everything about a cell except its source text
#[derive(Debug, Clone, PartialEq)]
pub struct CellInfo {
    pub id: CellId,
    pub kind: CellKind,
    pub metadata: CellMetadata,
    pub outputs: Vec<Output>,
    pub execution_count: Option<u32>,
}

impl CellInfo {
    fn split(record: CellRecord) -> (Self, String) {
        let info = Self {
            id: record.id,
            kind: record.cell_type,
            metadata: record.metadata,
            outputs: record.outputs,
            execution_count: record.execution_count,
        };
        (info, record.source)
    }

    pub(crate) fn to_record(&self, source: String) -> CellRecord {
        CellRecord {
            id: self.id.clone(),
            cell_type: self.kind,
            source,
            metadata: self.metadata.clone(),
            outputs: self.outputs.clone(),
            execution_count: self.execution_count,
        }
    }
}

/// A cell that is not attached to a text surface
#[derive(Debug)]
pub struct Cell {
    info: CellInfo,
    source: CollabString,
}

impl Cell {
    /// A single-user cell. An empty source is replaced by the configured
    /// default.
    pub fn from_record(record: CellRecord, config: &SyncConfig) -> Self {
        let (info, mut source) = CellInfo::split(record);
        if source.is_empty() {
            source = config.default_cell_source.clone();
        }
        Self {
            info,
            source: CollabString::passive(source),
        }
    }

    /// A cell whose source is the shared string behind `remote`. The
    /// record's own source text is ignored.
    pub fn bind_remote(record: CellRecord, remote: impl RemoteText + 'static) -> Self {
        let (info, _) = CellInfo::split(record);
        Self {
            info,
            source: CollabString::collaborative(remote),
        }
    }

    /// A collaborative cell whose remote document has not loaded yet
    pub fn pending(record: CellRecord) -> Self {
        let (info, _) = CellInfo::split(record);
        Self {
            info,
            source: CollabString::loading(),
        }
    }

    /// Bind a pending cell once its remote string is available
    pub fn finish_loading(&mut self, remote: impl RemoteText + 'static) -> SyncResult<()> {
        self.source.bind(remote)?;
        tracing::debug!(cell = %self.info.id, "Cell source loaded");
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.source.is_ready()
    }

    pub fn id(&self) -> &CellId {
        &self.info.id
    }

    pub fn kind(&self) -> CellKind {
        self.info.kind
    }

    pub fn info(&self) -> &CellInfo {
        &self.info
    }

    pub fn source(&self) -> &CollabString {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut CollabString {
        &mut self.source
    }

    /// Replace the outputs. Non-executable cells keep none.
    pub fn set_outputs(&mut self, outputs: Vec<Output>) {
        set_outputs(&mut self.info, outputs);
    }

    /// The cell as an nbformat record, with its current source text
    pub fn to_record(&self) -> SyncResult<CellRecord> {
        Ok(self.info.to_record(self.source.read()?))
    }

    /// Attach a text surface to this cell's source.
    ///
    /// On failure the cell and the surface are handed back with the error,
    /// so a caller holding the cell in a list can put it back.
    pub fn attach<S: TextSurface>(
        self,
        surface: S,
        config: SyncConfig,
    ) -> Result<AttachedCell<S>, (SyncError, Cell, S)> {
        let Cell { info, source } = self;
        match SyncEngine::try_attach(surface, source, config) {
            Ok(engine) => {
                tracing::debug!(cell = %info.id, "Cell attached");
                Ok(AttachedCell { info, engine })
            }
            Err(AttachError {
                error,
                surface,
                source,
            }) => Err((error, Cell { info, source }, surface)),
        }
    }
}

/// A cell whose source is being edited through a text surface
pub struct AttachedCell<S: TextSurface> {
    info: CellInfo,
    engine: SyncEngine<S>,
}

impl<S: TextSurface> AttachedCell<S> {
    pub fn id(&self) -> &CellId {
        &self.info.id
    }

    pub fn info(&self) -> &CellInfo {
        &self.info
    }

    pub fn engine(&self) -> &SyncEngine<S> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut SyncEngine<S> {
        &mut self.engine
    }

    pub fn set_outputs(&mut self, outputs: Vec<Output>) {
        set_outputs(&mut self.info, outputs);
    }

    pub fn to_record(&self) -> SyncResult<CellRecord> {
        Ok(self.info.to_record(self.engine.source().read()?))
    }

    /// Detach the surface, returning the cell and the surface
    pub fn detach(self) -> (Cell, S) {
        let (surface, source) = self.engine.detach();
        tracing::debug!(cell = %self.info.id, "Cell detached");
        (
            Cell {
                info: self.info,
                source,
            },
            surface,
        )
    }
}

fn set_outputs(info: &mut CellInfo, outputs: Vec<Output>) {
    if info.kind.is_executable() {
        info.outputs = outputs;
    } else {
        info.outputs.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use crate::origin::EditOrigin;
    use crate::position::Position;
    use crate::remote::SharedDocument;
    use crate::surface::LineBuffer;

    #[test]
    fn test_from_record_uses_default_source() {
        let config = SyncConfig::default().with_default_cell_source("# new cell");
        let cell = Cell::from_record(CellRecord::code(""), &config);
        assert_eq!(cell.source().read().unwrap(), "# new cell");

        let cell = Cell::from_record(CellRecord::code("x = 1"), &config);
        assert_eq!(cell.source().read().unwrap(), "x = 1");
    }

    #[test]
    fn test_to_record_reads_live_source() {
        let doc = SharedDocument::new();
        let record = CellRecord::code("ignored");
        let name = source_string_name(&record.id);
        let text = doc.connect(1).create_string(name, "print(1)");
        let cell = Cell::bind_remote(record.clone(), text);

        let out = cell.to_record().unwrap();
        assert_eq!(out.id, record.id);
        assert_eq!(out.source, "print(1)");
    }

    #[test]
    fn test_pending_cell() {
        let record = CellRecord::markdown("# Title");
        let mut cell = Cell::pending(record.clone());
        assert!(!cell.is_ready());
        assert_eq!(cell.to_record(), Err(SyncError::NotReady));

        let doc = SharedDocument::new();
        let text = doc.connect(1).create_string(source_string_name(cell.id()), "# Title");
        cell.finish_loading(text).unwrap();
        assert!(cell.is_ready());
        assert_eq!(cell.to_record().unwrap(), record);
    }

    #[test]
    fn test_markdown_cells_drop_outputs() {
        let mut cell = Cell::from_record(CellRecord::markdown("hi"), &SyncConfig::default());
        cell.set_outputs(vec![Output::stream("stdout", "x")]);
        assert!(cell.info().outputs.is_empty());
    }

    #[test]
    fn test_attach_edit_detach() {
        let cell = Cell::from_record(CellRecord::code("a = 1"), &SyncConfig::default());
        let mut attached = cell
            .attach(LineBuffer::new(), SyncConfig::default())
            .map_err(|(error, _, _)| error)
            .unwrap();
        attached
            .engine_mut()
            .surface_mut()
            .replace_range("b", Position::new(0, 0), Position::new(0, 1), EditOrigin::UserInput)
            .unwrap();
        attached.engine_mut().pump_local().unwrap();
        assert_eq!(attached.to_record().unwrap().source, "b = 1");

        let (cell, surface) = attached.detach();
        assert_eq!(surface.value(), "b = 1");
        assert_eq!(cell.source().read().unwrap(), "b = 1");
    }
}
