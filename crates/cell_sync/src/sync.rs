//! Sync engine keeping a text surface and a collaborative string in step.
//!
//! Two directions:
//!
//! - Local to remote: change batches reported by the surface are classified
//!   by origin; forwarded records are replayed on the collaborative string
//!   as a deletion followed by an insertion at the same absolute offset.
//! - Remote to local: insert/delete events from peers are converted to
//!   line/column ranges and applied to the surface tagged
//!   [`EditOrigin::RemoteReplay`]. The surface reports that change back with
//!   the same tag and the classifier drops it, so a replay is never
//!   published again.
//!
//! The engine keeps its own line-length snapshot of the surface, advanced by
//! every reported change. Offsets for a local batch are always computed
//! against the snapshot frozen when the batch started.

use crate::change::{bottom_to_top, ChangeRecord};
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::origin::{classify, Disposition, EditOrigin};
use crate::position::{from_absolute_offset, to_absolute_offset, LineLengths};
use crate::remote::TextEventKind;
use crate::rt_string::{CollabString, StringEvent, Subscription};
use crate::surface::{RangeMark, TextSurface};
use serde::{Deserialize, Serialize};

/// Counters for what the engine has done since it was attached
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    /// Local change records replayed on the collaborative string
    pub forwarded: u64,
    /// Change records dropped by the classifier
    pub suppressed: u64,
    /// Remote insertions applied to the surface
    pub remote_inserts: u64,
    /// Remote deletions applied to the surface
    pub remote_deletes: u64,
}

/// A failed [`SyncEngine::try_attach`], handing back what was passed in
#[derive(Debug)]
pub struct AttachError<S> {
    pub error: SyncError,
    pub surface: S,
    pub source: CollabString,
}

/// Synchronizes one text surface with one collaborative string
pub struct SyncEngine<S: TextSurface> {
    surface: S,
    source: CollabString,
    inserts: Subscription,
    deletes: Subscription,
    /// Line lengths of the surface as of the last processed change
    shadow: LineLengths,
    config: SyncConfig,
    stats: SyncStats,
}

impl<S: TextSurface> SyncEngine<S> {
    /// Attach `surface` to `source`.
    ///
    /// Unreported surface changes are discarded, the surface is reset to the
    /// source value and remote subscriptions are opened. Fails with
    /// [`crate::SyncError::NotReady`] if the source is still loading.
    pub fn attach(surface: S, source: CollabString, config: SyncConfig) -> SyncResult<Self> {
        Self::try_attach(surface, source, config).map_err(|failed| failed.error)
    }

    /// Like [`SyncEngine::attach`], but a failure hands the surface and
    /// source back to the caller.
    pub fn try_attach(
        mut surface: S,
        source: CollabString,
        config: SyncConfig,
    ) -> Result<Self, AttachError<S>> {
        let (inserts, deletes) = match (source.subscribe_insert(), source.subscribe_delete()) {
            (Ok(inserts), Ok(deletes)) => (inserts, deletes),
            (Err(error), _) | (_, Err(error)) => {
                return Err(AttachError {
                    error,
                    surface,
                    source,
                })
            }
        };
        surface.take_changes();
        let shadow = surface.line_lengths();

        let mut engine = Self {
            surface,
            source,
            inserts,
            deletes,
            shadow,
            config,
            stats: SyncStats::default(),
        };
        if let Err(error) = engine.reset() {
            tracing::warn!(%error, "Attach failed, releasing text surface");
            let (surface, source) = engine.detach();
            return Err(AttachError {
                error,
                surface,
                source,
            });
        }
        tracing::info!(
            collaborative = engine.source.is_collaborative(),
            lines = engine.shadow.line_count(),
            "Attached text surface"
        );
        Ok(engine)
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// The surface, for applying user edits. Call [`SyncEngine::pump_local`]
    /// afterwards to publish them.
    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn source(&self) -> &CollabString {
        &self.source
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn stats(&self) -> SyncStats {
        self.stats
    }

    /// Replace the surface value with the source value.
    ///
    /// Pending local changes are published first. The reset itself is
    /// reported as [`EditOrigin::FullReset`] and never reaches the source.
    pub fn reset(&mut self) -> SyncResult<()> {
        self.pump_local()?;
        let value = self.source.read()?;
        self.surface.set_value(&value);
        self.pump_local()?;
        Ok(())
    }

    /// Process every change batch the surface has reported.
    ///
    /// Returns the number of records forwarded to the source. On error the
    /// remaining batches are dropped; see [`SyncEngine::handle_batch`].
    pub fn pump_local(&mut self) -> SyncResult<usize> {
        let mut forwarded = 0;
        for batch in self.surface.take_changes() {
            forwarded += self.handle_batch(&batch)?;
        }
        Ok(forwarded)
    }

    /// Process one batch of change records from the surface.
    ///
    /// Records are handled bottom-to-top against the snapshot taken before
    /// the batch, so each record's coordinates stay valid while the ones
    /// below it are replayed. A record that does not fit the text fails the
    /// batch with [`crate::SyncError::InvalidPosition`] before it is replayed.
    ///
    /// Records replayed before the failure stay in the source. To keep the
    /// two sides equal the engine then drops every queued surface change,
    /// re-reads the snapshot and, if the source no longer matches the
    /// surface, rewrites the source with the surface value.
    pub fn handle_batch(&mut self, batch: &[ChangeRecord]) -> SyncResult<usize> {
        let snapshot = self.shadow.clone();
        let result = self.replay_batch(&snapshot, batch);
        if let Err(error) = &result {
            self.resync_source(error);
        }
        result
    }

    fn replay_batch(&mut self, snapshot: &LineLengths, batch: &[ChangeRecord]) -> SyncResult<usize> {
        let mut forwarded = 0;
        for index in bottom_to_top(batch, |record| (record.from, record.to)) {
            let record = &batch[index];
            self.shadow.splice(record.from, record.to, &record.inserted)?;
            match classify(record) {
                Disposition::Forward => {
                    self.replay_local(snapshot, record)?;
                    self.stats.forwarded += 1;
                    forwarded += 1;
                }
                Disposition::Suppress => {
                    tracing::trace!(origin = %record.origin, "Suppressed change");
                    self.stats.suppressed += 1;
                }
            }
        }
        Ok(forwarded)
    }

    fn resync_source(&mut self, error: &SyncError) {
        self.surface.take_changes();
        self.shadow = self.surface.line_lengths();

        let value = self.surface.value();
        match self.source.read() {
            Ok(current) if current != value => {
                tracing::warn!(%error, "Change batch failed partway, rewriting source from surface");
                if let Err(write_error) = self.source.write(&value) {
                    tracing::warn!(error = %write_error, "Failed to rewrite source");
                }
            }
            Ok(_) => tracing::warn!(%error, "Change batch rejected"),
            Err(read_error) => {
                tracing::warn!(%error, read_error = %read_error, "Change batch failed, source unreadable")
            }
        }
    }

    /// Replay one local record: delete, then insert, at the same offset
    fn replay_local(&mut self, snapshot: &LineLengths, record: &ChangeRecord) -> SyncResult<()> {
        let index = to_absolute_offset(snapshot, record.from)?;

        let removed = record.removed_len();
        if removed > 0 {
            tracing::debug!(
                origin = %record.origin,
                from = index,
                to = index + removed,
                "Replaying local deletion"
            );
            self.source.delete_range(index, index + removed)?;
        }

        let text = record.inserted_text();
        if !text.is_empty() {
            tracing::debug!(
                origin = %record.origin,
                index,
                len = text.chars().count(),
                "Replaying local insertion"
            );
            self.source.insert(index, &text)?;
        }
        Ok(())
    }

    /// Apply every queued remote event to the surface, in arrival order.
    ///
    /// Pending local changes are published first. Returns the number of
    /// events applied.
    pub fn pump_remote(&mut self) -> SyncResult<usize> {
        self.pump_local()?;
        let mut applied = 0;
        loop {
            let next = match (
                self.inserts.peek().map(StringEvent::seq),
                self.deletes.peek().map(StringEvent::seq),
            ) {
                (Some(insert), Some(delete)) if insert <= delete => TextEventKind::Inserted,
                (Some(_), Some(_)) | (None, Some(_)) => TextEventKind::Deleted,
                (Some(_), None) => TextEventKind::Inserted,
                (None, None) => break,
            };
            match next {
                TextEventKind::Inserted => {
                    if let Some(event) = self.inserts.next_event() {
                        self.apply_remote_insert(&event)?;
                    }
                }
                TextEventKind::Deleted => {
                    if let Some(event) = self.deletes.next_event() {
                        self.apply_remote_delete(&event)?;
                    }
                }
            }
            applied += 1;
        }
        Ok(applied)
    }

    /// Mirror a peer's insertion on the surface.
    ///
    /// The index is mapped against the surface as it is now; an index past
    /// the end clamps to the end.
    pub fn apply_remote_insert(&mut self, event: &StringEvent) -> SyncResult<()> {
        self.pump_local()?;
        let lengths = self.surface.line_lengths();
        let at = from_absolute_offset(&lengths, event.index);
        tracing::debug!(index = event.index, position = %at, "Replaying remote insertion");
        self.surface
            .replace_range(&event.text, at, at, EditOrigin::RemoteReplay)?;

        if self.config.highlight_remote_edits && !event.text.is_empty() {
            let start = to_absolute_offset(&lengths, at)?;
            let after = self.surface.line_lengths();
            let end = from_absolute_offset(&after, start + event.text.chars().count());
            self.surface.mark_range(RangeMark {
                from: at,
                to: end,
                style: self.config.highlight_style.clone(),
                title: self.config.highlight_title.clone(),
            });
        }

        self.stats.remote_inserts += 1;
        self.pump_local()?;
        Ok(())
    }

    /// Mirror a peer's deletion on the surface.
    ///
    /// Both ends are mapped against the surface as it is now and clamp to the
    /// end of the text, so a stale range never fails.
    pub fn apply_remote_delete(&mut self, event: &StringEvent) -> SyncResult<()> {
        self.pump_local()?;
        let lengths = self.surface.line_lengths();
        let end_index = event.index.saturating_add(event.text.chars().count());
        let from = from_absolute_offset(&lengths, event.index);
        let to = from_absolute_offset(&lengths, end_index);
        tracing::debug!(
            index = event.index,
            from = %from,
            to = %to,
            "Replaying remote deletion"
        );
        self.surface
            .replace_range("", from, to, EditOrigin::RemoteReplay)?;

        self.stats.remote_deletes += 1;
        self.pump_local()?;
        Ok(())
    }

    /// Release both subscriptions and hand back the surface and source
    pub fn detach(self) -> (S, CollabString) {
        let SyncEngine {
            surface,
            source,
            mut inserts,
            mut deletes,
            stats,
            ..
        } = self;
        inserts.close();
        deletes.close();
        tracing::info!(
            forwarded = stats.forwarded,
            suppressed = stats.suppressed,
            "Detached text surface"
        );
        (surface, source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::ChangeRecord;
    use crate::error::SyncError;
    use crate::position::Position;
    use crate::remote::{RemoteText, SharedDocument};
    use crate::surface::{LineBuffer, SurfaceEdit};

    fn passive_engine(text: &str) -> SyncEngine<LineBuffer> {
        SyncEngine::attach(
            LineBuffer::new(),
            CollabString::passive(text),
            SyncConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_attach_resets_surface() {
        let engine = passive_engine("hello\nworld");
        assert_eq!(engine.surface().value(), "hello\nworld");
        assert_eq!(engine.stats().forwarded, 0);
        assert_eq!(engine.stats().suppressed, 1);
    }

    #[test]
    fn test_attach_discards_stale_surface_changes() {
        let mut surface = LineBuffer::from_text("stale");
        surface
            .replace_range("x", Position::new(0, 0), Position::new(0, 0), EditOrigin::UserInput)
            .unwrap();
        let engine =
            SyncEngine::attach(surface, CollabString::passive("fresh"), SyncConfig::default())
                .unwrap();
        assert_eq!(engine.source().read().unwrap(), "fresh");
        assert_eq!(engine.surface().value(), "fresh");
    }

    #[test]
    fn test_attach_loading_source_fails() {
        let result = SyncEngine::attach(
            LineBuffer::new(),
            CollabString::loading(),
            SyncConfig::default(),
        );
        assert!(matches!(result, Err(SyncError::NotReady)));
    }

    #[test]
    fn test_user_insert_is_forwarded() {
        let mut engine = passive_engine("hello\nworld");
        engine
            .surface_mut()
            .replace_range("X", Position::new(1, 0), Position::new(1, 0), EditOrigin::UserInput)
            .unwrap();
        assert_eq!(engine.pump_local().unwrap(), 1);
        assert_eq!(engine.source().read().unwrap(), "hello\nXworld");
    }

    #[test]
    fn test_replace_is_delete_then_insert() {
        let mut engine = passive_engine("one two");
        engine
            .surface_mut()
            .replace_range("2", Position::new(0, 4), Position::new(0, 7), EditOrigin::Paste)
            .unwrap();
        engine.pump_local().unwrap();
        assert_eq!(engine.source().read().unwrap(), "one 2");
    }

    #[test]
    fn test_invalid_record_fails_batch() {
        let mut engine = passive_engine("abc");
        let record = ChangeRecord::insertion(EditOrigin::UserInput, Position::new(3, 0), "x");
        assert_eq!(
            engine.handle_batch(&[record]),
            Err(SyncError::InvalidPosition { line: 3, column: 0 })
        );
        assert_eq!(engine.source().read().unwrap(), "abc");
    }

    #[test]
    fn test_try_attach_hands_back_loading_source() {
        let failed = SyncEngine::try_attach(
            LineBuffer::from_text("kept"),
            CollabString::loading(),
            SyncConfig::default(),
        )
        .err()
        .unwrap();
        assert_eq!(failed.error, SyncError::NotReady);
        assert_eq!(failed.surface.value(), "kept");
        assert!(!failed.source.is_ready());
    }

    #[test]
    fn test_partially_replayed_batch_resyncs_source() {
        let mut engine = passive_engine("abc");
        // The inner range is replayed first; the outer one no longer fits
        let batch = [
            ChangeRecord::new(
                EditOrigin::Delete,
                Position::new(0, 0),
                Position::new(0, 3),
                vec![String::new()],
                vec!["abc".to_string()],
            ),
            ChangeRecord::new(
                EditOrigin::Delete,
                Position::new(0, 1),
                Position::new(0, 2),
                vec![String::new()],
                vec!["b".to_string()],
            ),
        ];
        assert_eq!(
            engine.handle_batch(&batch),
            Err(SyncError::InvalidPosition { line: 0, column: 3 })
        );
        assert_eq!(engine.source().read().unwrap(), "abc");
        assert_eq!(engine.stats().forwarded, 1);

        // Later edits line up with the surface again
        engine
            .surface_mut()
            .replace_range("!", Position::new(0, 3), Position::new(0, 3), EditOrigin::UserInput)
            .unwrap();
        engine.pump_local().unwrap();
        assert_eq!(engine.source().read().unwrap(), "abc!");
    }

    #[test]
    fn test_unrecognized_origin_is_suppressed() {
        let mut engine = passive_engine("abc");
        engine
            .surface_mut()
            .replace_range(
                "zz",
                Position::new(0, 0),
                Position::new(0, 0),
                EditOrigin::from_tag("+mystery"),
            )
            .unwrap();
        assert_eq!(engine.pump_local().unwrap(), 0);
        assert_eq!(engine.source().read().unwrap(), "abc");

        // The snapshot still follows the surface
        engine
            .surface_mut()
            .replace_range("!", Position::new(0, 5), Position::new(0, 5), EditOrigin::UserInput)
            .unwrap();
        engine.pump_local().unwrap();
        assert_eq!(engine.source().read().unwrap(), "abc!");
    }

    #[test]
    fn test_multi_cursor_batch() {
        let mut engine = passive_engine("a\nb\nc");
        engine
            .surface_mut()
            .apply_batch(
                vec![
                    SurfaceEdit::insert(Position::new(0, 1), ";"),
                    SurfaceEdit::insert(Position::new(1, 1), ";"),
                    SurfaceEdit::insert(Position::new(2, 1), ";"),
                ],
                EditOrigin::UserInput,
            )
            .unwrap();
        assert_eq!(engine.pump_local().unwrap(), 3);
        assert_eq!(engine.source().read().unwrap(), "a;\nb;\nc;");
    }

    #[test]
    fn test_remote_insert_and_delete() {
        let doc = SharedDocument::new();
        let mine = doc.connect(1).create_string("s", "abc");
        let peer = doc.connect(2).string("s").unwrap();
        let mut engine =
            SyncEngine::attach(LineBuffer::new(), CollabString::collaborative(mine), SyncConfig::default())
                .unwrap();

        peer.insert_string(0, "Z");
        peer.remove_range(2, 3);
        assert_eq!(engine.pump_remote().unwrap(), 2);
        assert_eq!(engine.surface().value(), "Zac");
        assert_eq!(engine.stats().remote_inserts, 1);
        assert_eq!(engine.stats().remote_deletes, 1);
        assert_eq!(engine.stats().forwarded, 0);
    }

    #[test]
    fn test_remote_insert_is_highlighted() {
        let mut engine = passive_engine("ab\ncd");
        engine
            .apply_remote_insert(&StringEvent::new(4, "x\ny"))
            .unwrap();
        assert_eq!(engine.surface().value(), "ab\ncx\nyd");
        let mark = &engine.surface().marks()[0];
        assert_eq!(mark.from, Position::new(1, 1));
        assert_eq!(mark.to, Position::new(2, 1));
        assert_eq!(mark.style, "background-color: #DDF;");
    }

    #[test]
    fn test_highlight_can_be_disabled() {
        let mut engine = SyncEngine::attach(
            LineBuffer::new(),
            CollabString::passive("ab"),
            SyncConfig::default().with_highlight(false),
        )
        .unwrap();
        engine.apply_remote_insert(&StringEvent::new(1, "x")).unwrap();
        assert!(engine.surface().marks().is_empty());
    }

    #[test]
    fn test_reset_does_not_touch_source() {
        let doc = SharedDocument::new();
        let mine = doc.connect(1).create_string("s", "v1");
        let probe = doc.connect(2).string("s").unwrap();
        let mut peer_deletes = probe.listen(TextEventKind::Deleted);

        let mut engine =
            SyncEngine::attach(LineBuffer::new(), CollabString::collaborative(mine), SyncConfig::default())
                .unwrap();
        engine.reset().unwrap();

        assert_eq!(probe.text(), "v1");
        assert!(peer_deletes.try_recv().is_err());
    }

    #[test]
    fn test_detach_releases_subscriptions() {
        let doc = SharedDocument::new();
        let mine = doc.connect(1).create_string("s", "abc");
        let probe = mine.clone();
        let engine =
            SyncEngine::attach(LineBuffer::new(), CollabString::collaborative(mine), SyncConfig::default())
                .unwrap();
        assert_eq!(probe.listener_count(), 2);

        let (surface, source) = engine.detach();
        assert_eq!(probe.listener_count(), 0);
        assert_eq!(surface.value(), "abc");
        assert_eq!(source.read().unwrap(), "abc");
    }
}
