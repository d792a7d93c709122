//! The document store: single owner of session state and the PDF bytes.
//!
//! Pure transitions delegate to `doc_model::apply_session_action`; the
//! binary-coupled mutations (page deletion, cover edits, export) re-derive
//! `file_bytes` through the engine and commit metadata and bytes together.
//! Every committed change notifies subscribers.

use doc_model::{
    apply_session_action, Document, EditingMode, PageId, SessionAction, SessionState,
};
use page_canvas::{encode_png_data_url, EditSession, Scene, SceneError};
use pdf_engine::{OpenSource, PdfEngine, PdfEngineError, RenderRequest, RgbaImage};
use tracing::warn;

pub type Revision = u64;
pub type SubscriptionId = u64;

/// Render scale for the cover-editing background image.
const COVER_RENDER_SCALE: f32 = 2.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    DocumentReplaced,
    DocumentCleared,
    ModeChanged(EditingMode),
    ViewChanged { current_page_index: usize },
    SelectionChanged,
    CoverMarked { page_id: PageId },
    ThumbnailUpdated { page_id: PageId },
    PageDeleted { page_id: PageId },
    PageRasterReplaced { page_index: usize },
}

/// Why a mutation did not apply. None of these are errors; the store is
/// unchanged and the caller can ignore or surface them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoDocument,
    LastPage,
    UnknownPage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreWarning {
    /// Page metadata was updated but the binary re-derivation failed, so
    /// `file_bytes` still reflects the pre-mutation document.
    StaleFileBytes,
}

/// Outcome of a binary-coupled mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    Applied,
    Degraded(StoreWarning),
    Skipped(SkipReason),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("operation was prepared against revision {expected} but the store is at {actual}")]
    RevisionConflict { expected: Revision, actual: Revision },
    #[error("no document loaded")]
    NoDocument,
    #[error(transparent)]
    Engine(#[from] PdfEngineError),
    #[error(transparent)]
    Canvas(#[from] SceneError),
    #[error("raster encode failed: {0}")]
    Raster(#[from] page_canvas::DataUrlError),
}

type Subscriber = Box<dyn FnMut(&StoreEvent)>;

/// Owns the session state, the engine, and a revision counter that every
/// binary mutation bumps. Callers performing a mutation derived from a
/// previously-read state pass the revision they read; a mismatch fails
/// with [`StoreError::RevisionConflict`] instead of committing bytes
/// derived from a stale base.
pub struct DocumentStore<E: PdfEngine> {
    engine: E,
    state: SessionState,
    revision: Revision,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_subscription: SubscriptionId,
}

impl<E: PdfEngine> DocumentStore<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            state: SessionState::default(),
            revision: 0,
            subscribers: Vec::new(),
            next_subscription: 0,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn revision(&self) -> Revision {
        self.revision
    }

    pub fn subscribe(&mut self, callback: Subscriber) -> SubscriptionId {
        self.next_subscription += 1;
        let id = self.next_subscription;
        self.subscribers.push((id, callback));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(existing, _)| *existing != id);
        self.subscribers.len() != before
    }

    fn notify(&mut self, event: StoreEvent) {
        for (_, callback) in &mut self.subscribers {
            callback(&event);
        }
    }

    fn check_revision(&self, expected: Revision) -> Result<(), StoreError> {
        if expected != self.revision {
            return Err(StoreError::RevisionConflict { expected, actual: self.revision });
        }
        Ok(())
    }

    pub fn set_document(&mut self, document: Document) {
        apply_session_action(&mut self.state, SessionAction::SetDocument(document));
        self.revision += 1;
        self.notify(StoreEvent::DocumentReplaced);
    }

    pub fn clear_document(&mut self) {
        apply_session_action(&mut self.state, SessionAction::ClearDocument);
        self.revision += 1;
        self.notify(StoreEvent::DocumentCleared);
    }

    pub fn set_editing_mode(&mut self, mode: EditingMode) {
        apply_session_action(&mut self.state, SessionAction::SetEditingMode(mode));
        self.notify(StoreEvent::ModeChanged(mode));
    }

    pub fn set_current_page_index(&mut self, index: usize) {
        apply_session_action(&mut self.state, SessionAction::SetCurrentPageIndex(index));
        self.notify(StoreEvent::ViewChanged {
            current_page_index: self.state.current_page_index,
        });
    }

    pub fn view_page_by_id(&mut self, page_id: PageId) {
        apply_session_action(&mut self.state, SessionAction::ViewPageById(page_id));
        self.notify(StoreEvent::ViewChanged {
            current_page_index: self.state.current_page_index,
        });
    }

    pub fn select_page(&mut self, page_id: PageId) {
        apply_session_action(&mut self.state, SessionAction::SelectPage(page_id));
        self.notify(StoreEvent::SelectionChanged);
    }

    pub fn deselect_page(&mut self, page_id: PageId) {
        apply_session_action(&mut self.state, SessionAction::DeselectPage(page_id));
        self.notify(StoreEvent::SelectionChanged);
    }

    pub fn toggle_page_selection(&mut self, page_id: PageId) {
        apply_session_action(&mut self.state, SessionAction::TogglePageSelection(page_id));
        self.notify(StoreEvent::SelectionChanged);
    }

    pub fn mark_as_cover(&mut self, page_id: PageId) {
        apply_session_action(&mut self.state, SessionAction::MarkAsCover(page_id.clone()));
        self.notify(StoreEvent::CoverMarked { page_id });
    }

    pub fn update_page_thumbnail(&mut self, page_id: PageId, thumbnail: String) {
        apply_session_action(
            &mut self.state,
            SessionAction::UpdatePageThumbnail { page_id: page_id.clone(), thumbnail },
        );
        self.notify(StoreEvent::ThumbnailUpdated { page_id });
    }

    /// Remove a page from both the metadata and the PDF bytes.
    ///
    /// Skips when there is no document, the id is unknown, or only one
    /// page remains. If the binary re-derivation fails the metadata
    /// update still commits and the outcome is
    /// `Degraded(StaleFileBytes)`.
    pub fn delete_page(
        &mut self,
        page_id: &str,
        expected_revision: Revision,
    ) -> Result<MutationOutcome, StoreError> {
        self.check_revision(expected_revision)?;

        let Some(document) = self.state.document.as_ref() else {
            return Ok(MutationOutcome::Skipped(SkipReason::NoDocument));
        };
        if document.total_pages() <= 1 {
            return Ok(MutationOutcome::Skipped(SkipReason::LastPage));
        }
        let Some(page_index) = document.page_index_of(page_id) else {
            return Ok(MutationOutcome::Skipped(SkipReason::UnknownPage));
        };

        let bytes = document.file_bytes.clone();
        let rederived = self.rederive_without_page(bytes, page_index as u32);

        let removed = self.state.remove_page_entry(page_id);
        debug_assert_eq!(removed, Some(page_index));

        let outcome = match rederived {
            Ok(new_bytes) => {
                self.state.replace_file_bytes(new_bytes);
                MutationOutcome::Applied
            }
            Err(err) => {
                warn!(page_id, error = %err, "page removal did not reach the PDF bytes");
                MutationOutcome::Degraded(StoreWarning::StaleFileBytes)
            }
        };

        self.revision += 1;
        self.notify(StoreEvent::PageDeleted { page_id: page_id.to_owned() });
        Ok(outcome)
    }

    /// Replace the visual content of the page at `page_index` with a
    /// raster: full-bleed image at the page's original dimensions in the
    /// PDF bytes, plus the thumbnail and raster override in metadata.
    pub fn apply_cover_edit(
        &mut self,
        page_index: usize,
        raster: &RgbaImage,
        expected_revision: Revision,
    ) -> Result<MutationOutcome, StoreError> {
        self.check_revision(expected_revision)?;

        let Some(document) = self.state.document.as_ref() else {
            return Ok(MutationOutcome::Skipped(SkipReason::NoDocument));
        };
        if page_index >= document.total_pages() {
            return Ok(MutationOutcome::Skipped(SkipReason::UnknownPage));
        }

        let data_url = encode_png_data_url(raster)?;
        let bytes = document.file_bytes.clone();
        let rederived = self.rederive_with_overlay(bytes, page_index as u32, raster);

        self.state.set_page_raster(page_index, data_url);

        let outcome = match rederived {
            Ok(new_bytes) => {
                self.state.replace_file_bytes(new_bytes);
                MutationOutcome::Applied
            }
            Err(err) => {
                warn!(page_index, error = %err, "cover edit did not reach the PDF bytes");
                MutationOutcome::Degraded(StoreWarning::StaleFileBytes)
            }
        };

        self.revision += 1;
        self.notify(StoreEvent::PageRasterReplaced { page_index });
        Ok(outcome)
    }

    /// Export bytes: the whole document when nothing is selected, or the
    /// selected pages in ascending page order. Extraction failure falls
    /// back to the full current bytes.
    pub fn export(&mut self) -> Option<Vec<u8>> {
        let document = self.state.document.as_ref()?;
        let bytes = document.file_bytes.clone();

        if self.state.selected_pages.is_empty() {
            return Some(bytes);
        }

        let mut indices: Vec<u32> = self
            .state
            .selected_pages
            .iter()
            .filter_map(|id| document.page_index_of(id))
            .map(|index| index as u32)
            .collect();
        indices.sort_unstable();

        match self.extract_subset(bytes.clone(), &indices) {
            Ok(subset) => Some(subset),
            Err(err) => {
                warn!(error = %err, "subset export failed, falling back to the full document");
                Some(bytes)
            }
        }
    }

    /// `<name minus .pdf>_edited.pdf`, case-insensitive on the extension.
    pub fn export_file_name(&self) -> Option<String> {
        let name = self.state.document.as_ref()?.name.as_str();
        let stem = name
            .strip_suffix(".pdf")
            .or_else(|| name.strip_suffix(".PDF"))
            .or_else(|| name.strip_suffix(".Pdf"))
            .unwrap_or(name);
        Some(format!("{stem}_edited.pdf"))
    }

    /// Build a canvas editing session for the page at `page_index`: the
    /// page render as a background image object, and optionally the
    /// page's text runs as editable text objects. The populated scene is
    /// the session's initial snapshot, so it cannot be undone away.
    pub fn cover_session(
        &mut self,
        page_index: usize,
        with_text: bool,
    ) -> Result<EditSession, StoreError> {
        let document = self.state.document.as_ref().ok_or(StoreError::NoDocument)?;
        let bytes = document.file_bytes.clone();

        let handle = self.engine.open(OpenSource::Bytes(bytes))?;
        let populated = (|| {
            let render = self.engine.render_page(
                handle,
                RenderRequest { page_index: page_index as u32, scale: COVER_RENDER_SCALE },
            )?;
            let page_size = self.engine.page_size(handle, page_index as u32)?;

            let mut scene = Scene::new(render.width(), render.height());
            let background = encode_png_data_url(&render)?;
            scene.add_image(
                background,
                0.0,
                0.0,
                render.width() as f32,
                render.height() as f32,
            );

            if with_text {
                for run in self.engine.text_runs(handle, page_index as u32)? {
                    // PDF text origin is bottom-left; the scene is top-left.
                    let top = ((page_size.height_pt - run.bbox.y - run.font_size)
                        * COVER_RENDER_SCALE)
                        .max(0.0);
                    scene.add_text(
                        run.text,
                        run.bbox.x * COVER_RENDER_SCALE,
                        top,
                        run.font_size * COVER_RENDER_SCALE,
                        page_canvas::Color::BLACK,
                    );
                }
            }

            Ok::<Scene, StoreError>(scene)
        })();
        let _ = self.engine.close(handle);

        Ok(EditSession::new(populated?)?)
    }

    fn rederive_without_page(
        &mut self,
        bytes: Vec<u8>,
        page_index: u32,
    ) -> Result<Vec<u8>, PdfEngineError> {
        let handle = self.engine.open(OpenSource::Bytes(bytes))?;
        let result = self
            .engine
            .remove_page(handle, page_index)
            .and_then(|()| self.engine.save(handle));
        let _ = self.engine.close(handle);
        result
    }

    fn rederive_with_overlay(
        &mut self,
        bytes: Vec<u8>,
        page_index: u32,
        raster: &RgbaImage,
    ) -> Result<Vec<u8>, PdfEngineError> {
        let handle = self.engine.open(OpenSource::Bytes(bytes))?;
        let result = self
            .engine
            .overlay_page_image(handle, page_index, raster)
            .and_then(|()| self.engine.save(handle));
        let _ = self.engine.close(handle);
        result
    }

    fn extract_subset(
        &mut self,
        bytes: Vec<u8>,
        indices: &[u32],
    ) -> Result<Vec<u8>, PdfEngineError> {
        let handle = self.engine.open(OpenSource::Bytes(bytes))?;
        let result = self.engine.extract_pages(handle, indices);
        let _ = self.engine.close(handle);
        result
    }
}
