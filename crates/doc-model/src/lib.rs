use serde::{Deserialize, Serialize};

/// Stable page identifier. Minted as `page-N` (N = original 1-based page
/// number) at load time and never reassigned, so it survives reordering
/// and deletion of other pages.
pub type PageId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditingMode {
    View,
    Cover,
    Text,
    Edit,
}

impl Default for EditingMode {
    fn default() -> Self {
        Self::View
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub id: PageId,
    /// 1-based, dense. Always `index + 1` after any mutation.
    pub page_number: u32,
    /// Raster preview as a data URL.
    pub thumbnail: Option<String>,
    pub is_cover: bool,
    /// Raster override replacing the original rendering of this page.
    pub edited_data_url: Option<String>,
}

impl Page {
    pub fn new(id: impl Into<PageId>, page_number: u32) -> Self {
        Self {
            id: id.into(),
            page_number,
            thumbnail: None,
            is_cover: false,
            edited_data_url: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub name: String,
    /// Authoritative binary PDF representation. Re-derived whenever a page
    /// is removed or a page's visual content is replaced.
    pub file_bytes: Vec<u8>,
    pub pages: Vec<Page>,
}

impl Document {
    pub fn total_pages(&self) -> usize {
        self.pages.len()
    }

    pub fn page_index_of(&self, page_id: &str) -> Option<usize> {
        self.pages.iter().position(|page| page.id == page_id)
    }

    pub fn cover_page(&self) -> Option<&Page> {
        self.pages.iter().find(|page| page.is_cover)
    }
}

/// Session state owned by the document store. UI layers read it and
/// dispatch actions; they never mutate it directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SessionState {
    pub document: Option<Document>,
    pub selected_pages: Vec<PageId>,
    pub editing_mode: EditingMode,
    pub current_page_index: usize,
}

impl SessionState {
    pub fn has_document(&self) -> bool {
        self.document.is_some()
    }

    pub fn page_count(&self) -> usize {
        self.document.as_ref().map_or(0, Document::total_pages)
    }

    /// Clamp `current_page_index` into `[0, pages.len() - 1]`.
    fn clamp_current_page(&mut self) {
        let max = self.page_count().saturating_sub(1);
        if self.current_page_index > max {
            self.current_page_index = max;
        }
    }

    /// Remove the page with `page_id` from the in-memory model: drop it
    /// from `pages`, renumber densely from 1, shift and clamp the current
    /// page index, and prune the id from the selection.
    ///
    /// Returns the removed page's former index, or `None` when the id is
    /// unknown, the document is missing, or only one page remains.
    pub fn remove_page_entry(&mut self, page_id: &str) -> Option<usize> {
        let document = self.document.as_mut()?;

        if document.pages.len() <= 1 {
            return None;
        }

        let removed_index = document.page_index_of(page_id)?;
        document.pages.remove(removed_index);

        for (index, page) in document.pages.iter_mut().enumerate() {
            page.page_number = index as u32 + 1;
        }

        if self.current_page_index > removed_index {
            self.current_page_index -= 1;
        }
        self.clamp_current_page();

        self.selected_pages.retain(|id| id != page_id);

        Some(removed_index)
    }

    /// Install re-derived PDF bytes after a successful binary mutation.
    pub fn replace_file_bytes(&mut self, bytes: Vec<u8>) {
        if let Some(document) = self.document.as_mut() {
            document.file_bytes = bytes;
        }
    }

    /// Set both the thumbnail and the raster override for the page at
    /// `index`, so viewers short-circuit re-rendering the original.
    pub fn set_page_raster(&mut self, index: usize, data_url: String) -> bool {
        let Some(document) = self.document.as_mut() else {
            return false;
        };
        let Some(page) = document.pages.get_mut(index) else {
            return false;
        };

        page.thumbnail = Some(data_url.clone());
        page.edited_data_url = Some(data_url);
        true
    }
}

/// Pure session transitions. Binary-coupled mutations (page deletion,
/// cover edits) live in the document store, which commits through the
/// `SessionState` helpers above.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    SetDocument(Document),
    SetEditingMode(EditingMode),
    SetCurrentPageIndex(usize),
    ViewPageById(PageId),
    SelectPage(PageId),
    DeselectPage(PageId),
    TogglePageSelection(PageId),
    MarkAsCover(PageId),
    UpdatePageThumbnail { page_id: PageId, thumbnail: String },
    ClearDocument,
}

pub fn apply_session_action(state: &mut SessionState, action: SessionAction) {
    match action {
        SessionAction::SetDocument(document) => {
            state.document = Some(document);
            state.current_page_index = 0;
            state.selected_pages.clear();
            state.editing_mode = EditingMode::View;
        }
        SessionAction::SetEditingMode(mode) => {
            state.editing_mode = mode;
        }
        SessionAction::SetCurrentPageIndex(index) => {
            if state.document.is_none() {
                return;
            }
            state.current_page_index = index;
            state.clamp_current_page();
        }
        SessionAction::ViewPageById(page_id) => {
            let Some(document) = state.document.as_ref() else {
                return;
            };
            if let Some(index) = document.page_index_of(&page_id) {
                state.current_page_index = index;
            }
        }
        SessionAction::SelectPage(page_id) => {
            let Some(document) = state.document.as_ref() else {
                return;
            };
            if document.page_index_of(&page_id).is_some()
                && !state.selected_pages.contains(&page_id)
            {
                state.selected_pages.push(page_id);
            }
        }
        SessionAction::DeselectPage(page_id) => {
            state.selected_pages.retain(|id| *id != page_id);
        }
        SessionAction::TogglePageSelection(page_id) => {
            if state.selected_pages.contains(&page_id) {
                apply_session_action(state, SessionAction::DeselectPage(page_id));
            } else {
                apply_session_action(state, SessionAction::SelectPage(page_id));
            }
        }
        SessionAction::MarkAsCover(page_id) => {
            let Some(document) = state.document.as_mut() else {
                return;
            };
            for page in &mut document.pages {
                page.is_cover = page.id == page_id;
            }
        }
        SessionAction::UpdatePageThumbnail { page_id, thumbnail } => {
            let Some(document) = state.document.as_mut() else {
                return;
            };
            if let Some(index) = document.page_index_of(&page_id) {
                document.pages[index].thumbnail = Some(thumbnail);
            }
        }
        SessionAction::ClearDocument => {
            *state = SessionState::default();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_document(page_count: u32) -> Document {
        Document {
            id: "doc-test".to_owned(),
            name: "test.pdf".to_owned(),
            file_bytes: b"%PDF-1.5 test".to_vec(),
            pages: (1..=page_count).map(|n| Page::new(format!("page-{n}"), n)).collect(),
        }
    }

    fn loaded_state(page_count: u32) -> SessionState {
        let mut state = SessionState::default();
        apply_session_action(&mut state, SessionAction::SetDocument(test_document(page_count)));
        state
    }

    #[test]
    fn set_document_resets_index_selection_and_mode() {
        let mut state = loaded_state(3);
        state.current_page_index = 2;
        state.selected_pages.push("page-1".to_owned());
        state.editing_mode = EditingMode::Cover;

        apply_session_action(&mut state, SessionAction::SetDocument(test_document(5)));

        assert_eq!(state.current_page_index, 0);
        assert!(state.selected_pages.is_empty());
        assert_eq!(state.editing_mode, EditingMode::View);
        assert_eq!(state.page_count(), 5);
    }

    #[test]
    fn set_current_page_index_is_clamped() {
        let mut state = loaded_state(3);

        apply_session_action(&mut state, SessionAction::SetCurrentPageIndex(99));
        assert_eq!(state.current_page_index, 2);

        apply_session_action(&mut state, SessionAction::SetCurrentPageIndex(1));
        assert_eq!(state.current_page_index, 1);
    }

    #[test]
    fn set_current_page_index_without_document_is_noop() {
        let mut state = SessionState::default();
        apply_session_action(&mut state, SessionAction::SetCurrentPageIndex(5));
        assert_eq!(state.current_page_index, 0);
    }

    #[test]
    fn view_page_by_id_resolves_index_and_ignores_unknown_ids() {
        let mut state = loaded_state(4);

        apply_session_action(&mut state, SessionAction::ViewPageById("page-3".to_owned()));
        assert_eq!(state.current_page_index, 2);

        apply_session_action(&mut state, SessionAction::ViewPageById("page-99".to_owned()));
        assert_eq!(state.current_page_index, 2);
    }

    #[test]
    fn mark_as_cover_is_single_select() {
        let mut state = loaded_state(5);

        apply_session_action(&mut state, SessionAction::MarkAsCover("page-2".to_owned()));
        apply_session_action(&mut state, SessionAction::MarkAsCover("page-4".to_owned()));

        let document = state.document.as_ref().expect("document expected");
        let covers: Vec<&str> = document
            .pages
            .iter()
            .filter(|page| page.is_cover)
            .map(|page| page.id.as_str())
            .collect();
        assert_eq!(covers, vec!["page-4"]);
    }

    #[test]
    fn selection_rejects_unknown_ids_and_duplicates() {
        let mut state = loaded_state(2);

        apply_session_action(&mut state, SessionAction::SelectPage("page-1".to_owned()));
        apply_session_action(&mut state, SessionAction::SelectPage("page-1".to_owned()));
        apply_session_action(&mut state, SessionAction::SelectPage("page-99".to_owned()));

        assert_eq!(state.selected_pages, vec!["page-1".to_owned()]);

        apply_session_action(&mut state, SessionAction::TogglePageSelection("page-1".to_owned()));
        assert!(state.selected_pages.is_empty());
    }

    #[test]
    fn remove_page_entry_renumbers_densely_and_prunes_selection() {
        let mut state = loaded_state(5);
        state.selected_pages = vec!["page-2".to_owned(), "page-3".to_owned()];

        let removed = state.remove_page_entry("page-3");
        assert_eq!(removed, Some(2));

        let document = state.document.as_ref().expect("document expected");
        assert_eq!(document.total_pages(), 4);
        let numbers: Vec<u32> = document.pages.iter().map(|page| page.page_number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
        let ids: Vec<&str> = document.pages.iter().map(|page| page.id.as_str()).collect();
        assert_eq!(ids, vec!["page-1", "page-2", "page-4", "page-5"]);
        assert_eq!(state.selected_pages, vec!["page-2".to_owned()]);
    }

    #[test]
    fn remove_page_entry_rejects_last_page() {
        let mut state = loaded_state(1);
        assert_eq!(state.remove_page_entry("page-1"), None);
        assert_eq!(state.page_count(), 1);
    }

    #[test]
    fn remove_page_entry_shifts_current_index() {
        let mut state = loaded_state(5);
        state.current_page_index = 4;

        // Deleting before the current index shifts it down by one.
        state.remove_page_entry("page-1");
        assert_eq!(state.current_page_index, 3);

        // Deleting the current (now last) page clamps to the new end.
        state.remove_page_entry("page-5");
        assert_eq!(state.current_page_index, 2);
    }

    #[test]
    fn current_index_stays_in_range_after_any_single_mutation() {
        for start in 0..5usize {
            for victim in 1..=5u32 {
                let mut state = loaded_state(5);
                state.current_page_index = start;
                state.remove_page_entry(&format!("page-{victim}"));
                assert!(state.current_page_index < state.page_count());
            }
        }
    }

    #[test]
    fn clear_document_resets_to_initial_state() {
        let mut state = loaded_state(3);
        state.editing_mode = EditingMode::Text;
        apply_session_action(&mut state, SessionAction::ClearDocument);
        assert_eq!(state, SessionState::default());
    }

    #[test]
    fn session_state_round_trips_through_json() {
        let state = loaded_state(2);
        let json = serde_json::to_string(&state).expect("serialize");
        let restored: SessionState = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(restored, state);
    }
}
