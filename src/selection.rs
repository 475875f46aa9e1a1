#![forbid(unsafe_code)]

//! Multi-select for batch deletion.
//!
//! Keyboard shortcuts are only live while selection mode is on. Deletes go
//! out one identifier at a time and stop at the first failure, so a failed
//! batch always leaves a known prefix removed.

use crate::api::{self, Backend};
use crate::error::DeleteError;
use crate::i18n::{Language, tf};
use crate::library::LibraryView;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use indexmap::IndexSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionKey {
    Escape,
    SelectAll,
    Delete,
}

impl SelectionKey {
    /// Esc, Ctrl/Cmd+A, Delete or Backspace.
    pub fn from_event(event: &KeyEvent) -> Option<SelectionKey> {
        if event.kind == KeyEventKind::Release {
            return None;
        }
        match event.code {
            KeyCode::Esc => Some(SelectionKey::Escape),
            KeyCode::Delete | KeyCode::Backspace => Some(SelectionKey::Delete),
            KeyCode::Char('a') | KeyCode::Char('A')
                if event
                    .modifiers
                    .intersects(KeyModifiers::CONTROL | KeyModifiers::SUPER) =>
            {
                Some(SelectionKey::SelectAll)
            }
            _ => None,
        }
    }
}

/// What a shortcut asks the owner to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionCommand {
    Ignored,
    Exited,
    SelectedAll(usize),
    /// Ask for confirmation before deleting this many videos.
    ConfirmDelete(usize),
}

#[derive(Debug, Clone, Default)]
pub struct SelectionController {
    selecting: bool,
    selected: IndexSet<String>,
}

impl SelectionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_selecting(&self) -> bool {
        self.selecting
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.contains(id)
    }

    /// Selected identifiers in the order they were picked.
    pub fn ids(&self) -> Vec<String> {
        self.selected.iter().cloned().collect()
    }

    pub fn enter(&mut self) {
        self.selecting = true;
    }

    /// Adds or removes `id`. Returns whether it is selected afterwards.
    /// Outside selection mode this does nothing.
    pub fn toggle(&mut self, id: &str) -> bool {
        if !self.selecting {
            return false;
        }
        if self.selected.shift_remove(id) {
            false
        } else {
            self.selected.insert(id.to_string());
            true
        }
    }

    pub fn select_all<I, S>(&mut self, visible: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if !self.selecting {
            return;
        }
        self.selected = visible.into_iter().map(Into::into).collect();
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    pub fn exit(&mut self) {
        self.selected.clear();
        self.selecting = false;
    }

    pub fn handle_key(&mut self, key: SelectionKey, visible: &[String]) -> SelectionCommand {
        if !self.selecting {
            return SelectionCommand::Ignored;
        }
        match key {
            SelectionKey::Escape => {
                self.exit();
                SelectionCommand::Exited
            }
            SelectionKey::SelectAll => {
                self.select_all(visible.iter().cloned());
                SelectionCommand::SelectedAll(self.len())
            }
            SelectionKey::Delete if self.is_empty() => SelectionCommand::Ignored,
            SelectionKey::Delete => SelectionCommand::ConfirmDelete(self.len()),
        }
    }

    /// Drops ids that are already gone from the backend.
    pub fn forget<'a>(&mut self, ids: impl IntoIterator<Item = &'a String>) {
        for id in ids {
            self.selected.shift_remove(id);
        }
    }

    /// Applies the outcome of a [`delete_batch`] over the current selection.
    ///
    /// A full success marks `library` for a refetch and then leaves selection
    /// mode. On failure the library is left untouched and only the ids that
    /// were not deleted stay selected.
    pub fn settle(
        &mut self,
        result: Result<Vec<String>, DeleteError>,
        library: &mut LibraryView,
    ) -> Result<usize, DeleteError> {
        match result {
            Ok(deleted) => {
                library.invalidate();
                self.exit();
                Ok(deleted.len())
            }
            Err(err) => {
                self.forget(&err.deleted);
                Err(err)
            }
        }
    }
}

/// Issues one delete per id, strictly in order, stopping at the first
/// failure. Returns the ids that were deleted.
pub async fn delete_batch(
    backend: &Arc<dyn Backend>,
    cancel: &CancellationToken,
    ids: Vec<String>,
) -> Result<Vec<String>, DeleteError> {
    let mut deleted = Vec::with_capacity(ids.len());
    for id in ids {
        let target = id.clone();
        if let Err(source) = api::call(backend, cancel, move |b| b.delete_video(&target)).await {
            warn!(id = %id, error = %source, "delete failed, stopping batch");
            return Err(DeleteError {
                deleted,
                failed_id: id,
                source,
            });
        }
        deleted.push(id);
    }
    info!(count = deleted.len(), "videos deleted");
    Ok(deleted)
}

pub fn confirm_message(language: Language, count: usize) -> String {
    tf(
        language,
        "selection.delete_confirm",
        &[("count", count.to_string())],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{Call, ScriptedBackend};
    use crate::api::{ApiVideo, ListResponse};

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn toggle_twice_restores_selection() {
        let mut selection = SelectionController::new();
        selection.enter();
        selection.toggle("a");
        let before = selection.ids();
        assert!(selection.toggle("b"));
        assert!(!selection.toggle("b"));
        assert_eq!(selection.ids(), before);
    }

    #[test]
    fn toggle_is_inert_outside_selection_mode() {
        let mut selection = SelectionController::new();
        assert!(!selection.toggle("a"));
        assert!(selection.is_empty());
    }

    #[test]
    fn select_all_clear_and_exit() {
        let mut selection = SelectionController::new();
        selection.enter();
        selection.select_all(["a", "b", "c", "d"]);
        assert_eq!(selection.len(), 4);
        selection.clear();
        assert_eq!(selection.len(), 0);
        assert!(selection.is_selecting());
        selection.toggle("a");
        selection.exit();
        assert!(!selection.is_selecting());
        assert!(selection.is_empty());
    }

    #[test]
    fn keys_map_to_shortcuts() {
        assert_eq!(
            SelectionKey::from_event(&key(KeyCode::Esc, KeyModifiers::NONE)),
            Some(SelectionKey::Escape)
        );
        assert_eq!(
            SelectionKey::from_event(&key(KeyCode::Char('a'), KeyModifiers::CONTROL)),
            Some(SelectionKey::SelectAll)
        );
        assert_eq!(
            SelectionKey::from_event(&key(KeyCode::Char('a'), KeyModifiers::SUPER)),
            Some(SelectionKey::SelectAll)
        );
        assert_eq!(
            SelectionKey::from_event(&key(KeyCode::Char('a'), KeyModifiers::NONE)),
            None
        );
        assert_eq!(
            SelectionKey::from_event(&key(KeyCode::Backspace, KeyModifiers::NONE)),
            Some(SelectionKey::Delete)
        );
    }

    #[test]
    fn shortcuts_only_work_while_selecting() {
        let visible = ids(&["a", "b"]);
        let mut selection = SelectionController::new();
        assert_eq!(
            selection.handle_key(SelectionKey::SelectAll, &visible),
            SelectionCommand::Ignored
        );
        selection.enter();
        assert_eq!(
            selection.handle_key(SelectionKey::Delete, &visible),
            SelectionCommand::Ignored
        );
        assert_eq!(
            selection.handle_key(SelectionKey::SelectAll, &visible),
            SelectionCommand::SelectedAll(2)
        );
        assert_eq!(
            selection.handle_key(SelectionKey::Delete, &visible),
            SelectionCommand::ConfirmDelete(2)
        );
        assert_eq!(
            selection.handle_key(SelectionKey::Escape, &visible),
            SelectionCommand::Exited
        );
        assert!(!selection.is_selecting());
    }

    #[test]
    fn confirm_text_names_the_count() {
        assert_eq!(
            confirm_message(Language::En, 2),
            "Are you sure you want to delete 2 video(s)? This action cannot be undone."
        );
    }

    fn five_videos() -> ListResponse {
        ListResponse {
            videos: (1..=5)
                .map(|i| ApiVideo {
                    id: format!("v{i}"),
                    video_page_name: format!("Video {i}"),
                    ..ApiVideo::default()
                })
                .collect(),
            total_videos: Some(5),
        }
    }

    async fn loaded_library(backend: &Arc<dyn Backend>) -> LibraryView {
        let mut library = LibraryView::new("http://h");
        library.load(backend, &CancellationToken::new()).await;
        library
    }

    #[tokio::test]
    async fn partial_failure_stops_batch_and_keeps_list() {
        let scripted = Arc::new(ScriptedBackend::default());
        scripted.list.lock().push_back(Ok(five_videos()));
        scripted.delete_failures.lock().push("v2".into());
        let backend: Arc<dyn Backend> = scripted.clone();
        let mut library = loaded_library(&backend).await;

        let mut selection = SelectionController::new();
        selection.enter();
        selection.select_all(library.visible_ids());
        let result = delete_batch(&backend, &CancellationToken::new(), selection.ids()).await;
        let err = selection.settle(result, &mut library).unwrap_err();

        assert_eq!(err.deleted, ids(&["v1"]));
        assert_eq!(err.failed_id, "v2");
        assert_eq!(library.videos().len(), 5);
        assert!(library.find("v1").is_some());
        assert!(!library.needs_fetch());
        assert_eq!(selection.ids(), ids(&["v2", "v3", "v4", "v5"]));
        assert!(selection.is_selecting());

        let calls = scripted.calls();
        assert_eq!(
            &calls[1..],
            &[Call::Delete("v1".into()), Call::Delete("v2".into())]
        );
    }

    #[tokio::test]
    async fn full_success_refetches_then_exits() {
        let scripted = Arc::new(ScriptedBackend::default());
        scripted.list.lock().push_back(Ok(five_videos()));
        let backend: Arc<dyn Backend> = scripted.clone();
        let mut library = loaded_library(&backend).await;

        let mut selection = SelectionController::new();
        selection.enter();
        selection.toggle("v1");
        selection.toggle("v3");
        let result = delete_batch(&backend, &CancellationToken::new(), selection.ids()).await;
        let deleted = selection.settle(result, &mut library).unwrap();

        assert_eq!(deleted, 2);
        assert!(!selection.is_selecting());
        assert!(selection.is_empty());
        assert!(library.needs_fetch());
        library.load(&backend, &CancellationToken::new()).await;
        let calls = scripted.calls();
        assert!(matches!(calls.last(), Some(Call::List(_))));
        assert_eq!(calls.len(), 4);
    }
}
