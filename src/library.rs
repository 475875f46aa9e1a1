#![forbid(unsafe_code)]

//! Library and recents view models.
//!
//! Filter and sort setters only mark the view dirty. The next call to
//! [`LibraryView::take_fetch`] turns however many changes happened since into
//! a single listing request, and responses to superseded requests are dropped.

use crate::api::{self, Backend, ListQuery, ListResponse, SortBy, SortOrder};
use crate::error::ApiError;
use crate::i18n::{Language, t, tf};
use crate::normalize::{Video, normalize};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub const RECENT_LIMIT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Grid,
    List,
}

impl ViewMode {
    pub fn toggle(self) -> ViewMode {
        match self {
            ViewMode::Grid => ViewMode::List,
            ViewMode::List => ViewMode::Grid,
        }
    }

    pub fn label_key(self) -> &'static str {
        match self {
            ViewMode::Grid => "view.grid",
            ViewMode::List => "view.list",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Loaded,
    Failed(String),
}

impl LoadState {
    pub fn is_loading(&self) -> bool {
        matches!(self, LoadState::Loading)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Search,
    Category,
    Uploader,
}

/// Ticket for one listing request. Hand it back to [`LibraryView::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub generation: u64,
    pub query: ListQuery,
}

#[derive(Debug, Clone)]
pub struct LibraryView {
    origin: String,
    query: ListQuery,
    local_date_sort: Option<SortOrder>,
    pub view_mode: ViewMode,
    videos: Vec<Video>,
    categories: Vec<String>,
    uploaders: Vec<String>,
    state: LoadState,
    dirty: bool,
    generation: u64,
}

impl LibraryView {
    /// A fresh view is dirty so the first tick fetches.
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            query: ListQuery::default(),
            local_date_sort: None,
            view_mode: ViewMode::default(),
            videos: Vec::new(),
            categories: Vec::new(),
            uploaders: Vec::new(),
            state: LoadState::Idle,
            dirty: true,
            generation: 0,
        }
    }

    pub fn query(&self) -> &ListQuery {
        &self.query
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn videos(&self) -> &[Video] {
        &self.videos
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn uploaders(&self) -> &[String] {
        &self.uploaders
    }

    pub fn local_date_sort(&self) -> Option<SortOrder> {
        self.local_date_sort
    }

    pub fn needs_fetch(&self) -> bool {
        self.dirty
    }

    fn update(&mut self, change: impl FnOnce(&mut ListQuery)) {
        let before = self.query.clone();
        change(&mut self.query);
        if self.query != before {
            self.dirty = true;
        }
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        let search = search.into();
        self.update(|query| query.search = search);
    }

    pub fn set_category(&mut self, category: impl Into<String>) {
        let category = category.into();
        self.update(|query| query.category = category);
    }

    pub fn set_uploader(&mut self, uploader: impl Into<String>) {
        let uploader = uploader.into();
        self.update(|query| query.uploader = uploader);
    }

    pub fn set_sort(&mut self, sort_by: SortBy, order: SortOrder) {
        self.update(|query| {
            query.sort_by = sort_by;
            query.order = order;
        });
    }

    /// Client-side re-sort by download date. `None` keeps server order.
    pub fn set_local_date_sort(&mut self, order: Option<SortOrder>) {
        self.local_date_sort = order;
    }

    /// Cycles `None -> Desc -> Asc -> None`.
    pub fn cycle_local_date_sort(&mut self) {
        self.local_date_sort = match self.local_date_sort {
            None => Some(SortOrder::Desc),
            Some(SortOrder::Desc) => Some(SortOrder::Asc),
            Some(SortOrder::Asc) => None,
        };
    }

    /// Cycles through the entries of the category dropdown, `All` first.
    pub fn cycle_category(&mut self) {
        let next = cycle_option(&self.categories, &self.query.category);
        self.set_category(next);
    }

    pub fn cycle_uploader(&mut self) {
        let next = cycle_option(&self.uploaders, &self.query.uploader);
        self.set_uploader(next);
    }

    pub fn active_filters(&self) -> Vec<(FilterKind, String)> {
        [
            (FilterKind::Search, &self.query.search),
            (FilterKind::Category, &self.query.category),
            (FilterKind::Uploader, &self.query.uploader),
        ]
        .into_iter()
        .filter(|(_, value)| !value.trim().is_empty())
        .map(|(kind, value)| (kind, value.trim().to_string()))
        .collect()
    }

    pub fn has_filters(&self) -> bool {
        !self.active_filters().is_empty()
    }

    pub fn clear_filter(&mut self, kind: FilterKind) {
        self.update(|query| match kind {
            FilterKind::Search => query.search.clear(),
            FilterKind::Category => query.category.clear(),
            FilterKind::Uploader => query.uploader.clear(),
        });
    }

    pub fn clear_filters(&mut self) {
        self.update(|query| {
            query.search.clear();
            query.category.clear();
            query.uploader.clear();
        });
    }

    /// Manual retry, also used after deletes and saves.
    pub fn invalidate(&mut self) {
        self.dirty = true;
    }

    /// Starts a request if anything changed since the last one.
    pub fn take_fetch(&mut self) -> Option<FetchTicket> {
        if !self.dirty {
            return None;
        }
        self.dirty = false;
        self.generation += 1;
        self.state = LoadState::Loading;
        Some(FetchTicket {
            generation: self.generation,
            query: self.query.clone(),
        })
    }

    /// Applies a listing result. Returns false when the ticket was superseded.
    pub fn apply(&mut self, generation: u64, result: Result<ListResponse, ApiError>) -> bool {
        if generation != self.generation {
            debug!(generation, current = self.generation, "dropping stale listing");
            return false;
        }
        match result {
            Ok(response) => {
                self.videos = response
                    .videos
                    .iter()
                    .map(|record| normalize(record, &self.origin))
                    .collect();
                let videos = &response.videos;
                self.categories = distinct(videos.iter().filter_map(|v| v.category.as_deref()));
                self.uploaders = distinct(videos.iter().filter_map(|v| v.uploader.as_deref()));
                self.state = LoadState::Loaded;
            }
            Err(ApiError::Cancelled) => {
                self.state = LoadState::Idle;
                self.dirty = true;
            }
            Err(err) => {
                warn!(error = %err, "library listing failed");
                self.state = LoadState::Failed(err.to_string());
            }
        }
        true
    }

    /// Fetch-and-apply in one step for callers that can simply await.
    pub async fn load(
        &mut self,
        backend: &Arc<dyn Backend>,
        cancel: &CancellationToken,
    ) -> &LoadState {
        if let Some(ticket) = self.take_fetch() {
            let query = ticket.query;
            let result = api::call(backend, cancel, move |b| b.list(&query)).await;
            self.apply(ticket.generation, result);
        }
        &self.state
    }

    /// Server results after the case-insensitive title filter and the
    /// optional local date sort. Grid and list both render this sequence.
    pub fn visible(&self) -> Vec<&Video> {
        let needle = self.query.search.trim().to_lowercase();
        let mut visible: Vec<&Video> = self
            .videos
            .iter()
            .filter(|video| needle.is_empty() || video.title.to_lowercase().contains(&needle))
            .collect();
        if let Some(order) = self.local_date_sort {
            visible.sort_by(|a, b| match (a.saved_at, b.saved_at) {
                (Some(x), Some(y)) => match order {
                    SortOrder::Desc => y.cmp(&x),
                    SortOrder::Asc => x.cmp(&y),
                },
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            });
        }
        visible
    }

    pub fn visible_ids(&self) -> Vec<String> {
        self.visible().iter().map(|video| video.id.clone()).collect()
    }

    pub fn find(&self, id: &str) -> Option<&Video> {
        self.videos.iter().find(|video| video.id == id)
    }

    /// Header line, e.g. `4 video(s) in your collection • 2 selected`.
    pub fn summary_line(&self, language: Language, selected: Option<usize>) -> String {
        let mut line = tf(
            language,
            "library.count",
            &[("count", self.visible().len().to_string())],
        );
        match selected {
            Some(0) => {
                line.push_str(" • ");
                line.push_str(t(language, "library.select_hint"));
            }
            Some(count) => {
                line.push_str(" • ");
                line.push_str(&tf(language, "library.selected", &[("count", count.to_string())]));
            }
            None => {}
        }
        line
    }

    /// Catalog key of the placeholder to show instead of videos, if any.
    pub fn empty_state_key(&self) -> Option<&'static str> {
        match &self.state {
            LoadState::Loading if self.videos.is_empty() => Some("library.loading"),
            LoadState::Failed(_) => Some("library.error"),
            _ if !self.visible().is_empty() => None,
            _ if self.has_filters() => Some("library.no_match"),
            LoadState::Loaded => Some("library.empty"),
            _ => None,
        }
    }
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    values
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn cycle_option(options: &[String], current: &str) -> String {
    if current.is_empty() {
        return options.first().cloned().unwrap_or_default();
    }
    match options.iter().position(|option| option == current) {
        Some(idx) => options.get(idx + 1).cloned().unwrap_or_default(),
        None => String::new(),
    }
}

/// The three most recently saved videos shown on the home page.
#[derive(Debug, Clone)]
pub struct RecentVideos {
    origin: String,
    videos: Vec<Video>,
    state: LoadState,
}

impl RecentVideos {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            videos: Vec::new(),
            state: LoadState::Idle,
        }
    }

    pub fn query() -> ListQuery {
        ListQuery::newest()
    }

    pub fn videos(&self) -> &[Video] {
        &self.videos
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn begin(&mut self) {
        self.state = LoadState::Loading;
    }

    pub fn apply(&mut self, result: Result<ListResponse, ApiError>) {
        match result {
            Ok(response) => {
                self.videos = response
                    .videos
                    .iter()
                    .take(RECENT_LIMIT)
                    .map(|record| normalize(record, &self.origin))
                    .collect();
                self.state = LoadState::Loaded;
            }
            Err(ApiError::Cancelled) => self.state = LoadState::Idle,
            Err(err) => {
                warn!(error = %err, "recent videos listing failed");
                self.state = LoadState::Failed(err.to_string());
            }
        }
    }

    pub async fn load(&mut self, backend: &Arc<dyn Backend>, cancel: &CancellationToken) {
        self.begin();
        let query = Self::query();
        let result = api::call(backend, cancel, move |b| b.list(&query)).await;
        self.apply(result);
    }
}
