#![forbid(unsafe_code)]

//! Library page: filters, grid/list rendering, selection mode and the
//! delete confirmation.

use super::{Outcome, centered_rect, edit_text, key_press, truncate};
use crate::error::DeleteError;
use crate::i18n::{Language, t};
use crate::library::{FilterKind, LibraryView, ViewMode};
use crate::normalize::Video;
use crate::selection::{SelectionCommand, SelectionController, SelectionKey, confirm_message};
use crate::tui::theme;
use crossterm::event::{Event, KeyCode};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState, Wrap},
};

pub const GRID_COLUMNS: usize = 3;
const CARD_HEIGHT: u16 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryCommand {
    Open(String),
    Delete(Vec<String>),
    /// Manual reload of the list and anything else showing videos.
    Reload,
    /// View mode or server sort changed and should be persisted.
    PrefsChanged,
}

pub struct LibraryPage {
    pub library: LibraryView,
    pub selection: SelectionController,
    cursor: usize,
    search_editing: bool,
    confirm: Option<usize>,
    deleting: bool,
}

impl LibraryPage {
    pub fn new(library: LibraryView) -> Self {
        Self {
            library,
            selection: SelectionController::new(),
            cursor: 0,
            search_editing: false,
            confirm: None,
            deleting: false,
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_confirming(&self) -> bool {
        self.confirm.is_some()
    }

    pub fn is_deleting(&self) -> bool {
        self.deleting
    }

    pub fn is_editing(&self) -> bool {
        self.search_editing
    }

    /// Applies the outcome of a batch delete started by
    /// [`LibraryCommand::Delete`].
    pub fn finish_delete(
        &mut self,
        result: Result<Vec<String>, DeleteError>,
    ) -> Result<usize, DeleteError> {
        self.deleting = false;
        self.selection.settle(result, &mut self.library)
    }

    fn clamp_cursor(&mut self) {
        let len = self.library.visible().len();
        self.cursor = self.cursor.min(len.saturating_sub(1));
    }

    fn move_cursor(&mut self, delta: isize) {
        let len = self.library.visible().len();
        if len == 0 {
            self.cursor = 0;
            return;
        }
        let next = self.cursor as isize + delta;
        self.cursor = next.clamp(0, len as isize - 1) as usize;
    }

    fn current_id(&self) -> Option<String> {
        self.library
            .visible()
            .get(self.cursor)
            .map(|video| video.id.clone())
    }

    pub fn handle_input(&mut self, event: &Event) -> Outcome<LibraryCommand> {
        if self.deleting {
            return Outcome::Consumed;
        }
        if self.confirm.is_some() {
            return self.handle_confirm(event);
        }
        if self.search_editing {
            return self.handle_search(event);
        }
        let Some(key) = key_press(event) else {
            return Outcome::Ignored;
        };

        if self.selection.is_selecting()
            && let Some(shortcut) = SelectionKey::from_event(key)
        {
            let visible = self.library.visible_ids();
            if let SelectionCommand::ConfirmDelete(count) =
                self.selection.handle_key(shortcut, &visible)
            {
                self.confirm = Some(count);
            }
            return Outcome::Consumed;
        }

        let step = match self.library.view_mode {
            ViewMode::Grid => GRID_COLUMNS as isize,
            ViewMode::List => 1,
        };
        match key.code {
            KeyCode::Up => self.move_cursor(-step),
            KeyCode::Down => self.move_cursor(step),
            KeyCode::Left => self.move_cursor(-1),
            KeyCode::Right => self.move_cursor(1),
            KeyCode::Home => self.cursor = 0,
            KeyCode::Char('/') => self.search_editing = true,
            KeyCode::Char('c') => self.library.cycle_category(),
            KeyCode::Char('u') => self.library.cycle_uploader(),
            KeyCode::Char('x') => self.library.clear_filters(),
            KeyCode::Char('d') => self.library.cycle_local_date_sort(),
            KeyCode::Char('r') => {
                self.library.invalidate();
                return Outcome::Run(LibraryCommand::Reload);
            }
            KeyCode::Char('s') => {
                let query = self.library.query();
                self.library.set_sort(query.sort_by.next(), query.order);
                return Outcome::Run(LibraryCommand::PrefsChanged);
            }
            KeyCode::Char('o') => {
                let query = self.library.query();
                self.library.set_sort(query.sort_by, query.order.flip());
                return Outcome::Run(LibraryCommand::PrefsChanged);
            }
            KeyCode::Char('v') => {
                self.library.view_mode = self.library.view_mode.toggle();
                return Outcome::Run(LibraryCommand::PrefsChanged);
            }
            KeyCode::Char('m') => {
                if self.selection.is_selecting() {
                    self.selection.exit();
                } else {
                    self.selection.enter();
                }
            }
            KeyCode::Char(' ') if self.selection.is_selecting() => {
                if let Some(id) = self.current_id() {
                    self.selection.toggle(&id);
                }
            }
            KeyCode::Enter => {
                let Some(id) = self.current_id() else {
                    return Outcome::Consumed;
                };
                if self.selection.is_selecting() {
                    self.selection.toggle(&id);
                } else {
                    return Outcome::Run(LibraryCommand::Open(id));
                }
            }
            _ => return Outcome::Ignored,
        }
        self.clamp_cursor();
        Outcome::Consumed
    }

    fn handle_confirm(&mut self, event: &Event) -> Outcome<LibraryCommand> {
        let Some(key) = key_press(event) else {
            return Outcome::Consumed;
        };
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                self.confirm = None;
                self.deleting = true;
                Outcome::Run(LibraryCommand::Delete(self.selection.ids()))
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                self.confirm = None;
                Outcome::Consumed
            }
            _ => Outcome::Consumed,
        }
    }

    fn handle_search(&mut self, event: &Event) -> Outcome<LibraryCommand> {
        if let Some(key) = key_press(event)
            && matches!(key.code, KeyCode::Enter | KeyCode::Esc)
        {
            self.search_editing = false;
            return Outcome::Consumed;
        }
        let mut search = self.library.query().search.clone();
        if !edit_text(&mut search, event) {
            return Outcome::Ignored;
        }
        self.library.set_search(search);
        self.clamp_cursor();
        Outcome::Consumed
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, language: Language) {
        let chips = self.library.active_filters();
        let [header, controls, chip_row, body, help] = Layout::vertical([
            Constraint::Length(2),
            Constraint::Length(3),
            Constraint::Length(if chips.is_empty() { 0 } else { 1 }),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .areas(area);

        let selected = self
            .selection
            .is_selecting()
            .then(|| self.selection.len());
        frame.render_widget(
            Paragraph::new(vec![
                Line::from(Span::styled(t(language, "library.title"), theme::title())),
                Line::from(Span::styled(
                    self.library.summary_line(language, selected),
                    theme::muted(),
                )),
            ]),
            header,
        );

        self.render_controls(frame, controls, language);

        if !chips.is_empty() {
            let mut spans: Vec<Span> = Vec::new();
            for (kind, value) in chips {
                let label = match kind {
                    FilterKind::Search => t(language, "library.search"),
                    FilterKind::Category => t(language, "library.category"),
                    FilterKind::Uploader => t(language, "library.uploader"),
                };
                spans.push(Span::styled(format!(" {label}: {value} "), theme::selected()));
                spans.push(Span::raw(" "));
            }
            spans.push(Span::styled(
                format!("[x] {}", t(language, "library.clear_filters")),
                theme::key_hint(),
            ));
            frame.render_widget(Paragraph::new(Line::from(spans)), chip_row);
        }

        if let Some(key) = self.library.empty_state_key() {
            self.render_placeholder(frame, body, language, key);
        } else {
            match self.library.view_mode {
                ViewMode::Grid => self.render_grid(frame, body),
                ViewMode::List => self.render_list(frame, body, language),
            }
        }

        let help_key = if self.selection.is_selecting() {
            "help.selecting"
        } else {
            "help.library"
        };
        frame.render_widget(
            Paragraph::new(Span::styled(t(language, help_key), theme::key_hint())),
            help,
        );

        if let Some(count) = self.confirm {
            self.render_confirm(frame, area, language, count);
        }
    }

    fn render_controls(&self, frame: &mut Frame, area: Rect, language: Language) {
        let query = self.library.query();
        let all = t(language, "library.all");
        let or_all = |value: &str| {
            if value.is_empty() {
                all.to_string()
            } else {
                value.to_string()
            }
        };
        let search_style = if self.search_editing {
            theme::highlight()
        } else {
            theme::text()
        };
        let local = match self.library.local_date_sort() {
            Some(order) => t(language, order.label_key()),
            None => "-",
        };
        let line = Line::from(vec![
            Span::styled("[/] ", theme::key_hint()),
            Span::styled(
                if query.search.is_empty() && !self.search_editing {
                    t(language, "library.search").to_string()
                } else {
                    format!("{}_", query.search)
                },
                search_style,
            ),
            Span::styled("  [c] ", theme::key_hint()),
            Span::styled(
                format!("{}: {}", t(language, "library.category"), or_all(&query.category)),
                theme::text(),
            ),
            Span::styled("  [u] ", theme::key_hint()),
            Span::styled(
                format!("{}: {}", t(language, "library.uploader"), or_all(&query.uploader)),
                theme::text(),
            ),
            Span::styled("  [s/o] ", theme::key_hint()),
            Span::styled(
                format!(
                    "{}: {} {}",
                    t(language, "library.sort"),
                    t(language, query.sort_by.label_key()),
                    t(language, query.order.label_key())
                ),
                theme::text(),
            ),
            Span::styled("  [d] ", theme::key_hint()),
            Span::styled(format!("{}: {local}", t(language, "library.local_sort")), theme::text()),
            Span::styled("  [v] ", theme::key_hint()),
            Span::styled(t(language, self.library.view_mode.label_key()), theme::text()),
        ]);
        let block = if self.search_editing {
            theme::block_focused("")
        } else {
            theme::block_default("")
        };
        frame.render_widget(Paragraph::new(line).block(block), area);
    }

    fn render_placeholder(
        &self,
        frame: &mut Frame,
        area: Rect,
        language: Language,
        key: &'static str,
    ) {
        let mut lines = vec![
            Line::default(),
            Line::from(Span::styled(t(language, key), theme::heading())),
        ];
        match key {
            "library.error" => lines.push(Line::from(Span::styled(
                format!("[r] {}", t(language, "library.retry")),
                theme::key_hint(),
            ))),
            "library.no_match" => lines.push(Line::from(Span::styled(
                format!("[x] {}", t(language, "library.clear_filters")),
                theme::key_hint(),
            ))),
            "library.empty" => lines.push(Line::from(Span::styled(
                t(language, "library.empty_hint"),
                theme::muted(),
            ))),
            _ => {}
        }
        frame.render_widget(
            Paragraph::new(lines)
                .alignment(ratatui::layout::Alignment::Center)
                .wrap(Wrap { trim: true }),
            area,
        );
    }

    fn card_style(
        &self,
        idx: usize,
        video: &Video,
    ) -> (ratatui::style::Style, ratatui::style::Style) {
        let border = if idx == self.cursor {
            theme::highlight()
        } else {
            theme::dim()
        };
        let body = if self.selection.is_selected(&video.id) {
            theme::selected()
        } else {
            theme::text()
        };
        (border, body)
    }

    fn render_grid(&self, frame: &mut Frame, area: Rect) {
        let visible = self.library.visible();
        let rows_fit = usize::from((area.height / CARD_HEIGHT).max(1));
        let cursor_row = self.cursor / GRID_COLUMNS;
        let first_row = cursor_row.saturating_sub(rows_fit - 1);
        let row_areas =
            Layout::vertical(vec![Constraint::Length(CARD_HEIGHT); rows_fit]).split(area);

        for (slot, row_area) in row_areas.iter().enumerate() {
            let row = first_row + slot;
            let cells = Layout::horizontal(vec![
                Constraint::Ratio(1, GRID_COLUMNS as u32);
                GRID_COLUMNS
            ])
            .split(*row_area);
            for (col, cell) in cells.iter().enumerate() {
                let idx = row * GRID_COLUMNS + col;
                let Some(video) = visible.get(idx) else {
                    return;
                };
                let (border, body) = self.card_style(idx, video);
                let width = cell.width.saturating_sub(4) as usize;
                let marker = if self.selection.is_selected(&video.id) {
                    "✓ "
                } else {
                    ""
                };
                let block = Block::default()
                    .borders(Borders::ALL)
                    .border_style(border)
                    .title(format!(" {marker}{} ", truncate(&video.title, width)));
                let lines = vec![
                    Line::from(Span::styled(
                        format!("{}  {}  {}", video.duration, video.format, video.file_size),
                        body,
                    )),
                    Line::from(Span::styled(
                        format!("{}  {}", video.source, video.downloaded_at),
                        theme::muted(),
                    )),
                    Line::from(Span::styled(
                        truncate(video.details.uploader.as_deref().unwrap_or(""), width),
                        theme::dim(),
                    )),
                ];
                frame.render_widget(Paragraph::new(lines).block(block), *cell);
            }
        }
    }

    fn render_list(&self, frame: &mut Frame, area: Rect, language: Language) {
        let visible = self.library.visible();
        let rows: Vec<Row> = visible
            .iter()
            .enumerate()
            .map(|(idx, video)| {
                let (_, body) = self.card_style(idx, video);
                let marker = if self.selection.is_selected(&video.id) {
                    "✓"
                } else {
                    ""
                };
                Row::new(vec![
                    Cell::from(marker),
                    Cell::from(video.title.clone()),
                    Cell::from(video.duration.clone()),
                    Cell::from(video.format.clone()),
                    Cell::from(video.file_size.clone()),
                    Cell::from(video.details.view_count.clone()),
                    Cell::from(video.downloaded_at.clone()),
                ])
                .style(body)
            })
            .collect();
        let header = Row::new(vec![
            "",
            t(language, "sort.title"),
            t(language, "detail.duration"),
            t(language, "detail.format"),
            t(language, "detail.size"),
            t(language, "detail.views"),
            t(language, "detail.downloaded"),
        ])
        .style(theme::heading());
        let table = Table::new(
            rows,
            [
                Constraint::Length(2),
                Constraint::Min(20),
                Constraint::Length(9),
                Constraint::Length(16),
                Constraint::Length(10),
                Constraint::Length(8),
                Constraint::Length(14),
            ],
        )
        .header(header)
        .row_highlight_style(theme::highlight());
        let mut state = TableState::default().with_selected(Some(self.cursor));
        frame.render_stateful_widget(table, area, &mut state);
    }

    fn render_confirm(&self, frame: &mut Frame, area: Rect, language: Language, count: usize) {
        let modal = centered_rect(50, 30, area);
        let lines = vec![
            Line::default(),
            Line::from(Span::styled(confirm_message(language, count), theme::text())),
            Line::default(),
            Line::from(vec![
                Span::styled(format!("[y] {}", t(language, "confirm.yes")), theme::error()),
                Span::raw("   "),
                Span::styled(format!("[n] {}", t(language, "confirm.no")), theme::muted()),
            ]),
        ];
        frame.render_widget(Clear, modal);
        frame.render_widget(
            Paragraph::new(lines)
                .wrap(Wrap { trim: true })
                .block(theme::block_focused(t(language, "selection.delete"))),
            modal,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiVideo, ListResponse};
    use crate::error::ApiError;
    use crate::tui::views::keys::{chars, ctrl, press};

    fn page_with(count: usize) -> LibraryPage {
        let mut library = LibraryView::new("http://h");
        let ticket = library.take_fetch().unwrap();
        let videos = (1..=count)
            .map(|i| ApiVideo {
                id: format!("v{i}"),
                video_page_name: format!("Video {i}"),
                ..ApiVideo::default()
            })
            .collect();
        library.apply(
            ticket.generation,
            Ok(ListResponse {
                videos,
                total_videos: None,
            }),
        );
        LibraryPage::new(library)
    }

    #[test]
    fn enter_opens_video_under_cursor() {
        let mut page = page_with(4);
        page.handle_input(&press(KeyCode::Right));
        assert_eq!(
            page.handle_input(&press(KeyCode::Enter)),
            Outcome::Run(LibraryCommand::Open("v2".into()))
        );
        page.handle_input(&press(KeyCode::Down));
        assert_eq!(page.cursor(), 3);
        page.handle_input(&press(KeyCode::Down));
        assert_eq!(page.cursor(), 3);
    }

    #[test]
    fn selection_flow_asks_before_deleting() {
        let mut page = page_with(3);
        page.handle_input(&press(KeyCode::Char('m')));
        assert!(page.selection.is_selecting());
        page.handle_input(&ctrl('a'));
        assert_eq!(page.selection.len(), 3);
        page.handle_input(&press(KeyCode::Delete));
        assert!(page.is_confirming());
        assert_eq!(page.handle_input(&press(KeyCode::Char('n'))), Outcome::Consumed);
        assert!(!page.is_confirming());

        page.handle_input(&press(KeyCode::Backspace));
        assert_eq!(
            page.handle_input(&press(KeyCode::Char('y'))),
            Outcome::Run(LibraryCommand::Delete(vec!["v1".into(), "v2".into(), "v3".into()]))
        );
        assert!(page.is_deleting());
        assert_eq!(page.handle_input(&press(KeyCode::Esc)), Outcome::Consumed);
    }

    #[test]
    fn enter_toggles_while_selecting() {
        let mut page = page_with(2);
        page.handle_input(&press(KeyCode::Char('m')));
        assert_eq!(page.handle_input(&press(KeyCode::Enter)), Outcome::Consumed);
        assert!(page.selection.is_selected("v1"));
        page.handle_input(&press(KeyCode::Char(' ')));
        assert!(!page.selection.is_selected("v1"));
        page.handle_input(&press(KeyCode::Esc));
        assert!(!page.selection.is_selecting());
    }

    #[test]
    fn partial_delete_keeps_unfinished_ids_selected() {
        let mut page = page_with(3);
        page.handle_input(&press(KeyCode::Char('m')));
        page.handle_input(&ctrl('a'));
        page.handle_input(&press(KeyCode::Delete));
        page.handle_input(&press(KeyCode::Enter));
        let err = page
            .finish_delete(Err(DeleteError {
                deleted: vec!["v1".into()],
                failed_id: "v2".into(),
                source: ApiError::Transport("refused".into()),
            }))
            .unwrap_err();
        assert_eq!(err.failed_id, "v2");
        assert!(!page.is_deleting());
        assert_eq!(page.selection.ids(), vec!["v2".to_string(), "v3".to_string()]);
        assert!(!page.library.needs_fetch());

        assert_eq!(page.finish_delete(Ok(vec!["v2".into(), "v3".into()])).unwrap(), 2);
        assert!(!page.selection.is_selecting());
        assert!(page.library.needs_fetch());
    }

    #[test]
    fn search_mode_captures_typing() {
        let mut page = page_with(12);
        page.handle_input(&press(KeyCode::Char('/')));
        assert!(page.is_editing());
        for event in chars("video 1") {
            page.handle_input(&event);
        }
        page.handle_input(&press(KeyCode::Enter));
        assert!(!page.is_editing());
        assert_eq!(page.library.query().search, "video 1");
        assert_eq!(page.library.visible().len(), 4);
        assert!(page.library.needs_fetch());
    }

    #[test]
    fn sort_and_view_changes_ask_to_persist() {
        let mut page = page_with(1);
        assert_eq!(
            page.handle_input(&press(KeyCode::Char('v'))),
            Outcome::Run(LibraryCommand::PrefsChanged)
        );
        assert_eq!(page.library.view_mode, ViewMode::List);
        page.handle_input(&press(KeyCode::Char('o')));
        assert_eq!(page.library.query().order, crate::api::SortOrder::Asc);
    }
}
