#![forbid(unsafe_code)]

//! Home page: the upload form, pipeline progress and recent videos.

use super::{Outcome, edit_text, key_press, truncate};
use crate::i18n::{Language, t};
use crate::library::{LoadState, RecentVideos};
use crate::pipeline::{PipelineStatus, ProgressSnapshot};
use crate::tui::theme;
use crate::upload::{AnalyzeState, Submission, UploadForm};
use crossterm::event::{Event, KeyCode, KeyModifiers};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    text::{Line, Span},
    widgets::{Gauge, List, ListItem, Paragraph, Wrap},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HomeCommand {
    Analyze(String),
    Submit(Submission),
    Cancel,
    OpenRecent(usize),
    ReloadRecents,
}

pub struct HomeView {
    pub form: UploadForm,
    pub recents: RecentVideos,
    recents_dirty: bool,
}

impl HomeView {
    pub fn new(origin: &str) -> Self {
        Self {
            form: UploadForm::new(),
            recents: RecentVideos::new(origin),
            recents_dirty: true,
        }
    }

    pub fn mark_recents_dirty(&mut self) {
        self.recents_dirty = true;
    }

    /// True once per pending reload; the caller starts the request.
    pub fn take_recents_reload(&mut self) -> bool {
        if !self.recents_dirty || self.recents.state().is_loading() {
            return false;
        }
        self.recents_dirty = false;
        self.recents.begin();
        true
    }

    pub fn handle_input(&mut self, event: &Event, busy: bool) -> Outcome<HomeCommand> {
        if let Some(key) = key_press(event) {
            match key.code {
                KeyCode::Esc if busy => return Outcome::Run(HomeCommand::Cancel),
                KeyCode::Esc if self.form.selector_open() => {
                    self.form.toggle_selector();
                    return Outcome::Consumed;
                }
                KeyCode::Esc => {
                    self.form.set_url("");
                    return Outcome::Consumed;
                }
                KeyCode::Enter => return self.on_enter(),
                KeyCode::Up | KeyCode::Down => {
                    if self.form.options().is_empty() || self.form.is_submitting() {
                        return Outcome::Consumed;
                    }
                    if !self.form.selector_open() {
                        self.form.toggle_selector();
                    } else if key.code == KeyCode::Up {
                        self.form.choose_prev();
                    } else {
                        self.form.choose_next();
                    }
                    return Outcome::Consumed;
                }
                KeyCode::F(5) => return Outcome::Run(HomeCommand::ReloadRecents),
                KeyCode::Char(c @ '1'..='3') if key.modifiers.contains(KeyModifiers::ALT) => {
                    let idx = (c as usize) - ('1' as usize);
                    if idx < self.recents.videos().len() {
                        return Outcome::Run(HomeCommand::OpenRecent(idx));
                    }
                    return Outcome::Consumed;
                }
                _ => {}
            }
        }

        if self.form.is_submitting() {
            return Outcome::Ignored;
        }
        let mut url = self.form.url().to_string();
        if !edit_text(&mut url, event) {
            return Outcome::Ignored;
        }
        match self.form.set_url(url) {
            Some(target) => Outcome::Run(HomeCommand::Analyze(target)),
            None => Outcome::Consumed,
        }
    }

    fn on_enter(&mut self) -> Outcome<HomeCommand> {
        if self.form.selector_open() {
            if let Some(idx) = self.form.chosen_index() {
                self.form.choose(idx);
            } else {
                self.form.toggle_selector();
            }
            return Outcome::Consumed;
        }
        if matches!(self.form.analyze_state(), AnalyzeState::Failed(_)) {
            return match self.form.retry_analysis() {
                Some(url) => Outcome::Run(HomeCommand::Analyze(url)),
                None => Outcome::Consumed,
            };
        }
        match self.form.begin_submit() {
            Ok(submission) => Outcome::Run(HomeCommand::Submit(submission)),
            Err(_) => Outcome::Consumed,
        }
    }

    pub fn render(
        &self,
        frame: &mut Frame,
        area: Rect,
        language: Language,
        progress: ProgressSnapshot,
    ) {
        let selector_height = if self.form.selector_open() {
            self.form.options().len() as u16 + 2
        } else {
            3
        };
        let [header, input, hint, quality, action, recents, help] = Layout::vertical([
            Constraint::Length(2),
            Constraint::Length(3),
            Constraint::Length(1),
            Constraint::Length(selector_height),
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .areas(area);

        frame.render_widget(
            Paragraph::new(vec![
                Line::from(Span::styled(t(language, "upload.title"), theme::title())),
                Line::from(Span::styled(t(language, "upload.subtitle"), theme::muted())),
            ]),
            header,
        );

        let url_text = if self.form.url().is_empty() {
            Span::styled(t(language, "upload.placeholder"), theme::dim())
        } else {
            Span::styled(self.form.url(), theme::text())
        };
        frame.render_widget(
            Paragraph::new(Line::from(url_text))
                .block(theme::block_focused(t(language, "upload.url_label"))),
            input,
        );

        frame.render_widget(Paragraph::new(self.hint_line(language)), hint);
        self.render_quality(frame, quality, language);
        self.render_action(frame, action, language, progress);
        self.render_recents(frame, recents, language);
        frame.render_widget(
            Paragraph::new(Span::styled(t(language, "help.home"), theme::key_hint())),
            help,
        );
    }

    fn hint_line(&self, language: Language) -> Line<'static> {
        if self.form.shows_invalid_hint() {
            return Line::from(Span::styled(t(language, "upload.invalid_url"), theme::error()));
        }
        match self.form.analyze_state() {
            AnalyzeState::Analyzing => {
                Line::from(Span::styled(t(language, "upload.analyzing"), theme::muted()))
            }
            AnalyzeState::NoFormats => {
                Line::from(Span::styled(t(language, "upload.no_formats"), theme::error()))
            }
            AnalyzeState::Failed(reason) => Line::from(vec![
                Span::styled(t(language, "upload.analyze_error"), theme::error()),
                Span::styled(format!(" ({reason})"), theme::dim()),
            ]),
            AnalyzeState::Idle | AnalyzeState::Ready => Line::default(),
        }
    }

    fn render_quality(&self, frame: &mut Frame, area: Rect, language: Language) {
        let block = theme::block_default(t(language, "upload.quality"));
        if !self.form.selector_open() {
            let line = match self.form.chosen() {
                Some(option) => Line::from(vec![
                    Span::styled(option.label.clone(), theme::text()),
                    Span::styled(format!("  {}", option.size), theme::muted()),
                ]),
                None => Line::from(Span::styled("-", theme::dim())),
            };
            frame.render_widget(Paragraph::new(line).block(block), area);
            return;
        }
        let items: Vec<ListItem> = self
            .form
            .options()
            .iter()
            .enumerate()
            .map(|(idx, option)| {
                let style = if Some(idx) == self.form.chosen_index() {
                    theme::highlight()
                } else {
                    theme::text()
                };
                ListItem::new(Line::from(vec![
                    Span::styled(option.label.clone(), style),
                    Span::styled(format!("  {}", option.size), theme::muted()),
                ]))
            })
            .collect();
        frame.render_widget(List::new(items).block(block), area);
    }

    fn render_action(
        &self,
        frame: &mut Frame,
        area: Rect,
        language: Language,
        progress: ProgressSnapshot,
    ) {
        if progress.processing || progress.status != PipelineStatus::Idle {
            let label = progress
                .status
                .label_key()
                .map(|key| t(language, key))
                .unwrap_or_else(|| t(language, "upload.processing"));
            let style = match progress.status {
                PipelineStatus::Failed => theme::error(),
                PipelineStatus::Completed => theme::success(),
                _ => theme::highlight(),
            };
            frame.render_widget(
                Gauge::default()
                    .block(theme::block_default(t(language, "upload.processing")))
                    .gauge_style(style)
                    .percent(u16::from(progress.progress.min(100)))
                    .label(format!("{label} {}%", progress.progress)),
                area,
            );
            return;
        }
        let style = if self.form.can_submit() {
            theme::highlight()
        } else {
            theme::dim()
        };
        frame.render_widget(
            Paragraph::new(Line::from(Span::styled(
                format!("[Enter] {}", t(language, "upload.submit")),
                style,
            )))
            .block(theme::block_default("")),
            area,
        );
    }

    fn render_recents(&self, frame: &mut Frame, area: Rect, language: Language) {
        let block = theme::block_default(t(language, "recent.title"));
        let placeholder = match self.recents.state() {
            LoadState::Loading if self.recents.videos().is_empty() => {
                Some(Span::styled(t(language, "library.loading"), theme::muted()))
            }
            LoadState::Failed(reason) => Some(Span::styled(
                format!(
                    "{} ({reason}) [F5] {}",
                    t(language, "library.error"),
                    t(language, "library.retry")
                ),
                theme::error(),
            )),
            _ if self.recents.videos().is_empty() => {
                Some(Span::styled(t(language, "recent.empty"), theme::muted()))
            }
            _ => None,
        };
        if let Some(span) = placeholder {
            frame.render_widget(
                Paragraph::new(Line::from(span))
                    .wrap(Wrap { trim: true })
                    .block(block),
                area,
            );
            return;
        }

        let width = area.width.saturating_sub(24) as usize;
        let items: Vec<ListItem> = self
            .recents
            .videos()
            .iter()
            .enumerate()
            .map(|(idx, video)| {
                ListItem::new(Line::from(vec![
                    Span::styled(format!("Alt+{} ", idx + 1), theme::key_hint()),
                    Span::styled(truncate(&video.title, width), theme::text()),
                    Span::styled(
                        format!("  {}  {}", video.duration, video.downloaded_at),
                        theme::muted(),
                    ),
                ]))
            })
            .collect();
        frame.render_widget(List::new(items).block(block), area);
    }
}
