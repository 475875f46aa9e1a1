#![forbid(unsafe_code)]

use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use crossterm::event::{Event, EventStream, KeyCode, KeyModifiers};
use futures::StreamExt;
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Clear, Paragraph, Tabs},
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use super::events::{AppEvent, MAX_NOTIFICATIONS, Notification, NotificationLevel};
use super::theme;
use super::views::config::{ConfigCommand, ConfigView};
use super::views::home::{HomeCommand, HomeView};
use super::views::library::{LibraryCommand, LibraryPage};
use super::views::{self, Outcome, key_press};
use crate::api::{self, Backend};
use crate::config::Settings;
use crate::cookies::{DEFAULT_COOKIE_SITE, read_cookie_jar, submit_browser, submit_pasted};
use crate::events::{RefreshBus, RefreshReason};
use crate::i18n::{Language, t, tf};
use crate::library::{LibraryView, RecentVideos};
use crate::pipeline::{Pipeline, ProgressStore};
use crate::player::{PlayerModal, download_video, open_original};
use crate::prefs::Preferences;
use crate::selection::delete_batch;
use crate::shell::{Page, Shell};
use crate::upload::Submission;

/// Central application state (Elm architecture).
pub struct AppState {
    pub running: bool,
    pub shell: Shell,
    pub home: HomeView,
    pub library: LibraryPage,
    pub config: ConfigView,
    pub player: PlayerModal,
    downloading: bool,
    /// Active notifications, newest last.
    pub notifications: Vec<Notification>,
    notification_counter: u64,
    backend: Arc<dyn Backend>,
    pipeline: Pipeline,
    bus: RefreshBus,
    settings: Settings,
    prefs: Preferences,
    cookie_site: Url,
    /// Parent of every background request; cancelled on quit.
    root: CancellationToken,
    submission: Option<CancellationToken>,
    analysis: Option<CancellationToken>,
    event_tx: mpsc::UnboundedSender<AppEvent>,
    event_rx: mpsc::UnboundedReceiver<AppEvent>,
}

impl AppState {
    pub fn new(settings: Settings, backend: Arc<dyn Backend>) -> Result<Self> {
        let prefs = Preferences::load(&settings.prefs_path);
        let language = if settings.prefs_path.exists() {
            prefs.language
        } else {
            settings.language
        };
        let origin = settings.backend.as_str().to_string();

        let mut library = LibraryView::new(origin.as_str());
        library.view_mode = prefs.view_mode;
        library.set_sort(prefs.sort_by, prefs.order);

        let bus = RefreshBus::new();
        let pipeline = Pipeline::new(backend.clone(), ProgressStore::new(), bus.clone());
        let cookie_site = Url::parse(DEFAULT_COOKIE_SITE).context("Parsing cookie site")?;
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        Ok(Self {
            running: true,
            shell: Shell::new(language),
            home: HomeView::new(&origin),
            library: LibraryPage::new(library),
            config: ConfigView::new(),
            player: PlayerModal::new(&settings.player),
            downloading: false,
            notifications: Vec::new(),
            notification_counter: 0,
            backend,
            pipeline,
            bus,
            settings,
            prefs: Preferences { language, ..prefs },
            cookie_site,
            root: CancellationToken::new(),
            submission: None,
            analysis: None,
            event_tx,
            event_rx,
        })
    }

    /// Handle for feeding events from outside the loop, e.g. signal handlers.
    pub fn sender(&self) -> mpsc::UnboundedSender<AppEvent> {
        self.event_tx.clone()
    }

    fn language(&self) -> Language {
        self.shell.language()
    }

    // ── Elm event loop ──────────────────────────────────────────────────

    /// Main event loop: render → select → update → loop.
    pub async fn run(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
        tick_rate: Duration,
    ) -> io::Result<()> {
        let mut tick_interval = tokio::time::interval(tick_rate);
        let mut event_stream = EventStream::new();
        let mut refresh_rx = self.bus.subscribe();

        while self.running {
            terminal.draw(|frame| self.render(frame))?;

            tokio::select! {
                _ = tick_interval.tick() => {
                    self.handle_event(AppEvent::Tick);
                }
                Some(event) = self.event_rx.recv() => {
                    self.handle_event(event);
                }
                Ok(reason) = refresh_rx.recv() => {
                    self.handle_event(AppEvent::Refresh(reason));
                }
                Some(Ok(crossterm_event)) = event_stream.next() => {
                    self.handle_event(AppEvent::Input(crossterm_event));
                }
            }
        }

        self.root.cancel();
        Ok(())
    }

    /// Runs `task` in the background and feeds its event back into the loop.
    fn spawn<F>(&self, task: F)
    where
        F: Future<Output = AppEvent> + Send + 'static,
    {
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            if tx.send(task.await).is_err() {
                debug!("event loop gone, dropping background result");
            }
        });
    }

    // ── Event handling ──────────────────────────────────────────────────

    fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Tick => self.on_tick(),
            AppEvent::Input(input) => self.on_input(input),
            AppEvent::LibraryLoaded { generation, result } => {
                self.library.library.apply(generation, result);
            }
            AppEvent::RecentLoaded(result) => self.home.recents.apply(result),
            AppEvent::Analyzed { url, result } => {
                self.home.form.apply_analysis(&url, result);
            }
            AppEvent::PipelineFinished(result) => {
                self.submission = None;
                self.home.form.finish_submit();
                let language = self.language();
                match result {
                    Ok(outcome) => {
                        let completed = t(language, "pipeline.completed");
                        let message = match outcome.analyze.title() {
                            Some(title) => format!("{completed}: {title}"),
                            None => completed.to_string(),
                        };
                        self.push_notification(message, NotificationLevel::Success);
                    }
                    Err(err) if err.is_cancelled() => {}
                    Err(err) => self.push_notification(
                        format!("{err}: {}", err.source),
                        NotificationLevel::Error,
                    ),
                }
            }
            AppEvent::DeleteFinished(result) => {
                let language = self.language();
                match self.library.finish_delete(result) {
                    Ok(count) => {
                        self.bus.publish(RefreshReason::VideosDeleted);
                        self.push_notification(
                            tf(language, "selection.deleted", &[("count", count.to_string())]),
                            NotificationLevel::Success,
                        );
                    }
                    Err(err) => {
                        if !err.deleted.is_empty() {
                            self.home.mark_recents_dirty();
                        }
                        self.push_notification(err.to_string(), NotificationLevel::Error);
                    }
                }
            }
            AppEvent::CookiesUpdated(status) => self.config.apply_status(status),
            AppEvent::Downloaded(result) => {
                self.downloading = false;
                let language = self.language();
                match result {
                    Ok(Some(path)) => self.push_notification(
                        tf(language, "player.downloaded", &[("path", path.display().to_string())]),
                        NotificationLevel::Success,
                    ),
                    Ok(None) => {}
                    Err(err) => self.push_notification(
                        format!("{}: {err}", t(language, "player.download_failed")),
                        NotificationLevel::Error,
                    ),
                }
            }
            AppEvent::Refresh(reason) => {
                debug!(?reason, "refreshing library views");
                self.library.library.invalidate();
                self.home.mark_recents_dirty();
            }
            AppEvent::Quit => self.quit(),
        }
    }

    fn quit(&mut self) {
        info!("quitting");
        self.running = false;
        self.root.cancel();
    }

    fn on_input(&mut self, event: Event) {
        let key = key_press(&event).copied();
        if let Some(key) = key
            && key.code == KeyCode::Char('c')
            && key.modifiers.contains(KeyModifiers::CONTROL)
        {
            self.quit();
            return;
        }

        if self.player.is_open() {
            self.on_player_input(&event);
            return;
        }

        if let Some(key) = key {
            match key.code {
                KeyCode::Char('l') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    self.cycle_language();
                    return;
                }
                KeyCode::Tab => {
                    self.shell.next_page();
                    return;
                }
                KeyCode::BackTab => {
                    self.shell.prev_page();
                    return;
                }
                _ => {}
            }
        }

        let handled = match self.shell.page() {
            Page::Home => {
                let busy = self.submission.is_some();
                let outcome = self.home.handle_input(&event, busy);
                self.run_home(outcome)
            }
            Page::Library => {
                let outcome = self.library.handle_input(&event);
                self.run_library(outcome)
            }
            Page::Config => {
                let outcome = self.config.handle_input(&event);
                self.run_config(outcome)
            }
        };

        if !handled && key.is_some_and(|key| key.code == KeyCode::Char('q')) {
            self.quit();
        }
    }

    fn on_player_input(&mut self, event: &Event) {
        let Some(key) = key_press(event) else {
            return;
        };
        let language = self.language();
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => self.player.close(),
            KeyCode::Char('p') | KeyCode::Enter => {
                if let Err(err) = self.player.play(&self.root) {
                    warn!(error = %err, "playback failed to start");
                    self.push_notification(err.to_string(), NotificationLevel::Error);
                }
            }
            KeyCode::Char('s') => self.player.stop(),
            KeyCode::Char('d') if !self.downloading => {
                let Some(video) = self.player.video().cloned() else {
                    return;
                };
                self.downloading = true;
                let dir = self.settings.download_dir.clone();
                let timeout = self.settings.request_timeout;
                self.spawn(async move {
                    let result =
                        tokio::task::spawn_blocking(move || download_video(&video, &dir, timeout))
                            .await
                            .map_err(|err| err.to_string())
                            .and_then(|inner| inner.map_err(|err| err.to_string()));
                    AppEvent::Downloaded(result)
                });
            }
            KeyCode::Char('o') => {
                if let Some(video) = self.player.video()
                    && let Err(err) = open_original(video)
                {
                    self.push_notification(
                        format!("{}: {err}", t(language, "player.original")),
                        NotificationLevel::Error,
                    );
                }
            }
            _ => {}
        }
    }

    fn run_home(&mut self, outcome: Outcome<HomeCommand>) -> bool {
        let command = match outcome {
            Outcome::Ignored => return false,
            Outcome::Consumed => return true,
            Outcome::Run(command) => command,
        };
        match command {
            HomeCommand::Analyze(url) => self.start_analysis(url),
            HomeCommand::Submit(submission) => self.start_submission(submission),
            HomeCommand::Cancel => {
                if let Some(token) = &self.submission {
                    info!("cancelling submission");
                    token.cancel();
                }
            }
            HomeCommand::OpenRecent(idx) => {
                if let Some(video) = self.home.recents.videos().get(idx).cloned() {
                    self.player.open(video);
                }
            }
            HomeCommand::ReloadRecents => self.home.mark_recents_dirty(),
        }
        true
    }

    fn start_analysis(&mut self, url: String) {
        if let Some(previous) = self.analysis.take() {
            previous.cancel();
        }
        let token = self.root.child_token();
        self.analysis = Some(token.clone());
        let backend = self.backend.clone();
        self.spawn(async move {
            let target = url.clone();
            let result = api::call(&backend, &token, move |b| b.analyze(&target)).await;
            AppEvent::Analyzed { url, result }
        });
    }

    fn start_submission(&mut self, submission: Submission) {
        let token = self.root.child_token();
        self.submission = Some(token.clone());
        let pipeline = self.pipeline.clone();
        info!(url = %submission.url, format = %submission.format, "submitting video");
        self.spawn(async move {
            AppEvent::PipelineFinished(pipeline.run(&submission, &token).await)
        });
    }

    fn run_library(&mut self, outcome: Outcome<LibraryCommand>) -> bool {
        let command = match outcome {
            Outcome::Ignored => return false,
            Outcome::Consumed => return true,
            Outcome::Run(command) => command,
        };
        match command {
            LibraryCommand::Open(id) => {
                if let Some(video) = self.library.library.find(&id).cloned() {
                    debug!(id = %video.id, "opening player");
                    self.player.open(video);
                }
            }
            LibraryCommand::Delete(ids) => {
                let backend = self.backend.clone();
                let token = self.root.child_token();
                info!(count = ids.len(), "deleting videos");
                self.spawn(async move {
                    AppEvent::DeleteFinished(delete_batch(&backend, &token, ids).await)
                });
            }
            LibraryCommand::Reload => {
                self.bus.publish(RefreshReason::Manual);
            }
            LibraryCommand::PrefsChanged => {
                let query = self.library.library.query();
                self.prefs.view_mode = self.library.library.view_mode;
                self.prefs.sort_by = query.sort_by;
                self.prefs.order = query.order;
                self.save_prefs();
            }
        }
        true
    }

    fn run_config(&mut self, outcome: Outcome<ConfigCommand>) -> bool {
        let command = match outcome {
            Outcome::Ignored => return false,
            Outcome::Consumed => return true,
            Outcome::Run(command) => command,
        };
        let language = self.language();
        let backend = self.backend.clone();
        let token = self.root.child_token();
        match command {
            ConfigCommand::SubmitText(text) => {
                self.spawn(async move {
                    let status =
                        submit_pasted(&backend, &token, &text, language, Utc::now()).await;
                    AppEvent::CookiesUpdated(status)
                });
            }
            ConfigCommand::ReadBrowser { demo_fallback } => {
                let jar_path = self.settings.cookie_jar.clone();
                let site = self.cookie_site.clone();
                self.spawn(async move {
                    let raw = match jar_path {
                        Some(path) => match tokio::fs::read_to_string(&path).await {
                            Ok(raw) => raw,
                            Err(err) => {
                                warn!(path = %path.display(), error = %err, "could not read jar");
                                String::new()
                            }
                        },
                        None => String::new(),
                    };
                    let jar = read_cookie_jar(&raw, &site, Utc::now(), demo_fallback);
                    AppEvent::CookiesUpdated(submit_browser(&backend, &token, jar, language).await)
                });
            }
            ConfigCommand::CycleLanguage => self.cycle_language(),
        }
        true
    }

    fn cycle_language(&mut self) {
        self.prefs.language = self.shell.cycle_language();
        self.save_prefs();
    }

    fn save_prefs(&mut self) {
        if let Err(err) = self.prefs.save(&self.settings.prefs_path) {
            warn!(error = %err, "could not save preferences");
            self.push_notification(format!("{err:#}"), NotificationLevel::Warning);
        }
    }

    // ── Notifications ───────────────────────────────────────────────────

    /// Push a notification (dedup by message, capped).
    pub fn push_notification(&mut self, message: String, level: NotificationLevel) {
        if self.notifications.iter().any(|n| n.message == message) {
            return;
        }
        self.notification_counter += 1;
        let mut notification = Notification::new(message, level);
        notification.id = self.notification_counter;
        self.notifications.push(notification);
        while self.notifications.len() > MAX_NOTIFICATIONS {
            self.notifications.remove(0);
        }
    }

    /// Tick: expire notifications and start any pending listing requests.
    fn on_tick(&mut self) {
        for n in &mut self.notifications {
            n.ttl_ticks = n.ttl_ticks.saturating_sub(1);
        }
        self.notifications.retain(|n| n.ttl_ticks > 0);

        match self.shell.page() {
            Page::Library => {
                if let Some(ticket) = self.library.library.take_fetch() {
                    let backend = self.backend.clone();
                    let token = self.root.child_token();
                    self.spawn(async move {
                        let query = ticket.query;
                        let result = api::call(&backend, &token, move |b| b.list(&query)).await;
                        AppEvent::LibraryLoaded {
                            generation: ticket.generation,
                            result,
                        }
                    });
                }
            }
            Page::Home => {
                if self.home.take_recents_reload() {
                    let backend = self.backend.clone();
                    let token = self.root.child_token();
                    self.spawn(async move {
                        let query = RecentVideos::query();
                        let result = api::call(&backend, &token, move |b| b.list(&query)).await;
                        AppEvent::RecentLoaded(result)
                    });
                }
            }
            Page::Config => {}
        }
    }

    // ── Rendering ───────────────────────────────────────────────────────

    fn render(&self, frame: &mut Frame) {
        let area = frame.area();
        let language = self.language();
        let [header, main, status] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Min(5),
            Constraint::Length(1),
        ])
        .areas(area);

        self.render_header(frame, header);
        match self.shell.page() {
            Page::Home => self
                .home
                .render(frame, main, language, self.pipeline.progress().snapshot()),
            Page::Library => self.library.render(frame, main, language),
            Page::Config => self.config.render(frame, main, language),
        }
        self.render_status_bar(frame, status);

        views::player::render(frame, area, &self.player, language, self.downloading);
        self.render_notifications(frame, area);
    }

    fn render_header(&self, frame: &mut Frame, area: Rect) {
        let language = self.language();
        let [brand, tabs] =
            Layout::horizontal([Constraint::Length(14), Constraint::Min(10)]).areas(area);
        frame.render_widget(
            Paragraph::new(Span::styled(
                format!(" {} ", t(language, "app.title")),
                theme::brand_badge(),
            )),
            brand,
        );
        let titles: Vec<&str> = Page::ALL
            .iter()
            .map(|page| t(language, page.label_key()))
            .collect();
        let selected = Page::ALL
            .iter()
            .position(|&page| page == self.shell.page())
            .unwrap_or(0);
        frame.render_widget(
            Tabs::new(titles)
                .select(selected)
                .style(theme::muted())
                .highlight_style(theme::highlight())
                .divider(" │ "),
            tabs,
        );
    }

    fn render_status_bar(&self, frame: &mut Frame, area: Rect) {
        let language = self.language();
        let progress = self.pipeline.progress().snapshot();
        let activity = match progress.status.label_key() {
            Some(key) => Span::styled(
                format!("{} {}%", t(language, key), progress.progress),
                theme::highlight(),
            ),
            None => Span::styled(t(language, "app.tagline"), theme::muted()),
        };
        let status = Line::from(vec![
            Span::styled(language.name(), theme::key_hint()),
            Span::raw(" │ "),
            activity,
            Span::raw(" │ "),
            Span::styled("Tab", theme::key_hint()),
            Span::raw(":nav "),
            Span::styled("Ctrl+L", theme::key_hint()),
            Span::raw(":lang "),
            Span::styled("Ctrl+C", theme::key_hint()),
            Span::raw(":quit"),
        ]);
        frame.render_widget(Paragraph::new(status), area);
    }

    fn render_notifications(&self, frame: &mut Frame, area: Rect) {
        if self.notifications.is_empty() {
            return;
        }

        let max_width = 50.min(area.width.saturating_sub(2));
        let height = (self.notifications.len() as u16).min(area.height);
        let x = area.width.saturating_sub(max_width + 1);
        let top = 1.min(area.height.saturating_sub(height));
        let notification_area = Rect::new(x, top, max_width, height);

        let lines: Vec<Line> = self
            .notifications
            .iter()
            .map(|n| {
                let (prefix, color) = match n.level {
                    NotificationLevel::Info => ("ℹ", theme::INFO),
                    NotificationLevel::Success => ("✓", theme::SUCCESS),
                    NotificationLevel::Warning => ("⚠", theme::WARNING),
                    NotificationLevel::Error => ("✗", theme::ERROR),
                };
                Line::from(vec![
                    Span::styled(format!(" {prefix} "), Style::default().fg(color)),
                    Span::raw(n.message.as_str()),
                ])
            })
            .collect();

        frame.render_widget(Clear, notification_area);
        frame.render_widget(Paragraph::new(lines), notification_area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{Call, ScriptedBackend};
    use crate::api::{ApiVideo, ListResponse};
    use crate::library::ViewMode;
    use crate::tui::views::keys::{ctrl, press};
    use ratatui::backend::TestBackend;
    use std::path::Path;

    fn settings(dir: &Path) -> Settings {
        Settings {
            backend: Url::parse("http://localhost:6800").unwrap(),
            language: Language::En,
            download_dir: dir.join("downloads"),
            player: "true".into(),
            request_timeout: None,
            cookie_jar: None,
            prefs_path: dir.join("prefs.toml"),
            log_dir: dir.join("logs"),
        }
    }

    fn listing(count: usize) -> ListResponse {
        ListResponse {
            videos: (1..=count)
                .map(|i| ApiVideo {
                    id: format!("v{i}"),
                    video_page_name: format!("Video {i}"),
                    video_local_url: Some(format!("/videos/v{i}.mp4")),
                    ..ApiVideo::default()
                })
                .collect(),
            total_videos: Some(count as u64),
        }
    }

    fn app(dir: &Path, scripted: &Arc<ScriptedBackend>) -> AppState {
        let backend: Arc<dyn Backend> = scripted.clone();
        AppState::new(settings(dir), backend).unwrap()
    }

    async fn next_event(app: &mut AppState) -> AppEvent {
        app.event_rx.recv().await.unwrap()
    }

    fn draw(app: &AppState) {
        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
        terminal.draw(|frame| app.render(frame)).unwrap();
    }

    #[tokio::test]
    async fn every_page_renders() {
        let dir = tempfile::tempdir().unwrap();
        let scripted = Arc::new(ScriptedBackend::default());
        scripted.list.lock().push_back(Ok(listing(4)));
        let mut app = app(dir.path(), &scripted);

        draw(&app);
        app.handle_event(AppEvent::Input(press(KeyCode::Tab)));
        assert_eq!(app.shell.page(), Page::Library);
        app.handle_event(AppEvent::Tick);
        let event = next_event(&mut app).await;
        app.handle_event(event);
        assert_eq!(app.library.library.videos().len(), 4);
        draw(&app);

        app.handle_event(AppEvent::Input(press(KeyCode::Char('v'))));
        draw(&app);

        app.handle_event(AppEvent::Input(press(KeyCode::Enter)));
        assert!(app.player.is_open());
        draw(&app);
        app.handle_event(AppEvent::Input(press(KeyCode::Esc)));
        assert!(!app.player.is_open());

        app.handle_event(AppEvent::Input(press(KeyCode::BackTab)));
        app.handle_event(AppEvent::Input(press(KeyCode::BackTab)));
        assert_eq!(app.shell.page(), Page::Config);
        draw(&app);
    }

    #[tokio::test]
    async fn language_and_view_choices_are_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let scripted = Arc::new(ScriptedBackend::default());
        let mut app = app(dir.path(), &scripted);

        app.handle_event(AppEvent::Input(ctrl('l')));
        assert_eq!(app.shell.language(), Language::Zh);
        app.handle_event(AppEvent::Input(press(KeyCode::Tab)));
        app.handle_event(AppEvent::Input(press(KeyCode::Char('v'))));

        let saved = Preferences::load(&dir.path().join("prefs.toml"));
        assert_eq!(saved.language, Language::Zh);
        assert_eq!(saved.view_mode, ViewMode::List);

        let reopened = AppState::new(settings(dir.path()), scripted.clone()).unwrap();
        assert_eq!(reopened.shell.language(), Language::Zh);
        assert_eq!(reopened.library.library.view_mode, ViewMode::List);
    }

    #[tokio::test]
    async fn confirmed_delete_notifies_and_refreshes() {
        let dir = tempfile::tempdir().unwrap();
        let scripted = Arc::new(ScriptedBackend::default());
        scripted.list.lock().push_back(Ok(listing(3)));
        let mut app = app(dir.path(), &scripted);
        let mut refresh_rx = app.bus.subscribe();

        app.handle_event(AppEvent::Input(press(KeyCode::Tab)));
        app.handle_event(AppEvent::Tick);
        let event = next_event(&mut app).await;
        app.handle_event(event);

        for input in [
            press(KeyCode::Char('m')),
            press(KeyCode::Char(' ')),
            press(KeyCode::Right),
            press(KeyCode::Char(' ')),
            press(KeyCode::Delete),
            press(KeyCode::Char('y')),
        ] {
            app.handle_event(AppEvent::Input(input));
        }
        let event = next_event(&mut app).await;
        app.handle_event(event);

        assert!(scripted.calls().contains(&Call::Delete("v1".into())));
        assert!(scripted.calls().contains(&Call::Delete("v2".into())));
        assert_eq!(app.notifications.len(), 1);
        assert_eq!(app.notifications[0].message, "Deleted 2 video(s)");
        assert!(!app.library.selection.is_selecting());
        assert_eq!(refresh_rx.recv().await.unwrap(), RefreshReason::VideosDeleted);

        app.handle_event(AppEvent::Tick);
        let event = next_event(&mut app).await;
        assert!(matches!(event, AppEvent::LibraryLoaded { .. }));
        assert!(matches!(scripted.calls().last(), Some(Call::List(_))));
    }

    #[tokio::test]
    async fn failed_delete_keeps_list_and_remaining_selection() {
        let dir = tempfile::tempdir().unwrap();
        let scripted = Arc::new(ScriptedBackend::default());
        scripted.list.lock().push_back(Ok(listing(5)));
        scripted.delete_failures.lock().push("v2".into());
        let mut app = app(dir.path(), &scripted);
        let mut refresh_rx = app.bus.subscribe();

        app.handle_event(AppEvent::Input(press(KeyCode::Tab)));
        app.handle_event(AppEvent::Tick);
        let event = next_event(&mut app).await;
        app.handle_event(event);

        for input in [
            press(KeyCode::Char('m')),
            ctrl('a'),
            press(KeyCode::Delete),
            press(KeyCode::Enter),
        ] {
            app.handle_event(AppEvent::Input(input));
        }
        let event = next_event(&mut app).await;
        app.handle_event(event);

        let deletes: Vec<Call> = scripted
            .calls()
            .into_iter()
            .filter(|call| matches!(call, Call::Delete(_)))
            .collect();
        assert_eq!(
            deletes,
            vec![Call::Delete("v1".into()), Call::Delete("v2".into())]
        );
        assert_eq!(app.notifications.len(), 1);
        assert_eq!(app.notifications[0].level, NotificationLevel::Error);
        assert!(app.library.selection.is_selecting());
        assert_eq!(
            app.library.selection.ids(),
            vec!["v2".to_string(), "v3".to_string(), "v4".to_string(), "v5".to_string()]
        );
        assert_eq!(app.library.library.videos().len(), 5);
        assert!(!app.library.library.needs_fetch());
        assert!(refresh_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn reload_key_broadcasts_manual_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let scripted = Arc::new(ScriptedBackend::default());
        let mut app = app(dir.path(), &scripted);
        let mut refresh_rx = app.bus.subscribe();

        app.handle_event(AppEvent::Input(press(KeyCode::Tab)));
        app.handle_event(AppEvent::Input(press(KeyCode::Char('r'))));
        assert_eq!(refresh_rx.try_recv().unwrap(), RefreshReason::Manual);
        assert!(app.library.library.needs_fetch());
    }

    #[tokio::test]
    async fn typing_a_link_starts_analysis() {
        let dir = tempfile::tempdir().unwrap();
        let scripted = Arc::new(ScriptedBackend::default());
        scripted.analyze.lock().push_back(Ok(serde_json::json!({
            "videos": [{"title": "Clip", "formats": [{"format_id": "18", "ext": "mp4"}]}]
        })));
        let mut app = app(dir.path(), &scripted);

        app.handle_event(AppEvent::Input(Event::Paste("https://vimeo.com/1".into())));
        let event = next_event(&mut app).await;
        assert!(matches!(
            event,
            AppEvent::Analyzed { ref url, .. } if url == "https://vimeo.com/1"
        ));
        app.handle_event(event);
        assert!(app.home.form.can_submit());
    }

    #[test]
    fn notifications_dedupe_and_cap() {
        let dir = tempfile::tempdir().unwrap();
        let scripted = Arc::new(ScriptedBackend::default());
        let mut app = app(dir.path(), &scripted);
        for message in ["a", "a", "b", "c", "d"] {
            app.push_notification(message.into(), NotificationLevel::Info);
        }
        let messages: Vec<&str> = app.notifications.iter().map(|n| n.message.as_str()).collect();
        assert_eq!(messages, vec!["b", "c", "d"]);
    }

    #[tokio::test]
    async fn ctrl_c_quits_from_anywhere() {
        let dir = tempfile::tempdir().unwrap();
        let scripted = Arc::new(ScriptedBackend::default());
        let mut app = app(dir.path(), &scripted);
        app.handle_event(AppEvent::Input(ctrl('c')));
        assert!(!app.running);
        assert!(app.root.is_cancelled());
    }
}
