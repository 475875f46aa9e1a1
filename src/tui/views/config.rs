#![forbid(unsafe_code)]

//! Configuration page: cookie update panel and language switch.

use super::{Outcome, edit_text, key_press};
use crate::cookies::CookieStatus;
use crate::i18n::{Language, t};
use crate::tui::theme;
use crossterm::event::{Event, KeyCode};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    text::{Line, Span},
    widgets::{Paragraph, Wrap},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfigField {
    #[default]
    Paste,
    SubmitText,
    ReadBrowser,
    DemoToggle,
    Language,
}

impl ConfigField {
    const ORDER: [ConfigField; 5] = [
        ConfigField::Paste,
        ConfigField::SubmitText,
        ConfigField::ReadBrowser,
        ConfigField::DemoToggle,
        ConfigField::Language,
    ];

    fn step(self, forward: bool) -> ConfigField {
        let idx = Self::ORDER.iter().position(|&f| f == self).unwrap_or(0);
        let len = Self::ORDER.len();
        let next = if forward { (idx + 1) % len } else { (idx + len - 1) % len };
        Self::ORDER[next]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    SubmitText(String),
    ReadBrowser { demo_fallback: bool },
    CycleLanguage,
}

#[derive(Debug, Default)]
pub struct ConfigView {
    text: String,
    focus: ConfigField,
    pub demo_fallback: bool,
    status: Option<CookieStatus>,
    busy: bool,
}

impl ConfigView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn focus(&self) -> ConfigField {
        self.focus
    }

    pub fn status(&self) -> Option<&CookieStatus> {
        self.status.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Records the result of an update. A successful paste clears the box.
    pub fn apply_status(&mut self, status: CookieStatus) {
        self.busy = false;
        if status.is_success() {
            self.text.clear();
        }
        self.status = Some(status);
    }

    pub fn handle_input(&mut self, event: &Event) -> Outcome<ConfigCommand> {
        if self.focus == ConfigField::Paste && !self.busy {
            if let Some(key) = key_press(event)
                && key.code == KeyCode::Enter
            {
                self.text.push('\n');
                return Outcome::Consumed;
            }
            if edit_text(&mut self.text, event) {
                return Outcome::Consumed;
            }
        }
        let Some(key) = key_press(event) else {
            return Outcome::Ignored;
        };
        match key.code {
            KeyCode::Up => self.focus = self.focus.step(false),
            KeyCode::Down => self.focus = self.focus.step(true),
            KeyCode::Enter | KeyCode::Char(' ') => return self.activate(),
            _ => return Outcome::Ignored,
        }
        Outcome::Consumed
    }

    fn activate(&mut self) -> Outcome<ConfigCommand> {
        match self.focus {
            ConfigField::Paste => Outcome::Consumed,
            ConfigField::DemoToggle => {
                self.demo_fallback = !self.demo_fallback;
                Outcome::Consumed
            }
            ConfigField::Language => Outcome::Run(ConfigCommand::CycleLanguage),
            _ if self.busy => Outcome::Consumed,
            ConfigField::SubmitText => {
                self.busy = true;
                self.status = None;
                Outcome::Run(ConfigCommand::SubmitText(self.text.clone()))
            }
            ConfigField::ReadBrowser => {
                self.busy = true;
                self.status = None;
                Outcome::Run(ConfigCommand::ReadBrowser {
                    demo_fallback: self.demo_fallback,
                })
            }
        }
    }

    fn marker(&self, field: ConfigField) -> Span<'static> {
        if self.focus == field {
            Span::styled("▶ ", theme::highlight())
        } else {
            Span::raw("  ")
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, language: Language) {
        let [header, paste, buttons, status, help] = Layout::vertical([
            Constraint::Length(2),
            Constraint::Min(5),
            Constraint::Length(5),
            Constraint::Length(2),
            Constraint::Length(1),
        ])
        .areas(area);

        frame.render_widget(
            Paragraph::new(vec![
                Line::from(Span::styled(t(language, "config.title"), theme::title())),
                Line::from(Span::styled(t(language, "config.subtitle"), theme::muted())),
            ]),
            header,
        );

        let paste_block = if self.focus == ConfigField::Paste {
            theme::block_focused(t(language, "cookie.paste_label"))
        } else {
            theme::block_default(t(language, "cookie.paste_label"))
        };
        frame.render_widget(
            Paragraph::new(self.text.as_str())
                .style(theme::text())
                .wrap(Wrap { trim: false })
                .block(paste_block),
            paste,
        );

        let button = |field: ConfigField, label: String| {
            let style = if self.focus == field {
                theme::selected()
            } else {
                theme::text()
            };
            Line::from(vec![self.marker(field), Span::styled(label, style)])
        };
        let submit_label = if self.busy {
            t(language, "cookie.updating").to_string()
        } else {
            t(language, "cookie.submit").to_string()
        };
        let check = if self.demo_fallback { "[x]" } else { "[ ]" };
        let lines = vec![
            button(ConfigField::SubmitText, submit_label),
            button(ConfigField::ReadBrowser, t(language, "cookie.read_browser").to_string()),
            button(
                ConfigField::DemoToggle,
                format!("{check} {}", t(language, "cookie.demo_toggle")),
            ),
            button(
                ConfigField::Language,
                format!("{}: {}", t(language, "config.language"), language.name()),
            ),
        ];
        frame.render_widget(
            Paragraph::new(lines).block(theme::block_default(t(language, "config.cookie.title"))),
            buttons,
        );

        if let Some(current) = &self.status {
            let style = if current.is_success() {
                theme::success()
            } else {
                theme::error()
            };
            frame.render_widget(
                Paragraph::new(Span::styled(current.message.as_str(), style))
                    .wrap(Wrap { trim: true }),
                status,
            );
        }

        frame.render_widget(
            Paragraph::new(Span::styled(t(language, "help.config"), theme::key_hint())),
            help,
        );
    }
}
