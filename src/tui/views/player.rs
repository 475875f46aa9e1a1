#![forbid(unsafe_code)]

use super::{centered_rect, truncate};
use crate::i18n::{Language, t};
use crate::player::{PlaybackState, PlayerModal, detail_rows, source_url};
use crate::tui::theme;
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    text::{Line, Span},
    widgets::{Clear, Paragraph, Wrap},
};

/// Draws the open video over `area`. Nothing is drawn when the modal is closed.
pub fn render(
    frame: &mut Frame,
    area: Rect,
    modal: &PlayerModal,
    language: Language,
    downloading: bool,
) {
    let Some(video) = modal.video() else {
        return;
    };
    let popup = centered_rect(80, 80, area);
    frame.render_widget(Clear, popup);
    let block = theme::block_focused(&video.title);
    let inner = block.inner(popup);
    frame.render_widget(block, popup);

    let [status_row, source_row, details, description, actions] = Layout::vertical([
        Constraint::Length(2),
        Constraint::Length(1),
        Constraint::Min(4),
        Constraint::Length(4),
        Constraint::Length(1),
    ])
    .areas(inner);

    let state = modal.state();
    let status = match modal.error_message(language) {
        Some(message) => Span::styled(message, theme::error()),
        None => match state.label_key() {
            Some(key) if state == PlaybackState::Finished => {
                Span::styled(t(language, key), theme::success())
            }
            Some(key) => Span::styled(t(language, key), theme::highlight()),
            None => Span::styled(t(language, "player.stopped"), theme::muted()),
        },
    };
    frame.render_widget(Paragraph::new(status).wrap(Wrap { trim: true }), status_row);

    let width = source_row.width as usize;
    frame.render_widget(
        Paragraph::new(Span::styled(truncate(source_url(video), width), theme::dim())),
        source_row,
    );

    let label_width = detail_rows(video, language)
        .iter()
        .map(|(label, _)| label.chars().count())
        .max()
        .unwrap_or(0);
    let rows: Vec<Line> = detail_rows(video, language)
        .into_iter()
        .map(|(label, value)| {
            Line::from(vec![
                Span::styled(format!("{label:<label_width$}  "), theme::muted()),
                Span::styled(value, theme::text()),
            ])
        })
        .collect();
    frame.render_widget(Paragraph::new(rows), details);

    if let Some(text) = video.details.description.as_deref() {
        frame.render_widget(
            Paragraph::new(text)
                .style(theme::dim())
                .wrap(Wrap { trim: true })
                .block(theme::block_default(t(language, "detail.description"))),
            description,
        );
    }

    let mut hints = vec![Span::styled(t(language, "help.player"), theme::key_hint())];
    if downloading {
        hints.push(Span::styled(
            format!("   {}...", t(language, "player.download")),
            theme::highlight(),
        ));
    }
    let hints = Line::from(hints);
    frame.render_widget(Paragraph::new(hints), actions);
}
