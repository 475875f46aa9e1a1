#![forbid(unsafe_code)]

//! Colors and style helpers. Views use these instead of inline colors.

use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders};

// ── Palette ─────────────────────────────────────────────────────────────────

pub const PRIMARY: Color = Color::Rgb(0x63, 0x66, 0xF1);
pub const PRIMARY_LIGHT: Color = Color::Rgb(0x81, 0x8C, 0xF8);
pub const ACCENT: Color = Color::Rgb(0xEC, 0x48, 0x99);

pub const BG_BASE: Color = Color::Rgb(0x0F, 0x11, 0x1A);

pub const TEXT: Color = Color::Rgb(0xE5, 0xE7, 0xEB);
pub const TEXT_MUTED: Color = Color::Rgb(0x9C, 0xA3, 0xAF);
pub const TEXT_DIM: Color = Color::Rgb(0x4B, 0x55, 0x63);

// ── Semantic ────────────────────────────────────────────────────────────────

pub const ERROR: Color = Color::Rgb(0xEF, 0x44, 0x44);
pub const SUCCESS: Color = Color::Rgb(0x22, 0xC5, 0x5E);
pub const WARNING: Color = Color::Rgb(0xF5, 0x9E, 0x0B);
pub const INFO: Color = Color::Rgb(0x3B, 0x82, 0xF6);

// ── Styles ──────────────────────────────────────────────────────────────────

pub fn title() -> Style {
    Style::default().fg(PRIMARY_LIGHT).add_modifier(Modifier::BOLD)
}

pub fn heading() -> Style {
    Style::default().fg(PRIMARY).add_modifier(Modifier::BOLD)
}

pub fn text() -> Style {
    Style::default().fg(TEXT)
}

pub fn muted() -> Style {
    Style::default().fg(TEXT_MUTED)
}

pub fn dim() -> Style {
    Style::default().fg(TEXT_DIM)
}

/// Cursor row or focused control.
pub fn highlight() -> Style {
    Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)
}

/// Videos picked in selection mode.
pub fn selected() -> Style {
    Style::default()
        .fg(BG_BASE)
        .bg(PRIMARY_LIGHT)
        .add_modifier(Modifier::BOLD)
}

pub fn error() -> Style {
    Style::default().fg(ERROR)
}

pub fn success() -> Style {
    Style::default().fg(SUCCESS)
}

pub fn brand_badge() -> Style {
    Style::default()
        .fg(BG_BASE)
        .bg(PRIMARY)
        .add_modifier(Modifier::BOLD)
}

pub fn key_hint() -> Style {
    Style::default().fg(TEXT_DIM)
}

// ── Blocks ──────────────────────────────────────────────────────────────────

pub fn block_focused(title: &str) -> Block<'_> {
    Block::default()
        .title(format!(" {title} "))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(PRIMARY))
}

pub fn block_default(title: &str) -> Block<'_> {
    Block::default()
        .title(format!(" {title} "))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(TEXT_DIM))
}
