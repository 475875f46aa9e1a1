#![forbid(unsafe_code)]

//! Full-screen terminal front end.

pub mod app;
pub mod events;
pub mod theme;
pub mod views;

use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    event::{DisableBracketedPaste, EnableBracketedPaste},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing::{debug, info};

use crate::api::{Backend, HttpBackend};
use crate::config::Settings;
use app::AppState;
use events::AppEvent;

pub const TICK_RATE: Duration = Duration::from_millis(250);

pub async fn run(settings: Settings) -> Result<()> {
    info!(backend = %settings.backend, "starting terminal UI");
    let backend: Arc<dyn Backend> = Arc::new(HttpBackend::new(
        &settings.backend,
        settings.request_timeout,
    ));
    let mut app = AppState::new(settings, backend)?;

    let quit = app.sender();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() && quit.send(AppEvent::Quit).is_err() {
            debug!("interrupt arrived after the app loop ended");
        }
    });

    // Setup terminal
    enable_raw_mode().context("Enabling raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)
        .context("Entering alternate screen")?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout)).context("Creating terminal")?;

    let result = app.run(&mut terminal, TICK_RATE).await;

    // Restore terminal
    disable_raw_mode().context("Disabling raw mode")?;
    execute!(terminal.backend_mut(), DisableBracketedPaste, LeaveAlternateScreen)
        .context("Leaving alternate screen")?;
    terminal.show_cursor().context("Showing cursor")?;

    result.context("Terminal UI failed")
}
