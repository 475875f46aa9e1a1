#![forbid(unsafe_code)]

use std::fs;
use std::io;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

pub const LOG_FILE_NAME: &str = "videowallet.log";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Plain-text logs on stderr so stdout stays clean for command output.
pub fn init_cli() {
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .with_filter(env_filter());
    tracing_subscriber::registry().with(stderr_layer).init();
}

/// File logging for the terminal UI, which owns the screen. Keep the guard
/// alive until exit or buffered lines are lost.
pub fn init_tui(log_dir: &Path) -> WorkerGuard {
    if let Err(err) = fs::create_dir_all(log_dir) {
        eprintln!("Warning: could not create log dir {}: {err}", log_dir.display());
    }
    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_NAME);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_file(true)
        .with_line_number(true)
        .with_filter(env_filter());
    tracing_subscriber::registry().with(file_layer).init();

    tracing::info!(dir = %log_dir.display(), "logging to {LOG_FILE_NAME} (daily rolling)");
    guard
}
