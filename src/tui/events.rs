#![forbid(unsafe_code)]

use crate::api::{AnalyzeReport, ListResponse};
use crate::cookies::CookieStatus;
use crate::error::{ApiError, DeleteError, PipelineError};
use crate::events::RefreshReason;
use crate::pipeline::PipelineOutcome;
use std::path::PathBuf;

/// Events flowing through the Elm-style loop. Background tasks report back
/// through these instead of touching view state.
#[derive(Debug)]
pub enum AppEvent {
    Tick,
    Input(crossterm::event::Event),
    LibraryLoaded {
        generation: u64,
        result: Result<ListResponse, ApiError>,
    },
    RecentLoaded(Result<ListResponse, ApiError>),
    Analyzed {
        url: String,
        result: Result<AnalyzeReport, ApiError>,
    },
    PipelineFinished(Result<PipelineOutcome, PipelineError>),
    DeleteFinished(Result<Vec<String>, DeleteError>),
    CookiesUpdated(CookieStatus),
    Downloaded(Result<Option<PathBuf>, String>),
    Refresh(RefreshReason),
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A timed message in the top-right overlay.
#[derive(Debug, Clone)]
pub struct Notification {
    pub id: u64,
    pub message: String,
    pub level: NotificationLevel,
    /// Ticks remaining before auto-dismiss.
    pub ttl_ticks: u32,
}

impl Notification {
    pub fn new(message: impl Into<String>, level: NotificationLevel) -> Self {
        Self {
            id: 0,
            message: message.into(),
            level,
            ttl_ticks: NOTIFICATION_TTL,
        }
    }
}

pub const NOTIFICATION_TTL: u32 = 20;
pub const MAX_NOTIFICATIONS: usize = 3;
