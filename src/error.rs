#![forbid(unsafe_code)]

//! Error types shared by the client-side view models.
//!
//! Nothing here is fatal: every variant is meant to end up as an inline
//! message next to the control that triggered it.

use thiserror::Error;

/// Failure talking to the backend REST surface.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("backend returned HTTP {status}")]
    Status { status: u16, body: String },
    #[error("could not reach backend: {0}")]
    Transport(String),
    #[error("unexpected response body: {0}")]
    Decode(String),
    #[error("request cancelled")]
    Cancelled,
}

impl ApiError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ApiError::Cancelled)
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// One of the three remote steps that turn a link into a library entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Analyze,
    Download,
    Save,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Analyze => "analyze",
            Stage::Download => "download",
            Stage::Save => "save",
        }
    }

    pub fn failure_message(self) -> &'static str {
        match self {
            Stage::Analyze => "analyze failed",
            Stage::Download => "download failed",
            Stage::Save => "save failed",
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{}", stage.failure_message())]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: ApiError,
}

impl PipelineError {
    pub fn new(stage: Stage, source: ApiError) -> Self {
        Self { stage, source }
    }

    pub fn is_cancelled(&self) -> bool {
        self.source.is_cancelled()
    }
}

/// Problems caught locally before anything is sent to the backend.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("unsupported video URL")]
    InvalidUrl,
    #[error("no format selected")]
    MissingFormat,
    #[error("a submission is already running")]
    Busy,
    #[error("cookie input is empty")]
    EmptyCookies,
    #[error("no cookie could be parsed from the input")]
    UnparseableCookies,
}

/// A batch delete that stopped at the first failing identifier.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Failed to delete video {failed_id}")]
pub struct DeleteError {
    /// Identifiers removed before the failure, in request order.
    pub deleted: Vec<String>,
    pub failed_id: String,
    #[source]
    pub source: ApiError,
}
