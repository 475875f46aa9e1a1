#![forbid(unsafe_code)]

//! State of the "paste a link, pick a quality" form.

use crate::api::{self, AnalyzeReport, Backend};
use crate::error::{ApiError, ValidationError};
use crate::formats::{FormatOption, build_format_options, default_choice, is_valid_video_url};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AnalyzeState {
    #[default]
    Idle,
    Analyzing,
    Ready,
    NoFormats,
    Failed(String),
}

/// What gets handed to the pipeline on submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub url: String,
    pub format: String,
}

#[derive(Debug, Clone, Default)]
pub struct UploadForm {
    url: String,
    valid: bool,
    analyzed_url: Option<String>,
    analyze: AnalyzeState,
    options: Vec<FormatOption>,
    chosen: Option<usize>,
    selector_open: bool,
    submitting: bool,
}

impl UploadForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// The inline "unsupported URL" hint shows only for non-empty input.
    pub fn shows_invalid_hint(&self) -> bool {
        !self.url.trim().is_empty() && !self.valid
    }

    pub fn analyze_state(&self) -> &AnalyzeState {
        &self.analyze
    }

    pub fn options(&self) -> &[FormatOption] {
        &self.options
    }

    pub fn chosen(&self) -> Option<&FormatOption> {
        self.chosen.and_then(|idx| self.options.get(idx))
    }

    pub fn chosen_index(&self) -> Option<usize> {
        self.chosen
    }

    pub fn selector_open(&self) -> bool {
        self.selector_open
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    /// Updates the URL. Returns the URL to analyze when it just became a
    /// valid link that has not been analyzed yet.
    pub fn set_url(&mut self, url: impl Into<String>) -> Option<String> {
        self.url = url.into();
        self.valid = is_valid_video_url(&self.url);
        if !self.valid {
            self.reset_formats();
            return None;
        }
        let trimmed = self.url.trim().to_string();
        if self.analyzed_url.as_deref() == Some(trimmed.as_str()) {
            return None;
        }
        self.reset_formats();
        self.analyzed_url = Some(trimmed.clone());
        self.analyze = AnalyzeState::Analyzing;
        Some(trimmed)
    }

    fn reset_formats(&mut self) {
        self.analyzed_url = None;
        self.analyze = AnalyzeState::Idle;
        self.options.clear();
        self.chosen = None;
        self.selector_open = false;
    }

    /// Applies an analyze result for `url`. Results for a URL that is no
    /// longer in the field are dropped.
    pub fn apply_analysis(&mut self, url: &str, result: Result<AnalyzeReport, ApiError>) -> bool {
        if self.analyzed_url.as_deref() != Some(url) {
            debug!(url, "dropping analysis for a stale URL");
            return false;
        }
        match result {
            Ok(report) => {
                self.options = build_format_options(report.formats());
                self.chosen = default_choice(&self.options);
                self.analyze = if self.options.is_empty() {
                    AnalyzeState::NoFormats
                } else {
                    AnalyzeState::Ready
                };
            }
            Err(ApiError::Cancelled) => {
                self.analyzed_url = None;
                self.analyze = AnalyzeState::Idle;
            }
            Err(err) => {
                warn!(url, error = %err, "format analysis failed");
                self.analyze = AnalyzeState::Failed(err.to_string());
            }
        }
        true
    }

    /// Forgets the last analysis so the next `set_url` asks again.
    pub fn retry_analysis(&mut self) -> Option<String> {
        self.analyzed_url = None;
        let url = self.url.clone();
        self.set_url(url)
    }

    pub fn toggle_selector(&mut self) {
        if self.valid && !self.options.is_empty() {
            self.selector_open = !self.selector_open;
        }
    }

    /// Picks an option and collapses the selector.
    pub fn choose(&mut self, index: usize) {
        if index < self.options.len() {
            self.chosen = Some(index);
            self.selector_open = false;
        }
    }

    pub fn choose_next(&mut self) {
        if self.options.is_empty() {
            return;
        }
        let next = self.chosen.map_or(0, |idx| (idx + 1) % self.options.len());
        self.chosen = Some(next);
    }

    pub fn choose_prev(&mut self) {
        if self.options.is_empty() {
            return;
        }
        let len = self.options.len();
        let prev = self.chosen.map_or(0, |idx| (idx + len - 1) % len);
        self.chosen = Some(prev);
    }

    pub fn can_submit(&self) -> bool {
        self.validate().is_ok()
    }

    fn validate(&self) -> Result<Submission, ValidationError> {
        if self.submitting {
            return Err(ValidationError::Busy);
        }
        if self.url.trim().is_empty() || !self.valid {
            return Err(ValidationError::InvalidUrl);
        }
        let format = self.chosen().ok_or(ValidationError::MissingFormat)?;
        Ok(Submission {
            url: self.url.trim().to_string(),
            format: format.value.clone(),
        })
    }

    /// Locks the form and returns what to submit.
    pub fn begin_submit(&mut self) -> Result<Submission, ValidationError> {
        let submission = self.validate()?;
        self.submitting = true;
        self.selector_open = false;
        Ok(submission)
    }

    pub fn finish_submit(&mut self) {
        self.submitting = false;
    }

    /// Runs the pending analysis for the current URL, if any.
    pub async fn analyze(
        &mut self,
        backend: &Arc<dyn Backend>,
        cancel: &CancellationToken,
    ) -> &AnalyzeState {
        if self.analyze == AnalyzeState::Analyzing
            && let Some(url) = self.analyzed_url.clone()
        {
            let target = url.clone();
            let result = api::call(backend, cancel, move |b| b.analyze(&target)).await;
            self.apply_analysis(&url, result);
        }
        &self.analyze
    }
}
