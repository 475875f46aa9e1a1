#![forbid(unsafe_code)]

//! The analyze, download, save sequence behind the upload form.
//!
//! Progress lives in a [`ProgressStore`] that any number of views can watch.
//! The processing flag is owned by a guard, so it drops back to false on every
//! exit path including cancellation.

use crate::api::{self, AnalyzeReport, Backend, DownloadReport, SaveReport};
use crate::error::{PipelineError, Stage};
use crate::events::{RefreshBus, RefreshReason};
use crate::upload::Submission;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub const PROGRESS_ANALYZED: u8 = 33;
pub const PROGRESS_DOWNLOADED: u8 = 66;
pub const PROGRESS_DONE: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineStatus {
    #[default]
    Idle,
    Analyzing,
    Downloading,
    Saving,
    Completed,
    Failed,
}

impl PipelineStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineStatus::Idle => "",
            PipelineStatus::Analyzing => "analyzing",
            PipelineStatus::Downloading => "downloading",
            PipelineStatus::Saving => "saving",
            PipelineStatus::Completed => "completed",
            PipelineStatus::Failed => "failed",
        }
    }

    pub fn label_key(self) -> Option<&'static str> {
        match self {
            PipelineStatus::Idle => None,
            PipelineStatus::Analyzing => Some("pipeline.analyzing"),
            PipelineStatus::Downloading => Some("pipeline.downloading"),
            PipelineStatus::Saving => Some("pipeline.saving"),
            PipelineStatus::Completed => Some("pipeline.completed"),
            PipelineStatus::Failed => Some("pipeline.failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressSnapshot {
    pub progress: u8,
    pub status: PipelineStatus,
    pub processing: bool,
}

/// Shared progress state. Cloning shares the same channel.
#[derive(Debug, Clone)]
pub struct ProgressStore {
    tx: Arc<watch::Sender<ProgressSnapshot>>,
}

impl Default for ProgressStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressStore {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ProgressSnapshot::default());
        Self { tx: Arc::new(tx) }
    }

    pub fn subscribe(&self) -> watch::Receiver<ProgressSnapshot> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        *self.tx.borrow()
    }

    fn set_stage(&self, progress: u8, status: PipelineStatus) {
        self.tx.send_modify(|snapshot| {
            snapshot.progress = progress;
            snapshot.status = status;
        });
    }

    fn set_status(&self, status: PipelineStatus) {
        self.tx.send_modify(|snapshot| snapshot.status = status);
    }

    fn reset(&self) {
        self.tx.send_modify(|snapshot| {
            snapshot.progress = 0;
            snapshot.status = PipelineStatus::Idle;
        });
    }

    fn set_processing(&self, processing: bool) {
        self.tx.send_modify(|snapshot| snapshot.processing = processing);
    }
}

struct ProcessingGuard<'a>(&'a ProgressStore);

impl<'a> ProcessingGuard<'a> {
    fn hold(store: &'a ProgressStore) -> Self {
        store.set_processing(true);
        Self(store)
    }
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.0.set_processing(false);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineTimings {
    /// How long the completed state stays up before views refresh.
    pub success_display: Duration,
    /// How long the failed state stays up before progress resets.
    pub failure_reset: Duration,
}

impl Default for PipelineTimings {
    fn default() -> Self {
        Self {
            success_display: Duration::from_millis(1500),
            failure_reset: Duration::from_secs(3),
        }
    }
}

/// Everything the three steps returned.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutcome {
    pub analyze: AnalyzeReport,
    pub download: DownloadReport,
    pub save: SaveReport,
}

/// Body of the save request: analyze fields, overridden by download fields,
/// plus the chosen format.
pub fn build_save_body(
    submission: &Submission,
    analyze: &AnalyzeReport,
    download: &DownloadReport,
) -> Value {
    let mut body = analyze.raw.clone();
    for (key, value) in &download.raw {
        body.insert(key.clone(), value.clone());
    }
    body.insert("format".to_string(), Value::String(submission.format.clone()));
    body.entry("video_url")
        .or_insert_with(|| Value::String(submission.url.clone()));
    if let Some(title) = analyze.title() {
        body.entry("video_page_name")
            .or_insert_with(|| Value::String(title.to_string()));
    }
    if let Some(filename) = download.filename() {
        body.entry("video_file_name")
            .or_insert_with(|| Value::String(filename.to_string()));
    }
    Value::Object(body)
}

#[derive(Clone)]
pub struct Pipeline {
    backend: Arc<dyn Backend>,
    progress: ProgressStore,
    bus: RefreshBus,
    timings: PipelineTimings,
}

impl Pipeline {
    pub fn new(backend: Arc<dyn Backend>, progress: ProgressStore, bus: RefreshBus) -> Self {
        Self {
            backend,
            progress,
            bus,
            timings: PipelineTimings::default(),
        }
    }

    pub fn with_timings(mut self, timings: PipelineTimings) -> Self {
        self.timings = timings;
        self
    }

    pub fn progress(&self) -> &ProgressStore {
        &self.progress
    }

    /// Runs the three steps strictly in order.
    ///
    /// On success the completed state is shown for `success_display`, then
    /// dependent views are told to refresh and progress clears. Cancelling
    /// during that pause only shortens it. On failure the
    /// failed state is shown for `failure_reset` before clearing. Cancellation
    /// clears immediately and never starts another step.
    pub async fn run(
        &self,
        submission: &Submission,
        cancel: &CancellationToken,
    ) -> Result<PipelineOutcome, PipelineError> {
        let _processing = ProcessingGuard::hold(&self.progress);
        match self.steps(submission, cancel).await {
            Ok(outcome) => {
                self.progress.set_stage(PROGRESS_DONE, PipelineStatus::Completed);
                info!(url = %submission.url, video_id = ?outcome.save.video_id(), "video saved");
                self.pause(self.timings.success_display, cancel).await;
                self.bus.publish(RefreshReason::VideoSaved);
                self.progress.reset();
                Ok(outcome)
            }
            Err(err) if err.is_cancelled() => {
                info!(stage = err.stage.as_str(), "pipeline cancelled");
                self.progress.reset();
                Err(err)
            }
            Err(err) => {
                warn!(stage = err.stage.as_str(), error = %err.source, "pipeline failed");
                self.progress.set_status(PipelineStatus::Failed);
                self.pause(self.timings.failure_reset, cancel).await;
                self.progress.reset();
                Err(err)
            }
        }
    }

    async fn steps(
        &self,
        submission: &Submission,
        cancel: &CancellationToken,
    ) -> Result<PipelineOutcome, PipelineError> {
        self.progress.set_stage(0, PipelineStatus::Analyzing);
        let url = submission.url.clone();
        let analyze = api::call(&self.backend, cancel, move |b| b.analyze(&url))
            .await
            .map_err(|err| PipelineError::new(Stage::Analyze, err))?;

        self.progress
            .set_stage(PROGRESS_ANALYZED, PipelineStatus::Downloading);
        let url = submission.url.clone();
        let format = submission.format.clone();
        let video_info = Value::Object(analyze.raw.clone());
        let download = api::call(&self.backend, cancel, move |b| {
            b.download(&url, &format, &video_info)
        })
        .await
        .map_err(|err| PipelineError::new(Stage::Download, err))?;

        self.progress
            .set_stage(PROGRESS_DOWNLOADED, PipelineStatus::Saving);
        let body = build_save_body(submission, &analyze, &download);
        let save = api::call(&self.backend, cancel, move |b| b.save(&body))
            .await
            .map_err(|err| PipelineError::new(Stage::Save, err))?;

        Ok(PipelineOutcome {
            analyze,
            download,
            save,
        })
    }

    /// Sleeps for `delay`, returning early on cancellation.
    async fn pause(&self, delay: Duration, cancel: &CancellationToken) {
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{Call, ScriptedBackend, status};
    use crate::error::ApiError;
    use serde_json::json;
    use tokio::task::JoinHandle;

    const URL: &str = "https://www.youtube.com/watch?v=abc";

    fn submission() -> Submission {
        Submission {
            url: URL.into(),
            format: "720p".into(),
        }
    }

    fn fast() -> PipelineTimings {
        PipelineTimings {
            success_display: Duration::from_millis(60),
            failure_reset: Duration::from_millis(60),
        }
    }

    fn record_progress(store: &ProgressStore) -> JoinHandle<Vec<ProgressSnapshot>> {
        let mut rx = store.subscribe();
        tokio::spawn(async move {
            let mut seen = Vec::new();
            while rx.changed().await.is_ok() {
                let snapshot = *rx.borrow_and_update();
                let done = !snapshot.processing && snapshot.progress == 0;
                seen.push(snapshot);
                if done {
                    break;
                }
            }
            seen
        })
    }

    fn pipeline(scripted: &Arc<ScriptedBackend>, bus: RefreshBus) -> Pipeline {
        let backend: Arc<dyn Backend> = scripted.clone();
        Pipeline::new(backend, ProgressStore::new(), bus).with_timings(fast())
    }

    #[tokio::test]
    async fn happy_path_completes_and_triggers_refresh() {
        let scripted = Arc::new(ScriptedBackend::default());
        scripted.analyze.lock().push_back(Ok(json!({
            "videos": [{"title": "Clip", "formats": []}],
            "videos_found": 1
        })));
        scripted
            .download
            .lock()
            .push_back(Ok(json!({"filename": "x.mp4", "videos_found": 2})));
        scripted.save.lock().push_back(Ok(json!({"video_id": "v9"})));
        let bus = RefreshBus::new();
        let mut refreshes = bus.subscribe();
        let pipeline = pipeline(&scripted, bus);
        let recorder = record_progress(pipeline.progress());

        let outcome = pipeline
            .run(&submission(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.save.video_id().as_deref(), Some("v9"));

        let seen = recorder.await.unwrap();
        assert!(seen.iter().any(|s| s.progress == 100
            && s.status == PipelineStatus::Completed
            && s.processing));
        assert_eq!(seen.last().copied(), Some(ProgressSnapshot::default()));
        assert_eq!(refreshes.recv().await.unwrap(), RefreshReason::VideoSaved);

        let calls = scripted.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0], Call::Analyze(URL.into()));
        assert_eq!(
            calls[1],
            Call::Download {
                url: URL.into(),
                format: "720p".into()
            }
        );
        let Call::Save(body) = &calls[2] else {
            panic!("expected save, got {:?}", calls[2]);
        };
        assert_eq!(body["format"], "720p");
        assert_eq!(body["videos_found"], 2);
        assert_eq!(body["video_url"], URL);
        assert_eq!(body["video_page_name"], "Clip");
        assert_eq!(body["video_file_name"], "x.mp4");
    }

    #[tokio::test]
    async fn analyze_failure_stops_and_resets() {
        let scripted = Arc::new(ScriptedBackend::default());
        scripted.analyze.lock().push_back(Err(status(500)));
        let bus = RefreshBus::new();
        let mut refreshes = bus.subscribe();
        let pipeline = pipeline(&scripted, bus);
        let recorder = record_progress(pipeline.progress());

        let err = pipeline
            .run(&submission(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "analyze failed");
        assert_eq!(err.source.status(), Some(500));

        let seen = recorder.await.unwrap();
        assert!(seen.iter().any(|s| s.status == PipelineStatus::Failed));
        let last = seen.last().copied().unwrap();
        assert_eq!(last.progress, 0);
        assert!(!last.processing);
        assert_eq!(scripted.calls(), vec![Call::Analyze(URL.into())]);
        assert!(refreshes.try_recv().is_err());
    }

    #[tokio::test]
    async fn save_failure_reports_stage() {
        let scripted = Arc::new(ScriptedBackend::default());
        scripted.save.lock().push_back(Err(status(422)));
        let pipeline = pipeline(&scripted, RefreshBus::new());
        let err = pipeline
            .run(&submission(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.stage, Stage::Save);
        assert_eq!(err.to_string(), "save failed");
        assert!(!pipeline.progress().snapshot().processing);
    }

    #[tokio::test]
    async fn non_object_download_is_a_download_failure() {
        let scripted = Arc::new(ScriptedBackend::default());
        scripted.download.lock().push_back(Ok(json!("done")));
        let pipeline = pipeline(&scripted, RefreshBus::new());
        let err = pipeline
            .run(&submission(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.stage, Stage::Download);
        assert!(matches!(err.source, ApiError::Decode(_)));
        assert_eq!(scripted.calls().len(), 2);
    }

    #[tokio::test]
    async fn cancel_after_save_still_refreshes() {
        let scripted = Arc::new(ScriptedBackend::default());
        let bus = RefreshBus::new();
        let mut refreshes = bus.subscribe();
        let backend: Arc<dyn Backend> = scripted.clone();
        let timings = PipelineTimings {
            success_display: Duration::from_millis(500),
            failure_reset: Duration::from_millis(60),
        };
        let pipeline = Pipeline::new(backend, ProgressStore::new(), bus).with_timings(timings);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            trigger.cancel();
        });

        assert!(pipeline.run(&submission(), &cancel).await.is_ok());
        assert_eq!(scripted.calls().len(), 3);
        assert_eq!(refreshes.try_recv().unwrap(), RefreshReason::VideoSaved);
        assert_eq!(pipeline.progress().snapshot(), ProgressSnapshot::default());
    }

    #[tokio::test]
    async fn cancelled_run_never_starts_a_step() {
        let scripted = Arc::new(ScriptedBackend::default());
        let pipeline = pipeline(&scripted, RefreshBus::new());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = pipeline.run(&submission(), &cancel).await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(scripted.calls().is_empty());
        assert_eq!(pipeline.progress().snapshot(), ProgressSnapshot::default());
    }
}
