#![forbid(unsafe_code)]

//! The player modal: one selected video, an external media player process and
//! the download / "view original" actions.

use crate::i18n::{Language, t};
use crate::normalize::{NOT_AVAILABLE, Video};
use parking_lot::Mutex;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use thiserror::Error;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("no video is open")]
    NothingOpen,
    #[error("player command is empty")]
    EmptyCommand,
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("download request failed: {0}")]
    Request(String),
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to open {url}: {source}")]
    Open {
        url: String,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    Loading,
    Playing,
    Finished,
    Error,
}

impl PlaybackState {
    pub fn label_key(self) -> Option<&'static str> {
        match self {
            PlaybackState::Idle => None,
            PlaybackState::Loading => Some("player.loading"),
            PlaybackState::Playing => Some("player.playing"),
            PlaybackState::Finished => Some("player.finished"),
            PlaybackState::Error => Some("player.error"),
        }
    }
}

/// Playback source: the backend-served copy when there is one, otherwise the
/// original page URL.
pub fn source_url(video: &Video) -> &str {
    video.local_url.as_deref().unwrap_or(&video.url)
}

pub struct PlayerModal {
    command: Vec<String>,
    video: Option<Video>,
    state: Arc<Mutex<PlaybackState>>,
    stop: Option<CancellationToken>,
    waiter: Option<JoinHandle<()>>,
}

impl PlayerModal {
    /// `command` is split on whitespace; the source URL is appended last.
    pub fn new(command: &str) -> Self {
        Self {
            command: command.split_whitespace().map(str::to_string).collect(),
            video: None,
            state: Arc::new(Mutex::new(PlaybackState::Idle)),
            stop: None,
            waiter: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.video.is_some()
    }

    pub fn video(&self) -> Option<&Video> {
        self.video.as_ref()
    }

    pub fn state(&self) -> PlaybackState {
        *self.state.lock()
    }

    /// Static explanation shown when the player reported a failure.
    pub fn error_message(&self, language: Language) -> Option<&'static str> {
        (self.state() == PlaybackState::Error).then(|| t(language, "player.error"))
    }

    /// Shows `video`. Switching to a different video stops playback and
    /// resets the playback state; reopening the same one keeps it.
    pub fn open(&mut self, video: Video) {
        if self.video.as_ref().is_some_and(|open| open.id == video.id) {
            self.video = Some(video);
            return;
        }
        self.stop();
        self.state = Arc::new(Mutex::new(PlaybackState::Idle));
        self.video = Some(video);
    }

    pub fn close(&mut self) {
        self.stop();
        self.video = None;
    }

    /// Starts the external player on the open video.
    pub fn play(&mut self, parent: &CancellationToken) -> Result<(), PlayerError> {
        let video = self.video.as_ref().ok_or(PlayerError::NothingOpen)?;
        let id = video.id.clone();
        let source = source_url(video).to_string();
        let (program, args) = self.command.split_first().ok_or(PlayerError::EmptyCommand)?;
        let (program, args) = (program.clone(), args.to_vec());
        self.stop();
        *self.state.lock() = PlaybackState::Loading;

        let spawned = Command::new(&program)
            .args(&args)
            .arg(&source)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn();
        let mut child = match spawned {
            Ok(child) => child,
            Err(source) => {
                warn!(program = %program, error = %source, "player failed to start");
                *self.state.lock() = PlaybackState::Error;
                return Err(PlayerError::Spawn { program, source });
            }
        };
        info!(id = %id, source = %source, "playback started");
        *self.state.lock() = PlaybackState::Playing;

        let stop = parent.child_token();
        let state = Arc::clone(&self.state);
        let token = stop.clone();
        self.waiter = Some(tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    if let Err(err) = child.kill().await {
                        debug!(error = %err, "player already exited");
                    }
                    *state.lock() = PlaybackState::Idle;
                }
                status = child.wait() => {
                    let next = match status {
                        Ok(status) if status.success() => PlaybackState::Finished,
                        Ok(status) => {
                            warn!(%status, "player exited with failure");
                            PlaybackState::Error
                        }
                        Err(err) => {
                            warn!(error = %err, "lost track of player process");
                            PlaybackState::Error
                        }
                    };
                    *state.lock() = next;
                }
            }
        }));
        self.stop = Some(stop);
        Ok(())
    }

    /// Stops playback if it is running.
    pub fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            stop.cancel();
            // The cancelled watcher keeps writing to the previous cell.
            self.state = Arc::new(Mutex::new(PlaybackState::Idle));
        }
        self.waiter = None;
    }

    /// Waits for the player process to exit and returns the final state.
    pub async fn wait(&mut self) -> PlaybackState {
        if let Some(waiter) = self.waiter.take()
            && let Err(err) = waiter.await
        {
            warn!(error = %err, "player watcher failed");
            *self.state.lock() = PlaybackState::Error;
        }
        self.stop = None;
        self.state()
    }
}

impl Drop for PlayerModal {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Labelled metadata rows shown under the player.
pub fn detail_rows(video: &Video, language: Language) -> Vec<(&'static str, String)> {
    let details = &video.details;
    let mut rows = vec![
        (t(language, "detail.source"), video.source.label().to_string()),
        (t(language, "detail.duration"), video.duration.clone()),
        (t(language, "detail.format"), video.format.clone()),
        (t(language, "detail.size"), video.file_size.clone()),
        (t(language, "detail.downloaded"), video.downloaded_at.clone()),
        (t(language, "detail.views"), details.view_count.clone()),
        (t(language, "detail.likes"), details.like_count.clone()),
        (t(language, "detail.comments"), details.comment_count.clone()),
    ];
    if let Some(uploader) = &details.uploader {
        rows.insert(1, (t(language, "detail.uploader"), uploader.clone()));
    }
    if details.upload_date != NOT_AVAILABLE {
        rows.push((t(language, "detail.uploaded"), details.upload_date.clone()));
    }
    if let Some(category) = &details.category {
        rows.push((t(language, "detail.category"), category.clone()));
    }
    if !details.tags.is_empty() {
        rows.push((t(language, "detail.tags"), details.tags.join(", ")));
    }
    rows
}

/// Where the download action reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadTarget {
    /// A media file the client can stream to disk.
    File(String),
    /// Only the platform page is known, so it is handed to the system opener.
    External(String),
}

impl DownloadTarget {
    pub fn resolve(video: &Video) -> DownloadTarget {
        match video.direct_url.as_ref().or(video.local_url.as_ref()) {
            Some(url) => DownloadTarget::File(url.clone()),
            None => DownloadTarget::External(video.url.clone()),
        }
    }
}

/// `"{title}.mp4"` with path separators and control characters replaced.
pub fn download_file_name(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| match c {
            '/' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.');
    if cleaned.is_empty() {
        "video.mp4".to_string()
    } else {
        format!("{cleaned}.mp4")
    }
}

/// Streams `url` into `dir/file_name`. The file only appears once complete.
pub fn download_to(
    url: &str,
    dir: &Path,
    file_name: &str,
    timeout: Option<Duration>,
) -> Result<PathBuf, PlayerError> {
    let mut builder = ureq::AgentBuilder::new();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    debug!(url, "download request");
    let response = builder
        .build()
        .get(url)
        .call()
        .map_err(|err| PlayerError::Request(err.to_string()))?;

    let write_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source: io::Error| PlayerError::Write { path, source }
    };
    fs::create_dir_all(dir).map_err(write_err(dir))?;
    let target = dir.join(file_name);
    let mut tmp = NamedTempFile::new_in(dir).map_err(write_err(dir))?;
    let mut reader = response.into_reader();
    let bytes = io::copy(&mut reader, &mut tmp).map_err(write_err(&target))?;
    tmp.persist(&target)
        .map_err(|err| PlayerError::Write {
            path: target.clone(),
            source: err.error,
        })?;
    info!(path = %target.display(), bytes, "video downloaded");
    Ok(target)
}

/// Download action: streams a file when one is known, otherwise opens the
/// source page. Returns the written path in the first case.
pub fn download_video(
    video: &Video,
    dir: &Path,
    timeout: Option<Duration>,
) -> Result<Option<PathBuf>, PlayerError> {
    match DownloadTarget::resolve(video) {
        DownloadTarget::File(url) => {
            download_to(&url, dir, &download_file_name(&video.title), timeout).map(Some)
        }
        DownloadTarget::External(url) => open_url(&url).map(|()| None),
    }
}

/// Opens the canonical source page with the platform opener.
pub fn open_original(video: &Video) -> Result<(), PlayerError> {
    open_url(&video.url)
}

fn open_url(url: &str) -> Result<(), PlayerError> {
    info!(url, "opening externally");
    open::that(url).map_err(|source| PlayerError::Open {
        url: url.to_string(),
        source,
    })
}
