#![forbid(unsafe_code)]

//! Command-line entry point. Without a subcommand it opens the terminal UI.

use anyhow::{Context, Result, anyhow, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;
use videowallet::{
    api::{Backend, HttpBackend, SortBy, SortOrder},
    config::{self, KNOWN_KEYS, Settings, SettingsOverrides},
    cookies::{self, CookieStatus},
    events::RefreshBus,
    i18n::{Language, t, tf},
    library::{LibraryView, LoadState, RecentVideos},
    logging,
    normalize::Video,
    pipeline::{Pipeline, PipelineTimings, ProgressStore},
    player::{self, PlaybackState, PlayerModal},
    selection::{self, confirm_message},
    tui,
    upload::{AnalyzeState, UploadForm},
};

#[derive(Parser, Debug)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about, long_about = None)]
struct Cli {
    /// Backend origin, e.g. http://localhost:6800
    #[arg(long, global = true)]
    backend: Option<String>,
    /// Interface language: en or zh
    #[arg(long, global = true)]
    lang: Option<String>,
    /// Where downloaded files are written
    #[arg(long, global = true)]
    download_dir: Option<PathBuf>,
    /// External player command; the video URL is appended
    #[arg(long, global = true)]
    player: Option<String>,
    /// Request timeout in seconds, 0 disables it
    #[arg(long, global = true)]
    timeout: Option<u64>,
    /// Environment file with VIDEOWALLET_* settings
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,
    /// Preferences file used by the terminal UI
    #[arg(long, global = true)]
    prefs: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the library
    List {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        uploader: Option<String>,
        /// saved_at, title, view_count, like_count or duration
        #[arg(long, default_value = "saved_at")]
        sort: SortBy,
        #[arg(long, default_value = "desc")]
        order: SortOrder,
        /// Re-sort the page locally by download date
        #[arg(long)]
        local_sort: Option<SortOrder>,
    },
    /// Show the most recently saved videos
    Recent,
    /// Show the downloadable qualities of a link
    Formats { url: String },
    /// Analyze, download and save a link
    Add {
        url: String,
        /// Quality tier such as 1080p; defaults to the preferred tier
        #[arg(long)]
        quality: Option<String>,
    },
    /// Delete videos by id
    Delete {
        #[arg(required = true)]
        ids: Vec<String>,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Update the backend's download cookies
    Cookies {
        #[command(subcommand)]
        source: CookieSource,
    },
    /// Play a library video with the external player
    Play { id: String },
    /// Save a library video to the download directory
    Download { id: String },
    /// Open a video's original page in the browser
    Open { id: String },
    /// Inspect or change settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Open the terminal UI
    Tui,
}

#[derive(Subcommand, Debug)]
enum CookieSource {
    /// Pasted `name=value; other=value` text, from a file or `-` for stdin
    Text { file: PathBuf },
    /// A `document.cookie` style jar exported from the browser
    Browser {
        #[arg(long)]
        jar: Option<PathBuf>,
        /// Send demo cookies when the jar has none for the site
        #[arg(long)]
        demo_fallback: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    Show,
    Set { key: String, value: String },
}

impl Cli {
    fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            backend: self.backend.clone(),
            language: self.lang.clone(),
            download_dir: self.download_dir.clone(),
            player: self.player.clone(),
            timeout_secs: self.timeout,
            cookie_jar: None,
            prefs_path: self.prefs.clone(),
            env_path: self.env_file.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut overrides = cli.overrides();
    if let Some(Command::Cookies {
        source: CookieSource::Browser { jar: Some(jar), .. },
    }) = &cli.command
    {
        overrides.cookie_jar = Some(jar.clone());
    }
    let settings = config::resolve_settings(overrides)?;

    let command = cli.command.unwrap_or(Command::Tui);
    if matches!(command, Command::Tui) {
        let _guard = logging::init_tui(&settings.log_dir);
        return tui::run(settings).await;
    }
    logging::init_cli();
    debug!(?command, "running command");

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupted");
            on_signal.cancel();
        }
    });

    let backend: Arc<dyn Backend> = Arc::new(HttpBackend::new(
        &settings.backend,
        settings.request_timeout,
    ));
    let session = Session {
        settings,
        backend,
        cancel,
    };
    match command {
        Command::List {
            search,
            category,
            uploader,
            sort,
            order,
            local_sort,
        } => {
            session.list(
                search.unwrap_or_default(),
                category.unwrap_or_default(),
                uploader.unwrap_or_default(),
                (sort, order),
                local_sort,
            )
            .await
        }
        Command::Recent => session.recent().await,
        Command::Formats { url } => session.formats(&url).await,
        Command::Add { url, quality } => session.add(&url, quality.as_deref()).await,
        Command::Delete { ids, yes } => session.delete(ids, yes).await,
        Command::Cookies { source } => session.cookies(source).await,
        Command::Play { id } => session.play(&id).await,
        Command::Download { id } => session.download(&id).await,
        Command::Open { id } => session.open(&id).await,
        Command::Config { action } => session.config(action, cli.env_file),
        Command::Tui => Ok(()),
    }
}

struct Session {
    settings: Settings,
    backend: Arc<dyn Backend>,
    cancel: CancellationToken,
}

impl Session {
    fn language(&self) -> Language {
        self.settings.language
    }

    async fn library(&self) -> Result<LibraryView> {
        let mut library = LibraryView::new(self.settings.backend.as_str());
        library.load(&self.backend, &self.cancel).await;
        if let LoadState::Failed(message) = library.state() {
            bail!("{}: {message}", t(self.language(), "library.error"));
        }
        Ok(library)
    }

    async fn find_video(&self, id: &str) -> Result<Video> {
        let library = self.library().await?;
        library
            .find(id)
            .cloned()
            .ok_or_else(|| anyhow!("no video with id {id} in the library"))
    }

    async fn list(
        &self,
        search: String,
        category: String,
        uploader: String,
        (sort_by, order): (SortBy, SortOrder),
        local_sort: Option<SortOrder>,
    ) -> Result<()> {
        let language = self.language();
        let mut library = LibraryView::new(self.settings.backend.as_str());
        library.set_search(search);
        library.set_category(category);
        library.set_uploader(uploader);
        library.set_sort(sort_by, order);
        library.set_local_date_sort(local_sort);
        library.load(&self.backend, &self.cancel).await;
        if let LoadState::Failed(message) = library.state() {
            bail!("{}: {message}", t(language, "library.error"));
        }

        println!("{}", library.summary_line(language, None));
        if let Some(key) = library.empty_state_key() {
            println!("{}", t(language, key));
            return Ok(());
        }
        for video in library.visible() {
            print_video(video);
        }
        Ok(())
    }

    async fn recent(&self) -> Result<()> {
        let language = self.language();
        let mut recents = RecentVideos::new(self.settings.backend.as_str());
        recents.load(&self.backend, &self.cancel).await;
        if let LoadState::Failed(message) = recents.state() {
            bail!("{}: {message}", t(language, "library.error"));
        }
        println!("{}", t(language, "recent.title"));
        if recents.videos().is_empty() {
            println!("  {}", t(language, "recent.empty"));
        }
        for video in recents.videos() {
            print_video(video);
        }
        Ok(())
    }

    async fn analyzed_form(&self, url: &str) -> Result<UploadForm> {
        let language = self.language();
        let mut form = UploadForm::new();
        if form.set_url(url).is_none() {
            bail!("{}", t(language, "upload.invalid_url"));
        }
        match form.analyze(&self.backend, &self.cancel).await {
            AnalyzeState::Ready => Ok(form),
            AnalyzeState::NoFormats => bail!("{}", t(language, "upload.no_formats")),
            AnalyzeState::Failed(message) => {
                bail!("{}: {message}", t(language, "upload.analyze_error"))
            }
            AnalyzeState::Idle | AnalyzeState::Analyzing => bail!("analysis was cancelled"),
        }
    }

    async fn formats(&self, url: &str) -> Result<()> {
        let form = self.analyzed_form(url).await?;
        let chosen = form.chosen_index();
        for (idx, option) in form.options().iter().enumerate() {
            let marker = if Some(idx) == chosen { "*" } else { " " };
            println!("{marker} {:<8} {:<24} {}", option.quality, option.label, option.size);
        }
        Ok(())
    }

    async fn add(&self, url: &str, quality: Option<&str>) -> Result<()> {
        let language = self.language();
        let mut form = self.analyzed_form(url).await?;
        if let Some(quality) = quality {
            let idx = form
                .options()
                .iter()
                .position(|option| option.quality.eq_ignore_ascii_case(quality))
                .ok_or_else(|| anyhow!("quality {quality} is not offered for this link"))?;
            form.choose(idx);
        }
        let submission = form.begin_submit().map_err(|err| anyhow!("{err}"))?;

        let progress = ProgressStore::new();
        let mut updates = progress.subscribe();
        let reporter = tokio::spawn(async move {
            while updates.changed().await.is_ok() {
                let snapshot = *updates.borrow_and_update();
                if let Some(key) = snapshot.status.label_key() {
                    eprintln!("[{:>3}%] {}", snapshot.progress, t(language, key));
                }
            }
        });
        let timings = PipelineTimings {
            success_display: std::time::Duration::ZERO,
            failure_reset: std::time::Duration::ZERO,
        };
        let pipeline =
            Pipeline::new(self.backend.clone(), progress, RefreshBus::new()).with_timings(timings);
        let result = pipeline.run(&submission, &self.cancel).await;
        drop(pipeline);
        if let Err(err) = reporter.await {
            debug!(error = %err, "progress reporter stopped");
        }

        let outcome = result.map_err(|err| anyhow!("{err}: {}", err.source))?;
        let title = outcome.analyze.title().unwrap_or(url);
        match outcome.save.video_id() {
            Some(id) => println!("{}: {title} ({id})", t(language, "pipeline.completed")),
            None => println!("{}: {title}", t(language, "pipeline.completed")),
        }
        Ok(())
    }

    async fn delete(&self, ids: Vec<String>, yes: bool) -> Result<()> {
        let language = self.language();
        if !yes && !confirm(&confirm_message(language, ids.len()))? {
            return Ok(());
        }
        match selection::delete_batch(&self.backend, &self.cancel, ids).await {
            Ok(deleted) => {
                println!("{}", deleted_message(language, deleted.len()));
                Ok(())
            }
            Err(err) => {
                if !err.deleted.is_empty() {
                    println!("{}", deleted_message(language, err.deleted.len()));
                }
                Err(anyhow!("{err}: {}", err.source))
            }
        }
    }

    async fn cookies(&self, source: CookieSource) -> Result<()> {
        let language = self.language();
        let status = match source {
            CookieSource::Text { file } => {
                let text = if file.as_os_str() == "-" {
                    let mut text = String::new();
                    io::stdin().read_to_string(&mut text).context("Reading cookies from stdin")?;
                    text
                } else {
                    tokio::fs::read_to_string(&file)
                        .await
                        .with_context(|| format!("Reading {}", file.display()))?
                };
                cookies::submit_pasted(&self.backend, &self.cancel, &text, language, Utc::now())
                    .await
            }
            CookieSource::Browser { demo_fallback, .. } => {
                let raw = match &self.settings.cookie_jar {
                    Some(path) => tokio::fs::read_to_string(path)
                        .await
                        .with_context(|| format!("Reading {}", path.display()))?,
                    None => String::new(),
                };
                let site = Url::parse(cookies::DEFAULT_COOKIE_SITE).context("Parsing cookie site")?;
                let jar = cookies::read_cookie_jar(&raw, &site, Utc::now(), demo_fallback);
                cookies::submit_browser(&self.backend, &self.cancel, jar, language).await
            }
        };
        report_cookie_status(status)
    }

    async fn play(&self, id: &str) -> Result<()> {
        let language = self.language();
        let video = self.find_video(id).await?;
        println!("{} {}", t(language, "player.loading"), video.title);
        let mut modal = PlayerModal::new(&self.settings.player);
        modal.open(video);
        modal.play(&self.cancel)?;
        match modal.wait().await {
            PlaybackState::Finished => println!("{}", t(language, "player.finished")),
            PlaybackState::Error => bail!("{}", t(language, "player.error")),
            _ => println!("{}", t(language, "player.stopped")),
        }
        Ok(())
    }

    async fn download(&self, id: &str) -> Result<()> {
        let language = self.language();
        let video = self.find_video(id).await?;
        let dir = self.settings.download_dir.clone();
        let timeout = self.settings.request_timeout;
        let saved =
            tokio::task::spawn_blocking(move || player::download_video(&video, &dir, timeout))
                .await
                .context("Download task failed")?
                .with_context(|| t(language, "player.download_failed"))?;
        if let Some(path) = saved {
            let path = path.display().to_string();
            println!("{}", tf(language, "player.downloaded", &[("path", path)]));
        }
        Ok(())
    }

    async fn open(&self, id: &str) -> Result<()> {
        let video = self.find_video(id).await?;
        player::open_original(&video)?;
        Ok(())
    }

    fn config(&self, action: ConfigAction, env_file: Option<PathBuf>) -> Result<()> {
        match action {
            ConfigAction::Show => {
                for (key, value) in self.settings.entries() {
                    println!("{key}={value}");
                }
                Ok(())
            }
            ConfigAction::Set { key, value } => {
                if !KNOWN_KEYS.contains(&key.as_str()) {
                    bail!("unknown setting {key}; expected one of {}", KNOWN_KEYS.join(", "));
                }
                if key == config::BACKEND_KEY {
                    config::parse_backend(&value)?;
                }
                let path = env_file.unwrap_or_else(|| PathBuf::from(config::DEFAULT_ENV_PATH));
                config::upsert_env_value(&path, &key, &value)?;
                println!("{key} saved to {}", path.display());
                Ok(())
            }
        }
    }
}

fn print_video(video: &Video) {
    println!(
        "{:<12} {:<48} {:>9} {:<14} {:>10} {}",
        video.id, video.title, video.duration, video.format, video.file_size, video.downloaded_at
    );
}

fn report_cookie_status(status: CookieStatus) -> Result<()> {
    if status.is_success() {
        println!("{}", status.message);
        Ok(())
    } else {
        bail!("{}", status.message)
    }
}

fn deleted_message(language: Language, count: usize) -> String {
    tf(language, "selection.deleted", &[("count", count.to_string())])
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt} [y/N] ");
    io::stdout().flush().context("Flushing prompt")?;
    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("Reading confirmation")?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_tui() {
        let cli = Cli::try_parse_from(["videowallet"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn global_overrides_reach_settings() {
        let cli = Cli::try_parse_from([
            "videowallet",
            "list",
            "--backend",
            "http://10.0.0.2:6800",
            "--lang",
            "zh",
            "--sort",
            "title",
            "--order",
            "asc",
        ])
        .unwrap();
        let overrides = cli.overrides();
        assert_eq!(overrides.backend.as_deref(), Some("http://10.0.0.2:6800"));
        assert_eq!(overrides.language.as_deref(), Some("zh"));
        match cli.command {
            Some(Command::List { sort, order, .. }) => {
                assert_eq!(sort, SortBy::Title);
                assert_eq!(order, SortOrder::Asc);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn delete_requires_ids() {
        assert!(Cli::try_parse_from(["videowallet", "delete"]).is_err());
        let cli = Cli::try_parse_from(["videowallet", "delete", "a", "b", "--yes"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::Delete { ref ids, yes: true }) if ids.len() == 2
        ));
    }

    #[test]
    fn unknown_sort_key_is_rejected() {
        assert!(Cli::try_parse_from(["videowallet", "list", "--sort", "rating"]).is_err());
    }
}
