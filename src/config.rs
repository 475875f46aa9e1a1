#![forbid(unsafe_code)]

use crate::i18n::Language;
use anyhow::{Context, Result, bail};
use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};
use url::Url;

pub const DEFAULT_ENV_PATH: &str = ".env";
pub const DEFAULT_BACKEND: &str = "http://localhost:6800";
pub const DEFAULT_PLAYER: &str = "mpv";
pub const DEFAULT_PREFS_PATH: &str = "videowallet.toml";

pub const BACKEND_KEY: &str = "VIDEOWALLET_BACKEND";
pub const LANG_KEY: &str = "VIDEOWALLET_LANG";
pub const DOWNLOAD_DIR_KEY: &str = "VIDEOWALLET_DOWNLOAD_DIR";
pub const PLAYER_KEY: &str = "VIDEOWALLET_PLAYER";
pub const TIMEOUT_KEY: &str = "VIDEOWALLET_TIMEOUT_SECS";
pub const COOKIE_JAR_KEY: &str = "VIDEOWALLET_COOKIE_JAR";
pub const PREFS_KEY: &str = "VIDEOWALLET_PREFS";
pub const LOG_DIR_KEY: &str = "VIDEOWALLET_LOG_DIR";

/// Every key `config set` accepts.
pub const KNOWN_KEYS: &[&str] = &[
    BACKEND_KEY,
    LANG_KEY,
    DOWNLOAD_DIR_KEY,
    PLAYER_KEY,
    TIMEOUT_KEY,
    COOKIE_JAR_KEY,
    PREFS_KEY,
    LOG_DIR_KEY,
];

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub backend: Url,
    pub language: Language,
    pub download_dir: PathBuf,
    pub player: String,
    /// `None` means requests never time out.
    pub request_timeout: Option<Duration>,
    pub cookie_jar: Option<PathBuf>,
    pub prefs_path: PathBuf,
    pub log_dir: PathBuf,
}

impl Settings {
    /// `(key, value)` pairs in [`KNOWN_KEYS`] order, for display.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        vec![
            (BACKEND_KEY, self.backend.to_string()),
            (LANG_KEY, self.language.code().to_string()),
            (DOWNLOAD_DIR_KEY, self.download_dir.display().to_string()),
            (PLAYER_KEY, self.player.clone()),
            (
                TIMEOUT_KEY,
                self.request_timeout
                    .map_or(0, |timeout| timeout.as_secs())
                    .to_string(),
            ),
            (
                COOKIE_JAR_KEY,
                self.cookie_jar
                    .as_ref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_default(),
            ),
            (PREFS_KEY, self.prefs_path.display().to_string()),
            (LOG_DIR_KEY, self.log_dir.display().to_string()),
        ]
    }
}

pub fn load_settings() -> Result<Settings> {
    resolve_settings(SettingsOverrides::default())
}

/// Values given on the command line; they beat everything else.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub backend: Option<String>,
    pub language: Option<String>,
    pub download_dir: Option<PathBuf>,
    pub player: Option<String>,
    pub timeout_secs: Option<u64>,
    pub cookie_jar: Option<PathBuf>,
    pub prefs_path: Option<PathBuf>,
    pub env_path: Option<PathBuf>,
}

pub fn resolve_settings(overrides: SettingsOverrides) -> Result<Settings> {
    let env_path = overrides
        .env_path
        .as_deref()
        .unwrap_or_else(|| Path::new(DEFAULT_ENV_PATH));
    let file_vars = read_env_file(env_path)?;
    build_settings_with_overrides(&file_vars, env_var_string, overrides)
}

#[cfg(test)]
fn build_settings(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
) -> Result<Settings> {
    build_settings_with_overrides(file_vars, env_lookup, SettingsOverrides::default())
}

fn build_settings_with_overrides(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
    overrides: SettingsOverrides,
) -> Result<Settings> {
    let lookup = |key: &str| lookup_value(key, file_vars, &env_lookup);
    let path_override =
        |path: Option<PathBuf>| path.map(|path| path.to_string_lossy().into_owned());

    let backend_raw = non_blank(overrides.backend)
        .or_else(|| lookup(BACKEND_KEY))
        .unwrap_or_else(|| DEFAULT_BACKEND.to_string());
    let backend = parse_backend(&backend_raw)?;

    let language = non_blank(overrides.language)
        .or_else(|| lookup(LANG_KEY))
        .and_then(|value| value.parse::<Language>().ok())
        .unwrap_or_default();
    let download_dir = non_blank(path_override(overrides.download_dir))
        .or_else(|| lookup(DOWNLOAD_DIR_KEY))
        .unwrap_or_else(|| ".".to_string());
    let player = non_blank(overrides.player)
        .or_else(|| lookup(PLAYER_KEY))
        .unwrap_or_else(|| DEFAULT_PLAYER.to_string());
    let timeout_secs = overrides
        .timeout_secs
        .or_else(|| lookup(TIMEOUT_KEY).and_then(|value| value.parse::<u64>().ok()))
        .unwrap_or(0);
    let cookie_jar =
        non_blank(path_override(overrides.cookie_jar)).or_else(|| lookup(COOKIE_JAR_KEY));
    let prefs_path = non_blank(path_override(overrides.prefs_path))
        .or_else(|| lookup(PREFS_KEY))
        .unwrap_or_else(|| DEFAULT_PREFS_PATH.to_string());
    let log_dir = lookup(LOG_DIR_KEY).unwrap_or_else(|| ".".to_string());

    Ok(Settings {
        backend,
        language,
        download_dir: PathBuf::from(download_dir),
        player,
        request_timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
        cookie_jar: cookie_jar.map(PathBuf::from),
        prefs_path: PathBuf::from(prefs_path),
        log_dir: PathBuf::from(log_dir),
    })
}

/// Accepts `http` and `https` origins only.
pub fn parse_backend(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim()).with_context(|| format!("{BACKEND_KEY} is not a URL: {raw}"))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        bail!("{BACKEND_KEY} must be an http(s) origin, got {raw}");
    }
    Ok(url)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn env_var_string(key: &str) -> Option<String> {
    non_blank(env::var(key).ok())
}

fn lookup_value(
    key: &str,
    file_vars: &HashMap<String, String>,
    env_lookup: &impl Fn(&str) -> Option<String>,
) -> Option<String> {
    non_blank(env_lookup(key)).or_else(|| non_blank(file_vars.get(key).cloned()))
}

pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let mut vars = HashMap::new();
    if !path.exists() {
        return Ok(vars);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let line = trimmed.strip_prefix("export ").unwrap_or(trimmed);
        let Some((key, value_raw)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        vars.insert(key.to_string(), unquote(value_raw.trim()));
    }
    Ok(vars)
}

fn unquote(value: &str) -> String {
    if let Some(inner) = value
        .strip_prefix('"')
        .and_then(|value| value.strip_suffix('"'))
    {
        return inner.replace("\\\"", "\"").replace("\\\\", "\\");
    }
    value
        .strip_prefix('\'')
        .and_then(|value| value.strip_suffix('\''))
        .unwrap_or(value)
        .to_string()
}

/// Updates or appends a single key inside the env file, keeping unrelated
/// lines and comments. The file is replaced in one rename.
pub fn upsert_env_value(path: &Path, key: &str, value: &str) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).with_context(|| format!("Creating {}", parent.display()))?;
    }

    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(err) => return Err(err).with_context(|| format!("Reading {}", path.display())),
    };
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    let mut updated = false;
    let mut lines: Vec<String> = raw
        .lines()
        .map(|line| {
            let trimmed = line.trim_start();
            let indent = &line[..line.len() - trimmed.len()];
            let (prefix, rest) = match trimmed.strip_prefix("export ") {
                Some(stripped) => ("export ", stripped),
                None => ("", trimmed),
            };
            match rest.split_once('=') {
                Some((candidate, _)) if !updated && candidate.trim() == key => {
                    updated = true;
                    format!("{indent}{prefix}{key}=\"{escaped}\"")
                }
                _ => line.to_string(),
            }
        })
        .collect();
    if !updated {
        lines.push(format!("{key}=\"{escaped}\""));
    }

    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, lines.join("\n") + "\n")
        .with_context(|| format!("Writing {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("Replacing {}", path.display()))?;
    Ok(())
}
