#![forbid(unsafe_code)]

//! UI preferences that survive restarts.

use crate::api::{SortBy, SortOrder};
use crate::i18n::Language;
use crate::library::ViewMode;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub language: Language,
    pub view_mode: ViewMode,
    pub sort_by: SortBy,
    pub order: SortOrder,
}

impl Preferences {
    /// Reads `path`. A missing or unreadable file yields the defaults.
    pub fn load(path: &Path) -> Preferences {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) => {
                if err.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %err, "could not read preferences");
                }
                return Preferences::default();
            }
        };
        toml::from_str(&raw).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "ignoring corrupt preferences");
            Preferences::default()
        })
    }

    /// Writes the whole file through a temp file in the same directory.
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).with_context(|| format!("Creating {}", dir.display()))?;
        let body = toml::to_string_pretty(self).context("Serializing preferences")?;
        let mut tmp = NamedTempFile::new_in(dir)
            .with_context(|| format!("Creating temp file in {}", dir.display()))?;
        tmp.write_all(body.as_bytes())
            .context("Writing preferences")?;
        tmp.persist(path)
            .with_context(|| format!("Replacing {}", path.display()))?;
        Ok(())
    }
}
