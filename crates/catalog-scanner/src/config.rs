//! Invocation payload and config file parsing.
//!
//! The same `SyncConfig` arrives either as a single JSON payload or as a file
//! on disk (`.json` or TOML).

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{CatalogError, Result};

/// Settings for one reconciliation pass.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SyncConfig {
    /// Media roots, walked in order.
    pub search_paths: Vec<PathBuf>,
    /// Catalog SQLite file.
    pub database_location: PathBuf,
    /// Where extracted cover images are written.
    pub album_art_directory: PathBuf,
    /// Delete art files no album references at the end of each pass.
    #[serde(default)]
    pub prune_album_art: bool,
    /// Metadata extraction threads (catalog writes stay on one thread).
    #[serde(default = "default_extract_workers")]
    pub extract_workers: usize,
}

fn default_extract_workers() -> usize {
    1
}

impl SyncConfig {
    /// Parse the JSON invocation payload.
    pub fn from_json(raw: &str) -> Result<Self> {
        let cfg: SyncConfig = serde_json::from_str(raw)
            .map_err(|err| CatalogError::Config(format!("parse payload: {err}")))?;
        cfg.validated()
    }

    /// Load from a file; `.json` is read as JSON, anything else as TOML.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|err| CatalogError::Config(format!("read config {path:?}: {err}")))?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            return Self::from_json(&raw);
        }
        let cfg: SyncConfig = toml::from_str(&raw)
            .map_err(|err| CatalogError::Config(format!("parse config {path:?}: {err}")))?;
        cfg.validated()
    }

    fn validated(mut self) -> Result<Self> {
        if self.database_location.as_os_str().is_empty() {
            return Err(CatalogError::Config("database_location is empty".to_string()));
        }
        if self.album_art_directory.as_os_str().is_empty() {
            return Err(CatalogError::Config("album_art_directory is empty".to_string()));
        }
        self.extract_workers = self.extract_workers.max(1);
        Ok(self)
    }
}
