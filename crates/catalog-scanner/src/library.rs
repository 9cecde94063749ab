//! Media library enumeration.
//!
//! Walks the configured roots and yields candidate file paths; deciding which
//! of them are media files is left to `is_supported_extension`.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Lists regular files under a root, recursively.
pub trait FileEnumerator: Send + Sync {
    /// Absolute paths of every file under `root`. Unreadable entries are
    /// skipped; the order is not significant.
    fn enumerate_files(&self, root: &Path) -> Vec<PathBuf>;
}

/// Recursive walk that follows symlinked directories.
#[derive(Clone, Debug, Default)]
pub struct WalkDirEnumerator;

impl FileEnumerator for WalkDirEnumerator {
    fn enumerate_files(&self, root: &Path) -> Vec<PathBuf> {
        let root = match std::path::absolute(root) {
            Ok(root) => root,
            Err(err) => {
                tracing::warn!(root = %root.display(), error = %err, "search path cannot be made absolute");
                return Vec::new();
            }
        };
        if !root.is_dir() {
            tracing::warn!(root = %root.display(), "search path is not a directory");
            return Vec::new();
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&root).follow_links(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!(root = %root.display(), error = %err, "walk entry skipped");
                    continue;
                }
            };
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
        tracing::debug!(root = %root.display(), files = files.len(), "search path enumerated");
        files
    }
}

/// Whether `path` names a media file the catalog tracks.
pub fn is_supported_path(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .map(|ext| is_supported_extension(&ext.to_ascii_lowercase()))
        .unwrap_or(false)
}

fn is_supported_extension(ext: &str) -> bool {
    matches!(
        ext,
        "mp3" | "flac" | "ogg" | "oga" | "opus" | "m4a" | "mp4" | "aac" | "wav" | "aif" | "aiff"
            | "wv" | "ape"
    )
}
