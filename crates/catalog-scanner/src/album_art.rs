//! Album cover storage.
//!
//! Each album records at most one image, stored as `<uuid>.<ext>` in the art
//! directory. The first song ingested for an album supplies it; later songs
//! never replace it.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{CatalogError, Result};
use crate::tags::MetadataExtractor;

const MAX_NAME_ATTEMPTS: usize = 8;

/// The directory album images are written to.
#[derive(Clone, Debug)]
pub struct AlbumArtStore {
    dir: PathBuf,
}

impl AlbumArtStore {
    /// Make sure `dir` exists as a directory, replacing a file found in its place.
    ///
    /// A symlink to a directory is used as is.
    pub fn prepare(dir: &Path) -> Result<Self> {
        let art_dir_err = |source| CatalogError::ArtDirectory {
            path: dir.to_path_buf(),
            source,
        };
        match std::fs::metadata(dir) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                tracing::warn!(path = %dir.display(), "album art path is not a directory, replacing");
                std::fs::remove_file(dir).map_err(art_dir_err)?;
                std::fs::create_dir_all(dir).map_err(art_dir_err)?;
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                // Dangling symlink: the link itself is still there.
                if std::fs::symlink_metadata(dir).is_ok() {
                    tracing::warn!(path = %dir.display(), "album art path is a dangling link, replacing");
                    std::fs::remove_file(dir).map_err(art_dir_err)?;
                }
                std::fs::create_dir_all(dir).map_err(art_dir_err)?;
            }
            Err(err) => return Err(art_dir_err(err)),
        }
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Remove a file previously returned by [`store`](Self::store).
    pub fn discard(&self, file_name: &str) {
        let path = self.dir.join(file_name);
        if let Err(err) = std::fs::remove_file(&path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), error = %err, "album art removal failed");
            }
        }
    }

    /// Write `data` under a fresh collision-free name and return that name.
    pub fn store(&self, data: &[u8]) -> Result<String> {
        let ext = extension_for(data);
        let mut last_collision = None;
        for _ in 0..MAX_NAME_ATTEMPTS {
            let file_name = format!("{}.{}", uuid::Uuid::new_v4(), ext);
            let path = self.dir.join(&file_name);
            let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => file,
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                    last_collision = Some((path, err));
                    continue;
                }
                Err(source) => return Err(CatalogError::ArtWrite { path, source }),
            };
            if let Err(source) = file.write_all(data) {
                drop(file);
                let _ = std::fs::remove_file(&path);
                return Err(CatalogError::ArtWrite { path, source });
            }
            return Ok(file_name);
        }
        let (path, source) = last_collision.unwrap_or_else(|| {
            (
                self.dir.clone(),
                std::io::Error::from(std::io::ErrorKind::AlreadyExists),
            )
        });
        Err(CatalogError::ArtWrite { path, source })
    }
}

/// What `ensure_album_art` did for one song.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtOutcome {
    AlreadyPresent,
    NoImage,
    Written(String),
    Failed,
}

/// Whether the album already records an image. A failed lookup counts as
/// present so no write is attempted.
pub fn has_art(conn: &Connection, album_id: i64) -> bool {
    let found = conn
        .query_row(
            "SELECT album_art_location FROM Albums WHERE id = ?1",
            params![album_id],
            |row| row.get::<_, Option<String>>(0),
        )
        .optional();
    match found {
        Ok(Some(Some(location))) => !location.is_empty(),
        Ok(_) => false,
        Err(err) => {
            tracing::warn!(album_id, error = %err, "album art lookup failed");
            true
        }
    }
}

/// Store the embedded image of `song_path` for `album_id` unless the album
/// already has one. Failures are logged; they never fail the song.
pub fn ensure_album_art(
    conn: &Connection,
    store: &AlbumArtStore,
    extractor: &dyn MetadataExtractor,
    album_id: i64,
    song_path: &Path,
) -> ArtOutcome {
    if has_art(conn, album_id) {
        tracing::debug!(album_id, "album art already present");
        return ArtOutcome::AlreadyPresent;
    }

    let data = match extractor.extract_embedded_image(song_path) {
        Ok(Some(data)) => data,
        Ok(None) => return ArtOutcome::NoImage,
        Err(err) => {
            tracing::warn!(path = %song_path.display(), error = %err, "embedded image extraction failed");
            return ArtOutcome::Failed;
        }
    };

    let file_name = match store.store(&data) {
        Ok(name) => name,
        Err(err) => {
            tracing::warn!(album_id, error = %err, "album art write failed");
            return ArtOutcome::Failed;
        }
    };

    let updated = conn.execute(
        "UPDATE Albums SET album_art_location = ?1 WHERE id = ?2",
        params![file_name, album_id],
    );
    match updated {
        Ok(_) => {
            tracing::debug!(album_id, file = %file_name, "album art stored");
            ArtOutcome::Written(file_name)
        }
        Err(err) => {
            tracing::warn!(album_id, error = %err, "album art location update failed");
            store.discard(&file_name);
            ArtOutcome::Failed
        }
    }
}

/// File extension for an image, sniffed from its leading bytes.
fn extension_for(data: &[u8]) -> &'static str {
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "jpg"
    } else if data.starts_with(b"\x89PNG\r\n\x1a\n") {
        "png"
    } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        "gif"
    } else if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        "webp"
    } else if data.starts_with(b"BM") {
        "bmp"
    } else {
        "img"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog_db::CatalogDb;
    use crate::test_support::FakeExtractor;

    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];

    fn album(conn: &Connection) -> i64 {
        conn.execute("INSERT INTO Albums (title) VALUES ('A')", []).unwrap();
        conn.last_insert_rowid()
    }

    #[test]
    fn extension_for_sniffs_common_formats() {
        assert_eq!(extension_for(JPEG), "jpg");
        assert_eq!(extension_for(b"\x89PNG\r\n\x1a\nrest"), "png");
        assert_eq!(extension_for(b"GIF89a..."), "gif");
        assert_eq!(extension_for(b"RIFF\0\0\0\0WEBPVP8 "), "webp");
        assert_eq!(extension_for(b"BM...."), "bmp");
        assert_eq!(extension_for(b"????"), "img");
    }

    #[test]
    fn prepare_creates_missing_dir() {
        let root = crate::test_support::scratch_dir("art-create");
        let dir = root.join("nested").join("art");
        let store = AlbumArtStore::prepare(&dir).unwrap();
        assert!(store.dir().is_dir());
    }

    #[test]
    fn prepare_replaces_file_with_dir() {
        let root = crate::test_support::scratch_dir("art-replace");
        let dir = root.join("art");
        std::fs::write(&dir, b"in the way").unwrap();
        AlbumArtStore::prepare(&dir).unwrap();
        assert!(dir.is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn prepare_keeps_symlinked_dir() {
        let root = crate::test_support::scratch_dir("art-symlink");
        let real = root.join("real-art");
        std::fs::create_dir(&real).unwrap();
        std::fs::write(real.join("existing.jpg"), b"jpg").unwrap();
        let link = root.join("art");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        let store = AlbumArtStore::prepare(&link).unwrap();
        assert!(std::fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert!(store.dir().join("existing.jpg").is_file());
        assert!(real.join("existing.jpg").is_file());
    }

    #[cfg(unix)]
    #[test]
    fn prepare_replaces_dangling_symlink() {
        let root = crate::test_support::scratch_dir("art-dangling");
        let link = root.join("art");
        std::os::unix::fs::symlink(root.join("gone"), &link).unwrap();

        AlbumArtStore::prepare(&link).unwrap();
        assert!(!std::fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert!(link.is_dir());
    }

    #[test]
    fn discard_removes_stored_file() {
        let root = crate::test_support::scratch_dir("art-discard");
        let store = AlbumArtStore::prepare(&root).unwrap();
        let name = store.store(JPEG).unwrap();
        store.discard(&name);
        assert!(!root.join(&name).exists());
        // Already gone: nothing to do.
        store.discard(&name);
    }

    #[test]
    fn store_writes_unique_files() {
        let root = crate::test_support::scratch_dir("art-store");
        let store = AlbumArtStore::prepare(&root).unwrap();
        let first = store.store(JPEG).unwrap();
        let second = store.store(JPEG).unwrap();
        assert_ne!(first, second);
        assert!(first.ends_with(".jpg"));
        assert_eq!(std::fs::read(root.join(&first)).unwrap(), JPEG);
    }

    #[test]
    fn ensure_album_art_writes_once() {
        let db = CatalogDb::open_in_memory();
        let conn = db.connection();
        let root = crate::test_support::scratch_dir("art-once");
        let store = AlbumArtStore::prepare(&root).unwrap();
        let extractor = FakeExtractor::default();
        extractor.set_image("/m/1.mp3", JPEG);
        extractor.set_image("/m/2.mp3", JPEG);
        let album_id = album(conn);

        let first = ensure_album_art(conn, &store, &extractor, album_id, Path::new("/m/1.mp3"));
        let ArtOutcome::Written(name) = first else {
            panic!("expected art write, got {first:?}");
        };
        assert!(has_art(conn, album_id));
        let second = ensure_album_art(conn, &store, &extractor, album_id, Path::new("/m/2.mp3"));
        assert_eq!(second, ArtOutcome::AlreadyPresent);
        assert_eq!(extractor.image_requests(), vec![PathBuf::from("/m/1.mp3")]);
        assert_eq!(std::fs::read_dir(&root).unwrap().count(), 1);
        assert_eq!(db.list_albums().unwrap()[0].album_art_location, Some(name));
    }

    #[test]
    fn ensure_album_art_without_image_leaves_album_bare() {
        let db = CatalogDb::open_in_memory();
        let conn = db.connection();
        let root = crate::test_support::scratch_dir("art-none");
        let store = AlbumArtStore::prepare(&root).unwrap();
        let extractor = FakeExtractor::default();
        let album_id = album(conn);

        let outcome = ensure_album_art(conn, &store, &extractor, album_id, Path::new("/m/1.mp3"));
        assert_eq!(outcome, ArtOutcome::NoImage);
        assert!(!has_art(conn, album_id));
    }

    #[test]
    fn has_art_treats_lookup_failure_as_present() {
        let db = CatalogDb::open_in_memory();
        let conn = db.connection();
        conn.execute_batch("DROP TABLE PlaylistSongs; DROP TABLE Songs; DROP TABLE AlbumArtists; DROP TABLE Albums;")
            .unwrap();
        assert!(has_art(conn, 1));
    }
}
