//! Deletion of catalog rows (and art files) nothing refers to anymore.
//!
//! Order matters when running a full cleanup: albums first, since pruning an
//! album drops its AlbumArtists rows, which may orphan more artists.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use rusqlite::Connection;

use crate::error::{CatalogError, Result};

/// Delete albums no song references. Returns the number removed.
pub fn prune_albums(conn: &Connection) -> Result<usize> {
    conn.execute(
        r#"
        DELETE FROM Albums
        WHERE id NOT IN (SELECT album_id FROM Songs WHERE album_id IS NOT NULL)
        "#,
        [],
    )
    .map_err(CatalogError::query("prune albums"))
}

/// Delete artists that neither contribute to a song nor are credited on an album.
pub fn prune_artists(conn: &Connection) -> Result<usize> {
    conn.execute(
        r#"
        DELETE FROM Artists
        WHERE id NOT IN (
            SELECT artist_id FROM ContributingArtists
            UNION
            SELECT artist_id FROM AlbumArtists
        )
        "#,
        [],
    )
    .map_err(CatalogError::query("prune artists"))
}

/// Delete genres no song is mapped to.
pub fn prune_genres(conn: &Connection) -> Result<usize> {
    conn.execute(
        "DELETE FROM Genres WHERE id NOT IN (SELECT genre_id FROM SongGenreMap)",
        [],
    )
    .map_err(CatalogError::query("prune genres"))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneCounts {
    pub albums: usize,
    pub artists: usize,
    pub genres: usize,
}

/// Run the three prunes in dependency order. Each step is attempted even when
/// an earlier one fails; failures are logged and leave that count at zero.
pub fn prune_all(conn: &Connection) -> PruneCounts {
    let mut counts = PruneCounts::default();
    match prune_albums(conn) {
        Ok(n) => counts.albums = n,
        Err(err) => tracing::warn!(error = %err, "album cleanup failed"),
    }
    match prune_artists(conn) {
        Ok(n) => counts.artists = n,
        Err(err) => tracing::warn!(error = %err, "artist cleanup failed"),
    }
    match prune_genres(conn) {
        Ok(n) => counts.genres = n,
        Err(err) => tracing::warn!(error = %err, "genre cleanup failed"),
    }
    counts
}

/// Remove regular files in `art_dir` whose file name no
/// `Albums.album_art_location` records.
///
/// Returns the paths deleted. Files that cannot be removed are logged and kept.
pub fn prune_album_art(conn: &Connection, art_dir: &Path) -> Result<Vec<PathBuf>> {
    let referenced = referenced_art(conn)?;
    let entries = match std::fs::read_dir(art_dir) {
        Ok(entries) => entries,
        Err(err) => {
            tracing::warn!(path = %art_dir.display(), error = %err, "album art directory unreadable");
            return Ok(Vec::new());
        }
    };

    let mut removed = Vec::new();
    for entry in entries.flatten() {
        let is_file = entry.file_type().map(|ft| ft.is_file()).unwrap_or(false);
        if !is_file {
            continue;
        }
        if referenced.contains(&*entry.file_name().to_string_lossy()) {
            continue;
        }
        let path = entry.path();
        match std::fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "unreferenced album art removed");
                removed.push(path);
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "album art removal failed");
            }
        }
    }
    Ok(removed)
}

fn referenced_art(conn: &Connection) -> Result<HashSet<String>> {
    let mut stmt = conn
        .prepare("SELECT album_art_location FROM Albums WHERE album_art_location IS NOT NULL")
        .map_err(CatalogError::query("prepare referenced art"))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(CatalogError::query("select referenced art"))?;
    let mut names = HashSet::new();
    for row in rows {
        names.insert(row.map_err(CatalogError::query("read referenced art"))?);
    }
    Ok(names)
}
