//! Catalog schema bootstrap and destructive reset.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{CatalogError, Result};

pub const SCHEMA_VERSION: i32 = 1;

const CATALOG_SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS CatalogMeta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS Albums (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        album_art_location TEXT
    );

    CREATE TABLE IF NOT EXISTS Artists (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        description TEXT,
        photo_location TEXT
    );

    CREATE TABLE IF NOT EXISTS Genres (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS Songs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        track_number INTEGER,
        disc_number INTEGER,
        rating INTEGER,
        album_id INTEGER,
        location TEXT NOT NULL UNIQUE,
        FOREIGN KEY (album_id) REFERENCES Albums(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS AlbumArtists (
        album_id INTEGER NOT NULL,
        artist_id INTEGER NOT NULL,
        PRIMARY KEY (album_id, artist_id),
        FOREIGN KEY (album_id) REFERENCES Albums(id) ON DELETE CASCADE,
        FOREIGN KEY (artist_id) REFERENCES Artists(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS ContributingArtists (
        song_id INTEGER NOT NULL,
        artist_id INTEGER NOT NULL,
        PRIMARY KEY (song_id, artist_id),
        FOREIGN KEY (song_id) REFERENCES Songs(id) ON DELETE CASCADE,
        FOREIGN KEY (artist_id) REFERENCES Artists(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS SongGenreMap (
        song_id INTEGER NOT NULL,
        genre_id INTEGER NOT NULL,
        PRIMARY KEY (song_id, genre_id),
        FOREIGN KEY (song_id) REFERENCES Songs(id) ON DELETE CASCADE,
        FOREIGN KEY (genre_id) REFERENCES Genres(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS Playlists (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS PlaylistSongs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        playlist_id INTEGER NOT NULL,
        song_id INTEGER NOT NULL,
        FOREIGN KEY (playlist_id) REFERENCES Playlists(id) ON DELETE CASCADE,
        FOREIGN KEY (song_id) REFERENCES Songs(id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_songs_album_id ON Songs(album_id);
    CREATE INDEX IF NOT EXISTS idx_albums_title ON Albums(title);
    CREATE INDEX IF NOT EXISTS idx_album_artists_artist ON AlbumArtists(artist_id);
    CREATE INDEX IF NOT EXISTS idx_contributing_artists_artist ON ContributingArtists(artist_id);
    CREATE INDEX IF NOT EXISTS idx_song_genre_map_genre ON SongGenreMap(genre_id);
"#;

/// Open a SQLite connection with foreign keys enforced.
pub(crate) fn open_connection(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path).map_err(|source| CatalogError::StoreOpen {
        path: path.to_path_buf(),
        source,
    })?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(|source| CatalogError::StoreOpen {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(conn)
}

/// Create any missing catalog tables and check the recorded schema version.
pub fn init_schema(conn: &Connection, path: &Path) -> Result<()> {
    let schema_err = |source| CatalogError::Schema {
        path: path.to_path_buf(),
        source,
    };
    conn.execute_batch(CATALOG_SCHEMA).map_err(schema_err)?;

    let version: Option<String> = conn
        .query_row(
            "SELECT value FROM CatalogMeta WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .optional()
        .map_err(schema_err)?;
    match version {
        None => {
            conn.execute(
                "INSERT INTO CatalogMeta (key, value) VALUES ('schema_version', ?1)",
                params![SCHEMA_VERSION.to_string()],
            )
            .map_err(schema_err)?;
        }
        Some(found) if found.parse::<i32>().ok() == Some(SCHEMA_VERSION) => {}
        Some(found) => {
            return Err(CatalogError::UnsupportedSchema {
                found,
                expected: SCHEMA_VERSION,
            });
        }
    }
    Ok(())
}

/// Discard whatever is stored at `path` and create an empty catalog there.
pub fn create_database(path: &Path) -> Result<()> {
    for stale in store_files(path) {
        match std::fs::remove_file(&stale) {
            Ok(()) => tracing::debug!(path = %stale.display(), "removed previous catalog file"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                return Err(CatalogError::StoreFile {
                    path: stale,
                    source: err,
                });
            }
        }
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| CatalogError::StoreFile {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let conn = open_connection(path)?;
    init_schema(&conn, path)?;
    tracing::info!(path = %path.display(), "catalog created");
    Ok(())
}

fn store_files(path: &Path) -> Vec<PathBuf> {
    let mut files = vec![path.to_path_buf()];
    for suffix in ["-wal", "-shm", "-journal"] {
        let mut name = path.as_os_str().to_os_string();
        name.push(suffix);
        files.push(PathBuf::from(name));
    }
    files
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_names(conn: &Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name")
            .unwrap();
        stmt.query_map([], |row| row.get(0))
            .unwrap()
            .collect::<rusqlite::Result<Vec<String>>>()
            .unwrap()
    }

    #[test]
    fn init_schema_creates_all_tables() {
        let conn = Connection::open_in_memory().expect("open memory db");
        init_schema(&conn, Path::new(":memory:")).expect("init schema");
        assert_eq!(
            table_names(&conn),
            vec![
                "AlbumArtists",
                "Albums",
                "Artists",
                "CatalogMeta",
                "ContributingArtists",
                "Genres",
                "PlaylistSongs",
                "Playlists",
                "SongGenreMap",
                "Songs",
            ]
        );
    }

    #[test]
    fn init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().expect("open memory db");
        init_schema(&conn, Path::new(":memory:")).expect("first init");
        init_schema(&conn, Path::new(":memory:")).expect("second init");
        let versions: i64 = conn
            .query_row("SELECT COUNT(*) FROM CatalogMeta", [], |row| row.get(0))
            .unwrap();
        assert_eq!(versions, 1);
    }

    #[test]
    fn init_schema_rejects_other_versions() {
        let conn = Connection::open_in_memory().expect("open memory db");
        init_schema(&conn, Path::new(":memory:")).expect("init schema");
        conn.execute(
            "UPDATE CatalogMeta SET value = '7' WHERE key = 'schema_version'",
            [],
        )
        .unwrap();
        let err = init_schema(&conn, Path::new(":memory:")).unwrap_err();
        assert!(matches!(err, CatalogError::UnsupportedSchema { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn create_database_discards_previous_contents() {
        let dir = crate::test_support::scratch_dir("schema-reset");
        let path = dir.join("catalog.sqlite");
        create_database(&path).expect("create");
        {
            let conn = open_connection(&path).unwrap();
            conn.execute("INSERT INTO Genres (name) VALUES ('Pop')", []).unwrap();
        }

        create_database(&path).expect("recreate");
        let conn = open_connection(&path).unwrap();
        let genres: i64 = conn
            .query_row("SELECT COUNT(*) FROM Genres", [], |row| row.get(0))
            .unwrap();
        assert_eq!(genres, 0);
        assert_eq!(table_names(&conn).len(), 10);
    }

    #[test]
    fn create_database_replaces_foreign_file() {
        let dir = crate::test_support::scratch_dir("schema-foreign");
        let path = dir.join("catalog.sqlite");
        std::fs::write(&path, b"definitely not sqlite").unwrap();

        create_database(&path).expect("create over junk file");
        let conn = open_connection(&path).unwrap();
        assert!(table_names(&conn).contains(&"Songs".to_string()));
    }
}
