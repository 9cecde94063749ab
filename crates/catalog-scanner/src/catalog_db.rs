//! SQLite catalog handle for albums/artists/genres/songs.
//!
//! Owns the single connection used by a reconciliation pass and exposes the
//! Song-level reads and writes; entity resolution, linking and pruning live in
//! their own modules and operate on a borrowed `Connection`.

use std::collections::HashSet;
use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension, Transaction};
use serde::Serialize;

use crate::error::{CatalogError, Result};
use crate::schema;

pub struct CatalogDb {
    conn: Connection,
}

/// Values for a freshly inserted Song row.
#[derive(Debug, Clone)]
pub struct NewSong<'a> {
    pub title: &'a str,
    pub track_number: Option<u32>,
    pub disc_number: Option<u32>,
    pub album_id: i64,
    pub location: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongRow {
    pub id: i64,
    pub title: String,
    pub track_number: Option<u32>,
    pub disc_number: Option<u32>,
    pub rating: Option<i64>,
    pub album_id: Option<i64>,
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumRow {
    pub id: i64,
    pub title: String,
    pub album_art_location: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CatalogCounts {
    pub albums: i64,
    pub artists: i64,
    pub genres: i64,
    pub songs: i64,
}

fn map_song_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SongRow> {
    Ok(SongRow {
        id: row.get(0)?,
        title: row.get(1)?,
        track_number: row.get::<_, Option<i64>>(2)?.map(|v| v as u32),
        disc_number: row.get::<_, Option<i64>>(3)?.map(|v| v as u32),
        rating: row.get(4)?,
        album_id: row.get(5)?,
        location: row.get(6)?,
    })
}

impl CatalogDb {
    /// Open the catalog at `path`, creating missing tables.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = schema::open_connection(path)?;
        schema::init_schema(&conn, path)?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub(crate) fn open_in_memory() -> Self {
        let conn = Connection::open_in_memory().expect("open memory db");
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .expect("enable foreign keys");
        schema::init_schema(&conn, Path::new(":memory:")).expect("init schema");
        Self { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn transaction(&mut self) -> Result<Transaction<'_>> {
        self.conn
            .transaction()
            .map_err(CatalogError::query("begin catalog transaction"))
    }

    /// Every `Songs.location` currently stored.
    pub fn song_locations(&self) -> Result<HashSet<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT location FROM Songs")
            .map_err(CatalogError::query("prepare song locations"))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(CatalogError::query("select song locations"))?;
        rows.collect::<rusqlite::Result<HashSet<_>>>()
            .map_err(CatalogError::query("read song location"))
    }

    /// Delete the Song stored at `location`; join rows go with it via cascade.
    pub fn delete_song_by_location(&self, location: &str) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM Songs WHERE location = ?1", params![location])
            .map_err(CatalogError::query("delete song by location"))?;
        Ok(deleted > 0)
    }

    pub fn song_by_location(&self, location: &str) -> Result<Option<SongRow>> {
        self.conn
            .query_row(
                r#"
                SELECT id, title, track_number, disc_number, rating, album_id, location
                FROM Songs
                WHERE location = ?1
                "#,
                params![location],
                map_song_row,
            )
            .optional()
            .map_err(CatalogError::query("select song by location"))
    }

    pub fn list_albums(&self) -> Result<Vec<AlbumRow>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, title, album_art_location FROM Albums ORDER BY id")
            .map_err(CatalogError::query("prepare album list"))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(AlbumRow {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    album_art_location: row.get(2)?,
                })
            })
            .map_err(CatalogError::query("select albums"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(CatalogError::query("read album row"))
    }

    pub fn counts(&self) -> Result<CatalogCounts> {
        self.conn
            .query_row(
                r#"
                SELECT (SELECT COUNT(*) FROM Albums),
                       (SELECT COUNT(*) FROM Artists),
                       (SELECT COUNT(*) FROM Genres),
                       (SELECT COUNT(*) FROM Songs)
                "#,
                [],
                |row| {
                    Ok(CatalogCounts {
                        albums: row.get(0)?,
                        artists: row.get(1)?,
                        genres: row.get(2)?,
                        songs: row.get(3)?,
                    })
                },
            )
            .map_err(CatalogError::query("count catalog rows"))
    }
}

/// Insert a new Song row and return its id.
pub fn insert_song(conn: &Connection, song: &NewSong<'_>) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO Songs (title, track_number, disc_number, album_id, location)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
        params![
            song.title,
            song.track_number,
            song.disc_number,
            song.album_id,
            song.location
        ],
    )
    .map_err(CatalogError::query("insert song"))?;
    Ok(conn.last_insert_rowid())
}
