//! Many-to-many link rows between songs, albums, artists and genres.

use rusqlite::{params, Connection};

use crate::error::{CatalogError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// (album_id, artist_id) in AlbumArtists.
    AlbumArtist,
    /// (song_id, artist_id) in ContributingArtists.
    ContributingArtist,
    /// (song_id, genre_id) in SongGenreMap.
    SongGenre,
}

impl Relation {
    fn insert_sql(self) -> &'static str {
        match self {
            Relation::AlbumArtist => "INSERT INTO AlbumArtists (album_id, artist_id) VALUES (?1, ?2)",
            Relation::ContributingArtist => {
                "INSERT INTO ContributingArtists (song_id, artist_id) VALUES (?1, ?2)"
            }
            Relation::SongGenre => "INSERT INTO SongGenreMap (song_id, genre_id) VALUES (?1, ?2)",
        }
    }

    fn context(self) -> &'static str {
        match self {
            Relation::AlbumArtist => "link album artist",
            Relation::ContributingArtist => "link contributing artist",
            Relation::SongGenre => "link song genre",
        }
    }
}

/// Insert one link row. Linking the same pair twice is a constraint violation.
pub fn link(conn: &Connection, relation: Relation, left: i64, right: i64) -> Result<()> {
    conn.execute(relation.insert_sql(), params![left, right])
        .map_err(CatalogError::query(relation.context()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog_db::{insert_song, CatalogDb, NewSong};

    fn seed(conn: &Connection) -> (i64, i64, i64, i64) {
        conn.execute("INSERT INTO Albums (title) VALUES ('Album')", []).unwrap();
        let album = conn.last_insert_rowid();
        conn.execute("INSERT INTO Artists (name) VALUES ('Artist')", []).unwrap();
        let artist = conn.last_insert_rowid();
        conn.execute("INSERT INTO Genres (name) VALUES ('Rock')", []).unwrap();
        let genre = conn.last_insert_rowid();
        let song = insert_song(
            conn,
            &NewSong {
                title: "Song",
                track_number: Some(3),
                disc_number: Some(1),
                album_id: album,
                location: "/music/song.flac",
            },
        )
        .unwrap();
        (album, artist, genre, song)
    }

    #[test]
    fn link_inserts_each_relation() {
        let db = CatalogDb::open_in_memory();
        let conn = db.connection();
        let (album, artist, genre, song) = seed(conn);

        link(conn, Relation::AlbumArtist, album, artist).unwrap();
        link(conn, Relation::ContributingArtist, song, artist).unwrap();
        link(conn, Relation::SongGenre, song, genre).unwrap();

        let rows: i64 = conn
            .query_row(
                "SELECT (SELECT COUNT(*) FROM AlbumArtists) + (SELECT COUNT(*) FROM ContributingArtists) + (SELECT COUNT(*) FROM SongGenreMap)",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(rows, 3);
    }

    #[test]
    fn duplicate_link_is_a_constraint_violation() {
        let db = CatalogDb::open_in_memory();
        let conn = db.connection();
        let (_, artist, _, song) = seed(conn);

        link(conn, Relation::ContributingArtist, song, artist).unwrap();
        let err = link(conn, Relation::ContributingArtist, song, artist).unwrap_err();
        assert!(err.is_constraint_violation(), "{err}");
    }

    #[test]
    fn link_to_missing_row_fails() {
        let db = CatalogDb::open_in_memory();
        let conn = db.connection();
        let (_, _, genre, _) = seed(conn);
        assert!(link(conn, Relation::SongGenre, 999, genre).is_err());
    }
}
