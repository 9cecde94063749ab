//! Get-or-create identity resolution for artists, genres and albums.
//!
//! Artists and genres are keyed by exact (case-sensitive) name. An album is
//! keyed by its title together with the exact set of artists linked to it.

use std::collections::BTreeSet;

use rusqlite::{params, Connection, OptionalExtension, ToSql};

use crate::error::{CatalogError, EntityKind, Result};
use crate::relations::{link, Relation};

/// Entities resolved purely by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedEntity {
    Artist,
    Genre,
}

impl NamedEntity {
    fn kind(self) -> EntityKind {
        match self {
            NamedEntity::Artist => EntityKind::Artist,
            NamedEntity::Genre => EntityKind::Genre,
        }
    }

    fn select_sql(self) -> &'static str {
        match self {
            NamedEntity::Artist => "SELECT id FROM Artists WHERE name = ?1",
            NamedEntity::Genre => "SELECT id FROM Genres WHERE name = ?1",
        }
    }

    fn insert_sql(self) -> &'static str {
        match self {
            NamedEntity::Artist => "INSERT INTO Artists (name) VALUES (?1)",
            NamedEntity::Genre => "INSERT INTO Genres (name) VALUES (?1)",
        }
    }
}

/// Return the id of the artist/genre called `name`, creating it when absent.
pub fn resolve_or_create(conn: &Connection, entity: NamedEntity, name: &str) -> Result<i64> {
    let existing = conn
        .query_row(entity.select_sql(), params![name], |row| row.get(0))
        .optional()
        .map_err(CatalogError::query("find entity by name"))
        .map_err(CatalogError::resolution(entity.kind(), name))?;
    if let Some(id) = existing {
        return Ok(id);
    }

    conn.execute(entity.insert_sql(), params![name])
        .map_err(CatalogError::query("insert entity"))
        .map_err(CatalogError::resolution(entity.kind(), name))?;
    let id = conn.last_insert_rowid();
    tracing::debug!(kind = %entity.kind(), name, id, "entity created");
    Ok(id)
}

/// Resolve every name in `names`, returning the distinct ids.
///
/// Stops at the first failure; ids created before it stay in the enclosing
/// transaction and are discarded with it.
pub fn resolve_all<'a, I>(conn: &Connection, entity: NamedEntity, names: I) -> Result<BTreeSet<i64>>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut ids = BTreeSet::new();
    for name in names {
        ids.insert(resolve_or_create(conn, entity, name)?);
    }
    Ok(ids)
}

/// Find the album titled `title` whose linked artists are exactly `artist_ids`.
pub fn find_album(conn: &Connection, title: &str, artist_ids: &BTreeSet<i64>) -> Result<Option<i64>> {
    let wanted = artist_ids.len() as i64;
    let mut sql = String::from(
        r#"
        SELECT al.id
        FROM Albums al
        WHERE al.title = ?
          AND (SELECT COUNT(*) FROM AlbumArtists aa WHERE aa.album_id = al.id) = ?
        "#,
    );
    let mut values: Vec<&dyn ToSql> = vec![&title, &wanted];
    if !artist_ids.is_empty() {
        let placeholders = vec!["?"; artist_ids.len()].join(", ");
        sql.push_str(&format!(
            "  AND (SELECT COUNT(*) FROM AlbumArtists aa WHERE aa.album_id = al.id AND aa.artist_id IN ({placeholders})) = ?\n"
        ));
        values.extend(artist_ids.iter().map(|id| id as &dyn ToSql));
        values.push(&wanted);
    }
    // Several matches would need duplicate albums; take the oldest.
    sql.push_str("ORDER BY al.id LIMIT 1");

    conn.query_row(&sql, values.as_slice(), |row| row.get(0))
        .optional()
        .map_err(CatalogError::query("find album by title and artists"))
}

/// Return the album identified by `(title, artist_ids)`, creating the album and
/// its AlbumArtists links when no exact match exists.
pub fn resolve_or_create_album(
    conn: &Connection,
    title: &str,
    artist_ids: &BTreeSet<i64>,
) -> Result<i64> {
    let existing = find_album(conn, title, artist_ids)
        .map_err(CatalogError::resolution(EntityKind::Album, title))?;
    if let Some(id) = existing {
        return Ok(id);
    }

    conn.execute("INSERT INTO Albums (title) VALUES (?1)", params![title])
        .map_err(CatalogError::query("insert album"))
        .map_err(CatalogError::resolution(EntityKind::Album, title))?;
    let album_id = conn.last_insert_rowid();
    for artist_id in artist_ids {
        link(conn, Relation::AlbumArtist, album_id, *artist_id)
            .map_err(CatalogError::resolution(EntityKind::Album, title))?;
    }
    tracing::debug!(title, album_id, artists = artist_ids.len(), "album created");
    Ok(album_id)
}
