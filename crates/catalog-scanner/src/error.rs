//! Error taxonomy for catalog operations.
//!
//! Fatal errors end the invocation; everything else is scoped to one file or
//! one cleanup step and is logged by the caller.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Entity kinds the resolver can fail on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Album,
    Artist,
    Genre,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Album => "album",
            EntityKind::Artist => "artist",
            EntityKind::Genre => "genre",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("open catalog {path:?}: {source}")]
    StoreOpen {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("catalog file {path:?}: {source}")]
    StoreFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("create catalog schema {path:?}: {source}")]
    Schema {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("catalog schema version {found} is not supported (expected {expected})")]
    UnsupportedSchema { found: String, expected: i32 },

    #[error("{context}: {source}")]
    Query {
        context: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("read tags {path:?}: {reason}")]
    Extraction { path: PathBuf, reason: String },

    #[error("resolve {kind} {name:?}: {source}")]
    EntityResolution {
        kind: EntityKind,
        name: String,
        #[source]
        source: Box<CatalogError>,
    },

    #[error("invalid config: {0}")]
    Config(String),

    #[error("prepare album art directory {path:?}: {source}")]
    ArtDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("write album art {path:?}: {source}")]
    ArtWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, CatalogError>;

impl CatalogError {
    /// Adapter for `map_err` on rusqlite calls.
    pub(crate) fn query(context: &'static str) -> impl FnOnce(rusqlite::Error) -> CatalogError {
        move |source| CatalogError::Query { context, source }
    }

    pub(crate) fn resolution(kind: EntityKind, name: &str) -> impl FnOnce(CatalogError) -> CatalogError {
        let name = name.to_string();
        move |source| CatalogError::EntityResolution {
            kind,
            name,
            source: Box::new(source),
        }
    }

    /// Whether this error ends the whole invocation rather than one unit of work.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CatalogError::StoreOpen { .. }
                | CatalogError::StoreFile { .. }
                | CatalogError::Schema { .. }
                | CatalogError::UnsupportedSchema { .. }
                | CatalogError::Config(_)
                | CatalogError::ArtDirectory { .. }
        )
    }

    /// Negative status reported by the entry operations.
    pub fn status_code(&self) -> i32 {
        match self {
            CatalogError::Config(_) => -2,
            CatalogError::ArtDirectory { .. } => -3,
            _ => -1,
        }
    }

    /// True when the underlying SQLite failure is a constraint violation
    /// (duplicate link row, duplicate song location, ...).
    pub fn is_constraint_violation(&self) -> bool {
        let source = match self {
            CatalogError::Query { source, .. } => source,
            CatalogError::EntityResolution { source, .. } => return source.is_constraint_violation(),
            _ => return false,
        };
        matches!(
            source,
            rusqlite::Error::SqliteFailure(err, _)
                if err.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}
