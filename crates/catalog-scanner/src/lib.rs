//! Music catalog reconciliation.
//!
//! Keeps a SQLite catalog of albums, artists, genres and songs in step with
//! the media files under a set of search paths.

pub mod album_art;
pub mod catalog_db;
pub mod config;
pub mod error;
pub mod library;
pub mod orphans;
pub mod relations;
pub mod resolver;
pub mod schema;
pub mod sync;
pub mod tags;

pub use catalog_db::{CatalogCounts, CatalogDb};
pub use config::SyncConfig;
pub use error::{CatalogError, Result};
pub use library::{FileEnumerator, WalkDirEnumerator};
pub use sync::{create_database_status, sync_catalog, update, CatalogSynchronizer, SyncReport};
pub use tags::{LoftyExtractor, MetadataExtractor, TrackTags};
