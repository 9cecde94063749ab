//! Full reconciliation pass between the media roots and the catalog.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::album_art::{ensure_album_art, AlbumArtStore, ArtOutcome};
use crate::catalog_db::{insert_song, CatalogDb, NewSong};
use crate::config::SyncConfig;
use crate::error::{CatalogError, Result};
use crate::library::{is_supported_path, FileEnumerator, WalkDirEnumerator};
use crate::orphans;
use crate::relations::{link, Relation};
use crate::resolver::{resolve_all, resolve_or_create_album, NamedEntity};
use crate::schema;
use crate::tags::{LoftyExtractor, MetadataExtractor, TrackTags};

/// Counters for one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Songs in the catalog when the pass started.
    pub existing: usize,
    /// Distinct files found under the search paths.
    pub candidates: usize,
    /// Files already catalogued.
    pub unchanged: usize,
    pub added: usize,
    /// New files skipped for their extension.
    pub unsupported: usize,
    /// New media files that could not be catalogued.
    pub failed: usize,
    pub removed: usize,
    pub pruned_albums: usize,
    pub pruned_artists: usize,
    pub pruned_genres: usize,
    pub art_written: usize,
    pub art_swept: usize,
}

impl SyncReport {
    /// True when the pass changed nothing in the catalog.
    pub fn is_noop(&self) -> bool {
        self.added == 0
            && self.removed == 0
            && self.pruned_albums == 0
            && self.pruned_artists == 0
            && self.pruned_genres == 0
            && self.art_written == 0
            && self.art_swept == 0
    }
}

pub struct CatalogSynchronizer {
    db: CatalogDb,
    art: AlbumArtStore,
    extractor: Arc<dyn MetadataExtractor>,
    enumerator: Arc<dyn FileEnumerator>,
    search_paths: Vec<PathBuf>,
    prune_album_art: bool,
    extract_workers: usize,
}

impl CatalogSynchronizer {
    /// Open the catalog and art directory named by `cfg` with the lofty/walkdir
    /// collaborators.
    pub fn open(cfg: &SyncConfig) -> Result<Self> {
        Self::with_collaborators(
            cfg,
            Arc::new(LoftyExtractor),
            Arc::new(WalkDirEnumerator::default()),
        )
    }

    pub fn with_collaborators(
        cfg: &SyncConfig,
        extractor: Arc<dyn MetadataExtractor>,
        enumerator: Arc<dyn FileEnumerator>,
    ) -> Result<Self> {
        let db = CatalogDb::open(&cfg.database_location)?;
        let art = AlbumArtStore::prepare(&cfg.album_art_directory)?;
        Ok(Self {
            db,
            art,
            extractor,
            enumerator,
            search_paths: cfg.search_paths.clone(),
            prune_album_art: cfg.prune_album_art,
            extract_workers: cfg.extract_workers.max(1),
        })
    }

    pub fn catalog(&self) -> &CatalogDb {
        &self.db
    }

    /// Bring the catalog in line with the files under the search paths.
    ///
    /// Only a failure to read the current catalog contents aborts the pass;
    /// everything else is logged and counted.
    pub fn run(&mut self) -> Result<SyncReport> {
        let mut report = SyncReport::default();

        let mut existing = self.db.song_locations()?;
        report.existing = existing.len();

        let mut candidates = collect_candidates(self.enumerator.as_ref(), &self.search_paths);
        report.candidates = candidates.len();
        candidates.retain(|location| !existing.remove(location));
        report.unchanged = report.candidates - candidates.len();
        tracing::info!(
            existing = report.existing,
            candidates = report.candidates,
            unchanged = report.unchanged,
            "catalog diff computed"
        );

        let mut media = Vec::with_capacity(candidates.len());
        for location in candidates {
            if is_supported_path(Path::new(&location)) {
                media.push(location);
            } else {
                tracing::debug!(path = %location, "unsupported extension");
                report.unsupported += 1;
            }
        }

        let db = &mut self.db;
        let art = &self.art;
        let extractor = self.extractor.as_ref();
        for_each_extracted(extractor, media, self.extract_workers, |location, tags| {
            let tags = match tags {
                Ok(tags) => tags.normalized(),
                Err(err) => {
                    tracing::warn!(path = %location, error = %err, "metadata extraction failed");
                    report.failed += 1;
                    return;
                }
            };
            match ingest(db, art, extractor, &location, &tags) {
                Ok(outcome) => {
                    report.added += 1;
                    if matches!(outcome, ArtOutcome::Written(_)) {
                        report.art_written += 1;
                    }
                }
                Err(err) => {
                    tracing::warn!(path = %location, error = %err, "song not catalogued");
                    report.failed += 1;
                }
            }
        });

        let mut gone: Vec<String> = existing.into_iter().collect();
        gone.sort();
        for location in gone {
            match self.db.delete_song_by_location(&location) {
                Ok(true) => {
                    tracing::debug!(path = %location, "song removed");
                    report.removed += 1;
                }
                Ok(false) => {}
                Err(err) => tracing::warn!(path = %location, error = %err, "song removal failed"),
            }
        }

        let pruned = orphans::prune_all(self.db.connection());
        report.pruned_albums = pruned.albums;
        report.pruned_artists = pruned.artists;
        report.pruned_genres = pruned.genres;

        if self.prune_album_art {
            match self.sweep_album_art() {
                Ok(removed) => report.art_swept = removed.len(),
                Err(err) => tracing::warn!(error = %err, "album art sweep failed"),
            }
        }

        tracing::info!(
            added = report.added,
            unsupported = report.unsupported,
            failed = report.failed,
            removed = report.removed,
            pruned_albums = report.pruned_albums,
            pruned_artists = report.pruned_artists,
            pruned_genres = report.pruned_genres,
            art_written = report.art_written,
            art_swept = report.art_swept,
            "catalog sync complete"
        );
        Ok(report)
    }

    /// Delete art files no album references.
    pub fn sweep_album_art(&self) -> Result<Vec<PathBuf>> {
        let removed = orphans::prune_album_art(self.db.connection(), self.art.dir())?;
        tracing::info!(dir = %self.art.dir().display(), removed = removed.len(), "album art swept");
        Ok(removed)
    }
}

/// Catalogue one new file inside its own transaction.
fn ingest(
    db: &mut CatalogDb,
    art: &AlbumArtStore,
    extractor: &dyn MetadataExtractor,
    location: &str,
    tags: &TrackTags,
) -> Result<ArtOutcome> {
    let tx = db.transaction()?;

    let album_artists = resolve_all(
        &tx,
        NamedEntity::Artist,
        tags.album_artists.iter().map(String::as_str),
    )?;
    let contributors = resolve_all(
        &tx,
        NamedEntity::Artist,
        tags.contributing_artists.iter().map(String::as_str),
    )?;
    let genres = resolve_all(&tx, NamedEntity::Genre, tags.genres.iter().map(String::as_str))?;
    let album_id = resolve_or_create_album(&tx, &tags.album, &album_artists)?;

    let song_id = insert_song(
        &tx,
        &NewSong {
            title: &tags.title,
            track_number: tags.track_number,
            disc_number: tags.disc_number,
            album_id,
            location,
        },
    )?;
    for artist_id in &contributors {
        link(&tx, Relation::ContributingArtist, song_id, *artist_id)?;
    }
    for genre_id in &genres {
        link(&tx, Relation::SongGenre, song_id, *genre_id)?;
    }

    let outcome = ensure_album_art(&tx, art, extractor, album_id, Path::new(location));
    if let Err(source) = tx.commit() {
        if let ArtOutcome::Written(file_name) = &outcome {
            art.discard(file_name);
        }
        return Err(CatalogError::Query {
            context: "commit song",
            source,
        });
    }
    tracing::debug!(path = %location, song_id, album_id, "song catalogued");
    Ok(outcome)
}

/// Distinct, sorted text paths under every root.
fn collect_candidates(enumerator: &dyn FileEnumerator, roots: &[PathBuf]) -> BTreeSet<String> {
    let mut candidates = BTreeSet::new();
    for root in roots {
        for path in enumerator.enumerate_files(root) {
            match path.into_os_string().into_string() {
                Ok(location) => {
                    candidates.insert(location);
                }
                Err(raw) => tracing::warn!(path = ?raw, "non-UTF-8 path skipped"),
            }
        }
    }
    candidates
}

/// Run metadata extraction for `paths` and hand every result to `handle` on
/// the calling thread. With more than one worker, results arrive in
/// completion order.
fn for_each_extracted<F>(
    extractor: &dyn MetadataExtractor,
    paths: Vec<String>,
    workers: usize,
    mut handle: F,
) where
    F: FnMut(String, Result<TrackTags>),
{
    if workers <= 1 || paths.len() <= 1 {
        for location in paths {
            let tags = extractor.extract_metadata(Path::new(&location));
            handle(location, tags);
        }
        return;
    }

    let workers = workers.min(paths.len());
    let (job_tx, job_rx) = crossbeam_channel::unbounded::<String>();
    let (done_tx, done_rx) = crossbeam_channel::unbounded::<(String, Result<TrackTags>)>();
    for location in paths {
        let _ = job_tx.send(location);
    }
    drop(job_tx);

    std::thread::scope(|scope| {
        for _ in 0..workers {
            let job_rx = job_rx.clone();
            let done_tx = done_tx.clone();
            scope.spawn(move || {
                while let Ok(location) = job_rx.recv() {
                    let tags = extractor.extract_metadata(Path::new(&location));
                    if done_tx.send((location, tags)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(done_tx);
        for (location, tags) in done_rx.iter() {
            handle(location, tags);
        }
    });
}

/// Run one pass with the production collaborators.
pub fn sync_catalog(cfg: &SyncConfig) -> Result<SyncReport> {
    CatalogSynchronizer::open(cfg)?.run()
}

/// Entry operation: parse the JSON payload and run one pass.
/// Returns 0 on success or a negative status.
pub fn update(payload: &str) -> i32 {
    match SyncConfig::from_json(payload).and_then(|cfg| sync_catalog(&cfg)) {
        Ok(_) => 0,
        Err(err) if err.is_fatal() => {
            tracing::error!(error = %err, "catalog update could not start");
            err.status_code()
        }
        Err(err) => {
            tracing::error!(error = %err, "catalog update aborted");
            err.status_code()
        }
    }
}

/// Entry operation: reset the catalog at `path`. Returns 0 or a negative status.
pub fn create_database_status(path: &Path) -> i32 {
    match schema::create_database(path) {
        Ok(()) => 0,
        Err(err) => {
            tracing::error!(path = %path.display(), error = %err, "catalog creation failed");
            err.status_code()
        }
    }
}
