//! `catalog-scanner` keeps a SQLite music catalog in sync with media folders.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use catalog_scanner::{schema, CatalogDb, CatalogSynchronizer, SyncConfig};

use crate::cli::{Command, ConfigSource};

fn main() -> Result<()> {
    let args = cli::Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,catalog_scanner=info")
        }))
        .init();

    match args.cmd {
        Command::Sync(source) => {
            let cfg = load_config(&source)?;
            tracing::info!(
                roots = cfg.search_paths.len(),
                database = %cfg.database_location.display(),
                art_dir = %cfg.album_art_directory.display(),
                workers = cfg.extract_workers,
                "starting catalog sync"
            );
            let mut synchronizer = CatalogSynchronizer::open(&cfg).context("open catalog")?;
            let report = synchronizer.run().context("catalog sync")?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::CreateDb { path } => {
            schema::create_database(&path)
                .with_context(|| format!("create catalog {:?}", path))?;
        }
        Command::PruneArt(source) => {
            let cfg = load_config(&source)?;
            let synchronizer = CatalogSynchronizer::open(&cfg).context("open catalog")?;
            let removed = synchronizer.sweep_album_art()?;
            for path in removed {
                println!("{}", path.display());
            }
        }
        Command::Stats { database } => {
            let db = CatalogDb::open(&database)
                .with_context(|| format!("open catalog {:?}", database))?;
            let counts = db.counts()?;
            println!("{}", serde_json::to_string_pretty(&counts)?);
        }
    }
    Ok(())
}

fn load_config(source: &ConfigSource) -> Result<SyncConfig> {
    let cfg = match (&source.config, &source.payload) {
        (Some(path), _) => SyncConfig::load(path)?,
        (None, Some(payload)) => SyncConfig::from_json(payload)?,
        (None, None) => return Err(anyhow::anyhow!("use --config or --payload")),
    };
    Ok(cfg)
}
