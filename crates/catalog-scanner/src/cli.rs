use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_SHA"),
    ", ",
    env!("BUILD_DATE"),
    ")"
);

#[derive(Parser, Debug)]
#[command(name = "catalog-scanner", version = VERSION)]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one reconciliation pass between the search paths and the catalog
    Sync(ConfigSource),

    /// Discard any catalog at PATH and create an empty one
    CreateDb {
        /// Catalog SQLite file
        path: PathBuf,
    },

    /// Delete album art files no album references
    PruneArt(ConfigSource),

    /// Print row counts for a catalog
    Stats {
        /// Catalog SQLite file
        #[arg(long)]
        database: PathBuf,
    },
}

#[derive(ClapArgs, Debug)]
#[group(required = true, multiple = false)]
pub struct ConfigSource {
    /// Config file (TOML, or JSON when it ends in .json)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Inline JSON payload with search_paths, database_location and album_art_directory
    #[arg(long)]
    pub payload: Option<String>,
}
