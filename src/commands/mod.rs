//! Subcommand definitions and handlers.
//!
//! - [`update`] refreshes the cache, imports local packs, and clears it.
//! - [`query`] answers device, board and flash algorithm lookups.

pub mod query;
pub mod update;

use crate::error::{ErrorKind, Result};
use clap::Subcommand;
use cmpack_config::Config;
use exn::ResultExt;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Download descriptors (and archives) from every configured source
    Update {
        /// Refresh the index only, skipping pack archive downloads
        #[arg(long)]
        descriptors_only: bool,
    },
    /// Remove the index and every downloaded pack
    Clean,
    /// Print a device record as JSON
    Device {
        name: String,
    },
    /// Print the devices mounted on a board as JSON
    Alias {
        board: String,
    },
    /// Extract a device's flash algorithm from its pack
    FlashAlgo {
        device: String,
        /// Extract every algorithm instead of only the first
        #[arg(long)]
        all: bool,
        /// Directory to write the algorithm files into
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Import a pack archive from the local filesystem
    Add {
        path: PathBuf,
    },
    /// Report indexed packs whose archives are missing
    Check,
}

impl Command {
    pub async fn run(self, config: &Config) -> Result<()> {
        match self {
            Self::Update { descriptors_only } => update::update(config, descriptors_only).await,
            Self::Clean => update::clean(config).await,
            Self::Add { path } => update::add(config, &path).await,
            Self::Device { name } => query::device(config, &name).await,
            Self::Alias { board } => query::alias(config, &board).await,
            Self::FlashAlgo { device, all, output } => query::flash_algo(config, &device, all, output.as_deref()).await,
            Self::Check => query::check(config).await,
        }
    }
}

pub(crate) fn print_json(value: &impl Serialize) -> Result<()> {
    let json = serde_json::to_string_pretty(value).or_raise(|| ErrorKind::Encode)?;
    println!("{json}");
    Ok(())
}
