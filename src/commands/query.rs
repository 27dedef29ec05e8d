use super::print_json;
use crate::error::{ErrorKind, Result};
use cmpack_config::Config;
use cmpack_index::IndexStore;
use cmpack_query::{Catalog, FlashAlgorithm};
use cmpack_storage::ArchiveStore;
use exn::{OptionExt, ResultExt};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

fn catalog(config: &Config) -> Result<Catalog> {
    let store = ArchiveStore::open(&config.data_dir).or_raise(|| ErrorKind::Config)?;
    let index = IndexStore::open(&config.index_dir);
    Ok(Catalog::new(Arc::new(store), Arc::new(index)))
}

pub async fn device(config: &Config, name: &str) -> Result<()> {
    let device = catalog(config)?.device(name).await.or_raise(|| ErrorKind::Query)?;
    print_json(&device)
}

pub async fn alias(config: &Config, board: &str) -> Result<()> {
    let devices = catalog(config)?.resolve_alias(board).await.or_raise(|| ErrorKind::Query)?;
    print_json(&devices)
}

pub async fn flash_algo(config: &Config, device: &str, all: bool, output: Option<&Path>) -> Result<()> {
    let catalog = catalog(config)?;
    let algorithms = if all {
        catalog.flash_algorithms(device).await.or_raise(|| ErrorKind::Query)?
    } else {
        vec![catalog.flash_algorithm(device).await.or_raise(|| ErrorKind::Query)?]
    };

    let Some(dir) = output else {
        let refs: Vec<_> = algorithms.iter().map(FlashAlgorithm::algorithm).collect();
        return print_json(&refs);
    };
    let mut written = HashSet::new();
    for algorithm in &algorithms {
        let entry = algorithm.entry_name();
        let path = output_path(dir, entry).ok_or_raise(|| ErrorKind::Output(dir.join(entry)))?;
        // The same archive member can be listed at several hierarchy levels.
        if !written.insert(path.clone()) {
            continue;
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .or_raise(|| ErrorKind::Output(parent.to_path_buf()))?;
        }
        tokio::fs::write(&path, algorithm.bytes())
            .await
            .or_raise(|| ErrorKind::Output(path.clone()))?;
        println!("{}", path.display());
    }
    Ok(())
}

/// Where an extracted archive member lands under `dir`. The member keeps its
/// directories so algorithms sharing a file name do not overwrite each other.
/// `None` for members that would land outside `dir`.
fn output_path(dir: &Path, entry: &str) -> Option<PathBuf> {
    let relative = Path::new(entry);
    let contained = relative.components().all(|component| matches!(component, Component::Normal(_)));
    (contained && relative.file_name().is_some()).then(|| dir.join(relative))
}

pub async fn check(config: &Config) -> Result<()> {
    let catalog = catalog(config)?;
    let index = catalog.index().await.or_raise(|| ErrorKind::Query)?;
    let missing = catalog.missing_archives().await.or_raise(|| ErrorKind::Query)?;
    let packs = index.packs().len();
    println!(
        "{} devices, {} boards, {packs} packs, {} archives missing",
        index.devices.len(),
        index.aliases.len(),
        missing.len()
    );
    if missing.is_empty() {
        return Ok(());
    }
    for pack in &missing {
        println!("  missing {pack}");
    }
    exn::bail!(ErrorKind::Unhealthy(format!(
        "{} of {packs} indexed packs have no archive; run `cmpack update`",
        missing.len()
    )));
}
