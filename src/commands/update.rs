use crate::error::{ErrorKind, Result};
use cmpack_config::Config;
use cmpack_index::IndexStore;
use cmpack_storage::ArchiveStore;
use cmpack_update::{Failure, Updater};
use exn::ResultExt;
use std::path::Path;

fn updater(config: &Config) -> Result<Updater> {
    Updater::from_config(config).or_raise(|| ErrorKind::Config)
}

fn print_failures<'a>(failures: impl IntoIterator<Item = &'a Failure>) {
    for failure in failures {
        match &failure.pack {
            Some(pack) => eprintln!("  {} {pack} ({}): {}", failure.stage, failure.url, &*failure.error),
            None => eprintln!("  {} {}: {}", failure.stage, failure.url, &*failure.error),
        }
    }
}

pub async fn update(config: &Config, descriptors_only: bool) -> Result<()> {
    let updater = updater(config)?;
    let refresh = updater.refresh_all().await.or_raise(|| ErrorKind::Update)?;
    println!(
        "Indexed {} devices and {} boards from {} packs",
        refresh.devices,
        refresh.aliases,
        refresh.packs.len()
    );
    if !refresh.failures.is_empty() {
        eprintln!("{} sources or packs failed:", refresh.failures.len());
        print_failures(&refresh.failures);
    }
    if descriptors_only {
        return Ok(());
    }

    let archives = updater.refresh_archives(&refresh.packs).await;
    println!(
        "Downloaded {} pack archives ({} already present)",
        archives.downloaded.len(),
        archives.skipped.len()
    );
    if !archives.failures.is_empty() {
        eprintln!("{} archives failed:", archives.failures.len());
        print_failures(&archives.failures);
    }
    Ok(())
}

pub async fn add(config: &Config, path: &Path) -> Result<()> {
    let pack = updater(config)?
        .add_from_local_path(path)
        .await
        .or_raise(|| ErrorKind::Update)?;
    println!("Added {pack}");
    Ok(())
}

/// Clear both stores without building an updater, so a broken source
/// configuration cannot block cleaning up.
pub async fn clean(config: &Config) -> Result<()> {
    let index = IndexStore::open(&config.index_dir)
        .clear()
        .await
        .or_raise(|| ErrorKind::Clean);
    let store = match ArchiveStore::open(&config.data_dir) {
        Ok(store) => store.clear().await.or_raise(|| ErrorKind::Clean),
        Err(err) => Err(err).or_raise(|| ErrorKind::Config),
    };
    index.and(store)?;
    println!("Removed {} and {}", config.index_dir.display(), config.data_dir.display());
    Ok(())
}
