use crate::algorithm::FlashAlgorithm;
use crate::error::{ErrorKind, Result};
use cmpack_archive::PackArchive;
use cmpack_index::{Index, IndexStore};
use cmpack_pdsc::models::{AlgorithmRef, DeviceRecord, PackRef};
use cmpack_storage::error::ErrorKind as StorageErrorKind;
use cmpack_storage::{FileKind, StoreHandle};
use exn::{OptionExt, ResultExt};
use std::io::{Read, Seek};
use std::sync::Arc;
use tracing::instrument;

/// Read-only view over the index and the archive store.
///
/// Nothing in here touches the network; a cold cache surfaces as
/// [`Uninitialized`](ErrorKind::Uninitialized).
#[derive(Debug, Clone)]
pub struct Catalog {
    store: StoreHandle,
    index: Arc<IndexStore>,
}

fn lift<T>(result: cmpack_index::error::Result<T>) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(err) => {
            let kind = ErrorKind::from_index(&err);
            Err(err).or_raise(|| kind)
        },
    }
}

impl Catalog {
    pub fn new(store: StoreHandle, index: Arc<IndexStore>) -> Self {
        Self { store, index }
    }

    /// The whole merged index.
    pub async fn index(&self) -> Result<Arc<Index>> {
        lift(self.index.load().await)
    }

    #[instrument(skip(self))]
    pub async fn device(&self, name: &str) -> Result<DeviceRecord> {
        lift(self.index.lookup_device(name).await)
    }

    /// The first flash algorithm the device declares, read out of its pack.
    #[instrument(skip(self))]
    pub async fn flash_algorithm(&self, name: &str) -> Result<FlashAlgorithm> {
        let device = self.device(name).await?;
        let Some(first) = device.algorithms.first().cloned() else {
            exn::bail!(ErrorKind::NoAlgorithm(name.to_string()));
        };
        let mut extracted = self.extract(&device.from_pack, vec![first]).await?;
        extracted.pop().ok_or_raise(|| ErrorKind::NoAlgorithm(name.to_string()))
    }

    /// Every flash algorithm of the device, in declaration order.
    ///
    /// A device without algorithms yields an empty list.
    #[instrument(skip(self))]
    pub async fn flash_algorithms(&self, name: &str) -> Result<Vec<FlashAlgorithm>> {
        let device = self.device(name).await?;
        if device.algorithms.is_empty() {
            return Ok(Vec::new());
        }
        self.extract(&device.from_pack, device.algorithms).await
    }

    /// Devices mounted on a board, in the order the board lists them.
    #[instrument(skip(self))]
    pub async fn resolve_alias(&self, board: &str) -> Result<Vec<DeviceRecord>> {
        let index = self.index().await?;
        let alias = index.alias(board).ok_or_raise(|| ErrorKind::NotFound(board.to_string()))?;
        alias
            .mounted_devices
            .iter()
            .map(|name| index.device(name).cloned().ok_or_raise(|| ErrorKind::NotFound(name.clone())))
            .collect()
    }

    /// Name of the descriptor member inside an opened archive.
    pub fn find_descriptor_entry_name<R: Read + Seek>(archive: &mut PackArchive<R>) -> Option<String> {
        archive.find_descriptor()
    }

    /// Indexed packs whose archive has not been downloaded.
    pub async fn missing_archives(&self) -> Result<Vec<PackRef>> {
        let index = self.index().await?;
        let mut missing = Vec::new();
        for pack in index.packs() {
            let present = self
                .store
                .exists(pack, FileKind::Archive)
                .await
                .or_raise(|| ErrorKind::Storage)?;
            if !present {
                missing.push(pack.clone());
            }
        }
        Ok(missing)
    }

    async fn open_archive(&self, pack: &PackRef) -> Result<PackArchive> {
        match self.store.open_archive(pack).await {
            Ok(archive) => Ok(archive),
            Err(err) => {
                let kind = match &*err {
                    StorageErrorKind::NotFound(_) => ErrorKind::ArchiveMissing(pack.clone()),
                    StorageErrorKind::Archive(_) => ErrorKind::Archive(pack.clone()),
                    _ => ErrorKind::Storage,
                };
                Err(err).or_raise(|| kind)
            },
        }
    }

    async fn extract(&self, pack: &PackRef, algorithms: Vec<AlgorithmRef>) -> Result<Vec<FlashAlgorithm>> {
        let mut archive = self.open_archive(pack).await?;
        let pack = pack.clone();
        tokio::task::spawn_blocking(move || {
            algorithms
                .into_iter()
                .map(|algorithm| {
                    let Some(entry) = archive.resolve_entry(&algorithm.file_name) else {
                        exn::bail!(ErrorKind::NotFound(format!("{} in {pack}", algorithm.file_name)));
                    };
                    let data = archive.read_entry(&entry).or_raise(|| ErrorKind::Archive(pack.clone()))?;
                    tracing::debug!(%pack, entry, bytes = data.len(), "Extracted flash algorithm");
                    Ok(FlashAlgorithm::new(algorithm, entry, data))
                })
                .collect::<Result<Vec<_>>>()
        })
        .await
        .or_raise(|| ErrorKind::Task)?
    }
}
