use crate::documents::{DocumentStore, FsDocuments};
use crate::error::{ErrorKind, Result};
use crate::index::Index;
use cmpack_pdsc::models::{AliasRecord, DeviceRecord};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

/// Loads, merges and persists the device and alias index.
///
/// The loaded index is memoised: the first [`IndexStore::load`] reads the
/// documents, later calls are served from memory until [`IndexStore::merge`]
/// replaces the value or [`IndexStore::invalidate`] drops it. Readers see
/// either the index as of the last completed merge or nothing at all.
#[derive(Debug)]
pub struct IndexStore {
    documents: Arc<dyn DocumentStore>,
    memo: RwLock<Option<Arc<Index>>>,
    merge_lock: Mutex<()>,
}

impl IndexStore {
    /// Store index documents as files inside `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self::with_documents(FsDocuments::new(dir))
    }

    pub fn with_documents(documents: impl DocumentStore + 'static) -> Self {
        Self {
            documents: Arc::new(documents),
            memo: RwLock::new(None),
            merge_lock: Mutex::new(()),
        }
    }

    /// Return the current index, reading it from storage on first use.
    pub async fn load(&self) -> Result<Arc<Index>> {
        if let Some(index) = self.memo.read().await.as_ref() {
            return Ok(Arc::clone(index));
        }
        let mut memo = self.memo.write().await;
        if let Some(index) = memo.as_ref() {
            return Ok(Arc::clone(index));
        }
        let index = Arc::new(self.read_documents().await?);
        debug!(devices = index.devices.len(), aliases = index.aliases.len(), "Loaded pack index");
        *memo = Some(Arc::clone(&index));
        Ok(index)
    }

    async fn read_documents(&self) -> Result<Index> {
        let Some(documents) = self.documents.read().await? else {
            exn::bail!(ErrorKind::Uninitialized);
        };
        Index::decode(&documents)
    }

    /// Starting point for a merge over a corrupt index: every document that
    /// still decodes is kept, only the corrupt ones start from empty.
    async fn salvage(&self) -> Result<Index> {
        match self.documents.read().await {
            Ok(Some(documents)) => Ok(Index::salvage(&documents)),
            Ok(None) => Ok(Index::default()),
            Err(err) if matches!(&*err, ErrorKind::Corrupt(_)) => {
                warn!(error = ?err, "Index generation unreadable; rebuilding from empty");
                Ok(Index::default())
            },
            Err(err) => Err(err),
        }
    }

    /// Fold `devices` and `aliases` into the current index in the given order
    /// (last writer wins per name) and persist the result.
    ///
    /// The memoised index is only replaced once both documents have been
    /// persisted; if persisting fails the previous state is left untouched.
    #[instrument(skip_all, fields(devices = devices.len(), aliases = aliases.len()))]
    pub async fn merge(&self, devices: Vec<DeviceRecord>, aliases: Vec<AliasRecord>) -> Result<Arc<Index>> {
        let _guard = self.merge_lock.lock().await;
        let mut index = match self.load().await {
            Ok(current) => Index::clone(&current),
            Err(err) if matches!(&*err, ErrorKind::Uninitialized) => Index::default(),
            Err(err) if matches!(&*err, ErrorKind::Corrupt(_)) => {
                warn!(error = ?err, "Existing pack index is corrupt; salvaging what still decodes");
                self.salvage().await?
            },
            Err(err) => return Err(err),
        };
        index.fold(devices, aliases);

        let (devices, aliases) = index.encode()?;
        self.documents.replace(devices, aliases).await?;

        let index = Arc::new(index);
        *self.memo.write().await = Some(Arc::clone(&index));
        info!(devices = index.devices.len(), aliases = index.aliases.len(), "Persisted pack index");
        Ok(index)
    }

    pub async fn lookup_device(&self, name: &str) -> Result<DeviceRecord> {
        let index = self.load().await?;
        match index.device(name) {
            Some(device) => Ok(device.clone()),
            None => exn::bail!(ErrorKind::DeviceNotFound(name.to_string())),
        }
    }

    pub async fn lookup_alias(&self, name: &str) -> Result<AliasRecord> {
        let index = self.load().await?;
        match index.alias(name) {
            Some(alias) => Ok(alias.clone()),
            None => exn::bail!(ErrorKind::AliasNotFound(name.to_string())),
        }
    }

    /// Forget the memoised index; the next load reads storage again.
    pub async fn invalidate(&self) {
        *self.memo.write().await = None;
    }

    /// Remove the persisted documents and forget the memoised index.
    #[instrument(skip_all)]
    pub async fn clear(&self) -> Result<()> {
        let _guard = self.merge_lock.lock().await;
        let result = self.documents.remove_all().await;
        self.invalidate().await;
        result
    }
}
