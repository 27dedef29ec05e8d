//! Local filesystem pack store.
//!
//! Downloaded descriptors and pack archives live under one root directory,
//! addressed by [`PackRef`]:
//!
//! ```text
//! <root>/<vendor>.<pack>.pdsc              (one descriptor per vendor/pack)
//! <root>/<vendor>/<pack>/<version>.pack    (one archive per version)
//! ```

use crate::error::{ErrorKind, Result};
use crate::path::{join_components, validate_component};
use async_stream::stream;
use cmpack_archive::PackArchive;
use cmpack_pdsc::models::PackRef;
use exn::ResultExt;
use futures::Stream;
use std::fs::create_dir_all as sync_create_dir;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::fs;

pub type BoxSyncRead = Box<dyn Read + Send + 'static>;
pub type PackRefStream<'a> = Pin<Box<dyn Stream<Item = Result<PackRef>> + Send + 'a>>;

const ARCHIVE_EXTENSION: &str = "pack";
const DESCRIPTOR_EXTENSION: &str = "pdsc";

/// The two kinds of file kept per pack.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FileKind {
    /// Raw descriptor document, tracked per `(vendor, pack)` regardless of version.
    Descriptor,
    /// Compressed pack archive, tracked per `(vendor, pack, version)`.
    Archive,
}

/// On-disk store of pack descriptors and archives.
///
/// All paths are derived from a [`PackRef`]; every component of the
/// reference is validated so that nothing can be written outside the root.
/// Writes for distinct references never touch the same file, so concurrent
/// downloads need no further coordination.
///
/// # Examples
///
/// ```no_run
/// use cmpack_pdsc::models::PackRef;
/// use cmpack_storage::{ArchiveStore, FileKind};
///
/// # async fn example() -> cmpack_storage::error::Result<()> {
/// let store = ArchiveStore::new("/home/me/.local/share/cmsis-pack-manager")?;
/// let pack = PackRef::new("Keil", "LPC1700_DFP", "2.4.0");
/// store.put(&pack, FileKind::Descriptor, b"<package/>").await?;
/// assert!(store.exists(&pack, FileKind::Descriptor).await?);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct ArchiveStore {
    root: PathBuf,
}

impl ArchiveStore {
    /// Create a store rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidPath`](ErrorKind::InvalidPath) if the path is not
    /// absolute or exists but is not a directory.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let store = Self::open(root)?;
        if !store.root.exists() {
            // Only happens once per process; not worth an async constructor.
            sync_create_dir(&store.root).map_err(|e| Self::map_io_error(e, &store.root))?;
        }
        Ok(store)
    }

    /// Open a store rooted at `root` without touching the filesystem.
    ///
    /// A missing root reads as an empty store; it is only created by the
    /// first [`put`](Self::put).
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() || (root.exists() && !root.is_dir()) {
            exn::bail!(ErrorKind::InvalidPath(root));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a pack file relative to the store root.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::path::Path;
    /// use cmpack_pdsc::models::PackRef;
    /// use cmpack_storage::{ArchiveStore, FileKind};
    ///
    /// let pack = PackRef::new("Keil", "LPC1700_DFP", "2.4.0");
    /// assert_eq!(
    ///     ArchiveStore::relative_path(&pack, FileKind::Archive).unwrap(),
    ///     Path::new("Keil/LPC1700_DFP/2.4.0.pack"),
    /// );
    /// assert_eq!(
    ///     ArchiveStore::relative_path(&pack, FileKind::Descriptor).unwrap(),
    ///     Path::new("Keil.LPC1700_DFP.pdsc"),
    /// );
    /// ```
    pub fn relative_path(pack: &PackRef, kind: FileKind) -> Result<PathBuf> {
        match kind {
            FileKind::Descriptor => {
                validate_component(&pack.vendor)?;
                validate_component(&pack.pack)?;
                let name = format!("{}.{}.{DESCRIPTOR_EXTENSION}", pack.vendor, pack.pack);
                join_components([name.as_str()])
            },
            FileKind::Archive => {
                validate_component(&pack.version)?;
                let name = format!("{}.{ARCHIVE_EXTENSION}", pack.version);
                join_components([pack.vendor.as_str(), pack.pack.as_str(), name.as_str()])
            },
        }
    }

    /// Absolute path of a pack file.
    pub fn path_of(&self, pack: &PackRef, kind: FileKind) -> Result<PathBuf> {
        Ok(self.root.join(Self::relative_path(pack, kind)?))
    }

    fn map_io_error(e: std::io::Error, path: &Path) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.to_path_buf()),
            _ => ErrorKind::Io(e),
        }
    }

    /// Write a pack file to its canonical path, replacing any previous file.
    ///
    /// Data is written to a sibling `.part` file and renamed into place, so
    /// a reader opening the same path sees either the old or the new file.
    /// Parent directories are created as needed.
    pub async fn put(&self, pack: &PackRef, kind: FileKind, data: &[u8]) -> Result<PathBuf> {
        let path = self.path_of(pack, kind)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| Self::map_io_error(e, parent))?;
        }
        let mut partial = path.clone().into_os_string();
        partial.push(".part");
        let partial = PathBuf::from(partial);
        fs::write(&partial, data).await.map_err(|e| Self::map_io_error(e, &partial))?;
        fs::rename(&partial, &path).await.map_err(|e| Self::map_io_error(e, &path))?;
        tracing::debug!(pack = %pack, ?kind, bytes = data.len(), path = %path.display(), "Stored pack file");
        Ok(path)
    }

    pub async fn exists(&self, pack: &PackRef, kind: FileKind) -> Result<bool> {
        let path = self.path_of(pack, kind)?;
        Ok(fs::try_exists(&path).await.map_err(ErrorKind::Io)?)
    }

    /// Read a stored descriptor document.
    ///
    /// Returns [`NotFound`](ErrorKind::NotFound) if it was never stored.
    pub async fn read_descriptor(&self, pack: &PackRef) -> Result<Vec<u8>> {
        let path = self.path_of(pack, FileKind::Descriptor)?;
        Ok(fs::read(&path).await.map_err(|e| Self::map_io_error(e, &path))?)
    }

    /// Open a stored descriptor document for streaming reads.
    ///
    /// The returned reader is blocking and `'static`, suitable for moving
    /// into [`spawn_blocking`](tokio::task::spawn_blocking).
    pub async fn open_descriptor(&self, pack: &PackRef) -> Result<BoxSyncRead> {
        let path = self.path_of(pack, FileKind::Descriptor)?;
        let file = fs::File::open(&path).await.map_err(|e| Self::map_io_error(e, &path))?;
        Ok(Box::new(file.into_std().await))
    }

    /// Open a stored pack archive for random-access reads.
    ///
    /// Returns [`NotFound`](ErrorKind::NotFound) if the archive is absent,
    /// or [`Archive`](ErrorKind::Archive) if it exists but is not a zip.
    pub async fn open_archive(&self, pack: &PackRef) -> Result<PackArchive> {
        let path = self.path_of(pack, FileKind::Archive)?;
        if !fs::try_exists(&path).await.map_err(ErrorKind::Io)? {
            exn::bail!(ErrorKind::NotFound(path));
        }
        let archive_path = path.clone();
        tokio::task::spawn_blocking(move || PackArchive::open(&archive_path))
            .await
            .or_raise(|| ErrorKind::Task)?
            .or_raise(|| ErrorKind::Archive(path))
    }

    /// Remove the entire store, root directory included.
    ///
    /// A store that was never written to is not an error.
    pub async fn clear(&self) -> Result<()> {
        match fs::remove_dir_all(&self.root).await {
            Ok(()) => {
                tracing::info!(root = %self.root.display(), "Cleared pack store");
                Ok(())
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::map_io_error(e, &self.root).into()),
        }
    }

    /// Stream every pack archive currently present in the store.
    ///
    /// Only files matching the `<vendor>/<pack>/<version>.pack` layout are
    /// reported; stray files and in-flight `.part` files are ignored.
    pub fn list_archives(&self) -> PackRefStream<'_> {
        Box::pin(stream! {
            let vendor_dirs = match Self::subdirectories(&self.root).await {
                Ok(dirs) => dirs,
                Err(e) => { yield Err(e); return; },
            };
            for vendor_dir in vendor_dirs {
                let pack_dirs = match Self::subdirectories(&vendor_dir).await {
                    Ok(dirs) => dirs,
                    Err(e) => { yield Err(e); continue; },
                };
                for pack_dir in pack_dirs {
                    let mut entries = match fs::read_dir(&pack_dir).await {
                        Ok(entries) => entries,
                        Err(e) => { yield Err(Self::map_io_error(e, &pack_dir).into()); continue; },
                    };
                    loop {
                        match entries.next_entry().await {
                            Ok(Some(entry)) => {
                                if let Some(pack) = Self::pack_ref_from_path(&entry.path()) {
                                    yield Ok(pack);
                                }
                            },
                            Ok(None) => break,
                            Err(e) => { yield Err(Self::map_io_error(e, &pack_dir).into()); break; },
                        }
                    }
                }
            }
        })
    }

    /// Sorted list of the directories directly under `dir`. A missing `dir`
    /// yields an empty list, matching an empty store.
    async fn subdirectories(dir: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => exn::bail!(Self::map_io_error(e, dir)),
        };
        let mut dirs = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| Self::map_io_error(e, dir))? {
            let file_type = entry.file_type().await.map_err(|e| Self::map_io_error(e, dir))?;
            if file_type.is_dir() {
                dirs.push(entry.path());
            }
        }
        dirs.sort();
        Ok(dirs)
    }

    fn pack_ref_from_path(path: &Path) -> Option<PackRef> {
        if path.extension()? != ARCHIVE_EXTENSION {
            return None;
        }
        let version = path.file_stem()?.to_str()?;
        let pack_dir = path.parent()?;
        let pack = pack_dir.file_name()?.to_str()?;
        let vendor = pack_dir.parent()?.file_name()?.to_str()?;
        Some(PackRef::new(vendor, pack, version))
    }
}
