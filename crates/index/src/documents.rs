//! Persistence of the index documents.
//!
//! Every write produces a fresh generation directory holding both documents.
//! The generation only becomes visible when the pointer file naming it is
//! swapped in with a single rename, so readers always see both documents of
//! one write:
//!
//! ```text
//! <dir>/index.current            (name of the live generation)
//! <dir>/.index-XXXXXX/index.json
//! <dir>/.index-XXXXXX/aliases.json
//! ```

use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use derive_more::Display;
use exn::ResultExt;
use std::ffi::OsStr;
use std::fs::File;
use std::io::{ErrorKind as IoErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

const POINTER: &str = "index.current";
const GENERATION_PREFIX: &str = ".index-";

/// The documents that together make up a persisted index.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Document {
    #[display("index.json")]
    Devices,
    #[display("aliases.json")]
    Aliases,
}
impl Document {
    pub fn file_name(self) -> &'static str {
        match self {
            Document::Devices => "index.json",
            Document::Aliases => "aliases.json",
        }
    }
}

/// Raw contents of one published generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Documents {
    pub devices: Vec<u8>,
    /// `None` when the generation has no aliases document.
    pub aliases: Option<Vec<u8>>,
}

/// Backing storage for index documents.
#[async_trait]
pub trait DocumentStore: Send + Sync + std::fmt::Debug {
    /// Both documents of the live generation, or `None` if nothing has been
    /// published.
    async fn read(&self) -> Result<Option<Documents>>;

    /// Publish both documents together. Either both replace the live
    /// generation or neither does.
    async fn replace(&self, devices: Vec<u8>, aliases: Vec<u8>) -> Result<()>;

    /// Remove every generation. A store never written to is not an error.
    async fn remove_all(&self) -> Result<()>;
}

/// Documents stored as generations inside one directory.
#[derive(Debug, Clone)]
pub struct FsDocuments {
    dir: PathBuf,
}
impl FsDocuments {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where `document` of the live generation lives, if one is published.
    pub async fn path_of(&self, document: Document) -> Result<Option<PathBuf>> {
        Ok(self.current().await?.map(|generation| generation.join(document.file_name())))
    }

    async fn current(&self) -> Result<Option<PathBuf>> {
        let name = match tokio::fs::read_to_string(self.dir.join(POINTER)).await {
            Ok(name) => name,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).or_raise(|| ErrorKind::Io),
        };
        let name = name.trim();
        if !is_generation_name(name) {
            exn::bail!(ErrorKind::Corrupt(Document::Devices));
        }
        Ok(Some(self.dir.join(name)))
    }
}

fn is_generation_name(name: &str) -> bool {
    name.len() > GENERATION_PREFIX.len()
        && name.starts_with(GENERATION_PREFIX)
        && !name.contains(['/', '\\'])
}

async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == IoErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).or_raise(|| ErrorKind::Io),
    }
}

fn write_synced(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

/// Stage a generation with `write`, then point the store at it.
///
/// The staged directory is removed again if anything fails before the
/// pointer is swapped. Returns the name of the new generation.
fn publish(
    dir: &Path,
    documents: [(Document, &[u8]); 2],
    mut write: impl FnMut(&Path, &[u8]) -> std::io::Result<()>,
) -> std::io::Result<String> {
    std::fs::create_dir_all(dir)?;
    let staging = tempfile::Builder::new().prefix(GENERATION_PREFIX).tempdir_in(dir)?;
    for (document, contents) in documents {
        write(&staging.path().join(document.file_name()), contents)?;
    }
    let name = staging
        .path()
        .file_name()
        .and_then(OsStr::to_str)
        .map(str::to_string)
        .ok_or_else(|| std::io::Error::other("generation name is not UTF-8"))?;

    let mut pointer = NamedTempFile::new_in(dir)?;
    pointer.write_all(name.as_bytes())?;
    pointer.as_file().sync_all()?;
    pointer.persist(dir.join(POINTER)).map_err(|e| e.error)?;
    let _ = staging.keep();
    Ok(name)
}

/// Remove every generation directory except those named in `keep`.
fn prune(dir: &Path, keep: &[&str]) -> std::io::Result<()> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if is_generation_name(name) && !keep.contains(&name) && entry.file_type()?.is_dir() {
            std::fs::remove_dir_all(entry.path())?;
        }
    }
    Ok(())
}

#[async_trait]
impl DocumentStore for FsDocuments {
    async fn read(&self) -> Result<Option<Documents>> {
        let Some(generation) = self.current().await? else {
            return Ok(None);
        };
        // A published generation always has a devices document.
        let Some(devices) = read_optional(&generation.join(Document::Devices.file_name())).await? else {
            exn::bail!(ErrorKind::Corrupt(Document::Devices));
        };
        let aliases = read_optional(&generation.join(Document::Aliases.file_name())).await?;
        Ok(Some(Documents { devices, aliases }))
    }

    async fn replace(&self, devices: Vec<u8>, aliases: Vec<u8>) -> Result<()> {
        let dir = self.dir.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let previous = std::fs::read_to_string(dir.join(POINTER)).ok();
            let documents = [(Document::Devices, devices.as_slice()), (Document::Aliases, aliases.as_slice())];
            let current = publish(&dir, documents, write_synced).or_raise(|| ErrorKind::Io)?;
            debug!(dir = %dir.display(), generation = %current, "Published index generation");

            // The previous generation stays for readers that resolved the
            // pointer just before the swap.
            let mut keep = vec![current.as_str()];
            keep.extend(previous.as_deref().map(str::trim));
            if let Err(e) = prune(&dir, &keep) {
                warn!(dir = %dir.display(), error = %e, "Failed to prune old index generations");
            }
            Ok(())
        })
        .await
        .or_raise(|| ErrorKind::Task)?
    }

    async fn remove_all(&self) -> Result<()> {
        match tokio::fs::remove_file(self.dir.join(POINTER)).await {
            Ok(()) => {},
            Err(e) if e.kind() == IoErrorKind::NotFound => {},
            Err(e) => return Err(e).or_raise(|| ErrorKind::Io),
        }
        let dir = self.dir.clone();
        tokio::task::spawn_blocking(move || prune(&dir, &[]))
            .await
            .or_raise(|| ErrorKind::Task)?
            .or_raise(|| ErrorKind::Io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generations(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .filter(|name| name.starts_with(GENERATION_PREFIX))
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_read_before_any_write() {
        let dir = tempfile::tempdir().unwrap();
        let documents = FsDocuments::new(dir.path());
        assert_eq!(documents.read().await.unwrap(), None);
        assert_eq!(documents.path_of(Document::Devices).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_replace_publishes_both_documents() {
        let dir = tempfile::tempdir().unwrap();
        let documents = FsDocuments::new(dir.path().join("nested").join("index"));
        documents.replace(b"{}".to_vec(), b"{}".to_vec()).await.unwrap();
        documents
            .replace(b"{\"a\":1}".to_vec(), b"{\"b\":2}".to_vec())
            .await
            .unwrap();
        let read = documents.read().await.unwrap().unwrap();
        assert_eq!(read.devices, b"{\"a\":1}");
        assert_eq!(read.aliases.as_deref(), Some(&b"{\"b\":2}"[..]));

        let devices = documents.path_of(Document::Devices).await.unwrap().unwrap();
        assert_eq!(devices.file_name().unwrap(), "index.json");
        assert_eq!(std::fs::read(devices).unwrap(), b"{\"a\":1}");
    }

    #[tokio::test]
    async fn test_old_generations_are_pruned() {
        let dir = tempfile::tempdir().unwrap();
        let documents = FsDocuments::new(dir.path());
        for n in 0..4 {
            documents.replace(format!("{{\"n\":{n}}}").into_bytes(), b"{}".to_vec()).await.unwrap();
        }
        // Live generation plus the one it replaced.
        assert_eq!(generations(dir.path()).len(), 2);
        assert_eq!(documents.read().await.unwrap().unwrap().devices, b"{\"n\":3}");
    }

    #[tokio::test]
    async fn test_failed_second_document_keeps_previous_generation() {
        let dir = tempfile::tempdir().unwrap();
        let old: [(Document, &[u8]); 2] = [(Document::Devices, b"old-devices"), (Document::Aliases, b"old-aliases")];
        publish(dir.path(), old, write_synced).unwrap();
        let before = generations(dir.path());

        let new: [(Document, &[u8]); 2] = [(Document::Devices, b"new-devices"), (Document::Aliases, b"new-aliases")];
        let mut writes = 0;
        let err = publish(
            dir.path(),
            new,
            |path, contents| {
                writes += 1;
                if writes == 2 {
                    return Err(std::io::Error::other("disk full"));
                }
                write_synced(path, contents)
            },
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "disk full");
        assert_eq!(generations(dir.path()), before);

        let read = FsDocuments::new(dir.path()).read().await.unwrap().unwrap();
        assert_eq!(read.devices, b"old-devices");
        assert_eq!(read.aliases.as_deref(), Some(&b"old-aliases"[..]));
    }

    #[tokio::test]
    async fn test_pointer_to_missing_generation_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(POINTER), ".index-gone").unwrap();
        let err = FsDocuments::new(dir.path()).read().await.unwrap_err();
        assert_eq!(*err, ErrorKind::Corrupt(Document::Devices));

        std::fs::write(dir.path().join(POINTER), "../../etc").unwrap();
        let err = FsDocuments::new(dir.path()).read().await.unwrap_err();
        assert_eq!(*err, ErrorKind::Corrupt(Document::Devices));
    }

    #[tokio::test]
    async fn test_remove_all_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("unrelated.txt"), b"keep me").unwrap();
        let documents = FsDocuments::new(dir.path());
        documents.replace(b"{}".to_vec(), b"{}".to_vec()).await.unwrap();
        documents.remove_all().await.unwrap();
        documents.remove_all().await.unwrap();
        assert_eq!(documents.read().await.unwrap(), None);
        assert!(generations(dir.path()).is_empty());
        assert!(dir.path().join("unrelated.txt").exists());
    }
}
