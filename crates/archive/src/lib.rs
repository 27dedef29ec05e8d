//! Random-access reads of CMSIS pack archives.
//!
//! A `.pack` file is a plain zip archive. This crate wraps [`zip`] behind
//! [`PackArchive`], providing:
//!
//! - **Descriptor discovery** ([`PackArchive::find_descriptor`]) using a
//!   case-insensitive suffix match, first match in archive member order.
//! - **Member extraction** ([`PackArchive::read_entry`]) tolerant of the
//!   backslash separators and inconsistent casing found in vendor packs.
//!
//! Everything in here is blocking I/O; async callers should wrap it in
//! `spawn_blocking`.

mod entry;
pub mod error;

pub use crate::entry::normalize_entry_path;
use crate::entry::has_suffix_ignore_case;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use zip::ZipArchive;

/// File name suffix of a pack descriptor inside an archive.
pub const DESCRIPTOR_SUFFIX: &str = ".pdsc";

/// An opened pack archive.
///
/// Generic over the underlying reader so that archives can be read straight
/// from disk ([`PackArchive::open`]) or from memory ([`PackArchive::from_bytes`]).
///
/// # Examples
///
/// ```no_run
/// use cmpack_archive::PackArchive;
///
/// # fn example() -> cmpack_archive::error::Result<()> {
/// let mut archive = PackArchive::open("/path/to/Keil/LPC1700_DFP/2.4.0.pack")?;
/// if let Some(pdsc) = archive.find_descriptor() {
///     let descriptor = archive.read_entry(&pdsc)?;
///     println!("{pdsc}: {} bytes", descriptor.len());
/// }
/// # Ok(())
/// # }
/// ```
pub struct PackArchive<R = File> {
    inner: ZipArchive<R>,
}

impl PackArchive<File> {
    /// Open a pack archive from the filesystem.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref()).or_raise(|| ErrorKind::Io)?;
        Self::new(file)
    }
}

impl PackArchive<Cursor<Vec<u8>>> {
    /// Open a pack archive already held in memory.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        Self::new(Cursor::new(bytes.into()))
    }
}

impl<R: Read + Seek> PackArchive<R> {
    /// Wrap a reader, parsing the zip central directory.
    pub fn new(reader: R) -> Result<Self> {
        let inner = ZipArchive::new(reader).or_raise(|| ErrorKind::InvalidArchive)?;
        Ok(Self { inner })
    }

    /// Number of members in the archive (directories included).
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Give back the underlying reader.
    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }

    /// Member names in archive order.
    pub fn entry_names(&mut self) -> Result<Vec<String>> {
        (0..self.inner.len())
            .map(|index| self.name_at(index))
            .collect()
    }

    fn name_at(&mut self, index: usize) -> Result<String> {
        // Raw access skips decompression setup; only the header is needed.
        let file = self.inner.by_index_raw(index).or_raise(|| ErrorKind::InvalidArchive)?;
        Ok(file.name().to_string())
    }

    /// Returns the name of the first member (in archive order) whose name
    /// ends with `suffix`, ignoring ASCII case.
    ///
    /// Members with unreadable headers are skipped rather than failing the
    /// whole scan.
    pub fn find_entry(&mut self, suffix: &str) -> Option<String> {
        for index in 0..self.inner.len() {
            match self.name_at(index) {
                Ok(name) if has_suffix_ignore_case(&name, suffix) => return Some(name),
                Ok(_) => {},
                Err(e) => tracing::debug!(index, error = ?e, "Skipping unreadable archive member"),
            }
        }
        None
    }

    /// Locate the pack descriptor embedded in this archive.
    pub fn find_descriptor(&mut self) -> Option<String> {
        self.find_entry(DESCRIPTOR_SUFFIX)
    }

    /// Resolve a descriptor-style path to the member name actually stored.
    ///
    /// The path is normalised first; an exact match is preferred, then a
    /// case-insensitive match of the full path.
    pub fn resolve_entry(&mut self, path: &str) -> Option<String> {
        let wanted = normalize_entry_path(path);
        if self.inner.index_for_name(&wanted).is_some() {
            return Some(wanted);
        }
        let names = self.entry_names().ok()?;
        names
            .into_iter()
            .find(|name| normalize_entry_path(name).eq_ignore_ascii_case(&wanted))
    }

    /// Read the full contents of a member.
    ///
    /// Returns [`EntryNotFound`](ErrorKind::EntryNotFound) if no member
    /// matches `path` under the rules of [`resolve_entry`](Self::resolve_entry).
    pub fn read_entry(&mut self, path: &str) -> Result<Vec<u8>> {
        let Some(name) = self.resolve_entry(path) else {
            exn::bail!(ErrorKind::EntryNotFound(path.to_string()));
        };
        let mut file = self.inner.by_name(&name).or_raise(|| ErrorKind::InvalidArchive)?;
        let mut buffer = Vec::with_capacity(usize::try_from(file.size()).unwrap_or(0));
        file.read_to_end(&mut buffer).or_raise(|| ErrorKind::Io)?;
        Ok(buffer)
    }
}
