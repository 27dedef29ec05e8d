//! Query Error Types

use cmpack_index::error::ErrorKind as IndexErrorKind;
use cmpack_pdsc::models::PackRef;
use derive_more::{Display, Error};

/// A query error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for query operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// No device, alias or archive member by that name.
    #[display("not found: {_0}")]
    NotFound(#[error(not(source))] String),
    /// The index references a pack whose archive was never downloaded.
    #[display("archive for {_0} is missing; run `cmpack update`")]
    ArchiveMissing(#[error(not(source))] PackRef),
    #[display("device {_0} has no flash algorithm")]
    NoAlgorithm(#[error(not(source))] String),
    #[display("pack index not initialized; run `cmpack update` first")]
    Uninitialized,
    #[display("pack index is corrupt; run `cmpack clean` then `cmpack update`")]
    Corrupt,
    #[display("archive for {_0} is unreadable")]
    Archive(#[error(not(source))] PackRef),
    #[display("pack index unavailable")]
    Index,
    #[display("archive store unavailable")]
    Storage,
    #[display("background task failed")]
    Task,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Task | ErrorKind::Storage)
    }

    pub(crate) fn from_index(kind: &IndexErrorKind) -> Self {
        match kind {
            IndexErrorKind::DeviceNotFound(name) | IndexErrorKind::AliasNotFound(name) => Self::NotFound(name.clone()),
            IndexErrorKind::Uninitialized => Self::Uninitialized,
            IndexErrorKind::Corrupt(_) => Self::Corrupt,
            _ => Self::Index,
        }
    }
}
