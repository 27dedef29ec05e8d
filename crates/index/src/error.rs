//! Index Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction.

use crate::documents::Document;
use derive_more::{Display, Error};

/// An index error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for index operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// No index has been written yet.
    #[display("pack index not initialized; run `cmpack update` first")]
    Uninitialized,
    /// A persisted document exists but cannot be decoded.
    #[display("pack index document {_0} is corrupt; run `cmpack clean` then `cmpack update`")]
    Corrupt(#[error(not(source))] Document),
    #[display("device not found: {_0}")]
    DeviceNotFound(#[error(not(source))] String),
    #[display("alias not found: {_0}")]
    AliasNotFound(#[error(not(source))] String),
    /// Reading, writing or removing an index document failed.
    #[display("index storage I/O error")]
    Io,
    #[display("failed to serialize index")]
    Serialize,
    /// A blocking task was cancelled or panicked.
    #[display("background task failed")]
    Task,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Io | ErrorKind::Task)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ErrorKind::DeviceNotFound(_) | ErrorKind::AliasNotFound(_))
    }
}
