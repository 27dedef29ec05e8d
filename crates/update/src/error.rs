//! Update Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction. Per-pack errors are collected into a
//! [`Refresh`](crate::Refresh) rather than returned.

use cmpack_pdsc::models::PackRef;
use derive_more::{Display, Error};
use std::path::PathBuf;

/// An update error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for update operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The remote could not be reached or the transfer broke off.
    #[display("failed to fetch {_0}")]
    Transport(#[error(not(source))] String),
    #[display("timed out fetching {_0}")]
    Timeout(#[error(not(source))] String),
    #[display("HTTP {status} fetching {url}")]
    HttpStatus { url: String, status: u16 },
    /// A list document was fetched but is not a valid vidx/pidx.
    #[display("invalid pack list document: {_0}")]
    InvalidList(#[error(not(source))] String),
    #[display("failed to parse descriptor of {_0}")]
    Parse(#[error(not(source))] PackRef),
    /// A local file is not a pack: not a zip, or no descriptor inside.
    #[display("not a valid pack archive: {}", _0.display())]
    InvalidArchive(#[error(not(source))] PathBuf),
    #[display("failed to read {}", _0.display())]
    Io(#[error(not(source))] PathBuf),
    #[display("archive store operation failed")]
    Storage,
    #[display("pack index operation failed")]
    Index,
    #[display("failed to build HTTP client")]
    Client,
    #[display("invalid configuration")]
    Config,
    #[display("background task failed")]
    Task,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ErrorKind::Transport(_) | ErrorKind::Timeout(_) | ErrorKind::Task => true,
            ErrorKind::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
