//! Refreshing the local pack cache from remote sources.
//!
//! ```text
//! Idle -> ListFetching -> DescriptorFetching/Parsing -> Merging -> Persisted
//!                                                                   |
//!                                                          ArchiveFetching
//! ```
//!
//! Per-list and per-pack failures are values collected into the returned
//! reports; the index is written once per refresh so readers never observe a
//! partial batch.

mod discover;
pub mod error;
mod report;
pub mod transport;
mod updater;
mod window;

pub use crate::report::{ArchiveRefresh, Failure, ParsedPacks, Refresh, Stage, Update};
pub use crate::transport::{HttpTransport, Transport};
pub use crate::updater::Updater;
