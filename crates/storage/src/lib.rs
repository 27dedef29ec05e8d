//! Storage of downloaded CMSIS pack files.
//!
//! The [`ArchiveStore`] owns the on-disk layout of descriptor documents and
//! pack archives. It agrees with the index only on the [`PackRef`] naming
//! convention; it knows nothing about devices.
//!
//! [`PackRef`]: cmpack_pdsc::models::PackRef

pub mod error;
mod path;
mod store;

pub use crate::path::validate_component;
pub use crate::store::{ArchiveStore, BoxSyncRead, FileKind, PackRefStream};
use std::sync::Arc;

pub type StoreHandle = Arc<ArchiveStore>;
