//! The merged device and alias index.
//!
//! The index is derived data: it can always be rebuilt by refreshing from the
//! pack sources. It is persisted as two JSON documents (`index.json` for
//! devices, `aliases.json` for board aliases) published together as one
//! generation, so a reader never observes the devices of one refresh next to
//! the aliases of another.

mod documents;
pub mod error;
mod index;
mod store;

pub use crate::documents::{Document, DocumentStore, Documents, FsDocuments};
pub use crate::index::Index;
pub use crate::store::IndexStore;
