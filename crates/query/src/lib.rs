//! Read-only queries over the pack cache.
//!
//! [`Catalog`] answers device, board alias and flash algorithm lookups from
//! the merged index, opening pack archives from the store only when the
//! algorithm bytes are needed.

mod algorithm;
mod catalog;
pub mod error;

pub use crate::algorithm::FlashAlgorithm;
pub use crate::catalog::Catalog;
