//! Parsing of CMSIS pack descriptors and pack list documents into the shared
//! record types used by the index.

mod boards;
mod descriptor;
mod devices;
pub mod error;
pub mod models;
mod number;
pub mod pack_index;
mod xml;

pub use crate::descriptor::{Descriptor, parse_descriptor};
pub use crate::pack_index::{PackIndex, PdscRef, PidxRef};
