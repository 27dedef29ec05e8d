use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Identifies one published version of one pack.
///
/// Together with the store layout this deterministically names a descriptor
/// file and an archive file on disk.
#[derive(Debug, Display, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[display("{vendor}.{pack}.{version}")]
pub struct PackRef {
    pub vendor: String,
    pub pack: String,
    pub version: String,
}
impl PackRef {
    pub fn new(vendor: impl Into<String>, pack: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            vendor: vendor.into(),
            pack: pack.into(),
            version: version.into(),
        }
    }

    /// Returns `true` if both references name the same pack, ignoring version.
    pub fn same_pack(&self, other: &PackRef) -> bool {
        self.vendor == other.vendor && self.pack == other.pack
    }
}
