use super::{PackRef, Processors};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Access permissions of a memory region, one flag per PDSC access letter.
///
/// Only `read`, `write` and `execute` are mandatory in persisted documents;
/// the TrustZone and peripheral flags default to `false` when absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryAccess {
    pub read: bool,
    pub write: bool,
    pub execute: bool,
    #[serde(default)]
    pub peripheral: bool,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub non_secure: bool,
    #[serde(default)]
    pub non_secure_callable: bool,
}
impl MemoryAccess {
    /// Parse a PDSC access string such as `"rx"` or `"rwxs"`.
    ///
    /// Unknown letters are ignored.
    ///
    /// # Examples
    ///
    /// ```
    /// use cmpack_pdsc::models::MemoryAccess;
    /// let access = MemoryAccess::from_letters("rx");
    /// assert!(access.read && access.execute && !access.write);
    /// ```
    pub fn from_letters(letters: &str) -> Self {
        let mut access = Self::default();
        for letter in letters.chars() {
            match letter {
                'r' => access.read = true,
                'w' => access.write = true,
                'x' => access.execute = true,
                'p' => access.peripheral = true,
                's' => access.secure = true,
                'n' => access.non_secure = true,
                'c' => access.non_secure_callable = true,
                _ => {},
            }
        }
        access
    }
}

/// One contiguous memory region of a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryRegion {
    pub access: MemoryAccess,
    pub start: u64,
    pub size: u64,
    pub startup: bool,
    #[serde(default)]
    pub default: bool,
}

/// Reference to a flash algorithm stored inside the owning pack archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlgorithmRef {
    /// Path of the algorithm ELF inside the archive, verbatim from the
    /// descriptor (separators are normalised at lookup time).
    pub file_name: String,
    pub start: u64,
    pub size: u64,
    pub default: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ram_start: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ram_size: Option<u64>,
}

/// A single microcontroller variant, the core entity of the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Unique key within the merged index.
    pub name: String,
    /// `None` only in documents written before processors were recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processor: Option<Processors>,
    /// Region name (`IROM1`, `IRAM1`, ...) to region.
    pub memories: BTreeMap<String, MemoryRegion>,
    /// Flash algorithms in declaration order.
    pub algorithms: Vec<AlgorithmRef>,
    /// The pack whose archive supplies this device's algorithms.
    pub from_pack: PackRef,
}
impl DeviceRecord {
    /// The algorithm flagged as default, if any.
    pub fn default_algorithm(&self) -> Option<&AlgorithmRef> {
        self.algorithms.iter().find(|algorithm| algorithm.default)
    }
}
