use crate::documents::{Document, Documents};
use crate::error::{ErrorKind, Result};
use cmpack_pdsc::models::{AliasRecord, DeviceRecord, PackRef};
use exn::ResultExt;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// The merged view of every parsed pack: devices and board aliases by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Index {
    pub devices: BTreeMap<String, DeviceRecord>,
    pub aliases: BTreeMap<String, AliasRecord>,
}

impl Index {
    pub fn device(&self, name: &str) -> Option<&DeviceRecord> {
        self.devices.get(name)
    }

    pub fn alias(&self, name: &str) -> Option<&AliasRecord> {
        self.aliases.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty() && self.aliases.is_empty()
    }

    /// Every pack referenced by at least one device.
    pub fn packs(&self) -> BTreeSet<&PackRef> {
        self.devices.values().map(|device| &device.from_pack).collect()
    }

    /// Fold records into the index in order; a later record replaces an
    /// earlier one with the same name.
    pub fn fold(&mut self, devices: impl IntoIterator<Item = DeviceRecord>, aliases: impl IntoIterator<Item = AliasRecord>) {
        for device in devices {
            if let Some(previous) = self.devices.get(&device.name)
                && !previous.from_pack.same_pack(&device.from_pack)
            {
                warn!(
                    device = %device.name,
                    previous = %previous.from_pack,
                    replacement = %device.from_pack,
                    "Device defined by more than one pack; keeping the later definition"
                );
            }
            self.devices.insert(device.name.clone(), device);
        }
        for alias in aliases {
            if self.aliases.contains_key(&alias.name) {
                debug!(alias = %alias.name, "Replacing alias");
            }
            self.aliases.insert(alias.name.clone(), alias);
        }
    }

    pub(crate) fn decode(documents: &Documents) -> Result<Self> {
        let devices = serde_json::from_slice(&documents.devices).or_raise(|| ErrorKind::Corrupt(Document::Devices))?;
        let aliases = match &documents.aliases {
            Some(bytes) => serde_json::from_slice(bytes).or_raise(|| ErrorKind::Corrupt(Document::Aliases))?,
            None => BTreeMap::new(),
        };
        Ok(Self { devices, aliases })
    }

    /// Decode whatever still parses; a corrupt document contributes nothing.
    pub(crate) fn salvage(documents: &Documents) -> Self {
        let devices = serde_json::from_slice(&documents.devices).unwrap_or_else(|err| {
            warn!(document = %Document::Devices, error = %err, "Discarding corrupt index document");
            BTreeMap::new()
        });
        let aliases = match &documents.aliases {
            Some(bytes) => serde_json::from_slice(bytes).unwrap_or_else(|err| {
                warn!(document = %Document::Aliases, error = %err, "Discarding corrupt index document");
                BTreeMap::new()
            }),
            None => BTreeMap::new(),
        };
        Self { devices, aliases }
    }

    /// The devices and aliases documents, in that order.
    pub(crate) fn encode(&self) -> Result<(Vec<u8>, Vec<u8>)> {
        let devices = serde_json::to_vec_pretty(&self.devices).or_raise(|| ErrorKind::Serialize)?;
        let aliases = serde_json::to_vec_pretty(&self.aliases).or_raise(|| ErrorKind::Serialize)?;
        Ok((devices, aliases))
    }
}
