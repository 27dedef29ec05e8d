use serde::{Deserialize, Serialize};

/// A human-facing board name mapped to the devices mounted on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasRecord {
    pub name: String,
    /// Device names, in the order the board declares them.
    pub mounted_devices: Vec<String>,
}
impl AliasRecord {
    pub fn new(name: impl Into<String>, mounted_devices: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            mounted_devices: mounted_devices.into_iter().map(Into::into).collect(),
        }
    }
}
