use crate::boards::parse_boards;
use crate::devices::parse_devices;
use crate::error::{ErrorKind, Result};
use crate::models::{AliasRecord, DeviceRecord, PackRef};
use crate::xml::Element;
use tracing::instrument;

/// Everything the index needs from one parsed descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub pack: PackRef,
    pub devices: Vec<DeviceRecord>,
    pub aliases: Vec<AliasRecord>,
}

impl Descriptor {
    /// Parse a descriptor whose identity is not known up front, reading the
    /// pack vendor, name and latest release from the document itself.
    #[instrument(skip_all, fields(len = bytes.len()))]
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let root = parse_package(bytes)?;
        let pack = package_identity(&root)?;
        Ok(Self::from_package(&root, pack))
    }

    /// Parse a descriptor on behalf of a known pack.
    #[instrument(skip_all, fields(pack = %pack, len = bytes.len()))]
    pub fn parse_for(bytes: &[u8], pack: &PackRef) -> Result<Self> {
        let root = parse_package(bytes)?;
        Ok(Self::from_package(&root, pack.clone()))
    }

    fn from_package(root: &Element, pack: PackRef) -> Self {
        let devices = root
            .child("devices")
            .map(|devices| parse_devices(devices, &pack))
            .unwrap_or_default();
        let aliases = root.child("boards").map(parse_boards).unwrap_or_default();
        tracing::debug!(pack = %pack, devices = devices.len(), aliases = aliases.len(), "Parsed descriptor");
        Self { pack, devices, aliases }
    }

    pub fn into_records(self) -> (Vec<DeviceRecord>, Vec<AliasRecord>) {
        (self.devices, self.aliases)
    }
}

/// Turn raw descriptor bytes into device and alias records attributed to
/// `pack`. Pure; every record's `from_pack` is `pack`.
pub fn parse_descriptor(bytes: &[u8], pack: &PackRef) -> Result<(Vec<DeviceRecord>, Vec<AliasRecord>)> {
    Descriptor::parse_for(bytes, pack).map(Descriptor::into_records)
}

fn parse_package(bytes: &[u8]) -> Result<Element> {
    let root = Element::parse(bytes)?;
    if root.name() != "package" {
        exn::bail!(ErrorKind::UnexpectedRoot {
            expected: "package",
            found: root.name().to_string(),
        });
    }
    Ok(root)
}

fn package_identity(root: &Element) -> Result<PackRef> {
    let text_of = |name: &'static str, field: &'static str| {
        root.child(name)
            .map(Element::text)
            .filter(|text| !text.is_empty())
            .ok_or_else(|| exn::Exn::from(ErrorKind::MissingField(field)))
    };
    let vendor = text_of("vendor", "package/vendor")?;
    let name = text_of("name", "package/name")?;
    let version = root
        .child("releases")
        .and_then(|releases| releases.child("release"))
        .and_then(|release| release.attr("version"))
        .ok_or_else(|| exn::Exn::from(ErrorKind::MissingField("package/releases/release@version")))?;
    Ok(PackRef::new(vendor, name, version))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Core, Fpu, Mpu, Processors};

    const LPC1700_PDSC: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<package schemaVersion="1.3" xmlns:xs="http://www.w3.org/2001/XMLSchema-instance">
  <vendor>Keil</vendor>
  <name>LPC1700_DFP</name>
  <description>NXP LPC1700 Series Device Support</description>
  <releases>
    <release version="2.4.0">Newest</release>
    <release version="2.3.0">Older</release>
  </releases>
  <devices>
    <family Dfamily="LPC1700 Series" Dvendor="NXP:11">
      <processor Dcore="Cortex-M3" DcoreVersion="r2p0" Dfpu="0" Dmpu="1" Dendian="Little-endian" Dclock="100000000"/>
      <device Dname="LPC1768">
        <memory id="IROM1" start="0x00000000" size="0x00080000" startup="1" default="1"/>
        <memory id="IRAM1" start="0x10000000" size="0x00008000" init="0" default="1"/>
        <algorithm name="Flash\LPC_IAP_512.FLM" start="0x00000000" size="0x00080000" default="1"/>
      </device>
      <device Dname="LPC1788">
        <memory id="IROM1" start="0x00000000" size="0x00080000" startup="1" default="1"/>
      </device>
    </family>
  </devices>
  <boards>
    <board vendor="Embedded Artists" name="LPC1788-32 Developers Kit">
      <mountedDevice deviceIndex="0" Dvendor="NXP:11" Dname="LPC1788"/>
    </board>
  </boards>
</package>"#;

    #[test]
    fn test_parse_reads_identity() {
        let descriptor = Descriptor::parse(LPC1700_PDSC.as_bytes()).unwrap();
        assert_eq!(descriptor.pack, PackRef::new("Keil", "LPC1700_DFP", "2.4.0"));
        assert_eq!(descriptor.devices.len(), 2);
        assert_eq!(descriptor.aliases.len(), 1);
    }

    #[test]
    fn test_records_carry_given_pack() {
        let pack = PackRef::new("Keil", "LPC1700_DFP", "9.9.9");
        let (devices, aliases) = parse_descriptor(LPC1700_PDSC.as_bytes(), &pack).unwrap();
        assert!(devices.iter().all(|device| device.from_pack == pack));
        let Some(Processors::Symmetric(processor)) = &devices[0].processor else {
            panic!("expected the family processor");
        };
        assert_eq!((processor.core, processor.fpu, processor.mpu), (Core::CortexM3, Fpu::None, Mpu::Present));
        assert_eq!(aliases[0].mounted_devices, vec!["LPC1788"]);
    }

    #[test]
    fn test_descriptor_without_devices() {
        let pack = PackRef::new("ARM", "CMSIS", "5.0.0");
        let xml = "<package><vendor>ARM</vendor><name>CMSIS</name></package>";
        let (devices, aliases) = parse_descriptor(xml.as_bytes(), &pack).unwrap();
        assert!(devices.is_empty());
        assert!(aliases.is_empty());
    }

    #[test]
    fn test_wrong_root() {
        let pack = PackRef::new("ARM", "CMSIS", "5.0.0");
        let err = parse_descriptor(b"<index/>", &pack).unwrap_err();
        assert!(matches!(&*err, ErrorKind::UnexpectedRoot { expected: "package", .. }));
    }

    #[test]
    fn test_malformed_document() {
        let pack = PackRef::new("ARM", "CMSIS", "5.0.0");
        let err = parse_descriptor(b"<package><devices></package>", &pack).unwrap_err();
        assert!(matches!(&*err, ErrorKind::MalformedXml(_)));
    }

    #[test]
    fn test_identity_requires_release() {
        let err = Descriptor::parse(b"<package><vendor>ARM</vendor><name>CMSIS</name></package>").unwrap_err();
        assert_eq!(*err, ErrorKind::MissingField("package/releases/release@version"));
    }
}
