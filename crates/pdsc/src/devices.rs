//! `<devices>` section: family, subFamily, device and variant inheritance.

use crate::error::{ErrorKind, Result};
use crate::models::{AlgorithmRef, Core, DeviceRecord, Fpu, MemoryAccess, MemoryRegion, Mpu, PackRef, Processor, Processors};
use crate::number::{parse_bool, parse_u64};
use crate::xml::Element;
use std::collections::BTreeMap;
use tracing::warn;

/// `<processor>` attributes declared at one level. Unset fields fall back to
/// the enclosing level.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct ProcessorBuilder {
    core: Option<Core>,
    units: Option<u8>,
    fpu: Option<Fpu>,
    mpu: Option<Mpu>,
}

impl ProcessorBuilder {
    fn from_element(element: &Element) -> Self {
        Self {
            core: lenient(element, "Dcore", str::parse),
            units: lenient(element, "Punits", |value| {
                value.trim().parse().map_err(|_| {
                    exn::Exn::from(ErrorKind::InvalidValue {
                        field: "processor@Punits",
                        value: value.to_string(),
                    })
                })
            }),
            fpu: lenient(element, "Dfpu", str::parse),
            mpu: lenient(element, "Dmpu", str::parse),
        }
    }

    fn or(self, parent: &Self) -> Self {
        Self {
            core: self.core.or(parent.core),
            units: self.units.or(parent.units),
            fpu: self.fpu.or(parent.fpu),
            mpu: self.mpu.or(parent.mpu),
        }
    }

    fn build(self) -> Option<Processor> {
        Some(Processor {
            core: self.core?,
            units: self.units.unwrap_or(1),
            fpu: self.fpu.unwrap_or_default(),
            mpu: self.mpu.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ProcessorsBuilder {
    Symmetric(ProcessorBuilder),
    /// Keyed by `Pname`.
    Asymmetric(BTreeMap<String, ProcessorBuilder>),
}

impl ProcessorsBuilder {
    /// Fill unset fields from `parent`. Named processors take defaults from a
    /// symmetric parent; a symmetric child cannot inherit from named ones.
    fn inherit(self, parent: &Self) -> Option<Self> {
        match (self, parent) {
            (Self::Symmetric(child), Self::Symmetric(parent)) => Some(Self::Symmetric(child.or(parent))),
            (Self::Asymmetric(mut children), Self::Asymmetric(parents)) => {
                for (name, parent) in parents {
                    children
                        .entry(name.clone())
                        .and_modify(|child| *child = child.or(parent))
                        .or_insert(*parent);
                }
                Some(Self::Asymmetric(children))
            },
            (Self::Asymmetric(children), Self::Symmetric(parent)) => Some(Self::Asymmetric(
                children
                    .into_iter()
                    .map(|(name, child)| (name, child.or(parent)))
                    .collect(),
            )),
            (Self::Symmetric(_), Self::Asymmetric(_)) => None,
        }
    }

    /// `None` if any processor is missing its core.
    fn build(self) -> Option<Processors> {
        match self {
            Self::Symmetric(processor) => processor.build().map(Processors::Symmetric),
            Self::Asymmetric(processors) => processors
                .into_iter()
                .map(|(name, processor)| processor.build().map(|processor| (name, processor)))
                .collect::<Option<BTreeMap<_, _>>>()
                .map(Processors::Asymmetric),
        }
    }
}

/// Properties collected at one level of the device hierarchy.
#[derive(Debug, Default, Clone)]
struct DeviceBuilder<'dom> {
    name: Option<&'dom str>,
    processors: Option<ProcessorsBuilder>,
    memories: BTreeMap<String, MemoryRegion>,
    algorithms: Vec<AlgorithmRef>,
}

impl<'dom> DeviceBuilder<'dom> {
    fn from_element(element: &'dom Element) -> Self {
        Self {
            name: element.attr("Dname").or_else(|| element.attr("Dvariant")),
            ..Self::default()
        }
    }

    /// Absorb a `processor`, `memory` or `algorithm` child. Returns `false`
    /// for any other element so the caller can handle structural children.
    fn absorb(&mut self, child: &Element) -> bool {
        match child.name() {
            "processor" => {
                self.add_processor(child);
                true
            },
            "memory" => {
                match parse_memory(child) {
                    Ok((name, region)) => {
                        self.memories.insert(name, region);
                    },
                    Err(err) => warn!(device = ?self.name, error = ?err, "Skipping malformed memory element"),
                }
                true
            },
            "algorithm" => {
                match parse_algorithm(child) {
                    Ok(algorithm) => self.algorithms.push(algorithm),
                    Err(err) => warn!(device = ?self.name, error = ?err, "Skipping malformed algorithm element"),
                }
                true
            },
            _ => false,
        }
    }

    /// The first processor at a level wins, except that further named
    /// processors join a named one.
    fn add_processor(&mut self, element: &Element) {
        let processor = ProcessorBuilder::from_element(element);
        match (&mut self.processors, element.attr("Pname")) {
            (None, None) => self.processors = Some(ProcessorsBuilder::Symmetric(processor)),
            (None, Some(name)) => {
                self.processors = Some(ProcessorsBuilder::Asymmetric(BTreeMap::from([(name.to_string(), processor)])));
            },
            (Some(ProcessorsBuilder::Asymmetric(processors)), Some(name)) => {
                processors.insert(name.to_string(), processor);
            },
            (Some(_), _) => warn!(device = ?self.name, "Ignoring additional processor element"),
        }
    }

    /// Child memories win by region name; parent algorithms follow the
    /// child's own. Returns `None` if the processors cannot be combined.
    fn inherit(mut self, parent: &Self) -> Option<Self> {
        self.name = self.name.or(parent.name);
        self.processors = match (self.processors.take(), &parent.processors) {
            (Some(child), Some(inherited)) => {
                let Some(processors) = child.inherit(inherited) else {
                    warn!(device = ?self.name, "Skipping device with a processor that conflicts with its parent");
                    return None;
                };
                Some(processors)
            },
            (child, inherited) => child.or_else(|| inherited.clone()),
        };
        for (name, region) in &parent.memories {
            self.memories.entry(name.clone()).or_insert_with(|| region.clone());
        }
        self.algorithms.extend(parent.algorithms.iter().cloned());
        Some(self)
    }

    fn build(self, pack: &PackRef) -> Option<DeviceRecord> {
        let Some(name) = self.name else {
            warn!(pack = %pack, "Skipping device without a name");
            return None;
        };
        let Some(processor) = self.processors.and_then(ProcessorsBuilder::build) else {
            warn!(pack = %pack, device = name, "Skipping device without a processor core");
            return None;
        };
        Some(DeviceRecord {
            name: name.to_string(),
            processor: Some(processor),
            memories: self.memories,
            algorithms: self.algorithms,
            from_pack: pack.clone(),
        })
    }
}

/// Flatten a `<devices>` element into one record per concrete device.
pub(crate) fn parse_devices(devices: &Element, pack: &PackRef) -> Vec<DeviceRecord> {
    devices
        .children_named("family")
        .flat_map(parse_family)
        .filter_map(|builder| builder.build(pack))
        .collect()
}

fn parse_family(element: &Element) -> Vec<DeviceBuilder<'_>> {
    let mut family = DeviceBuilder::from_element(element);
    let mut devices = Vec::new();
    for child in element.children() {
        if family.absorb(child) {
            continue;
        }
        match child.name() {
            "subFamily" => devices.extend(parse_sub_family(child)),
            "device" => devices.extend(parse_device(child)),
            _ => {},
        }
    }
    devices.into_iter().filter_map(|device| device.inherit(&family)).collect()
}

fn parse_sub_family(element: &Element) -> Vec<DeviceBuilder<'_>> {
    let mut sub_family = DeviceBuilder::from_element(element);
    let mut devices = Vec::new();
    for child in element.children() {
        if !sub_family.absorb(child) && child.name() == "device" {
            devices.extend(parse_device(child));
        }
    }
    devices
        .into_iter()
        .filter_map(|device| device.inherit(&sub_family))
        .collect()
}

fn parse_device(element: &Element) -> Vec<DeviceBuilder<'_>> {
    let mut device = DeviceBuilder::from_element(element);
    let mut variants = Vec::new();
    for child in element.children() {
        if !device.absorb(child) && child.name() == "variant" {
            let mut variant = DeviceBuilder::from_element(child);
            for grandchild in child.children() {
                variant.absorb(grandchild);
            }
            variants.push(variant);
        }
    }
    if variants.is_empty() {
        vec![device]
    } else {
        variants.into_iter().filter_map(|variant| variant.inherit(&device)).collect()
    }
}

fn parse_memory(element: &Element) -> Result<(String, MemoryRegion)> {
    let id = element.attr("id");
    let name = id
        .or_else(|| element.attr("name"))
        .ok_or_else(|| exn::Exn::from(ErrorKind::MissingField("memory@id")))?;
    let access = match (element.attr("access"), id) {
        (Some(letters), _) => MemoryAccess::from_letters(letters),
        (None, Some(id)) if id.contains("ROM") => MemoryAccess::from_letters("rx"),
        (None, Some(id)) if id.contains("RAM") => MemoryAccess::from_letters("rw"),
        (None, _) => MemoryAccess::default(),
    };
    let region = MemoryRegion {
        access,
        start: required_u64(element, "start", "memory@start")?,
        size: required_u64(element, "size", "memory@size")?,
        startup: optional_bool(element, "startup", "memory@startup"),
        default: optional_bool(element, "default", "memory@default"),
    };
    Ok((name.to_string(), region))
}

fn parse_algorithm(element: &Element) -> Result<AlgorithmRef> {
    let file_name = element
        .attr("name")
        .ok_or_else(|| exn::Exn::from(ErrorKind::MissingField("algorithm@name")))?;
    Ok(AlgorithmRef {
        file_name: file_name.to_string(),
        start: required_u64(element, "start", "algorithm@start")?,
        size: required_u64(element, "size", "algorithm@size")?,
        default: optional_bool(element, "default", "algorithm@default"),
        ram_start: lenient(element, "RAMstart", |value| parse_u64("algorithm@RAMstart", value)),
        ram_size: lenient(element, "RAMsize", |value| parse_u64("algorithm@RAMsize", value)),
    })
}

fn required_u64(element: &Element, attribute: &str, field: &'static str) -> Result<u64> {
    match element.attr(attribute) {
        Some(value) => parse_u64(field, value),
        None => exn::bail!(ErrorKind::MissingField(field)),
    }
}

/// Parse an optional attribute, treating an unparseable value as absent.
fn lenient<T>(element: &Element, attribute: &str, parse: impl FnOnce(&str) -> Result<T>) -> Option<T> {
    let value = element.attr(attribute)?;
    match parse(value) {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            warn!(attribute, error = ?err, "Ignoring invalid attribute value");
            None
        },
    }
}

fn optional_bool(element: &Element, attribute: &str, field: &'static str) -> bool {
    lenient(element, attribute, |value| parse_bool(field, value)).unwrap_or_default()
}
