//! Pack list documents: vendor indexes (`.vidx`) and pack indexes (`.pidx`).
//!
//! Both share one grammar rooted at `<index>`: a `vindex` section pointing at
//! further vendor indexes and a `pindex` section listing descriptors.

use crate::error::{ErrorKind, Result};
use crate::models::PackRef;
use crate::xml::Element;
use tracing::warn;

/// One descriptor listed by a pack index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdscRef {
    pub url: String,
    pub vendor: String,
    pub name: String,
    pub version: String,
}

impl PdscRef {
    pub fn pack(&self) -> PackRef {
        PackRef::new(&self.vendor, &self.name, &self.version)
    }

    /// `<url>/<vendor>.<name>.pdsc`
    pub fn descriptor_url(&self) -> String {
        format!("{}{}.{}.pdsc", with_trailing_slash(&self.url), self.vendor, self.name)
    }

    /// `<url>/<vendor>.<name>.<version>.pack`
    pub fn archive_url(&self) -> String {
        format!(
            "{}{}.{}.{}.pack",
            with_trailing_slash(&self.url),
            self.vendor,
            self.name,
            self.version
        )
    }
}

/// A reference to a vendor's own pack index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PidxRef {
    pub url: String,
    pub vendor: String,
}

impl PidxRef {
    /// The vendor index lives at `<url><vendor>.pidx`.
    pub fn index_url(&self) -> String {
        format!("{}{}.pidx", self.url, self.vendor)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackIndex {
    pub vendor: Option<String>,
    pub vendor_indexes: Vec<PidxRef>,
    pub descriptors: Vec<PdscRef>,
}

impl PackIndex {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let root = Element::parse(bytes)?;
        if root.name() != "index" {
            exn::bail!(ErrorKind::UnexpectedRoot {
                expected: "index",
                found: root.name().to_string(),
            });
        }

        let vendor_indexes = root
            .children_named("vindex")
            .flat_map(|section| section.children_named("pidx"))
            .filter_map(|pidx| match (pidx.attr("url"), pidx.attr("vendor")) {
                (Some(url), Some(vendor)) => Some(PidxRef {
                    url: url.to_string(),
                    vendor: vendor.to_string(),
                }),
                _ => {
                    warn!(url = ?pidx.attr("url"), "Skipping vendor index entry without url or vendor");
                    None
                },
            })
            .collect();

        let descriptors = root
            .children_named("pindex")
            .flat_map(|section| section.children_named("pdsc"))
            .filter_map(|pdsc| {
                let attrs = (pdsc.attr("url"), pdsc.attr("vendor"), pdsc.attr("name"), pdsc.attr("version"));
                match attrs {
                    (Some(url), Some(vendor), Some(name), Some(version)) => Some(PdscRef {
                        url: url.to_string(),
                        vendor: vendor.to_string(),
                        name: name.to_string(),
                        version: version.to_string(),
                    }),
                    _ => {
                        warn!(name = ?pdsc.attr("name"), "Skipping incomplete pack index entry");
                        None
                    },
                }
            })
            .collect();

        Ok(Self {
            vendor: root.child("vendor").map(|vendor| vendor.text().to_string()),
            vendor_indexes,
            descriptors,
        })
    }
}

fn with_trailing_slash(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{url}/")
    }
}
