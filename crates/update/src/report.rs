use crate::error::Error;
use cmpack_pdsc::PdscRef;
use cmpack_pdsc::models::PackRef;
use derive_more::Display;

/// Where in the refresh pipeline a failure happened.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Fetching or parsing a vidx/pidx list document.
    #[display("list")]
    List,
    #[display("descriptor")]
    Descriptor,
    #[display("parse")]
    Parse,
    /// Writing a fetched file into the archive store.
    #[display("store")]
    Store,
    #[display("archive")]
    Archive,
}

/// A recovered failure. One failed list or pack never aborts its siblings.
#[derive(Debug)]
pub struct Failure {
    pub stage: Stage,
    pub url: String,
    /// `None` for list-level failures.
    pub pack: Option<PackRef>,
    pub error: Error,
}

impl Failure {
    pub(crate) fn list(url: impl Into<String>, error: Error) -> Self {
        Self {
            stage: Stage::List,
            url: url.into(),
            pack: None,
            error,
        }
    }

    pub(crate) fn pack(stage: Stage, pack: &PackRef, url: &str, error: Error) -> Self {
        Self {
            stage,
            url: url.to_string(),
            pack: Some(pack.clone()),
            error,
        }
    }
}

/// Packs whose descriptors were fetched and parsed by a refresh; the input to
/// [`Updater::refresh_archives`](crate::Updater::refresh_archives).
#[derive(Debug, Clone, Default)]
pub struct ParsedPacks {
    pub(crate) descriptors: Vec<PdscRef>,
}

impl ParsedPacks {
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// In discovery order.
    pub fn packs(&self) -> impl Iterator<Item = PackRef> + '_ {
        self.descriptors.iter().map(PdscRef::pack)
    }
}

/// Outcome of [`Updater::refresh_all`](crate::Updater::refresh_all).
#[derive(Debug)]
pub struct Refresh {
    pub packs: ParsedPacks,
    pub failures: Vec<Failure>,
    /// Devices in the index after the merge.
    pub devices: usize,
    pub aliases: usize,
}

impl Refresh {
    pub fn failed_packs(&self) -> Vec<&PackRef> {
        self.failures.iter().filter_map(|failure| failure.pack.as_ref()).collect()
    }

    pub fn list_failures(&self) -> impl Iterator<Item = &Failure> {
        self.failures.iter().filter(|failure| failure.stage == Stage::List)
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Outcome of [`Updater::refresh_archives`](crate::Updater::refresh_archives).
#[derive(Debug, Default)]
pub struct ArchiveRefresh {
    pub downloaded: Vec<PackRef>,
    /// Already present in the store.
    pub skipped: Vec<PackRef>,
    pub failures: Vec<Failure>,
}

/// Outcome of [`Updater::update`](crate::Updater::update).
#[derive(Debug)]
pub struct Update {
    pub refresh: Refresh,
    pub archives: ArchiveRefresh,
}
