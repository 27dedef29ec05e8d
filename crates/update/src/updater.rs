use crate::discover::discover;
use crate::error::{ErrorKind, Result};
use crate::report::{ArchiveRefresh, Failure, ParsedPacks, Refresh, Stage, Update};
use crate::transport::{HttpTransport, Transport};
use crate::window::bounded;
use cmpack_archive::PackArchive;
use cmpack_config::Config;
use cmpack_index::IndexStore;
use cmpack_pdsc::models::PackRef;
use cmpack_pdsc::{Descriptor, PdscRef};
use cmpack_storage::{ArchiveStore, FileKind, StoreHandle};
use exn::{OptionExt, ResultExt};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

const DEFAULT_CONCURRENCY: usize = 4;

enum ArchiveOutcome {
    Downloaded,
    Present,
}

/// Keeps the index and the archive store in step with the remote sources.
///
/// Refreshing happens in two phases: [`refresh_all`](Self::refresh_all)
/// fetches and parses every descriptor and merges the results into the index
/// in a single write, then [`refresh_archives`](Self::refresh_archives)
/// downloads the (much larger) archives for the packs that parsed.
#[derive(Debug, Clone)]
pub struct Updater {
    transport: Arc<dyn Transport>,
    store: StoreHandle,
    index: Arc<IndexStore>,
    sources: Vec<String>,
    concurrency: usize,
}

impl Updater {
    pub fn new(transport: Arc<dyn Transport>, store: StoreHandle, index: Arc<IndexStore>) -> Self {
        Self {
            transport,
            store,
            index,
            sources: Vec::new(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Build an updater talking HTTP, with the store and index locations,
    /// sources and concurrency taken from `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport = HttpTransport::from_config(&config.network)?;
        let store = ArchiveStore::new(&config.data_dir).or_raise(|| ErrorKind::Storage)?;
        let index = IndexStore::open(&config.index_dir);
        let sources = config.list_urls().or_raise(|| ErrorKind::Config)?;
        Ok(Self::new(Arc::new(transport), Arc::new(store), Arc::new(index))
            .with_sources(sources)
            .with_concurrency(config.network.concurrency))
    }

    pub fn with_sources(mut self, sources: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.sources = sources.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    pub fn index(&self) -> &Arc<IndexStore> {
        &self.index
    }

    /// Fetch every list and descriptor, then merge all parsed records into
    /// the index exactly once.
    ///
    /// List, fetch and parse failures are collected in the returned
    /// [`Refresh`]; only a failure to merge or persist the index is an error.
    #[instrument(skip_all, fields(sources = self.sources.len()))]
    pub async fn refresh_all(&self) -> Result<Refresh> {
        let discovery = discover(self.transport.as_ref(), &self.sources, self.concurrency).await;
        let mut failures = discovery.failures;

        let tasks = discovery
            .descriptors
            .into_iter()
            .enumerate()
            .map(|(position, pdsc)| async move {
                let outcome = self.fetch_descriptor(&pdsc).await;
                (position, pdsc, outcome)
            });
        let mut completed = bounded(tasks, self.concurrency).await;
        // Merge order follows discovery, never completion.
        completed.sort_by_key(|(position, ..)| *position);

        let mut parsed = Vec::new();
        let mut devices = Vec::new();
        let mut aliases = Vec::new();
        for (_, pdsc, outcome) in completed {
            match outcome {
                Ok(descriptor) => {
                    let (pack_devices, pack_aliases) = descriptor.into_records();
                    devices.extend(pack_devices);
                    aliases.extend(pack_aliases);
                    parsed.push(pdsc);
                },
                Err(failure) => {
                    warn!(pack = %pdsc.pack(), stage = %failure.stage, error = ?failure.error, "Skipping pack");
                    failures.push(failure);
                },
            }
        }

        info!(parsed = parsed.len(), failed = failures.len(), "Merging parsed packs");
        let index = self.index.merge(devices, aliases).await.or_raise(|| ErrorKind::Index)?;
        Ok(Refresh {
            packs: ParsedPacks { descriptors: parsed },
            failures,
            devices: index.devices.len(),
            aliases: index.aliases.len(),
        })
    }

    async fn fetch_descriptor(&self, pdsc: &PdscRef) -> std::result::Result<Descriptor, Failure> {
        let pack = pdsc.pack();
        let url = pdsc.descriptor_url();
        let bytes = self
            .transport
            .fetch(&url)
            .await
            .map_err(|e| Failure::pack(Stage::Descriptor, &pack, &url, e))?;
        self.store
            .put(&pack, FileKind::Descriptor, &bytes)
            .await
            .or_raise(|| ErrorKind::Storage)
            .map_err(|e| Failure::pack(Stage::Store, &pack, &url, e))?;
        Descriptor::parse_for(&bytes, &pack)
            .or_raise(|| ErrorKind::Parse(pack.clone()))
            .map_err(|e| Failure::pack(Stage::Parse, &pack, &url, e))
    }

    /// Download the archive of every pack in `parsed` that the store doesn't
    /// already hold. Failures are collected, never fatal.
    #[instrument(skip_all, fields(packs = parsed.len()))]
    pub async fn refresh_archives(&self, parsed: &ParsedPacks) -> ArchiveRefresh {
        let tasks = parsed.descriptors.iter().map(|pdsc| async move {
            let outcome = self.fetch_archive(pdsc).await;
            (pdsc.pack(), outcome)
        });
        let mut report = ArchiveRefresh::default();
        for (pack, outcome) in bounded(tasks, self.concurrency).await {
            match outcome {
                Ok(ArchiveOutcome::Downloaded) => report.downloaded.push(pack),
                Ok(ArchiveOutcome::Present) => report.skipped.push(pack),
                Err(failure) => {
                    warn!(pack = %pack, stage = %failure.stage, error = ?failure.error, "Archive not stored");
                    report.failures.push(failure);
                },
            }
        }
        report.downloaded.sort();
        report.skipped.sort();
        info!(
            downloaded = report.downloaded.len(),
            skipped = report.skipped.len(),
            failed = report.failures.len(),
            "Archive refresh complete"
        );
        report
    }

    async fn fetch_archive(&self, pdsc: &PdscRef) -> std::result::Result<ArchiveOutcome, Failure> {
        let pack = pdsc.pack();
        let url = pdsc.archive_url();
        let present = self
            .store
            .exists(&pack, FileKind::Archive)
            .await
            .or_raise(|| ErrorKind::Storage)
            .map_err(|e| Failure::pack(Stage::Store, &pack, &url, e))?;
        if present {
            debug!(pack = %pack, "Archive already present");
            return Ok(ArchiveOutcome::Present);
        }
        // TODO: Stream the body into the store's staging file instead of
        //       buffering whole archives in memory.
        let bytes = self
            .transport
            .fetch(&url)
            .await
            .map_err(|e| Failure::pack(Stage::Archive, &pack, &url, e))?;
        self.store
            .put(&pack, FileKind::Archive, &bytes)
            .await
            .or_raise(|| ErrorKind::Storage)
            .map_err(|e| Failure::pack(Stage::Store, &pack, &url, e))?;
        Ok(ArchiveOutcome::Downloaded)
    }

    /// [`refresh_all`](Self::refresh_all) followed by
    /// [`refresh_archives`](Self::refresh_archives).
    pub async fn update(&self) -> Result<Update> {
        let refresh = self.refresh_all().await?;
        let archives = self.refresh_archives(&refresh.packs).await;
        Ok(Update { refresh, archives })
    }

    /// Import a pack archive from the local filesystem.
    ///
    /// The pack's identity comes from its embedded descriptor. Both the
    /// archive and the descriptor are stored before the index is merged, so
    /// every indexed device is backed by an archive.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn add_from_local_path(&self, path: &Path) -> Result<PackRef> {
        let bytes = tokio::fs::read(path).await.or_raise(|| ErrorKind::Io(path.to_path_buf()))?;
        let owned = path.to_path_buf();
        let (archive, xml) = tokio::task::spawn_blocking(move || read_local_pack(&owned, bytes))
            .await
            .or_raise(|| ErrorKind::Task)??;
        let descriptor = Descriptor::parse(&xml).or_raise(|| ErrorKind::InvalidArchive(path.to_path_buf()))?;
        let pack = descriptor.pack.clone();

        self.store
            .put(&pack, FileKind::Archive, &archive)
            .await
            .or_raise(|| ErrorKind::Storage)?;
        self.store
            .put(&pack, FileKind::Descriptor, &xml)
            .await
            .or_raise(|| ErrorKind::Storage)?;
        let (devices, aliases) = descriptor.into_records();
        self.index.merge(devices, aliases).await.or_raise(|| ErrorKind::Index)?;
        info!(pack = %pack, "Added local pack");
        Ok(pack)
    }

    /// Remove the index and every stored file. Both are attempted; the first
    /// failure is returned.
    #[instrument(skip_all)]
    pub async fn clear(&self) -> Result<()> {
        let index = self.index.clear().await.or_raise(|| ErrorKind::Index);
        let store = self.store.clear().await.or_raise(|| ErrorKind::Storage);
        index.and(store)
    }
}

/// Returns the whole archive and its embedded descriptor.
fn read_local_pack(path: &Path, bytes: Vec<u8>) -> Result<(Vec<u8>, Vec<u8>)> {
    let invalid = || ErrorKind::InvalidArchive(path.to_path_buf());
    let mut archive = PackArchive::from_bytes(bytes).or_raise(invalid)?;
    let name = archive.find_descriptor().ok_or_raise(invalid)?;
    let descriptor = archive.read_entry(&name).or_raise(invalid)?;
    Ok((archive.into_inner().into_inner(), descriptor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use cmpack_index::error::ErrorKind as IndexErrorKind;
    use rstest::rstest;
    use std::io::{Cursor, Write};
    use std::time::Duration;
    use zip::write::SimpleFileOptions;
    use zip::{CompressionMethod, ZipWriter};

    const BASE: &str = "https://packs.example.com/";

    fn list(entries: &[(&str, &str, &str)]) -> String {
        let entries: String = entries
            .iter()
            .map(|(vendor, name, version)| {
                format!(r#"<pdsc url="{BASE}" vendor="{vendor}" name="{name}" version="{version}"/>"#)
            })
            .collect();
        format!("<index><pindex>{entries}</pindex></index>")
    }

    fn descriptor(vendor: &str, name: &str, version: &str, devices: &[(&str, u64)], boards: &[(&str, &str)]) -> String {
        let devices: String = devices
            .iter()
            .map(|(device, size)| {
                format!(
                    r#"<device Dname="{device}">
                         <memory id="IROM1" start="0x0" size="{size:#x}" startup="1"/>
                         <algorithm name="Flash\{device}.FLM" start="0" size="{size:#x}" default="1"/>
                       </device>"#
                )
            })
            .collect();
        let boards: String = boards
            .iter()
            .map(|(board, device)| format!(r#"<board name="{board}"><mountedDevice Dname="{device}"/></board>"#))
            .collect();
        format!(
            r#"<package><vendor>{vendor}</vendor><name>{name}</name>
                 <releases><release version="{version}"/></releases>
                 <devices><family Dfamily="F"><processor Dcore="Cortex-M4"/>{devices}</family></devices>
                 <boards>{boards}</boards>
               </package>"#
        )
    }

    fn descriptor_url(vendor: &str, name: &str) -> String {
        format!("{BASE}{vendor}.{name}.pdsc")
    }

    fn archive_url(vendor: &str, name: &str, version: &str) -> String {
        format!("{BASE}{vendor}.{name}.{version}.pack")
    }

    fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in entries {
            let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    struct Fixture {
        dir: tempfile::TempDir,
        transport: Arc<MockTransport>,
        updater: Updater,
    }

    fn fixture(transport: MockTransport, sources: &[&str]) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(transport);
        let store = ArchiveStore::new(dir.path().join("data")).unwrap();
        let index = IndexStore::open(dir.path().join("index"));
        let updater = Updater::new(transport.clone(), Arc::new(store), Arc::new(index))
            .with_sources(sources.iter().copied())
            .with_concurrency(4);
        Fixture {
            dir,
            transport,
            updater,
        }
    }

    #[tokio::test]
    async fn test_three_lists_one_unreachable() {
        let transport = MockTransport::new()
            .with("https://a.example.com/index.pidx", list(&[("Keil", "LPC1700_DFP", "2.4.0")]))
            .with("https://c.example.com/index.pidx", list(&[("ARM", "V2M_DFP", "1.0.0")]))
            .with(
                descriptor_url("Keil", "LPC1700_DFP"),
                descriptor("Keil", "LPC1700_DFP", "2.4.0", &[("LPC1768", 0x80000)], &[]),
            )
            .with(
                descriptor_url("ARM", "V2M_DFP"),
                descriptor("ARM", "V2M_DFP", "1.0.0", &[("V2M-MPS2", 0x400000)], &[]),
            );
        let fx = fixture(
            transport,
            &[
                "https://a.example.com/index.pidx",
                "https://b.example.com/index.pidx",
                "https://c.example.com/index.pidx",
            ],
        );

        let refresh = fx.updater.refresh_all().await.unwrap();
        assert_eq!(refresh.list_failures().count(), 1);
        assert_eq!(refresh.failures.len(), 1);
        assert_eq!(refresh.failures[0].url, "https://b.example.com/index.pidx");
        assert_eq!(refresh.packs.len(), 2);
        assert_eq!(refresh.devices, 2);

        let index = fx.updater.index().load().await.unwrap();
        assert!(index.device("LPC1768").is_some());
        assert!(index.device("V2M-MPS2").is_some());
    }

    #[rstest]
    #[case::first_is_slow("Keil.A_DFP.pdsc")]
    #[case::second_is_slow("Keil.B_DFP.pdsc")]
    #[tokio::test]
    async fn test_last_writer_follows_discovery_order(#[case] slow: &str) {
        let a = descriptor("Keil", "A_DFP", "1.0.0", &[("X", 0x1000)], &[]);
        let b = descriptor("Keil", "B_DFP", "1.0.0", &[("X", 0x2000)], &[]);
        let mut transport = MockTransport::new().with(
            "https://list.example.com/index.pidx",
            list(&[("Keil", "A_DFP", "1.0.0"), ("Keil", "B_DFP", "1.0.0")]),
        );
        for (url, body) in [(descriptor_url("Keil", "A_DFP"), a), (descriptor_url("Keil", "B_DFP"), b)] {
            transport = if url.ends_with(slow) {
                transport.with_delay(url, Duration::from_millis(100), body)
            } else {
                transport.with(url, body)
            };
        }
        let fx = fixture(transport, &["https://list.example.com/index.pidx"]);

        fx.updater.refresh_all().await.unwrap();
        let device = fx.updater.index().lookup_device("X").await.unwrap();
        assert_eq!(device.from_pack.pack, "B_DFP");
        assert_eq!(device.memories["IROM1"].size, 0x2000);
    }

    #[tokio::test]
    async fn test_pack_failures_are_collected() {
        let transport = MockTransport::new()
            .with(
                "https://list.example.com/index.pidx",
                list(&[("Keil", "Good_DFP", "1.0.0"), ("Keil", "Gone_DFP", "1.0.0"), ("Keil", "Bad_DFP", "1.0.0")]),
            )
            .with(
                descriptor_url("Keil", "Good_DFP"),
                descriptor("Keil", "Good_DFP", "1.0.0", &[("GOOD", 0x1000)], &[]),
            )
            .with_status(descriptor_url("Keil", "Gone_DFP"), 404)
            .with(descriptor_url("Keil", "Bad_DFP"), "<package><devices>");
        let fx = fixture(transport, &["https://list.example.com/index.pidx"]);

        let refresh = fx.updater.refresh_all().await.unwrap();
        assert_eq!(refresh.packs.len(), 1);
        let mut stages: Vec<_> = refresh.failures.iter().map(|failure| failure.stage).collect();
        stages.sort_by_key(|stage| stage.to_string());
        assert_eq!(stages, vec![Stage::Descriptor, Stage::Parse]);
        let failed: Vec<_> = refresh.failed_packs().into_iter().map(|pack| pack.pack.as_str()).collect();
        assert!(failed.contains(&"Gone_DFP") && failed.contains(&"Bad_DFP"));
        assert!(fx.updater.index().lookup_device("GOOD").await.is_ok());
    }

    #[tokio::test]
    async fn test_refresh_stores_descriptors() {
        let transport = MockTransport::new()
            .with("https://list.example.com/index.pidx", list(&[("Keil", "A_DFP", "1.0.0")]))
            .with(descriptor_url("Keil", "A_DFP"), descriptor("Keil", "A_DFP", "1.0.0", &[("A", 0x1000)], &[]));
        let fx = fixture(transport, &["https://list.example.com/index.pidx"]);
        fx.updater.refresh_all().await.unwrap();
        assert!(fx.dir.path().join("data").join("Keil.A_DFP.pdsc").is_file());
    }

    #[tokio::test]
    async fn test_refresh_archives_downloads_then_skips() {
        let transport = MockTransport::new()
            .with(
                "https://list.example.com/index.pidx",
                list(&[("Keil", "A_DFP", "1.0.0"), ("Keil", "B_DFP", "2.0.0")]),
            )
            .with(descriptor_url("Keil", "A_DFP"), descriptor("Keil", "A_DFP", "1.0.0", &[("A", 0x1000)], &[]))
            .with(descriptor_url("Keil", "B_DFP"), descriptor("Keil", "B_DFP", "2.0.0", &[("B", 0x1000)], &[]))
            .with(archive_url("Keil", "A_DFP", "1.0.0"), build_zip(&[("Keil.A_DFP.pdsc", b"<package/>")]))
            .with_status(archive_url("Keil", "B_DFP", "2.0.0"), 500);
        let fx = fixture(transport, &["https://list.example.com/index.pidx"]);

        let refresh = fx.updater.refresh_all().await.unwrap();
        let first = fx.updater.refresh_archives(&refresh.packs).await;
        assert_eq!(first.downloaded, vec![PackRef::new("Keil", "A_DFP", "1.0.0")]);
        assert_eq!(first.failures.len(), 1);
        assert_eq!(first.failures[0].stage, Stage::Archive);
        assert!(fx.dir.path().join("data/Keil/A_DFP/1.0.0.pack").is_file());

        let requests_before = fx.transport.requests().len();
        let second = fx.updater.refresh_archives(&refresh.packs).await;
        assert!(second.downloaded.is_empty());
        assert_eq!(second.skipped, vec![PackRef::new("Keil", "A_DFP", "1.0.0")]);
        // Only the still-missing archive is requested again.
        assert_eq!(fx.transport.requests().len(), requests_before + 1);
    }

    #[tokio::test]
    async fn test_update_runs_both_phases() {
        let transport = MockTransport::new()
            .with("https://list.example.com/index.pidx", list(&[("Keil", "A_DFP", "1.0.0")]))
            .with(descriptor_url("Keil", "A_DFP"), descriptor("Keil", "A_DFP", "1.0.0", &[("A", 0x1000)], &[]))
            .with(archive_url("Keil", "A_DFP", "1.0.0"), build_zip(&[("Keil.A_DFP.pdsc", b"<package/>")]));
        let fx = fixture(transport, &["https://list.example.com/index.pidx"]);
        let update = fx.updater.update().await.unwrap();
        assert!(update.refresh.is_clean());
        assert_eq!(update.archives.downloaded.len(), 1);
    }

    #[tokio::test]
    async fn test_add_from_local_path() {
        let fx = fixture(MockTransport::new(), &[]);
        let pdsc = descriptor(
            "Keil",
            "LPC1700_DFP",
            "2.4.0",
            &[("LPC1788", 0x80000)],
            &[("LPC1788-32 Developers Kit", "LPC1788")],
        );
        let archive = build_zip(&[
            ("Flash/LPC1788.FLM", b"\x7fELF"),
            ("Keil.LPC1700_DFP.pdsc", pdsc.as_bytes()),
        ]);
        let path = fx.dir.path().join("download.pack");
        std::fs::write(&path, &archive).unwrap();

        let pack = fx.updater.add_from_local_path(&path).await.unwrap();
        assert_eq!(pack, PackRef::new("Keil", "LPC1700_DFP", "2.4.0"));
        assert!(fx.updater.store().exists(&pack, FileKind::Archive).await.unwrap());
        assert!(fx.updater.store().exists(&pack, FileKind::Descriptor).await.unwrap());
        let alias = fx.updater.index().lookup_alias("LPC1788-32 Developers Kit").await.unwrap();
        assert_eq!(alias.mounted_devices, vec!["LPC1788"]);
        assert!(fx.transport.requests().is_empty());
    }

    #[rstest]
    #[case::no_descriptor(build_zip(&[("Flash/algo.FLM", b"\x7fELF")]))]
    #[case::not_a_zip(b"plain text".to_vec())]
    #[tokio::test]
    async fn test_add_from_local_path_rejects_invalid_archives(#[case] contents: Vec<u8>) {
        let fx = fixture(MockTransport::new(), &[]);
        let path = fx.dir.path().join("broken.pack");
        std::fs::write(&path, contents).unwrap();
        let err = fx.updater.add_from_local_path(&path).await.unwrap_err();
        assert_eq!(*err, ErrorKind::InvalidArchive(path));
    }

    #[tokio::test]
    async fn test_clear_removes_everything() {
        let transport = MockTransport::new()
            .with("https://list.example.com/index.pidx", list(&[("Keil", "A_DFP", "1.0.0")]))
            .with(descriptor_url("Keil", "A_DFP"), descriptor("Keil", "A_DFP", "1.0.0", &[("A", 0x1000)], &[]));
        let fx = fixture(transport, &["https://list.example.com/index.pidx"]);
        fx.updater.refresh_all().await.unwrap();

        fx.updater.clear().await.unwrap();
        let err = fx.updater.index().load().await.unwrap_err();
        assert_eq!(*err, IndexErrorKind::Uninitialized);
        assert!(!fx.dir.path().join("data").exists());
    }
}
