//! Walk the configured list documents down to individual descriptors.

use crate::error::{ErrorKind, Result};
use crate::report::Failure;
use crate::transport::Transport;
use crate::window::bounded;
use cmpack_pdsc::{PackIndex, PdscRef};
use exn::ResultExt;
use std::collections::HashSet;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
pub(crate) struct Discovery {
    /// Unique by `(vendor, pack)`, in discovery order.
    pub(crate) descriptors: Vec<PdscRef>,
    pub(crate) failures: Vec<Failure>,
}

/// Fetch every list in `urls` (and the vendor indexes they reference).
///
/// Discovery order is: lists in the order given; within a list, its own
/// descriptor entries, then those of each referenced vendor index in
/// declaration order. The first occurrence of a `(vendor, pack)` wins.
pub(crate) async fn discover(transport: &dyn Transport, urls: &[String], concurrency: usize) -> Discovery {
    let tasks = urls.iter().enumerate().map(|(position, url)| async move {
        (position, fetch_list_tree(transport, url, concurrency).await)
    });
    let mut lists = bounded(tasks, concurrency).await;
    lists.sort_by_key(|(position, _)| *position);

    let mut discovery = Discovery::default();
    let mut seen = HashSet::new();
    for (_, (descriptors, failures)) in lists {
        discovery.failures.extend(failures);
        for pdsc in descriptors {
            if seen.insert((pdsc.vendor.clone(), pdsc.name.clone())) {
                discovery.descriptors.push(pdsc);
            } else {
                debug!(vendor = %pdsc.vendor, pack = %pdsc.name, "Ignoring duplicate pack listing");
            }
        }
    }
    info!(
        packs = discovery.descriptors.len(),
        failed_lists = discovery.failures.len(),
        "Discovered packs"
    );
    discovery
}

async fn fetch_list(transport: &dyn Transport, url: &str) -> Result<PackIndex> {
    let bytes = transport.fetch(url).await?;
    PackIndex::parse(&bytes).or_raise(|| ErrorKind::InvalidList(url.to_string()))
}

async fn fetch_list_tree(transport: &dyn Transport, url: &str, concurrency: usize) -> (Vec<PdscRef>, Vec<Failure>) {
    let index = match fetch_list(transport, url).await {
        Ok(index) => index,
        Err(e) => {
            warn!(url, error = ?e, "Skipping unavailable pack list");
            return (Vec::new(), vec![Failure::list(url, e)]);
        },
    };
    let mut descriptors = index.descriptors;
    let mut failures = Vec::new();

    let tasks = index.vendor_indexes.iter().enumerate().map(|(position, pidx)| async move {
        let url = pidx.index_url();
        let result = fetch_list(transport, &url).await;
        (position, url, result)
    });
    let mut vendors = bounded(tasks, concurrency).await;
    vendors.sort_by_key(|(position, ..)| *position);
    for (_, vendor_url, result) in vendors {
        match result {
            Ok(vendor_index) => descriptors.extend(vendor_index.descriptors),
            Err(e) => {
                warn!(url = %vendor_url, error = ?e, "Skipping unavailable vendor index");
                failures.push(Failure::list(vendor_url, e));
            },
        }
    }
    (descriptors, failures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Stage;
    use crate::transport::MockTransport;
    use std::time::Duration;

    fn pdsc_entry(url: &str, vendor: &str, name: &str, version: &str) -> String {
        format!(r#"<pdsc url="{url}" vendor="{vendor}" name="{name}" version="{version}"/>"#)
    }

    #[tokio::test]
    async fn test_vidx_entries_precede_vendor_indexes() {
        let vidx = format!(
            r#"<index><vindex><pidx vendor="NXP" url="https://nxp.example.com/"/></vindex><pindex>{}</pindex></index>"#,
            pdsc_entry("https://keil.example.com/", "Keil", "LPC1700_DFP", "2.4.0")
        );
        let nxp = format!(
            "<index><pindex>{}</pindex></index>",
            pdsc_entry("https://nxp.example.com/", "NXP", "LPC55S69_DFP", "1.0.0")
        );
        // Vendor index answers first; order must still follow discovery.
        let transport = MockTransport::new()
            .with_delay("https://keil.example.com/index.vidx", Duration::from_millis(20), vidx)
            .with("https://nxp.example.com/NXP.pidx", nxp);
        let discovery = discover(&transport, &["https://keil.example.com/index.vidx".to_string()], 4).await;
        let names: Vec<_> = discovery.descriptors.iter().map(|pdsc| pdsc.name.as_str()).collect();
        assert_eq!(names, vec!["LPC1700_DFP", "LPC55S69_DFP"]);
        assert!(discovery.failures.is_empty());
    }

    #[tokio::test]
    async fn test_first_discovery_wins() {
        let first = format!(
            "<index><pindex>{}</pindex></index>",
            pdsc_entry("https://a.example.com/", "Keil", "LPC1700_DFP", "2.4.0")
        );
        let second = format!(
            "<index><pindex>{}{}</pindex></index>",
            pdsc_entry("https://b.example.com/", "Keil", "LPC1700_DFP", "2.3.0"),
            pdsc_entry("https://b.example.com/", "ARM", "CMSIS", "5.9.0")
        );
        let transport = MockTransport::new()
            .with_delay("https://a.example.com/index.pidx", Duration::from_millis(20), first)
            .with("https://b.example.com/index.pidx", second);
        let urls = vec![
            "https://a.example.com/index.pidx".to_string(),
            "https://b.example.com/index.pidx".to_string(),
        ];
        let discovery = discover(&transport, &urls, 4).await;
        assert_eq!(discovery.descriptors.len(), 2);
        assert_eq!(discovery.descriptors[0].version, "2.4.0");
        assert_eq!(discovery.descriptors[0].url, "https://a.example.com/");
        assert_eq!(discovery.descriptors[1].name, "CMSIS");
    }

    #[tokio::test]
    async fn test_failed_lists_are_recorded() {
        let transport = MockTransport::new()
            .with("https://a.example.com/index.pidx", "<html>")
            .with_status("https://b.example.com/index.pidx", 503);
        let urls = vec![
            "https://a.example.com/index.pidx".to_string(),
            "https://b.example.com/index.pidx".to_string(),
            "https://c.example.com/index.pidx".to_string(),
        ];
        let discovery = discover(&transport, &urls, 2).await;
        assert!(discovery.descriptors.is_empty());
        assert_eq!(discovery.failures.len(), 3);
        assert!(discovery.failures.iter().all(|failure| failure.stage == Stage::List));
        assert!(matches!(&*discovery.failures[0].error, ErrorKind::InvalidList(_)));
        assert!(matches!(&*discovery.failures[1].error, ErrorKind::HttpStatus { status: 503, .. }));
        assert!(matches!(&*discovery.failures[2].error, ErrorKind::Transport(_)));
    }

    #[tokio::test]
    async fn test_failed_vendor_index_keeps_own_entries() {
        let vidx = format!(
            r#"<index><vindex><pidx vendor="Gone" url="https://gone.example.com/"/></vindex><pindex>{}</pindex></index>"#,
            pdsc_entry("https://keil.example.com/", "Keil", "LPC1700_DFP", "2.4.0")
        );
        let transport = MockTransport::new().with("https://keil.example.com/index.vidx", vidx);
        let discovery = discover(&transport, &["https://keil.example.com/index.vidx".to_string()], 1).await;
        assert_eq!(discovery.descriptors.len(), 1);
        assert_eq!(discovery.failures.len(), 1);
        assert_eq!(discovery.failures[0].url, "https://gone.example.com/Gone.pidx");
    }
}
