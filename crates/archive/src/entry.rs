//! Archive member name matching.
//!
//! Vendor archives are wildly inconsistent about path casing and separators:
//! a PDSC may reference `Flash\LPC_IAP_512.FLM` while the zip stores
//! `Flash/LPC_IAP_512.flm`. Everything that compares member names goes
//! through here.

/// Normalises an archive-relative path as written in a descriptor.
///
/// Backslashes become forward slashes, and leading `./` or `/` segments are
/// stripped (zip member names never start with either).
///
/// # Examples
///
/// ```
/// use cmpack_archive::normalize_entry_path;
/// assert_eq!(normalize_entry_path(r"Flash\LPC_IAP_512.FLM"), "Flash/LPC_IAP_512.FLM");
/// assert_eq!(normalize_entry_path("./Flash/algo.FLM"), "Flash/algo.FLM");
/// ```
pub fn normalize_entry_path(path: &str) -> String {
    let mut normalized = path.replace('\\', "/");
    loop {
        if let Some(rest) = normalized.strip_prefix("./") {
            normalized = rest.to_string();
        } else if let Some(rest) = normalized.strip_prefix('/') {
            normalized = rest.to_string();
        } else {
            break normalized;
        }
    }
}

/// Case-insensitive suffix test, used to locate descriptor files.
pub(crate) fn has_suffix_ignore_case(name: &str, suffix: &str) -> bool {
    name.len() >= suffix.len()
        && name
            .get(name.len() - suffix.len()..)
            .is_some_and(|tail| tail.eq_ignore_ascii_case(suffix))
}
