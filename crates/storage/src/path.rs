//! Path validation for pack identifiers.
//!
//! Vendor, pack and version strings come straight from remote list documents
//! and end up as path components under the store root. Anything that could
//! escape the root, or silently turn into more than one component, is
//! rejected before it reaches the filesystem.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Validates that `value` is usable as exactly one path component.
///
/// # Examples
///
/// ```
/// use cmpack_storage::validate_component;
/// assert!(validate_component("Keil").is_ok());
/// assert!(validate_component("LPC1700_DFP").is_ok());
/// assert!(validate_component("2.4.0").is_ok());
/// assert!(validate_component("..").is_err());
/// assert!(validate_component("a/b").is_err());
/// assert!(validate_component("").is_err());
/// ```
pub fn validate_component(value: &str) -> Result<&str> {
    let invalid = || ErrorKind::InvalidPath(PathBuf::from(value));
    if value.is_empty() || value.contains(['/', '\\', '\0']) {
        exn::bail!(invalid());
    }
    let mut components = Path::new(value).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(value),
        _ => exn::bail!(invalid()),
    }
}

/// Joins validated components into a relative path.
pub(crate) fn join_components<'a>(components: impl IntoIterator<Item = &'a str>) -> Result<PathBuf> {
    let mut path = PathBuf::new();
    for component in components {
        path.push(validate_component(component)?);
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Keil")]
    #[case("LPC1700_DFP")]
    #[case("2.4.0")]
    #[case("1.0.0-rc.1+build")]
    #[case("Keil.STM32F4xx_DFP.pdsc")]
    fn test_valid_components(#[case] value: &str) {
        assert_eq!(validate_component(value).unwrap(), value);
    }

    #[rstest]
    #[case("")]
    #[case(".")]
    #[case("..")]
    #[case("a/b")]
    #[case("../etc")]
    #[case(r"a\b")]
    #[case("/abs")]
    #[case("a\0b")]
    fn test_invalid_components(#[case] value: &str) {
        let err = validate_component(value).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidPath(_)));
    }

    #[test]
    fn test_join_components() {
        assert_eq!(
            join_components(["Keil", "LPC1700_DFP", "2.4.0.pack"]).unwrap(),
            Path::new("Keil/LPC1700_DFP/2.4.0.pack")
        );
        assert!(join_components(["Keil", "..", "x"]).is_err());
    }
}
