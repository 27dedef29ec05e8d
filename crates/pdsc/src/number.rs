//! Scalar attribute formats used by descriptor files.

use crate::error::{ErrorKind, Result};

/// Parse an address or size written either as `0x`-prefixed hex or decimal.
pub(crate) fn parse_u64(field: &'static str, value: &str) -> Result<u64> {
    let trimmed = value.trim();
    let parsed = match trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => trimmed.parse::<u64>(),
    };
    parsed.map_err(|_| {
        exn::Exn::from(ErrorKind::InvalidValue {
            field,
            value: value.to_string(),
        })
    })
}

/// Parse a boolean written as `1`/`0` or `true`/`false`.
pub(crate) fn parse_bool(field: &'static str, value: &str) -> Result<bool> {
    match value.trim() {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        _ => exn::bail!(ErrorKind::InvalidValue {
            field,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("0", 0)]
    #[case("1024", 1024)]
    #[case("0x00080000", 0x0008_0000)]
    #[case("0X10000000", 0x1000_0000)]
    #[case(" 0x20 ", 0x20)]
    fn test_parse_u64(#[case] input: &str, #[case] expected: u64) {
        assert_eq!(parse_u64("start", input).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("0x")]
    #[case("12k")]
    #[case("-1")]
    fn test_parse_u64_invalid(#[case] input: &str) {
        let err = parse_u64("size", input).unwrap_err();
        assert_eq!(
            *err,
            ErrorKind::InvalidValue {
                field: "size",
                value: input.to_string()
            }
        );
    }

    #[rstest]
    #[case("1", true)]
    #[case("true", true)]
    #[case("0", false)]
    #[case("false", false)]
    fn test_parse_bool(#[case] input: &str, #[case] expected: bool) {
        assert_eq!(parse_bool("default", input).unwrap(), expected);
    }

    #[test]
    fn test_parse_bool_invalid() {
        assert!(parse_bool("default", "yes").is_err());
    }
}
