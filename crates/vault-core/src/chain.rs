//! Version chain logic.
//!
//! Pure derivation of the next version label and previous-version link for
//! a record given its latest stored version. Labels are `v1`, `v2`, ...;
//! `previous_version` forms an unbroken linked chain back to `v1`.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{VaultError, VaultResult};
use crate::types::RecordVersion;

static LABEL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^v([0-9]+)$").unwrap());

/// Parse the numeric suffix of a `v<integer>` label.
///
/// A label that does not match the pattern is chain corruption; coercing it
/// would scramble version ordering, so it is a hard error.
pub fn parse_label(label: &str) -> VaultResult<u64> {
    let caps = LABEL_RE
        .captures(label)
        .ok_or_else(|| VaultError::MalformedVersionLabel {
            label: label.to_string(),
        })?;
    caps[1]
        .parse::<u64>()
        .map_err(|_| VaultError::MalformedVersionLabel {
            label: label.to_string(),
        })
}

/// Derive the next version label and previous-version link.
///
/// `None` means the record has no history yet: the result is `("v1", None)`.
/// Side-effect free.
pub fn next_version(latest: Option<&RecordVersion>) -> VaultResult<(String, Option<String>)> {
    match latest {
        None => Ok(("v1".to_string(), None)),
        Some(prev) => {
            let n = parse_label(&prev.version)?;
            Ok((format!("v{}", n + 1), Some(prev.version.clone())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RecordData;
    use chrono::Utc;

    fn version(label: &str) -> RecordVersion {
        RecordVersion::new(
            "rec-1",
            label,
            RecordData::from_raw("{}"),
            Utc::now(),
            None,
        )
    }

    #[test]
    fn test_first_version() {
        let (label, prev) = next_version(None).unwrap();
        assert_eq!(label, "v1");
        assert_eq!(prev, None);
    }

    #[test]
    fn test_increment() {
        let (label, prev) = next_version(Some(&version("v1"))).unwrap();
        assert_eq!(label, "v2");
        assert_eq!(prev.as_deref(), Some("v1"));
    }

    #[test]
    fn test_multi_digit_increment() {
        let (label, prev) = next_version(Some(&version("v41"))).unwrap();
        assert_eq!(label, "v42");
        assert_eq!(prev.as_deref(), Some("v41"));
    }

    #[test]
    fn test_malformed_label_rejected() {
        for bad in ["version-2", "v", "2", "v2.1", "V3", "v-1", "v2 "] {
            let err = next_version(Some(&version(bad))).unwrap_err();
            assert!(
                matches!(err, VaultError::MalformedVersionLabel { .. }),
                "label {bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_parse_label() {
        assert_eq!(parse_label("v1").unwrap(), 1);
        assert_eq!(parse_label("v1000").unwrap(), 1000);
        assert!(parse_label("x7").is_err());
    }
}
