//! Timestamp parsing and truncation.
//!
//! The vault stores and compares timestamps at one-second resolution.
//! Natural-language parsing ("yesterday at 4 PM") is an external
//! collaborator; this module is the pure `text -> absolute timestamp`
//! function the rest of the crate consumes.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::error::{VaultError, VaultResult};

/// Truncate a timestamp to whole-second resolution.
pub fn truncate_to_second(ts: DateTime<Utc>) -> DateTime<Utc> {
    Utc.timestamp_opt(ts.timestamp(), 0).single().unwrap_or(ts)
}

/// Current time at second resolution.
pub fn now_second() -> DateTime<Utc> {
    truncate_to_second(Utc::now())
}

/// Parse a timestamp string.
///
/// Accepts RFC 3339 (`2024-05-01T12:30:00Z`, with or without offset) and
/// the common `YYYY-MM-DD [HH:MM[:SS]]` forms, interpreted as UTC. The
/// result is truncated to whole seconds.
pub fn parse_timestamp(input: &str) -> VaultResult<DateTime<Utc>> {
    let input = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(truncate_to_second(dt.with_timezone(&Utc)));
    }

    const FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];
    for fmt in FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, fmt) {
            return Ok(truncate_to_second(Utc.from_utc_datetime(&naive)));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        let naive = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| VaultError::parse_timestamp(format!("invalid date: {input}")))?;
        return Ok(Utc.from_utc_datetime(&naive));
    }

    Err(VaultError::parse_timestamp(format!(
        "unrecognized timestamp: {input}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_parse_rfc3339() {
        let ts = parse_timestamp("2024-05-01T12:30:45Z").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-05-01T12:30:45+00:00");
    }

    #[test]
    fn test_parse_rfc3339_with_offset() {
        let ts = parse_timestamp("2024-05-01T12:30:45+02:00").unwrap();
        assert_eq!(ts.hour(), 10);
    }

    #[test]
    fn test_parse_space_separated() {
        let ts = parse_timestamp("2024-05-01 12:30:45").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-05-01T12:30:45+00:00");
    }

    #[test]
    fn test_parse_date_only() {
        let ts = parse_timestamp("2024-05-01").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-05-01T00:00:00+00:00");
    }

    #[test]
    fn test_parse_truncates_subseconds() {
        let ts = parse_timestamp("2024-05-01T12:30:45.789Z").unwrap();
        assert_eq!(ts.timestamp_subsec_millis(), 0);
        assert_eq!(ts.second(), 45);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_timestamp("yesterday at noon").is_err());
        assert!(parse_timestamp("").is_err());
    }
}
