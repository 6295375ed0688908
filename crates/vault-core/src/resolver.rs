//! Point-in-time resolution.
//!
//! Answers "what was record X at time T": the version with the latest
//! timestamp at or before T, ties broken by highest version number
//! (timestamps are second-truncated, so two versions can share a second).
//! Pure reads over the storage gateway; never mutates state.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::error::{VaultError, VaultResult};
use crate::storage::StorageGateway;
use crate::time::truncate_to_second;
use crate::types::RecordVersion;

pub struct PointInTimeResolver {
    storage: Arc<dyn StorageGateway>,
}

impl PointInTimeResolver {
    pub fn new(storage: Arc<dyn StorageGateway>) -> Self {
        Self { storage }
    }

    /// Resolve one record as of `as_of`. `NotFound` if no version exists
    /// at or before that time.
    pub fn resolve(&self, record_id: &str, as_of: DateTime<Utc>) -> VaultResult<RecordVersion> {
        self.storage
            .version_at_or_before(record_id, truncate_to_second(as_of))?
            .ok_or_else(|| VaultError::record_not_found(record_id))
    }

    /// Resolve every record as of `as_of`, omitting records with no
    /// qualifying version. One ordered scan in the gateway, not a query
    /// per record.
    pub fn resolve_all(&self, as_of: DateTime<Utc>) -> VaultResult<Vec<RecordVersion>> {
        self.storage.resolve_all_at(truncate_to_second(as_of))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{NewVersion, SqliteGateway};
    use crate::time::now_second;
    use crate::types::RecordData;
    use chrono::Duration;

    fn setup() -> (Arc<SqliteGateway>, PointInTimeResolver, DateTime<Utc>) {
        let storage = Arc::new(SqliteGateway::in_memory().unwrap());
        let resolver = PointInTimeResolver::new(storage.clone());
        let t0 = now_second() - Duration::hours(4);
        (storage, resolver, t0)
    }

    fn append(storage: &SqliteGateway, label: &str, data: &str, ts: DateTime<Utc>) {
        let prev = (label != "v1").then(|| {
            let n: u64 = label[1..].parse().unwrap();
            format!("v{}", n - 1)
        });
        storage
            .append_version(NewVersion {
                record_id: "rec-1".to_string(),
                version: label.to_string(),
                data: RecordData::from_raw(data),
                previous_version: prev,
                timestamp: Some(ts),
            })
            .unwrap();
    }

    #[test]
    fn test_resolve_before_first_version_is_not_found() {
        let (storage, resolver, t0) = setup();
        append(&storage, "v1", r#"{"a":1}"#, t0);

        let err = resolver
            .resolve("rec-1", t0 - Duration::seconds(1))
            .unwrap_err();
        assert!(matches!(err, VaultError::NotFound { .. }));
    }

    #[test]
    fn test_resolve_at_and_after_latest() {
        let (storage, resolver, t0) = setup();
        append(&storage, "v1", r#"{"a":1}"#, t0);
        append(&storage, "v2", r#"{"a":2}"#, t0 + Duration::hours(1));

        // Exactly at a version's timestamp resolves to it.
        assert_eq!(resolver.resolve("rec-1", t0).unwrap().version, "v1");
        // Between versions resolves to the earlier one.
        assert_eq!(
            resolver
                .resolve("rec-1", t0 + Duration::minutes(30))
                .unwrap()
                .version,
            "v1"
        );
        // At or past the latest resolves to the latest.
        assert_eq!(
            resolver
                .resolve("rec-1", t0 + Duration::hours(9))
                .unwrap()
                .version,
            "v2"
        );
    }

    #[test]
    fn test_resolve_unknown_record() {
        let (_storage, resolver, _t0) = setup();
        let err = resolver.resolve("ghost", now_second()).unwrap_err();
        assert!(matches!(
            err,
            VaultError::NotFound {
                record_id: Some(ref id),
                ..
            } if id == "ghost"
        ));
    }

    #[test]
    fn test_resolve_all_omits_unqualified_records() {
        let (storage, resolver, t0) = setup();
        append(&storage, "v1", r#"{"a":1}"#, t0);
        storage
            .append_version(NewVersion {
                record_id: "rec-2".to_string(),
                version: "v1".to_string(),
                data: RecordData::from_raw(r#"{"b":1}"#),
                previous_version: None,
                timestamp: Some(t0 + Duration::hours(2)),
            })
            .unwrap();

        let resolved = resolver.resolve_all(t0 + Duration::hours(1)).unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].record_id, "rec-1");
    }
}
