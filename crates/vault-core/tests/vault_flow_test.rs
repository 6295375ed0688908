//! End-to-end flow: create versions, compare across time, roll back,
//! and keep writing against the rewritten chain.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use vault_core::{
    CompareChanges, InMemoryCache, NewVersion, RecordData, SqliteGateway, StorageGateway, Vault,
    VaultConfig, VaultError,
};

fn append_at(
    storage: &SqliteGateway,
    record_id: &str,
    label: &str,
    data: &str,
    prev: Option<&str>,
    ts: DateTime<Utc>,
) {
    storage
        .append_version(NewVersion {
            record_id: record_id.to_string(),
            version: label.to_string(),
            data: RecordData::from_raw(data),
            previous_version: prev.map(String::from),
            timestamp: Some(ts),
        })
        .unwrap();
}

#[test]
fn test_create_compare_rollback_flow() {
    let storage = Arc::new(SqliteGateway::in_memory().unwrap());
    let vault = Vault::with_parts(
        storage.clone(),
        Arc::new(InMemoryCache::new()),
        &VaultConfig::default(),
    );

    // Seed history for record "x": {a:1} at t1, {a:2} at t2, {a:3} at t3.
    let now = Utc::now();
    let t1 = now - Duration::hours(3);
    let t2 = now - Duration::hours(2);
    let t3 = now - Duration::hours(1);
    append_at(&storage, "x", "v1", r#"{"a":1}"#, None, t1);
    append_at(&storage, "x", "v2", r#"{"a":2}"#, Some("v1"), t2);
    append_at(&storage, "x", "v3", r#"{"a":3}"#, Some("v2"), t3);

    // Compare across the whole range: only "a" changed, 1 -> 3.
    let diff = vault.compare("x", Some(t1), Some(t3)).unwrap();
    match diff.changes {
        CompareChanges::Fields(fields) => {
            assert_eq!(fields.len(), 1);
            assert_eq!(fields["a"].from, serde_json::json!(1));
            assert_eq!(fields["a"].to, serde_json::json!(3));
        }
        CompareChanges::Raw { .. } => panic!("expected field diff"),
    }

    // Roll back to t2: current state becomes v2's content.
    let summary = vault.rollback(t2).unwrap();
    assert_eq!(summary.affected_count, 1);

    let at_t3 = vault.query_record("x", t3).unwrap();
    assert_eq!(at_t3.version, "v2");
    assert_eq!(at_t3.data, RecordData::from_raw(r#"{"a":2}"#));

    // The chain continues from the rewritten current row.
    let next = vault.create_version("x", r#"{"a":4}"#).unwrap();
    assert_eq!(next.version, "v3");
    assert_eq!(next.previous_version.as_deref(), Some("v2"));

    // One audit entry so far, naming "x".
    let history = vault.rollback_history(10).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].affected_record_ids, vec!["x".to_string()]);
    assert_eq!(history[0].affected_count, 1);
}

#[test]
fn test_rollback_before_first_version_removes_record() {
    let storage = Arc::new(SqliteGateway::in_memory().unwrap());
    let vault = Vault::with_parts(
        storage.clone(),
        Arc::new(InMemoryCache::new()),
        &VaultConfig::default(),
    );

    let now = Utc::now();
    append_at(&storage, "x", "v1", r#"{"a":1}"#, None, now - Duration::hours(1));

    let target = now - Duration::hours(2);
    let summary = vault.rollback(target).unwrap();
    assert_eq!(summary.affected_count, 1);

    // Fully removed: any resolve is NotFound.
    let err = vault.query_record("x", now + Duration::hours(1)).unwrap_err();
    assert!(matches!(err, VaultError::NotFound { .. }));

    // Rolling back again is a no-op and leaves the audit log alone.
    let again = vault.rollback(target).unwrap();
    assert_eq!(again.affected_count, 0);
    assert!(again.log_entry.is_none());
    assert_eq!(vault.rollback_history(10).unwrap().len(), 1);
}

#[test]
fn test_bulk_query_as_of() {
    let storage = Arc::new(SqliteGateway::in_memory().unwrap());
    let vault = Vault::with_parts(
        storage.clone(),
        Arc::new(InMemoryCache::new()),
        &VaultConfig::default(),
    );

    let now = Utc::now();
    append_at(&storage, "a", "v1", r#"{"n":1}"#, None, now - Duration::hours(3));
    append_at(
        &storage,
        "a",
        "v2",
        r#"{"n":2}"#,
        Some("v1"),
        now - Duration::hours(1),
    );
    append_at(&storage, "b", "v1", r#"{"m":1}"#, None, now - Duration::hours(2));

    let as_of = now - Duration::hours(2);
    let listing = vault.query_all(as_of).unwrap();
    assert_eq!(listing.len(), 2);
    assert_eq!(listing[0].record_id, "a");
    assert_eq!(listing[0].version, "v1");
    assert_eq!(listing[1].record_id, "b");

    // Identical whether served from cache or storage.
    let cached = vault.query_all(as_of).unwrap();
    assert_eq!(cached.len(), listing.len());
    assert_eq!(cached[0].version, listing[0].version);
}
