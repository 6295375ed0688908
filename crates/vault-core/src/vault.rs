//! The vault facade.
//!
//! Wires the version chain, resolver, cache coordinator, compare engine,
//! and rollback engine over one storage gateway and one cache backend,
//! both injected capabilities with explicit lifecycle (constructed at
//! process start, dropped at shutdown). This is the API the server crate
//! consumes.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use tracing::info;

use crate::cache::{
    compare_key, query_key, resolve_key, CacheBackend, CacheCoordinator, InMemoryCache,
};
use crate::chain;
use crate::compare::{CompareEngine, CompareResult};
use crate::config::VaultConfig;
use crate::error::VaultResult;
use crate::resolver::PointInTimeResolver;
use crate::rollback::{RollbackEngine, RollbackSummary};
use crate::snapshot::SnapshotManager;
use crate::storage::{NewVersion, SqliteGateway, StorageGateway};
use crate::types::{RecordData, RecordVersion, RollbackLogEntry, Snapshot};

pub struct Vault {
    storage: Arc<dyn StorageGateway>,
    cache: CacheCoordinator,
    resolver: PointInTimeResolver,
    compare: CompareEngine,
    rollback: RollbackEngine,
    snapshots: SnapshotManager,
    /// Serializes version creation against rollbacks (shared with the
    /// rollback engine).
    write_lock: Arc<Mutex<()>>,
}

impl Vault {
    /// Open a vault per configuration: SQLite storage at the configured
    /// path, in-process cache backend.
    pub fn open(config: &VaultConfig) -> VaultResult<Self> {
        if let Some(parent) = config.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let storage = Arc::new(SqliteGateway::open(&config.db_path)?);
        info!(path = %config.db_path.display(), "opened vault storage");
        Ok(Self::with_parts(storage, Arc::new(InMemoryCache::new()), config))
    }

    /// Build from injected storage and cache capabilities.
    pub fn with_parts(
        storage: Arc<dyn StorageGateway>,
        cache_backend: Arc<dyn CacheBackend>,
        config: &VaultConfig,
    ) -> Self {
        let cache = CacheCoordinator::new(cache_backend, config.cache_ttl_seconds);
        let write_lock = Arc::new(Mutex::new(()));
        Self {
            resolver: PointInTimeResolver::new(storage.clone()),
            compare: CompareEngine::new(storage.clone()),
            rollback: RollbackEngine::new(
                storage.clone(),
                cache.clone(),
                write_lock.clone(),
                config.rollback_retry_budget,
            ),
            snapshots: SnapshotManager::new(storage.clone(), config.snapshot_retention),
            storage,
            cache,
            write_lock,
        }
    }

    /// In-memory vault (for testing).
    pub fn in_memory() -> VaultResult<Self> {
        let storage = Arc::new(SqliteGateway::in_memory()?);
        Ok(Self::with_parts(
            storage,
            Arc::new(InMemoryCache::new()),
            &VaultConfig::default(),
        ))
    }

    /// Append the next version of a record. Cache entries embedding the
    /// record are invalidated before this returns.
    pub fn create_version(&self, record_id: &str, raw_data: &str) -> VaultResult<RecordVersion> {
        let stored = {
            let _guard = self.write_lock.lock().unwrap();
            let latest = self.storage.latest_version(record_id)?;
            let (version, previous_version) = chain::next_version(latest.as_ref())?;
            self.storage.append_version(NewVersion {
                record_id: record_id.to_string(),
                version,
                data: RecordData::from_raw(raw_data),
                previous_version,
                timestamp: None,
            })?
        };
        self.cache.invalidate_record(record_id);
        info!(record_id, version = %stored.version, "created record version");
        Ok(stored)
    }

    /// Resolve one record as of a timestamp, through the cache.
    pub fn query_record(
        &self,
        record_id: &str,
        as_of: DateTime<Utc>,
    ) -> VaultResult<RecordVersion> {
        let key = resolve_key(record_id, as_of);
        if let Some(hit) = self.cache.get_json::<RecordVersion>(&key) {
            return Ok(hit);
        }
        let resolved = self.resolver.resolve(record_id, as_of)?;
        self.cache.put_json(&key, Some(record_id), &resolved);
        Ok(resolved)
    }

    /// Resolve every record as of a timestamp, through the cache.
    pub fn query_all(&self, as_of: DateTime<Utc>) -> VaultResult<Vec<RecordVersion>> {
        let key = query_key(as_of);
        if let Some(hit) = self.cache.get_json::<Vec<RecordVersion>>(&key) {
            return Ok(hit);
        }
        let resolved = self.resolver.resolve_all(as_of)?;
        self.cache.put_json(&key, None, &resolved);
        Ok(resolved)
    }

    /// Roll the record set back to a target timestamp.
    pub fn rollback(&self, target: DateTime<Utc>) -> VaultResult<RollbackSummary> {
        self.rollback.rollback(target)
    }

    /// Most recent rollback audit entries, newest first.
    pub fn rollback_history(&self, limit: usize) -> VaultResult<Vec<RollbackLogEntry>> {
        self.storage.recent_rollback_logs(limit)
    }

    /// Compare a record between two points in time, through the cache.
    /// Omitted endpoints default to the record's first/last known
    /// timestamps; those results are not cached since their endpoints
    /// move with every write.
    pub fn compare(
        &self,
        record_id: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> VaultResult<CompareResult> {
        let key = match (start, end) {
            (Some(s), Some(e)) => Some(compare_key(record_id, s, e)),
            _ => None,
        };
        if let Some(key) = &key {
            if let Some(hit) = self.cache.get_json::<CompareResult>(key) {
                return Ok(hit);
            }
        }
        let result = self.compare.compare(record_id, start, end)?;
        if let Some(key) = &key {
            self.cache.put_json(key, Some(record_id), &result);
        }
        Ok(result)
    }

    /// Materialize a snapshot of the full record set as of now.
    pub fn take_snapshot(&self) -> VaultResult<Snapshot> {
        self.snapshots.take()
    }

    /// Number of stored version rows (diagnostics).
    pub fn version_count(&self) -> VaultResult<usize> {
        self.storage.count_versions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VaultError;
    use crate::time::now_second;
    use serde_json::json;

    #[test]
    fn test_version_labels_form_unbroken_chain() {
        let vault = Vault::in_memory().unwrap();

        for i in 1..=5 {
            let stored = vault
                .create_version("rec-1", &format!(r#"{{"n":{i}}}"#))
                .unwrap();
            assert_eq!(stored.version, format!("v{i}"));
            if i == 1 {
                assert!(stored.previous_version.is_none());
            } else {
                assert_eq!(stored.previous_version, Some(format!("v{}", i - 1)));
            }
        }
    }

    #[test]
    fn test_query_served_identically_from_cache_and_storage() {
        let vault = Vault::in_memory().unwrap();
        vault.create_version("rec-1", r#"{"a":1}"#).unwrap();

        let as_of = now_second();
        let from_storage = vault.query_record("rec-1", as_of).unwrap();
        let from_cache = vault.query_record("rec-1", as_of).unwrap();
        assert_eq!(from_storage.version, from_cache.version);
        assert_eq!(from_storage.data, from_cache.data);
        assert_eq!(from_storage.timestamp, from_cache.timestamp);
    }

    #[test]
    fn test_create_invalidates_cached_reads() {
        let vault = Vault::in_memory().unwrap();
        vault.create_version("rec-1", r#"{"a":1}"#).unwrap();

        // Prime the cache with a bulk and a single-record read.
        let as_of = now_second() + chrono::Duration::hours(1);
        vault.query_record("rec-1", as_of).unwrap();
        vault.query_all(as_of).unwrap();

        vault.create_version("rec-1", r#"{"a":2}"#).unwrap();

        // The previously cached entry must not be served.
        let fresh = vault.query_record("rec-1", as_of).unwrap();
        assert_eq!(fresh.version, "v2");
        let all = vault.query_all(as_of).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].version, "v2");
    }

    #[test]
    fn test_query_unknown_record_is_not_found() {
        let vault = Vault::in_memory().unwrap();
        let err = vault.query_record("ghost", now_second()).unwrap_err();
        assert!(matches!(err, VaultError::NotFound { .. }));
    }

    #[test]
    fn test_compare_through_facade() {
        let vault = Vault::in_memory().unwrap();
        vault.create_version("rec-1", r#"{"a":1}"#).unwrap();
        vault.create_version("rec-1", r#"{"a":3}"#).unwrap();

        let result = vault.compare("rec-1", None, None).unwrap();
        assert_eq!(result.start, json!({"a":1}));
        assert_eq!(result.end, json!({"a":3}));
    }

    #[test]
    fn test_rollback_history_through_facade() {
        let vault = Vault::in_memory().unwrap();
        vault.create_version("rec-1", r#"{"a":1}"#).unwrap();

        // Rollback to before the record existed removes it and logs one
        // audit entry.
        let target = now_second() - chrono::Duration::hours(1);
        let summary = vault.rollback(target).unwrap();
        assert_eq!(summary.affected_count, 1);

        let history = vault.rollback_history(10).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].affected_record_ids, vec!["rec-1".to_string()]);
        assert!(vault.query_record("rec-1", now_second()).is_err());
    }

    #[test]
    fn test_snapshot_through_facade() {
        let vault = Vault::in_memory().unwrap();
        vault.create_version("a", r#"{"x":1}"#).unwrap();
        vault.create_version("b", r#"{"y":1}"#).unwrap();

        let snapshot = vault.take_snapshot().unwrap();
        assert_eq!(snapshot.records.len(), 2);
    }
}
