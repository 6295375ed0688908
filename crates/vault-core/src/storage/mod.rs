//! Durable storage gateway.
//!
//! The vault consumes storage through [`StorageGateway`]; the shipped
//! implementation is SQLite-backed ([`SqliteGateway`]). All rollback
//! mutations go through [`StorageGateway::apply_rollback`], which executes
//! in a single transaction so partial application is never observable.

mod sqlite;

pub use sqlite::SqliteGateway;

use chrono::{DateTime, Utc};

use crate::error::VaultResult;
use crate::types::{RecordData, RecordVersion, RollbackLogEntry, Snapshot};

/// Input for appending a version. The gateway assigns the current time at
/// second precision when `timestamp` is unset.
#[derive(Debug, Clone)]
pub struct NewVersion {
    pub record_id: String,
    pub version: String,
    pub data: RecordData,
    pub previous_version: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// One record's rewrite instruction within a rollback: collapse every row
/// after the cutoff into a single fresh current row with this content.
#[derive(Debug, Clone)]
pub struct RewriteSpec {
    pub record_id: String,
    pub data: RecordData,
    pub version: String,
    pub previous_version: Option<String>,
    pub new_timestamp: DateTime<Utc>,
}

/// Interface to the durable store.
///
/// Owns all durable entities; every cache write elsewhere in the crate is
/// derived from a read through this trait.
pub trait StorageGateway: Send + Sync {
    /// Append a version row. Returns the stored version with its assigned
    /// timestamp. Fails with `MalformedVersionLabel` if the label does not
    /// parse, keeping chain ordering intact at the storage boundary.
    fn append_version(&self, version: NewVersion) -> VaultResult<RecordVersion>;

    /// Latest version for a record by version number, or `None`.
    fn latest_version(&self, record_id: &str) -> VaultResult<Option<RecordVersion>>;

    /// Earliest version for a record, or `None`. Used for defaulting
    /// compare ranges to a record's first known timestamp.
    fn earliest_version(&self, record_id: &str) -> VaultResult<Option<RecordVersion>>;

    /// Every version strictly after `timestamp`, ordered by record id then
    /// version number.
    fn versions_after(&self, timestamp: DateTime<Utc>) -> VaultResult<Vec<RecordVersion>>;

    /// The version current at `timestamp` for one record: latest
    /// `timestamp <= as_of`, ties broken by highest version number.
    fn version_at_or_before(
        &self,
        record_id: &str,
        timestamp: DateTime<Utc>,
    ) -> VaultResult<Option<RecordVersion>>;

    /// The version current at `timestamp` for every record that has one,
    /// computed in a single ordered scan.
    fn resolve_all_at(&self, timestamp: DateTime<Utc>) -> VaultResult<Vec<RecordVersion>>;

    /// Apply rewrite instructions inside one transaction. Returns the
    /// number of records rewritten.
    fn bulk_rewrite(&self, cutoff: DateTime<Utc>, updates: &[RewriteSpec]) -> VaultResult<usize>;

    /// Delete every version of `record_id` after `after_timestamp`.
    /// Returns the number of rows removed.
    fn bulk_delete(&self, record_id: &str, after_timestamp: DateTime<Utc>) -> VaultResult<usize>;

    /// Apply a full rollback atomically: verify the set of versions after
    /// the cutoff still matches `expected_after` (conflict check), then
    /// run all rewrites and deletes and append the audit entry, all inside
    /// one transaction. A mismatch aborts with `Conflict` and leaves the
    /// store untouched.
    fn apply_rollback(
        &self,
        cutoff: DateTime<Utc>,
        rewrites: &[RewriteSpec],
        delete_record_ids: &[String],
        expected_after: &[(String, String)],
        log: &RollbackLogEntry,
    ) -> VaultResult<()>;

    /// Append an audit entry outside a rollback transaction.
    fn append_rollback_log(&self, entry: &RollbackLogEntry) -> VaultResult<RollbackLogEntry>;

    /// Most recent audit entries, newest first.
    fn recent_rollback_logs(&self, limit: usize) -> VaultResult<Vec<RollbackLogEntry>>;

    /// Persist a materialized snapshot.
    fn insert_snapshot(&self, snapshot: &Snapshot) -> VaultResult<()>;

    /// Latest snapshot taken at or before `timestamp`.
    fn latest_snapshot_at_or_before(
        &self,
        timestamp: DateTime<Utc>,
    ) -> VaultResult<Option<Snapshot>>;

    /// Keep the `keep` most recent snapshots, delete the rest. Returns the
    /// number pruned.
    fn prune_snapshots(&self, keep: usize) -> VaultResult<usize>;

    /// Total number of version rows (health/diagnostics).
    fn count_versions(&self) -> VaultResult<usize>;
}
