//! Snapshot materialization.
//!
//! A snapshot is the resolved state of every record as of a timestamp,
//! persisted to bound point-in-time resolution cost. Correctness never
//! depends on snapshots; the version chain reconstructs any point in
//! time, so pruning is always safe.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;

use crate::error::VaultResult;
use crate::resolver::PointInTimeResolver;
use crate::storage::StorageGateway;
use crate::time::now_second;
use crate::types::Snapshot;

pub struct SnapshotManager {
    storage: Arc<dyn StorageGateway>,
    resolver: PointInTimeResolver,
    /// Number of most recent snapshots retained after each take.
    retention: usize,
}

impl SnapshotManager {
    pub fn new(storage: Arc<dyn StorageGateway>, retention: usize) -> Self {
        Self {
            resolver: PointInTimeResolver::new(storage.clone()),
            storage,
            retention,
        }
    }

    /// Materialize and persist a snapshot as of now, then prune beyond
    /// the retention count.
    pub fn take(&self) -> VaultResult<Snapshot> {
        self.take_at(now_second())
    }

    /// Materialize and persist a snapshot as of an arbitrary timestamp.
    pub fn take_at(&self, as_of: DateTime<Utc>) -> VaultResult<Snapshot> {
        let records = self.resolver.resolve_all(as_of)?;
        let snapshot = Snapshot::new(as_of, records);
        self.storage.insert_snapshot(&snapshot)?;
        let pruned = self.storage.prune_snapshots(self.retention)?;
        info!(
            as_of = %as_of,
            records = snapshot.records.len(),
            pruned,
            "snapshot taken"
        );
        Ok(snapshot)
    }

    /// Latest persisted snapshot at or before a timestamp.
    pub fn latest_at(&self, as_of: DateTime<Utc>) -> VaultResult<Option<Snapshot>> {
        self.storage.latest_snapshot_at_or_before(as_of)
    }
}
