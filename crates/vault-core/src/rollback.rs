//! Rollback engine.
//!
//! Rolls the record set back to a target timestamp: records with history
//! at or before the cutoff are collapsed to a fresh current row carrying
//! the as-of version's content (overwrite-forward policy: the current row
//! keeps the latest real timestamp while its content reflects history, so
//! a later rollback can still roll forward), records that only exist after
//! the cutoff are removed entirely. Rewrites, deletes, and the audit entry
//! commit in one storage transaction; a version created for an affected
//! record between scan and apply aborts the transaction with a conflict,
//! which is retried within a bounded budget.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

use crate::cache::CacheCoordinator;
use crate::error::VaultResult;
use crate::storage::{RewriteSpec, StorageGateway};
use crate::time::{now_second, truncate_to_second};
use crate::types::{RecordVersion, RollbackLogEntry};

/// Engine phases. `Failed` is terminal and reachable from any
/// non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackState {
    Idle,
    Scanning,
    Computing,
    Applying,
    LoggingAudit,
    Committed,
    Failed,
}

/// Outcome of a rollback request.
#[derive(Debug, Clone)]
pub struct RollbackSummary {
    pub message: String,
    pub target_timestamp: DateTime<Utc>,
    pub affected_count: u64,
    /// Audit entry, absent for no-op rollbacks.
    pub log_entry: Option<RollbackLogEntry>,
}

pub struct RollbackEngine {
    storage: Arc<dyn StorageGateway>,
    cache: CacheCoordinator,
    /// Serializes rollbacks against each other and against version
    /// creation. Shared with the create path.
    write_lock: Arc<Mutex<()>>,
    retry_budget: usize,
    state: Mutex<RollbackState>,
}

impl RollbackEngine {
    pub fn new(
        storage: Arc<dyn StorageGateway>,
        cache: CacheCoordinator,
        write_lock: Arc<Mutex<()>>,
        retry_budget: usize,
    ) -> Self {
        Self {
            storage,
            cache,
            write_lock,
            retry_budget,
            state: Mutex::new(RollbackState::Idle),
        }
    }

    /// Last observed engine phase, for diagnostics.
    pub fn state(&self) -> RollbackState {
        *self.state.lock().unwrap()
    }

    fn transition(&self, state: RollbackState) {
        debug!(?state, "rollback engine transition");
        *self.state.lock().unwrap() = state;
    }

    /// Roll the record set back to `target`. Runs to full commit or full
    /// rollback of its own transaction; partial state is never observable.
    pub fn rollback(&self, target: DateTime<Utc>) -> VaultResult<RollbackSummary> {
        let _guard = self.write_lock.lock().unwrap();
        let target = truncate_to_second(target);

        let mut attempts = 0;
        loop {
            match self.try_rollback(target) {
                Ok(summary) => return Ok(summary),
                Err(e) if e.is_retryable() && attempts < self.retry_budget => {
                    attempts += 1;
                    warn!(
                        attempt = attempts,
                        error = %e,
                        "rollback conflicted, rescanning"
                    );
                }
                Err(e) => {
                    self.transition(RollbackState::Failed);
                    error!(error = %e, "rollback failed");
                    return Err(e);
                }
            }
        }
    }

    fn try_rollback(&self, target: DateTime<Utc>) -> VaultResult<RollbackSummary> {
        self.transition(RollbackState::Scanning);
        let affected = self.storage.versions_after(target)?;
        if affected.is_empty() {
            self.transition(RollbackState::Committed);
            return Ok(RollbackSummary {
                message: "No changes to rollback".to_string(),
                target_timestamp: target,
                affected_count: 0,
                log_entry: None,
            });
        }

        self.transition(RollbackState::Computing);
        let executed_at = now_second();
        let expected_after: Vec<(String, String)> = affected
            .iter()
            .map(|v| (v.record_id.clone(), v.version.clone()))
            .collect();

        let by_record: BTreeSet<String> =
            affected.iter().map(|v| v.record_id.clone()).collect();

        let mut rewrites: Vec<RewriteSpec> = Vec::new();
        let mut deletes: Vec<String> = Vec::new();
        for record_id in &by_record {
            match self.storage.version_at_or_before(record_id, target)? {
                Some(as_of) => rewrites.push(rewrite_spec(&as_of, executed_at)),
                None => deletes.push(record_id.clone()),
            }
        }

        let affected_ids: Vec<String> = by_record.into_iter().collect();
        let log = RollbackLogEntry::new(executed_at, target, affected_ids.clone());

        self.transition(RollbackState::Applying);
        self.storage
            .apply_rollback(target, &rewrites, &deletes, &expected_after, &log)?;
        // Audit entry committed inside the same transaction.
        self.transition(RollbackState::LoggingAudit);

        for record_id in &affected_ids {
            self.cache.invalidate_record(record_id);
        }
        // Every as-of query past the cutoff changed meaning.
        self.cache.invalidate_all();

        self.transition(RollbackState::Committed);
        info!(
            target = %target,
            affected = affected_ids.len(),
            "rollback committed"
        );

        Ok(RollbackSummary {
            message: format!("Successfully rolled back to {}", target.to_rfc3339()),
            target_timestamp: target,
            affected_count: log.affected_count,
            log_entry: Some(log),
        })
    }
}

/// Rewrite instruction for a record surviving the cutoff: as-of content,
/// fresh execution timestamp.
fn rewrite_spec(as_of: &RecordVersion, executed_at: DateTime<Utc>) -> RewriteSpec {
    RewriteSpec {
        record_id: as_of.record_id.clone(),
        data: as_of.data.clone(),
        version: as_of.version.clone(),
        previous_version: as_of.previous_version.clone(),
        new_timestamp: executed_at,
    }
}
