//! Version comparison.
//!
//! Diffs a record's state between two points in time. Structured payloads
//! get a field-level diff over the union of keys; a key present on only
//! one side compares against `null` (the "missing" vs "null" distinction
//! is deliberately collapsed). If either payload is opaque text the result
//! degrades to raw from/to values instead of erroring.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{VaultError, VaultResult};
use crate::resolver::PointInTimeResolver;
use crate::storage::StorageGateway;
use crate::types::RecordData;

/// One field's before/after pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub from: Value,
    pub to: Value,
}

/// Changes section of a compare result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CompareChanges {
    /// Field-level diff for structured payloads.
    Fields(BTreeMap<String, FieldChange>),
    /// Raw fallback when either payload is opaque text.
    Raw { from: Value, to: Value },
}

/// Result of comparing a record between two resolved versions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareResult {
    pub start: Value,
    pub end: Value,
    pub changes: CompareChanges,
}

pub struct CompareEngine {
    storage: Arc<dyn StorageGateway>,
    resolver: PointInTimeResolver,
}

impl CompareEngine {
    pub fn new(storage: Arc<dyn StorageGateway>) -> Self {
        let resolver = PointInTimeResolver::new(storage.clone());
        Self { storage, resolver }
    }

    /// Compare a record between `start` and `end`. Omitted endpoints
    /// default to the record's first and last known timestamps; `NotFound`
    /// if the record has no versions at all, or if either endpoint has no
    /// qualifying version.
    pub fn compare(
        &self,
        record_id: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> VaultResult<CompareResult> {
        let start = match start {
            Some(ts) => ts,
            None => {
                self.storage
                    .earliest_version(record_id)?
                    .ok_or_else(|| VaultError::record_not_found(record_id))?
                    .timestamp
            }
        };
        let end = match end {
            Some(ts) => ts,
            None => {
                self.storage
                    .latest_version(record_id)?
                    .ok_or_else(|| VaultError::record_not_found(record_id))?
                    .timestamp
            }
        };

        let start_version = self.resolver.resolve(record_id, start)?;
        let end_version = self.resolver.resolve(record_id, end)?;

        let changes = match (&start_version.data, &end_version.data) {
            (RecordData::Structured(a), RecordData::Structured(b)) => {
                CompareChanges::Fields(diff_structured(a, b))
            }
            (a, b) => CompareChanges::Raw {
                from: a.to_value(),
                to: b.to_value(),
            },
        };

        Ok(CompareResult {
            start: start_version.data.to_value(),
            end: end_version.data.to_value(),
            changes,
        })
    }
}

/// Field diff over the union of keys, skipping unchanged fields. Fields
/// present on one side only diff against `null`.
fn diff_structured(a: &Map<String, Value>, b: &Map<String, Value>) -> BTreeMap<String, FieldChange> {
    let mut changes = BTreeMap::new();
    for key in a.keys().chain(b.keys()) {
        if changes.contains_key(key) {
            continue;
        }
        let from = a.get(key).cloned().unwrap_or(Value::Null);
        let to = b.get(key).cloned().unwrap_or(Value::Null);
        if from != to {
            changes.insert(key.clone(), FieldChange { from, to });
        }
    }
    changes
}
