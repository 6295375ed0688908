//! Record version types for the temporal store.
//!
//! A record is a logical entity identified by `record_id` with an ordered
//! history of immutable versions. Versions are never mutated once written;
//! the only operation that rewrites history is a rollback, which collapses
//! everything after a cutoff into a fresh current row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Payload of a record version.
///
/// Structured payloads are diffable key/value mappings; anything that is
/// not a JSON object is carried as opaque text and compared wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordData {
    /// A JSON object, treated as an unordered key -> value mapping.
    Structured(Map<String, Value>),
    /// Opaque text. Not field-diffable.
    Text(String),
}

impl RecordData {
    /// Interpret raw input: a JSON object becomes `Structured`, everything
    /// else (including JSON scalars and arrays) is kept as opaque text.
    pub fn from_raw(raw: &str) -> Self {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => Self::Structured(map),
            _ => Self::Text(raw.to_string()),
        }
    }

    /// Serialized form for storage.
    pub fn to_storage_string(&self) -> String {
        match self {
            Self::Structured(map) => Value::Object(map.clone()).to_string(),
            Self::Text(s) => s.clone(),
        }
    }

    /// The structured mapping, if this payload is one.
    pub fn as_structured(&self) -> Option<&Map<String, Value>> {
        match self {
            Self::Structured(map) => Some(map),
            Self::Text(_) => None,
        }
    }

    /// JSON value view of the payload.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Structured(map) => Value::Object(map.clone()),
            Self::Text(s) => Value::String(s.clone()),
        }
    }
}

/// One immutable snapshot of a record's data at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordVersion {
    /// Logical record identifier. Not unique alone; unique together with
    /// `version` in an untouched chain.
    pub record_id: String,
    /// Version label, `v1`, `v2`, ... monotonically increasing per record.
    pub version: String,
    /// Payload at this version.
    pub data: RecordData,
    /// When this version was written, truncated to whole seconds.
    pub timestamp: DateTime<Utc>,
    /// Label of the prior version for the same record. `None` for `v1`.
    #[serde(default)]
    pub previous_version: Option<String>,
}

impl RecordVersion {
    pub fn new(
        record_id: impl Into<String>,
        version: impl Into<String>,
        data: RecordData,
        timestamp: DateTime<Utc>,
        previous_version: Option<String>,
    ) -> Self {
        Self {
            record_id: record_id.into(),
            version: version.into(),
            data,
            timestamp,
            previous_version,
        }
    }
}

/// Immutable audit entry written by the rollback engine.
///
/// Created inside the same storage transaction as the rollback itself, so
/// the audit trail can never disagree with applied state. Never mutated or
/// deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackLogEntry {
    /// Unique entry identifier.
    pub entry_id: Uuid,
    /// When the rollback was executed.
    pub timestamp: DateTime<Utc>,
    /// The point in time rolled back to.
    pub target_timestamp: DateTime<Utc>,
    /// Number of records touched.
    pub affected_count: u64,
    /// Identifiers of every record touched.
    pub affected_record_ids: Vec<String>,
}

impl RollbackLogEntry {
    pub fn new(
        executed_at: DateTime<Utc>,
        target_timestamp: DateTime<Utc>,
        affected_record_ids: Vec<String>,
    ) -> Self {
        Self {
            entry_id: Uuid::new_v4(),
            timestamp: executed_at,
            target_timestamp,
            affected_count: affected_record_ids.len() as u64,
            affected_record_ids,
        }
    }
}

/// A materialized full state at a timestamp.
///
/// Purely an optimization to bound point-in-time resolution cost; the
/// version chain alone reconstructs any point in time, so superseded
/// snapshots can be pruned freely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub snapshot_id: Uuid,
    /// The as-of time this snapshot captures.
    pub timestamp: DateTime<Utc>,
    /// Resolved state of every record as of `timestamp`.
    pub records: Vec<RecordVersion>,
}

impl Snapshot {
    pub fn new(timestamp: DateTime<Utc>, records: Vec<RecordVersion>) -> Self {
        Self {
            snapshot_id: Uuid::new_v4(),
            timestamp,
            records,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_data_from_raw_object() {
        let data = RecordData::from_raw(r#"{"a": 1, "b": "two"}"#);
        let map = data.as_structured().unwrap();
        assert_eq!(map.get("a"), Some(&serde_json::json!(1)));
        assert_eq!(map.get("b"), Some(&serde_json::json!("two")));
    }

    #[test]
    fn test_record_data_from_raw_text() {
        let data = RecordData::from_raw("plain text, not json");
        assert!(data.as_structured().is_none());
        assert_eq!(data.to_storage_string(), "plain text, not json");
    }

    #[test]
    fn test_record_data_scalar_json_is_text() {
        // Arrays and scalars are valid JSON but not diffable mappings.
        let data = RecordData::from_raw("[1, 2, 3]");
        assert!(matches!(data, RecordData::Text(_)));
    }

    #[test]
    fn test_record_data_storage_round_trip() {
        let data = RecordData::from_raw(r#"{"k": {"nested": true}}"#);
        let stored = data.to_storage_string();
        assert_eq!(RecordData::from_raw(&stored), data);
    }

    #[test]
    fn test_rollback_log_entry_counts() {
        let entry = RollbackLogEntry::new(
            Utc::now(),
            Utc::now(),
            vec!["a".to_string(), "b".to_string()],
        );
        assert_eq!(entry.affected_count, 2);
        assert_eq!(entry.affected_record_ids.len(), 2);
    }
}
