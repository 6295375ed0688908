//! SQLite-backed storage gateway.
//!
//! Schema is provisioned idempotently at open. Timestamps are stored as
//! RFC 3339 UTC strings, which order lexicographically, and every version
//! row carries its parsed numeric version for tie-breaking and ordering.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use uuid::Uuid;

use crate::chain;
use crate::error::{VaultError, VaultResult};
use crate::storage::{NewVersion, RewriteSpec, StorageGateway};
use crate::time::{now_second, truncate_to_second};
use crate::types::{RecordData, RecordVersion, RollbackLogEntry, Snapshot};

const VERSION_COLUMNS: &str =
    "record_id, version, version_num, data, timestamp, previous_version";

/// SQLite gateway, serialized behind a connection mutex.
pub struct SqliteGateway {
    conn: Mutex<Connection>,
}

impl SqliteGateway {
    /// Open (or create) a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> VaultResult<Self> {
        let conn = Connection::open(path)?;
        let gateway = Self {
            conn: Mutex::new(conn),
        };
        gateway.init_schema()?;
        Ok(gateway)
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> VaultResult<Self> {
        let conn = Connection::open_in_memory()?;
        let gateway = Self {
            conn: Mutex::new(conn),
        };
        gateway.init_schema()?;
        Ok(gateway)
    }

    fn init_schema(&self) -> VaultResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS temporal_records (
                id INTEGER PRIMARY KEY,
                record_id TEXT NOT NULL,
                version TEXT NOT NULL,
                version_num INTEGER NOT NULL,
                data TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                previous_version TEXT
            );

            -- Point-in-time lookups per record
            CREATE INDEX IF NOT EXISTS idx_records_record_time
                ON temporal_records(record_id, timestamp);

            -- Rollback scans over the whole set
            CREATE INDEX IF NOT EXISTS idx_records_time
                ON temporal_records(timestamp);

            CREATE TABLE IF NOT EXISTS rollback_logs (
                id INTEGER PRIMARY KEY,
                entry_id TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                target_timestamp TEXT NOT NULL,
                affected_count INTEGER NOT NULL,
                affected_record_ids TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_rollback_timestamp
                ON rollback_logs(timestamp);

            CREATE TABLE IF NOT EXISTS snapshots (
                id INTEGER PRIMARY KEY,
                snapshot_id TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                data TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_snapshot_timestamp
                ON snapshots(timestamp);
        "#,
        )?;
        Ok(())
    }

    fn row_to_version(row: &rusqlite::Row<'_>) -> VaultResult<RecordVersion> {
        let record_id: String = row.get(0)?;
        let version: String = row.get(1)?;
        let data: String = row.get(3)?;
        let timestamp: String = row.get(4)?;
        let previous_version: Option<String> = row.get(5)?;

        Ok(RecordVersion {
            record_id,
            version,
            data: RecordData::from_raw(&data),
            timestamp: parse_stored_timestamp(&timestamp)?,
            previous_version,
        })
    }

    fn row_to_log(row: &rusqlite::Row<'_>) -> VaultResult<RollbackLogEntry> {
        let entry_id: String = row.get(0)?;
        let timestamp: String = row.get(1)?;
        let target_timestamp: String = row.get(2)?;
        let affected_count: u64 = row.get(3)?;
        let record_ids: String = row.get(4)?;

        Ok(RollbackLogEntry {
            entry_id: Uuid::parse_str(&entry_id)
                .map_err(|e| VaultError::storage(format!("bad audit entry id: {e}")))?,
            timestamp: parse_stored_timestamp(&timestamp)?,
            target_timestamp: parse_stored_timestamp(&target_timestamp)?,
            affected_count,
            affected_record_ids: serde_json::from_str(&record_ids)?,
        })
    }

    /// Collapse one record's post-cutoff rows into a fresh current row.
    /// Runs on the caller's connection so it can share a transaction.
    fn rewrite_on(
        conn: &Connection,
        cutoff: DateTime<Utc>,
        spec: &RewriteSpec,
    ) -> VaultResult<()> {
        conn.execute(
            "DELETE FROM temporal_records WHERE record_id = ?1 AND timestamp > ?2",
            params![spec.record_id, cutoff.to_rfc3339()],
        )?;
        let version_num = chain::parse_label(&spec.version)?;
        conn.execute(
            &format!(
                "INSERT INTO temporal_records ({VERSION_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
            ),
            params![
                spec.record_id,
                spec.version,
                version_num,
                spec.data.to_storage_string(),
                truncate_to_second(spec.new_timestamp).to_rfc3339(),
                spec.previous_version,
            ],
        )?;
        Ok(())
    }

    fn delete_after_on(
        conn: &Connection,
        record_id: &str,
        after: DateTime<Utc>,
    ) -> VaultResult<usize> {
        let count = conn.execute(
            "DELETE FROM temporal_records WHERE record_id = ?1 AND timestamp > ?2",
            params![record_id, after.to_rfc3339()],
        )?;
        Ok(count)
    }

    fn insert_log_on(conn: &Connection, entry: &RollbackLogEntry) -> VaultResult<()> {
        conn.execute(
            r#"INSERT INTO rollback_logs
               (entry_id, timestamp, target_timestamp, affected_count, affected_record_ids)
               VALUES (?1, ?2, ?3, ?4, ?5)"#,
            params![
                entry.entry_id.to_string(),
                entry.timestamp.to_rfc3339(),
                entry.target_timestamp.to_rfc3339(),
                entry.affected_count,
                serde_json::to_string(&entry.affected_record_ids)?,
            ],
        )?;
        Ok(())
    }

    /// `(record_id, version)` pairs currently after the cutoff, sorted.
    fn scan_after_on(
        conn: &Connection,
        cutoff: DateTime<Utc>,
    ) -> VaultResult<Vec<(String, String)>> {
        let mut stmt = conn.prepare(
            r#"SELECT record_id, version FROM temporal_records
               WHERE timestamp > ?1
               ORDER BY record_id ASC, version_num ASC"#,
        )?;
        let rows = stmt.query_map(params![cutoff.to_rfc3339()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

fn parse_stored_timestamp(raw: &str) -> VaultResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| VaultError::storage(format!("bad stored timestamp {raw:?}: {e}")))
}

impl StorageGateway for SqliteGateway {
    fn append_version(&self, version: NewVersion) -> VaultResult<RecordVersion> {
        let version_num = chain::parse_label(&version.version)?;
        let timestamp = version
            .timestamp
            .map(truncate_to_second)
            .unwrap_or_else(now_second);

        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!(
                "INSERT INTO temporal_records ({VERSION_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
            ),
            params![
                version.record_id,
                version.version,
                version_num,
                version.data.to_storage_string(),
                timestamp.to_rfc3339(),
                version.previous_version,
            ],
        )?;

        Ok(RecordVersion {
            record_id: version.record_id,
            version: version.version,
            data: version.data,
            timestamp,
            previous_version: version.previous_version,
        })
    }

    fn latest_version(&self, record_id: &str) -> VaultResult<Option<RecordVersion>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            r#"SELECT {VERSION_COLUMNS} FROM temporal_records
               WHERE record_id = ?1
               ORDER BY version_num DESC, timestamp DESC, id DESC
               LIMIT 1"#
        ))?;

        stmt.query_row(params![record_id], |row| Ok(Self::row_to_version(row)))
            .optional()?
            .transpose()
    }

    fn earliest_version(&self, record_id: &str) -> VaultResult<Option<RecordVersion>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            r#"SELECT {VERSION_COLUMNS} FROM temporal_records
               WHERE record_id = ?1
               ORDER BY version_num ASC, timestamp ASC, id ASC
               LIMIT 1"#
        ))?;

        stmt.query_row(params![record_id], |row| Ok(Self::row_to_version(row)))
            .optional()?
            .transpose()
    }

    fn versions_after(&self, timestamp: DateTime<Utc>) -> VaultResult<Vec<RecordVersion>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            r#"SELECT {VERSION_COLUMNS} FROM temporal_records
               WHERE timestamp > ?1
               ORDER BY record_id ASC, version_num ASC"#
        ))?;

        let results = stmt.query_map(params![timestamp.to_rfc3339()], |row| {
            Ok(Self::row_to_version(row))
        })?;

        results
            .map(|r| r.map_err(VaultError::from).and_then(|inner| inner))
            .collect()
    }

    fn version_at_or_before(
        &self,
        record_id: &str,
        timestamp: DateTime<Utc>,
    ) -> VaultResult<Option<RecordVersion>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            r#"SELECT {VERSION_COLUMNS} FROM temporal_records
               WHERE record_id = ?1 AND timestamp <= ?2
               ORDER BY timestamp DESC, version_num DESC, id DESC
               LIMIT 1"#
        ))?;

        stmt.query_row(params![record_id, timestamp.to_rfc3339()], |row| {
            Ok(Self::row_to_version(row))
        })
        .optional()?
        .transpose()
    }

    fn resolve_all_at(&self, timestamp: DateTime<Utc>) -> VaultResult<Vec<RecordVersion>> {
        let conn = self.conn.lock().unwrap();
        // One ordered scan; the first row seen per record id is its
        // resolved state.
        let mut stmt = conn.prepare(&format!(
            r#"SELECT {VERSION_COLUMNS} FROM temporal_records
               WHERE timestamp <= ?1
               ORDER BY record_id ASC, timestamp DESC, version_num DESC, id DESC"#
        ))?;

        let rows = stmt.query_map(params![timestamp.to_rfc3339()], |row| {
            Ok(Self::row_to_version(row))
        })?;

        let mut resolved: Vec<RecordVersion> = Vec::new();
        for row in rows {
            let version = row??;
            match resolved.last() {
                Some(last) if last.record_id == version.record_id => continue,
                _ => resolved.push(version),
            }
        }
        Ok(resolved)
    }

    fn bulk_rewrite(&self, cutoff: DateTime<Utc>, updates: &[RewriteSpec]) -> VaultResult<usize> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        for spec in updates {
            Self::rewrite_on(&tx, cutoff, spec)?;
        }
        tx.commit()?;
        Ok(updates.len())
    }

    fn bulk_delete(&self, record_id: &str, after_timestamp: DateTime<Utc>) -> VaultResult<usize> {
        let conn = self.conn.lock().unwrap();
        Self::delete_after_on(&conn, record_id, after_timestamp)
    }

    fn apply_rollback(
        &self,
        cutoff: DateTime<Utc>,
        rewrites: &[RewriteSpec],
        delete_record_ids: &[String],
        expected_after: &[(String, String)],
        log: &RollbackLogEntry,
    ) -> VaultResult<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        // A version created for an affected record between scan and apply
        // must not be silently lost.
        let current_after = Self::scan_after_on(&tx, cutoff)?;
        if current_after != expected_after {
            return Err(VaultError::conflict(
                "version set changed between rollback scan and apply",
            ));
        }

        for spec in rewrites {
            Self::rewrite_on(&tx, cutoff, spec)?;
        }
        for record_id in delete_record_ids {
            Self::delete_after_on(&tx, record_id, cutoff)?;
        }
        Self::insert_log_on(&tx, log)?;

        tx.commit()?;
        Ok(())
    }

    fn append_rollback_log(&self, entry: &RollbackLogEntry) -> VaultResult<RollbackLogEntry> {
        let conn = self.conn.lock().unwrap();
        Self::insert_log_on(&conn, entry)?;
        Ok(entry.clone())
    }

    fn recent_rollback_logs(&self, limit: usize) -> VaultResult<Vec<RollbackLogEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            r#"SELECT entry_id, timestamp, target_timestamp, affected_count, affected_record_ids
               FROM rollback_logs
               ORDER BY timestamp DESC, id DESC
               LIMIT ?1"#,
        )?;

        let results = stmt.query_map(params![limit as i64], |row| Ok(Self::row_to_log(row)))?;

        results
            .map(|r| r.map_err(VaultError::from).and_then(|inner| inner))
            .collect()
    }

    fn insert_snapshot(&self, snapshot: &Snapshot) -> VaultResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO snapshots (snapshot_id, timestamp, data) VALUES (?1, ?2, ?3)",
            params![
                snapshot.snapshot_id.to_string(),
                snapshot.timestamp.to_rfc3339(),
                serde_json::to_string(&snapshot.records)?,
            ],
        )?;
        Ok(())
    }

    fn latest_snapshot_at_or_before(
        &self,
        timestamp: DateTime<Utc>,
    ) -> VaultResult<Option<Snapshot>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            r#"SELECT snapshot_id, timestamp, data FROM snapshots
               WHERE timestamp <= ?1
               ORDER BY timestamp DESC, id DESC
               LIMIT 1"#,
        )?;

        stmt.query_row(params![timestamp.to_rfc3339()], |row| {
            let snapshot_id: String = row.get(0)?;
            let timestamp: String = row.get(1)?;
            let data: String = row.get(2)?;
            Ok((snapshot_id, timestamp, data))
        })
        .optional()?
        .map(|(snapshot_id, timestamp, data)| {
            Ok(Snapshot {
                snapshot_id: Uuid::parse_str(&snapshot_id)
                    .map_err(|e| VaultError::storage(format!("bad snapshot id: {e}")))?,
                timestamp: parse_stored_timestamp(&timestamp)?,
                records: serde_json::from_str(&data)?,
            })
        })
        .transpose()
    }

    fn prune_snapshots(&self, keep: usize) -> VaultResult<usize> {
        let conn = self.conn.lock().unwrap();
        let count = conn.execute(
            r#"DELETE FROM snapshots
               WHERE id NOT IN (
                   SELECT id FROM snapshots
                   ORDER BY timestamp DESC, id DESC
                   LIMIT ?1
               )"#,
            params![keep as i64],
        )?;
        Ok(count)
    }

    fn count_versions(&self) -> VaultResult<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM temporal_records", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
