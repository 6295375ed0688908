//! Core data types for temporal-vault.

mod record;

pub use record::{RecordData, RecordVersion, RollbackLogEntry, Snapshot};
