//! vault-core - Core library for temporal-vault.
//!
//! A temporal record store: every write appends an immutable version,
//! reads resolve a record's state as of an arbitrary timestamp, and the
//! dataset can be rolled back to a prior point in time with a durable
//! audit trail.
//!
//! # Example
//!
//! ```ignore
//! use vault_core::{Vault, VaultConfig};
//!
//! let vault = Vault::open(&VaultConfig::from_env())?;
//! vault.create_version("user-42", r#"{"plan": "free"}"#)?;
//! vault.create_version("user-42", r#"{"plan": "pro"}"#)?;
//!
//! // What was user-42 an hour ago?
//! let then = vault.query_record("user-42", chrono::Utc::now() - chrono::Duration::hours(1))?;
//! ```

pub mod cache;
pub mod chain;
pub mod compare;
pub mod config;
pub mod error;
pub mod resolver;
pub mod rollback;
pub mod snapshot;
pub mod storage;
pub mod time;
pub mod types;
pub mod vault;

// Re-export commonly used types
pub use cache::{CacheBackend, CacheCoordinator, InMemoryCache};
pub use compare::{CompareChanges, CompareResult, FieldChange};
pub use config::VaultConfig;
pub use error::{ErrorCode, VaultError, VaultResult};
pub use resolver::PointInTimeResolver;
pub use rollback::{RollbackEngine, RollbackState, RollbackSummary};
pub use snapshot::SnapshotManager;
pub use storage::{NewVersion, RewriteSpec, SqliteGateway, StorageGateway};
pub use types::{RecordData, RecordVersion, RollbackLogEntry, Snapshot};
pub use vault::Vault;
