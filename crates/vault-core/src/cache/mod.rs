//! Caching layer for resolved reads.
//!
//! The cache backend is a consumed capability behind [`CacheBackend`]
//! (key-value bytes with TTL); [`InMemoryCache`] is the in-process
//! implementation. [`CacheCoordinator`] owns key derivation, the TTL
//! policy, and the invalidation contract. It is best-effort throughout: a
//! failing backend degrades to direct storage reads, logged at `warn`,
//! never surfaced to callers.

mod memory;

pub use memory::InMemoryCache;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::warn;

use crate::error::VaultResult;

/// Default entry lifetime, one hour.
pub const DEFAULT_TTL_SECONDS: u64 = 3600;

/// Scope tag for entries not tied to a single record (bulk as-of queries).
const WILDCARD_SCOPE: &str = "*";

/// Consumed key-value cache interface with TTL.
pub trait CacheBackend: Send + Sync {
    fn get(&self, key: &str) -> VaultResult<Option<Vec<u8>>>;
    fn set_with_ttl(&self, key: &str, value: &[u8], ttl_seconds: u64) -> VaultResult<()>;
    fn delete(&self, key: &str) -> VaultResult<()>;
    fn flush_all(&self) -> VaultResult<()>;
}

/// Cache key for a single-record point-in-time resolution.
pub fn resolve_key(record_id: &str, as_of: DateTime<Utc>) -> String {
    format!("resolve:{}:{}", record_id, as_of.timestamp())
}

/// Cache key for a bulk as-of listing.
pub fn query_key(as_of: DateTime<Utc>) -> String {
    format!("query:{WILDCARD_SCOPE}:{}", as_of.timestamp())
}

/// Cache key for a compare result over a resolved range.
pub fn compare_key(record_id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    format!(
        "compare:{}:{}:{}",
        record_id,
        start.timestamp(),
        end.timestamp()
    )
}

/// Transparent caching coordinator.
///
/// Tracks every key it has issued per record scope so that invalidation
/// can remove all entries embedding a record id, even though the consumed
/// backend interface only supports point deletes and full flushes. Each
/// tracked key carries its expiry; writes prune expired tracking so the
/// index never outgrows the live cache.
#[derive(Clone)]
pub struct CacheCoordinator {
    backend: Arc<dyn CacheBackend>,
    ttl_seconds: u64,
    issued: Arc<Mutex<HashMap<String, HashMap<String, Instant>>>>,
}

impl CacheCoordinator {
    pub fn new(backend: Arc<dyn CacheBackend>, ttl_seconds: u64) -> Self {
        Self {
            backend,
            ttl_seconds,
            issued: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Fetch and decode a cached value. Any backend or decode failure is a
    /// miss.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let bytes = match self.backend.get(key) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                warn!(key, error = %e, "cache read failed, falling back to storage");
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "cached value undecodable, treating as miss");
                None
            }
        }
    }

    /// Store a value under a record scope (`None` scopes it to the
    /// wildcard, for bulk entries). Failures are logged and swallowed.
    pub fn put_json<T: Serialize>(&self, key: &str, record_scope: Option<&str>, value: &T) {
        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(key, error = %e, "failed to encode value for cache");
                return;
            }
        };
        if let Err(e) = self.backend.set_with_ttl(key, &bytes, self.ttl_seconds) {
            warn!(key, error = %e, "cache write failed");
            return;
        }
        let scope = record_scope.unwrap_or(WILDCARD_SCOPE).to_string();
        let mut issued = self.issued.lock().unwrap();
        let now = Instant::now();
        issued.retain(|_, keys| {
            keys.retain(|_, expires_at| *expires_at > now);
            !keys.is_empty()
        });
        issued
            .entry(scope)
            .or_default()
            .insert(
                key.to_string(),
                now + Duration::from_secs(self.ttl_seconds),
            );
    }

    /// Drop every entry whose key embeds `record_id`, plus bulk entries
    /// (which embed every record implicitly). Runs before the mutating
    /// call acknowledges, so a stale value never outlives a commit.
    pub fn invalidate_record(&self, record_id: &str) {
        let keys: Vec<String> = {
            let mut issued = self.issued.lock().unwrap();
            let mut keys: Vec<String> = issued
                .remove(record_id)
                .map(|keys| keys.into_keys().collect())
                .unwrap_or_default();
            if let Some(bulk) = issued.remove(WILDCARD_SCOPE) {
                keys.extend(bulk.into_keys());
            }
            keys
        };
        for key in keys {
            if let Err(e) = self.backend.delete(&key) {
                warn!(key, error = %e, "cache invalidation failed");
            }
        }
    }

    /// Flush the whole cache. Used after a rollback, where the meaning of
    /// every as-of query past the cutoff has changed.
    pub fn invalidate_all(&self) {
        self.issued.lock().unwrap().clear();
        if let Err(e) = self.backend.flush_all() {
            warn!(error = %e, "cache flush failed");
        }
    }
}
