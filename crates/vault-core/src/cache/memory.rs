//! In-process TTL cache backend.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::cache::CacheBackend;
use crate::error::VaultResult;

struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
}

/// In-memory key-value store with per-entry TTL. Expired entries are
/// evicted lazily on read and on write.
pub struct InMemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn evict_expired(entries: &mut HashMap<String, Entry>) {
        let now = Instant::now();
        entries.retain(|_, entry| entry.expires_at > now);
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheBackend for InMemoryCache {
    fn get(&self, key: &str) -> VaultResult<Option<Vec<u8>>> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn set_with_ttl(&self, key: &str, value: &[u8], ttl_seconds: u64) -> VaultResult<()> {
        let mut entries = self.entries.lock().unwrap();
        Self::evict_expired(&mut entries);
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_vec(),
                expires_at: Instant::now() + Duration::from_secs(ttl_seconds),
            },
        );
        Ok(())
    }

    fn delete(&self, key: &str) -> VaultResult<()> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }

    fn flush_all(&self) -> VaultResult<()> {
        self.entries.lock().unwrap().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_delete() {
        let cache = InMemoryCache::new();
        cache.set_with_ttl("k", b"value", 60).unwrap();
        assert_eq!(cache.get("k").unwrap(), Some(b"value".to_vec()));

        cache.delete("k").unwrap();
        assert_eq!(cache.get("k").unwrap(), None);
    }

    #[test]
    fn test_ttl_expiry() {
        let cache = InMemoryCache::new();
        cache.set_with_ttl("k", b"value", 0).unwrap();
        assert_eq!(cache.get("k").unwrap(), None);
    }

    #[test]
    fn test_flush_all() {
        let cache = InMemoryCache::new();
        cache.set_with_ttl("a", b"1", 60).unwrap();
        cache.set_with_ttl("b", b"2", 60).unwrap();
        cache.flush_all().unwrap();
        assert_eq!(cache.get("a").unwrap(), None);
        assert_eq!(cache.get("b").unwrap(), None);
    }

    #[test]
    fn test_overwrite_replaces_value() {
        let cache = InMemoryCache::new();
        cache.set_with_ttl("k", b"old", 60).unwrap();
        cache.set_with_ttl("k", b"new", 60).unwrap();
        assert_eq!(cache.get("k").unwrap(), Some(b"new".to_vec()));
    }
}
