//! Configuration for the vault.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::cache::DEFAULT_TTL_SECONDS;

/// Main vault configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Path to the SQLite database.
    pub db_path: PathBuf,
    /// Lifetime of cached query results, in seconds.
    pub cache_ttl_seconds: u64,
    /// How many times a conflicted rollback is rescanned before failing.
    pub rollback_retry_budget: usize,
    /// Number of snapshots kept after each take.
    pub snapshot_retention: usize,
}

impl Default for VaultConfig {
    fn default() -> Self {
        let vault_dir = dirs::home_dir()
            .map(|home| home.join(".temporal-vault"))
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            db_path: vault_dir.join("vault.db"),
            cache_ttl_seconds: DEFAULT_TTL_SECONDS,
            rollback_retry_budget: 3,
            snapshot_retention: 5,
        }
    }
}

impl VaultConfig {
    /// Build a config from environment variables, falling back to
    /// defaults field by field.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(path) = std::env::var("VAULT_DB_PATH") {
            config.db_path = PathBuf::from(path);
        }
        if let Some(ttl) = env_parse("VAULT_CACHE_TTL_SECONDS") {
            config.cache_ttl_seconds = ttl;
        }
        if let Some(budget) = env_parse("VAULT_ROLLBACK_RETRIES") {
            config.rollback_retry_budget = budget;
        }
        if let Some(retention) = env_parse("VAULT_SNAPSHOT_RETENTION") {
            config.snapshot_retention = retention;
        }
        config
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = VaultConfig::default();
        assert_eq!(config.cache_ttl_seconds, 3600);
        assert_eq!(config.rollback_retry_budget, 3);
        assert!(config.db_path.ends_with("vault.db"));
    }

    #[test]
    fn test_serde_round_trip() {
        let config = VaultConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: VaultConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.cache_ttl_seconds, config.cache_ttl_seconds);
        assert_eq!(back.db_path, config.db_path);
    }
}
