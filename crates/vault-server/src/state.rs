//! Server state management.

use std::sync::Arc;

use vault_core::{Vault, VaultConfig, VaultResult};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub vault: Arc<Vault>,
}

impl AppState {
    /// Open the vault per configuration and wrap it for sharing.
    pub fn open(config: &VaultConfig) -> VaultResult<Self> {
        Ok(Self {
            vault: Arc::new(Vault::open(config)?),
        })
    }

    /// Wrap an existing vault (used by tests with in-memory storage).
    pub fn with_vault(vault: Vault) -> Self {
        Self {
            vault: Arc::new(vault),
        }
    }
}
