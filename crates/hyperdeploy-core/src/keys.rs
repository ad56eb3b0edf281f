//! User Credential Store
//!
//! Per-user hosting-provider API keys, persisted to `data/user_keys.json`.
//!
//! Keys are stored in plaintext behind file permissions only. That is an
//! accepted weakness for a hobby deployment, not a pattern to copy; anything
//! multi-tenant wants these in a real secret store.

use std::path::PathBuf;

use crate::error::{CoreError, Result};
use crate::store::JsonStore;

/// Minimum plausible length for a provider API key
const MIN_KEY_LEN: usize = 20;

/// Flat-file store of user id -> provider API key
pub struct UserKeyStore {
    store: JsonStore<String>,
}

impl UserKeyStore {
    /// Open the store at `path` (`data/user_keys.json`)
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let store = JsonStore::open(path)?;
        tracing::info!(users = store.len(), "User key store loaded");
        Ok(Self { store })
    }

    /// Whether `key` looks like a provider API key
    pub fn is_valid_format(key: &str) -> bool {
        let key = key.trim();
        key.len() >= MIN_KEY_LEN && !key.contains(char::is_whitespace)
    }

    /// Store a user's API key, rejecting malformed input
    pub fn set(&self, user_id: u64, key: &str) -> Result<()> {
        if !Self::is_valid_format(key) {
            return Err(CoreError::Validation(
                "API key must be at least 20 characters with no whitespace".into(),
            ));
        }

        self.store.insert(user_id.to_string(), key.trim().to_string())?;
        tracing::info!(user_id, "Provider API key stored");
        Ok(())
    }

    /// Get a user's API key
    pub fn get(&self, user_id: u64) -> Option<String> {
        self.store.get(&user_id.to_string())
    }

    /// Whether a user has a key configured
    pub fn has(&self, user_id: u64) -> bool {
        self.store.contains(&user_id.to_string())
    }

    /// Remove a user's key. Returns `false` when none was stored.
    pub fn remove(&self, user_id: u64) -> Result<bool> {
        let removed = self.store.remove(&user_id.to_string())?;
        if removed.is_some() {
            tracing::info!(user_id, "Provider API key removed");
        }
        Ok(removed.is_some())
    }

    /// Number of users with a configured key
    pub fn count(&self) -> usize {
        self.store.len()
    }
}
