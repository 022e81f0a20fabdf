//! Credential store: per-session key/value storage with JSON helpers.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::AppError;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;

/// Well-known keys, named after the browser storage entries they replace.
pub mod keys {
    /// Provider token set `{access_token, refresh_token?, expires_at}`.
    pub const FITBIT_TOKENS: &str = "fitbit_tokens";
    /// Persisted wallet identity `{walletAddress}`.
    pub const WALLET_STORAGE: &str = "wallet-storage";
    /// Anti-forgery nonce for the in-flight redirect.
    pub const OAUTH_STATE: &str = "oauth_state";
    /// Wallet address scratch value read back by the callback.
    pub const WALLET_ADDRESS: &str = "wallet_address";
    /// OAuth flow state machine record.
    pub const OAUTH_FLOW: &str = "oauth_flow";
}

/// Storage backend errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Store lock poisoned")]
    Poisoned,
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Storage(err.to_string())
    }
}

/// Raw string storage, namespaced by session id.
pub trait CredentialStore: Send + Sync {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, namespace: &str, key: &str, value: String) -> Result<(), StoreError>;
    fn remove(&self, namespace: &str, key: &str) -> Result<(), StoreError>;
    /// Remove and return a value in one step. Of two concurrent takes of
    /// the same key, at most one sees the value.
    fn take(&self, namespace: &str, key: &str) -> Result<Option<String>, StoreError>;
    /// Drop every key in a namespace.
    fn clear(&self, namespace: &str) -> Result<(), StoreError>;
}

/// Typed view of one session's slice of the store.
#[derive(Clone)]
pub struct SessionStore {
    backend: Arc<dyn CredentialStore>,
    session_id: String,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn CredentialStore>, session_id: impl Into<String>) -> Self {
        Self {
            backend,
            session_id: session_id.into(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn get_raw(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.backend.get(&self.session_id, key)
    }

    pub fn set_raw(&self, key: &str, value: impl Into<String>) -> Result<(), StoreError> {
        self.backend.set(&self.session_id, key, value.into())
    }

    /// Read and parse a JSON value. Unparseable content reads as absent.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let Some(raw) = self.get_raw(key)? else {
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!(
                    session = %self.session_id,
                    key,
                    error = %e,
                    "Ignoring unparseable stored value"
                );
                Ok(None)
            }
        }
    }

    pub fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let raw = serde_json::to_string(value)?;
        self.set_raw(key, raw)
    }

    pub fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.backend.remove(&self.session_id, key)
    }

    /// Atomically read and delete a raw value.
    pub fn take_raw(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.backend.take(&self.session_id, key)
    }

    /// Atomically read and delete a JSON value. The key is gone afterwards
    /// even when its content does not parse.
    pub fn take_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let Some(raw) = self.take_raw(key)? else {
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!(
                    session = %self.session_id,
                    key,
                    error = %e,
                    "Discarding unparseable stored value"
                );
                Ok(None)
            }
        }
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        self.backend.clear(&self.session_id)
    }
}
