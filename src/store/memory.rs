//! In-memory credential store.

use super::{CredentialStore, StoreError};
use dashmap::DashMap;
use std::collections::HashMap;

/// Process-local store; contents are lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .entries
            .get(namespace)
            .and_then(|ns| ns.get(key).cloned()))
    }

    fn set(&self, namespace: &str, key: &str, value: String) -> Result<(), StoreError> {
        self.entries
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, namespace: &str, key: &str) -> Result<(), StoreError> {
        if let Some(mut ns) = self.entries.get_mut(namespace) {
            ns.remove(key);
        }
        Ok(())
    }

    fn take(&self, namespace: &str, key: &str) -> Result<Option<String>, StoreError> {
        // The shard write lock makes lookup and removal one step.
        Ok(self
            .entries
            .get_mut(namespace)
            .and_then(|mut ns| ns.remove(key)))
    }

    fn clear(&self, namespace: &str) -> Result<(), StoreError> {
        self.entries.remove(namespace);
        Ok(())
    }
}
