//! JSON-file credential store.
//!
//! The whole map is rewritten on every mutation (write to a temp file, then
//! rename), so a process restart between the OAuth redirect and its callback
//! resumes from the last committed state.
//!
//! A mutation is applied to a copy of the map and only becomes visible once
//! that copy is on disk, so memory never runs ahead of the file. Writes are
//! synchronous and happen under the store mutex; each one is a single small
//! JSON file, and the store is meant for single-instance deployments.

use super::{CredentialStore, StoreError};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

type Namespaces = HashMap<String, HashMap<String, String>>;

pub struct FileStore {
    path: PathBuf,
    entries: Mutex<Namespaces>,
}

impl FileStore {
    /// Open (or create on first write) the store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => Namespaces::new(),
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Namespaces::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            path = %path.display(),
            sessions = entries.len(),
            "Opened credential store"
        );

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Apply `f` to a copy, persist it, then commit it in memory. On a
    /// write failure the previous state stays in effect.
    fn mutate<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Namespaces) -> T,
    {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        let mut next = entries.clone();
        let out = f(&mut next);
        self.flush(&next)?;
        *entries = next;
        Ok(out)
    }

    fn flush(&self, entries: &Namespaces) -> Result<(), StoreError> {
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl CredentialStore for FileStore {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(namespace).and_then(|ns| ns.get(key).cloned()))
    }

    fn set(&self, namespace: &str, key: &str, value: String) -> Result<(), StoreError> {
        self.mutate(|entries| {
            entries
                .entry(namespace.to_string())
                .or_default()
                .insert(key.to_string(), value);
        })
    }

    fn remove(&self, namespace: &str, key: &str) -> Result<(), StoreError> {
        self.take(namespace, key).map(|_| ())
    }

    fn take(&self, namespace: &str, key: &str) -> Result<Option<String>, StoreError> {
        {
            let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
            if !entries.get(namespace).is_some_and(|ns| ns.contains_key(key)) {
                return Ok(None);
            }
        }

        self.mutate(|entries| {
            let ns = entries.get_mut(namespace)?;
            let value = ns.remove(key);
            if ns.is_empty() {
                entries.remove(namespace);
            }
            value
        })
    }

    fn clear(&self, namespace: &str) -> Result<(), StoreError> {
        self.mutate(|entries| {
            entries.remove(namespace);
        })
    }
}
