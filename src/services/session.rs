// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-session context objects.
//!
//! Each browser session owns its slice of the credential store, its wallet
//! identity, and (once a provider has been reported) an account-change
//! listener. Sessions are created lazily and rehydrate from the store, so a
//! restart with a durable store picks up where the browser left off.
//!
//! The registry only keeps sessions that have something live attached: a
//! provider listener, an open event stream, or a request in flight. Idle
//! sessions are dropped after each request and reloaded from the store on
//! the next one.

use crate::services::identity::{watch_accounts, AccountsListener, ReportedProvider, WalletIdentity};
use crate::store::{CredentialStore, SessionStore, StoreError};
use dashmap::DashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;

/// Capacity of the per-session `accountsChanged` channel.
const PROVIDER_EVENT_CAPACITY: usize = 16;

/// One browser session.
pub struct Session {
    id: String,
    store: SessionStore,
    identity: Arc<WalletIdentity>,
    provider_events: broadcast::Sender<Vec<String>>,
    listener: Mutex<Option<AccountsListener>>,
}

impl Session {
    fn load(id: String, backend: Arc<dyn CredentialStore>) -> Result<Self, StoreError> {
        let store = SessionStore::new(backend, id.clone());
        let identity = Arc::new(WalletIdentity::load(store.clone())?);
        let (provider_events, _) = broadcast::channel(PROVIDER_EVENT_CAPACITY);

        Ok(Self {
            id,
            store,
            identity,
            provider_events,
            listener: Mutex::new(None),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn identity(&self) -> &Arc<WalletIdentity> {
        &self.identity
    }

    /// Provider adapter for a client-reported `eth_accounts` outcome.
    pub fn reported_provider(&self, accounts: Result<Vec<String>, String>) -> ReportedProvider {
        ReportedProvider::new(accounts, self.provider_events.clone())
    }

    /// Register the account-change listener once a provider is known to exist.
    /// Idempotent for the life of the session.
    pub fn attach_provider(&self, provider: &ReportedProvider) {
        let mut listener = self.listener.lock().unwrap_or_else(PoisonError::into_inner);
        if listener.as_ref().is_some_and(AccountsListener::is_active) {
            return;
        }
        *listener = Some(watch_accounts(self.identity.clone(), provider));
        tracing::debug!(session = %self.id, "Registered accountsChanged listener");
    }

    pub fn has_provider_listener(&self) -> bool {
        self.listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(AccountsListener::is_active)
    }

    /// Forward an `accountsChanged` event. Returns false when no listener is
    /// registered, in which case the event is dropped.
    pub fn notify_accounts_changed(&self, accounts: Vec<String>) -> bool {
        if !self.has_provider_listener() {
            return false;
        }
        self.provider_events.send(accounts).is_ok()
    }

    /// Nothing in memory depends on this session object staying alive.
    pub fn is_idle(&self) -> bool {
        !self.has_provider_listener() && self.identity.subscriber_count() == 0
    }

    /// Deregister the provider listener.
    pub fn teardown(&self) {
        if self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
        {
            tracing::debug!(session = %self.id, "Deregistered accountsChanged listener");
        }
    }
}

/// All live sessions, keyed by session id.
#[derive(Clone)]
pub struct SessionRegistry {
    backend: Arc<dyn CredentialStore>,
    sessions: Arc<DashMap<String, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new(backend: Arc<dyn CredentialStore>) -> Self {
        Self {
            backend,
            sessions: Arc::new(DashMap::new()),
        }
    }

    /// Get the live session or load it from the store.
    pub fn get_or_load(&self, id: &str) -> Result<Arc<Session>, StoreError> {
        if let Some(session) = self.sessions.get(id) {
            return Ok(session.clone());
        }

        let loaded = Arc::new(Session::load(id.to_string(), self.backend.clone())?);
        // Another request may have loaded it meanwhile; keep the first.
        Ok(self
            .sessions
            .entry(id.to_string())
            .or_insert(loaded)
            .clone())
    }

    /// Drop the in-memory session if it is idle and nobody else holds it.
    /// Its stored state is untouched.
    pub fn release(&self, id: &str) {
        let evicted = self
            .sessions
            .remove_if(id, |_, session| {
                Arc::strong_count(session) == 1 && session.is_idle()
            })
            .is_some();
        if evicted {
            tracing::trace!(session = %id, "Released idle session");
        }
    }

    /// End a session: tear down listeners and wipe its stored state.
    pub fn end(&self, id: &str) -> Result<(), StoreError> {
        if let Some((_, session)) = self.sessions.remove(id) {
            session.teardown();
        }
        self.backend.clear(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
