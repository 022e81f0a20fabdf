// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Wallet identity resolution.
//!
//! Handles:
//! - The per-session `WalletIdentity` context (get/set/subscribe, persisted)
//! - Resolving the address from the injected provider or the auth principal
//! - Following provider account-change notifications until torn down

use crate::models::{AddressError, WalletAddress, WalletStorage};
use crate::store::{keys, SessionStore, StoreError};
use async_trait::async_trait;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Capacity of the identity change channel. Slow subscribers lag rather
/// than block writers.
const IDENTITY_EVENT_CAPACITY: usize = 32;

/// A wallet-discovery source failed or had nothing to offer.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("source unavailable: {0}")]
    Unavailable(String),

    #[error("source returned no accounts")]
    Empty,

    #[error("source returned invalid address {0:?}: {1}")]
    InvalidAddress(String, AddressError),
}

/// Account entry as enumerated by the auth principal.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct ChainAccount {
    pub address: String,
}

/// Injected wallet provider (`eth_accounts` + `accountsChanged`).
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Already-authorized accounts; never prompts the user.
    async fn request_accounts(&self) -> Result<Vec<String>, SourceError>;

    /// Stream of `accountsChanged` payloads.
    fn accounts_changed(&self) -> broadcast::Receiver<Vec<String>>;
}

/// The external authentication principal for the session.
#[async_trait]
pub trait AuthPrincipal: Send + Sync {
    /// Wallet address exposed directly on the principal, if any.
    fn wallet_address(&self) -> Option<String>;

    /// Chain accounts linked to the principal.
    async fn chain_accounts(&self) -> Result<Vec<ChainAccount>, SourceError>;
}

/// Which source produced the resolved address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletSource {
    InjectedProvider,
    PrincipalWallet,
    PrincipalChainAccounts,
}

/// The session's authoritative wallet address.
///
/// Every `set_address` is persisted under `wallet-storage` and broadcast to
/// subscribers, including sets that do not change the value.
pub struct WalletIdentity {
    store: SessionStore,
    current: RwLock<Option<WalletAddress>>,
    events: broadcast::Sender<Option<WalletAddress>>,
}

impl WalletIdentity {
    /// Rehydrate from the session store (null when nothing was persisted).
    pub fn load(store: SessionStore) -> Result<Self, StoreError> {
        let persisted = store
            .get_json::<WalletStorage>(keys::WALLET_STORAGE)?
            .and_then(|s| s.wallet_address);
        let (events, _) = broadcast::channel(IDENTITY_EVENT_CAPACITY);

        if let Some(address) = &persisted {
            tracing::debug!(session = %store.session_id(), %address, "Rehydrated wallet identity");
        }

        Ok(Self {
            store,
            current: RwLock::new(persisted),
            events,
        })
    }

    pub fn get_address(&self) -> Option<WalletAddress> {
        *self.current.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_address(&self, address: Option<WalletAddress>) -> Result<(), StoreError> {
        self.store.set_json(
            keys::WALLET_STORAGE,
            &WalletStorage {
                wallet_address: address,
            },
        )?;
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = address;

        tracing::info!(
            session = %self.store.session_id(),
            address = ?address.map(|a| a.to_string()),
            "Wallet identity set"
        );

        // No receivers is fine.
        let _ = self.events.send(address);
        Ok(())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Option<WalletAddress>> {
        self.events.subscribe()
    }

    /// Number of live subscribers (open event streams, pending waits).
    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }
}

fn first_address(accounts: &[String]) -> Result<WalletAddress, SourceError> {
    let first = accounts.first().ok_or(SourceError::Empty)?;
    WalletAddress::parse(first).map_err(|e| SourceError::InvalidAddress(first.clone(), e))
}

async fn try_provider(provider: &dyn WalletProvider) -> Result<WalletAddress, SourceError> {
    let accounts = provider.request_accounts().await?;
    first_address(&accounts)
}

fn try_principal_wallet(principal: &dyn AuthPrincipal) -> Result<WalletAddress, SourceError> {
    let raw = principal.wallet_address().ok_or(SourceError::Empty)?;
    WalletAddress::parse(&raw).map_err(|e| SourceError::InvalidAddress(raw, e))
}

async fn try_principal_accounts(
    principal: &dyn AuthPrincipal,
) -> Result<WalletAddress, SourceError> {
    let accounts: Vec<String> = principal
        .chain_accounts()
        .await?
        .into_iter()
        .map(|a| a.address)
        .collect();
    first_address(&accounts)
}

/// Resolve the wallet address from the available sources in priority order.
///
/// The first source that yields a valid address wins and is written to
/// `identity`; failures are logged and fall through. When every source
/// fails the identity is left as it was.
pub async fn resolve_wallet(
    identity: &WalletIdentity,
    provider: Option<&dyn WalletProvider>,
    principal: Option<&dyn AuthPrincipal>,
) -> Result<Option<(WalletSource, WalletAddress)>, StoreError> {
    let mut found = None;

    if let Some(provider) = provider {
        match try_provider(provider).await {
            Ok(address) => found = Some((WalletSource::InjectedProvider, address)),
            Err(e) => tracing::warn!(error = %e, "Injected provider did not yield a wallet"),
        }
    }

    if let Some(principal) = principal {
        if found.is_none() {
            match try_principal_wallet(principal) {
                Ok(address) => found = Some((WalletSource::PrincipalWallet, address)),
                Err(e) => tracing::debug!(error = %e, "Principal exposes no wallet address"),
            }
        }

        if found.is_none() {
            match try_principal_accounts(principal).await {
                Ok(address) => found = Some((WalletSource::PrincipalChainAccounts, address)),
                Err(e) => {
                    tracing::warn!(error = %e, "Principal chain accounts did not yield a wallet")
                }
            }
        }
    }

    match &found {
        Some((source, address)) => {
            tracing::info!(?source, %address, "Resolved wallet address");
            identity.set_address(Some(*address))?;
        }
        None => tracing::warn!("No wallet source produced an address"),
    }

    Ok(found)
}

/// Apply an `accountsChanged` payload: adopt the first account, or clear
/// the identity when the list is empty. An invalid first account is
/// ignored so the identity never holds a malformed address.
pub fn apply_accounts_changed(
    identity: &WalletIdentity,
    accounts: &[String],
) -> Result<(), StoreError> {
    match first_address(accounts) {
        Ok(address) => identity.set_address(Some(address)),
        Err(SourceError::Empty) => identity.set_address(None),
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring accountsChanged with invalid account");
            Ok(())
        }
    }
}

/// Registered account-change listener. Dropping it deregisters.
pub struct AccountsListener {
    handle: JoinHandle<()>,
}

impl AccountsListener {
    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for AccountsListener {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Follow the provider's account changes for as long as the returned
/// listener is alive.
pub fn watch_accounts(
    identity: Arc<WalletIdentity>,
    provider: &dyn WalletProvider,
) -> AccountsListener {
    let mut changes = provider.accounts_changed();

    let handle = tokio::spawn(async move {
        loop {
            match changes.recv().await {
                Ok(accounts) => {
                    tracing::debug!(count = accounts.len(), "Accounts changed");
                    if let Err(e) = apply_accounts_changed(&identity, &accounts) {
                        tracing::error!(error = %e, "Failed to persist wallet change");
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Account change listener lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    AccountsListener { handle }
}

// ─────────────────────────────────────────────────────────────────────────────
// Adapters for sources reported by the browser
// ─────────────────────────────────────────────────────────────────────────────

/// Provider whose `eth_accounts` outcome was reported by the client, with
/// change notifications fed through a session-owned channel.
pub struct ReportedProvider {
    accounts: Result<Vec<String>, String>,
    changes: broadcast::Sender<Vec<String>>,
}

impl ReportedProvider {
    pub fn new(accounts: Result<Vec<String>, String>, changes: broadcast::Sender<Vec<String>>) -> Self {
        Self { accounts, changes }
    }
}

#[async_trait]
impl WalletProvider for ReportedProvider {
    async fn request_accounts(&self) -> Result<Vec<String>, SourceError> {
        self.accounts.clone().map_err(SourceError::Unavailable)
    }

    fn accounts_changed(&self) -> broadcast::Receiver<Vec<String>> {
        self.changes.subscribe()
    }
}

/// Auth principal as reported by the client.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct ReportedPrincipal {
    #[serde(default)]
    pub wallet_address: Option<String>,
    /// `None` when the principal could not enumerate accounts.
    #[serde(default)]
    pub chain_accounts: Option<Vec<ChainAccount>>,
}

#[async_trait]
impl AuthPrincipal for ReportedPrincipal {
    fn wallet_address(&self) -> Option<String> {
        self.wallet_address
            .as_ref()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
    }

    async fn chain_accounts(&self) -> Result<Vec<ChainAccount>, SourceError> {
        self.chain_accounts
            .clone()
            .ok_or_else(|| SourceError::Unavailable("chain accounts not reported".into()))
    }
}
