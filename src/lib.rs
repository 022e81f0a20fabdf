// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Venice dashboard: identity and credential backend for the fitness dashboard
//!
//! This crate reconciles the user's wallet, their fitness-provider OAuth
//! grant, and their on-chain NFT into one current-user view, and proxies
//! the dashboard's data and AI calls through the backend.

pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;
pub mod time_utils;

use alloy_primitives::Address;
use config::Config;
use services::{BackendClient, NftContract, NftResolver, OAuthFlow, RpcNftContract, SessionRegistry};
use std::str::FromStr;
use std::sync::Arc;
use store::{CredentialStore, FileStore, MemoryStore};
use time_utils::{Clock, SystemClock};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub sessions: SessionRegistry,
    pub oauth: OAuthFlow,
    pub backend: BackendClient,
    pub nft: NftResolver,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Wire the services around the given collaborators.
    pub fn new(
        config: Config,
        store: Arc<dyn CredentialStore>,
        contract: Arc<dyn NftContract>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let backend = BackendClient::new(config.api_url.clone());
        let oauth = OAuthFlow::new(&config, Arc::new(backend.clone()), clock.clone());
        let nft = NftResolver::new(contract, config.nft_scan_limit);

        Self {
            sessions: SessionRegistry::new(store),
            oauth,
            backend,
            nft,
            clock,
            config,
        }
    }

    /// Production wiring: durable or in-memory store, chain RPC contract.
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let store: Arc<dyn CredentialStore> = match &config.store_path {
            Some(path) => Arc::new(FileStore::open(path)?),
            None => {
                tracing::warn!("STORE_PATH not set; sessions will not survive a restart");
                Arc::new(MemoryStore::new())
            }
        };

        let contract_address = Address::from_str(&config.nft_contract_address)?;
        let contract = Arc::new(RpcNftContract::new(config.rpc_url.clone(), contract_address));

        Ok(Self::new(config, store, contract, Arc::new(SystemClock)))
    }
}
