// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use alloy_primitives::Address;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request};
use axum::response::Response;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use venice_dashboard::config::Config;
use venice_dashboard::middleware::session::{create_session_token, SESSION_COOKIE};
use venice_dashboard::models::{TokenSet, WalletAddress};
use venice_dashboard::routes::create_router;
use venice_dashboard::services::{ContractError, NftContract, Session};
use venice_dashboard::store::{keys, MemoryStore};
use venice_dashboard::time_utils::{Clock, FixedClock};
use venice_dashboard::AppState;

pub const WALLET: &str = "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045";

/// In-memory NFT contract.
#[derive(Default)]
pub struct FakeContract {
    pub balance: Mutex<u64>,
    pub owners: Mutex<HashMap<u64, Address>>,
    pub uris: Mutex<HashMap<u64, String>>,
}

#[allow(dead_code)]
impl FakeContract {
    pub fn mint(&self, token_id: u64, owner: Address, uri: String) {
        self.owners.lock().unwrap().insert(token_id, owner);
        self.uris.lock().unwrap().insert(token_id, uri);
        *self.balance.lock().unwrap() += 1;
    }
}

#[async_trait]
impl NftContract for FakeContract {
    async fn balance_of(&self, owner: Address) -> Result<u64, ContractError> {
        let owned = self
            .owners
            .lock()
            .unwrap()
            .values()
            .filter(|o| **o == owner)
            .count() as u64;
        Ok(owned.min(*self.balance.lock().unwrap()))
    }

    async fn owner_of(&self, token_id: u64) -> Result<Address, ContractError> {
        self.owners
            .lock()
            .unwrap()
            .get(&token_id)
            .copied()
            .ok_or_else(|| ContractError::Reverted("ERC721NonexistentToken".into()))
    }

    async fn token_uri(&self, token_id: u64) -> Result<String, ContractError> {
        self.uris
            .lock()
            .unwrap()
            .get(&token_id)
            .cloned()
            .ok_or_else(|| ContractError::Reverted("ERC721NonexistentToken".into()))
    }
}

pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub clock: Arc<FixedClock>,
    pub contract: Arc<FakeContract>,
}

/// Create a test app with offline dependencies. The backend URL points
/// nowhere unless overridden.
#[allow(dead_code)]
pub fn create_test_app() -> TestApp {
    create_test_app_with_config(Config::test_default())
}

/// Create a test app whose backend client talks to `api_url` (a wiremock server).
#[allow(dead_code)]
pub fn create_test_app_with_backend(api_url: &str) -> TestApp {
    let mut config = Config::test_default();
    config.api_url = api_url.trim_end_matches('/').to_string();
    create_test_app_with_config(config)
}

#[allow(dead_code)]
pub fn create_test_app_with_config(config: Config) -> TestApp {
    let clock = Arc::new(FixedClock::at_millis(
        chrono::Utc::now().timestamp_millis(),
    ));
    let contract = Arc::new(FakeContract::default());

    let state = Arc::new(AppState::new(
        config,
        Arc::new(MemoryStore::new()),
        contract.clone(),
        clock.clone(),
    ));

    TestApp {
        router: create_router(state.clone()),
        state,
        clock,
        contract,
    }
}

#[allow(dead_code)]
impl TestApp {
    /// Cookie header value for session `id`.
    pub fn cookie(&self, id: &str) -> String {
        let token = create_session_token(id, &self.state.config.session_signing_key).unwrap();
        format!("{SESSION_COOKIE}={token}")
    }

    pub fn session(&self, id: &str) -> Arc<Session> {
        self.state.sessions.get_or_load(id).unwrap()
    }

    /// Give session `id` a wallet.
    pub fn with_wallet(&self, id: &str) {
        self.session(id)
            .identity()
            .set_address(Some(WalletAddress::parse(WALLET).unwrap()))
            .unwrap();
    }

    /// Store a provider token for session `id` valid for `lifetime_ms`.
    pub fn with_tokens(&self, id: &str, access_token: &str, lifetime_ms: i64) {
        self.session(id)
            .store()
            .set_json(
                keys::FITBIT_TOKENS,
                &TokenSet {
                    access_token: access_token.to_string(),
                    refresh_token: None,
                    expires_at: self.clock.now_millis() + lifetime_ms,
                },
            )
            .unwrap();
    }
}

#[allow(dead_code)]
pub fn get(uri: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

#[allow(dead_code)]
pub fn send_json(method: &str, uri: &str, cookie: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::COOKIE, cookie)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[allow(dead_code)]
pub fn post_empty(uri: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

#[allow(dead_code)]
pub async fn body_json(response: Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[allow(dead_code)]
pub fn location(response: &Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string()
}
