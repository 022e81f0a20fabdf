// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fitness-provider OAuth authorization-code flow.
//!
//! The flow is a small state machine persisted under `oauth_flow` at every
//! transition, so a callback that lands after a restart (or on another
//! replica sharing the store) resumes correctly:
//!
//! ```text
//! Disconnected -> AwaitingRedirect -> AwaitingCallback -> Connected
//!                                                      \-> Disconnected
//! Connected -> Disconnected   (disconnect, logout, expiry)
//! ```

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{
    FlowRecord, FlowState, OAuthState, TokenExchangeResponse, TokenSet, WalletAddress,
};
use crate::services::gate;
use crate::store::{keys, SessionStore};
use crate::time_utils::{format_millis_rfc3339, Clock};
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Bytes of entropy in each anti-forgery nonce.
const NONCE_BYTES: usize = 32;

/// Exchanges an authorization code for provider tokens.
#[async_trait]
pub trait TokenExchange: Send + Sync {
    async fn exchange_code(
        &self,
        code: &str,
        wallet: &WalletAddress,
        redirect_uri: &str,
    ) -> Result<TokenExchangeResponse>;
}

/// Query parameters delivered to the callback route.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Provider connection as reported to the browser.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStatus {
    pub state: FlowState,
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
}

#[derive(Debug, Clone)]
struct AuthorizeSettings {
    client_id: String,
    authorize_url: String,
    scope: String,
    redirect_uri: String,
}

/// OAuth flow controller. One instance serves every session; all state
/// lives in the caller's `SessionStore`.
#[derive(Clone)]
pub struct OAuthFlow {
    settings: AuthorizeSettings,
    exchange: Arc<dyn TokenExchange>,
    clock: Arc<dyn Clock>,
    rng: SystemRandom,
}

impl OAuthFlow {
    pub fn new(config: &Config, exchange: Arc<dyn TokenExchange>, clock: Arc<dyn Clock>) -> Self {
        Self {
            settings: AuthorizeSettings {
                client_id: config.fitbit_client_id.clone(),
                authorize_url: config.fitbit_authorize_url.clone(),
                scope: config.fitbit_scope.clone(),
                redirect_uri: config.redirect_uri(),
            },
            exchange,
            clock,
            rng: SystemRandom::new(),
        }
    }

    pub fn redirect_uri(&self) -> &str {
        &self.settings.redirect_uri
    }

    fn transition(&self, store: &SessionStore, state: FlowState) -> Result<()> {
        store.set_json(
            keys::OAUTH_FLOW,
            &FlowRecord {
                state,
                updated_at: self.clock.now_millis(),
            },
        )?;
        tracing::debug!(session = %store.session_id(), ?state, "OAuth flow transition");
        Ok(())
    }

    /// Abort the in-flight attempt: drop the scratch wallet and fall back to
    /// whatever the token store supports. A still-usable earlier grant stays
    /// Connected; otherwise the flow is Disconnected.
    fn abort(&self, store: &SessionStore) -> Result<()> {
        store.remove(keys::WALLET_ADDRESS)?;
        let usable = store
            .get_json::<TokenSet>(keys::FITBIT_TOKENS)?
            .is_some_and(|t| gate::is_usable(&t, self.clock.now_millis()));
        let state = if usable {
            FlowState::Connected
        } else {
            FlowState::Disconnected
        };
        self.transition(store, state)
    }

    fn new_nonce(&self) -> Result<String> {
        let mut bytes = [0u8; NONCE_BYTES];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("system RNG failure")))?;
        Ok(URL_SAFE_NO_PAD.encode(bytes))
    }

    fn authorize_url(&self, nonce: &str) -> String {
        format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}",
            self.settings.authorize_url,
            urlencoding::encode(&self.settings.client_id),
            urlencoding::encode(&self.settings.redirect_uri),
            urlencoding::encode(&self.settings.scope),
            urlencoding::encode(nonce),
        )
    }

    /// Start an authorization attempt for `wallet` and return the provider
    /// URL to navigate to. Any earlier in-flight nonce is replaced.
    pub fn initiate(&self, store: &SessionStore, wallet: Option<WalletAddress>) -> Result<String> {
        let wallet = wallet.ok_or(AppError::WalletRequired)?;

        let nonce = self.new_nonce()?;
        store.set_json(
            keys::OAUTH_STATE,
            &OAuthState {
                nonce: nonce.clone(),
            },
        )?;
        store.set_raw(keys::WALLET_ADDRESS, wallet.checksummed())?;
        self.transition(store, FlowState::AwaitingRedirect)?;

        let url = self.authorize_url(&nonce);
        self.transition(store, FlowState::AwaitingCallback)?;

        tracing::info!(session = %store.session_id(), %wallet, "Starting provider authorization");
        Ok(url)
    }

    /// Validate the callback and, on a matching state, exchange the code.
    ///
    /// The persisted nonce is taken atomically, so of several callbacks
    /// racing with the same `state` at most one reaches the token exchange.
    /// A missing or mismatched `state` never reaches it. A callback with no
    /// attempt in flight is rejected without touching the flow record.
    pub async fn handle_callback(
        &self,
        store: &SessionStore,
        params: &CallbackParams,
    ) -> Result<TokenSet> {
        let Some(expected) = store.take_json::<OAuthState>(keys::OAUTH_STATE)? else {
            tracing::warn!(
                session = %store.session_id(),
                had_state = params.state.is_some(),
                "Rejecting OAuth callback with no attempt in flight"
            );
            return Err(AppError::AuthorizationMismatch);
        };

        let state_matches: bool = params
            .state
            .as_deref()
            .is_some_and(|got| expected.nonce.as_bytes().ct_eq(got.as_bytes()).into());
        if !state_matches {
            tracing::warn!(
                session = %store.session_id(),
                had_state = params.state.is_some(),
                "Rejecting OAuth callback with mismatched state"
            );
            self.abort(store)?;
            return Err(AppError::AuthorizationMismatch);
        }

        if let Some(error) = &params.error {
            tracing::info!(session = %store.session_id(), error, "Provider denied authorization");
            self.abort(store)?;
            return Err(AppError::AuthorizationDenied(error.clone()));
        }

        let Some(code) = params.code.as_deref().filter(|c| !c.is_empty()) else {
            self.abort(store)?;
            return Err(AppError::BadRequest("missing authorization code".into()));
        };

        let wallet = store
            .take_raw(keys::WALLET_ADDRESS)?
            .and_then(|raw| WalletAddress::parse(&raw).ok());
        let Some(wallet) = wallet else {
            self.abort(store)?;
            return Err(AppError::WalletRequired);
        };

        let response = match self
            .exchange
            .exchange_code(code, &wallet, &self.settings.redirect_uri)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(session = %store.session_id(), error = %e, "Token exchange failed");
                self.abort(store)?;
                return Err(e);
            }
        };

        let tokens = TokenSet::from_exchange(response, self.clock.now_millis());
        store.set_json(keys::FITBIT_TOKENS, &tokens)?;
        self.transition(store, FlowState::Connected)?;

        tracing::info!(
            session = %store.session_id(),
            %wallet,
            expires_at = tokens.expires_at,
            "Provider connected"
        );
        Ok(tokens)
    }

    /// Forget the provider tokens. The wallet identity is left alone.
    pub fn disconnect(&self, store: &SessionStore) -> Result<()> {
        store.remove(keys::FITBIT_TOKENS)?;
        self.abort(store)?;
        store.remove(keys::OAUTH_STATE)?;
        tracing::info!(session = %store.session_id(), "Provider disconnected");
        Ok(())
    }

    /// Current connection state. `connected` agrees with the freshness gate.
    /// A Connected record whose tokens are no longer usable is moved to
    /// Disconnected.
    pub fn status(&self, store: &SessionStore) -> Result<ConnectionStatus> {
        let mut record = store
            .get_json::<FlowRecord>(keys::OAUTH_FLOW)?
            .unwrap_or_default();
        let tokens = store.get_json::<TokenSet>(keys::FITBIT_TOKENS)?;
        let usable = tokens
            .as_ref()
            .is_some_and(|t| gate::is_usable(t, self.clock.now_millis()));

        if record.state == FlowState::Connected && !usable {
            tracing::info!(session = %store.session_id(), "Provider token expired");
            self.transition(store, FlowState::Disconnected)?;
            record.state = FlowState::Disconnected;
        }

        let connected = usable;
        Ok(ConnectionStatus {
            state: record.state,
            connected,
            expires_at: tokens
                .filter(|_| connected)
                .and_then(|t| format_millis_rfc3339(t.expires_at)),
        })
    }
}
