// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for the dashboard session.

use crate::error::{AppError, Result};
use crate::middleware::CurrentSession;
use crate::models::{
    AnalysisRequest, ChatContext, ChatRequest, DashboardData, FlowState, HealthContext, NftLookup,
    NftRecord, StepsHistory, WalletAddress, WalletContext,
};
use crate::services::{
    gate, resolve_wallet, AuthPrincipal, ReportedPrincipal, Session, WalletProvider, WalletSource,
};
use crate::time_utils::Clock;
use crate::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Extension, Json, Router,
};
use futures_util::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// How long an `accountsChanged` post waits for the listener to apply it.
const ACCOUNTS_CHANGED_WAIT: Duration = Duration::from_secs(2);

/// API routes. The session middleware is applied in routes/mod.rs.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route(
            "/api/wallet",
            get(get_wallet).put(put_wallet).delete(delete_wallet),
        )
        .route("/api/wallet/resolve", post(resolve))
        .route("/api/wallet/accounts-changed", post(accounts_changed))
        .route("/api/wallet/events", get(wallet_events))
        .route("/api/nft", get(get_nft))
        .route("/api/fitness/summary", get(fitness_summary))
        .route("/api/fitness/steps", get(fitness_steps))
        .route("/api/fitness/profile", get(fitness_profile))
        .route("/api/analysis", post(analysis))
        .route("/api/chat", post(chat))
}

fn require_wallet(session: &Session) -> Result<WalletAddress> {
    session
        .identity()
        .get_address()
        .ok_or(AppError::WalletRequired)
}

// ─── Current user ────────────────────────────────────────────

/// Fused current-user view.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MeResponse {
    #[cfg_attr(feature = "binding-generation", ts(type = "string | null"))]
    pub wallet_address: Option<WalletAddress>,
    #[cfg_attr(
        feature = "binding-generation",
        ts(type = "\"disconnected\" | \"awaiting_redirect\" | \"awaiting_callback\" | \"connected\"")
    )]
    pub fitbit_state: FlowState,
    pub fitbit_connected: bool,
    pub fitbit_expires_at: Option<String>,
}

async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(CurrentSession(session)): Extension<CurrentSession>,
) -> Result<Json<MeResponse>> {
    let status = state.oauth.status(session.store())?;

    Ok(Json(MeResponse {
        wallet_address: session.identity().get_address(),
        fitbit_state: status.state,
        fitbit_connected: status.connected,
        fitbit_expires_at: status.expires_at,
    }))
}

// ─── Wallet identity ─────────────────────────────────────────

#[derive(Serialize)]
pub struct WalletResponse {
    pub address: Option<WalletAddress>,
}

#[derive(Deserialize)]
pub struct SetWalletRequest {
    pub address: Option<String>,
}

async fn get_wallet(
    Extension(CurrentSession(session)): Extension<CurrentSession>,
) -> Json<WalletResponse> {
    Json(WalletResponse {
        address: session.identity().get_address(),
    })
}

async fn put_wallet(
    Extension(CurrentSession(session)): Extension<CurrentSession>,
    Json(body): Json<SetWalletRequest>,
) -> Result<Json<WalletResponse>> {
    let address = body
        .address
        .map(|raw| {
            WalletAddress::parse(&raw)
                .map_err(|e| AppError::BadRequest(format!("invalid wallet address: {e}")))
        })
        .transpose()?;

    session.identity().set_address(address)?;
    Ok(Json(WalletResponse { address }))
}

async fn delete_wallet(
    Extension(CurrentSession(session)): Extension<CurrentSession>,
) -> Result<StatusCode> {
    session.identity().set_address(None)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Outcome of the browser's `eth_accounts` call, when a provider is injected.
#[derive(Deserialize)]
pub struct ProviderReport {
    #[serde(default)]
    pub accounts: Vec<String>,
    /// Set when the provider call threw.
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Deserialize)]
pub struct ResolveRequest {
    /// Absent when no wallet provider is injected.
    #[serde(default)]
    pub provider: Option<ProviderReport>,
    #[serde(default)]
    pub principal: Option<ReportedPrincipal>,
}

#[derive(Serialize)]
pub struct ResolveResponse {
    pub address: Option<WalletAddress>,
    pub source: Option<WalletSource>,
}

/// Run wallet resolution over the sources the browser reported.
async fn resolve(
    Extension(CurrentSession(session)): Extension<CurrentSession>,
    Json(body): Json<ResolveRequest>,
) -> Result<Json<ResolveResponse>> {
    let provider = body.provider.map(|report| {
        let outcome = match report.error {
            Some(error) => Err(error),
            None => Ok(report.accounts),
        };
        session.reported_provider(outcome)
    });

    // A present provider gets its account-change listener regardless of
    // whether it produced the address.
    if let Some(provider) = &provider {
        session.attach_provider(provider);
    }

    let resolved = resolve_wallet(
        session.identity(),
        provider.as_ref().map(|p| p as &dyn WalletProvider),
        body.principal.as_ref().map(|p| p as &dyn AuthPrincipal),
    )
    .await?;

    Ok(Json(match resolved {
        Some((source, address)) => ResolveResponse {
            address: Some(address),
            source: Some(source),
        },
        None => ResolveResponse {
            address: session.identity().get_address(),
            source: None,
        },
    }))
}

#[derive(Deserialize)]
pub struct AccountsChangedRequest {
    pub accounts: Vec<String>,
}

#[derive(Serialize)]
pub struct AccountsChangedResponse {
    pub delivered: bool,
    pub address: Option<WalletAddress>,
}

/// Forward a provider `accountsChanged` event to the session's listener.
async fn accounts_changed(
    Extension(CurrentSession(session)): Extension<CurrentSession>,
    Json(body): Json<AccountsChangedRequest>,
) -> Result<Json<AccountsChangedResponse>> {
    // An invalid first account is ignored by the listener and produces no update.
    let expect_update = body
        .accounts
        .first()
        .is_none_or(|a| WalletAddress::parse(a).is_ok());

    let mut updates = session.identity().subscribe();
    let delivered = session.notify_accounts_changed(body.accounts);

    if delivered && expect_update {
        // Wait for the listener so the response reflects the new identity.
        let _ = tokio::time::timeout(ACCOUNTS_CHANGED_WAIT, updates.recv()).await;
    } else if !delivered {
        tracing::debug!(session = %session.id(), "accountsChanged with no registered listener");
    }

    Ok(Json(AccountsChangedResponse {
        delivered,
        address: session.identity().get_address(),
    }))
}

fn wallet_event(address: Option<WalletAddress>) -> Event {
    Event::default()
        .event("wallet")
        .json_data(WalletResponse { address })
        .unwrap_or_else(|_| Event::default().event("wallet"))
}

/// Server-sent events: the current wallet, then every subsequent set.
async fn wallet_events(
    Extension(CurrentSession(session)): Extension<CurrentSession>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let receiver = session.identity().subscribe();
    let initial = session.identity().get_address();

    let stream = stream::unfold(
        (Some(initial), receiver),
        |(initial, mut receiver)| async move {
            if let Some(address) = initial {
                return Some((Ok::<_, Infallible>(wallet_event(address)), (None, receiver)));
            }
            loop {
                match receiver.recv().await {
                    Ok(address) => {
                        return Some((Ok(wallet_event(address)), (None, receiver)))
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        },
    );

    Sse::new(stream).keep_alive(KeepAlive::default())
}

// ─── NFT ─────────────────────────────────────────────────────

async fn get_nft(
    State(state): State<Arc<AppState>>,
    Extension(CurrentSession(session)): Extension<CurrentSession>,
) -> Result<Json<NftRecord>> {
    let wallet = require_wallet(&session)?;

    match state.nft.resolve(&wallet).await? {
        NftLookup::Found(record) => Ok(Json(record)),
        NftLookup::NotFound => Err(AppError::NotFound(format!("no token for {wallet}"))),
    }
}

// ─── Fitness data (gated) ────────────────────────────────────

/// Wallet present and provider token usable: the precondition for every
/// provider-data call. Returns the access token.
fn gated_token(state: &AppState, session: &Session) -> Result<String> {
    require_wallet(session)?;
    let tokens = gate::require_usable(session.store(), state.clock.as_ref())?;
    Ok(tokens.access_token)
}

async fn fitness_summary(
    State(state): State<Arc<AppState>>,
    Extension(CurrentSession(session)): Extension<CurrentSession>,
) -> Result<Json<DashboardData>> {
    let token = gated_token(&state, &session)?;
    Ok(Json(
        state.backend.dashboard(&token, state.clock.now()).await?,
    ))
}

async fn fitness_steps(
    State(state): State<Arc<AppState>>,
    Extension(CurrentSession(session)): Extension<CurrentSession>,
) -> Result<Json<StepsHistory>> {
    let token = gated_token(&state, &session)?;
    Ok(Json(
        state.backend.steps_history(&token, state.clock.now()).await?,
    ))
}

async fn fitness_profile(
    State(state): State<Arc<AppState>>,
    Extension(CurrentSession(session)): Extension<CurrentSession>,
) -> Result<Json<Value>> {
    let token = gated_token(&state, &session)?;
    Ok(Json(state.backend.profile(&token).await?))
}

/// Run the AI health analysis over today's dashboard data.
async fn analysis(
    State(state): State<Arc<AppState>>,
    Extension(CurrentSession(session)): Extension<CurrentSession>,
) -> Result<Json<Value>> {
    let token = gated_token(&state, &session)?;
    let data = state.backend.dashboard(&token, state.clock.now()).await?;
    let request = AnalysisRequest::from_dashboard(
        &data,
        WalletContext::new(session.identity().get_address()),
    );

    Ok(Json(state.backend.health_analysis(&token, &request).await?))
}

#[derive(Deserialize)]
pub struct ChatMessage {
    pub message: String,
}

/// Send a chat message with the user's health and wallet context.
async fn chat(
    State(state): State<Arc<AppState>>,
    Extension(CurrentSession(session)): Extension<CurrentSession>,
    Json(body): Json<ChatMessage>,
) -> Result<Json<Value>> {
    let message = body.message.trim();
    if message.is_empty() {
        return Err(AppError::BadRequest("message must not be empty".into()));
    }

    let token = gated_token(&state, &session)?;
    let data = state.backend.dashboard(&token, state.clock.now()).await?;
    let request = ChatRequest {
        message: message.to_string(),
        context: ChatContext {
            health: HealthContext::from_dashboard(&data),
            wallet: WalletContext::new(session.identity().get_address()),
        },
        access_token: token,
    };

    Ok(Json(state.backend.chat(&request).await?))
}
