// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fitness-provider OAuth routes and logout.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Redirect,
    routing::{get, post},
    Extension, Router,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

use crate::config::CALLBACK_PATH;
use crate::error::{AppError, Result};
use crate::middleware::session::removal_cookie;
use crate::middleware::CurrentSession;
use crate::services::CallbackParams;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/fitbit", get(auth_start))
        .route(CALLBACK_PATH, get(auth_callback))
        .route("/auth/fitbit/disconnect", post(disconnect))
        .route("/auth/logout", post(logout))
}

/// Send the browser back to the frontend with an error code.
fn error_redirect(state: &AppState, err: &AppError) -> Redirect {
    Redirect::to(&format!(
        "{}/?error={}",
        state.config.frontend_url,
        urlencoding::encode(err.code())
    ))
}

/// Start OAuth flow - redirect to the provider's authorization page.
async fn auth_start(
    State(state): State<Arc<AppState>>,
    Extension(CurrentSession(session)): Extension<CurrentSession>,
) -> Redirect {
    let wallet = session.identity().get_address();

    match state.oauth.initiate(session.store(), wallet) {
        Ok(url) => Redirect::to(&url),
        Err(e) => {
            tracing::warn!(session = %session.id(), error = %e, "Cannot start authorization");
            error_redirect(&state, &e)
        }
    }
}

/// OAuth callback - validate state, exchange the code, land on the dashboard.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    Extension(CurrentSession(session)): Extension<CurrentSession>,
    Query(params): Query<CallbackParams>,
) -> Redirect {
    match state.oauth.handle_callback(session.store(), &params).await {
        Ok(_) => Redirect::to(&format!("{}/dashboard", state.config.frontend_url)),
        Err(e) => {
            tracing::warn!(session = %session.id(), error = %e, "OAuth callback failed");
            error_redirect(&state, &e)
        }
    }
}

/// Drop the provider connection; the wallet stays connected.
async fn disconnect(
    State(state): State<Arc<AppState>>,
    Extension(CurrentSession(session)): Extension<CurrentSession>,
) -> Result<StatusCode> {
    state.oauth.disconnect(session.store())?;
    Ok(StatusCode::NO_CONTENT)
}

/// Log out: clear the wallet and provider tokens and end the session.
async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(CurrentSession(session)): Extension<CurrentSession>,
    jar: CookieJar,
) -> Result<(CookieJar, StatusCode)> {
    // Clear first so open event streams observe the logout.
    session.identity().set_address(None)?;
    state.sessions.end(session.id())?;

    tracing::info!(session = %session.id(), "Logged out");
    Ok((jar.remove(removal_cookie()), StatusCode::NO_CONTENT))
}
