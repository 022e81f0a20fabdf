// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Browser session cookie middleware.
//!
//! The cookie carries a signed JWT whose subject is an opaque session id.
//! Requests without a valid cookie get a fresh session, and the new cookie
//! is set on the response.

use crate::error::AppError;
use crate::services::Session;
use crate::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

pub const SESSION_COOKIE: &str = "venice_session";

/// Session lifetime (30 days).
const SESSION_TTL_SECS: u64 = 30 * 24 * 60 * 60;

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Session id
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

/// The caller's session, inserted into request extensions.
#[derive(Clone)]
pub struct CurrentSession(pub Arc<Session>);

/// Create a signed session token for `session_id`.
pub fn create_session_token(session_id: &str, signing_key: &[u8]) -> anyhow::Result<String> {
    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();

    let claims = Claims {
        sub: session_id.to_string(),
        iat: now as usize,
        exp: (now + SESSION_TTL_SECS) as usize,
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )?)
}

/// Verify a session token and return its session id.
pub fn verify_session_token(token: &str, signing_key: &[u8]) -> Option<String> {
    let key = DecodingKey::from_secret(signing_key);
    let validation = Validation::new(Algorithm::HS256);

    decode::<Claims>(token, &key, &validation)
        .ok()
        .map(|data| data.claims.sub)
        .filter(|sub| !sub.is_empty())
}

fn new_session_id() -> Result<String, AppError> {
    let mut bytes = [0u8; 16];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("system RNG failure")))?;
    Ok(hex::encode(bytes))
}

/// Build the session cookie for `token`.
pub fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(SESSION_TTL_SECS as i64))
        .build()
}

/// Cookie that clears the session on the browser.
pub fn removal_cookie() -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE).path("/").build()
}

/// Attach the caller's session, minting one when the cookie is absent or
/// invalid.
pub async fn with_session(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let key = &state.config.session_signing_key;
    let existing = jar
        .get(SESSION_COOKIE)
        .and_then(|c| verify_session_token(c.value(), key));

    let (session_id, minted) = match existing {
        Some(id) => (id, None),
        None => {
            let id = new_session_id()?;
            let token = create_session_token(&id, key)?;
            tracing::debug!(session = %id, "Started new session");
            (id, Some(token))
        }
    };

    let session = state.sessions.get_or_load(&session_id)?;
    request.extensions_mut().insert(CurrentSession(session));

    let response = next.run(request).await;
    state.sessions.release(&session_id);

    Ok(match minted {
        Some(token) => {
            let secure = state.config.public_url.starts_with("https://");
            (jar.add(session_cookie(token, secure)), response).into_response()
        }
        None => response,
    })
}
