// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Token freshness gate.
//!
//! Checked before every authenticated backend call. There is no silent
//! refresh: an unusable token set means the user must reconnect.

use crate::error::AppError;
use crate::models::TokenSet;
use crate::store::{keys, SessionStore};
use crate::time_utils::Clock;

/// True iff the access token is non-empty and `expires_at` is in the future.
pub fn is_usable(tokens: &TokenSet, now_millis: i64) -> bool {
    !tokens.access_token.is_empty() && tokens.expires_at > now_millis
}

/// Load the stored token set and require it to be usable.
pub fn require_usable(store: &SessionStore, clock: &dyn Clock) -> Result<TokenSet, AppError> {
    let tokens = store
        .get_json::<TokenSet>(keys::FITBIT_TOKENS)?
        .ok_or(AppError::ReconnectRequired)?;

    if !is_usable(&tokens, clock.now_millis()) {
        tracing::info!(
            session = %store.session_id(),
            expires_at = tokens.expires_at,
            "Stored provider token is not usable"
        );
        return Err(AppError::ReconnectRequired);
    }

    Ok(tokens)
}
