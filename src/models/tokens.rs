//! Fitness-provider token set.

use serde::{Deserialize, Serialize};

/// Stored provider credentials (`fitbit_tokens`).
///
/// `expires_at` is an absolute epoch-millis deadline computed locally when
/// the set is stored. Fields default so that a partial or hand-edited blob
/// still deserializes and is then rejected by the freshness gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    #[serde(default)]
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: i64,
}

impl TokenSet {
    /// Build a token set from an exchange response, anchoring the relative
    /// `expires_in` (seconds) to `now_millis`.
    pub fn from_exchange(response: TokenExchangeResponse, now_millis: i64) -> Self {
        let lifetime_ms = response.expires_in.saturating_mul(1000);
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_at: now_millis.saturating_add(lifetime_ms),
        }
    }
}

/// Token exchange response from the backend.
///
/// Any absolute expiry the provider may include is ignored; only the
/// relative `expires_in` is read.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenExchangeResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_in: i64,
}
