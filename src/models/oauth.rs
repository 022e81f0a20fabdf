//! OAuth flow state persisted across the provider redirect.

use serde::{Deserialize, Serialize};

/// Anti-forgery nonce stored under `oauth_state` while a redirect is in flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthState {
    pub nonce: String,
}

/// Provider connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowState {
    #[default]
    Disconnected,
    AwaitingRedirect,
    AwaitingCallback,
    Connected,
}

/// Persisted `oauth_flow` record, rewritten on every transition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowRecord {
    pub state: FlowState,
    /// Epoch millis of the last transition.
    #[serde(default)]
    pub updated_at: i64,
}
