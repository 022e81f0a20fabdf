//! Application configuration loaded from environment variables.
//!
//! A `.env` file is honoured for local development.

use std::env;

const DEFAULT_FRONTEND_URL: &str = "http://localhost:5173";
const DEFAULT_PUBLIC_URL: &str = "http://localhost:8080";
const DEFAULT_AUTHORIZE_URL: &str = "https://www.fitbit.com/oauth2/authorize";
const DEFAULT_SCOPE: &str = "activity heartrate profile sleep";
const DEFAULT_RPC_URL: &str = "https://arbitrum-sepolia-rpc.publicnode.com";
const DEFAULT_NFT_CONTRACT: &str = "0xa0b125B1078A625C433C8Bb39c70EBD8f3729b73";

/// Default upper bound for the sequential token-ID scan.
pub const DEFAULT_NFT_SCAN_LIMIT: u64 = 10;

/// Path of the OAuth callback route served by this application.
pub const CALLBACK_PATH: &str = "/auth/fitbit/callback";

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Fitness provider OAuth ---
    /// Fitbit OAuth client ID (public)
    pub fitbit_client_id: String,
    /// Provider authorization endpoint
    pub fitbit_authorize_url: String,
    /// Fixed scope requested on every authorization
    pub fitbit_scope: String,

    // --- Collaborators ---
    /// Backend base URL for token exchange and proxied data calls
    pub api_url: String,
    /// Browser app origin, where the OAuth callback lands the user
    pub frontend_url: String,
    /// Public base URL of this service (used to build the redirect URI)
    pub public_url: String,

    // --- Chain ---
    /// JSON-RPC endpoint for contract reads
    pub rpc_url: String,
    /// NFT contract address
    pub nft_contract_address: String,
    /// Highest token ID probed when scanning for the wallet's token
    pub nft_scan_limit: u64,

    // --- Storage / server ---
    /// JSON file backing the credential store; in-memory when unset
    pub store_path: Option<String>,
    /// Redirect plain-HTTP requests to HTTPS
    pub enforce_https: bool,
    /// Server port
    pub port: u16,

    // --- Secrets ---
    /// HS256 key for session cookies (raw bytes)
    pub session_signing_key: Vec<u8>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let nft_scan_limit = match env::var("NFT_SCAN_LIMIT") {
            Ok(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid("NFT_SCAN_LIMIT", raw))?,
            Err(_) => DEFAULT_NFT_SCAN_LIMIT,
        };

        Ok(Self {
            fitbit_client_id: env::var("FITBIT_CLIENT_ID")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("FITBIT_CLIENT_ID"))?,
            fitbit_authorize_url: env::var("FITBIT_AUTHORIZE_URL")
                .unwrap_or_else(|_| DEFAULT_AUTHORIZE_URL.to_string()),
            fitbit_scope: env::var("FITBIT_SCOPE").unwrap_or_else(|_| DEFAULT_SCOPE.to_string()),
            api_url: env::var("API_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .map_err(|_| ConfigError::Missing("API_URL"))?,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| DEFAULT_FRONTEND_URL.to_string()),
            public_url: env::var("PUBLIC_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| DEFAULT_PUBLIC_URL.to_string()),
            rpc_url: env::var("RPC_URL").unwrap_or_else(|_| DEFAULT_RPC_URL.to_string()),
            nft_contract_address: env::var("NFT_CONTRACT_ADDRESS")
                .unwrap_or_else(|_| DEFAULT_NFT_CONTRACT.to_string()),
            nft_scan_limit,
            store_path: env::var("STORE_PATH").ok().filter(|p| !p.trim().is_empty()),
            enforce_https: env::var("ENFORCE_HTTPS")
                .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
                .unwrap_or(false),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            session_signing_key: env::var("SESSION_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("SESSION_SIGNING_KEY"))?
                .into_bytes(),
        })
    }

    /// Deterministic config for tests.
    pub fn test_default() -> Self {
        Self {
            fitbit_client_id: "test_client_id".to_string(),
            fitbit_authorize_url: DEFAULT_AUTHORIZE_URL.to_string(),
            fitbit_scope: DEFAULT_SCOPE.to_string(),
            api_url: "http://localhost:9000".to_string(),
            frontend_url: DEFAULT_FRONTEND_URL.to_string(),
            public_url: DEFAULT_PUBLIC_URL.to_string(),
            rpc_url: DEFAULT_RPC_URL.to_string(),
            nft_contract_address: DEFAULT_NFT_CONTRACT.to_string(),
            nft_scan_limit: DEFAULT_NFT_SCAN_LIMIT,
            store_path: None,
            enforce_https: false,
            port: 8080,
            session_signing_key: b"test_session_key_32_bytes_min!!".to_vec(),
        }
    }

    /// Redirect URI registered with the provider: this app's own callback route.
    pub fn redirect_uri(&self) -> String {
        format!("{}{}", self.public_url, CALLBACK_PATH)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
