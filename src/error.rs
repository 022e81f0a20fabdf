// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("A connected wallet is required")]
    WalletRequired,

    #[error("OAuth state mismatch")]
    AuthorizationMismatch,

    #[error("Authorization denied by provider: {0}")]
    AuthorizationDenied(String),

    #[error("Fitness provider connection expired or missing, please reconnect")]
    ReconnectRequired,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Backend API error: {0}")]
    Backend(String),

    #[error("Contract read error: {0}")]
    Contract(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Short machine-readable code used in JSON bodies and redirect query strings.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::WalletRequired => "wallet_required",
            AppError::AuthorizationMismatch => "state_mismatch",
            AppError::AuthorizationDenied(_) => "access_denied",
            AppError::ReconnectRequired => "reconnect_required",
            AppError::NotFound(_) => "not_found",
            AppError::BadRequest(_) => "bad_request",
            AppError::Backend(_) => "backend_error",
            AppError::Contract(_) => "contract_error",
            AppError::Storage(_) => "storage_error",
            AppError::Internal(_) => "internal_error",
        }
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, details) = match &self {
            AppError::WalletRequired => (StatusCode::CONFLICT, Some(self.to_string())),
            AppError::AuthorizationMismatch => (StatusCode::FORBIDDEN, None),
            AppError::AuthorizationDenied(msg) => (StatusCode::FORBIDDEN, Some(msg.clone())),
            AppError::ReconnectRequired => (StatusCode::UNAUTHORIZED, Some(self.to_string())),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, Some(msg.clone())),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, Some(msg.clone())),
            AppError::Backend(msg) => (StatusCode::BAD_GATEWAY, Some(msg.clone())),
            AppError::Contract(msg) => (StatusCode::BAD_GATEWAY, Some(msg.clone())),
            AppError::Storage(msg) => {
                tracing::error!(error = %msg, "Storage error");
                (StatusCode::INTERNAL_SERVER_ERROR, None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, None)
            }
        };

        let body = ErrorResponse {
            error: self.code().to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
