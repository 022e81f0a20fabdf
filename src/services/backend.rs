// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Backend API client.
//!
//! Handles:
//! - Authorization-code exchange (the backend holds the provider secret)
//! - Fitness data reads proxied through the backend
//! - AI analysis and chat requests
//!
//! Every call is a single attempt; failures are returned to the caller.

use crate::error::AppError;
use crate::models::{
    AnalysisRequest, ChatRequest, DashboardData, StepDay, StepsHistory, TokenExchangeResponse,
    WalletAddress, STEPS_WINDOW_DAYS,
};
use crate::services::oauth::TokenExchange;
use crate::time_utils::format_date;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Number of recent workouts requested for the dashboard.
const RECENT_WORKOUTS: u32 = 10;

#[derive(Serialize)]
struct TokenRequest<'a> {
    code: &'a str,
    wallet_address: String,
    redirect_uri: &'a str,
}

#[derive(Deserialize)]
struct StepsResponse {
    #[serde(rename = "activities-steps")]
    activities_steps: Option<Vec<StepDay>>,
}

/// Backend API client.
#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Provider profile (`user.encodedId` and friends).
    pub async fn profile(&self, access_token: &str) -> Result<Value, AppError> {
        self.get_json("/api/fitbit/profile", access_token).await
    }

    /// Today's activity, last night's sleep, and recent workouts, fetched
    /// concurrently. Any one failure fails the whole summary.
    pub async fn dashboard(
        &self,
        access_token: &str,
        now: DateTime<Utc>,
    ) -> Result<DashboardData, AppError> {
        let today = format_date(now);
        let yesterday = format_date(now - Duration::days(1));

        let activity_path = format!("/api/fitbit/proxy/1/user/-/activities/date/{today}.json");
        let sleep_path = format!("/api/fitbit/proxy/1.2/user/-/sleep/date/{yesterday}/{today}.json");
        let workouts_path = format!(
            "/api/fitbit/proxy/1/user/-/activities/list.json?beforeDate={today}&sort=desc&offset=0&limit={RECENT_WORKOUTS}"
        );

        let (activity, sleep, workouts) = tokio::try_join!(
            self.get_json::<Value>(&activity_path, access_token),
            self.get_json::<Value>(&sleep_path, access_token),
            self.get_json::<Value>(&workouts_path, access_token),
        )?;

        Ok(DashboardData {
            activity,
            sleep,
            workouts,
        })
    }

    /// Daily steps for the seven days ending `now`.
    pub async fn steps_history(
        &self,
        access_token: &str,
        now: DateTime<Utc>,
    ) -> Result<StepsHistory, AppError> {
        let end = format_date(now);
        let start = format_date(now - Duration::days(STEPS_WINDOW_DAYS - 1));
        let path = format!("/api/fitbit/proxy/1/user/-/activities/steps/date/{start}/{end}.json");

        let response: StepsResponse = self.get_json(&path, access_token).await?;
        let days = response
            .activities_steps
            .ok_or_else(|| AppError::Backend("steps response missing activities-steps".into()))?;

        Ok(StepsHistory::from_days(days))
    }

    pub async fn health_analysis(
        &self,
        access_token: &str,
        request: &AnalysisRequest,
    ) -> Result<Value, AppError> {
        self.post_json("/api/health-analysis", access_token, request)
            .await
    }

    pub async fn chat(&self, request: &ChatRequest) -> Result<Value, AppError> {
        self.post_json("/api/chat", &request.access_token, request)
            .await
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        access_token: &str,
    ) -> Result<T, AppError> {
        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::Backend(e.to_string()))?;

        Self::check_response_json(response).await
    }

    async fn post_json<B: Serialize + ?Sized, T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        access_token: &str,
        body: &B,
    ) -> Result<T, AppError> {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(access_token)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::Backend(e.to_string()))?;

        Self::check_response_json(response).await
    }

    /// Check response status and parse the JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            tracing::info!("Backend rejected provider token (401)");
            return Err(AppError::ReconnectRequired);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%status, "Backend request failed");
            return Err(AppError::Backend(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Backend(format!("JSON parse error: {}", e)))
    }
}

#[async_trait]
impl TokenExchange for BackendClient {
    async fn exchange_code(
        &self,
        code: &str,
        wallet: &WalletAddress,
        redirect_uri: &str,
    ) -> Result<TokenExchangeResponse, AppError> {
        let body = TokenRequest {
            code,
            wallet_address: wallet.checksummed(),
            redirect_uri,
        };

        let response = self
            .http
            .post(format!("{}/api/fitbit/token", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Backend(format!("Token exchange request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Backend(format!(
                "Token exchange failed: HTTP {}: {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Backend(format!("Token exchange JSON parse error: {}", e)))
    }
}
