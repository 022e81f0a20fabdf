//! Fitness data payloads exchanged with the backend.
//!
//! Provider data and AI responses are passed through as raw JSON; only the
//! fields this service reads or builds are typed.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::WalletAddress;

/// Wallet context attached to every AI request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletContext {
    pub user_wallet_address: Option<WalletAddress>,
    pub is_wallet_connected: bool,
    pub can_show_wallet_address: bool,
    pub wallet_type: &'static str,
    pub show_full_address: bool,
}

impl WalletContext {
    pub fn new(address: Option<WalletAddress>) -> Self {
        Self {
            is_wallet_connected: address.is_some(),
            user_wallet_address: address,
            can_show_wallet_address: true,
            wallet_type: "ethereum",
            show_full_address: true,
        }
    }
}

/// Today's activity, last night's sleep, and recent workouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardData {
    pub activity: Value,
    pub sleep: Value,
    pub workouts: Value,
}

/// `POST /api/health-analysis` body.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisRequest {
    pub activity: Value,
    pub sleep: Value,
    pub workouts: Value,
    #[serde(flatten)]
    pub wallet: WalletContext,
}

impl AnalysisRequest {
    /// Select the summary slices the analysis endpoint expects.
    pub fn from_dashboard(data: &DashboardData, wallet: WalletContext) -> Self {
        Self {
            activity: data
                .activity
                .get("summary")
                .cloned()
                .unwrap_or_else(|| Value::Object(Default::default())),
            sleep: data
                .sleep
                .get("sleep")
                .and_then(|s| s.get(0))
                .cloned()
                .unwrap_or_else(|| Value::Object(Default::default())),
            workouts: data
                .workouts
                .get("activities")
                .cloned()
                .unwrap_or_else(|| Value::Array(Vec::new())),
            wallet,
        }
    }
}

/// Health figures sent along with a chat message.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthContext {
    pub steps: Option<u64>,
    pub active_minutes: u64,
    pub distance: Option<f64>,
    pub calories: Option<u64>,
    pub sleep_duration: Option<u64>,
    pub sleep_efficiency: Option<u64>,
}

impl HealthContext {
    pub fn from_dashboard(data: &DashboardData) -> Self {
        let summary = data.activity.get("summary");
        let field = |name: &str| summary.and_then(|s| s.get(name)).and_then(Value::as_u64);
        let sleep = data.sleep.get("sleep").and_then(|s| s.get(0));
        let sleep_field = |name: &str| sleep.and_then(|s| s.get(name)).and_then(Value::as_u64);

        Self {
            steps: field("steps"),
            active_minutes: field("fairlyActiveMinutes").unwrap_or(0)
                + field("veryActiveMinutes").unwrap_or(0),
            distance: summary
                .and_then(|s| s.get("distances"))
                .and_then(|d| d.get(0))
                .and_then(|d| d.get("distance"))
                .and_then(Value::as_f64),
            calories: field("caloriesOut"),
            sleep_duration: sleep_field("minutesAsleep"),
            sleep_efficiency: sleep_field("efficiency"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatContext {
    #[serde(flatten)]
    pub health: HealthContext,
    #[serde(flatten)]
    pub wallet: WalletContext,
}

/// `POST /api/chat` body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    pub context: ChatContext,
    pub access_token: String,
}

/// One day of the steps time series.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepDay {
    pub date_time: String,
    pub value: String,
}

/// Seven-day steps history with its daily average.
#[derive(Debug, Clone, Serialize)]
pub struct StepsHistory {
    pub days: Vec<StepDay>,
    pub average: u64,
}

impl StepsHistory {
    /// Average over the fixed seven-day window, treating unparseable days as zero.
    pub fn from_days(days: Vec<StepDay>) -> Self {
        let total: u64 = days
            .iter()
            .map(|d| d.value.trim().parse::<u64>().unwrap_or(0))
            .sum();
        let average = (total as f64 / STEPS_WINDOW_DAYS as f64).round() as u64;
        Self { days, average }
    }
}

/// Length of the steps history window.
pub const STEPS_WINDOW_DAYS: i64 = 7;
