// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Venice dashboard API server
//!
//! Holds the browser session's wallet identity and fitness-provider
//! credentials server-side and fronts the backend and chain reads.

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use venice_dashboard::{config::Config, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting Venice dashboard API");
    tracing::info!(
        rpc_url = %config.rpc_url,
        contract = %config.nft_contract_address,
        scan_limit = config.nft_scan_limit,
        "NFT resolver configured"
    );

    // Build shared state (credential store, backend client, contract reads)
    let state = Arc::new(AppState::from_config(config.clone()).expect("Failed to initialize services"));

    // Build router
    let app = venice_dashboard::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("venice_dashboard=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
