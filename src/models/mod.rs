// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod fitness;
pub mod nft;
pub mod oauth;
pub mod tokens;
pub mod wallet;

pub use fitness::{
    AnalysisRequest, ChatContext, ChatRequest, DashboardData, HealthContext, StepDay,
    StepsHistory, WalletContext, STEPS_WINDOW_DAYS,
};
pub use nft::{NftAttribute, NftLookup, NftMetadata, NftRecord};
pub use oauth::{FlowRecord, FlowState, OAuthState};
pub use tokens::{TokenExchangeResponse, TokenSet};
pub use wallet::{AddressError, WalletAddress, WalletStorage};
