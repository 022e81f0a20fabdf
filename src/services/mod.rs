// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod backend;
pub mod gate;
pub mod identity;
pub mod nft;
pub mod oauth;
pub mod rpc;
pub mod session;

pub use backend::BackendClient;
pub use identity::{
    resolve_wallet, AuthPrincipal, ChainAccount, ReportedPrincipal, ReportedProvider,
    SourceError, WalletIdentity, WalletProvider, WalletSource,
};
pub use nft::{ContractError, MetadataError, NftContract, NftResolver};
pub use oauth::{CallbackParams, ConnectionStatus, OAuthFlow, TokenExchange};
pub use rpc::RpcNftContract;
pub use session::{Session, SessionRegistry};
