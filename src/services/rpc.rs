// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! NFT contract reads over JSON-RPC `eth_call`.

use crate::services::nft::{ContractError, NftContract};
use alloy_primitives::{Address, U256};
use alloy_sol_types::{sol, SolCall};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

const RPC_TIMEOUT: Duration = Duration::from_secs(20);

sol! {
    function balanceOf(address owner) external view returns (uint256);
    function ownerOf(uint256 tokenId) external view returns (address);
    function tokenURI(uint256 tokenId) external view returns (string);
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    error: Option<Value>,
}

/// ERC-721 reads against a single contract.
#[derive(Clone)]
pub struct RpcNftContract {
    http: reqwest::Client,
    rpc_url: String,
    contract: Address,
}

impl RpcNftContract {
    pub fn new(rpc_url: impl Into<String>, contract: Address) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(RPC_TIMEOUT)
                .build()
                .unwrap_or_default(),
            rpc_url: rpc_url.into(),
            contract,
        }
    }

    async fn eth_call(&self, data: Vec<u8>) -> Result<Vec<u8>, ContractError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_call",
            "params": [
                {
                    "to": self.contract.to_checksum(None),
                    "data": format!("0x{}", hex::encode(data)),
                },
                "latest",
            ],
        });

        let response = self
            .http
            .post(&self.rpc_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ContractError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ContractError::Transport(format!("HTTP {status}: {body}")));
        }

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|e| ContractError::Transport(e.to_string()))?;

        // Reverts (e.g. ownerOf on an unminted ID) come back as JSON-RPC errors.
        if let Some(err) = body.error {
            return Err(ContractError::Reverted(err.to_string()));
        }

        let raw = body
            .result
            .ok_or_else(|| ContractError::Decode("response missing result".into()))?;
        hex::decode(raw.trim_start_matches("0x")).map_err(|e| ContractError::Decode(e.to_string()))
    }
}

#[async_trait]
impl NftContract for RpcNftContract {
    async fn balance_of(&self, owner: Address) -> Result<u64, ContractError> {
        let out = self.eth_call(balanceOfCall { owner }.abi_encode()).await?;
        let balance = balanceOfCall::abi_decode_returns(&out)
            .map_err(|e| ContractError::Decode(format!("balanceOf: {e}")))?;
        Ok(balance.saturating_to::<u64>())
    }

    async fn owner_of(&self, token_id: u64) -> Result<Address, ContractError> {
        let out = self
            .eth_call(
                ownerOfCall {
                    tokenId: U256::from(token_id),
                }
                .abi_encode(),
            )
            .await?;
        ownerOfCall::abi_decode_returns(&out)
            .map_err(|e| ContractError::Decode(format!("ownerOf: {e}")))
    }

    async fn token_uri(&self, token_id: u64) -> Result<String, ContractError> {
        let out = self
            .eth_call(
                tokenURICall {
                    tokenId: U256::from(token_id),
                }
                .abi_encode(),
            )
            .await?;
        tokenURICall::abi_decode_returns(&out)
            .map_err(|e| ContractError::Decode(format!("tokenURI: {e}")))
    }
}
