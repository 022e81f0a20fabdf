// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! NFT ownership resolution.
//!
//! The contract has no owner-to-token index, so the resolver walks token IDs
//! `1..=scan_limit` in ascending order and takes the first one the wallet
//! owns whose metadata decodes. This is only complete while IDs are minted
//! sequentially from 1 and total supply stays under the bound.

use crate::error::AppError;
use crate::models::{NftLookup, NftMetadata, NftRecord, WalletAddress};
use alloy_primitives::Address;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use std::sync::Arc;

/// Prefix of an on-chain JSON metadata URI.
pub const TOKEN_URI_PREFIX: &str = "data:application/json;base64,";

/// A contract read failed.
#[derive(Debug, thiserror::Error)]
pub enum ContractError {
    #[error("RPC transport error: {0}")]
    Transport(String),

    #[error("call reverted: {0}")]
    Reverted(String),

    #[error("could not decode call result: {0}")]
    Decode(String),
}

impl From<ContractError> for AppError {
    fn from(err: ContractError) -> Self {
        AppError::Contract(err.to_string())
    }
}

/// Token metadata could not be recovered from a `tokenURI`.
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("token URI is not a base64 JSON data URI")]
    UnsupportedScheme,

    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("invalid metadata JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Read-only surface of the NFT contract.
#[async_trait]
pub trait NftContract: Send + Sync {
    async fn balance_of(&self, owner: Address) -> Result<u64, ContractError>;
    async fn owner_of(&self, token_id: u64) -> Result<Address, ContractError>;
    async fn token_uri(&self, token_id: u64) -> Result<String, ContractError>;
}

/// Decode a `data:application/json;base64,` token URI into metadata.
pub fn decode_token_uri(uri: &str) -> Result<NftMetadata, MetadataError> {
    let payload = uri
        .strip_prefix(TOKEN_URI_PREFIX)
        .ok_or(MetadataError::UnsupportedScheme)?;
    let bytes = STANDARD.decode(payload.trim())?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Encode metadata as a token URI in the same scheme `decode_token_uri` reads.
pub fn encode_token_uri(metadata: &NftMetadata) -> Result<String, MetadataError> {
    let json = serde_json::to_vec(metadata)?;
    Ok(format!("{TOKEN_URI_PREFIX}{}", STANDARD.encode(json)))
}

#[derive(Clone)]
pub struct NftResolver {
    contract: Arc<dyn NftContract>,
    scan_limit: u64,
}

impl NftResolver {
    pub fn new(contract: Arc<dyn NftContract>, scan_limit: u64) -> Self {
        Self {
            contract,
            scan_limit,
        }
    }

    pub fn scan_limit(&self) -> u64 {
        self.scan_limit
    }

    /// Find the wallet's token.
    ///
    /// A zero balance short-circuits without scanning. Per-ID `ownerOf` and
    /// `tokenURI` failures, and undecodable metadata, skip that ID.
    pub async fn resolve(&self, wallet: &WalletAddress) -> Result<NftLookup, AppError> {
        let owner = wallet.as_address();

        let balance = self.contract.balance_of(owner).await?;
        if balance == 0 {
            tracing::debug!(%wallet, "Wallet holds no tokens");
            return Ok(NftLookup::NotFound);
        }

        for token_id in 1..=self.scan_limit {
            let token_owner = match self.contract.owner_of(token_id).await {
                Ok(o) => o,
                Err(e) => {
                    tracing::debug!(token_id, error = %e, "ownerOf failed, skipping");
                    continue;
                }
            };

            if token_owner != owner {
                continue;
            }

            let uri = match self.contract.token_uri(token_id).await {
                Ok(uri) => uri,
                Err(e) => {
                    tracing::warn!(token_id, error = %e, "tokenURI failed, skipping");
                    continue;
                }
            };

            match decode_token_uri(&uri) {
                Ok(metadata) => {
                    tracing::info!(%wallet, token_id, "Resolved NFT");
                    return Ok(NftLookup::Found(NftRecord {
                        token_id,
                        owner: *wallet,
                        metadata,
                    }));
                }
                Err(e) => {
                    tracing::warn!(token_id, error = %e, "Undecodable token metadata, skipping");
                }
            }
        }

        tracing::info!(
            %wallet,
            balance,
            scan_limit = self.scan_limit,
            "No owned token within scan bound"
        );
        Ok(NftLookup::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NftAttribute;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const OWNER: &str = "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045";

    #[derive(Default)]
    struct MockContract {
        balance: u64,
        owners: HashMap<u64, Address>,
        uris: HashMap<u64, String>,
        owner_of_calls: Mutex<Vec<u64>>,
        token_uri_calls: Mutex<Vec<u64>>,
    }

    #[async_trait]
    impl NftContract for MockContract {
        async fn balance_of(&self, _owner: Address) -> Result<u64, ContractError> {
            Ok(self.balance)
        }

        async fn owner_of(&self, token_id: u64) -> Result<Address, ContractError> {
            self.owner_of_calls.lock().unwrap().push(token_id);
            self.owners
                .get(&token_id)
                .copied()
                .ok_or_else(|| ContractError::Reverted("ERC721: invalid token ID".into()))
        }

        async fn token_uri(&self, token_id: u64) -> Result<String, ContractError> {
            self.token_uri_calls.lock().unwrap().push(token_id);
            self.uris
                .get(&token_id)
                .cloned()
                .ok_or_else(|| ContractError::Reverted("no uri".into()))
        }
    }

    fn metadata(name: &str) -> NftMetadata {
        NftMetadata {
            name: name.to_string(),
            image: "ipfs://image".to_string(),
            level: json!("2"),
            attributes: vec![NftAttribute {
                trait_type: "Steps".to_string(),
                value: json!("10000"),
            }],
        }
    }

    fn other(n: u8) -> Address {
        Address::with_last_byte(n)
    }

    fn wallet() -> WalletAddress {
        WalletAddress::parse(OWNER).unwrap()
    }

    #[tokio::test]
    async fn zero_balance_skips_scan() {
        let contract = Arc::new(MockContract::default());
        let resolver = NftResolver::new(contract.clone(), 10);

        assert_eq!(resolver.resolve(&wallet()).await.unwrap(), NftLookup::NotFound);
        assert!(contract.owner_of_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn first_owned_token_wins() {
        let me = wallet().as_address();
        let mut contract = MockContract {
            balance: 1,
            ..Default::default()
        };
        contract.owners.insert(1, other(1));
        contract.owners.insert(2, other(2));
        contract.owners.insert(3, me);
        contract.owners.insert(4, me);
        for id in 1..=4 {
            contract
                .uris
                .insert(id, encode_token_uri(&metadata(&format!("token {id}"))).unwrap());
        }
        let contract = Arc::new(contract);
        let resolver = NftResolver::new(contract.clone(), 10);

        let NftLookup::Found(record) = resolver.resolve(&wallet()).await.unwrap() else {
            panic!("expected a token");
        };
        assert_eq!(record.token_id, 3);
        assert_eq!(record.metadata.name, "token 3");
        assert_eq!(*contract.owner_of_calls.lock().unwrap(), vec![1, 2, 3]);
        assert_eq!(*contract.token_uri_calls.lock().unwrap(), vec![3]);
    }

    #[tokio::test]
    async fn owner_match_is_case_insensitive() {
        let mut contract = MockContract {
            balance: 1,
            ..Default::default()
        };
        contract.owners.insert(1, wallet().as_address());
        contract
            .uris
            .insert(1, encode_token_uri(&metadata("lower")).unwrap());
        let resolver = NftResolver::new(Arc::new(contract), 10);

        let lower = WalletAddress::parse(&OWNER.to_lowercase()).unwrap();
        assert!(matches!(
            resolver.resolve(&lower).await.unwrap(),
            NftLookup::Found(_)
        ));
    }

    #[tokio::test]
    async fn bad_metadata_and_reverts_are_skipped() {
        let me = wallet().as_address();
        let mut contract = MockContract {
            balance: 2,
            ..Default::default()
        };
        // 1 never minted, 2 has a non-data URI, 3 has broken base64, 4 decodes.
        contract.owners.insert(2, me);
        contract.owners.insert(3, me);
        contract.owners.insert(4, me);
        contract
            .uris
            .insert(2, "https://example.com/2.json".to_string());
        contract
            .uris
            .insert(3, format!("{TOKEN_URI_PREFIX}!!!not-base64"));
        contract
            .uris
            .insert(4, encode_token_uri(&metadata("good")).unwrap());
        let resolver = NftResolver::new(Arc::new(contract), 10);

        let NftLookup::Found(record) = resolver.resolve(&wallet()).await.unwrap() else {
            panic!("expected a token");
        };
        assert_eq!(record.token_id, 4);
    }

    #[tokio::test]
    async fn token_beyond_bound_is_not_found() {
        let mut contract = MockContract {
            balance: 1,
            ..Default::default()
        };
        contract.owners.insert(11, wallet().as_address());
        let contract = Arc::new(contract);
        let resolver = NftResolver::new(contract.clone(), 10);

        assert_eq!(resolver.resolve(&wallet()).await.unwrap(), NftLookup::NotFound);
        assert_eq!(contract.owner_of_calls.lock().unwrap().len(), 10);
    }

    #[test]
    fn token_uri_roundtrip() {
        let original = metadata("Venice Fit #1");
        let uri = encode_token_uri(&original).unwrap();
        assert!(uri.starts_with(TOKEN_URI_PREFIX));
        assert_eq!(decode_token_uri(&uri).unwrap(), original);
    }

    #[test]
    fn numeric_trait_values_decode() {
        let payload = json!({
            "name": "Venice Fit #9",
            "image": "ipfs://image",
            "level": 3,
            "attributes": [
                { "trait_type": "Steps", "value": 10000 },
                { "trait_type": "Tier", "value": "gold" }
            ]
        });
        let uri = format!("{TOKEN_URI_PREFIX}{}", STANDARD.encode(payload.to_string()));

        let metadata = decode_token_uri(&uri).unwrap();
        assert_eq!(metadata.level, json!(3));
        assert_eq!(metadata.attributes[0].value, json!(10000));
        assert_eq!(metadata.attributes[1].value, json!("gold"));
    }

    #[test]
    fn wrong_scheme_is_rejected() {
        assert!(matches!(
            decode_token_uri("data:text/plain;base64,e30="),
            Err(MetadataError::UnsupportedScheme)
        ));
    }
}
