//! NFT ownership records.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::WalletAddress;

/// One trait entry in the token metadata. Minted metadata carries both
/// string and numeric trait values, so `value` is kept as raw JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NftAttribute {
    pub trait_type: String,
    pub value: Value,
}

/// Decoded `tokenURI` JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NftMetadata {
    pub name: String,
    #[serde(default)]
    pub image: String,
    /// String or number, depending on the minting contract version.
    #[serde(default)]
    pub level: Value,
    #[serde(default)]
    pub attributes: Vec<NftAttribute>,
}

/// The wallet's token: first owned ID in ascending order that decoded cleanly.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NftRecord {
    pub token_id: u64,
    pub owner: WalletAddress,
    pub metadata: NftMetadata,
}

/// Outcome of an ownership lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum NftLookup {
    Found(NftRecord),
    NotFound,
}
