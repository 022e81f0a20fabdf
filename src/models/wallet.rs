//! Wallet address model.

use alloy_primitives::Address;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A syntactically valid EVM account address.
///
/// Accepts all-lowercase, all-uppercase, or correctly checksummed input and
/// always renders in EIP-55 checksum form. Equality is by value, so two
/// spellings of the same account compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WalletAddress(Address);

/// Address parse failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("address must be 0x followed by 40 hex digits")]
    Malformed,
    #[error("mixed-case address has an invalid checksum")]
    BadChecksum,
}

impl WalletAddress {
    pub fn parse(raw: &str) -> Result<Self, AddressError> {
        let raw = raw.trim();
        let hex_part = raw
            .strip_prefix("0x")
            .or_else(|| raw.strip_prefix("0X"))
            .ok_or(AddressError::Malformed)?;
        if hex_part.len() != 40 || !hex_part.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(AddressError::Malformed);
        }

        let has_lower = hex_part.bytes().any(|b| b.is_ascii_lowercase());
        let has_upper = hex_part.bytes().any(|b| b.is_ascii_uppercase());
        let address = if has_lower && has_upper {
            Address::parse_checksummed(format!("0x{hex_part}"), None)
                .map_err(|_| AddressError::BadChecksum)?
        } else {
            Address::from_str(&format!("0x{hex_part}")).map_err(|_| AddressError::Malformed)?
        };

        Ok(Self(address))
    }

    /// EIP-55 checksummed form.
    pub fn checksummed(&self) -> String {
        self.0.to_checksum(None)
    }

    pub fn as_address(&self) -> Address {
        self.0
    }

    /// Case-insensitive comparison against a raw address string.
    pub fn matches(&self, other: &str) -> bool {
        self.checksummed().eq_ignore_ascii_case(other.trim())
    }
}

impl From<Address> for WalletAddress {
    fn from(address: Address) -> Self {
        Self(address)
    }
}

impl FromStr for WalletAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.checksummed())
    }
}

impl Serialize for WalletAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.checksummed())
    }
}

impl<'de> Deserialize<'de> for WalletAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Persisted `wallet-storage` blob.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletStorage {
    pub wallet_address: Option<WalletAddress>,
}
