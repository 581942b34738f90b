//! Chain and token descriptors loaded from the registry file.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier of a blockchain as served by the gateway, e.g.
/// `"ethereum"`, `"ton"`, `"ripple"`. Always lowercase; unique across the
/// registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainKey(String);

impl ChainKey {
    /// Build a key, normalizing to lowercase.
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(id.as_ref().to_ascii_lowercase())
    }

    /// The raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChainKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChainKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl Borrow<str> for ChainKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Signature curve of a chain's key material. The gateway never signs, but
/// the companion app needs this to derive watch-only addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Curve {
    /// secp256k1 (Bitcoin family, EVM family, Tron, Ripple)
    Secp256k1,
    /// ed25519 (Solana, TON, Sui)
    Ed25519,
}

/// Read-only descriptor of one supported coin. Loaded once at boot;
/// the source of truth for display precision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoinMeta {
    /// Registry identifier, also the router key.
    pub id: ChainKey,
    /// Ticker symbol, uppercase (`BTC`, `ETH`, ...).
    pub symbol: String,
    /// Human-readable name.
    pub name: String,
    /// Number of decimal places of the smallest on-chain unit.
    pub decimals: u32,
    /// Signature curve.
    pub curve: Curve,
    /// Chain family (`bitcoin`, `ethereum`, `solana`, ...). All EVM
    /// compatible chains share the `ethereum` family.
    pub blockchain: String,
    /// EVM chain id where applicable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
}

impl CoinMeta {
    /// Whether the coin lives on an EVM-compatible chain.
    pub fn is_evm(&self) -> bool {
        self.blockchain == "ethereum"
    }
}

/// One whitelisted token contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenMeta {
    /// The chain the contract is deployed on.
    pub coin: ChainKey,
    /// Ticker symbol, uppercase.
    pub symbol: String,
    /// Human-readable name (`USDT-ERC20`, ...).
    pub name: String,
    /// Contract address in the chain's native encoding.
    pub contract: String,
    /// Token decimal places.
    pub decimals: u32,
}
