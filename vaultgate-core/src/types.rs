//! Canonical records produced by the normalization layer.

use serde::Serialize;
use serde_json::{Map, Value};

/// One canonical transaction record, newest first in history listings.
///
/// `timestamp` is always milliseconds since the Unix epoch. Direction is
/// expressed through the `from`/`to` pair: the owner address appears on
/// exactly one side for any transfer with a known direction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transfer {
    /// Chain transaction id.
    pub txid: String,
    /// Sender, or `""` when the counterparty is unknown.
    pub from: String,
    /// Recipient, or `""` when the counterparty is unknown.
    pub to: String,
    /// Canonical amount string.
    pub value: String,
    /// Milliseconds since the Unix epoch; 0 means unknown.
    pub timestamp: i64,
    /// Display symbol.
    pub symbol: String,
    /// `Some(0)` marks an on-chain rejection that was kept in the listing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<i32>,
}

/// One spendable output (or the chain's closest analog).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Utxo {
    /// Funding transaction id (or object id on Sui).
    #[serde(rename = "txHash")]
    pub tx_hash: String,
    /// Output index within the funding transaction.
    pub index: u64,
    /// Canonical amount string.
    pub value: String,
    /// Locking script where the signer needs it (Dash `scriptPubKey`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    /// Chain-specific extras (Sui object version/digest, block height, ...).
    #[serde(flatten)]
    pub extras: Map<String, Value>,
}

/// Congestion-tiered fee quote, each tier a decimal string in the chain's
/// native unit. Chains without congestion tiers return three equal values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeeQuote {
    /// Cheapest tier.
    pub slow: String,
    /// Default tier.
    pub medium: String,
    /// Priority tier.
    pub fast: String,
}

impl FeeQuote {
    /// A quote whose three tiers are the same value.
    pub fn flat(value: impl Into<String>) -> Self {
        let v = value.into();
        Self {
            slow: v.clone(),
            medium: v.clone(),
            fast: v,
        }
    }
}

/// EVM gas estimate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GasEstimate {
    /// Gas price in wei, decimal string.
    #[serde(rename = "gasPrice")]
    pub gas_price: String,
    /// Heuristic gas limit, decimal string.
    #[serde(rename = "gasLimit")]
    pub gas_limit: String,
}

/// Balance lookup result: either a bare canonical amount or a record that
/// additionally carries chain-specific account state (Ripple sequence and
/// reserves, ...). The record variant is flattened into the API response.
#[derive(Debug, Clone, PartialEq)]
pub enum BalanceResult {
    /// A single canonical amount.
    Amount(String),
    /// Amount plus chain-specific fields, keyed as the client expects them.
    Record(Map<String, Value>),
}

/// TON wallet-contract state as served by `/seqno`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeqnoInfo {
    /// Wallet-contract counter; always 0 for undeployed accounts.
    pub seqno: u64,
    /// Whether the wallet contract is deployed (`active`).
    pub is_deployed: bool,
    /// Canonical balance.
    pub balance: String,
    /// Suggested flat transfer fee in TON.
    pub estimated_fee: String,
}

/// Result of a broadcast attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BroadcastOutcome {
    /// Whether the chain accepted the transaction.
    pub success: bool,
    /// The chain transaction id on success, empty otherwise.
    pub txid: String,
}
