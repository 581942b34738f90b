//! Provider capability traits and the tagged capability record.
//!
//! Upstream support is partial by nature: most providers implement a handful
//! of operations for a handful of chains. Rather than one wide interface full
//! of no-op defaults, each adapter implements only the traits it can honor
//! and exposes a [`ProviderCapabilities`] record; the router checks presence
//! before dispatching.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::UpstreamError;
use crate::types::{BalanceResult, FeeQuote, GasEstimate, SeqnoInfo, Transfer, Utxo};

/// Result alias for provider calls.
pub type ProviderResult<T> = Result<T, UpstreamError>;

/// One routable operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Account balance (native or token).
    Balance,
    /// Chain-specific account resource record (Tron energy/bandwidth).
    AccountResource,
    /// Transaction history.
    Transactions,
    /// Spendable outputs.
    Utxos,
    /// Fee quote.
    Fee,
    /// EVM account nonce.
    Nonce,
    /// EVM gas estimate.
    EstimateGas,
    /// TON seqno record.
    Seqno,
    /// Latest block header.
    LatestBlock,
    /// Signed transaction broadcast.
    Broadcast,
    /// Single-transaction detail lookup.
    TxDetail,
}

/// Account balance lookup.
#[async_trait]
pub trait BalanceApi: Send + Sync {
    /// Fetch the balance of `address` on `chain`, optionally scoped to a
    /// whitelisted token `contract`.
    async fn balance(
        &self,
        chain: &str,
        address: &str,
        contract: Option<&str>,
    ) -> ProviderResult<BalanceResult>;
}

/// Chain-specific account resource lookup.
#[async_trait]
pub trait AccountResourceApi: Send + Sync {
    /// Fetch the resource record for `address`.
    async fn account_resource(
        &self,
        chain: &str,
        address: &str,
        contract: Option<&str>,
    ) -> ProviderResult<Map<String, Value>>;
}

/// Transaction history, newest first.
#[async_trait]
pub trait TxHistoryApi: Send + Sync {
    /// Fetch up to `limit` canonical transfers involving `address`.
    async fn transactions(
        &self,
        chain: &str,
        address: &str,
        contract: Option<&str>,
        limit: usize,
    ) -> ProviderResult<Vec<Transfer>>;
}

/// Spendable output listing.
#[async_trait]
pub trait UtxoApi: Send + Sync {
    /// Fetch outputs covering `total_value` where the upstream supports the
    /// hint, all outputs otherwise.
    async fn utxos(&self, chain: &str, address: &str, total_value: &str)
        -> ProviderResult<Vec<Utxo>>;
}

/// Fee quotes.
#[async_trait]
pub trait FeeApi: Send + Sync {
    /// Fetch the tiered fee quote for `chain`.
    async fn fee(&self, chain: &str) -> ProviderResult<FeeQuote>;
}

/// EVM nonce lookup.
#[async_trait]
pub trait NonceApi: Send + Sync {
    /// Fetch the `pending` transaction count so sequential sends stack.
    async fn nonce(&self, chain: &str, address: &str) -> ProviderResult<u64>;
}

/// EVM gas estimation.
#[async_trait]
pub trait GasApi: Send + Sync {
    /// Fetch the gas price and a heuristic limit.
    async fn estimate_gas(
        &self,
        chain: &str,
        address: &str,
        contract: Option<&str>,
    ) -> ProviderResult<GasEstimate>;
}

/// TON seqno lookup.
#[async_trait]
pub trait SeqnoApi: Send + Sync {
    /// Fetch the wallet-contract seqno record.
    async fn seqno(&self, chain: &str, address: &str) -> ProviderResult<SeqnoInfo>;
}

/// Latest block header lookup.
#[async_trait]
pub trait LatestBlockApi: Send + Sync {
    /// Fetch the latest block header with chain-specific keys. An empty map
    /// means the upstream had nothing to offer.
    async fn latest_block(&self, chain: &str, address: &str)
        -> ProviderResult<Map<String, Value>>;
}

/// Signed transaction broadcast.
#[async_trait]
pub trait BroadcastApi: Send + Sync {
    /// Submit the signed payload; returns the chain transaction id. The
    /// payload is hex for most chains, base58 for Solana, a
    /// `{txBytes, signature}` pair for Sui, and a JSON object for Tron.
    async fn broadcast(&self, chain: &str, payload: &Value) -> ProviderResult<String>;
}

/// Single-transaction detail lookup.
#[async_trait]
pub trait TxDetailApi: Send + Sync {
    /// Fetch the transaction by id, `NotFound` when the chain has no record.
    async fn transaction(&self, chain: &str, tx_id: &str) -> ProviderResult<Value>;
}

/// The capability record the router consults. Absent capabilities are
/// `None`; the router never dispatches to them.
#[derive(Clone, Default)]
pub struct ProviderCapabilities {
    /// Stable provider name used in routing tables and logs.
    pub name: &'static str,
    /// Balance lookups.
    pub balance: Option<Arc<dyn BalanceApi>>,
    /// Account resource lookups.
    pub account_resource: Option<Arc<dyn AccountResourceApi>>,
    /// History lookups.
    pub transactions: Option<Arc<dyn TxHistoryApi>>,
    /// UTXO lookups.
    pub utxos: Option<Arc<dyn UtxoApi>>,
    /// Fee quotes.
    pub fee: Option<Arc<dyn FeeApi>>,
    /// Nonce lookups.
    pub nonce: Option<Arc<dyn NonceApi>>,
    /// Gas estimates.
    pub gas: Option<Arc<dyn GasApi>>,
    /// Seqno lookups.
    pub seqno: Option<Arc<dyn SeqnoApi>>,
    /// Latest-block lookups.
    pub latest_block: Option<Arc<dyn LatestBlockApi>>,
    /// Broadcasts.
    pub broadcast: Option<Arc<dyn BroadcastApi>>,
    /// Transaction detail lookups.
    pub tx_detail: Option<Arc<dyn TxDetailApi>>,
}

impl ProviderCapabilities {
    /// Whether this provider implements `op`.
    pub fn supports(&self, op: Operation) -> bool {
        match op {
            Operation::Balance => self.balance.is_some(),
            Operation::AccountResource => self.account_resource.is_some(),
            Operation::Transactions => self.transactions.is_some(),
            Operation::Utxos => self.utxos.is_some(),
            Operation::Fee => self.fee.is_some(),
            Operation::Nonce => self.nonce.is_some(),
            Operation::EstimateGas => self.gas.is_some(),
            Operation::Seqno => self.seqno.is_some(),
            Operation::LatestBlock => self.latest_block.is_some(),
            Operation::Broadcast => self.broadcast.is_some(),
            Operation::TxDetail => self.tx_detail.is_some(),
        }
    }
}

impl std::fmt::Debug for ProviderCapabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderCapabilities")
            .field("name", &self.name)
            .field("balance", &self.balance.is_some())
            .field("account_resource", &self.account_resource.is_some())
            .field("transactions", &self.transactions.is_some())
            .field("utxos", &self.utxos.is_some())
            .field("fee", &self.fee.is_some())
            .field("nonce", &self.nonce.is_some())
            .field("gas", &self.gas.is_some())
            .field("seqno", &self.seqno.is_some())
            .field("latest_block", &self.latest_block.is_some())
            .field("broadcast", &self.broadcast.is_some())
            .field("tx_detail", &self.tx_detail.is_some())
            .finish()
    }
}
