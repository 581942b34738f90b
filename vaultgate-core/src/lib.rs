//! Canonical data model for the vaultgate aggregation gateway.
//!
//! Everything the per-provider adapters normalize *into* lives here: chain
//! and token metadata, the canonical amount/transfer representation, the
//! upstream error taxonomy, and the capability traits the router dispatches
//! against. This crate knows nothing about HTTP or any concrete upstream.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod amount;
pub mod chain;
pub mod encoding;
pub mod error;
pub mod provider;
pub mod registry;
pub mod types;

pub use amount::AmountCodec;
pub use chain::{ChainKey, CoinMeta, Curve, TokenMeta};
pub use error::UpstreamError;
pub use provider::{Operation, ProviderCapabilities};
pub use registry::Registry;
pub use types::{
    BalanceResult, BroadcastOutcome, FeeQuote, GasEstimate, SeqnoInfo, Transfer, Utxo,
};
