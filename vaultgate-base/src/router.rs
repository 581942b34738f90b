//! Static per-operation routing over the provider capability records.
//!
//! The router walks the ordered provider list for `(chain, operation)` and
//! dispatches to the first one implementing the capability. It does not
//! cascade across providers on error — transaction state needs one source
//! of truth — with one exception: token balance lookups may fall through
//! the tiers (the price tiers cascade inside the aggregator).

use std::collections::HashMap;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

use vaultgate_core::provider::Operation;
use vaultgate_core::{
    BalanceResult, FeeQuote, GasEstimate, ProviderCapabilities, SeqnoInfo, Transfer,
    UpstreamError, Utxo,
};

/// Chains served through the Etherscan v2 endpoint.
const ETHERSCAN_FAMILY: &[&str] = &["ethereum", "polygon", "arbitrum", "arbitrumnova"];

/// Failure to serve an operation.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// No routed provider implements the operation for this chain.
    #[error("operation not supported for this chain")]
    Unsupported,
    /// The dispatched provider failed.
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

/// The per-operation routing table.
pub struct ChainRouter {
    providers: HashMap<&'static str, ProviderCapabilities>,
}

impl ChainRouter {
    /// Build the router over the boot-time capability records.
    pub fn new(records: Vec<ProviderCapabilities>) -> Self {
        let providers = records.into_iter().map(|r| (r.name, r)).collect();
        Self { providers }
    }

    /// Ordered provider names for one `(chain, operation)` pair.
    fn order(chain: &str, op: Operation) -> &'static [&'static str] {
        use Operation::*;
        let escan = ETHERSCAN_FAMILY.contains(&chain);
        match op {
            Balance => match chain {
                "ton" => &["ankr", "tatum"],
                "ripple" => &["ankr"],
                "dash" => &["insight"],
                "classic" => &["etc-rpc"],
                "sui" => &["sui"],
                "smartchain" => &["bsc-rpc"],
                "avalanchec" => &["avax-rpc"],
                _ if escan => &["etherscan"],
                _ => &["tatum"],
            },
            Transactions => match chain {
                "ton" => &["toncenter"],
                "ripple" => &["ankr"],
                "dash" => &["insight"],
                "classic" => &["etc-rpc"],
                "sui" => &["sui"],
                // the v4 data API has the clean BSC history
                "smartchain" => &["tatum"],
                "avalanchec" => &["avax-rpc"],
                _ if escan => &["etherscan"],
                _ => &["tatum"],
            },
            Utxos => match chain {
                "dash" => &["insight"],
                "sui" => &["sui"],
                _ => &["tatum"],
            },
            Fee => match chain {
                "ripple" => &["ankr"],
                "classic" => &["etc-rpc"],
                "sui" => &["sui"],
                _ => &["tatum"],
            },
            Nonce | EstimateGas => match chain {
                "classic" => &["etc-rpc"],
                "smartchain" => &["bsc-rpc"],
                "avalanchec" => &["avax-rpc"],
                _ if escan => &["etherscan"],
                _ => &["tatum"],
            },
            Seqno => match chain {
                "ton" => &["toncenter"],
                _ => &[],
            },
            LatestBlock => &["tatum"],
            Broadcast => match chain {
                "ton" => &["toncenter"],
                "ripple" => &["ankr"],
                "dash" => &["insight"],
                "classic" => &["etc-rpc"],
                "sui" => &["sui"],
                "smartchain" => &["bsc-rpc"],
                "avalanchec" => &["avax-rpc"],
                _ if escan => &["etherscan"],
                _ => &["tatum"],
            },
            AccountResource => &["tatum"],
            TxDetail => {
                if escan {
                    &["etherscan"]
                } else {
                    &[]
                }
            }
        }
    }

    /// The routed capability records that actually implement `op`, in
    /// routing order.
    pub fn route(&self, chain: &str, op: Operation) -> Vec<&ProviderCapabilities> {
        Self::order(chain, op)
            .iter()
            .filter_map(|name| self.providers.get(name))
            .filter(|p| p.supports(op))
            .collect()
    }

    /// Balance lookup. Token balances may cascade across the routed tiers;
    /// native balances use the first capable provider only.
    pub async fn balance(
        &self,
        chain: &str,
        address: &str,
        contract: Option<&str>,
    ) -> Result<BalanceResult, GatewayError> {
        let routed = self.route(chain, Operation::Balance);
        let apis: Vec<_> = routed.iter().filter_map(|p| p.balance.as_ref().map(|a| (p.name, a))).collect();
        let Some((_, first)) = apis.first() else {
            return Err(GatewayError::Unsupported);
        };
        if contract.is_none() || apis.len() == 1 {
            return Ok(first.balance(chain, address, contract).await?);
        }
        let mut last_err = UpstreamError::Logical("no provider answered".into());
        for (name, api) in &apis {
            match api.balance(chain, address, contract).await {
                Ok(v) => return Ok(v),
                Err(err) => {
                    warn!(provider = name, chain, error = %err, "token balance tier failed");
                    last_err = err;
                }
            }
        }
        Err(GatewayError::Upstream(last_err))
    }

    /// Transaction history.
    pub async fn transactions(
        &self,
        chain: &str,
        address: &str,
        contract: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Transfer>, GatewayError> {
        let routed = self.route(chain, Operation::Transactions);
        let api = routed
            .first()
            .and_then(|p| p.transactions.as_ref())
            .ok_or(GatewayError::Unsupported)?;
        Ok(api.transactions(chain, address, contract, limit).await?)
    }

    /// UTXO listing.
    pub async fn utxos(
        &self,
        chain: &str,
        address: &str,
        total_value: &str,
    ) -> Result<Vec<Utxo>, GatewayError> {
        let routed = self.route(chain, Operation::Utxos);
        let api = routed
            .first()
            .and_then(|p| p.utxos.as_ref())
            .ok_or(GatewayError::Unsupported)?;
        Ok(api.utxos(chain, address, total_value).await?)
    }

    /// Fee quote.
    pub async fn fee(&self, chain: &str) -> Result<FeeQuote, GatewayError> {
        let routed = self.route(chain, Operation::Fee);
        let api = routed
            .first()
            .and_then(|p| p.fee.as_ref())
            .ok_or(GatewayError::Unsupported)?;
        Ok(api.fee(chain).await?)
    }

    /// Nonce lookup.
    pub async fn nonce(&self, chain: &str, address: &str) -> Result<u64, GatewayError> {
        let routed = self.route(chain, Operation::Nonce);
        let api = routed
            .first()
            .and_then(|p| p.nonce.as_ref())
            .ok_or(GatewayError::Unsupported)?;
        Ok(api.nonce(chain, address).await?)
    }

    /// Gas estimate.
    pub async fn estimate_gas(
        &self,
        chain: &str,
        address: &str,
        contract: Option<&str>,
    ) -> Result<GasEstimate, GatewayError> {
        let routed = self.route(chain, Operation::EstimateGas);
        let api = routed
            .first()
            .and_then(|p| p.gas.as_ref())
            .ok_or(GatewayError::Unsupported)?;
        Ok(api.estimate_gas(chain, address, contract).await?)
    }

    /// Seqno record.
    pub async fn seqno(&self, chain: &str, address: &str) -> Result<SeqnoInfo, GatewayError> {
        let routed = self.route(chain, Operation::Seqno);
        let api = routed
            .first()
            .and_then(|p| p.seqno.as_ref())
            .ok_or(GatewayError::Unsupported)?;
        Ok(api.seqno(chain, address).await?)
    }

    /// Latest block header.
    pub async fn latest_block(
        &self,
        chain: &str,
        address: &str,
    ) -> Result<Map<String, Value>, GatewayError> {
        let routed = self.route(chain, Operation::LatestBlock);
        let api = routed
            .first()
            .and_then(|p| p.latest_block.as_ref())
            .ok_or(GatewayError::Unsupported)?;
        Ok(api.latest_block(chain, address).await?)
    }

    /// Account resource record.
    pub async fn account_resource(
        &self,
        chain: &str,
        address: &str,
        contract: Option<&str>,
    ) -> Result<Map<String, Value>, GatewayError> {
        let routed = self.route(chain, Operation::AccountResource);
        let api = routed
            .first()
            .and_then(|p| p.account_resource.as_ref())
            .ok_or(GatewayError::Unsupported)?;
        Ok(api.account_resource(chain, address, contract).await?)
    }

    /// Broadcast a signed transaction.
    pub async fn broadcast(&self, chain: &str, payload: &Value) -> Result<String, GatewayError> {
        let routed = self.route(chain, Operation::Broadcast);
        let api = routed
            .first()
            .and_then(|p| p.broadcast.as_ref())
            .ok_or(GatewayError::Unsupported)?;
        Ok(api.broadcast(chain, payload).await?)
    }

    /// Transaction detail lookup.
    pub async fn transaction(&self, chain: &str, tx_id: &str) -> Result<Value, GatewayError> {
        let routed = self.route(chain, Operation::TxDetail);
        let api = routed
            .first()
            .and_then(|p| p.tx_detail.as_ref())
            .ok_or(GatewayError::Unsupported)?;
        Ok(api.transaction(chain, tx_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use vaultgate_core::provider::BalanceApi;

    struct StubBalance {
        calls: AtomicU32,
        outcome: Result<&'static str, ()>,
    }

    #[async_trait]
    impl BalanceApi for StubBalance {
        async fn balance(
            &self,
            _chain: &str,
            _address: &str,
            _contract: Option<&str>,
        ) -> Result<BalanceResult, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.outcome {
                Ok(v) => Ok(BalanceResult::Amount(v.to_owned())),
                Err(()) => Err(UpstreamError::Transient("down".into())),
            }
        }
    }

    fn record(name: &'static str, api: Arc<StubBalance>) -> ProviderCapabilities {
        ProviderCapabilities {
            name,
            balance: Some(api),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn native_balance_uses_only_the_first_tier() {
        let ankr = Arc::new(StubBalance {
            calls: AtomicU32::new(0),
            outcome: Err(()),
        });
        let tatum = Arc::new(StubBalance {
            calls: AtomicU32::new(0),
            outcome: Ok("1.0"),
        });
        let router = ChainRouter::new(vec![
            record("ankr", ankr.clone()),
            record("tatum", tatum.clone()),
        ]);

        let out = router.balance("ton", "EQx", None).await;
        assert!(matches!(out, Err(GatewayError::Upstream(_))));
        assert_eq!(ankr.calls.load(Ordering::SeqCst), 1);
        assert_eq!(tatum.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn token_balance_cascades_to_the_next_tier() {
        let ankr = Arc::new(StubBalance {
            calls: AtomicU32::new(0),
            outcome: Err(()),
        });
        let tatum = Arc::new(StubBalance {
            calls: AtomicU32::new(0),
            outcome: Ok("5.5"),
        });
        let router = ChainRouter::new(vec![
            record("ankr", ankr.clone()),
            record("tatum", tatum.clone()),
        ]);

        let out = router.balance("ton", "EQx", Some("0xtoken")).await.unwrap();
        assert_eq!(out, BalanceResult::Amount("5.5".into()));
        assert_eq!(ankr.calls.load(Ordering::SeqCst), 1);
        assert_eq!(tatum.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unrouted_operations_are_unsupported() {
        let router = ChainRouter::new(vec![]);
        assert!(matches!(
            router.seqno("bitcoin", "addr").await,
            Err(GatewayError::Unsupported)
        ));
        assert!(matches!(
            router.transaction("bitcoin", "tx").await,
            Err(GatewayError::Unsupported)
        ));
    }

    #[test]
    fn routing_table_shape() {
        use Operation::*;
        assert_eq!(ChainRouter::order("ripple", Balance), &["ankr"]);
        assert_eq!(ChainRouter::order("ton", Balance), &["ankr", "tatum"]);
        assert_eq!(ChainRouter::order("ton", Transactions), &["toncenter"]);
        assert_eq!(ChainRouter::order("ethereum", Nonce), &["etherscan"]);
        assert_eq!(ChainRouter::order("smartchain", Nonce), &["bsc-rpc"]);
        assert_eq!(ChainRouter::order("smartchain", Transactions), &["tatum"]);
        assert_eq!(ChainRouter::order("bitcoin", Seqno), &[] as &[&str]);
        assert_eq!(ChainRouter::order("classic", Fee), &["etc-rpc"]);
        assert_eq!(ChainRouter::order("bitcoin", Broadcast), &["tatum"]);
        assert_eq!(ChainRouter::order("ethereum", TxDetail), &["etherscan"]);
        assert_eq!(ChainRouter::order("bitcoin", TxDetail), &[] as &[&str]);
    }
}
