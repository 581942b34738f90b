//! Native JSON-RPC adapter for EVM chains without Etherscan v2 coverage.
//!
//! One instance per chain (BSC, Avalanche C-Chain, Ethereum Classic), each
//! pairing a public RPC node with an Etherscan-compatible explorer for
//! history (BscScan / Routescan / Blockscout).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use reqwest::Method;
use serde_json::{json, Value};

use vaultgate_core::provider::{
    BalanceApi, BroadcastApi, FeeApi, GasApi, NonceApi, ProviderCapabilities, ProviderResult,
    TxHistoryApi,
};
use vaultgate_core::{AmountCodec, BalanceResult, FeeQuote, GasEstimate, Transfer, UpstreamError};

use super::etherscan::parse_explorer_transfers;
use super::tatum::heuristic_gas_limit;
use super::{hex_quantity_to_decimal, hex_quantity_to_u64};
use crate::http::{HttpClient, HttpMetrics};
use crate::runner::ProviderRunner;

/// Static description of one RPC-served EVM chain.
#[derive(Debug, Clone)]
pub struct EvmChainConfig {
    /// Registry chain key.
    pub chain: &'static str,
    /// Provider name used in routing tables and logs.
    pub provider_name: &'static str,
    /// Native symbol for history rows.
    pub symbol: &'static str,
    /// JSON-RPC node.
    pub rpc_url: String,
    /// Etherscan-compatible explorer API for history.
    pub explorer_url: String,
    /// Minimum gas price in Gwei; quotes below it are raised.
    pub gas_floor_gwei: u64,
    /// Whether `/fee` is served from this adapter (ETC only).
    pub serves_fee: bool,
}

impl EvmChainConfig {
    /// BSC via the public dataseed and BscScan.
    pub fn bsc() -> Self {
        Self {
            chain: "smartchain",
            provider_name: "bsc-rpc",
            symbol: "BNB",
            rpc_url: "https://bsc-dataseed.binance.org".into(),
            explorer_url: "https://api.bscscan.com/api".into(),
            gas_floor_gwei: 3,
            serves_fee: false,
        }
    }

    /// Avalanche C-Chain via the public API node and Routescan.
    pub fn avalanche() -> Self {
        Self {
            chain: "avalanchec",
            provider_name: "avax-rpc",
            symbol: "AVAX",
            rpc_url: "https://api.avax.network/ext/bc/C/rpc".into(),
            explorer_url: "https://api.routescan.io/v2/network/mainnet/evm/43114/etherscan/api"
                .into(),
            gas_floor_gwei: 25,
            serves_fee: false,
        }
    }

    /// Ethereum Classic via a public RPC and Blockscout.
    pub fn classic() -> Self {
        Self {
            chain: "classic",
            provider_name: "etc-rpc",
            symbol: "ETC",
            rpc_url: "https://etc.rivet.link".into(),
            explorer_url: "https://etc.blockscout.com/api".into(),
            gas_floor_gwei: 1,
            serves_fee: true,
        }
    }
}

/// The per-chain EVM RPC adapter.
pub struct EvmRpcProvider {
    http: HttpClient,
    runner: ProviderRunner,
    codec: AmountCodec,
    cfg: EvmChainConfig,
}

impl EvmRpcProvider {
    /// Build an adapter for one chain (4 slots, no spacing; public nodes
    /// tolerate bursts).
    pub fn new(cfg: EvmChainConfig, codec: AmountCodec, metrics: Option<Arc<HttpMetrics>>) -> Self {
        Self {
            http: HttpClient::new(cfg.provider_name, Duration::from_secs(30), metrics),
            runner: ProviderRunner::new(cfg.provider_name, 4, Duration::ZERO),
            codec,
            cfg,
        }
    }

    /// Capability record for the router.
    pub fn capabilities(self: Arc<Self>) -> ProviderCapabilities {
        ProviderCapabilities {
            name: self.cfg.provider_name,
            balance: Some(self.clone()),
            transactions: Some(self.clone()),
            nonce: Some(self.clone()),
            gas: Some(self.clone()),
            broadcast: Some(self.clone()),
            fee: if self.cfg.serves_fee {
                Some(self.clone())
            } else {
                None
            },
            ..Default::default()
        }
    }

    async fn rpc(&self, method: &str, params: Value) -> ProviderResult<Value> {
        let body = json!({ "jsonrpc": "2.0", "id": 1, "method": method, "params": params });
        let resp = self
            .runner
            .run(|| {
                self.http.post_json(
                    &self.cfg.rpc_url,
                    &[("Content-Type", "application/json")],
                    &body,
                )
            })
            .await?;
        if let Some(err) = resp.get("error") {
            return Err(UpstreamError::Logical(format!(
                "{method}: {}",
                err.get("message").and_then(Value::as_str).unwrap_or("rpc error")
            )));
        }
        resp.get("result")
            .cloned()
            .ok_or_else(|| UpstreamError::Logical(format!("{method}: no result")))
    }

    async fn gas_price_wei(&self) -> ProviderResult<BigDecimal> {
        let result = self.rpc("eth_gasPrice", json!([])).await?;
        let quoted = result
            .as_str()
            .and_then(hex_quantity_to_decimal)
            .ok_or_else(|| UpstreamError::Fatal("gasPrice: bad hex quantity".into()))?;
        Ok(apply_gas_floor(&quoted, self.cfg.gas_floor_gwei))
    }
}

#[async_trait]
impl BalanceApi for EvmRpcProvider {
    async fn balance(
        &self,
        chain: &str,
        address: &str,
        contract: Option<&str>,
    ) -> ProviderResult<BalanceResult> {
        let raw = match contract {
            Some(contract) => {
                let data = balance_of_calldata(address)?;
                self.rpc(
                    "eth_call",
                    json!([{ "to": contract, "data": data }, "latest"]),
                )
                .await?
            }
            None => {
                self.rpc("eth_getBalance", json!([address, "latest"]))
                    .await?
            }
        };
        let value = raw
            .as_str()
            .and_then(hex_quantity_to_decimal)
            .ok_or_else(|| UpstreamError::Fatal("balance: bad hex quantity".into()))?;
        Ok(BalanceResult::Amount(self.codec.decimal_to_canonical(
            &value, chain, contract, true,
        )))
    }
}

#[async_trait]
impl TxHistoryApi for EvmRpcProvider {
    async fn transactions(
        &self,
        chain: &str,
        address: &str,
        contract: Option<&str>,
        limit: usize,
    ) -> ProviderResult<Vec<Transfer>> {
        let offset = limit.to_string();
        let mut query: Vec<(&str, &str)> = vec![
            ("module", "account"),
            ("address", address),
            ("page", "1"),
            ("offset", offset.as_str()),
            ("sort", "desc"),
        ];
        match contract {
            Some(c) => {
                query.push(("action", "tokentx"));
                query.push(("contractaddress", c));
            }
            None => query.push(("action", "txlist")),
        }
        let resp = self
            .runner
            .run(|| {
                self.http.request_json(
                    Method::GET,
                    &self.cfg.explorer_url,
                    &[],
                    &query,
                    None,
                    None,
                )
            })
            .await?;
        let rows = match resp.get("result") {
            Some(Value::Array(rows)) => rows.clone(),
            _ => vec![],
        };
        Ok(parse_explorer_transfers(
            &self.codec,
            chain,
            self.cfg.symbol,
            contract,
            &rows,
        ))
    }
}

#[async_trait]
impl NonceApi for EvmRpcProvider {
    async fn nonce(&self, _chain: &str, address: &str) -> ProviderResult<u64> {
        let result = self
            .rpc("eth_getTransactionCount", json!([address, "pending"]))
            .await?;
        result
            .as_str()
            .and_then(hex_quantity_to_u64)
            .ok_or_else(|| UpstreamError::Fatal("nonce: bad hex quantity".into()))
    }
}

#[async_trait]
impl GasApi for EvmRpcProvider {
    async fn estimate_gas(
        &self,
        chain: &str,
        _address: &str,
        contract: Option<&str>,
    ) -> ProviderResult<GasEstimate> {
        let price = self.gas_price_wei().await?;
        Ok(GasEstimate {
            gas_price: price.to_string(),
            gas_limit: heuristic_gas_limit(chain, contract.is_some()).to_string(),
        })
    }
}

#[async_trait]
impl FeeApi for EvmRpcProvider {
    async fn fee(&self, chain: &str) -> ProviderResult<FeeQuote> {
        // ETC has no congestion market worth tiering; quote the floored gas
        // price in native units
        let price = self.gas_price_wei().await?;
        Ok(FeeQuote::flat(
            self.codec.decimal_to_canonical(&price, chain, None, true),
        ))
    }
}

#[async_trait]
impl BroadcastApi for EvmRpcProvider {
    async fn broadcast(&self, _chain: &str, payload: &Value) -> ProviderResult<String> {
        let raw = payload.as_str().unwrap_or_default();
        let hex = if raw.starts_with("0x") {
            raw.to_owned()
        } else {
            format!("0x{raw}")
        };
        let result = self.rpc("eth_sendRawTransaction", json!([hex])).await?;
        result
            .as_str()
            .map(str::to_owned)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| UpstreamError::Logical("sendRawTransaction: empty result".into()))
    }
}

/// ABI calldata for `balanceOf(address)`: selector `0x70a08231` plus the
/// address left-padded to 32 bytes.
pub(crate) fn balance_of_calldata(address: &str) -> ProviderResult<String> {
    let bare = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .unwrap_or(address);
    if bare.len() != 40 || !bare.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(UpstreamError::Fatal(format!(
            "malformed evm address: {address}"
        )));
    }
    Ok(format!(
        "0x70a08231{:0>64}",
        bare.to_ascii_lowercase()
    ))
}

/// Gas floor application, separated for tests.
pub(crate) fn apply_gas_floor(quoted_wei: &BigDecimal, floor_gwei: u64) -> BigDecimal {
    let floor = BigDecimal::from(floor_gwei) * BigDecimal::from(1_000_000_000u64);
    if *quoted_wei < floor {
        floor
    } else {
        quoted_wei.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn balance_of_calldata_pads_the_address() {
        let data =
            balance_of_calldata("0x742d35Cc6634C0532925a3b844Bc454e4438f44e").unwrap();
        assert_eq!(
            data,
            "0x70a08231000000000000000000000000742d35cc6634c0532925a3b844bc454e4438f44e"
        );
        assert!(balance_of_calldata("0x1234").is_err());
        assert!(balance_of_calldata("zz").is_err());
    }

    #[test]
    fn gas_floor_raises_low_quotes() {
        // quoted 1 Gwei on a 25 Gwei floor chain
        let quoted = BigDecimal::from_str("1000000000").unwrap();
        assert_eq!(
            apply_gas_floor(&quoted, 25),
            BigDecimal::from_str("25000000000").unwrap()
        );
        // quoted 30 Gwei stays
        let quoted = BigDecimal::from_str("30000000000").unwrap();
        assert_eq!(apply_gas_floor(&quoted, 25), quoted);
    }

    #[test]
    fn chain_configs_carry_their_floors() {
        assert_eq!(EvmChainConfig::bsc().gas_floor_gwei, 3);
        assert_eq!(EvmChainConfig::avalanche().gas_floor_gwei, 25);
        assert_eq!(EvmChainConfig::classic().gas_floor_gwei, 1);
        assert!(EvmChainConfig::classic().serves_fee);
        assert!(!EvmChainConfig::bsc().serves_fee);
    }
}
