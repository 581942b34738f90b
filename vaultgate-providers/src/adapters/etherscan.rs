//! Etherscan v2 — the multi-chain explorer API for the Ethereum family.
//!
//! One endpoint serves every supported chain through the `chainid`
//! parameter. Account state reads use the explorer modules; nonce, gas,
//! broadcast and transaction detail go through the `proxy` module's raw
//! JSON-RPC pass-through.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;

use vaultgate_core::provider::{
    BalanceApi, BroadcastApi, GasApi, NonceApi, ProviderCapabilities, ProviderResult,
    TxDetailApi, TxHistoryApi,
};
use vaultgate_core::{AmountCodec, BalanceResult, GasEstimate, Registry, Transfer, UpstreamError};

use super::tatum::heuristic_gas_limit;
use super::{hex_quantity_to_decimal, hex_quantity_to_u64};
use crate::http::{HttpClient, HttpMetrics};
use crate::runner::ProviderRunner;

const CHAIN_IDS: &[(&str, u64)] = &[
    ("ethereum", 1),
    ("polygon", 137),
    ("arbitrum", 42161),
    ("arbitrumnova", 42170),
];

/// The Etherscan-family adapter.
pub struct EtherscanProvider {
    http: HttpClient,
    runner: ProviderRunner,
    codec: AmountCodec,
    registry: Arc<Registry>,
    api_key: String,
    base_url: String,
}

impl EtherscanProvider {
    /// Build the adapter (5 slots, 250 ms spacing for the free-tier 5 rps).
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        registry: Arc<Registry>,
        codec: AmountCodec,
        metrics: Option<Arc<HttpMetrics>>,
    ) -> Self {
        Self {
            http: HttpClient::new("etherscan", Duration::from_secs(30), metrics),
            runner: ProviderRunner::new("etherscan", 5, Duration::from_millis(250)),
            codec,
            registry,
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }

    /// Whether this chain is served through Etherscan v2.
    pub fn supports(chain: &str) -> bool {
        CHAIN_IDS.iter().any(|(k, _)| *k == chain)
    }

    /// Capability record for the router.
    pub fn capabilities(self: Arc<Self>) -> ProviderCapabilities {
        ProviderCapabilities {
            name: "etherscan",
            balance: Some(self.clone()),
            transactions: Some(self.clone()),
            nonce: Some(self.clone()),
            gas: Some(self.clone()),
            broadcast: Some(self.clone()),
            tx_detail: Some(self.clone()),
            ..Default::default()
        }
    }

    fn chain_id(chain: &str) -> ProviderResult<u64> {
        CHAIN_IDS
            .iter()
            .find(|(k, _)| *k == chain)
            .map(|(_, id)| *id)
            .ok_or_else(|| UpstreamError::Logical(format!("chain {chain} not on etherscan")))
    }

    async fn query(&self, chain: &str, params: &[(&str, &str)]) -> ProviderResult<Value> {
        let chain_id = Self::chain_id(chain)?.to_string();
        let mut query: Vec<(&str, &str)> = vec![("chainid", chain_id.as_str())];
        query.extend_from_slice(params);
        query.push(("apikey", self.api_key.as_str()));
        self.runner
            .run(|| {
                self.http
                    .request_json(Method::GET, &self.base_url, &[], &query, None, None)
            })
            .await
    }

    /// Unwrap an explorer-module envelope: `status == "1"` or an empty
    /// result list.
    fn explorer_result(resp: Value) -> ProviderResult<Value> {
        let status = resp.get("status").and_then(Value::as_str).unwrap_or("0");
        if status == "1" {
            return resp
                .get("result")
                .cloned()
                .ok_or_else(|| UpstreamError::Logical("etherscan: no result".into()));
        }
        // "No transactions found" style answers come back as status 0 with
        // an empty array
        match resp.get("result") {
            Some(Value::Array(list)) if list.is_empty() => Ok(Value::Array(vec![])),
            _ => Err(UpstreamError::Logical(format!(
                "etherscan: {}",
                resp.get("message").and_then(Value::as_str).unwrap_or("error")
            ))),
        }
    }

    /// Unwrap a proxy-module envelope: plain JSON-RPC result/error.
    fn proxy_result(resp: Value) -> ProviderResult<Value> {
        if let Some(err) = resp.get("error") {
            return Err(UpstreamError::Logical(format!(
                "proxy error: {}",
                err.get("message").and_then(Value::as_str).unwrap_or("rpc")
            )));
        }
        resp.get("result")
            .cloned()
            .ok_or_else(|| UpstreamError::Logical("proxy: no result".into()))
    }

    fn chain_symbol(&self, chain: &str) -> String {
        self.registry
            .coin_by_id(chain)
            .map(|c| c.symbol.clone())
            .unwrap_or_else(|| chain.to_ascii_uppercase())
    }
}

#[async_trait]
impl BalanceApi for EtherscanProvider {
    async fn balance(
        &self,
        chain: &str,
        address: &str,
        contract: Option<&str>,
    ) -> ProviderResult<BalanceResult> {
        let resp = match contract {
            Some(contract) => {
                self.query(
                    chain,
                    &[
                        ("module", "account"),
                        ("action", "tokenbalance"),
                        ("contractaddress", contract),
                        ("address", address),
                        ("tag", "latest"),
                    ],
                )
                .await?
            }
            None => {
                self.query(
                    chain,
                    &[
                        ("module", "account"),
                        ("action", "balance"),
                        ("address", address),
                        ("tag", "latest"),
                    ],
                )
                .await?
            }
        };
        let result = Self::explorer_result(resp)?;
        Ok(BalanceResult::Amount(self.codec.to_canonical(
            Some(&result),
            chain,
            contract,
            true,
        )))
    }
}

#[async_trait]
impl TxHistoryApi for EtherscanProvider {
    async fn transactions(
        &self,
        chain: &str,
        address: &str,
        contract: Option<&str>,
        limit: usize,
    ) -> ProviderResult<Vec<Transfer>> {
        let offset = limit.to_string();
        let mut params: Vec<(&str, &str)> = vec![
            ("module", "account"),
            ("address", address),
            ("startblock", "0"),
            ("endblock", "99999999"),
            ("page", "1"),
            ("offset", offset.as_str()),
            ("sort", "desc"),
        ];
        match contract {
            Some(c) => {
                params.push(("action", "tokentx"));
                params.push(("contractaddress", c));
            }
            None => params.push(("action", "txlist")),
        }
        let resp = self.query(chain, &params).await?;
        let result = Self::explorer_result(resp)?;
        let rows = result.as_array().cloned().unwrap_or_default();
        Ok(parse_explorer_transfers(
            &self.codec,
            chain,
            &self.chain_symbol(chain),
            contract,
            &rows,
        ))
    }
}

#[async_trait]
impl NonceApi for EtherscanProvider {
    async fn nonce(&self, chain: &str, address: &str) -> ProviderResult<u64> {
        let resp = self
            .query(
                chain,
                &[
                    ("module", "proxy"),
                    ("action", "eth_getTransactionCount"),
                    ("address", address),
                    // pending, never latest, so queued sends stack
                    ("tag", "pending"),
                ],
            )
            .await?;
        let result = Self::proxy_result(resp)?;
        result
            .as_str()
            .and_then(hex_quantity_to_u64)
            .ok_or_else(|| UpstreamError::Fatal("nonce: bad hex quantity".into()))
    }
}

#[async_trait]
impl GasApi for EtherscanProvider {
    async fn estimate_gas(
        &self,
        chain: &str,
        _address: &str,
        contract: Option<&str>,
    ) -> ProviderResult<GasEstimate> {
        let resp = self
            .query(chain, &[("module", "proxy"), ("action", "eth_gasPrice")])
            .await?;
        let result = Self::proxy_result(resp)?;
        let price = result
            .as_str()
            .and_then(hex_quantity_to_decimal)
            .ok_or_else(|| UpstreamError::Fatal("gasPrice: bad hex quantity".into()))?;
        Ok(GasEstimate {
            gas_price: price.to_string(),
            gas_limit: heuristic_gas_limit(chain, contract.is_some()).to_string(),
        })
    }
}

#[async_trait]
impl BroadcastApi for EtherscanProvider {
    async fn broadcast(&self, chain: &str, payload: &Value) -> ProviderResult<String> {
        let raw = payload.as_str().unwrap_or_default();
        let hex = if raw.starts_with("0x") {
            raw.to_owned()
        } else {
            format!("0x{raw}")
        };
        let resp = self
            .query(
                chain,
                &[
                    ("module", "proxy"),
                    ("action", "eth_sendRawTransaction"),
                    ("hex", hex.as_str()),
                ],
            )
            .await?;
        let result = Self::proxy_result(resp)?;
        result
            .as_str()
            .map(str::to_owned)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| UpstreamError::Logical("sendRawTransaction: empty result".into()))
    }
}

#[async_trait]
impl TxDetailApi for EtherscanProvider {
    async fn transaction(&self, chain: &str, tx_id: &str) -> ProviderResult<Value> {
        let resp = self
            .query(
                chain,
                &[
                    ("module", "proxy"),
                    ("action", "eth_getTransactionByHash"),
                    ("txhash", tx_id),
                ],
            )
            .await?;
        let result = Self::proxy_result(resp)?;
        if result.is_null() {
            return Err(UpstreamError::NotFound);
        }
        Ok(result)
    }
}

/// Parse Etherscan-shaped `txlist`/`tokentx` rows. The same shape is served
/// by BscScan, Routescan and Blockscout, so the EVM RPC adapter reuses this.
pub(crate) fn parse_explorer_transfers(
    codec: &AmountCodec,
    chain: &str,
    native_symbol: &str,
    contract: Option<&str>,
    rows: &[Value],
) -> Vec<Transfer> {
    rows.iter()
        .filter_map(|row| {
            // reverted transactions carry isError == "1" on txlist rows
            if row.get("isError").and_then(Value::as_str) == Some("1") {
                return None;
            }
            let symbol = row
                .get("tokenSymbol")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .unwrap_or(native_symbol)
                .to_owned();
            let timestamp = row
                .get("timeStamp")
                .and_then(|v| match v {
                    Value::String(s) => s.parse::<i64>().ok(),
                    Value::Number(n) => n.as_i64(),
                    _ => None,
                })
                .unwrap_or(0)
                .saturating_mul(1000);
            Some(Transfer {
                txid: row
                    .get("hash")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned(),
                from: row
                    .get("from")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned(),
                to: row
                    .get("to")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned(),
                value: codec.to_canonical(row.get("value"), chain, contract, true),
                timestamp,
                symbol,
                status: None,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vaultgate_core::chain::{ChainKey, CoinMeta, Curve, TokenMeta};

    fn codec() -> AmountCodec {
        AmountCodec::new(Arc::new(Registry::from_parts(
            vec![CoinMeta {
                id: ChainKey::new("ethereum"),
                symbol: "ETH".into(),
                name: "Ethereum".into(),
                decimals: 18,
                curve: Curve::Secp256k1,
                blockchain: "ethereum".into(),
                chain_id: Some(1),
            }],
            vec![TokenMeta {
                coin: ChainKey::new("ethereum"),
                symbol: "USDT".into(),
                name: "USDT-ERC20".into(),
                contract: "0xdAC17F958D2ee523a2206206994597C13D831ec7".into(),
                decimals: 6,
            }],
        )))
    }

    #[test]
    fn reverted_rows_are_filtered() {
        let c = codec();
        let rows = vec![
            json!({
                "hash": "0xaa",
                "from": "0x1",
                "to": "0x2",
                "value": "1000000000000000000",
                "timeStamp": "1700000000",
                "isError": "0",
            }),
            json!({
                "hash": "0xbb",
                "from": "0x1",
                "to": "0x2",
                "value": "1",
                "timeStamp": "1700000001",
                "isError": "1",
            }),
        ];
        let out = parse_explorer_transfers(&c, "ethereum", "ETH", None, &rows);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].value, "1.00000000");
        assert_eq!(out[0].timestamp, 1_700_000_000_000);
        assert_eq!(out[0].symbol, "ETH");
    }

    #[test]
    fn token_rows_use_token_decimals_and_symbol() {
        let c = codec();
        let rows = vec![json!({
            "hash": "0xcc",
            "from": "0x1",
            "to": "0x2",
            "value": "5500000",
            "timeStamp": "1700000000",
            "tokenSymbol": "USDT",
        })];
        let out = parse_explorer_transfers(
            &c,
            "ethereum",
            "ETH",
            Some("0xdAC17F958D2ee523a2206206994597C13D831ec7"),
            &rows,
        );
        assert_eq!(out[0].value, "5.500000");
        assert_eq!(out[0].symbol, "USDT");
    }

    #[test]
    fn envelope_unwrapping() {
        let ok = json!({ "status": "1", "result": "42" });
        assert_eq!(
            EtherscanProvider::explorer_result(ok).unwrap(),
            json!("42")
        );
        let empty = json!({ "status": "0", "message": "No transactions found", "result": [] });
        assert_eq!(
            EtherscanProvider::explorer_result(empty).unwrap(),
            json!([])
        );
        let err = json!({ "status": "0", "message": "NOTOK", "result": "Max rate limit reached" });
        assert!(EtherscanProvider::explorer_result(err).is_err());

        let proxy_err = json!({ "error": { "message": "nonce too low" } });
        assert!(EtherscanProvider::proxy_result(proxy_err).is_err());
        let proxy_ok = json!({ "result": "0x10" });
        assert_eq!(EtherscanProvider::proxy_result(proxy_ok).unwrap(), json!("0x10"));
    }

    #[test]
    fn chain_support_table() {
        assert!(EtherscanProvider::supports("ethereum"));
        assert!(EtherscanProvider::supports("arbitrumnova"));
        assert!(!EtherscanProvider::supports("smartchain"));
        assert!(!EtherscanProvider::supports("bitcoin"));
    }
}
