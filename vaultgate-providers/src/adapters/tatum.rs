//! Tatum — the catch-all upstream.
//!
//! Covers the Bitcoin family (REST v3/v4 + the Rostrum JSON-RPC gateway for
//! BCH), the EVM family, Tron, Solana and TON through Tatum's REST API and
//! chain gateways. Everything funnels through one runner (2 slots, 1 s
//! spacing) because Tatum rate-limits per key, not per chain.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use futures::future::join_all;
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::warn;

use vaultgate_core::encoding::cashaddr;
use vaultgate_core::provider::{
    AccountResourceApi, BalanceApi, BroadcastApi, FeeApi, GasApi, LatestBlockApi, NonceApi,
    ProviderCapabilities, ProviderResult, TxHistoryApi, UtxoApi,
};
use vaultgate_core::{
    AmountCodec, BalanceResult, FeeQuote, GasEstimate, Registry, Transfer, UpstreamError, Utxo,
};

use super::toncenter::parse_ton_transfers;
use super::trongrid::TronGridProvider;
use super::{now_millis, now_secs, str_or_number};
use crate::http::{HttpClient, HttpMetrics};
use crate::runner::ProviderRunner;

/// Chains that need the inflated L2 gas limit for native transfers to cover
/// L1 data posting.
const L2_HIGH_LIMIT_CHAINS: &[&str] = &["arbitrum", "optimism", "base", "scroll", "linea", "blast"];

/// Gateway endpoints. All overridable for tests.
#[derive(Debug, Clone)]
pub struct TatumConfig {
    /// API key sent as `x-api-key`.
    pub api_key: String,
    /// REST base, `https://api.tatum.io`.
    pub base_url: String,
    /// TON HTTP gateway.
    pub ton_gateway: String,
    /// Solana JSON-RPC gateway.
    pub solana_gateway: String,
    /// BCH Rostrum JSON-RPC gateway.
    pub rostrum_url: String,
    /// Tron wallet gateway.
    pub tron_gateway: String,
}

impl TatumConfig {
    /// Production endpoints with the given key.
    pub fn mainnet(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            ton_gateway: "https://ton-mainnet.gateway.tatum.io".into(),
            solana_gateway: "https://solana-mainnet.gateway.tatum.io".into(),
            rostrum_url: "https://bch-mainnet-rostrum.gateway.tatum.io".into(),
            tron_gateway: "https://tron-mainnet.gateway.tatum.io".into(),
        }
    }
}

/// Registry chain key -> Tatum path segment. Keys missing here pass through
/// unchanged.
const CHAIN_MAP: &[(&str, &str)] = &[
    ("bitcoin", "bitcoin"),
    ("ethereum", "ethereum"),
    ("smartchain", "bsc"),
    ("polygon", "matic"),
    ("litecoin", "litecoin"),
    ("doge", "dogecoin"),
    ("tron", "tron"),
    ("solana", "solana"),
    ("ripple", "xrp"),
    ("arbitrum", "arb"),
    ("avalanchec", "avalanche"),
    ("bitcoincash", "bcash"),
    ("sui", "sui"),
    ("ton", "ton"),
    ("classic", "etc"),
    ("arbitrumnova", "arbitrum-nova"),
];

/// The Tatum adapter.
pub struct TatumProvider {
    http: HttpClient,
    runner: ProviderRunner,
    codec: AmountCodec,
    registry: Arc<Registry>,
    trongrid: Arc<TronGridProvider>,
    cfg: TatumConfig,
}

impl TatumProvider {
    /// Build the adapter with its eager runner (2 slots, 1.0 s spacing).
    pub fn new(
        cfg: TatumConfig,
        registry: Arc<Registry>,
        codec: AmountCodec,
        trongrid: Arc<TronGridProvider>,
        metrics: Option<Arc<HttpMetrics>>,
    ) -> Self {
        Self {
            http: HttpClient::new("tatum", Duration::from_secs(30), metrics),
            runner: ProviderRunner::new("tatum", 2, Duration::from_secs(1)),
            codec,
            registry,
            trongrid,
            cfg,
        }
    }

    /// Capability record for the router.
    pub fn capabilities(self: Arc<Self>) -> ProviderCapabilities {
        ProviderCapabilities {
            name: "tatum",
            balance: Some(self.clone()),
            account_resource: Some(self.clone()),
            transactions: Some(self.clone()),
            utxos: Some(self.clone()),
            fee: Some(self.clone()),
            nonce: Some(self.clone()),
            gas: Some(self.clone()),
            latest_block: Some(self.clone()),
            broadcast: Some(self.clone()),
            ..Default::default()
        }
    }

    fn tatum_chain(&self, chain: &str) -> ProviderResult<String> {
        if !self.registry.is_served(chain) {
            return Err(UpstreamError::Logical(format!("chain {chain} not served")));
        }
        Ok(CHAIN_MAP
            .iter()
            .find(|(k, _)| *k == chain)
            .map(|(_, v)| (*v).to_owned())
            .unwrap_or_else(|| chain.to_owned()))
    }

    /// Token-balance path segment for the v3 token endpoints.
    fn contract_symbol(chain: &str) -> String {
        match chain {
            "smartchain" => "BSC".to_owned(),
            "polygon" => "MATIC".to_owned(),
            "ethereum" => "ETH".to_owned(),
            other => other.to_ascii_uppercase(),
        }
    }

    async fn request(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> ProviderResult<Value> {
        let headers = [
            ("x-api-key", self.cfg.api_key.as_str()),
            ("accept", "application/json"),
        ];
        self.runner
            .run(|| {
                self.http
                    .request_json(method.clone(), url, &headers, query, body, None)
            })
            .await
    }

    async fn rostrum(&self, rpc_method: &str, params: Value) -> ProviderResult<Value> {
        let body = json!({
            "method": rpc_method,
            "params": params,
            "id": 1,
            "jsonrpc": "2.0",
        });
        let resp = self
            .request(Method::POST, &self.cfg.rostrum_url, &[], Some(&body))
            .await?;
        resp.get("result")
            .cloned()
            .ok_or_else(|| UpstreamError::Logical(format!("rostrum {rpc_method}: no result")))
    }

    async fn solana_rpc(&self, rpc_method: &str, params: Value) -> ProviderResult<Value> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": rpc_method,
            "params": params,
        });
        self.request(Method::POST, &self.cfg.solana_gateway, &[], Some(&body))
            .await
    }

    async fn tron_account(&self, address: &str) -> ProviderResult<Value> {
        let url = format!("{}/v3/tron/account/{address}", self.cfg.base_url);
        self.request(Method::GET, &url, &[], None).await
    }

    async fn fetch_tron_timestamp(&self, tx_id: &str) -> i64 {
        let url = format!("{}/wallet/gettransactioninfobyid", self.cfg.tron_gateway);
        let body = json!({ "value": tx_id });
        match self.request(Method::POST, &url, &[], Some(&body)).await {
            Ok(resp) => resp
                .get("blockTimeStamp")
                .and_then(Value::as_i64)
                .unwrap_or(0),
            Err(err) => {
                warn!(tx_id, error = %err, "tron timestamp backfill failed");
                0
            }
        }
    }

    async fn bch_tx_detail(&self, tx_hash: &str, owner: &str) -> Option<BchTxDetail> {
        let result = self
            .rostrum("blockchain.transaction.get", json!([tx_hash, true]))
            .await
            .ok()?;
        parse_bch_tx_detail(tx_hash, owner, &result)
    }

    async fn balance_tron(
        &self,
        chain: &str,
        address: &str,
        contract: Option<&str>,
    ) -> ProviderResult<String> {
        let res = self.tron_account(address).await?;
        if let Some(contract) = contract {
            let empty = vec![];
            let trc10 = res.get("trc10").and_then(Value::as_array).unwrap_or(&empty);
            let trc20 = res.get("trc20").and_then(Value::as_array).unwrap_or(&empty);
            for token in trc10.iter().chain(trc20) {
                if let Some(amount) = token.get(contract) {
                    return Ok(self
                        .codec
                        .to_canonical(Some(amount), chain, Some(contract), true));
                }
            }
            return Ok(self.codec.to_canonical(Some(&json!(0)), chain, Some(contract), true));
        }
        Ok(self
            .codec
            .to_canonical(res.get("balance"), chain, None, true))
    }

    async fn balance_btc_family(
        &self,
        t_chain: &str,
        chain: &str,
        address: &str,
    ) -> ProviderResult<String> {
        let url = format!(
            "{}/v3/{t_chain}/address/balance/{address}",
            self.cfg.base_url
        );
        let res = self.request(Method::GET, &url, &[], None).await?;
        Ok(reconcile_btc_balance(&self.codec, chain, &res))
    }
}

#[async_trait]
impl BalanceApi for TatumProvider {
    async fn balance(
        &self,
        chain: &str,
        address: &str,
        contract: Option<&str>,
    ) -> ProviderResult<BalanceResult> {
        let t_chain = self.tatum_chain(chain)?;
        let amount = match t_chain.as_str() {
            "tron" => self.balance_tron(chain, address, contract).await?,
            "bcash" => {
                let result = self
                    .rostrum("blockchain.address.get_balance", json!([address]))
                    .await?;
                self.codec
                    .to_canonical(result.get("confirmed"), chain, contract, true)
            }
            "ton" => {
                let url = format!("{}/getAddressBalance", self.cfg.ton_gateway);
                let res = self
                    .request(Method::GET, &url, &[("address", address)], None)
                    .await?;
                self.codec
                    .to_canonical(res.get("result"), chain, contract, true)
            }
            _ if contract.is_some() => {
                let symbol = Self::contract_symbol(chain);
                let contract = contract.unwrap_or_default();
                let url = format!(
                    "{}/v3/blockchain/token/balance/{symbol}/{contract}/{address}",
                    self.cfg.base_url
                );
                let res = self.request(Method::GET, &url, &[], None).await?;
                self.codec
                    .to_canonical(res.get("balance"), chain, Some(contract), true)
            }
            "bitcoin" | "litecoin" | "dogecoin" | "dash" => {
                self.balance_btc_family(&t_chain, chain, address).await?
            }
            _ => {
                let url = format!(
                    "{}/v3/{t_chain}/account/balance/{address}",
                    self.cfg.base_url
                );
                let res = self.request(Method::GET, &url, &[], None).await?;
                // v3 account balances come back already denominated
                self.codec
                    .to_canonical(res.get("balance"), chain, contract, false)
            }
        };
        Ok(BalanceResult::Amount(amount))
    }
}

#[async_trait]
impl AccountResourceApi for TatumProvider {
    async fn account_resource(
        &self,
        chain: &str,
        address: &str,
        contract: Option<&str>,
    ) -> ProviderResult<Map<String, Value>> {
        if chain != "tron" {
            return Ok(Map::new());
        }
        let res = self.tron_account(address).await?;
        let energy = self.trongrid.available_energy(address).await;

        let mut clean = Map::new();
        clean.insert("chain".into(), json!(chain));
        clean.insert("address".into(), json!(address));
        clean.insert("contract".into(), json!(contract));
        clean.insert("createTime".into(), res.get("createTime").cloned().unwrap_or(Value::Null));
        clean.insert(
            "bandwidth".into(),
            res.get("bandwidth").cloned().unwrap_or(json!(0)),
        );
        clean.insert(
            "freeNetLimit".into(),
            res.get("freeNetLimit").cloned().unwrap_or(json!(0)),
        );
        clean.insert("energy".into(), json!(energy));
        clean.insert("trc20".into(), json!([]));
        clean.insert("trc10".into(), json!([]));

        if let Some(contract) = contract {
            let mut raw_balance = json!("0");
            if let Some(list) = res.get("trc20").and_then(Value::as_array) {
                for token in list {
                    if let Some(v) = token.get(contract) {
                        raw_balance = v.clone();
                        break;
                    }
                }
            }
            let readable = self
                .codec
                .to_canonical(Some(&raw_balance), chain, Some(contract), true);
            if raw_balance != json!("0") {
                let mut entry = Map::new();
                entry.insert(contract.to_owned(), json!(readable));
                clean.insert("trc20".into(), Value::Array(vec![Value::Object(entry)]));
            }
        } else {
            let balance = self.codec.to_canonical(res.get("balance"), chain, None, true);
            clean.insert("balance".into(), json!(balance));
        }
        Ok(clean)
    }
}

#[async_trait]
impl UtxoApi for TatumProvider {
    async fn utxos(
        &self,
        chain: &str,
        address: &str,
        total_value: &str,
    ) -> ProviderResult<Vec<Utxo>> {
        let t_chain = self.tatum_chain(chain)?;
        match t_chain.as_str() {
            "bitcoin" | "litecoin" | "dogecoin" => {
                // v4 batch endpoint; dogecoin is keyed `doge` there
                let api_chain = if t_chain == "dogecoin" {
                    "doge"
                } else {
                    t_chain.as_str()
                };
                let url = format!("{}/v4/data/utxos", self.cfg.base_url);
                let query = [
                    ("chain", api_chain),
                    ("totalValue", total_value),
                    ("address", address),
                ];
                let res = self.request(Method::GET, &url, &query, None).await?;
                let Some(items) = res.as_array() else {
                    return Ok(vec![]);
                };
                Ok(items
                    .iter()
                    .filter_map(|item| {
                        let tx_hash = item.get("txHash")?.as_str()?.to_owned();
                        let index = item.get("index")?.as_u64()?;
                        let value = self.codec.to_canonical(item.get("value"), chain, None, false);
                        let mut extras = Map::new();
                        if let Some(obj) = item.as_object() {
                            for (k, v) in obj {
                                if !matches!(k.as_str(), "txHash" | "index" | "value") {
                                    extras.insert(k.clone(), v.clone());
                                }
                            }
                        }
                        Some(Utxo {
                            tx_hash,
                            index,
                            value,
                            script: None,
                            extras,
                        })
                    })
                    .collect())
            }
            "bcash" => {
                let result = self
                    .rostrum("blockchain.address.listunspent", json!([address]))
                    .await?;
                let Some(items) = result.as_array() else {
                    return Ok(vec![]);
                };
                Ok(items
                    .iter()
                    .filter_map(|item| {
                        let tx_hash = item.get("tx_hash")?.as_str()?.to_owned();
                        let index = item.get("tx_pos")?.as_u64()?;
                        let value = self.codec.to_canonical(item.get("value"), chain, None, true);
                        let mut extras = Map::new();
                        extras.insert(
                            "height".into(),
                            item.get("height").cloned().unwrap_or(Value::Null),
                        );
                        Some(Utxo {
                            tx_hash,
                            index,
                            value,
                            script: None,
                            extras,
                        })
                    })
                    .collect())
            }
            _ => Ok(vec![]),
        }
    }
}

#[async_trait]
impl TxHistoryApi for TatumProvider {
    async fn transactions(
        &self,
        chain: &str,
        address: &str,
        contract: Option<&str>,
        limit: usize,
    ) -> ProviderResult<Vec<Transfer>> {
        let t_chain = self.tatum_chain(chain)?;
        match t_chain.as_str() {
            "tron" => self.tron_transactions(chain, address, contract, limit).await,
            "bsc" => self.bsc_transactions(chain, address, contract, limit).await,
            "bcash" => self.bch_transactions(chain, address, limit).await,
            "ton" => {
                let url = format!("{}/getTransactions", self.cfg.ton_gateway);
                let limit = limit.to_string();
                let query = [("address", address), ("limit", limit.as_str())];
                let res = self.request(Method::GET, &url, &query, None).await?;
                let txs = res
                    .get("result")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                Ok(parse_ton_transfers(&self.codec, chain, address, &txs))
            }
            "solana" => self.solana_transactions(chain, address, limit).await,
            "ethereum" | "matic" => {
                self.evm_transactions(&t_chain, chain, address, contract, limit)
                    .await
            }
            "bitcoin" | "litecoin" | "dogecoin" => {
                let url = format!(
                    "{}/v3/{t_chain}/transaction/address/{address}",
                    self.cfg.base_url
                );
                let limit = limit.to_string();
                let res = self
                    .request(Method::GET, &url, &[("pageSize", limit.as_str())], None)
                    .await?;
                let txs = res.as_array().cloned().unwrap_or_default();
                // dogecoin and litecoin report already-denominated values
                let native_units = matches!(t_chain.as_str(), "dogecoin" | "litecoin");
                Ok(parse_btc_family_transfers(
                    &self.codec,
                    chain,
                    address,
                    native_units,
                    &txs,
                ))
            }
            _ => Ok(vec![]),
        }
    }
}

impl TatumProvider {
    async fn tron_transactions(
        &self,
        chain: &str,
        address: &str,
        contract: Option<&str>,
        limit: usize,
    ) -> ProviderResult<Vec<Transfer>> {
        let mut url = format!("{}/v3/tron/transaction/account/{address}", self.cfg.base_url);
        if contract.is_some() {
            url.push_str("/trc20");
        }
        let res = self.request(Method::GET, &url, &[], None).await?;
        let raw_txs: Vec<Value> = match &res {
            Value::Object(obj) => obj
                .get("transactions")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
            Value::Array(list) => list.clone(),
            _ => vec![],
        };

        if let Some(contract) = contract {
            let (mut transfers, tx_ids) =
                parse_trc20_transfers(&self.codec, chain, contract, &raw_txs, limit);
            // the TRC-20 listing omits timestamps; backfill positionally
            let stamps = join_all(tx_ids.iter().map(|id| self.fetch_tron_timestamp(id))).await;
            for (slot, stamp) in transfers.iter_mut().zip(stamps) {
                slot.timestamp = stamp;
            }
            Ok(transfers)
        } else {
            Ok(parse_tron_native_transfers(&self.codec, chain, &raw_txs, limit))
        }
    }

    async fn bsc_transactions(
        &self,
        chain: &str,
        address: &str,
        contract: Option<&str>,
        limit: usize,
    ) -> ProviderResult<Vec<Transfer>> {
        let url = format!("{}/v4/data/transaction/history", self.cfg.base_url);
        let page_size = limit.min(50).to_string();
        let mut query: Vec<(&str, &str)> = vec![
            ("chain", "bsc-mainnet"),
            ("addresses", address),
            ("pageSize", page_size.as_str()),
            ("sort", "DESC"),
        ];
        match contract {
            Some(c) => {
                query.push(("tokenAddress", c));
                query.push(("transactionTypes", "fungible"));
            }
            None => query.push(("transactionTypes", "native")),
        }
        let res = self.request(Method::GET, &url, &query, None).await?;
        let txs = res
            .get("result")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Ok(parse_bsc_v4_transfers(&self.codec, chain, contract, &txs))
    }

    async fn bch_transactions(
        &self,
        chain: &str,
        address: &str,
        limit: usize,
    ) -> ProviderResult<Vec<Transfer>> {
        let history = self
            .rostrum("blockchain.address.get_history", json!([address]))
            .await?;
        let Some(entries) = history.as_array() else {
            return Ok(vec![]);
        };
        // Electrum history comes in block order; newest are at the tail
        let newest: Vec<&Value> = entries.iter().rev().take(limit).collect();
        let details = join_all(newest.iter().filter_map(|entry| {
            entry
                .get("tx_hash")
                .and_then(Value::as_str)
                .map(|h| self.bch_tx_detail(h, address))
        }))
        .await;

        Ok(details
            .into_iter()
            .flatten()
            .map(|d| Transfer {
                txid: d.txid,
                from: d.from,
                to: d.to,
                value: self
                    .codec
                    .decimal_to_canonical(&d.value, chain, None, false),
                timestamp: d.timestamp_ms,
                symbol: "BCH".into(),
                status: None,
            })
            .collect())
    }

    async fn solana_transactions(
        &self,
        chain: &str,
        address: &str,
        limit: usize,
    ) -> ProviderResult<Vec<Transfer>> {
        let sigs = self
            .solana_rpc(
                "getSignaturesForAddress",
                json!([address, { "limit": limit }]),
            )
            .await?;
        let Some(sig_list) = sigs.get("result").and_then(Value::as_array) else {
            return Ok(vec![]);
        };
        let signatures: Vec<String> = sig_list
            .iter()
            .filter_map(|s| s.get("signature").and_then(Value::as_str))
            .map(str::to_owned)
            .collect();

        // detail fetches run concurrently; join_all keeps signature order
        let details = join_all(signatures.iter().map(|sig| {
            self.solana_rpc(
                "getTransaction",
                json!([sig, { "encoding": "json", "maxSupportedTransactionVersion": 0 }]),
            )
        }))
        .await;

        let mut transfers = Vec::with_capacity(signatures.len());
        for (sig, detail) in signatures.iter().zip(details) {
            let Ok(detail) = detail else { continue };
            let Some(tx) = detail.get("result").filter(|v| !v.is_null()) else {
                continue;
            };
            if let Some(t) = parse_sol_transfer(&self.codec, chain, address, sig, tx) {
                transfers.push(t);
            }
        }
        Ok(transfers)
    }

    async fn evm_transactions(
        &self,
        t_chain: &str,
        chain: &str,
        address: &str,
        contract: Option<&str>,
        limit: usize,
    ) -> ProviderResult<Vec<Transfer>> {
        let limit = limit.to_string();
        let url = match contract {
            Some(c) => {
                let symbol = Self::contract_symbol(chain);
                format!(
                    "{}/v3/blockchain/token/transaction/{symbol}/{address}/{c}",
                    self.cfg.base_url
                )
            }
            None => format!(
                "{}/v3/{t_chain}/account/transaction/{address}",
                self.cfg.base_url
            ),
        };
        let res = self
            .request(Method::GET, &url, &[("pageSize", limit.as_str())], None)
            .await?;
        let txs = res.as_array().cloned().unwrap_or_default();
        Ok(parse_evm_v3_transfers(&self.codec, chain, contract, &txs))
    }
}

#[async_trait]
impl FeeApi for TatumProvider {
    async fn fee(&self, chain: &str) -> ProviderResult<FeeQuote> {
        match chain {
            "bitcoin" => {
                let url = format!("{}/v3/blockchain/fee/BTC", self.cfg.base_url);
                let res = self.request(Method::GET, &url, &[], None).await?;
                let tier = |key: &str| {
                    str_or_number(res.get(key))
                        .ok_or_else(|| UpstreamError::Logical(format!("fee: missing {key}")))
                };
                Ok(FeeQuote {
                    slow: tier("slow")?,
                    medium: tier("medium")?,
                    fast: tier("fast")?,
                })
            }
            "bitcoincash" => {
                // estimatefee answers in BCH/kB; convert to sat/B, floor 1
                let result = self
                    .rostrum("blockchain.estimatefee", json!([2]))
                    .await
                    .unwrap_or(Value::Null);
                let mut sats_per_byte: i64 = 1;
                if let Some(per_kb) = result.as_f64() {
                    if per_kb > 0.0 {
                        sats_per_byte = ((per_kb * 100_000.0) as i64).max(1);
                    }
                }
                Ok(FeeQuote::flat(sats_per_byte.to_string()))
            }
            _ => Err(UpstreamError::Logical(format!(
                "no fee source for {chain}"
            ))),
        }
    }
}

#[async_trait]
impl NonceApi for TatumProvider {
    async fn nonce(&self, chain: &str, address: &str) -> ProviderResult<u64> {
        let t_chain = self.tatum_chain(chain)?;
        let url = format!(
            "{}/v3/{t_chain}/transaction/count/{address}",
            self.cfg.base_url
        );
        // this endpoint answers with a bare number
        let res = self.request(Method::GET, &url, &[], None).await?;
        match res {
            Value::Number(n) => Ok(n.as_u64().unwrap_or(0)),
            Value::String(s) => Ok(s.parse().unwrap_or(0)),
            _ => Ok(0),
        }
    }
}

#[async_trait]
impl GasApi for TatumProvider {
    async fn estimate_gas(
        &self,
        chain: &str,
        _address: &str,
        contract: Option<&str>,
    ) -> ProviderResult<GasEstimate> {
        let t_chain = self.tatum_chain(chain)?;
        let url = format!("{}/v3/{t_chain}/gas", self.cfg.base_url);
        let price_gwei = match self.request(Method::GET, &url, &[], None).await {
            Ok(res) => str_or_number(res.get("standard"))
                .and_then(|s| s.parse::<f64>().ok())
                .unwrap_or(20.0),
            Err(err) => {
                warn!(chain, error = %err, "gas price fetch failed, using default");
                20.0
            }
        };
        let price_wei = (price_gwei * 1e9) as u128;
        Ok(GasEstimate {
            gas_price: price_wei.to_string(),
            gas_limit: heuristic_gas_limit(chain, contract.is_some()).to_string(),
        })
    }
}

#[async_trait]
impl LatestBlockApi for TatumProvider {
    async fn latest_block(
        &self,
        chain: &str,
        _address: &str,
    ) -> ProviderResult<Map<String, Value>> {
        match chain {
            "tron" => {
                let url = format!("{}/wallet/getnowblock", self.cfg.tron_gateway);
                let block = self.request(Method::GET, &url, &[], None).await?;
                let header = block
                    .pointer("/block_header/raw_data")
                    .cloned()
                    .unwrap_or(Value::Null);
                let mut out = Map::new();
                out.insert("hash".into(), block.get("blockID").cloned().unwrap_or(Value::Null));
                for (dst, src) in [
                    ("number", "number"),
                    ("timestamp", "timestamp"),
                    ("parentHash", "parentHash"),
                    ("txTrieRoot", "txTrieRoot"),
                ] {
                    out.insert(dst.into(), header.get(src).cloned().unwrap_or(Value::Null));
                }
                out.insert(
                    "witnessAddress".into(),
                    header.get("witness_address").cloned().unwrap_or(Value::Null),
                );
                out.insert(
                    "version".into(),
                    header.get("version").cloned().unwrap_or(json!(0)),
                );
                Ok(out)
            }
            "solana" => {
                let res = self
                    .solana_rpc("getLatestBlockhash", json!([{ "commitment": "finalized" }]))
                    .await?;
                let Some(result) = res.get("result") else {
                    return Ok(Map::new());
                };
                let mut out = Map::new();
                out.insert(
                    "hash".into(),
                    result.pointer("/value/blockhash").cloned().unwrap_or(Value::Null),
                );
                out.insert(
                    "number".into(),
                    result.pointer("/context/slot").cloned().unwrap_or(Value::Null),
                );
                // the RPC carries no block time; stamp with wall clock
                out.insert("timestamp".into(), json!(now_secs()));
                Ok(out)
            }
            _ => Ok(Map::new()),
        }
    }
}

#[async_trait]
impl BroadcastApi for TatumProvider {
    async fn broadcast(&self, chain: &str, payload: &Value) -> ProviderResult<String> {
        let t_chain = self.tatum_chain(chain)?;

        let tx_data = if chain == "tron" {
            match payload {
                Value::Object(_) => payload.to_string(),
                Value::String(s) => s.clone(),
                other => other.to_string(),
            }
        } else {
            let raw = payload.as_str().unwrap_or_default();
            let is_evm = self
                .registry
                .coin_by_id(chain)
                .map(|c| c.is_evm())
                .unwrap_or(false);
            if !is_evm {
                raw.strip_prefix("0x").unwrap_or(raw).to_owned()
            } else {
                raw.to_owned()
            }
        };

        if chain == "solana" {
            let res = self
                .solana_rpc(
                    "sendTransaction",
                    json!([tx_data, { "encoding": "base58", "preflightCommitment": "processed" }]),
                )
                .await?;
            return res
                .get("result")
                .and_then(Value::as_str)
                .map(str::to_owned)
                .ok_or_else(|| {
                    UpstreamError::Logical(format!(
                        "solana broadcast rejected: {}",
                        res.get("error").cloned().unwrap_or(Value::Null)
                    ))
                });
        }

        let url = format!("{}/v3/{t_chain}/broadcast", self.cfg.base_url);
        let body = json!({ "txData": tx_data });
        let headers = [
            ("x-api-key", self.cfg.api_key.as_str()),
            ("accept", "application/json"),
        ];
        let res = self
            .runner
            .run(|| {
                self.http.request_json(
                    Method::POST,
                    &url,
                    &headers,
                    &[],
                    Some(&body),
                    Some(Duration::from_secs(120)),
                )
            })
            .await?;
        res.get("txId")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| UpstreamError::Logical("broadcast: no txId in response".into()))
    }
}

/// Heuristic gas limit: 21000 native, 100000 token, 600000 for L2 native
/// transfers that pay L1 data costs.
pub(crate) fn heuristic_gas_limit(chain: &str, has_contract: bool) -> u64 {
    if has_contract {
        100_000
    } else if L2_HIGH_LIMIT_CHAINS.contains(&chain) {
        600_000
    } else {
        21_000
    }
}

/// BTC-family display balance from confirmed and pending flows.
///
/// `confirmed + incomingPending`, never minus `outgoingPending`: an
/// in-flight send spends whole UTXOs including change, so subtracting it
/// would collapse the display to zero until the block lands. Floors at 0.
pub(crate) fn reconcile_btc_balance(codec: &AmountCodec, chain: &str, res: &Value) -> String {
    let field = |key: &str| {
        str_or_number(res.get(key))
            .and_then(|s| BigDecimal::from_str(&s).ok())
            .unwrap_or_else(|| BigDecimal::from(0))
    };
    let incoming = field("incoming");
    let outgoing = field("outgoing");
    let incoming_pending = field("incomingPending");

    let confirmed = incoming - outgoing;
    let mut display = confirmed + incoming_pending;
    if display < BigDecimal::from(0) {
        display = BigDecimal::from(0);
    }
    codec.decimal_to_canonical(&display, chain, None, false)
}

/// Net-flow direction for a BTC-family transaction listing.
pub(crate) fn parse_btc_family_transfers(
    codec: &AmountCodec,
    chain: &str,
    owner: &str,
    native_units: bool,
    txs: &[Value],
) -> Vec<Transfer> {
    let to_decimal = |v: Option<&Value>| {
        str_or_number(v)
            .and_then(|s| BigDecimal::from_str(&s).ok())
            .unwrap_or_else(|| BigDecimal::from(0))
    };
    txs.iter()
        .map(|tx| {
            let empty = vec![];
            let outputs = tx.get("outputs").and_then(Value::as_array).unwrap_or(&empty);
            let received: BigDecimal = outputs
                .iter()
                .filter(|o| o.get("address").and_then(Value::as_str) == Some(owner))
                .map(|o| to_decimal(o.get("value")))
                .sum();

            let inputs = tx.get("inputs").and_then(Value::as_array).unwrap_or(&empty);
            let sent: BigDecimal = inputs
                .iter()
                .filter(|i| i.pointer("/coin/address").and_then(Value::as_str) == Some(owner))
                .map(|i| to_decimal(i.pointer("/coin/value")))
                .sum();

            let net = received - sent;
            let zero = BigDecimal::from(0);
            let (from, to) = if net >= zero {
                (String::new(), owner.to_owned())
            } else {
                (owner.to_owned(), String::new())
            };
            let magnitude = if net < zero { -net } else { net };
            let value = codec.decimal_to_canonical(&magnitude, chain, None, !native_units);
            let timestamp = tx
                .get("time")
                .and_then(Value::as_i64)
                .filter(|t| *t > 0)
                .map(|t| t * 1000)
                .unwrap_or_else(now_millis);
            Transfer {
                txid: tx
                    .get("hash")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned(),
                from,
                to,
                value,
                timestamp,
                symbol: chain.to_ascii_uppercase(),
                status: None,
            }
        })
        .collect()
}

/// Native TRX listing: nested `rawData`, TRC-10 records skipped, Base58
/// address fields preferred over hex.
pub(crate) fn parse_tron_native_transfers(
    codec: &AmountCodec,
    chain: &str,
    txs: &[Value],
    limit: usize,
) -> Vec<Transfer> {
    txs.iter()
        .take(limit)
        .filter_map(|tx| {
            let raw_data = tx.get("rawData")?;
            let param = raw_data.pointer("/contract/0/parameter/value")?;
            if param.get("asset_name").is_some() || param.get("assetNameUtf8").is_some() {
                return None;
            }
            let pick = |b58: &str, hex_key: &str| {
                param
                    .get(b58)
                    .or_else(|| param.get(hex_key))
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned()
            };
            Some(Transfer {
                txid: tx
                    .get("txID")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned(),
                from: pick("ownerAddressBase58", "owner_address"),
                to: pick("toAddressBase58", "to_address"),
                value: codec.to_canonical(param.get("amount"), chain, None, true),
                timestamp: raw_data
                    .get("timestamp")
                    .and_then(Value::as_i64)
                    .unwrap_or(0),
                symbol: "TRX".into(),
                status: None,
            })
        })
        .collect()
}

/// TRC-20 listing: timestamps are absent and must be backfilled; the tx ids
/// needing backfill come back alongside, in output order.
pub(crate) fn parse_trc20_transfers(
    codec: &AmountCodec,
    chain: &str,
    contract: &str,
    txs: &[Value],
    limit: usize,
) -> (Vec<Transfer>, Vec<String>) {
    let mut transfers = Vec::new();
    let mut tx_ids = Vec::new();
    for tx in txs.iter().take(limit) {
        let txid = tx
            .get("txID")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        transfers.push(Transfer {
            txid: txid.clone(),
            from: tx
                .get("from")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned(),
            to: tx
                .get("to")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned(),
            value: codec.to_canonical(tx.get("value"), chain, Some(contract), true),
            timestamp: 0,
            symbol: tx
                .pointer("/tokenInfo/symbol")
                .and_then(Value::as_str)
                .unwrap_or("USDT")
                .to_owned(),
            status: None,
        });
        tx_ids.push(txid);
    }
    (transfers, tx_ids)
}

/// Tatum v4 history rows (BSC): direction from `transactionSubtype`.
pub(crate) fn parse_bsc_v4_transfers(
    codec: &AmountCodec,
    chain: &str,
    contract: Option<&str>,
    txs: &[Value],
) -> Vec<Transfer> {
    txs.iter()
        .filter_map(|tx| {
            if let Some(contract) = contract {
                let token = tx.get("tokenAddress").and_then(Value::as_str).unwrap_or("");
                if !token.eq_ignore_ascii_case(contract) {
                    return None;
                }
            }
            let incoming =
                tx.get("transactionSubtype").and_then(Value::as_str) == Some("incoming");
            let address = tx
                .get("address")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned();
            let counter = tx
                .get("counterAddress")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned();
            let (from, to) = if incoming {
                (counter, address)
            } else {
                (address, counter)
            };
            let amount = str_or_number(tx.get("amount")).unwrap_or_else(|| "0".into());
            let magnitude = amount.trim_start_matches('-').to_owned();
            Some(Transfer {
                txid: tx
                    .get("hash")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned(),
                from,
                to,
                value: codec.to_canonical(Some(&json!(magnitude)), chain, contract, false),
                timestamp: tx.get("timestamp").and_then(Value::as_i64).unwrap_or(0),
                symbol: tx
                    .get("asset")
                    .and_then(Value::as_str)
                    .unwrap_or(if contract.is_some() { "TOKEN" } else { "BSC" })
                    .to_owned(),
                status: None,
            })
        })
        .collect()
}

/// Tatum v3 EVM history rows.
pub(crate) fn parse_evm_v3_transfers(
    codec: &AmountCodec,
    chain: &str,
    contract: Option<&str>,
    txs: &[Value],
) -> Vec<Transfer> {
    txs.iter()
        .map(|tx| {
            let raw = tx.get("amount").or_else(|| tx.get("value"));
            Transfer {
                txid: tx
                    .get("hash")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned(),
                from: tx
                    .get("from")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned(),
                to: tx
                    .get("to")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned(),
                value: codec.to_canonical(raw, chain, contract, true),
                timestamp: tx
                    .get("timestamp")
                    .and_then(Value::as_i64)
                    .unwrap_or(0)
                    .saturating_mul(1000),
                symbol: tx
                    .get("symbol")
                    .and_then(Value::as_str)
                    .map(str::to_owned)
                    .unwrap_or_else(|| chain.to_ascii_uppercase()),
                status: None,
            }
        })
        .collect()
}

/// Solana balance-delta attribution for one confirmed transaction.
pub(crate) fn parse_sol_transfer(
    codec: &AmountCodec,
    chain: &str,
    owner: &str,
    signature: &str,
    tx: &Value,
) -> Option<Transfer> {
    let meta = tx.get("meta").filter(|m| !m.is_null())?;
    let account_keys = tx
        .pointer("/transaction/message/accountKeys")
        .and_then(Value::as_array)?;

    // keys may be bare strings or {pubkey, ...} objects
    let key_at = |idx: usize| -> Option<String> {
        let entry = account_keys.get(idx)?;
        match entry {
            Value::String(s) => Some(s.clone()),
            Value::Object(o) => o.get("pubkey").and_then(Value::as_str).map(str::to_owned),
            _ => None,
        }
    };
    let my_index = (0..account_keys.len()).find(|&i| key_at(i).as_deref() == Some(owner))?;

    let pre = meta.get("preBalances").and_then(Value::as_array)?;
    let post = meta.get("postBalances").and_then(Value::as_array)?;
    let pre_bal = pre.get(my_index)?.as_i64()?;
    let post_bal = post.get(my_index)?.as_i64()?;
    let diff = post_bal - pre_bal;

    let block_time = tx
        .get("blockTime")
        .and_then(Value::as_i64)
        .filter(|t| *t > 0)
        .map(|t| t * 1000)
        .unwrap_or_else(now_millis);

    let (from, to, lamports) = match diff {
        d if d > 0 => (String::new(), owner.to_owned(), d),
        d if d < 0 => {
            // recipient: the first other account whose balance increased
            let mut recipient = String::new();
            for idx in 0..pre.len().min(post.len()) {
                if idx == my_index {
                    continue;
                }
                let (Some(p), Some(q)) = (pre[idx].as_i64(), post[idx].as_i64()) else {
                    continue;
                };
                if q - p > 0 {
                    recipient = key_at(idx).unwrap_or_default();
                    break;
                }
            }
            (owner.to_owned(), recipient, -d)
        }
        // no native-value delta: signing or program interaction, skip
        _ => return None,
    };

    Some(Transfer {
        txid: signature.to_owned(),
        from,
        to,
        value: codec.to_canonical(Some(&json!(lamports)), chain, None, true),
        timestamp: block_time,
        symbol: "SOL".into(),
        status: None,
    })
}

/// Decoded BCH transaction detail, before amount rendering.
pub(crate) struct BchTxDetail {
    pub txid: String,
    pub from: String,
    pub to: String,
    pub value: BigDecimal,
    pub timestamp_ms: i64,
}

/// Per-vin CashAddr derivation and net-flow direction for a BCH
/// transaction. Address comparison strips the `bitcoincash:` prefix and is
/// case-insensitive.
pub(crate) fn parse_bch_tx_detail(tx_hash: &str, owner: &str, tx: &Value) -> Option<BchTxDetail> {
    let clean_owner = owner.rsplit(':').next().unwrap_or(owner).to_ascii_lowercase();
    let to_decimal = |v: Option<&Value>| {
        str_or_number(v)
            .and_then(|s| BigDecimal::from_str(&s).ok())
            .unwrap_or_else(|| BigDecimal::from(0))
    };

    let empty = vec![];
    let mut received = BigDecimal::from(0);
    for vout in tx.get("vout").and_then(Value::as_array).unwrap_or(&empty) {
        let addrs = vout
            .pointer("/scriptPubKey/addresses")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let mine = addrs.iter().any(|a| {
            a.as_str()
                .map(|a| a.rsplit(':').next().unwrap_or(a).eq_ignore_ascii_case(&clean_owner))
                .unwrap_or(false)
        });
        if mine {
            received += to_decimal(vout.get("value"));
        }
    }

    let mut sent = BigDecimal::from(0);
    for vin in tx.get("vin").and_then(Value::as_array).unwrap_or(&empty) {
        let asm = vin
            .pointer("/scriptSig/asm")
            .and_then(Value::as_str)
            .unwrap_or_default();
        // the final push of a P2PKH scriptSig is the compressed pubkey
        let vin_address = match asm.split_whitespace().last() {
            Some(candidate) if candidate.len() == 66 => {
                cashaddr::pubkey_to_cashaddr(candidate).unwrap_or_default()
            }
            _ => String::new(),
        };
        let clean_vin = vin_address
            .rsplit(':')
            .next()
            .unwrap_or("")
            .to_ascii_lowercase();
        if !clean_vin.is_empty() && clean_vin == clean_owner {
            sent += to_decimal(vin.get("value_coin"));
        }
    }

    let net = received - sent;
    let zero = BigDecimal::from(0);
    let (from, to) = if net >= zero {
        (String::new(), owner.to_owned())
    } else {
        (owner.to_owned(), String::new())
    };
    let value = if net < zero { -net } else { net };
    let timestamp_ms = tx
        .get("time")
        .and_then(Value::as_i64)
        .filter(|t| *t > 0)
        .map(|t| t * 1000)
        .unwrap_or_else(now_millis);

    Some(BchTxDetail {
        txid: tx_hash.to_owned(),
        from,
        to,
        value,
        timestamp_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaultgate_core::chain::{ChainKey, CoinMeta, Curve, TokenMeta};

    fn codec() -> AmountCodec {
        let coin = |id: &str, symbol: &str, decimals: u32, family: &str| CoinMeta {
            id: ChainKey::new(id),
            symbol: symbol.into(),
            name: symbol.into(),
            decimals,
            curve: Curve::Secp256k1,
            blockchain: family.into(),
            chain_id: None,
        };
        let coins = vec![
            coin("bitcoin", "BTC", 8, "bitcoin"),
            coin("bitcoincash", "BCH", 8, "bitcoin"),
            coin("doge", "DOGE", 8, "bitcoin"),
            coin("solana", "SOL", 9, "solana"),
            coin("tron", "TRX", 6, "tron"),
            coin("smartchain", "BNB", 18, "ethereum"),
        ];
        let tokens = vec![TokenMeta {
            coin: ChainKey::new("tron"),
            symbol: "USDT".into(),
            name: "USDT-TRC20".into(),
            contract: "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t".into(),
            decimals: 6,
        }];
        AmountCodec::new(Arc::new(Registry::from_parts(coins, tokens)))
    }

    #[test]
    fn pending_send_does_not_zero_the_balance() {
        let c = codec();
        let res = json!({
            "incoming": "1.5",
            "outgoing": "0.5",
            "incomingPending": "0",
            "outgoingPending": "1.0",
        });
        assert_eq!(reconcile_btc_balance(&c, "bitcoin", &res), "1.00000000");
    }

    #[test]
    fn pending_receive_is_added_and_floor_is_zero() {
        let c = codec();
        let res = json!({
            "incoming": "1.0",
            "outgoing": "1.0",
            "incomingPending": "0.25",
            "outgoingPending": "0",
        });
        assert_eq!(reconcile_btc_balance(&c, "bitcoin", &res), "0.25000000");

        let res = json!({ "incoming": "0", "outgoing": "3", "incomingPending": "0" });
        assert_eq!(reconcile_btc_balance(&c, "bitcoin", &res), "0.00000000");
    }

    #[test]
    fn btc_family_direction_follows_net_flow() {
        let c = codec();
        let txs = vec![json!({
            "hash": "aa",
            "time": 1700000000,
            "outputs": [{ "address": "me", "value": "30000" }],
            "inputs": [{ "coin": { "address": "me", "value": "100000" } }],
        })];
        let out = parse_btc_family_transfers(&c, "bitcoin", "me", false, &txs);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].from, "me");
        assert_eq!(out[0].to, "");
        assert_eq!(out[0].value, "0.00070000");
        assert_eq!(out[0].timestamp, 1_700_000_000_000);
    }

    #[test]
    fn doge_values_are_already_denominated() {
        let c = codec();
        let txs = vec![json!({
            "hash": "bb",
            "time": 1700000000,
            "outputs": [{ "address": "me", "value": "12.5" }],
            "inputs": [],
        })];
        let out = parse_btc_family_transfers(&c, "doge", "me", true, &txs);
        assert_eq!(out[0].value, "12.50000000");
        assert_eq!(out[0].to, "me");
    }

    #[test]
    fn tron_native_skips_trc10_and_prefers_base58() {
        let c = codec();
        let txs = vec![
            json!({
                "txID": "t1",
                "rawData": {
                    "timestamp": 1700000000123i64,
                    "contract": [{ "parameter": { "value": {
                        "ownerAddressBase58": "TSender",
                        "owner_address": "41aa",
                        "toAddressBase58": "TReceiver",
                        "to_address": "41bb",
                        "amount": 2500000,
                    }}}],
                },
            }),
            json!({
                "txID": "t2",
                "rawData": {
                    "timestamp": 1700000001000i64,
                    "contract": [{ "parameter": { "value": {
                        "asset_name": "1002000",
                        "amount": 1,
                    }}}],
                },
            }),
        ];
        let out = parse_tron_native_transfers(&c, "tron", &txs, 10);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].from, "TSender");
        assert_eq!(out[0].to, "TReceiver");
        assert_eq!(out[0].value, "2.500000");
        assert_eq!(out[0].timestamp, 1_700_000_000_123);
    }

    #[test]
    fn trc20_rows_report_their_backfill_ids() {
        let c = codec();
        let txs = vec![json!({
            "txID": "x1",
            "from": "TA",
            "to": "TB",
            "value": "5500000",
            "tokenInfo": { "symbol": "USDT" },
        })];
        let (transfers, ids) =
            parse_trc20_transfers(&c, "tron", "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t", &txs, 10);
        assert_eq!(ids, vec!["x1".to_owned()]);
        assert_eq!(transfers[0].value, "5.500000");
        assert_eq!(transfers[0].timestamp, 0);
    }

    #[test]
    fn solana_outgoing_finds_the_credited_account() {
        let c = codec();
        let tx = json!({
            "blockTime": 1700000000,
            "meta": {
                "preBalances": [5000000000i64, 1000, 0],
                "postBalances": [3999995000i64, 1000, 1000000000],
            },
            "transaction": { "message": { "accountKeys": [
                "MyKey", "FeeAccount", { "pubkey": "Recipient" },
            ]}},
        });
        let out = parse_sol_transfer(&c, "solana", "MyKey", "sig1", &tx).unwrap();
        assert_eq!(out.from, "MyKey");
        assert_eq!(out.to, "Recipient");
        assert_eq!(out.value, "1.00000500");
        assert_eq!(out.timestamp, 1_700_000_000_000);
    }

    #[test]
    fn solana_zero_delta_is_skipped() {
        let c = codec();
        let tx = json!({
            "meta": { "preBalances": [10], "postBalances": [10] },
            "transaction": { "message": { "accountKeys": ["MyKey"] } },
        });
        assert!(parse_sol_transfer(&c, "solana", "MyKey", "sig", &tx).is_none());
    }

    #[test]
    fn solana_unrelated_transaction_is_skipped() {
        let c = codec();
        let tx = json!({
            "meta": { "preBalances": [10], "postBalances": [20] },
            "transaction": { "message": { "accountKeys": ["SomeoneElse"] } },
        });
        assert!(parse_sol_transfer(&c, "solana", "MyKey", "sig", &tx).is_none());
    }

    #[test]
    fn bch_detail_direction_from_vin_derivation() {
        // vin pubkey hashes to an address that is not ours, vout pays us
        let pubkey = "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";
        let their_addr = cashaddr::pubkey_to_cashaddr(pubkey).unwrap();
        let owner = "bitcoincash:qpm2qsznhks23z7629mms6s4cwef74vcwvy22gdx6a";
        assert_ne!(their_addr, owner);

        let tx = json!({
            "time": 1700000000,
            "vin": [{
                "value_coin": 2.0,
                "scriptSig": { "asm": format!("3044deadbeef[ALL|FORKID] {pubkey}") },
            }],
            "vout": [{
                "value": 1.5,
                "scriptPubKey": { "addresses": [owner] },
            }],
        });
        let detail = parse_bch_tx_detail("h1", owner, &tx).unwrap();
        assert_eq!(detail.to, owner);
        assert_eq!(detail.from, "");
        assert_eq!(detail.value, BigDecimal::from_str("1.5").unwrap());
    }

    #[test]
    fn bch_detail_outgoing_when_we_funded_the_inputs() {
        let pubkey = "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";
        let owner = cashaddr::pubkey_to_cashaddr(pubkey).unwrap();
        let tx = json!({
            "time": 1700000000,
            "vin": [{
                "value_coin": 2.0,
                "scriptSig": { "asm": format!("3044deadbeef[ALL|FORKID] {pubkey}") },
            }],
            "vout": [{
                "value": 1.5,
                "scriptPubKey": { "addresses": ["bitcoincash:qqother"] },
            }],
        });
        let detail = parse_bch_tx_detail("h2", &owner, &tx).unwrap();
        assert_eq!(detail.from, owner);
        assert_eq!(detail.to, "");
        assert_eq!(detail.value, BigDecimal::from_str("2").unwrap());
    }

    #[test]
    fn bsc_v4_rows_orient_by_subtype_and_filter_token() {
        let c = codec();
        let txs = vec![
            json!({
                "hash": "h1",
                "transactionSubtype": "incoming",
                "address": "0xme",
                "counterAddress": "0xyou",
                "amount": "-0.5",
                "timestamp": 1700000000000i64,
                "asset": "BNB",
            }),
            json!({
                "hash": "h2",
                "transactionSubtype": "outgoing",
                "address": "0xme",
                "counterAddress": "0xyou",
                "amount": "1.25",
                "timestamp": 1700000001000i64,
                "asset": "BNB",
            }),
        ];
        let out = parse_bsc_v4_transfers(&c, "smartchain", None, &txs);
        assert_eq!(out.len(), 2);
        assert_eq!((out[0].from.as_str(), out[0].to.as_str()), ("0xyou", "0xme"));
        assert_eq!(out[0].value, "0.50000000");
        assert_eq!((out[1].from.as_str(), out[1].to.as_str()), ("0xme", "0xyou"));
    }

    #[test]
    fn gas_limit_heuristics() {
        assert_eq!(heuristic_gas_limit("ethereum", false), 21_000);
        assert_eq!(heuristic_gas_limit("ethereum", true), 100_000);
        assert_eq!(heuristic_gas_limit("arbitrum", false), 600_000);
        assert_eq!(heuristic_gas_limit("base", false), 600_000);
        assert_eq!(heuristic_gas_limit("arbitrum", true), 100_000);
    }
}
