//! Ankr — TON balance/history and the full Ripple surface.
//!
//! Ripple needs the most care here: `account_info` against the validated
//! ledger with `actNotFound` folded into an empty balance, network reserves
//! merged from a 1-hour `server_info` cache, history filtered to successful
//! Payments with Ripple-epoch conversion, and the narrow `tes*` success
//! check on submit.

use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use parking_lot::RwLock;
use serde_json::{json, Map, Value};
use tracing::warn;

use vaultgate_core::amount::CONFIG_MISSING;
use vaultgate_core::provider::{
    BalanceApi, BroadcastApi, FeeApi, ProviderCapabilities, ProviderResult, TxHistoryApi,
};
use vaultgate_core::{AmountCodec, BalanceResult, FeeQuote, Transfer, UpstreamError};

use super::toncenter::parse_ton_transfers;
use crate::http::{HttpClient, HttpMetrics};
use crate::runner::ProviderRunner;

/// Offset between the Ripple epoch (2000-01-01) and the Unix epoch.
const RIPPLE_EPOCH_OFFSET: i64 = 946_684_800;

/// Reserve requirements of the XRP ledger, cached for an hour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct XrpReserves {
    /// Base reserve in XRP.
    pub base_reserve: f64,
    /// Per-object owner reserve in XRP.
    pub owner_reserve: f64,
}

impl Default for XrpReserves {
    fn default() -> Self {
        // network defaults, used when server_info is unreachable
        Self {
            base_reserve: 10.0,
            owner_reserve: 2.0,
        }
    }
}

const RESERVE_TTL: Duration = Duration::from_secs(3600);

/// The Ankr adapter.
pub struct AnkrProvider {
    http: HttpClient,
    runner: ProviderRunner,
    codec: AmountCodec,
    api_key: String,
    base_url: String,
    reserve_cache: RwLock<Option<(XrpReserves, Instant)>>,
}

impl AnkrProvider {
    /// Build the adapter (2 slots, 0.5 s spacing).
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        codec: AmountCodec,
        metrics: Option<Arc<HttpMetrics>>,
    ) -> Self {
        Self {
            http: HttpClient::new("ankr", Duration::from_secs(30), metrics),
            runner: ProviderRunner::new("ankr", 2, Duration::from_millis(500)),
            codec,
            api_key: api_key.into(),
            base_url: base_url.into(),
            reserve_cache: RwLock::new(None),
        }
    }

    /// Capability record for the router.
    pub fn capabilities(self: Arc<Self>) -> ProviderCapabilities {
        ProviderCapabilities {
            name: "ankr",
            balance: Some(self.clone()),
            transactions: Some(self.clone()),
            fee: Some(self.clone()),
            broadcast: Some(self.clone()),
            ..Default::default()
        }
    }

    fn ton_url(&self) -> String {
        format!("{}/ton_api_v2/{}", self.base_url, self.api_key)
    }

    fn xrp_url(&self) -> String {
        format!("{}/xrp_mainnet/{}", self.base_url, self.api_key)
    }

    async fn post(&self, url: &str, body: &Value) -> ProviderResult<Value> {
        let headers = [("Content-Type", "application/json")];
        self.runner
            .run(|| self.http.post_json(url, &headers, body))
            .await
    }

    async fn xrp_rpc(&self, method: &str, params: Value) -> ProviderResult<Value> {
        let body = json!({ "method": method, "params": [params] });
        let resp = self.post(&self.xrp_url(), &body).await?;
        resp.get("result")
            .cloned()
            .ok_or_else(|| UpstreamError::Logical(format!("{method}: no result")))
    }

    async fn ton_rpc(&self, method: &str, params: Value) -> ProviderResult<Value> {
        let body = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": "1",
        });
        self.post(&self.ton_url(), &body).await
    }

    /// Current ledger reserves, served from the 1-hour cache. Expiry
    /// recomputation is not single-flighted; a duplicate `server_info` is
    /// cheaper than the coordination.
    async fn xrp_network_settings(&self) -> XrpReserves {
        if let Some((reserves, fetched)) = *self.reserve_cache.read() {
            if fetched.elapsed() < RESERVE_TTL {
                return reserves;
            }
        }
        let reserves = match self.xrp_rpc("server_info", json!({})).await {
            Ok(result) => {
                let ledger = result.pointer("/info/validated_ledger");
                let field = |key: &str| {
                    ledger
                        .and_then(|l| l.get(key))
                        .and_then(Value::as_f64)
                };
                XrpReserves {
                    base_reserve: field("reserve_base_xrp").unwrap_or(10.0),
                    owner_reserve: field("reserve_inc_xrp").unwrap_or(2.0),
                }
            }
            Err(err) => {
                warn!(error = %err, "xrp server_info failed, using default reserves");
                return XrpReserves::default();
            }
        };
        *self.reserve_cache.write() = Some((reserves, Instant::now()));
        reserves
    }

    async fn xrp_balance(&self, chain: &str, address: &str) -> ProviderResult<BalanceResult> {
        let payload = json!({
            "account": address,
            "strict": true,
            "ledger_index": "validated",
        });
        let result = self.xrp_rpc("account_info", payload).await?;
        if result.get("status").and_then(Value::as_str) != Some("success") {
            // actNotFound means an unfunded account; anything else still
            // yields the empty record rather than an upstream error body
            return Ok(empty_xrp_record());
        }
        let account_data = result.get("account_data").cloned().unwrap_or(Value::Null);
        let balance = self
            .codec
            .to_canonical(account_data.get("Balance"), chain, None, true);
        let sequence = account_data
            .get("Sequence")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let ledger_index = result
            .get("ledger_index")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let reserves = self.xrp_network_settings().await;

        let mut record = Map::new();
        record.insert("balance".into(), json!(balance));
        record.insert("sequence".into(), json!(sequence));
        record.insert("ledgerIndex".into(), json!(ledger_index));
        record.insert("base_reserve".into(), json!(reserves.base_reserve));
        record.insert("owner_reserve".into(), json!(reserves.owner_reserve));
        Ok(BalanceResult::Record(record))
    }

    async fn xrp_transactions(
        &self,
        chain: &str,
        address: &str,
        limit: usize,
    ) -> ProviderResult<Vec<Transfer>> {
        let payload = json!({
            "account": address,
            "binary": false,
            "forward": false,
            "ledger_index_min": -1,
            "ledger_index_max": -1,
            "limit": limit,
        });
        let result = self.xrp_rpc("account_tx", payload).await?;
        if result.get("status").and_then(Value::as_str) != Some("success") {
            return Ok(vec![]);
        }
        let txs = result
            .get("transactions")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Ok(parse_xrp_transfers(&self.codec, chain, &txs))
    }
}

#[async_trait]
impl BalanceApi for AnkrProvider {
    async fn balance(
        &self,
        chain: &str,
        address: &str,
        contract: Option<&str>,
    ) -> ProviderResult<BalanceResult> {
        match chain {
            "ton" => {
                let res = self
                    .ton_rpc("getAddressBalance", json!({ "address": address }))
                    .await?;
                Ok(BalanceResult::Amount(self.codec.to_canonical(
                    res.get("result"),
                    chain,
                    contract,
                    true,
                )))
            }
            "ripple" => self.xrp_balance(chain, address).await,
            _ => Ok(BalanceResult::Amount(CONFIG_MISSING.to_owned())),
        }
    }
}

#[async_trait]
impl TxHistoryApi for AnkrProvider {
    async fn transactions(
        &self,
        chain: &str,
        address: &str,
        _contract: Option<&str>,
        limit: usize,
    ) -> ProviderResult<Vec<Transfer>> {
        match chain {
            "ton" => {
                let res = self
                    .ton_rpc(
                        "getTransactions",
                        json!({ "address": address, "limit": limit, "archival": "true" }),
                    )
                    .await?;
                let txs = res
                    .get("result")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                Ok(parse_ton_transfers(&self.codec, chain, address, &txs))
            }
            "ripple" => self.xrp_transactions(chain, address, limit).await,
            _ => Ok(vec![]),
        }
    }
}

#[async_trait]
impl FeeApi for AnkrProvider {
    async fn fee(&self, chain: &str) -> ProviderResult<FeeQuote> {
        if chain != "ripple" {
            return Err(UpstreamError::Logical(format!("no fee source for {chain}")));
        }
        // open_ledger_fee tracks immediate inclusion; 12 drops is the floor
        // strict nodes will still relay
        let quote = match self.xrp_rpc("fee", json!({})).await {
            Ok(result) => {
                let drops = result
                    .pointer("/drops/open_ledger_fee")
                    .and_then(Value::as_str)
                    .and_then(|s| s.parse::<i64>().ok())
                    .unwrap_or(12)
                    .max(12);
                self.codec
                    .to_canonical(Some(&json!(drops)), chain, None, true)
            }
            Err(err) => {
                warn!(error = %err, "xrp fee lookup failed, using fallback");
                "0.000012".to_owned()
            }
        };
        Ok(FeeQuote::flat(quote))
    }
}

#[async_trait]
impl BroadcastApi for AnkrProvider {
    async fn broadcast(&self, _chain: &str, payload: &Value) -> ProviderResult<String> {
        let raw = payload.as_str().unwrap_or_default();
        let blob = raw
            .strip_prefix("0x")
            .or_else(|| raw.strip_prefix("0X"))
            .unwrap_or(raw);
        let result = self
            .xrp_rpc("submit", json!({ "tx_blob": blob }))
            .await?;
        let engine_result = result
            .get("engine_result")
            .and_then(Value::as_str)
            .unwrap_or_default();
        // only tes* counts as accepted; tec/ter/tem/tel/tef surface as failure
        if engine_result.starts_with("tes") {
            result
                .pointer("/tx_json/hash")
                .and_then(Value::as_str)
                .map(str::to_owned)
                .ok_or_else(|| UpstreamError::Logical("submit: no hash in tx_json".into()))
        } else {
            Err(UpstreamError::Logical(format!(
                "submit rejected: {engine_result}"
            )))
        }
    }
}

fn empty_xrp_record() -> BalanceResult {
    let mut record = Map::new();
    record.insert("balance".into(), json!(CONFIG_MISSING));
    record.insert("sequence".into(), json!(0));
    BalanceResult::Record(record)
}

/// Filter to successful Payments and convert Ripple-epoch seconds to Unix
/// milliseconds. Issued-token amounts (objects) are skipped.
pub(crate) fn parse_xrp_transfers(
    codec: &AmountCodec,
    chain: &str,
    txs: &[Value],
) -> Vec<Transfer> {
    txs.iter()
        .filter_map(|item| {
            let tx = item.get("tx")?;
            let meta = item.get("meta").cloned().unwrap_or(Value::Null);
            if meta.get("TransactionResult").and_then(Value::as_str) != Some("tesSUCCESS") {
                return None;
            }
            if tx.get("TransactionType").and_then(Value::as_str) != Some("Payment") {
                return None;
            }
            let value = match tx.get("Amount") {
                // drops of native XRP
                Some(Value::String(drops)) => {
                    // sanity-parse so garbage amounts don't render as config errors
                    BigDecimal::from_str(drops).ok()?;
                    codec.to_canonical(Some(&Value::String(drops.clone())), chain, None, true)
                }
                // issued-token amounts are out of scope for now
                Some(Value::Object(_)) => return None,
                _ => return None,
            };
            let date = tx.get("date").and_then(Value::as_i64).unwrap_or(0);
            Some(Transfer {
                txid: tx
                    .get("hash")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned(),
                from: tx
                    .get("Account")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned(),
                to: tx
                    .get("Destination")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned(),
                value,
                timestamp: (date + RIPPLE_EPOCH_OFFSET) * 1000,
                symbol: "XRP".into(),
                status: None,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaultgate_core::chain::{ChainKey, CoinMeta, Curve};
    use vaultgate_core::Registry;

    fn codec() -> AmountCodec {
        AmountCodec::new(Arc::new(Registry::from_parts(
            vec![CoinMeta {
                id: ChainKey::new("ripple"),
                symbol: "XRP".into(),
                name: "Ripple".into(),
                decimals: 6,
                curve: Curve::Secp256k1,
                blockchain: "ripple".into(),
                chain_id: None,
            }],
            vec![],
        )))
    }

    fn payment(result: &str, tx_type: &str, amount: Value, date: i64) -> Value {
        json!({
            "meta": { "TransactionResult": result },
            "tx": {
                "TransactionType": tx_type,
                "hash": "H",
                "Account": "rSender",
                "Destination": "rReceiver",
                "Amount": amount,
                "date": date,
            },
        })
    }

    #[test]
    fn failed_transactions_are_dropped() {
        let c = codec();
        let txs = vec![
            payment("tesSUCCESS", "Payment", json!("1000000"), 700000000),
            payment("tecUNFUNDED", "Payment", json!("1000000"), 700000001),
            payment("tesSUCCESS", "OfferCreate", json!("1000000"), 700000002),
        ];
        let out = parse_xrp_transfers(&c, "ripple", &txs);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].value, "1.000000");
    }

    #[test]
    fn timestamps_leave_the_ripple_epoch() {
        let c = codec();
        let txs = vec![payment("tesSUCCESS", "Payment", json!("12"), 700000000)];
        let out = parse_xrp_transfers(&c, "ripple", &txs);
        assert_eq!(out[0].timestamp, (700000000 + RIPPLE_EPOCH_OFFSET) * 1000);
        assert!(out[0].timestamp >= 946_684_800_000);
    }

    #[test]
    fn issued_token_amounts_are_skipped() {
        let c = codec();
        let txs = vec![payment(
            "tesSUCCESS",
            "Payment",
            json!({ "currency": "USD", "issuer": "rX", "value": "5" }),
            700000000,
        )];
        assert!(parse_xrp_transfers(&c, "ripple", &txs).is_empty());
    }
}
