//! Dash Insight REST adapter.
//!
//! Insight reports amounts in whole DASH alongside satoshi fields; UTXOs
//! must keep their `scriptPubKey` because the signer consumes it verbatim.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use reqwest::Method;
use serde_json::{json, Map, Value};

use vaultgate_core::provider::{
    BalanceApi, BroadcastApi, ProviderCapabilities, ProviderResult, TxHistoryApi, UtxoApi,
};
use vaultgate_core::{AmountCodec, BalanceResult, Transfer, UpstreamError, Utxo};

use super::{now_millis, str_or_number};
use crate::http::{HttpClient, HttpMetrics};
use crate::runner::ProviderRunner;

/// The Dash Insight adapter.
pub struct InsightProvider {
    http: HttpClient,
    runner: ProviderRunner,
    codec: AmountCodec,
    base_url: String,
}

impl InsightProvider {
    /// Build the adapter (4 slots, no spacing).
    pub fn new(
        base_url: impl Into<String>,
        codec: AmountCodec,
        metrics: Option<Arc<HttpMetrics>>,
    ) -> Self {
        Self {
            http: HttpClient::new("dash-insight", Duration::from_secs(30), metrics),
            runner: ProviderRunner::new("dash-insight", 4, Duration::ZERO),
            codec,
            base_url: base_url.into(),
        }
    }

    /// Capability record for the router.
    pub fn capabilities(self: Arc<Self>) -> ProviderCapabilities {
        ProviderCapabilities {
            name: "insight",
            balance: Some(self.clone()),
            transactions: Some(self.clone()),
            utxos: Some(self.clone()),
            broadcast: Some(self.clone()),
            ..Default::default()
        }
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> ProviderResult<Value> {
        let url = format!("{}{path}", self.base_url);
        self.runner
            .run(|| {
                self.http
                    .request_json(Method::GET, &url, &[], query, None, None)
            })
            .await
    }
}

#[async_trait]
impl BalanceApi for InsightProvider {
    async fn balance(
        &self,
        chain: &str,
        address: &str,
        _contract: Option<&str>,
    ) -> ProviderResult<BalanceResult> {
        let res = self.get(&format!("/addr/{address}"), &[]).await?;
        Ok(BalanceResult::Amount(self.codec.to_canonical(
            res.get("balanceSat"),
            chain,
            None,
            true,
        )))
    }
}

#[async_trait]
impl UtxoApi for InsightProvider {
    async fn utxos(
        &self,
        chain: &str,
        address: &str,
        _total_value: &str,
    ) -> ProviderResult<Vec<Utxo>> {
        let res = self.get(&format!("/addr/{address}/utxo"), &[]).await?;
        let Some(items) = res.as_array() else {
            return Ok(vec![]);
        };
        Ok(items
            .iter()
            .filter_map(|item| {
                let tx_hash = item.get("txid")?.as_str()?.to_owned();
                let index = item.get("vout")?.as_u64()?;
                let value = self
                    .codec
                    .to_canonical(item.get("satoshis"), chain, None, true);
                let mut extras = Map::new();
                for key in ["height", "confirmations"] {
                    if let Some(v) = item.get(key) {
                        extras.insert(key.into(), v.clone());
                    }
                }
                Some(Utxo {
                    tx_hash,
                    index,
                    value,
                    script: item
                        .get("scriptPubKey")
                        .and_then(Value::as_str)
                        .map(str::to_owned),
                    extras,
                })
            })
            .collect())
    }
}

#[async_trait]
impl TxHistoryApi for InsightProvider {
    async fn transactions(
        &self,
        chain: &str,
        address: &str,
        _contract: Option<&str>,
        limit: usize,
    ) -> ProviderResult<Vec<Transfer>> {
        let res = self
            .get("/txs", &[("address", address), ("pageNum", "0")])
            .await?;
        let txs = res
            .get("txs")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Ok(parse_insight_transfers(&self.codec, chain, address, &txs, limit))
    }
}

#[async_trait]
impl BroadcastApi for InsightProvider {
    async fn broadcast(&self, _chain: &str, payload: &Value) -> ProviderResult<String> {
        let raw = payload.as_str().unwrap_or_default();
        let rawtx = raw.strip_prefix("0x").unwrap_or(raw);
        let url = format!("{}/tx/send", self.base_url);
        let body = json!({ "rawtx": rawtx });
        let res = self
            .runner
            .run(|| self.http.post_json(&url, &[], &body))
            .await?;
        // Insight answers {"txid": "..."} or {"txid": {"result": "..."}}
        match res.get("txid") {
            Some(Value::String(txid)) => Ok(txid.clone()),
            Some(Value::Object(obj)) => obj
                .get("result")
                .and_then(Value::as_str)
                .map(str::to_owned)
                .ok_or_else(|| UpstreamError::Logical("tx/send: no txid".into())),
            _ => Err(UpstreamError::Logical("tx/send: no txid".into())),
        }
    }
}

/// Net-flow direction over Insight's denominated vin/vout lists.
pub(crate) fn parse_insight_transfers(
    codec: &AmountCodec,
    chain: &str,
    owner: &str,
    txs: &[Value],
    limit: usize,
) -> Vec<Transfer> {
    let to_decimal = |v: Option<&Value>| {
        str_or_number(v)
            .and_then(|s| BigDecimal::from_str(&s).ok())
            .unwrap_or_else(|| BigDecimal::from(0))
    };
    txs.iter()
        .take(limit)
        .map(|tx| {
            let empty = vec![];
            let received: BigDecimal = tx
                .get("vout")
                .and_then(Value::as_array)
                .unwrap_or(&empty)
                .iter()
                .filter(|vout| {
                    vout.pointer("/scriptPubKey/addresses")
                        .and_then(Value::as_array)
                        .map(|addrs| addrs.iter().any(|a| a.as_str() == Some(owner)))
                        .unwrap_or(false)
                })
                .map(|vout| to_decimal(vout.get("value")))
                .sum();
            let sent: BigDecimal = tx
                .get("vin")
                .and_then(Value::as_array)
                .unwrap_or(&empty)
                .iter()
                .filter(|vin| vin.get("addr").and_then(Value::as_str) == Some(owner))
                .map(|vin| to_decimal(vin.get("value")))
                .sum();

            let net = received - sent;
            let zero = BigDecimal::from(0);
            let (from, to) = if net >= zero {
                (String::new(), owner.to_owned())
            } else {
                (owner.to_owned(), String::new())
            };
            let magnitude = if net < zero { -net } else { net };
            Transfer {
                txid: tx
                    .get("txid")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned(),
                from,
                to,
                value: codec.decimal_to_canonical(&magnitude, chain, None, false),
                timestamp: tx
                    .get("time")
                    .and_then(Value::as_i64)
                    .filter(|t| *t > 0)
                    .map(|t| t * 1000)
                    .unwrap_or_else(now_millis),
                symbol: "DASH".into(),
                status: None,
            }
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
                id: ChainKey::new("dash"),
                symbol: "DASH".into(),
                name: "Dash".into(),
                decimals: 8,
                curve: Curve::Secp256k1,
                blockchain: "bitcoin".into(),
                chain_id: None,
            }],
            vec![],
        )))
    }

    #[test]
    fn incoming_when_only_outputs_match() {
        let c = codec();
        let txs = vec![json!({
            "txid": "t1",
            "time": 1700000000,
            "vin": [{ "addr": "XsomeoneElse", "value": 2.0 }],
            "vout": [{ "value": "1.25", "scriptPubKey": { "addresses": ["Xme"] } }],
        })];
        let out = parse_insight_transfers(&c, "dash", "Xme", &txs, 10);
        assert_eq!(out[0].to, "Xme");
        assert_eq!(out[0].from, "");
        assert_eq!(out[0].value, "1.25000000");
    }

    #[test]
    fn outgoing_subtracts_change_output() {
        let c = codec();
        let txs = vec![json!({
            "txid": "t2",
            "time": 1700000000,
            "vin": [{ "addr": "Xme", "value": 3.0 }],
            "vout": [
                { "value": "2.0", "scriptPubKey": { "addresses": ["Xother"] } },
                { "value": "0.9", "scriptPubKey": { "addresses": ["Xme"] } },
            ],
        })];
        let out = parse_insight_transfers(&c, "dash", "Xme", &txs, 10);
        assert_eq!(out[0].from, "Xme");
        assert_eq!(out[0].to, "");
        // net -2.1 (the 0.9 change came back)
        assert_eq!(out[0].value, "2.10000000");
    }
}
