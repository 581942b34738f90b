//! TonCenter — TON account state, seqno, history and broadcast.
//!
//! TonCenter wraps every response in `{"ok": bool, "result": ...}`; a body
//! with `ok == false` is a logical error even on HTTP 200.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::error;

use vaultgate_core::provider::{
    BroadcastApi, ProviderCapabilities, ProviderResult, SeqnoApi, TxHistoryApi,
};
use vaultgate_core::{AmountCodec, SeqnoInfo, Transfer, UpstreamError};

use crate::http::{HttpClient, HttpMetrics};
use crate::runner::ProviderRunner;

/// The TonCenter adapter.
pub struct TonCenterProvider {
    http: HttpClient,
    runner: ProviderRunner,
    codec: AmountCodec,
    api_key: String,
    base_url: String,
}

impl TonCenterProvider {
    /// Build the adapter (5 slots, no spacing; TonCenter limits by key).
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        codec: AmountCodec,
        metrics: Option<Arc<HttpMetrics>>,
    ) -> Self {
        Self {
            http: HttpClient::new("toncenter", Duration::from_secs(15), metrics),
            runner: ProviderRunner::new("toncenter", 5, Duration::ZERO),
            codec,
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }

    /// Capability record for the router.
    pub fn capabilities(self: Arc<Self>) -> ProviderCapabilities {
        ProviderCapabilities {
            name: "toncenter",
            transactions: Some(self.clone()),
            seqno: Some(self.clone()),
            broadcast: Some(self.clone()),
            ..Default::default()
        }
    }

    /// Issue a request and unwrap the `{"ok", "result"}` envelope.
    async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> ProviderResult<Value> {
        let url = format!("{}{path}", self.base_url);
        let headers = [
            ("Content-Type", "application/json"),
            ("X-API-Key", self.api_key.as_str()),
        ];
        let resp = self
            .runner
            .run(|| {
                self.http
                    .request_json(method.clone(), &url, &headers, query, body, None)
            })
            .await?;
        if resp.get("ok").and_then(Value::as_bool) != Some(true) {
            let detail = resp
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unspecified");
            return Err(UpstreamError::Logical(format!("toncenter: {detail}")));
        }
        resp.get("result")
            .cloned()
            .ok_or_else(|| UpstreamError::Logical("toncenter: no result".into()))
    }
}

#[async_trait]
impl SeqnoApi for TonCenterProvider {
    async fn seqno(&self, chain: &str, address: &str) -> ProviderResult<SeqnoInfo> {
        let info = self
            .request(
                Method::GET,
                "/getAddressInformation",
                &[("address", address)],
                None,
            )
            .await?;

        let state = info
            .get("state")
            .and_then(Value::as_str)
            .unwrap_or("uninitialized");
        let balance = self
            .codec
            .to_canonical(info.get("balance"), chain, None, true);

        if state != "active" {
            // undeployed or frozen wallets have no seqno on chain
            return Ok(SeqnoInfo {
                seqno: 0,
                is_deployed: false,
                balance,
                estimated_fee: "0.01".into(),
            });
        }

        // An active wallet must produce a real seqno; defaulting to 0 here
        // would have the device sign an invalid transaction.
        let body = json!({ "address": address, "method": "seqno", "stack": [] });
        let seq = self
            .request(Method::POST, "/runGetMethod", &[], Some(&body))
            .await
            .map_err(|err| {
                error!(address, error = %err, "active wallet but seqno fetch failed");
                UpstreamError::Fatal("seqno unavailable for active wallet".into())
            })?;
        let seqno = parse_seqno_stack(&seq).ok_or_else(|| {
            error!(address, "active wallet returned an invalid seqno stack");
            UpstreamError::Fatal("invalid seqno response from node".into())
        })?;

        Ok(SeqnoInfo {
            seqno,
            is_deployed: true,
            balance,
            estimated_fee: "0.01".into(),
        })
    }
}

#[async_trait]
impl TxHistoryApi for TonCenterProvider {
    async fn transactions(
        &self,
        chain: &str,
        address: &str,
        _contract: Option<&str>,
        limit: usize,
    ) -> ProviderResult<Vec<Transfer>> {
        let limit = limit.to_string();
        let query = [
            ("address", address),
            ("limit", limit.as_str()),
            ("archival", "true"),
        ];
        let result = self
            .request(Method::GET, "/getTransactions", &query, None)
            .await?;
        let txs = result.as_array().cloned().unwrap_or_default();
        Ok(parse_ton_transfers(&self.codec, chain, address, &txs))
    }
}

#[async_trait]
impl BroadcastApi for TonCenterProvider {
    async fn broadcast(&self, _chain: &str, payload: &Value) -> ProviderResult<String> {
        let boc = payload.as_str().unwrap_or_default();
        let body = json!({ "boc": boc });
        let result = self
            .request(Method::POST, "/sendBocReturnHash", &[], Some(&body))
            .await?;
        result
            .get("hash")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| UpstreamError::Logical("sendBoc: no hash in response".into()))
    }
}

/// `runGetMethod` answers `stack: [["num", "0x1f"], ...]`; the first slot
/// carries the counter, hex or decimal.
pub(crate) fn parse_seqno_stack(result: &Value) -> Option<u64> {
    let stack = result.get("stack")?.as_array()?;
    let first = stack.first()?.as_array()?;
    if first.first()?.as_str()? != "num" {
        return None;
    }
    let raw = first.get(1)?.as_str()?;
    match raw.strip_prefix("0x") {
        Some(hexpart) => u64::from_str_radix(hexpart, 16).ok(),
        None => raw.parse().ok(),
    }
}

/// Fund-flow direction for a TON transaction list.
///
/// Any `out_msgs` entry means an outgoing transfer (value = sum of outgoing
/// messages, recipient = first destination); otherwise a positive incoming
/// value means a receive; everything else is a zero-value contract
/// interaction.
pub(crate) fn parse_ton_transfers(
    codec: &AmountCodec,
    chain: &str,
    owner: &str,
    txs: &[Value],
) -> Vec<Transfer> {
    txs.iter()
        .map(|tx| {
            let in_msg = tx.get("in_msg").cloned().unwrap_or(Value::Null);
            let empty = vec![];
            let out_msgs = tx.get("out_msgs").and_then(Value::as_array).unwrap_or(&empty);

            let msg_value = |m: &Value| {
                m.get("value")
                    .map(|v| match v {
                        Value::String(s) => s.parse::<i128>().unwrap_or(0),
                        Value::Number(n) => n.as_i64().unwrap_or(0) as i128,
                        _ => 0,
                    })
                    .unwrap_or(0)
            };
            let in_value = msg_value(&in_msg);
            let out_value: i128 = out_msgs.iter().map(msg_value).sum();

            let (from, to, display_value) = if !out_msgs.is_empty() {
                let dest = out_msgs[0]
                    .get("destination")
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
                    .unwrap_or("Unknown");
                (owner.to_owned(), dest.to_owned(), out_value)
            } else if in_value > 0 {
                let source = in_msg
                    .get("source")
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
                    .unwrap_or("External");
                (source.to_owned(), owner.to_owned(), in_value)
            } else {
                let source = in_msg
                    .get("source")
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
                    .unwrap_or("Unknown");
                (source.to_owned(), owner.to_owned(), 0)
            };

            Transfer {
                txid: tx
                    .pointer("/transaction_id/hash")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned(),
                from,
                to,
                value: codec.to_canonical(
                    Some(&Value::String(display_value.to_string())),
                    chain,
                    None,
                    true,
                ),
                timestamp: tx.get("utime").and_then(Value::as_i64).unwrap_or(0) * 1000,
                symbol: "TON".into(),
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
                id: ChainKey::new("ton"),
                symbol: "TON".into(),
                name: "Toncoin".into(),
                decimals: 9,
                curve: Curve::Ed25519,
                blockchain: "ton".into(),
                chain_id: None,
            }],
            vec![],
        )))
    }

    #[test]
    fn out_msgs_mean_outgoing() {
        let c = codec();
        let txs = vec![json!({
            "transaction_id": { "hash": "h1" },
            "utime": 1700000000,
            "in_msg": { "value": "0" },
            "out_msgs": [
                { "destination": "EQdest", "value": "1500000000" },
                { "destination": "EQdest2", "value": "500000000" },
            ],
        })];
        let out = parse_ton_transfers(&c, "ton", "EQme", &txs);
        assert_eq!(out[0].from, "EQme");
        assert_eq!(out[0].to, "EQdest");
        assert_eq!(out[0].value, "2.00000000");
        assert_eq!(out[0].timestamp, 1_700_000_000_000);
    }

    #[test]
    fn incoming_value_means_incoming() {
        let c = codec();
        let txs = vec![json!({
            "transaction_id": { "hash": "h2" },
            "utime": 1700000000,
            "in_msg": { "source": "EQsender", "value": "250000000" },
            "out_msgs": [],
        })];
        let out = parse_ton_transfers(&c, "ton", "EQme", &txs);
        assert_eq!(out[0].from, "EQsender");
        assert_eq!(out[0].to, "EQme");
        assert_eq!(out[0].value, "0.25000000");
    }

    #[test]
    fn external_incoming_without_source() {
        let c = codec();
        let txs = vec![json!({
            "transaction_id": { "hash": "h3" },
            "utime": 1,
            "in_msg": { "value": "100" },
            "out_msgs": [],
        })];
        let out = parse_ton_transfers(&c, "ton", "EQme", &txs);
        assert_eq!(out[0].from, "External");
    }

    #[test]
    fn zero_value_interaction_keeps_zero_amount() {
        let c = codec();
        let txs = vec![json!({
            "transaction_id": { "hash": "h4" },
            "utime": 1,
            "in_msg": { "source": "EQcontract", "value": "0" },
            "out_msgs": [],
        })];
        let out = parse_ton_transfers(&c, "ton", "EQme", &txs);
        assert_eq!(out[0].value, "0.00000000");
        assert_eq!(out[0].from, "EQcontract");
        assert_eq!(out[0].to, "EQme");
    }

    #[test]
    fn seqno_stack_parses_hex_and_decimal() {
        let hex = json!({ "stack": [["num", "0x1f"]] });
        assert_eq!(parse_seqno_stack(&hex), Some(31));
        let dec = json!({ "stack": [["num", "42"]] });
        assert_eq!(parse_seqno_stack(&dec), Some(42));
        let bad = json!({ "stack": [] });
        assert_eq!(parse_seqno_stack(&bad), None);
        let wrong_tag = json!({ "stack": [["cell", "0x00"]] });
        assert_eq!(parse_seqno_stack(&wrong_tag), None);
    }
}
