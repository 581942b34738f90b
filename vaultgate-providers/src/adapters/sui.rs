//! Sui fullnode JSON-RPC adapter.
//!
//! Sui has no UTXOs; coin objects play that role and the signer needs each
//! object's `{objectId, version, digest}` triple. History is assembled from
//! two `suix_queryTransactionBlocks` sweeps (sent and received) merged by
//! digest.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use vaultgate_core::provider::{
    BalanceApi, BroadcastApi, FeeApi, ProviderCapabilities, ProviderResult, TxHistoryApi,
    UtxoApi,
};
use vaultgate_core::{AmountCodec, BalanceResult, FeeQuote, Transfer, UpstreamError, Utxo};

use crate::http::{HttpClient, HttpMetrics};
use crate::runner::ProviderRunner;

const SUI_COIN_TYPE: &str = "0x2::sui::SUI";

/// The Sui adapter.
pub struct SuiProvider {
    http: HttpClient,
    runner: ProviderRunner,
    codec: AmountCodec,
    rpc_url: String,
}

impl SuiProvider {
    /// Build the adapter against a fullnode (4 slots, no spacing).
    pub fn new(
        rpc_url: impl Into<String>,
        codec: AmountCodec,
        metrics: Option<Arc<HttpMetrics>>,
    ) -> Self {
        Self {
            http: HttpClient::new("sui", Duration::from_secs(30), metrics),
            runner: ProviderRunner::new("sui", 4, Duration::ZERO),
            codec,
            rpc_url: rpc_url.into(),
        }
    }

    /// Capability record for the router.
    pub fn capabilities(self: Arc<Self>) -> ProviderCapabilities {
        ProviderCapabilities {
            name: "sui",
            balance: Some(self.clone()),
            transactions: Some(self.clone()),
            utxos: Some(self.clone()),
            fee: Some(self.clone()),
            broadcast: Some(self.clone()),
            ..Default::default()
        }
    }

    async fn rpc(&self, method: &str, params: Value) -> ProviderResult<Value> {
        let body = json!({ "jsonrpc": "2.0", "id": 1, "method": method, "params": params });
        let resp = self
            .runner
            .run(|| {
                self.http.post_json(
                    &self.rpc_url,
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

    async fn query_blocks(&self, filter: Value, limit: usize) -> ProviderResult<Vec<Value>> {
        let params = json!([
            { "filter": filter, "options": { "showBalanceChanges": true } },
            null,
            limit,
            true, // descending
        ]);
        let result = self.rpc("suix_queryTransactionBlocks", params).await?;
        Ok(result
            .get("data")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl BalanceApi for SuiProvider {
    async fn balance(
        &self,
        chain: &str,
        address: &str,
        _contract: Option<&str>,
    ) -> ProviderResult<BalanceResult> {
        let result = self
            .rpc("suix_getBalance", json!([address, SUI_COIN_TYPE]))
            .await?;
        Ok(BalanceResult::Amount(self.codec.to_canonical(
            result.get("totalBalance"),
            chain,
            None,
            true,
        )))
    }
}

#[async_trait]
impl UtxoApi for SuiProvider {
    async fn utxos(
        &self,
        chain: &str,
        address: &str,
        _total_value: &str,
    ) -> ProviderResult<Vec<Utxo>> {
        let result = self
            .rpc("suix_getCoins", json!([address, SUI_COIN_TYPE]))
            .await?;
        let coins = result
            .get("data")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Ok(coins
            .iter()
            .filter_map(|coin| {
                let object_id = coin.get("coinObjectId")?.as_str()?.to_owned();
                let value = self.codec.to_canonical(coin.get("balance"), chain, None, true);
                // the signer rebuilds the object reference from these three
                let mut extras = Map::new();
                extras.insert("objectId".into(), json!(object_id));
                extras.insert(
                    "version".into(),
                    coin.get("version").cloned().unwrap_or(Value::Null),
                );
                extras.insert(
                    "digest".into(),
                    coin.get("digest").cloned().unwrap_or(Value::Null),
                );
                Some(Utxo {
                    tx_hash: object_id,
                    index: 0,
                    value,
                    script: None,
                    extras,
                })
            })
            .collect())
    }
}

#[async_trait]
impl TxHistoryApi for SuiProvider {
    async fn transactions(
        &self,
        chain: &str,
        address: &str,
        _contract: Option<&str>,
        limit: usize,
    ) -> ProviderResult<Vec<Transfer>> {
        // both directions, merged by digest, newest first
        let sent = self
            .query_blocks(json!({ "FromAddress": address }), limit)
            .await?;
        let received = self
            .query_blocks(json!({ "ToAddress": address }), limit)
            .await?;
        Ok(merge_sui_history(&self.codec, chain, address, sent, received, limit))
    }
}

#[async_trait]
impl FeeApi for SuiProvider {
    async fn fee(&self, chain: &str) -> ProviderResult<FeeQuote> {
        let result = self.rpc("suix_getReferenceGasPrice", json!([])).await?;
        Ok(FeeQuote::flat(self.codec.to_canonical(
            Some(&result),
            chain,
            None,
            true,
        )))
    }
}

#[async_trait]
impl BroadcastApi for SuiProvider {
    async fn broadcast(&self, _chain: &str, payload: &Value) -> ProviderResult<String> {
        // the device hands over the pair it produced while signing, either
        // as an object or as a JSON string
        let parsed;
        let payload = match payload {
            Value::String(s) => {
                parsed = serde_json::from_str::<Value>(s)
                    .map_err(|_| UpstreamError::Fatal("sui broadcast: malformed payload".into()))?;
                &parsed
            }
            other => other,
        };
        let tx_bytes = payload
            .get("txBytes")
            .and_then(Value::as_str)
            .ok_or_else(|| UpstreamError::Fatal("sui broadcast: missing txBytes".into()))?;
        let signature = payload
            .get("signature")
            .and_then(Value::as_str)
            .ok_or_else(|| UpstreamError::Fatal("sui broadcast: missing signature".into()))?;
        let params = json!([
            tx_bytes,
            [signature],
            { "showEffects": true },
            "WaitForLocalExecution",
        ]);
        let result = self.rpc("sui_executeTransactionBlock", params).await?;
        result
            .get("digest")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| UpstreamError::Logical("executeTransactionBlock: no digest".into()))
    }
}

/// Merge the bidirectional sweeps, attribute balance changes, keep the top
/// `limit` newest.
pub(crate) fn merge_sui_history(
    codec: &AmountCodec,
    chain: &str,
    owner: &str,
    sent: Vec<Value>,
    received: Vec<Value>,
    limit: usize,
) -> Vec<Transfer> {
    let mut seen = HashSet::new();
    let mut blocks: Vec<Value> = Vec::new();
    for block in sent.into_iter().chain(received) {
        let Some(digest) = block.get("digest").and_then(Value::as_str) else {
            continue;
        };
        if seen.insert(digest.to_owned()) {
            blocks.push(block);
        }
    }
    let stamp = |b: &Value| {
        b.get("timestampMs")
            .and_then(|v| match v {
                Value::String(s) => s.parse::<i64>().ok(),
                Value::Number(n) => n.as_i64(),
                _ => None,
            })
            .unwrap_or(0)
    };
    blocks.sort_by_key(|b| std::cmp::Reverse(stamp(b)));
    blocks.truncate(limit);

    blocks
        .iter()
        .filter_map(|block| {
            let digest = block.get("digest")?.as_str()?.to_owned();
            let empty = vec![];
            let changes = block
                .get("balanceChanges")
                .and_then(Value::as_array)
                .unwrap_or(&empty);

            let change_owner = |c: &Value| {
                c.pointer("/owner/AddressOwner")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned()
            };
            let change_amount = |c: &Value| {
                c.get("amount")
                    .and_then(Value::as_str)
                    .and_then(|s| s.parse::<i128>().ok())
                    .unwrap_or(0)
            };
            let is_sui = |c: &Value| {
                c.get("coinType").and_then(Value::as_str) == Some(SUI_COIN_TYPE)
            };

            let my_change: i128 = changes
                .iter()
                .filter(|c| is_sui(c) && change_owner(c) == owner)
                .map(|c| change_amount(c))
                .sum();

            let sender = block
                .pointer("/transaction/data/sender")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned();

            let (from, to, magnitude) = if my_change > 0 {
                let from = if sender.is_empty() || sender == owner {
                    String::new()
                } else {
                    sender
                };
                (from, owner.to_owned(), my_change)
            } else if my_change < 0 {
                // recipient: first positive change for an address that is
                // neither us nor the sender
                let recipient = changes
                    .iter()
                    .filter(|c| is_sui(c) && change_amount(c) > 0)
                    .map(|c| change_owner(c))
                    .find(|a| !a.is_empty() && a.as_str() != owner && *a != sender)
                    .unwrap_or_default();
                (owner.to_owned(), recipient, -my_change)
            } else {
                return None;
            };

            Some(Transfer {
                txid: digest,
                from,
                to,
                value: codec.to_canonical(
                    Some(&Value::String(magnitude.to_string())),
                    chain,
                    None,
                    true,
                ),
                timestamp: stamp(block),
                symbol: "SUI".into(),
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
                id: ChainKey::new("sui"),
                symbol: "SUI".into(),
                name: "Sui".into(),
                decimals: 9,
                curve: Curve::Ed25519,
                blockchain: "sui".into(),
                chain_id: None,
            }],
            vec![],
        )))
    }

    fn block(digest: &str, ts: i64, sender: &str, changes: Value) -> Value {
        json!({
            "digest": digest,
            "timestampMs": ts.to_string(),
            "transaction": { "data": { "sender": sender } },
            "balanceChanges": changes,
        })
    }

    #[test]
    fn bidirectional_merge_dedupes_and_sorts_newest_first() {
        let c = codec();
        let outgoing = block(
            "d1",
            2000,
            "0xme",
            json!([
                { "owner": { "AddressOwner": "0xme" }, "coinType": SUI_COIN_TYPE, "amount": "-1500000000" },
                { "owner": { "AddressOwner": "0xyou" }, "coinType": SUI_COIN_TYPE, "amount": "1000000000" },
            ]),
        );
        let incoming = block(
            "d2",
            3000,
            "0xother",
            json!([
                { "owner": { "AddressOwner": "0xme" }, "coinType": SUI_COIN_TYPE, "amount": "2000000000" },
            ]),
        );
        let sent = vec![outgoing.clone()];
        let received = vec![incoming, outgoing];
        let out = merge_sui_history(&c, "sui", "0xme", sent, received, 10);

        assert_eq!(out.len(), 2);
        // newest first
        assert_eq!(out[0].txid, "d2");
        assert_eq!(out[0].from, "0xother");
        assert_eq!(out[0].to, "0xme");
        assert_eq!(out[0].value, "2.00000000");
        // outgoing attributes the recipient
        assert_eq!(out[1].txid, "d1");
        assert_eq!(out[1].from, "0xme");
        assert_eq!(out[1].to, "0xyou");
        assert_eq!(out[1].value, "1.50000000");
    }

    #[test]
    fn non_sui_coin_changes_are_ignored() {
        let c = codec();
        let b = block(
            "d3",
            1000,
            "0xme",
            json!([
                { "owner": { "AddressOwner": "0xme" }, "coinType": "0xabc::usdc::USDC", "amount": "-5" },
            ]),
        );
        assert!(merge_sui_history(&c, "sui", "0xme", vec![b], vec![], 10).is_empty());
    }

    #[test]
    fn limit_truncates_after_the_merge() {
        let c = codec();
        let mk = |d: &str, ts: i64| {
            block(
                d,
                ts,
                "0xother",
                json!([{ "owner": { "AddressOwner": "0xme" }, "coinType": SUI_COIN_TYPE, "amount": "1" }]),
            )
        };
        let sent = vec![mk("a", 1), mk("b", 2)];
        let received = vec![mk("c", 3), mk("d", 4)];
        let out = merge_sui_history(&c, "sui", "0xme", sent, received, 3);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].txid, "d");
    }
}
