//! Exchange spot-quote sources for the price aggregator.
//!
//! Tiered behind one trait: Binance first (US endpoint, so `TRX` and `XRP`
//! are blacklisted there), then OKX, then CoinGecko via the registry's
//! symbol-to-id mapping. Sources swallow their own failures and return what
//! they found; the aggregator treats the rest as misses for the next tier.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use vaultgate_core::Registry;

use crate::http::{HttpClient, HttpMetrics};
use crate::runner::ProviderRunner;

/// Symbols the Binance US endpoint does not list.
const BINANCE_BLACKLIST: &[&str] = &["TRX", "XRP"];

/// One tier of the price fan-out.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Tier name for logs.
    fn name(&self) -> &'static str;

    /// Fetch USD quotes for the uppercase `symbols` it can serve. Missing
    /// symbols are simply absent from the result.
    async fn fetch_batch(&self, symbols: &[String]) -> HashMap<String, f64>;
}

/// Binance spot ticker (single batch endpoint).
pub struct BinanceTicker {
    http: HttpClient,
    runner: ProviderRunner,
    base_url: String,
}

impl BinanceTicker {
    /// Build the tier (2 slots, no spacing, 10 s timeout).
    pub fn new(base_url: impl Into<String>, metrics: Option<Arc<HttpMetrics>>) -> Self {
        Self {
            http: HttpClient::new("binance", Duration::from_secs(10), metrics),
            runner: ProviderRunner::new("binance", 2, Duration::ZERO),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl PriceSource for BinanceTicker {
    fn name(&self) -> &'static str {
        "binance"
    }

    async fn fetch_batch(&self, symbols: &[String]) -> HashMap<String, f64> {
        let mut results = HashMap::new();
        // pair name on the exchange -> requested symbol
        let mut target_map = HashMap::new();
        for s in symbols {
            if BINANCE_BLACKLIST.contains(&s.as_str()) {
                continue;
            }
            target_map.insert(format!("{s}USD"), s.clone());
            target_map.insert(format!("{s}USDT"), s.clone());
        }
        if target_map.is_empty() {
            return results;
        }

        let url = format!("{}/api/v3/ticker/price", self.base_url);
        let resp = self
            .runner
            .run(|| self.http.get_json(&url, &[], &[]))
            .await;
        let data = match resp {
            Ok(Value::Array(items)) => items,
            Ok(_) => return results,
            Err(err) => {
                warn!(error = %err, "binance ticker fetch failed");
                return results;
            }
        };
        for item in data {
            let Some(pair) = item.get("symbol").and_then(Value::as_str) else {
                continue;
            };
            let Some(requested) = target_map.get(pair) else {
                continue;
            };
            let Some(price) = parse_price(item.get("price")) else {
                continue;
            };
            // first pair wins, USD before USDT only by listing order
            results.entry(requested.clone()).or_insert(price);
        }
        results
    }
}

/// OKX spot tickers.
pub struct OkxTicker {
    http: HttpClient,
    runner: ProviderRunner,
    base_url: String,
}

impl OkxTicker {
    /// Build the tier (2 slots, no spacing, 10 s timeout).
    pub fn new(base_url: impl Into<String>, metrics: Option<Arc<HttpMetrics>>) -> Self {
        Self {
            http: HttpClient::new("okx", Duration::from_secs(10), metrics),
            runner: ProviderRunner::new("okx", 2, Duration::ZERO),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl PriceSource for OkxTicker {
    fn name(&self) -> &'static str {
        "okx"
    }

    async fn fetch_batch(&self, symbols: &[String]) -> HashMap<String, f64> {
        let mut results = HashMap::new();
        let mut targets = HashSet::new();
        for s in symbols {
            targets.insert(format!("{s}-USDT"));
            targets.insert(format!("{s}-USD"));
        }
        if targets.is_empty() {
            return results;
        }

        let url = format!("{}/api/v5/market/tickers", self.base_url);
        let resp = self
            .runner
            .run(|| self.http.get_json(&url, &[], &[("instType", "SPOT")]))
            .await;
        let body = match resp {
            Ok(body) => body,
            Err(err) => {
                warn!(error = %err, "okx ticker fetch failed");
                return results;
            }
        };
        if body.get("code").and_then(Value::as_str) != Some("0") {
            return results;
        }
        let data = body
            .get("data")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        for item in data {
            let Some(inst_id) = item.get("instId").and_then(Value::as_str) else {
                continue;
            };
            if !targets.contains(inst_id) {
                continue;
            }
            let Some(symbol) = inst_id.split('-').next() else {
                continue;
            };
            let Some(price) = parse_price(item.get("last")) else {
                continue;
            };
            results.entry(symbol.to_owned()).or_insert(price);
        }
        results
    }
}

/// CoinGecko simple-price, keyed by the registry coin ids.
pub struct CoinGeckoTicker {
    http: HttpClient,
    runner: ProviderRunner,
    base_url: String,
    registry: Arc<Registry>,
}

impl CoinGeckoTicker {
    /// Build the tier (2 slots, no spacing, 10 s timeout).
    pub fn new(
        base_url: impl Into<String>,
        registry: Arc<Registry>,
        metrics: Option<Arc<HttpMetrics>>,
    ) -> Self {
        Self {
            http: HttpClient::new("coingecko", Duration::from_secs(10), metrics),
            runner: ProviderRunner::new("coingecko", 2, Duration::ZERO),
            base_url: base_url.into(),
            registry,
        }
    }
}

#[async_trait]
impl PriceSource for CoinGeckoTicker {
    fn name(&self) -> &'static str {
        "coingecko"
    }

    async fn fetch_batch(&self, symbols: &[String]) -> HashMap<String, f64> {
        let mut results = HashMap::new();
        // registry symbol -> id; symbols the registry doesn't know cannot
        // be queried by id and stay missing
        let mut ids = Vec::new();
        let mut id_to_symbol = HashMap::new();
        for s in symbols {
            let Some(coin) = self
                .registry
                .coins()
                .iter()
                .find(|c| c.symbol.eq_ignore_ascii_case(s))
            else {
                continue;
            };
            ids.push(coin.id.as_str().to_owned());
            id_to_symbol.insert(coin.id.as_str().to_owned(), s.clone());
        }
        if ids.is_empty() {
            return results;
        }

        let url = format!("{}/api/v3/simple/price", self.base_url);
        let joined = ids.join(",");
        let query = [("ids", joined.as_str()), ("vs_currencies", "usd")];
        let resp = self
            .runner
            .run(|| self.http.get_json(&url, &[], &query))
            .await;
        let data = match resp {
            Ok(Value::Object(map)) => map,
            Ok(_) => return results,
            Err(err) => {
                warn!(error = %err, "coingecko fetch failed");
                return results;
            }
        };
        for (id, price_info) in data {
            let Some(symbol) = id_to_symbol.get(&id) else {
                continue;
            };
            if let Some(price) = parse_price(price_info.get("usd")) {
                results.insert(symbol.clone(), price);
            }
        }
        results
    }
}

fn parse_price(value: Option<&Value>) -> Option<f64> {
    match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn price_values_parse_from_both_shapes() {
        assert_eq!(parse_price(Some(&json!("123.45"))), Some(123.45));
        assert_eq!(parse_price(Some(&json!(67.8))), Some(67.8));
        assert_eq!(parse_price(Some(&json!(null))), None);
        assert_eq!(parse_price(None), None);
    }

    #[test]
    fn binance_blacklist_is_respected() {
        assert!(BINANCE_BLACKLIST.contains(&"TRX"));
        assert!(BINANCE_BLACKLIST.contains(&"XRP"));
        assert!(!BINANCE_BLACKLIST.contains(&"BTC"));
    }
}
