//! Tiered price aggregation with a short-TTL cache.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::debug;

use vaultgate_providers::adapters::tickers::PriceSource;

/// How long a quote stays servable from memory.
pub const PRICE_CACHE_TTL: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy)]
struct PriceEntry {
    price: f64,
    fetched: Instant,
}

/// Aggregation result: found quotes plus the symbols no tier could serve.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceReport {
    /// Uppercase symbol to USD price.
    pub data: BTreeMap<String, f64>,
    /// Symbols that stayed unresolved after the last tier.
    pub failed: Vec<String>,
}

/// Fan-out over the ordered ticker tiers, cache-first.
pub struct PriceAggregator {
    sources: Vec<Arc<dyn PriceSource>>,
    cache: RwLock<HashMap<String, PriceEntry>>,
    ttl: Duration,
}

impl PriceAggregator {
    /// Build over the ordered tiers with the standard TTL.
    pub fn new(sources: Vec<Arc<dyn PriceSource>>) -> Self {
        Self::with_ttl(sources, PRICE_CACHE_TTL)
    }

    /// Build with a custom TTL (tests).
    pub fn with_ttl(sources: Vec<Arc<dyn PriceSource>>, ttl: Duration) -> Self {
        Self {
            sources,
            cache: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Resolve `symbols` (already uppercase): cache hits first, then each
    /// tier in order for whatever is still missing, cache updated with
    /// every new quote.
    pub async fn fetch(&self, symbols: &[String]) -> PriceReport {
        let mut data = BTreeMap::new();
        let mut missing = Vec::new();
        {
            let cache = self.cache.read();
            for symbol in symbols {
                match cache.get(symbol) {
                    Some(entry) if entry.fetched.elapsed() < self.ttl => {
                        data.insert(symbol.clone(), entry.price);
                    }
                    _ => missing.push(symbol.clone()),
                }
            }
        }

        if !missing.is_empty() {
            let mut fetched: HashMap<String, f64> = HashMap::new();
            for source in &self.sources {
                if missing.is_empty() {
                    break;
                }
                let batch = source.fetch_batch(&missing).await;
                debug!(tier = source.name(), found = batch.len(), "price tier answered");
                fetched.extend(batch);
                missing.retain(|s| !fetched.contains_key(s));
            }

            let now = Instant::now();
            let mut cache = self.cache.write();
            for (symbol, price) in fetched {
                cache.insert(
                    symbol.clone(),
                    PriceEntry {
                        price,
                        fetched: now,
                    },
                );
                data.insert(symbol, price);
            }
        }

        PriceReport {
            data,
            failed: missing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct StubTier {
        name: &'static str,
        serves: Vec<(&'static str, f64)>,
        calls: AtomicU32,
    }

    impl StubTier {
        fn new(name: &'static str, serves: &[(&'static str, f64)]) -> Arc<Self> {
            Arc::new(Self {
                name,
                serves: serves.to_vec(),
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl PriceSource for StubTier {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn fetch_batch(&self, symbols: &[String]) -> HashMap<String, f64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.serves
                .iter()
                .filter(|(s, _)| symbols.iter().any(|q| q == s))
                .map(|(s, p)| ((*s).to_owned(), *p))
                .collect()
        }
    }

    fn symbols(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_owned()).collect()
    }

    #[tokio::test]
    async fn tiers_fall_through_and_unknowns_fail() {
        // Binance knows BTC and ETH but skips TRX; OKX picks TRX up;
        // nobody knows the garbage symbol.
        let binance = StubTier::new("binance", &[("BTC", 60000.0), ("ETH", 3000.0)]);
        let okx = StubTier::new("okx", &[("TRX", 0.12)]);
        let coingecko = StubTier::new("coingecko", &[]);
        let agg = PriceAggregator::new(vec![binance.clone(), okx.clone(), coingecko.clone()]);

        let report = agg
            .fetch(&symbols(&["BTC", "ETH", "TRX", "UNKNOWNZZZ"]))
            .await;
        assert_eq!(report.data.get("BTC"), Some(&60000.0));
        assert_eq!(report.data.get("TRX"), Some(&0.12));
        assert_eq!(report.failed, vec!["UNKNOWNZZZ".to_owned()]);
        assert_eq!(binance.calls.load(Ordering::SeqCst), 1);
        assert_eq!(okx.calls.load(Ordering::SeqCst), 1);
        assert_eq!(coingecko.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn satisfied_queries_skip_later_tiers() {
        let binance = StubTier::new("binance", &[("BTC", 60000.0)]);
        let okx = StubTier::new("okx", &[("BTC", 59999.0)]);
        let agg = PriceAggregator::new(vec![binance.clone(), okx.clone()]);

        let report = agg.fetch(&symbols(&["BTC"])).await;
        assert_eq!(report.data.get("BTC"), Some(&60000.0));
        assert_eq!(okx.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cache_serves_within_ttl_and_expires_after() {
        let binance = StubTier::new("binance", &[("BTC", 60000.0)]);
        let agg =
            PriceAggregator::with_ttl(vec![binance.clone()], Duration::from_millis(50));

        let first = agg.fetch(&symbols(&["BTC"])).await;
        assert_eq!(first.failed.len(), 0);
        assert_eq!(binance.calls.load(Ordering::SeqCst), 1);

        // hit: no upstream contact
        let _second = agg.fetch(&symbols(&["BTC"])).await;
        assert_eq!(binance.calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(60)).await;
        let _third = agg.fetch(&symbols(&["BTC"])).await;
        assert_eq!(binance.calls.load(Ordering::SeqCst), 2);
    }
}
