//! The public HTTP surface.

mod app;
mod chain;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{ConnectInfo, State};
use axum::http::{Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use vaultgate_base::{ChainRouter, CoreMetrics, GatewayError, PriceAggregator, RateLimiter};
use vaultgate_core::{Registry, UpstreamError};

/// Everything the handlers need, cloned per request.
#[derive(Clone)]
pub struct AppState {
    /// Coin registry and token whitelist.
    pub registry: Arc<Registry>,
    /// Per-operation provider routing.
    pub chains: Arc<ChainRouter>,
    /// Tiered price aggregation.
    pub prices: Arc<PriceAggregator>,
    /// Inbound budget.
    pub limiter: Arc<RateLimiter>,
    /// Prometheus instruments.
    pub metrics: Arc<CoreMetrics>,
    /// Directory of localized policy documents.
    pub docs_dir: Arc<PathBuf>,
}

/// Build the application router with the rate-limit and metrics layer
/// wrapped around every route.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/config/tokens", get(app::get_config))
        .route("/prices", get(app::get_prices))
        .route("/version", get(app::get_version))
        .route("/docs/:doc_type", get(app::get_doc))
        .route("/balance/:chain/:address", get(chain::get_balance))
        .route(
            "/accountResource/:chain/:address",
            get(chain::get_account_resource),
        )
        .route("/transaction/:chain/:address", get(chain::get_transactions))
        .route("/utxo/:chain/:address", get(chain::get_utxos))
        .route("/block/:chain/:address", get(chain::get_block))
        .route("/fee/:chain", get(chain::get_fee))
        .route("/nonce/:chain/:address", get(chain::get_nonce))
        .route("/estimateGas/:chain/:address", get(chain::estimate_gas))
        .route("/seqno/:chain/:address", get(chain::get_seqno))
        .route("/tx/:chain/:tx_id", get(chain::get_transaction))
        .route("/broadcast/:chain", post(chain::broadcast))
        .route("/metrics", get(app::get_metrics))
        .route_layer(middleware::from_fn_with_state(state.clone(), guard))
        .with_state(state)
}

/// Rate-limit check plus the inbound counter, applied to every route except
/// the metrics scrape.
async fn guard<B>(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    req: Request<B>,
    next: Next<B>,
) -> Response {
    let path = req.uri().path().to_owned();
    if path == "/metrics" {
        return next.run(req).await;
    }

    let ip = client_ip(req.headers(), peer);
    if !state.limiter.allow(&ip).await {
        state.metrics.observe_inbound(&path, 429);
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "detail": "Too many requests" })),
        )
            .into_response();
    }

    let response = next.run(req).await;
    state
        .metrics
        .observe_inbound(&path, response.status().as_u16());
    response
}

/// Real client IP: `X-Forwarded-For` first hop, then `X-Real-IP`, then the
/// socket peer.
fn client_ip(headers: &axum::http::HeaderMap, peer: SocketAddr) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_owned();
            }
        }
    }
    if let Some(real) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        let real = real.trim();
        if !real.is_empty() {
            return real.to_owned();
        }
    }
    peer.ip().to_string()
}

/// Map a routing failure onto the public status codes. Handlers special-case
/// `Logical` where the contract asks for a canonical empty shape instead.
fn error_response(err: GatewayError) -> Response {
    let (status, detail) = match &err {
        GatewayError::Unsupported => (StatusCode::BAD_REQUEST, "Unsupported chain or operation"),
        GatewayError::Upstream(UpstreamError::NotFound) => (StatusCode::NOT_FOUND, "Not found"),
        GatewayError::Upstream(UpstreamError::Cancelled) => {
            (StatusCode::GATEWAY_TIMEOUT, "Upstream deadline exceeded")
        }
        GatewayError::Upstream(_) => (StatusCode::BAD_GATEWAY, "Upstream error"),
    };
    (status, Json(json!({ "detail": detail }))).into_response()
}

/// Copy of a request body with `password`/`passphrase` values masked, safe
/// to log.
fn redact_sensitive(body: &Value) -> Value {
    let mut copy = body.clone();
    if let Some(obj) = copy.as_object_mut() {
        for key in ["password", "passphrase"] {
            if obj.contains_key(key) {
                obj.insert(key.to_owned(), json!("******"));
            }
        }
    }
    copy
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;

    fn peer() -> SocketAddr {
        "10.0.0.9:4242".parse().unwrap()
    }

    #[test]
    fn forwarded_header_wins_over_the_peer() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        assert_eq!(client_ip(&headers, peer()), "203.0.113.7");

        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", "198.51.100.2".parse().unwrap());
        assert_eq!(client_ip(&headers, peer()), "198.51.100.2");

        assert_eq!(client_ip(&HeaderMap::new(), peer()), "10.0.0.9");
    }

    #[test]
    fn sensitive_fields_are_masked_in_logs() {
        let body = json!({ "tx_hex": "f86c", "password": "hunter2", "passphrase": "x" });
        let clean = redact_sensitive(&body);
        assert_eq!(clean["password"], "******");
        assert_eq!(clean["passphrase"], "******");
        assert_eq!(clean["tx_hex"], "f86c");
    }
}

#[cfg(test)]
mod server_tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Arc;
    use vaultgate_core::chain::{ChainKey, CoinMeta, Curve, TokenMeta};
    use vaultgate_core::provider::{BalanceApi, BroadcastApi, ProviderCapabilities};
    use vaultgate_core::{BalanceResult, UpstreamError};
    use vaultgate_providers::adapters::tickers::PriceSource;

    struct StubEtherscan;

    #[async_trait]
    impl BalanceApi for StubEtherscan {
        async fn balance(
            &self,
            _chain: &str,
            _address: &str,
            contract: Option<&str>,
        ) -> Result<BalanceResult, UpstreamError> {
            // wei / token units the way the explorer would answer them
            Ok(BalanceResult::Amount(match contract {
                Some(_) => "5.500000".to_owned(),
                None => "1.00000000".to_owned(),
            }))
        }
    }

    #[async_trait]
    impl BroadcastApi for StubEtherscan {
        async fn broadcast(
            &self,
            _chain: &str,
            payload: &serde_json::Value,
        ) -> Result<String, UpstreamError> {
            assert_eq!(payload.as_str(), Some("f86c00"));
            Ok("0xabc123".to_owned())
        }
    }

    struct StubTier {
        serves: Vec<(&'static str, f64)>,
    }

    #[async_trait]
    impl PriceSource for StubTier {
        fn name(&self) -> &'static str {
            "stub"
        }

        async fn fetch_batch(&self, symbols: &[String]) -> HashMap<String, f64> {
            self.serves
                .iter()
                .filter(|(s, _)| symbols.iter().any(|q| q == s))
                .map(|(s, p)| ((*s).to_owned(), *p))
                .collect()
        }
    }

    fn test_state() -> AppState {
        let registry = Arc::new(Registry::from_parts(
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
        ));
        let stub = Arc::new(StubEtherscan);
        let chains = Arc::new(ChainRouter::new(vec![ProviderCapabilities {
            name: "etherscan",
            balance: Some(stub.clone()),
            broadcast: Some(stub),
            ..Default::default()
        }]));
        let tiers: Vec<Arc<dyn PriceSource>> = vec![
            Arc::new(StubTier {
                serves: vec![("BTC", 60000.0), ("ETH", 3000.0)],
            }),
            Arc::new(StubTier {
                serves: vec![("TRX", 0.12)],
            }),
        ];
        AppState {
            registry,
            chains,
            prices: Arc::new(PriceAggregator::new(tiers)),
            limiter: Arc::new(RateLimiter::disabled()),
            metrics: Arc::new(CoreMetrics::new().unwrap()),
            docs_dir: Arc::new(PathBuf::from("docs")),
        }
    }

    fn serve(state: AppState) -> SocketAddr {
        let server = axum::Server::bind(&"127.0.0.1:0".parse().unwrap())
            .serve(router(state).into_make_service_with_connect_info::<SocketAddr>());
        let addr = server.local_addr();
        tokio::spawn(server);
        addr
    }

    #[tokio::test]
    async fn native_balance_round_trip() {
        let addr = serve(test_state());
        let resp = reqwest::get(format!(
            "http://{addr}/balance/ethereum/0x742d35Cc6634C0532925a3b844Bc454e4438f44e"
        ))
        .await
        .unwrap();
        assert_eq!(resp.status().as_u16(), 200);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["chain"], "ethereum");
        assert_eq!(
            body["address"],
            "0x742d35Cc6634C0532925a3b844Bc454e4438f44e"
        );
        assert_eq!(body["contract"], serde_json::Value::Null);
        assert_eq!(body["balance"], "1.00000000");
    }

    #[tokio::test]
    async fn token_balance_uses_the_contract() {
        let addr = serve(test_state());
        let resp = reqwest::get(format!(
            "http://{addr}/balance/ethereum/0xA?contract=0xdAC17F958D2ee523a2206206994597C13D831ec7"
        ))
        .await
        .unwrap();
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["balance"], "5.500000");
    }

    #[tokio::test]
    async fn unknown_chain_is_a_bad_request() {
        let addr = serve(test_state());
        let resp = reqwest::get(format!("http://{addr}/balance/nosuchchain/0xA"))
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 400);
    }

    #[tokio::test]
    async fn broadcast_round_trip() {
        let addr = serve(test_state());
        let client = reqwest::Client::new();
        let resp = client
            .post(format!("http://{addr}/broadcast/ethereum"))
            .json(&json!({ "tx_hex": "f86c00" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["txid"], "0xabc123");
    }

    #[tokio::test]
    async fn price_fanout_reports_misses() {
        let addr = serve(test_state());
        let resp = reqwest::get(format!(
            "http://{addr}/prices?coins=BTC,ETH,TRX,UNKNOWNZZZ"
        ))
        .await
        .unwrap();
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["code"], 200);
        assert_eq!(body["data"]["BTC"], 60000.0);
        assert_eq!(body["data"]["TRX"], 0.12);
        assert_eq!(body["failed"], json!(["UNKNOWNZZZ"]));
    }

    #[tokio::test]
    async fn config_lists_coins_and_tokens() {
        let addr = serve(test_state());
        let resp = reqwest::get(format!("http://{addr}/config/tokens"))
            .await
            .unwrap();
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["coins"], json!(["ethereum"]));
        assert_eq!(body["tokens"][0]["symbol"], "USDT");
    }
}
