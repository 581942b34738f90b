//! The single HTTP transport wrapper every adapter goes through.
//!
//! Issues the request, decodes JSON, and classifies the outcome into the
//! `UpstreamError` taxonomy so the runner can decide whether to retry.
//! Gzip-encoded upstream responses are decompressed transparently by the
//! client.

use std::sync::Arc;
use std::time::{Duration, Instant};

use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};
use reqwest::{header::RETRY_AFTER, Method, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use vaultgate_core::UpstreamError;

/// Default per-request timeout. Broadcast-style calls override upward.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Prometheus instruments shared by all transports.
#[derive(Clone)]
pub struct HttpMetrics {
    requests: IntCounterVec,
    latency: HistogramVec,
}

impl HttpMetrics {
    /// Create and register the upstream request instruments.
    pub fn new(registry: &Registry) -> prometheus::Result<Self> {
        let requests = IntCounterVec::new(
            Opts::new(
                "upstream_requests_total",
                "Upstream HTTP requests by provider, method and outcome",
            ),
            &["provider", "method", "outcome"],
        )?;
        let latency = HistogramVec::new(
            HistogramOpts::new(
                "upstream_request_seconds",
                "Upstream HTTP request latency by provider",
            ),
            &["provider", "method"],
        )?;
        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(latency.clone()))?;
        Ok(Self { requests, latency })
    }

    fn observe(&self, provider: &str, method: &Method, outcome: &str, elapsed: Duration) {
        self.requests
            .with_label_values(&[provider, method.as_str(), outcome])
            .inc();
        self.latency
            .with_label_values(&[provider, method.as_str()])
            .observe(elapsed.as_secs_f64());
    }
}

/// JSON transport bound to one provider name (for logs and metrics).
#[derive(Clone)]
pub struct HttpClient {
    provider: &'static str,
    client: reqwest::Client,
    default_timeout: Duration,
    metrics: Option<Arc<HttpMetrics>>,
}

impl HttpClient {
    /// Build a transport for `provider` with the given default timeout.
    pub fn new(
        provider: &'static str,
        default_timeout: Duration,
        metrics: Option<Arc<HttpMetrics>>,
    ) -> Self {
        Self {
            provider,
            client: reqwest::Client::new(),
            default_timeout,
            metrics,
        }
    }

    /// GET a JSON document.
    pub async fn get_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        query: &[(&str, &str)],
    ) -> Result<Value, UpstreamError> {
        self.request_json(Method::GET, url, headers, query, None, None)
            .await
    }

    /// POST a JSON body, expect a JSON document back.
    pub async fn post_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &Value,
    ) -> Result<Value, UpstreamError> {
        self.request_json(Method::POST, url, headers, &[], Some(body), None)
            .await
    }

    /// Issue one request and classify the outcome.
    pub async fn request_json(
        &self,
        method: Method,
        url: &str,
        headers: &[(&str, &str)],
        query: &[(&str, &str)],
        body: Option<&Value>,
        timeout: Option<Duration>,
    ) -> Result<Value, UpstreamError> {
        let mut req = self
            .client
            .request(method.clone(), url)
            .timeout(timeout.unwrap_or(self.default_timeout));
        for (name, value) in headers {
            req = req.header(*name, *value);
        }
        if !query.is_empty() {
            req = req.query(query);
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        // Keys ride in paths and headers for several providers; only the
        // host is safe to log.
        let host = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_owned))
            .unwrap_or_else(|| "<invalid-url>".to_owned());
        let started = Instant::now();
        let result = self.dispatch(req).await;
        let elapsed = started.elapsed();

        match &result {
            Ok(_) => {
                self.observe(&method, "ok", elapsed);
                debug!(provider = self.provider, %host, %method, latency_ms = elapsed.as_millis() as u64, "upstream ok");
            }
            Err(err) => {
                let outcome = match err {
                    UpstreamError::RateLimited { .. } => "rate_limited",
                    UpstreamError::Transient(_) => "transient",
                    _ => "fatal",
                };
                self.observe(&method, outcome, elapsed);
                warn!(
                    provider = self.provider,
                    %host,
                    %method,
                    latency_ms = elapsed.as_millis() as u64,
                    error = %err,
                    "upstream request failed"
                );
            }
        }
        result
    }

    async fn dispatch(&self, req: reqwest::RequestBuilder) -> Result<Value, UpstreamError> {
        let resp = match req.send().await {
            Ok(resp) => resp,
            Err(err) if err.is_timeout() || err.is_connect() => {
                return Err(UpstreamError::Transient(format!("network: {err}")));
            }
            Err(err) if err.is_builder() => {
                return Err(UpstreamError::Fatal(format!("request build: {err}")));
            }
            // Resets and mid-body failures are self-healing too.
            Err(err) => return Err(UpstreamError::Transient(format!("network: {err}"))),
        };

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            return Err(UpstreamError::RateLimited { retry_after });
        }
        if status.is_server_error() {
            return Err(UpstreamError::Transient(format!("http {status}")));
        }
        if !status.is_success() {
            return Err(UpstreamError::Fatal(format!("http {status}")));
        }
        resp.json::<Value>()
            .await
            .map_err(|err| UpstreamError::Fatal(format!("malformed json: {err}")))
    }

    fn observe(&self, method: &Method, outcome: &str, elapsed: Duration) {
        if let Some(metrics) = &self.metrics {
            metrics.observe(self.provider, method, outcome, elapsed);
        }
    }
}
