//! TronGrid — account resource supplement (available energy).

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::warn;

use crate::http::{HttpClient, HttpMetrics};
use crate::runner::ProviderRunner;

/// The TronGrid adapter. Only feeds the Tron account-resource record; it has
/// no capability entry of its own.
pub struct TronGridProvider {
    http: HttpClient,
    runner: ProviderRunner,
    api_key: String,
    base_url: String,
}

impl TronGridProvider {
    /// Build the adapter (5 slots, no spacing).
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        metrics: Option<Arc<HttpMetrics>>,
    ) -> Self {
        Self {
            http: HttpClient::new("trongrid", Duration::from_secs(30), metrics),
            runner: ProviderRunner::new("trongrid", 5, Duration::ZERO),
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }

    /// Available energy for `address`: `EnergyLimit - EnergyUsed`, floored
    /// at zero. Failures degrade to 0 rather than poisoning the resource
    /// record.
    pub async fn available_energy(&self, address: &str) -> i64 {
        let url = format!("{}/wallet/getaccountresource", self.base_url);
        // visible=true lets the endpoint accept Base58 addresses directly
        let body = json!({ "address": address, "visible": true });
        let headers = [
            ("TRON-PRO-API-KEY", self.api_key.as_str()),
            ("Content-Type", "application/json"),
        ];
        let res = self
            .runner
            .run(|| self.http.post_json(&url, &headers, &body))
            .await;
        match res {
            Ok(data) => {
                let limit = data.get("EnergyLimit").and_then(Value::as_i64).unwrap_or(0);
                let used = data.get("EnergyUsed").and_then(Value::as_i64).unwrap_or(0);
                (limit - used).max(0)
            }
            Err(err) => {
                warn!(address, error = %err, "tron energy lookup failed");
                0
            }
        }
    }
}
