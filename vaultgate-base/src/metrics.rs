//! Prometheus instruments for the agent.

use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

/// The agent-wide metrics registry plus the inbound request counter. The
/// upstream instruments hang off the same registry via
/// `vaultgate_providers::HttpMetrics`.
#[derive(Clone)]
pub struct CoreMetrics {
    registry: Registry,
    inbound: IntCounterVec,
}

impl CoreMetrics {
    /// Create the registry and register the inbound counter.
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();
        let inbound = IntCounterVec::new(
            Opts::new(
                "inbound_requests_total",
                "Inbound API requests by route and status",
            ),
            &["route", "status"],
        )?;
        registry.register(Box::new(inbound.clone()))?;
        Ok(Self { registry, inbound })
    }

    /// The shared registry, for registering further instruments.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Count one served request.
    pub fn observe_inbound(&self, route: &str, status: u16) {
        self.inbound
            .with_label_values(&[route, &status.to_string()])
            .inc();
    }

    /// Encode the registry in text exposition format.
    pub fn gather(&self) -> prometheus::Result<Vec<u8>> {
        let families = self.registry.gather();
        let mut out = Vec::with_capacity(16 * 1024);
        TextEncoder::new().encode(&families, &mut out)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_counts_appear_in_the_exposition() {
        let metrics = CoreMetrics::new().unwrap();
        metrics.observe_inbound("/balance", 200);
        metrics.observe_inbound("/balance", 200);
        let text = String::from_utf8(metrics.gather().unwrap()).unwrap();
        assert!(text.contains("inbound_requests_total"));
        assert!(text.contains("route=\"/balance\""));
    }
}
