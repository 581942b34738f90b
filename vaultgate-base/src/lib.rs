//! Shared runtime for the vaultgate agent: settings, tracing, metrics, the
//! chain router, the price aggregator, and the inbound rate limiter.

#![forbid(unsafe_code)]

pub mod metrics;
pub mod prices;
pub mod ratelimit;
pub mod router;
pub mod settings;
pub mod trace;

pub use metrics::CoreMetrics;
pub use prices::{PriceAggregator, PriceReport};
pub use ratelimit::RateLimiter;
pub use router::{ChainRouter, GatewayError};
pub use settings::Settings;
