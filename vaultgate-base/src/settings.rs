//! Agent settings: production defaults set in code, every value
//! overridable through the environment (the base-URL overrides exist for
//! tests against local stubs).

use config::{Config, ConfigError, Environment};
use serde::Deserialize;

/// Complete agent configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Port the public API listens on.
    pub listen_port: u16,
    /// Path to the coin registry descriptor file.
    pub registry_path: String,
    /// Directory holding the localized policy documents.
    pub docs_dir: String,
    /// Redis connection string for the inbound rate limit counter.
    pub redis_url: String,
    /// Inbound budget per client IP per minute.
    pub rate_limit_per_minute: u32,
    /// Default tracing level.
    pub log_level: String,

    /// Tatum API key.
    pub tatum_api_key_mainnet: String,
    /// Ankr API key.
    pub ankr_api_key_mainnet: String,
    /// TronGrid API key.
    pub trongrid_api_key_mainnet: String,
    /// TonCenter API key.
    pub ton_api_key_mainnet: String,
    /// Etherscan API key.
    pub etherscan_api_key_mainnet: String,

    /// Tatum REST base URL.
    pub tatum_base_url: String,
    /// Ankr RPC base URL.
    pub ankr_base_url: String,
    /// TronGrid base URL.
    pub trongrid_base_url: String,
    /// TonCenter base URL.
    pub toncenter_base_url: String,
    /// Etherscan v2 endpoint.
    pub etherscan_base_url: String,
    /// Sui fullnode RPC.
    pub sui_rpc_url: String,
    /// Dash Insight API base.
    pub dash_insight_url: String,
    /// Binance ticker base URL.
    pub binance_base_url: String,
    /// OKX ticker base URL.
    pub okx_base_url: String,
    /// CoinGecko base URL.
    pub coingecko_base_url: String,
}

impl Settings {
    /// Load defaults, then apply environment overrides
    /// (`TATUM_API_KEY_MAINNET`, `REDIS_URL`, `LISTEN_PORT`, ...).
    pub fn load() -> Result<Self, ConfigError> {
        Self::builder()?
            .add_source(Environment::default())
            .build()?
            .try_deserialize()
    }

    fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        let builder = Config::builder()
            .set_default("listen_port", 8000)?
            .set_default("registry_path", "config/registry.json")?
            .set_default("docs_dir", "docs")?
            .set_default("redis_url", "redis://localhost:6379/0")?
            .set_default("rate_limit_per_minute", 60)?
            .set_default("log_level", "info")?
            .set_default("tatum_api_key_mainnet", "")?
            .set_default("ankr_api_key_mainnet", "")?
            .set_default("trongrid_api_key_mainnet", "")?
            .set_default("ton_api_key_mainnet", "")?
            .set_default("etherscan_api_key_mainnet", "")?
            .set_default("tatum_base_url", "https://api.tatum.io")?
            .set_default("ankr_base_url", "https://rpc.ankr.com")?
            .set_default("trongrid_base_url", "https://api.trongrid.io")?
            .set_default("toncenter_base_url", "https://toncenter.com/api/v2")?
            .set_default("etherscan_base_url", "https://api.etherscan.io/v2/api")?
            .set_default("sui_rpc_url", "https://fullnode.mainnet.sui.io")?
            .set_default("dash_insight_url", "https://insight.dash.org/insight-api")?
            .set_default("binance_base_url", "https://api.binance.us")?
            .set_default("okx_base_url", "https://www.okx.com")?
            .set_default("coingecko_base_url", "https://api.coingecko.com")?;
        Ok(builder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_deserialize() {
        let settings: Settings = Settings::builder()
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(settings.listen_port, 8000);
        assert_eq!(settings.rate_limit_per_minute, 60);
        assert_eq!(settings.tatum_base_url, "https://api.tatum.io");
        assert!(settings.tatum_api_key_mainnet.is_empty());
    }
}
