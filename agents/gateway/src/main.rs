//! vaultgate gateway — the aggregation backend serving watch-only wallet
//! clients: balances, history, UTXOs, fees, nonces, broadcast, and prices
//! across the supported chains.

mod api;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use eyre::WrapErr;
use tracing::info;

use vaultgate_base::{
    trace::start_tracing, ChainRouter, CoreMetrics, PriceAggregator, RateLimiter, Settings,
};
use vaultgate_core::{AmountCodec, Registry};
use vaultgate_providers::adapters::ankr::AnkrProvider;
use vaultgate_providers::adapters::etherscan::EtherscanProvider;
use vaultgate_providers::adapters::evm_rpc::{EvmChainConfig, EvmRpcProvider};
use vaultgate_providers::adapters::insight::InsightProvider;
use vaultgate_providers::adapters::sui::SuiProvider;
use vaultgate_providers::adapters::tatum::{TatumConfig, TatumProvider};
use vaultgate_providers::adapters::tickers::{
    BinanceTicker, CoinGeckoTicker, OkxTicker, PriceSource,
};
use vaultgate_providers::adapters::toncenter::TonCenterProvider;
use vaultgate_providers::adapters::trongrid::TronGridProvider;
use vaultgate_providers::HttpMetrics;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let settings = Settings::load().wrap_err("loading settings")?;
    start_tracing(&settings.log_level)?;

    let registry = Registry::load(&settings.registry_path).wrap_err("loading coin registry")?;
    let codec = AmountCodec::new(registry.clone());

    let metrics = Arc::new(CoreMetrics::new().wrap_err("building metrics")?);
    let http_metrics = Arc::new(
        HttpMetrics::new(metrics.registry()).wrap_err("registering upstream metrics")?,
    );
    let m = Some(http_metrics);

    // adapters, each with its eagerly-built runner
    let trongrid = Arc::new(TronGridProvider::new(
        settings.trongrid_api_key_mainnet.clone(),
        settings.trongrid_base_url.clone(),
        m.clone(),
    ));
    let tatum = Arc::new(TatumProvider::new(
        TatumConfig::mainnet(
            settings.tatum_api_key_mainnet.clone(),
            settings.tatum_base_url.clone(),
        ),
        registry.clone(),
        codec.clone(),
        trongrid.clone(),
        m.clone(),
    ));
    let ankr = Arc::new(AnkrProvider::new(
        settings.ankr_api_key_mainnet.clone(),
        settings.ankr_base_url.clone(),
        codec.clone(),
        m.clone(),
    ));
    let etherscan = Arc::new(EtherscanProvider::new(
        settings.etherscan_api_key_mainnet.clone(),
        settings.etherscan_base_url.clone(),
        registry.clone(),
        codec.clone(),
        m.clone(),
    ));
    let bsc = Arc::new(EvmRpcProvider::new(
        EvmChainConfig::bsc(),
        codec.clone(),
        m.clone(),
    ));
    let avax = Arc::new(EvmRpcProvider::new(
        EvmChainConfig::avalanche(),
        codec.clone(),
        m.clone(),
    ));
    let etc = Arc::new(EvmRpcProvider::new(
        EvmChainConfig::classic(),
        codec.clone(),
        m.clone(),
    ));
    let sui = Arc::new(SuiProvider::new(
        settings.sui_rpc_url.clone(),
        codec.clone(),
        m.clone(),
    ));
    let insight = Arc::new(InsightProvider::new(
        settings.dash_insight_url.clone(),
        codec.clone(),
        m.clone(),
    ));
    let toncenter = Arc::new(TonCenterProvider::new(
        settings.ton_api_key_mainnet.clone(),
        settings.toncenter_base_url.clone(),
        codec.clone(),
        m.clone(),
    ));

    let chains = Arc::new(ChainRouter::new(vec![
        tatum.capabilities(),
        ankr.capabilities(),
        etherscan.capabilities(),
        bsc.capabilities(),
        avax.capabilities(),
        etc.capabilities(),
        sui.capabilities(),
        insight.capabilities(),
        toncenter.capabilities(),
    ]));

    let tiers: Vec<Arc<dyn PriceSource>> = vec![
        Arc::new(BinanceTicker::new(settings.binance_base_url.clone(), m.clone())),
        Arc::new(OkxTicker::new(settings.okx_base_url.clone(), m.clone())),
        Arc::new(CoinGeckoTicker::new(
            settings.coingecko_base_url.clone(),
            registry.clone(),
            m,
        )),
    ];
    let prices = Arc::new(PriceAggregator::new(tiers));

    let limiter = Arc::new(
        RateLimiter::connect(&settings.redis_url, settings.rate_limit_per_minute).await,
    );

    let state = api::AppState {
        registry,
        chains,
        prices,
        limiter,
        metrics,
        docs_dir: Arc::new(PathBuf::from(&settings.docs_dir)),
    };
    let app = api::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.listen_port));
    info!(%addr, "vaultgate gateway listening");
    axum::Server::bind(&addr)
        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .wrap_err("serving the public api")?;
    Ok(())
}
