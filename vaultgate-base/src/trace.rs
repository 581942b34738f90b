//! Tracing subscriber setup.

use eyre::Result;
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::prelude::*;

/// Install the global subscriber: the configured default level with noise
/// from trusted HTTP plumbing capped at info.
pub fn start_tracing(level: &str) -> Result<()> {
    let level: LevelFilter = level.parse().unwrap_or(LevelFilter::INFO);
    let targets = Targets::new()
        .with_default(level)
        .with_target("hyper", LevelFilter::INFO)
        .with_target("reqwest", LevelFilter::INFO)
        .with_target("tokio", LevelFilter::INFO);

    tracing_subscriber::registry()
        .with(targets)
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;
    Ok(())
}
