//! Boot-time coin registry and token whitelist.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use eyre::{Context, Result};
use serde::Deserialize;

use crate::chain::{ChainKey, CoinMeta, TokenMeta};

/// On-disk shape of the registry descriptor file.
#[derive(Debug, Deserialize)]
struct RegistryFile {
    coins: Vec<CoinMeta>,
    #[serde(default)]
    tokens: Vec<TokenMeta>,
}

/// Read-only lookup over the coin descriptors and the token whitelist.
///
/// Loaded exactly once at startup; a load failure is fatal. Runtime misses
/// return `None`, never an error.
#[derive(Debug)]
pub struct Registry {
    coins: Vec<CoinMeta>,
    tokens: Vec<TokenMeta>,
    by_id: HashMap<ChainKey, usize>,
}

impl Registry {
    /// Load the registry from a JSON descriptor file.
    pub fn load(path: impl AsRef<Path>) -> Result<Arc<Self>> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("reading registry file {}", path.display()))?;
        let file: RegistryFile = serde_json::from_str(&raw)
            .wrap_err_with(|| format!("parsing registry file {}", path.display()))?;
        Ok(Arc::new(Self::from_parts(file.coins, file.tokens)))
    }

    /// Build a registry from already-parsed descriptors.
    pub fn from_parts(coins: Vec<CoinMeta>, tokens: Vec<TokenMeta>) -> Self {
        let by_id = coins
            .iter()
            .enumerate()
            .map(|(i, c)| (c.id.clone(), i))
            .collect();
        Self {
            coins,
            tokens,
            by_id,
        }
    }

    /// Look up a coin by its chain key.
    pub fn coin_by_id(&self, id: &str) -> Option<&CoinMeta> {
        self.by_id.get(id).map(|&i| &self.coins[i])
    }

    /// Whether the gateway serves this chain at all.
    pub fn is_served(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    /// Look up a whitelisted token by contract address, case-insensitively.
    pub fn token_by_contract(&self, contract: &str) -> Option<&TokenMeta> {
        self.tokens
            .iter()
            .find(|t| t.contract.eq_ignore_ascii_case(contract))
    }

    /// All coin descriptors, in registry order.
    pub fn coins(&self) -> &[CoinMeta] {
        &self.coins
    }

    /// The token whitelist.
    pub fn tokens(&self) -> &[TokenMeta] {
        &self.tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Curve;

    fn coin(id: &str, symbol: &str, decimals: u32) -> CoinMeta {
        CoinMeta {
            id: ChainKey::new(id),
            symbol: symbol.into(),
            name: symbol.into(),
            decimals,
            curve: Curve::Secp256k1,
            blockchain: "ethereum".into(),
            chain_id: None,
        }
    }

    #[test]
    fn lookups_miss_without_error() {
        let reg = Registry::from_parts(vec![coin("ethereum", "ETH", 18)], vec![]);
        assert!(reg.coin_by_id("ethereum").is_some());
        assert!(reg.coin_by_id("nosuchchain").is_none());
        assert!(!reg.is_served("nosuchchain"));
    }

    #[test]
    fn token_contract_lookup_is_case_insensitive() {
        let reg = Registry::from_parts(
            vec![],
            vec![TokenMeta {
                coin: ChainKey::new("ethereum"),
                symbol: "USDT".into(),
                name: "USDT-ERC20".into(),
                contract: "0xdAC17F958D2ee523a2206206994597C13D831ec7".into(),
                decimals: 6,
            }],
        );
        let hit = reg.token_by_contract("0xdac17f958d2ee523a2206206994597c13d831ec7");
        assert_eq!(hit.map(|t| t.decimals), Some(6));
    }
}
