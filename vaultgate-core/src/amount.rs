//! Canonical amount rendering.
//!
//! Every adapter funnels raw chain values through [`AmountCodec`] so that the
//! rest of the system only ever sees one decimal-string representation.

use std::str::FromStr;
use std::sync::Arc;

use bigdecimal::{rounding::RoundingMode, BigDecimal};
use serde_json::Value;

use crate::registry::Registry;

/// Sentinel returned when the registry has no decimals for the requested
/// chain/contract. Out-of-band by construction: no real rendering is
/// negative zero.
pub const CONFIG_MISSING: &str = "-0.000000";

/// Rendering of an absent/empty raw value.
pub const ZERO: &str = "0.000000";

/// Registry-backed converter between raw chain-native values and the
/// canonical decimal string.
#[derive(Debug, Clone)]
pub struct AmountCodec {
    registry: Arc<Registry>,
}

impl AmountCodec {
    /// Build a codec over the boot-time registry.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Decimal places for a chain, or the whitelisted token when `contract`
    /// is present.
    pub fn decimals_for(&self, chain: &str, contract: Option<&str>) -> Option<u32> {
        match contract {
            Some(c) => self.registry.token_by_contract(c).map(|t| t.decimals),
            None => self.registry.coin_by_id(chain).map(|c| c.decimals),
        }
    }

    /// Convert a raw JSON value (string, number, or null) into the canonical
    /// decimal string.
    ///
    /// * missing decimals configuration renders [`CONFIG_MISSING`];
    /// * null/empty input renders [`ZERO`];
    /// * `from_smallest_unit` divides by `10^decimals`, otherwise the value
    ///   passes through;
    /// * output carries exactly `min(decimals, 8)` fractional digits, plain
    ///   notation.
    pub fn to_canonical(
        &self,
        raw: Option<&Value>,
        chain: &str,
        contract: Option<&str>,
        from_smallest_unit: bool,
    ) -> String {
        let Some(decimals) = self.decimals_for(chain, contract) else {
            return CONFIG_MISSING.to_owned();
        };
        let text = match raw {
            None | Some(Value::Null) => return ZERO.to_owned(),
            Some(Value::String(s)) if s.trim().is_empty() => return ZERO.to_owned(),
            Some(Value::String(s)) => s.trim().to_owned(),
            Some(Value::Number(n)) => n.to_string(),
            Some(other) => {
                tracing::warn!(?other, chain, "non-scalar raw amount");
                return CONFIG_MISSING.to_owned();
            }
        };
        let Ok(parsed) = BigDecimal::from_str(&text) else {
            tracing::warn!(raw = %text, chain, "unparsable raw amount");
            return CONFIG_MISSING.to_owned();
        };
        self.render(parsed, decimals, from_smallest_unit)
    }

    /// Same contract as [`Self::to_canonical`] for a value the caller has
    /// already computed as a decimal (net flows, reconciled balances).
    pub fn decimal_to_canonical(
        &self,
        value: &BigDecimal,
        chain: &str,
        contract: Option<&str>,
        from_smallest_unit: bool,
    ) -> String {
        let Some(decimals) = self.decimals_for(chain, contract) else {
            return CONFIG_MISSING.to_owned();
        };
        self.render(value.clone(), decimals, from_smallest_unit)
    }

    fn render(&self, value: BigDecimal, decimals: u32, from_smallest_unit: bool) -> String {
        let value = if from_smallest_unit {
            // Exact shift by 10^decimals; no precision is lost even for
            // 256-bit integers.
            let (digits, exponent) = value.into_bigint_and_exponent();
            BigDecimal::new(digits, exponent + i64::from(decimals))
        } else {
            value
        };
        let shown = i64::from(decimals.min(8));
        value
            .with_scale_round(shown, RoundingMode::HalfEven)
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{ChainKey, CoinMeta, Curve, TokenMeta};
    use serde_json::json;

    fn codec() -> AmountCodec {
        let coins = vec![
            CoinMeta {
                id: ChainKey::new("ethereum"),
                symbol: "ETH".into(),
                name: "Ethereum".into(),
                decimals: 18,
                curve: Curve::Secp256k1,
                blockchain: "ethereum".into(),
                chain_id: Some(1),
            },
            CoinMeta {
                id: ChainKey::new("ripple"),
                symbol: "XRP".into(),
                name: "Ripple".into(),
                decimals: 6,
                curve: Curve::Secp256k1,
                blockchain: "ripple".into(),
                chain_id: None,
            },
        ];
        let tokens = vec![TokenMeta {
            coin: ChainKey::new("ethereum"),
            symbol: "USDT".into(),
            name: "USDT-ERC20".into(),
            contract: "0xdAC17F958D2ee523a2206206994597C13D831ec7".into(),
            decimals: 6,
        }];
        AmountCodec::new(Arc::new(Registry::from_parts(coins, tokens)))
    }

    #[test]
    fn one_ether_renders_with_eight_digits() {
        let c = codec();
        let out = c.to_canonical(Some(&json!("1000000000000000000")), "ethereum", None, true);
        assert_eq!(out, "1.00000000");
    }

    #[test]
    fn token_decimals_win_over_chain_decimals() {
        let c = codec();
        let out = c.to_canonical(
            Some(&json!("5500000")),
            "ethereum",
            Some("0xdac17f958d2ee523a2206206994597c13d831ec7"),
            true,
        );
        assert_eq!(out, "5.500000");
    }

    #[test]
    fn null_and_empty_render_zero() {
        let c = codec();
        assert_eq!(c.to_canonical(None, "ripple", None, true), ZERO);
        assert_eq!(c.to_canonical(Some(&Value::Null), "ripple", None, true), ZERO);
        assert_eq!(c.to_canonical(Some(&json!("  ")), "ripple", None, true), ZERO);
    }

    #[test]
    fn missing_configuration_is_signalled() {
        let c = codec();
        assert_eq!(
            c.to_canonical(Some(&json!("1")), "nosuchchain", None, true),
            CONFIG_MISSING
        );
        assert_eq!(
            c.to_canonical(Some(&json!("1")), "ethereum", Some("0xbeef"), true),
            CONFIG_MISSING
        );
    }

    #[test]
    fn zero_renders_canonically() {
        let c = codec();
        assert_eq!(c.to_canonical(Some(&json!(0)), "ripple", None, true), "0.000000");
    }

    #[test]
    fn passthrough_skips_the_shift() {
        let c = codec();
        let out = c.to_canonical(Some(&json!("2.5")), "ethereum", None, false);
        assert_eq!(out, "2.50000000");
    }

    #[test]
    fn rendering_round_trips_to_smallest_units() {
        // drops -> canonical -> drops must be the identity
        let c = codec();
        let rendered = c.to_canonical(Some(&json!("123456789")), "ripple", None, true);
        assert_eq!(rendered, "123.456789");
        let back = BigDecimal::from_str(&rendered).unwrap() * BigDecimal::from(1_000_000u64);
        assert_eq!(back, BigDecimal::from(123_456_789u64));
        let again = c.decimal_to_canonical(&back, "ripple", None, true);
        assert_eq!(again, rendered);
    }

    #[test]
    fn large_values_keep_precision() {
        let c = codec();
        // close to 2^256, must not lose digits in the integer part
        let raw = "115792089237316195423570985008687907853269984665640564039457000000000000000000";
        let out = c.to_canonical(Some(&json!(raw)), "ethereum", None, true);
        assert_eq!(
            out,
            "115792089237316195423570985008687907853269984665640564039457.00000000"
        );
    }
}
