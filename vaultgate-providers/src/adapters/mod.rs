//! One adapter per upstream provider.

pub mod ankr;
pub mod etherscan;
pub mod evm_rpc;
pub mod insight;
pub mod sui;
pub mod tatum;
pub mod tickers;
pub mod toncenter;
pub mod trongrid;

use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use serde_json::Value;

/// Parse an EVM `0x`-prefixed hex quantity into a decimal, arbitrary width.
pub(crate) fn hex_quantity_to_decimal(raw: &str) -> Option<BigDecimal> {
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    if digits.is_empty() {
        return None;
    }
    let int = BigInt::parse_bytes(digits.as_bytes(), 16)?;
    Some(BigDecimal::new(int, 0))
}

/// Parse an EVM hex quantity into a `u64` (nonces, small counters).
pub(crate) fn hex_quantity_to_u64(raw: &str) -> Option<u64> {
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    u64::from_str_radix(digits, 16).ok()
}

/// Milliseconds since the Unix epoch, for upstreams that omit timestamps.
pub(crate) fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Seconds since the Unix epoch.
pub(crate) fn now_secs() -> i64 {
    now_millis() / 1000
}

/// Read a string field, tolerating numeric JSON.
pub(crate) fn str_or_number(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}
