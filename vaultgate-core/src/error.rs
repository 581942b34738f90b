//! Upstream error taxonomy.
//!
//! Every provider call resolves into one of these categories; the runner
//! retries the retryable ones and everything above it maps them onto the
//! public status codes.

use thiserror::Error;

/// Outcome classification for a single upstream interaction.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// HTTP 429. Carries the `Retry-After` hint in seconds when the provider
    /// sent one.
    #[error("rate limited by upstream (retry after {retry_after:?}s)")]
    RateLimited {
        /// Seconds suggested by the provider, if any.
        retry_after: Option<u64>,
    },

    /// A fault believed to be self-healing: 5xx, connect/read timeouts,
    /// connection resets. Eligible for retry.
    #[error("transient upstream failure: {0}")]
    Transient(String),

    /// A fault that retrying cannot fix: other 4xx, malformed response
    /// bodies. Surfaced immediately.
    #[error("fatal upstream response: {0}")]
    Fatal(String),

    /// The provider answered but the requested entity does not exist.
    #[error("not found upstream")]
    NotFound,

    /// The provider responded successfully with a domain-level error
    /// (e.g. Ripple `actNotFound`, TonCenter `{"ok": false}`).
    #[error("upstream logical error: {0}")]
    Logical(String),

    /// The caller's deadline fired while waiting on admission, backoff, or
    /// the wire.
    #[error("cancelled by caller deadline")]
    Cancelled,
}

impl UpstreamError {
    /// Whether the runner may retry after this outcome.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            UpstreamError::RateLimited { .. } | UpstreamError::Transient(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryability_follows_the_taxonomy() {
        assert!(UpstreamError::RateLimited { retry_after: None }.is_retryable());
        assert!(UpstreamError::Transient("503".into()).is_retryable());
        assert!(!UpstreamError::Fatal("401".into()).is_retryable());
        assert!(!UpstreamError::NotFound.is_retryable());
        assert!(!UpstreamError::Logical("actNotFound".into()).is_retryable());
        assert!(!UpstreamError::Cancelled.is_retryable());
    }
}
