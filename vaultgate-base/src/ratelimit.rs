//! Inbound per-client rate limiting.
//!
//! A fixed one-minute window counter per client IP, shared through Redis so
//! every worker process sees the same budget. Redis being down must not
//! take the gateway down with it: the limiter fails open with a warning.

use redis::{aio::MultiplexedConnection, AsyncCommands};
use tracing::warn;

/// The shared inbound budget.
pub struct RateLimiter {
    conn: Option<MultiplexedConnection>,
    budget: u32,
}

impl RateLimiter {
    /// Connect to Redis. A connection failure degrades to a no-op limiter.
    pub async fn connect(redis_url: &str, budget: u32) -> Self {
        let conn = match redis::Client::open(redis_url) {
            Ok(client) => match client.get_multiplexed_tokio_connection().await {
                Ok(conn) => Some(conn),
                Err(err) => {
                    warn!(error = %err, "redis unreachable, rate limiting disabled");
                    None
                }
            },
            Err(err) => {
                warn!(error = %err, "bad redis url, rate limiting disabled");
                None
            }
        };
        Self { conn, budget }
    }

    /// A limiter that never limits (tests).
    pub fn disabled() -> Self {
        Self {
            conn: None,
            budget: u32::MAX,
        }
    }

    /// Whether a request from `ip` fits the current window's budget.
    pub async fn allow(&self, ip: &str) -> bool {
        let Some(conn) = &self.conn else {
            return true;
        };
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let key = window_key(ip, now);

        let mut conn = conn.clone();
        let count: i64 = match conn.incr(&key, 1).await {
            Ok(n) => n,
            Err(err) => {
                warn!(error = %err, "rate limit INCR failed, failing open");
                return true;
            }
        };
        if count == 1 {
            // window keys clean themselves up shortly after they close
            if let Err(err) = conn.expire::<_, ()>(&key, 120).await {
                warn!(error = %err, "rate limit EXPIRE failed");
            }
        }
        count <= i64::from(self.budget)
    }
}

/// One key per client per minute window.
fn window_key(ip: &str, now_secs: u64) -> String {
    format!("vaultgate:rl:{ip}:{}", now_secs / 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_rotate_with_the_minute_window() {
        let a = window_key("1.2.3.4", 60);
        let b = window_key("1.2.3.4", 119);
        let c = window_key("1.2.3.4", 120);
        assert_eq!(a, b);
        assert_ne!(b, c);
        assert_ne!(window_key("1.2.3.4", 60), window_key("5.6.7.8", 60));
    }

    #[tokio::test]
    async fn disabled_limiter_always_allows() {
        let limiter = RateLimiter::disabled();
        for _ in 0..1000 {
            assert!(limiter.allow("1.2.3.4").await);
        }
    }
}
