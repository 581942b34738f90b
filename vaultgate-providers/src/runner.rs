//! Per-provider admission control and retry.
//!
//! One runner is constructed eagerly per upstream at startup and owns that
//! provider's concurrency semaphore, minimum inter-request spacing, and
//! retry budget. Spacing constrains the *start* of consecutive requests;
//! completion order is unconstrained. Cancellation works by future drop:
//! when the caller's deadline fires, admission waits and backoff sleeps are
//! simply abandoned.

use std::future::Future;
use std::time::Duration;

use tokio::sync::{Mutex, Semaphore};
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use vaultgate_core::{provider::ProviderResult, UpstreamError};

/// Pause before retrying a transient server fault.
const TRANSIENT_BACKOFF: Duration = Duration::from_secs(1);

/// Admission controller for one upstream provider.
#[derive(Debug)]
pub struct ProviderRunner {
    name: &'static str,
    semaphore: Semaphore,
    spacing: Duration,
    last_dispatch: Mutex<Option<Instant>>,
    max_retries: u32,
}

impl ProviderRunner {
    /// Build a runner with `permits` concurrent slots and `spacing` between
    /// request starts. Retries default to 3 attempts.
    pub fn new(name: &'static str, permits: usize, spacing: Duration) -> Self {
        Self {
            name,
            semaphore: Semaphore::new(permits),
            spacing,
            last_dispatch: Mutex::new(None),
            max_retries: 3,
        }
    }

    /// Override the retry budget.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Run `op` under admission control with bounded retry.
    ///
    /// Rate-limited outcomes sleep `Retry-After + 1.5^attempt` seconds;
    /// transient faults sleep [`TRANSIENT_BACKOFF`]; fatal outcomes and
    /// successes exit immediately.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> ProviderResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ProviderResult<T>>,
    {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| UpstreamError::Cancelled)?;

        let mut attempt: u32 = 0;
        loop {
            self.pace().await;
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt + 1 < self.max_retries => {
                    let backoff = match &err {
                        UpstreamError::RateLimited { retry_after } => {
                            let hinted = retry_after.unwrap_or(1) as f64;
                            Duration::from_secs_f64(hinted + 1.5f64.powi(attempt as i32))
                        }
                        _ => TRANSIENT_BACKOFF,
                    };
                    warn!(
                        provider = self.name,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "retrying upstream call"
                    );
                    sleep(backoff).await;
                    attempt += 1;
                }
                Err(err) => {
                    if err.is_retryable() {
                        debug!(provider = self.name, attempt, "retry budget exhausted");
                    }
                    return Err(err);
                }
            }
        }
    }

    /// Sleep until at least `spacing` has elapsed since the previous
    /// dispatch, then stamp this one. The lock is held across the sleep so
    /// concurrent callers space out in sequence.
    async fn pace(&self) {
        if self.spacing.is_zero() {
            return;
        }
        let mut last = self.last_dispatch.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.spacing {
                sleep(self.spacing - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn spacing_delays_the_second_caller() {
        let runner = Arc::new(ProviderRunner::new("test", 2, Duration::from_secs(1)));
        let started = Instant::now();

        let a = {
            let runner = runner.clone();
            tokio::spawn(async move {
                runner
                    .run(|| async { Ok::<_, UpstreamError>(Instant::now()) })
                    .await
                    .unwrap()
            })
        };
        let b = {
            let runner = runner.clone();
            tokio::spawn(async move {
                runner
                    .run(|| async { Ok::<_, UpstreamError>(Instant::now()) })
                    .await
                    .unwrap()
            })
        };
        let (a, b) = (a.await.unwrap(), b.await.unwrap());

        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        assert!(second - first >= Duration::from_secs(1));
        assert!(second - started >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_faults_are_retried_to_success() {
        let runner = ProviderRunner::new("test", 2, Duration::ZERO);
        let calls = AtomicU32::new(0);
        let out = runner
            .run(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(UpstreamError::Transient("503".into()))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(out, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_faults_exit_immediately() {
        let runner = ProviderRunner::new("test", 2, Duration::ZERO);
        let calls = AtomicU32::new(0);
        let out: ProviderResult<()> = runner
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(UpstreamError::Fatal("401".into())) }
            })
            .await;
        assert!(matches!(out, Err(UpstreamError::Fatal(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_honors_the_retry_after_hint() {
        let runner = ProviderRunner::new("test", 1, Duration::ZERO);
        let calls = AtomicU32::new(0);
        let started = Instant::now();
        let _ = runner
            .run(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(UpstreamError::RateLimited {
                            retry_after: Some(5),
                        })
                    } else {
                        Ok(())
                    }
                }
            })
            .await
            .unwrap();
        // 5s hint + 1.5^0 = 6s minimum before the second attempt
        assert!(started.elapsed() >= Duration::from_secs(6));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_budget_is_bounded() {
        let runner = ProviderRunner::new("test", 1, Duration::ZERO);
        let calls = AtomicU32::new(0);
        let out: ProviderResult<()> = runner
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(UpstreamError::Transient("503".into())) }
            })
            .await;
        assert!(matches!(out, Err(UpstreamError::Transient(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn semaphore_caps_in_flight_requests() {
        let runner = Arc::new(ProviderRunner::new("test", 2, Duration::ZERO));
        let in_flight = Arc::new(AtomicU32::new(0));
        let peak = Arc::new(AtomicU32::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let runner = runner.clone();
                let in_flight = in_flight.clone();
                let peak = peak.clone();
                tokio::spawn(async move {
                    runner
                        .run(|| {
                            let in_flight = in_flight.clone();
                            let peak = peak.clone();
                            async move {
                                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                                peak.fetch_max(now, Ordering::SeqCst);
                                tokio::time::sleep(Duration::from_millis(10)).await;
                                in_flight.fetch_sub(1, Ordering::SeqCst);
                                Ok::<_, UpstreamError>(())
                            }
                        })
                        .await
                        .unwrap();
                })
            })
            .collect();
        for t in tasks {
            t.await.unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }
}
