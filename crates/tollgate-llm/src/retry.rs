//! Retry with exponential backoff
//!
//! Re-runs a single-model upstream call on transient failure. Model-level
//! fallback is the attempt loop's concern; this layer always retries the
//! same model.

use crate::error::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the initial call (0 disables retrying)
    pub max_retries: u32,
    /// Backoff base; retry `k` sleeps `base * 2^(k-1)` plus jitter
    pub base_delay: Duration,
    /// Upper bound of the uniform jitter added to every backoff sleep
    pub max_jitter: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
            max_jitter: Duration::from_millis(250),
        }
    }
}

impl RetryConfig {
    /// Create the default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the retry budget
    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the backoff base delay
    #[must_use]
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Backoff for retry number `retry` (1-based), jitter included
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        let base = self.base_delay.as_millis() as u64;
        let backoff = base.saturating_mul(1_u64 << (retry.saturating_sub(1)).min(16));
        Duration::from_millis(backoff + rand_jitter(self.max_jitter.as_millis() as u64))
    }
}

/// Pseudo-random jitter in `[0, max)` from the clock's nanosecond field
/// (keeps the rand crate out of the dependency tree)
fn rand_jitter(max: u64) -> u64 {
    if max == 0 {
        return 0;
    }
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64)
        .unwrap_or(0);
    nanos % max
}

/// Execute an upstream call with retry on transient failure.
///
/// Retries only errors where [`Error::is_transient`] holds, except
/// [`Error::CircuitOpen`]: an open breaker cannot recover within a backoff
/// sleep, so it is surfaced immediately for the attempt loop to change
/// models. Backoff sleeps observe `cancel` and resolve to
/// [`Error::Cancelled`] once the caller hangs up.
pub async fn retry_with_backoff<T, F, Fut>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let total_calls = config.max_retries + 1;

    for call in 1..=total_calls {
        match operation().await {
            Ok(result) => {
                if call > 1 {
                    debug!(call = call, "Upstream call succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) => {
                let retryable = e.is_transient() && !e.is_circuit_open();
                if !retryable || call == total_calls {
                    debug!(call = call, error = %e, "Upstream call failed, no more retries");
                    return Err(e);
                }

                let delay = config.delay_for(call);
                warn!(
                    call = call,
                    max_calls = total_calls,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Upstream call failed, retrying"
                );
                tokio::select! {
                    () = cancel.cancelled() => return Err(Error::Cancelled),
                    () = sleep(delay) => {}
                }
            }
        }
    }

    unreachable!("retry loop returns from the final call")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn transient() -> Error {
        Error::Api {
            status: 503,
            message: "unavailable".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_needs_no_retry() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff(&RetryConfig::default(), &CancellationToken::new(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(42) }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_retried_until_budget() {
        let calls = AtomicU32::new(0);
        let result: Result<()> =
            retry_with_backoff(&RetryConfig::default(), &CancellationToken::new(), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(transient()) }
            })
            .await;

        assert!(result.is_err());
        // initial call + 2 retries
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_mid_budget() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff(&RetryConfig::default(), &CancellationToken::new(), || {
            let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if call < 3 {
                    Err(transient())
                } else {
                    Ok("ok")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_error_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<()> =
            retry_with_backoff(&RetryConfig::default(), &CancellationToken::new(), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(Error::Api {
                        status: 401,
                        message: "unauthorized".to_string(),
                    })
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_circuit_open_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<()> =
            retry_with_backoff(&RetryConfig::default(), &CancellationToken::new(), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(Error::CircuitOpen("upstream".to_string())) }
            })
            .await;

        assert!(matches!(result, Err(Error::CircuitOpen(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_during_backoff() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result: Result<()> = retry_with_backoff(&RetryConfig::default(), &cancel, || async {
            Err(transient())
        })
        .await;

        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[test]
    fn test_backoff_doubles() {
        let config = RetryConfig {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_jitter: Duration::ZERO,
        };
        assert_eq!(config.delay_for(1), Duration::from_millis(500));
        assert_eq!(config.delay_for(2), Duration::from_millis(1000));
        assert_eq!(config.delay_for(3), Duration::from_millis(2000));
    }

    #[test]
    fn test_jitter_bounded() {
        let config = RetryConfig::default();
        for retry in 1..=2 {
            let delay = config.delay_for(retry);
            let base = Duration::from_millis(500 * (1 << (retry - 1)));
            assert!(delay >= base);
            assert!(delay < base + Duration::from_millis(250));
        }
    }
}
