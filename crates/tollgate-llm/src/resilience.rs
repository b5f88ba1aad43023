//! Resilience policy
//!
//! Wraps a single provider invocation with retry-on-transient and a
//! per-provider circuit breaker, composed retry-outside-of-breaker: every
//! retry re-asks the breaker for admission, so a retry that trips the
//! breaker sees `CircuitOpen` on its next try instead of punching through.

use crate::breaker::{BreakerRegistry, CircuitBreaker, CircuitBreakerConfig};
use crate::error::{Error, Result};
use crate::retry::{retry_with_backoff, RetryConfig};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Retry + circuit-breaker wrapper, shared across concurrent requests
pub struct ResiliencePolicy {
    retry: RetryConfig,
    breakers: BreakerRegistry,
}

impl Default for ResiliencePolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default(), CircuitBreakerConfig::default())
    }
}

impl ResiliencePolicy {
    /// Create a policy from retry and breaker configuration
    #[must_use]
    pub fn new(retry: RetryConfig, breaker: CircuitBreakerConfig) -> Self {
        Self {
            retry,
            breakers: BreakerRegistry::new(breaker),
        }
    }

    /// The breaker currently guarding `provider`
    #[must_use]
    pub fn breaker_for(&self, provider: &str) -> Arc<CircuitBreaker> {
        self.breakers.breaker_for(provider)
    }

    /// Execute one guarded provider invocation.
    ///
    /// `operation` is re-invoked on transient failure up to the retry
    /// budget; every invocation asks the provider's breaker for admission
    /// first and feeds its outcome back. Caller cancellation does not count
    /// against the provider.
    pub async fn execute<T, F, Fut>(
        &self,
        provider: &str,
        cancel: &CancellationToken,
        operation: F,
    ) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let breaker = self.breakers.breaker_for(provider);

        retry_with_backoff(&self.retry, cancel, || {
            let breaker = breaker.clone();
            let operation = &operation;
            async move {
                // admission first: a rejected call must not reach the operation
                if !breaker.try_acquire() {
                    return Err(Error::CircuitOpen(breaker.name().to_string()));
                }
                match operation().await {
                    Ok(value) => {
                        breaker.record_success();
                        Ok(value)
                    }
                    Err(Error::Cancelled) => Err(Error::Cancelled),
                    Err(e) => {
                        breaker.record_failure();
                        Err(e)
                    }
                }
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::CircuitState;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn policy(max_retries: u32, failure_threshold: u32) -> ResiliencePolicy {
        ResiliencePolicy::new(
            RetryConfig::default().with_max_retries(max_retries),
            CircuitBreakerConfig::new()
                .with_failure_threshold(failure_threshold)
                .with_cooldown(Duration::from_secs(3600)),
        )
    }

    fn transient() -> Error {
        Error::Api {
            status: 502,
            message: "bad gateway".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_passes_through() {
        let policy = policy(2, 3);
        let result = policy
            .execute("p", &CancellationToken::new(), || async { Ok(7) })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(policy.breaker_for("p").state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_feed_breaker() {
        // 2 retries = 3 calls; threshold 3 opens the breaker during the run
        let policy = policy(2, 3);
        let calls = AtomicU32::new(0);

        let result: Result<()> = policy
            .execute("p", &CancellationToken::new(), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(transient()) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(policy.breaker_for("p").state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_breaker_fails_fast_without_invoking() {
        let policy = policy(2, 1);
        let _ = policy
            .execute("p", &CancellationToken::new(), || async {
                Err::<(), _>(transient())
            })
            .await;
        assert_eq!(policy.breaker_for("p").state(), CircuitState::Open);

        let calls = AtomicU32::new(0);
        let result: Result<()> = policy
            .execute("p", &CancellationToken::new(), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            })
            .await;

        assert!(matches!(result, Err(Error::CircuitOpen(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_breakers_isolated_per_provider() {
        let policy = policy(0, 1);
        let _ = policy
            .execute("down", &CancellationToken::new(), || async {
                Err::<(), _>(transient())
            })
            .await;

        assert_eq!(policy.breaker_for("down").state(), CircuitState::Open);
        let result = policy
            .execute("up", &CancellationToken::new(), || async { Ok(1) })
            .await;
        assert_eq!(result.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_error_counts_but_does_not_retry() {
        let policy = policy(2, 3);
        let calls = AtomicU32::new(0);

        let result: Result<()> = policy
            .execute("p", &CancellationToken::new(), || {
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
        assert_eq!(policy.breaker_for("p").failure_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_not_counted_as_provider_failure() {
        let policy = policy(2, 1);
        let result: Result<()> = policy
            .execute("p", &CancellationToken::new(), || async {
                Err(Error::Cancelled)
            })
            .await;

        assert!(matches!(result, Err(Error::Cancelled)));
        assert_eq!(policy.breaker_for("p").state(), CircuitState::Closed);
        assert_eq!(policy.breaker_for("p").failure_count(), 0);
    }
}
