//! Upstream connection configuration
//!
//! One config object covers the outbound HTTP surface: credentials,
//! timeouts, retry/breaker tuning and connection pooling. The pooled
//! client is long-lived and shared by every concurrent request.

use crate::breaker::CircuitBreakerConfig;
use crate::error::{Error, Result};
use crate::retry::RetryConfig;
use crate::util::mask_api_key;
use std::fmt;
use std::time::Duration;

/// Upstream provider connection settings
#[derive(Clone)]
pub struct UpstreamConfig {
    /// API key sent as a bearer token
    pub api_key: String,
    /// Base URL of the chat-completions API
    pub base_url: String,
    /// Per-request upstream timeout
    pub timeout_secs: u64,
    /// Timeout for health probes
    pub health_check_timeout_secs: u64,
    /// Same-model retries inside the resilience layer
    pub max_retries: u32,
    /// Consecutive failures before a provider's circuit opens
    pub circuit_breaker_failure_threshold: u32,
    /// Open-circuit cooldown before a probe is admitted
    pub circuit_breaker_cooldown_secs: u64,
    /// Idle connections kept per upstream host
    pub max_connections_per_server: usize,
    /// Idle connection lifetime before the pool recycles it
    pub connection_lifetime_minutes: u64,
    /// Negotiate HTTP/2 with the upstream
    pub use_http2: bool,
}

// Debug must never leak the key
impl fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("api_key", &mask_api_key(&self.api_key))
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field(
                "health_check_timeout_secs",
                &self.health_check_timeout_secs,
            )
            .field("max_retries", &self.max_retries)
            .field(
                "circuit_breaker_failure_threshold",
                &self.circuit_breaker_failure_threshold,
            )
            .field(
                "circuit_breaker_cooldown_secs",
                &self.circuit_breaker_cooldown_secs,
            )
            .field("max_connections_per_server", &self.max_connections_per_server)
            .field(
                "connection_lifetime_minutes",
                &self.connection_lifetime_minutes,
            )
            .field("use_http2", &self.use_http2)
            .finish()
    }
}

impl UpstreamConfig {
    /// Create a configuration with defaults for everything but credentials
    #[must_use]
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            timeout_secs: 60,
            health_check_timeout_secs: 5,
            max_retries: 2,
            circuit_breaker_failure_threshold: 3,
            circuit_breaker_cooldown_secs: 30,
            max_connections_per_server: 100,
            connection_lifetime_minutes: 5,
            use_http2: true,
        }
    }

    /// Set the upstream timeout
    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Set the retry budget
    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Retry configuration for the resilience layer
    #[must_use]
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::default().with_max_retries(self.max_retries)
    }

    /// Breaker configuration for the resilience layer
    #[must_use]
    pub fn breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig::new()
            .with_failure_threshold(self.circuit_breaker_failure_threshold)
            .with_cooldown(Duration::from_secs(self.circuit_breaker_cooldown_secs))
    }

    /// Timeout applied to upstream health probes, overriding the
    /// per-request default on the shared client
    #[must_use]
    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_check_timeout_secs)
    }

    /// Build the shared pooled HTTP client
    pub fn build_client(&self) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .pool_max_idle_per_host(self.max_connections_per_server)
            .pool_idle_timeout(Duration::from_secs(self.connection_lifetime_minutes * 60));

        if !self.use_http2 {
            builder = builder.http1_only();
        }

        builder
            .build()
            .map_err(|e| Error::NotConfigured(format!("http client: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = UpstreamConfig::new("sk-test-1234567890", "https://example.test/v1");
        assert_eq!(config.timeout_secs, 60);
        assert_eq!(config.health_check_timeout_secs, 5);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.circuit_breaker_failure_threshold, 3);
        assert_eq!(config.circuit_breaker_cooldown_secs, 30);
        assert_eq!(config.max_connections_per_server, 100);
        assert_eq!(config.connection_lifetime_minutes, 5);
        assert!(config.use_http2);
    }

    #[test]
    fn test_debug_masks_key() {
        let config = UpstreamConfig::new("sk-1234567890abcdefghij", "https://example.test");
        let debug = format!("{config:?}");
        assert!(!debug.contains("1234567890abcdef"));
        assert!(debug.contains("sk-1...ghij"));
    }

    #[test]
    fn test_derived_configs() {
        let config = UpstreamConfig::new("k", "u").with_max_retries(5);
        assert_eq!(config.retry_config().max_retries, 5);
        assert_eq!(config.breaker_config().failure_threshold, 3);
        assert_eq!(
            config.breaker_config().cooldown,
            Duration::from_secs(30)
        );
        assert_eq!(config.health_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_build_client() {
        let config = UpstreamConfig::new("k", "https://example.test");
        assert!(config.build_client().is_ok());
    }
}
