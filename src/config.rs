//! Application configuration
//!
//! Loaded from `TOLLGATE_*` environment variables (a `.env` file is read
//! when present) with working defaults for everything except credentials.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use tollgate_llm::{ModelId, RoutingConfig, UpstreamConfig};

/// Default listen address
const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";

/// Default SQLite database path
const DEFAULT_DB_PATH: &str = "data/tollgate.db";

/// Default routed models
const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";
const LARGE_CONTEXT_MODEL: &str = "anthropic/claude-sonnet-4";
const BALANCED_MODEL: &str = "openai/gpt-4o";

/// Top-level application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// HTTP listen address
    pub listen_addr: SocketAddr,
    /// SQLite database path
    pub db_path: PathBuf,
    /// Upstream connection settings
    pub upstream: UpstreamConfig,
    /// Model routing settings
    pub routing: RoutingConfig,
    /// Upstream provider display name
    pub provider_name: String,
}

impl AppConfig {
    /// Load configuration from the environment
    pub fn from_env() -> Result<Self> {
        let listen_addr = env_or("TOLLGATE_LISTEN_ADDR", DEFAULT_LISTEN_ADDR)
            .parse()
            .context("TOLLGATE_LISTEN_ADDR is not a valid socket address")?;

        let db_path = PathBuf::from(env_or("TOLLGATE_DB_PATH", DEFAULT_DB_PATH));

        let api_key = std::env::var("TOLLGATE_API_KEY")
            .context("TOLLGATE_API_KEY is required")?;
        let base_url = env_or("TOLLGATE_BASE_URL", "https://openrouter.ai/api/v1");

        let mut upstream = UpstreamConfig::new(api_key, base_url);
        upstream.timeout_secs = parse_env("TOLLGATE_TIMEOUT_SECONDS", upstream.timeout_secs)?;
        upstream.health_check_timeout_secs = parse_env(
            "TOLLGATE_HEALTH_CHECK_TIMEOUT_SECONDS",
            upstream.health_check_timeout_secs,
        )?;
        upstream.max_retries = parse_env("TOLLGATE_MAX_RETRIES", upstream.max_retries)?;
        upstream.circuit_breaker_failure_threshold = parse_env(
            "TOLLGATE_CIRCUIT_BREAKER_FAILURE_THRESHOLD",
            upstream.circuit_breaker_failure_threshold,
        )?;
        upstream.circuit_breaker_cooldown_secs = parse_env(
            "TOLLGATE_CIRCUIT_BREAKER_COOLDOWN_SECONDS",
            upstream.circuit_breaker_cooldown_secs,
        )?;
        upstream.max_connections_per_server = parse_env(
            "TOLLGATE_MAX_CONNECTIONS_PER_SERVER",
            upstream.max_connections_per_server,
        )?;
        upstream.connection_lifetime_minutes = parse_env(
            "TOLLGATE_CONNECTION_LIFETIME_MINUTES",
            upstream.connection_lifetime_minutes,
        )?;
        upstream.use_http2 = parse_env("TOLLGATE_USE_HTTP2", upstream.use_http2)?;

        let routing = RoutingConfig::new(
            model_from_env("TOLLGATE_DEFAULT_MODEL", DEFAULT_MODEL)?,
            model_from_env("TOLLGATE_LARGE_CONTEXT_MODEL", LARGE_CONTEXT_MODEL)?,
            model_from_env("TOLLGATE_BALANCED_MODEL", BALANCED_MODEL)?,
        );

        let provider_name = env_or("TOLLGATE_PROVIDER_NAME", "openrouter");

        Ok(Self {
            listen_addr,
            db_path,
            upstream,
            routing,
            provider_name,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(value) => value
            .parse()
            .with_context(|| format!("{key} has an invalid value")),
        Err(_) => Ok(default),
    }
}

fn model_from_env(key: &str, default: &str) -> Result<ModelId> {
    ModelId::new(env_or(key, default)).with_context(|| format!("{key} is not a valid model id"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_models_are_distinct() {
        let ids = [DEFAULT_MODEL, LARGE_CONTEXT_MODEL, BALANCED_MODEL];
        for (i, a) in ids.iter().enumerate() {
            for b in &ids[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_parse_env_falls_back() {
        // key never set in test environment
        let value: u64 = parse_env("TOLLGATE_TEST_UNSET_KEY_12345", 7).unwrap();
        assert_eq!(value, 7);
    }
}
