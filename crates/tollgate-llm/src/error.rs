//! Error types for tollgate-llm

use thiserror::Error;

/// Gateway error type
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed inbound request
    #[error("invalid request: {0}")]
    Validation(String),

    /// Estimated context exceeds the global ceiling
    #[error("estimated {estimated} tokens exceeds the {limit} token limit")]
    TokenLimitExceeded {
        /// Estimated input tokens
        estimated: u32,
        /// Global context ceiling
        limit: u32,
    },

    /// Model cannot be resolved by the fallback chain
    #[error("unknown model: {0}")]
    ModelUnknown(String),

    /// Status-coded upstream error
    #[error("upstream returned {status}: {message}")]
    Api {
        /// HTTP status from the upstream provider
        status: u16,
        /// Sanitized upstream message
        message: String,
    },

    /// Network / socket / DNS / TLS failure
    #[error("network error: {0}")]
    Network(String),

    /// Upstream deadline expired
    #[error("timeout after {0}ms")]
    Timeout(u64),

    /// Upstream response could not be parsed
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Circuit breaker refused the call
    #[error("circuit open for provider {0}")]
    CircuitOpen(String),

    /// Fallback chain exhausted
    #[error("all providers failed (attempted: {})", .0.join(", "))]
    AllProvidersFailed(Vec<String>),

    /// Caller hung up; all downstream work is abandoned
    #[error("request cancelled by caller")]
    Cancelled,

    /// Provider not configured
    #[error("provider not configured: {0}")]
    NotConfigured(String),
}

impl Error {
    /// Whether the attempt loop may recover from this error by retrying
    /// or switching models.
    ///
    /// Transient: 429 and 5xx upstream statuses, network failures, deadline
    /// expiry, and an open circuit. Everything else is terminal — including
    /// 401, which signals a configuration problem rather than a provider
    /// outage.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Api { status, .. } => matches!(status, 429 | 500 | 502 | 503 | 504),
            Self::Network(_) | Self::Timeout(_) | Self::CircuitOpen(_) => true,
            _ => false,
        }
    }

    /// Whether this error came from an open circuit breaker.
    ///
    /// The retry layer skips these: sleeping in front of an open breaker
    /// cannot succeed before the cooldown elapses, so the attempt loop
    /// moves to the next model instead.
    #[must_use]
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen(_))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_statuses() {
        for status in [429, 500, 502, 503, 504] {
            let err = Error::Api {
                status,
                message: "boom".to_string(),
            };
            assert!(err.is_transient(), "status {status} should be transient");
        }
    }

    #[test]
    fn test_terminal_statuses() {
        for status in [400, 401, 403, 404, 422] {
            let err = Error::Api {
                status,
                message: "boom".to_string(),
            };
            assert!(!err.is_transient(), "status {status} should be terminal");
        }
    }

    #[test]
    fn test_network_and_timeout_transient() {
        assert!(Error::Network("reset".to_string()).is_transient());
        assert!(Error::Timeout(60_000).is_transient());
    }

    #[test]
    fn test_circuit_open_transient_but_flagged() {
        let err = Error::CircuitOpen("openrouter".to_string());
        assert!(err.is_transient());
        assert!(err.is_circuit_open());
        assert!(!Error::Timeout(1).is_circuit_open());
    }

    #[test]
    fn test_cancel_and_validation_terminal() {
        assert!(!Error::Cancelled.is_transient());
        assert!(!Error::Validation("empty".to_string()).is_transient());
        assert!(!Error::TokenLimitExceeded {
            estimated: 300_000,
            limit: 200_000
        }
        .is_transient());
        assert!(!Error::AllProvidersFailed(vec!["a/x".to_string()]).is_transient());
    }
}
