//! Circuit breaker
//!
//! Per-provider admission gate shared by all concurrent requests. Three
//! states:
//! - Closed: requests pass through; consecutive failures are counted
//! - Open: requests are rejected until the cooldown elapses
//! - HalfOpen: exactly one probe call is admitted; its outcome decides
//!   whether the circuit closes or reopens

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation - requests pass through
    Closed,
    /// Failures exceeded threshold - requests are rejected
    Open,
    /// Testing recovery - a single probe passes through
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "Closed"),
            Self::Open => write!(f, "Open"),
            Self::HalfOpen => write!(f, "HalfOpen"),
        }
    }
}

/// Configuration for circuit breaker
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit
    pub failure_threshold: u32,
    /// Duration an open circuit rejects calls before admitting a probe
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown: Duration::from_secs(30),
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a new configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set failure threshold
    #[must_use]
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Set cooldown
    #[must_use]
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }
}

/// Circuit breaker for one upstream provider
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    state: RwLock<CircuitState>,
    failure_count: AtomicU32,
    probe_in_flight: AtomicBool,
    opened_at: AtomicU64,
}

impl CircuitBreaker {
    /// Create a new circuit breaker
    #[must_use]
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: RwLock::new(CircuitState::Closed),
            failure_count: AtomicU32::new(0),
            probe_in_flight: AtomicBool::new(false),
            opened_at: AtomicU64::new(0),
        }
    }

    /// Create with default configuration
    #[must_use]
    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(name, CircuitBreakerConfig::default())
    }

    /// The breaker name (provider key)
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The current state
    #[must_use]
    pub fn state(&self) -> CircuitState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current consecutive-failure count
    #[must_use]
    pub fn failure_count(&self) -> u32 {
        self.failure_count.load(Ordering::SeqCst)
    }

    /// Ask for admission of one call.
    ///
    /// Closed admits everything. Open rejects until the cooldown elapses,
    /// then transitions to HalfOpen and admits the asking caller as the
    /// probe. HalfOpen rejects everyone except that single probe.
    #[must_use]
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        match *state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let opened_at = self.opened_at.load(Ordering::SeqCst);
                let elapsed = Duration::from_millis(current_timestamp().saturating_sub(opened_at));
                if elapsed >= self.config.cooldown {
                    info!(name = %self.name, "Circuit breaker entering half-open state");
                    *state = CircuitState::HalfOpen;
                    self.probe_in_flight.store(true, Ordering::SeqCst);
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => self
                .probe_in_flight
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok(),
        }
    }

    /// Record a successful call
    pub fn record_success(&self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        match *state {
            CircuitState::Closed => {
                self.failure_count.store(0, Ordering::SeqCst);
            }
            CircuitState::HalfOpen => {
                info!(name = %self.name, "Circuit breaker closed after successful probe");
                *state = CircuitState::Closed;
                self.failure_count.store(0, Ordering::SeqCst);
                self.probe_in_flight.store(false, Ordering::SeqCst);
            }
            CircuitState::Open => {}
        }
    }

    /// Record a failed call
    pub fn record_failure(&self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        match *state {
            CircuitState::Closed => {
                let failures = self.failure_count.fetch_add(1, Ordering::SeqCst) + 1;
                debug!(
                    name = %self.name,
                    failures = failures,
                    threshold = self.config.failure_threshold,
                    "Circuit breaker failure recorded"
                );
                if failures >= self.config.failure_threshold {
                    info!(name = %self.name, failures = failures, "Circuit breaker opened");
                    *state = CircuitState::Open;
                    self.opened_at.store(current_timestamp(), Ordering::SeqCst);
                }
            }
            CircuitState::HalfOpen => {
                warn!(name = %self.name, "Probe failed, circuit breaker reopening");
                *state = CircuitState::Open;
                self.opened_at.store(current_timestamp(), Ordering::SeqCst);
                self.probe_in_flight.store(false, Ordering::SeqCst);
            }
            CircuitState::Open => {}
        }
    }

    /// Force the breaker back to closed
    pub fn reset(&self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        *state = CircuitState::Closed;
        self.failure_count.store(0, Ordering::SeqCst);
        self.probe_in_flight.store(false, Ordering::SeqCst);
    }
}

/// Get current timestamp in milliseconds
fn current_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Process-wide registry of per-provider breakers
#[derive(Default)]
pub struct BreakerRegistry {
    config: CircuitBreakerConfig,
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
}

impl BreakerRegistry {
    /// Create a registry; every breaker it vends shares `config`
    #[must_use]
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            breakers: RwLock::new(HashMap::new()),
        }
    }

    /// Get or create the breaker for a provider
    #[must_use]
    pub fn breaker_for(&self, provider: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self
            .breakers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(provider)
        {
            return breaker.clone();
        }

        let mut breakers = self
            .breakers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        breakers
            .entry(provider.to_string())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::new(provider, self.config.clone()))
            })
            .clone()
    }
}
