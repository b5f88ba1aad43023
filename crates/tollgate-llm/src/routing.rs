//! Router - initial model selection
//!
//! Picks the first model to try from the estimated input size and the
//! caller's explicit model choice, and rejects requests that exceed the
//! global context ceiling. Selection order:
//!
//! 1. estimate above the large-context ceiling -> reject
//! 2. caller-specified model -> honored verbatim
//! 3. estimate above the standard threshold -> large-context model
//! 4. otherwise -> default model

use crate::error::{Error, Result};
use crate::model::ModelId;
use crate::token::TokenCount;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default threshold above which the large-context model is selected
pub const STANDARD_CONTEXT_LIMIT: u32 = 10_000;

/// Default global context ceiling; larger requests are rejected
pub const LARGE_CONTEXT_LIMIT: u32 = 200_000;

/// Model routing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Model for ordinary requests
    pub default_model: ModelId,
    /// Model for requests above `standard_context_limit`
    pub large_context_model: ModelId,
    /// Mid-tier model, used by the fallback chain
    pub balanced_model: ModelId,
    /// Threshold for switching to the large-context model
    pub standard_context_limit: u32,
    /// Hard ceiling on estimated input tokens
    pub large_context_limit: u32,
    /// Ordered fallback chain consulted after transient failures
    pub fallback_chain: Vec<ModelId>,
}

impl RoutingConfig {
    /// Build a config from the three routed models with default limits.
    ///
    /// The fallback chain defaults to large-context, balanced, default.
    #[must_use]
    pub fn new(default_model: ModelId, large_context_model: ModelId, balanced_model: ModelId) -> Self {
        let fallback_chain = vec![
            large_context_model.clone(),
            balanced_model.clone(),
            default_model.clone(),
        ];
        Self {
            default_model,
            large_context_model,
            balanced_model,
            standard_context_limit: STANDARD_CONTEXT_LIMIT,
            large_context_limit: LARGE_CONTEXT_LIMIT,
            fallback_chain,
        }
    }

    /// Override the fallback chain
    #[must_use]
    pub fn with_fallback_chain(mut self, chain: Vec<ModelId>) -> Self {
        self.fallback_chain = chain;
        self
    }

    /// Override the context limits
    #[must_use]
    pub fn with_limits(mut self, standard: u32, large: u32) -> Self {
        self.standard_context_limit = standard;
        self.large_context_limit = large;
        self
    }
}

/// Initial-model selector
#[derive(Debug, Clone)]
pub struct Router {
    config: RoutingConfig,
}

impl Router {
    /// Create a router over a routing configuration
    #[must_use]
    pub fn new(config: RoutingConfig) -> Self {
        Self { config }
    }

    /// The routing configuration
    #[must_use]
    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }

    /// Select the initial model for a request.
    ///
    /// `estimated` is the chars/4 estimate over all inbound messages; it is
    /// used for routing only, never for billing.
    pub fn select(&self, estimated: TokenCount, user_model: Option<&str>) -> Result<ModelId> {
        if estimated.exceeds(self.config.large_context_limit) {
            return Err(Error::TokenLimitExceeded {
                estimated: estimated.get(),
                limit: self.config.large_context_limit,
            });
        }

        if let Some(requested) = user_model.map(str::trim).filter(|m| !m.is_empty()) {
            let model = ModelId::new(requested)?;
            debug!(model = %model, "Routing to user-requested model");
            return Ok(model);
        }

        let model = if estimated.exceeds(self.config.standard_context_limit) {
            &self.config.large_context_model
        } else {
            &self.config.default_model
        };
        debug!(tokens = %estimated, model = %model, "Routed by estimated context size");
        Ok(model.clone())
    }
}
