//! Request orchestration
//!
//! Turns one inbound chat request into one successful upstream call:
//! validate, route, then drive up to `max_attempts` attempts over the
//! fallback chain, each attempt guarded by the resilience policy. A
//! successful attempt is accounted and assembled into a [`ChatResponse`].

use crate::completion::{ChatProvider, CompletionRequest};
use crate::cost::Accountant;
use crate::error::{Error, Result};
use crate::fallback::FallbackChain;
use crate::model::ModelId;
use crate::request::{ChatRequest, ChatResponse};
use crate::resilience::ResiliencePolicy;
use crate::routing::Router;
use crate::token::TokenCount;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Attempt-loop tuning
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Model-level attempts, fallback included
    pub max_attempts: u32,
    /// Temperature applied when the caller does not set one
    pub default_temperature: f32,
    /// Generation cap applied when the caller does not set one
    pub default_max_tokens: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            default_temperature: 0.7,
            default_max_tokens: 2000,
        }
    }
}

/// A successful attempt with its billing inputs
#[derive(Debug, Clone)]
pub(crate) struct AttemptSuccess {
    pub content: String,
    pub input_tokens: TokenCount,
    pub output_tokens: TokenCount,
    pub model_used: ModelId,
    pub attempts: u32,
}

/// The orchestration pipeline shared by every inbound request
pub struct ChatOrchestrator {
    pub(crate) provider: Arc<dyn ChatProvider>,
    pub(crate) router: Router,
    pub(crate) fallback: FallbackChain,
    pub(crate) resilience: Arc<ResiliencePolicy>,
    pub(crate) accountant: Arc<Accountant>,
    pub(crate) config: OrchestratorConfig,
}

impl ChatOrchestrator {
    /// Assemble a pipeline.
    ///
    /// The fallback chain is taken from the router configuration; the
    /// resilience policy is shared so breaker state spans concurrent
    /// requests.
    #[must_use]
    pub fn new(
        provider: Arc<dyn ChatProvider>,
        router: Router,
        resilience: Arc<ResiliencePolicy>,
        accountant: Arc<Accountant>,
    ) -> Self {
        let fallback = FallbackChain::new(router.config().fallback_chain.clone());
        Self {
            provider,
            router,
            fallback,
            resilience,
            accountant,
            config: OrchestratorConfig::default(),
        }
    }

    /// Override the attempt-loop tuning
    #[must_use]
    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Execute one unary chat request end to end.
    #[instrument(skip(self, request, cancel), fields(messages = request.messages.len()))]
    pub async fn execute(
        &self,
        request: ChatRequest,
        cancel: &CancellationToken,
    ) -> Result<ChatResponse> {
        request.validate()?;

        let estimate = TokenCount::from_messages(&request.messages);
        let initial = self.router.select(estimate, request.requested_model())?;
        let started = Instant::now();

        let success = self
            .run_attempts(&request, initial, estimate, cancel)
            .await?;
        let response_time = started.elapsed();

        let was_fallback = success.attempts > 1;
        let cost = self
            .accountant
            .track(
                &success.model_used,
                success.input_tokens,
                success.output_tokens,
                success.model_used.provider(),
                response_time,
                was_fallback,
            )
            .await;

        info!(
            model = %success.model_used,
            attempts = success.attempts,
            fallback = was_fallback,
            latency_ms = response_time.as_millis() as u64,
            "Chat request completed"
        );

        Ok(ChatResponse {
            tokens_used: success.input_tokens.get() + success.output_tokens.get(),
            content: success.content,
            model: success.model_used,
            estimated_cost: cost,
            response_time,
        })
    }

    /// Drive the attempt loop until one model answers or the budget or the
    /// chain runs out.
    pub(crate) async fn run_attempts(
        &self,
        request: &ChatRequest,
        initial: ModelId,
        estimate: TokenCount,
        cancel: &CancellationToken,
    ) -> Result<AttemptSuccess> {
        let mut current = initial;
        let mut attempts: u32 = 0;
        let mut attempted: Vec<ModelId> = Vec::new();

        loop {
            attempts += 1;
            attempted.push(current.clone());

            let completion = self.attempt_request(request, &current);
            let result = self
                .resilience
                .execute(current.provider(), cancel, || {
                    let completion = completion.clone();
                    async move { self.provider.complete(completion, cancel).await }
                })
                .await;

            match result {
                Ok(response) if !response.content.is_empty() => {
                    let (input_tokens, output_tokens) = billing_tokens(
                        response.usage.map(|u| (u.input_tokens, u.output_tokens)),
                        estimate,
                        &response.content,
                    );
                    return Ok(AttemptSuccess {
                        content: response.content,
                        input_tokens,
                        output_tokens,
                        model_used: current,
                        attempts,
                    });
                }
                Ok(_) => {
                    // an empty completion is a transient failure of this attempt
                    warn!(model = %current, attempt = attempts, "Upstream returned empty completion");
                    if attempts >= self.config.max_attempts {
                        return Err(Error::AllProvidersFailed(
                            attempted.iter().map(ModelId::to_string).collect(),
                        ));
                    }
                    current = self.fallback.next(&current, &attempted)?;
                }
                Err(e) if e.is_transient() && attempts < self.config.max_attempts => {
                    debug!(model = %current, attempt = attempts, error = %e, "Transient failure, falling back");
                    current = self.fallback.next(&current, &attempted)?;
                }
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) if e.is_transient() => {
                    debug!(error = %e, "Attempt budget exhausted");
                    return Err(Error::AllProvidersFailed(
                        attempted.iter().map(ModelId::to_string).collect(),
                    ));
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Single-attempt request for one model, defaults applied
    pub(crate) fn attempt_request(
        &self,
        request: &ChatRequest,
        model: &ModelId,
    ) -> CompletionRequest {
        CompletionRequest {
            model: model.clone(),
            messages: request.messages.clone(),
            temperature: request
                .temperature
                .unwrap_or(self.config.default_temperature),
            max_tokens: request.max_tokens.unwrap_or(self.config.default_max_tokens),
        }
    }
}

/// Billing counts for a successful attempt: exact upstream usage where
/// reported, otherwise the router estimate for input and chars/4 of the
/// produced content for output.
fn billing_tokens(
    usage: Option<(u32, u32)>,
    estimate: TokenCount,
    content: &str,
) -> (TokenCount, TokenCount) {
    match usage {
        Some((input, output)) if input > 0 || output > 0 => {
            (TokenCount::new(input), TokenCount::new(output))
        }
        _ => (estimate, TokenCount::from_text(content)),
    }
}
