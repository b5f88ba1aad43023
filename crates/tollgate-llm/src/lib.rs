//! Tollgate LLM - request orchestration core
//!
//! This crate turns one inbound chat request into one successful upstream
//! call:
//! - Router: token-estimate-driven initial model selection
//! - Attempt loop: up to N attempts over a configurable fallback chain
//! - Resilience: same-model retry with backoff + jitter, per-provider
//!   circuit breakers shared across concurrent requests
//! - Accounting: pricing lookup, USD cost derivation, request-log
//!   persistence that never masks a successful response
//! - Streaming: chunk-by-chunk forwarding with a single completion frame
//!
//! Provider implementations plug in through [`ChatProvider`]; persistence
//! plugs in through [`cost::PricingLookup`] and [`cost::RequestLogSink`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod breaker;
pub mod completion;
pub mod config;
pub mod cost;
pub mod error;
pub mod fallback;
pub mod message;
pub mod model;
pub mod orchestrator;
pub mod providers;
pub mod request;
pub mod resilience;
pub mod retry;
pub mod routing;
pub mod stream;
pub mod token;
pub mod util;

pub use breaker::{BreakerRegistry, CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use completion::{
    ChatProvider, CompletionRequest, CompletionResponse, EventStream, StreamEvent, TokenUsage,
};
pub use config::UpstreamConfig;
pub use cost::{Accountant, CostAmount, ModelPricing, PricingLookup, RequestLog, RequestLogSink};
pub use error::{Error, Result};
pub use fallback::FallbackChain;
pub use message::{ChatMessage, MessageRole};
pub use model::ModelId;
pub use orchestrator::{ChatOrchestrator, OrchestratorConfig};
pub use providers::{MockProvider, OpenAiCompatConfig, OpenAiCompatProvider};
pub use request::{ChatRequest, ChatResponse};
pub use resilience::ResiliencePolicy;
pub use retry::RetryConfig;
pub use routing::{Router, RoutingConfig, LARGE_CONTEXT_LIMIT, STANDARD_CONTEXT_LIMIT};
pub use stream::{FrameStream, StreamFrame, StreamMetadata};
pub use token::TokenCount;
