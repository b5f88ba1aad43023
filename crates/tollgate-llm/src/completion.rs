//! Provider adapter contract
//!
//! A [`ChatProvider`] performs a single attempt against one model: unary
//! completion returning content plus usage metadata, or a streaming
//! completion yielding content deltas with usage attached to the final
//! event where the upstream reports it.

use crate::error::Result;
use crate::message::ChatMessage;
use crate::model::ModelId;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Token usage reported by an upstream provider
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens
    pub input_tokens: u32,
    /// Completion tokens
    pub output_tokens: u32,
}

impl TokenUsage {
    /// Input + output
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// A single-attempt completion request against one model
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Model to execute
    pub model: ModelId,
    /// Full conversation
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature
    pub temperature: f32,
    /// Generation cap
    pub max_tokens: u32,
}

/// The result of one successful unary attempt
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Generated content
    pub content: String,
    /// Usage metadata when the upstream reports it. Absent usage makes the
    /// core fall back to estimates (router estimate for input,
    /// `len(content)/4` for output).
    pub usage: Option<TokenUsage>,
}

/// One element of an upstream content stream
#[derive(Debug, Clone, Default)]
pub struct StreamEvent {
    /// Content delta; may be empty on bookkeeping events
    pub content: String,
    /// Usage metadata, carried by the final event where available
    pub usage: Option<TokenUsage>,
}

/// A finite, non-restartable stream of upstream events
pub type EventStream = BoxStream<'static, Result<StreamEvent>>;

/// A chat-completion provider
///
/// Implementations classify their failures through [`crate::Error`]; the
/// orchestration core depends only on [`crate::Error::is_transient`].
/// Both operations observe `cancel` and return [`crate::Error::Cancelled`]
/// promptly once the caller hangs up.
#[async_trait::async_trait]
pub trait ChatProvider: Send + Sync {
    /// Provider name (breaker key, accounting dimension)
    fn name(&self) -> &str;

    /// Execute one unary completion attempt
    async fn complete(
        &self,
        request: CompletionRequest,
        cancel: &CancellationToken,
    ) -> Result<CompletionResponse>;

    /// Open one streaming completion attempt
    async fn complete_stream(
        &self,
        request: CompletionRequest,
        cancel: &CancellationToken,
    ) -> Result<EventStream>;

    /// Probe upstream reachability.
    ///
    /// Runs under the shorter health-probe timeout and feeds diagnostics
    /// only — probe results never influence routing or breaker state.
    async fn health_check(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_total() {
        let usage = TokenUsage {
            input_tokens: 100,
            output_tokens: 200,
        };
        assert_eq!(usage.total(), 300);
    }
}
