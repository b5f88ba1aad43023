//! Chat-completion endpoints
//!
//! `POST /v1/chat/completions` answers with a single JSON body;
//! `POST /v1/chat/completions/stream` answers with an SSE stream of
//! `data: <json>` frames ending in exactly one `complete` frame.

use crate::middleware::CorrelationId;
use crate::server::AppState;
use axum::extract::Extension;
use axum::http::header;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::post;
use axum::Router;
use futures::StreamExt;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tollgate_llm::{ChatMessage, ChatRequest, ChatResponse, MessageRole, StreamFrame};
use tracing::warn;

use super::problem::ApiError;

/// Inbound request body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatCompletionBody {
    /// Conversation messages
    pub messages: Vec<MessageBody>,
    /// Requested model
    #[serde(default)]
    pub model: Option<String>,
    /// Sampling temperature
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Generation cap
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

/// One inbound message
#[derive(Debug, Deserialize)]
pub struct MessageBody {
    /// system | user | assistant
    pub role: MessageRole,
    /// Message text
    pub content: String,
}

impl From<ChatCompletionBody> for ChatRequest {
    fn from(body: ChatCompletionBody) -> Self {
        Self {
            messages: body
                .messages
                .into_iter()
                .map(|m| ChatMessage {
                    role: m.role,
                    content: m.content,
                })
                .collect(),
            model: body.model,
            temperature: body.temperature,
            max_tokens: body.max_tokens,
        }
    }
}

/// Outbound unary response body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatCompletionReply {
    /// Generated content
    pub content: String,
    /// Model that answered
    pub model: String,
    /// Input + output tokens
    pub tokens_used: u32,
    /// Estimated cost in USD
    pub estimated_cost_usd: Decimal,
    /// Latency as `hh:mm:ss.fff`
    pub response_time: String,
}

impl From<ChatResponse> for ChatCompletionReply {
    fn from(response: ChatResponse) -> Self {
        Self {
            content: response.content,
            model: response.model.to_string(),
            tokens_used: response.tokens_used,
            estimated_cost_usd: response.estimated_cost.as_decimal(),
            response_time: format_response_time(response.response_time),
        }
    }
}

/// Render a duration as `hh:mm:ss.fff`
fn format_response_time(duration: Duration) -> String {
    let ms = duration.as_millis();
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        ms / 3_600_000,
        (ms / 60_000) % 60,
        (ms / 1_000) % 60,
        ms % 1_000
    )
}

/// Chat routes
pub fn chat_routes() -> Router {
    Router::new()
        .route("/v1/chat/completions", post(chat_completions))
        .route("/v1/chat/completions/stream", post(chat_completions_stream))
}

/// Unary chat completion
async fn chat_completions(
    Extension(state): Extension<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Json(body): Json<ChatCompletionBody>,
) -> Result<Json<ChatCompletionReply>, ApiError> {
    let cancel = CancellationToken::new();
    let _cancel_on_disconnect = cancel.clone().drop_guard();

    let response = state
        .orchestrator
        .execute(body.into(), &cancel)
        .await
        .map_err(|e| ApiError::new(e, correlation.as_str()))?;

    Ok(Json(response.into()))
}

/// Streaming chat completion
async fn chat_completions_stream(
    Extension(state): Extension<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Json(body): Json<ChatCompletionBody>,
) -> Result<Response, ApiError> {
    let cancel = CancellationToken::new();
    // the producer task must stop the moment the connection goes away,
    // including before the first frame arrives
    let guard = cancel.clone().drop_guard();

    let mut frames = state
        .orchestrator
        .execute_stream(body.into(), cancel)
        .map_err(|e| ApiError::new(e, correlation.as_str()))?;

    // Failures that precede any content can still become a status code, so
    // hold the response until the first frame decides which world we are in.
    let first = match frames.next().await {
        Some(Ok(frame)) => frame,
        Some(Err(e)) => return Err(ApiError::new(e, correlation.as_str())),
        None => {
            return Err(ApiError::new(
                tollgate_llm::Error::Network("stream produced no frames".to_string()),
                correlation.as_str(),
            ))
        }
    };

    let sse_frames = futures::stream::iter([first])
        .chain(frames.filter_map(|item| async move {
            match item {
                Ok(frame) => Some(frame),
                // errors can only precede the first chunk; anything else
                // already terminated the producer
                Err(e) => {
                    warn!(error = %e, "Dropping trailing stream error");
                    None
                }
            }
        }))
        .map(move |frame| {
            let _ = &guard;
            frame_to_event(&frame)
        });

    Ok((
        [(header::CACHE_CONTROL, "no-cache")],
        Sse::new(sse_frames),
    )
        .into_response())
}

/// Serialize one frame as an SSE event
fn frame_to_event(frame: &StreamFrame) -> Result<Event, Infallible> {
    let payload = serde_json::to_string(frame).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to serialize stream frame");
        String::from("{}")
    });
    Ok(Event::default().data(payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_response_time() {
        assert_eq!(format_response_time(Duration::from_millis(42)), "00:00:00.042");
        assert_eq!(
            format_response_time(Duration::from_millis(61_500)),
            "00:01:01.500"
        );
        assert_eq!(
            format_response_time(Duration::from_secs(3_600) + Duration::from_millis(1)),
            "01:00:00.001"
        );
    }

    #[test]
    fn test_body_maps_to_request() {
        let body: ChatCompletionBody = serde_json::from_str(
            r#"{"messages":[{"role":"user","content":"hi"}],"model":"a/x","maxTokens":50}"#,
        )
        .unwrap();
        let request: ChatRequest = body.into();
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.model.as_deref(), Some("a/x"));
        assert_eq!(request.max_tokens, Some(50));
        assert_eq!(request.temperature, None);
    }

    #[test]
    fn test_reply_serializes_camel_case() {
        let reply = ChatCompletionReply {
            content: "hi".to_string(),
            model: "a/x".to_string(),
            tokens_used: 300,
            estimated_cost_usd: "0.0005".parse().unwrap(),
            response_time: "00:00:00.042".to_string(),
        };
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["tokensUsed"], 300);
        assert_eq!(json["estimatedCostUsd"], "0.0005");
        assert_eq!(json["responseTime"], "00:00:00.042");
    }
}
