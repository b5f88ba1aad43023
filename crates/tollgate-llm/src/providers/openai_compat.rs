//! OpenAI-compatible chat-completions provider
//!
//! Speaks the `/chat/completions` wire format over a shared pooled reqwest
//! client: JSON for unary calls, `data:`-framed SSE lines for streaming.
//! Works against any endpoint that accepts OpenAI-style bodies and
//! `"<provider>/<model>"` ids (OpenRouter and friends).

use crate::completion::{
    ChatProvider, CompletionRequest, CompletionResponse, EventStream, StreamEvent, TokenUsage,
};
use crate::config::UpstreamConfig;
use crate::error::{Error, Result};
use crate::util::truncate_safe;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

/// SSE terminator sent by OpenAI-compatible endpoints
const DONE_SENTINEL: &str = "[DONE]";

/// Events buffered between the SSE reader task and the consumer
const EVENT_BUFFER: usize = 64;

/// Longest upstream error body echoed into an error message
const MAX_ERROR_BODY: usize = 300;

/// Sanitize upstream error text before it can reach logs or clients
fn sanitize_api_error(error: &str) -> String {
    let lower = error.to_lowercase();

    if lower.contains("api key")
        || lower.contains("apikey")
        || lower.contains("authorization")
        || lower.contains("unauthorized")
        || lower.contains("authentication")
        || lower.contains("bearer")
    {
        return "API authentication error. Please check your API key configuration.".to_string();
    }

    if lower.contains("rate limit") || lower.contains("quota") || lower.contains("overloaded") {
        return "API rate limit exceeded. Please try again later.".to_string();
    }

    if error.len() > MAX_ERROR_BODY {
        format!("{}...(truncated)", truncate_safe(error, MAX_ERROR_BODY))
    } else {
        error.to_string()
    }
}

/// Configuration for the OpenAI-compatible provider
#[derive(Debug, Clone)]
pub struct OpenAiCompatConfig {
    /// Connection settings
    pub upstream: UpstreamConfig,
    /// Provider display name
    pub provider_name: String,
}

impl OpenAiCompatConfig {
    /// Create a config with the default provider name
    #[must_use]
    pub fn new(upstream: UpstreamConfig) -> Self {
        Self {
            upstream,
            provider_name: "openai".to_string(),
        }
    }

    /// Override the provider display name
    #[must_use]
    pub fn with_provider_name(mut self, name: impl Into<String>) -> Self {
        self.provider_name = name.into();
        self
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<WireStreamOptions>,
}

#[derive(Debug, Serialize)]
struct WireStreamOptions {
    include_usage: bool,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct WireChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireStreamChoice {
    delta: WireDelta,
}

#[derive(Debug, Deserialize)]
struct WireStreamChunk {
    #[serde(default)]
    choices: Vec<WireStreamChoice>,
    usage: Option<WireUsage>,
}

impl From<WireUsage> for TokenUsage {
    fn from(usage: WireUsage) -> Self {
        Self {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        }
    }
}

// ============================================================================
// Provider
// ============================================================================

/// OpenAI-compatible provider over a pooled HTTP client
pub struct OpenAiCompatProvider {
    client: reqwest::Client,
    config: OpenAiCompatConfig,
}

impl OpenAiCompatProvider {
    /// Create a provider; builds the shared pooled client from the
    /// connection settings
    pub fn new(config: OpenAiCompatConfig) -> Result<Self> {
        let client = config.upstream.build_client()?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.upstream.base_url.trim_end_matches('/')
        )
    }

    fn wire_request<'a>(request: &'a CompletionRequest, stream: bool) -> WireRequest<'a> {
        WireRequest {
            model: request.model.as_str(),
            messages: request
                .messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream,
            stream_options: stream.then_some(WireStreamOptions {
                include_usage: true,
            }),
        }
    }

    fn transport_error(error: reqwest::Error, timeout_ms: u64) -> Error {
        if error.is_timeout() {
            Error::Timeout(timeout_ms)
        } else {
            Error::Network(error.to_string())
        }
    }

    /// Issue the POST and fail early on non-2xx statuses
    async fn send(
        &self,
        request: &CompletionRequest,
        stream: bool,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response> {
        let body = Self::wire_request(request, stream);
        let call = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.upstream.api_key)
            .json(&body)
            .send();

        let response = tokio::select! {
            () = cancel.cancelled() => return Err(Error::Cancelled),
            result = call => result
                .map_err(|e| Self::transport_error(e, self.config.upstream.timeout_secs * 1000))?,
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                message: sanitize_api_error(&body),
            });
        }
        Ok(response)
    }
}

#[async_trait::async_trait]
impl ChatProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.config.provider_name
    }

    #[instrument(skip(self, request, cancel), fields(model = %request.model))]
    async fn complete(
        &self,
        request: CompletionRequest,
        cancel: &CancellationToken,
    ) -> Result<CompletionResponse> {
        let response = self.send(&request, false, cancel).await?;

        let parsed: WireResponse = tokio::select! {
            () = cancel.cancelled() => return Err(Error::Cancelled),
            body = response.json() => body.map_err(|e| Error::InvalidResponse(e.to_string()))?,
        };

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        debug!(chars = content.len(), "Upstream completion received");

        Ok(CompletionResponse {
            content,
            usage: parsed.usage.map(TokenUsage::from),
        })
    }

    #[instrument(skip(self, request, cancel), fields(model = %request.model))]
    async fn complete_stream(
        &self,
        request: CompletionRequest,
        cancel: &CancellationToken,
    ) -> Result<EventStream> {
        let response = self.send(&request, true, cancel).await?;

        let bytes = response.bytes_stream().map(|r| r.map_err(std::io::Error::other));
        let reader = tokio::io::BufReader::new(StreamReader::new(bytes));

        let (tx, rx) = mpsc::channel::<Result<StreamEvent>>(EVENT_BUFFER);
        let cancel = cancel.clone();
        tokio::spawn(read_sse_lines(reader, tx, cancel));

        Ok(ReceiverStream::new(rx).boxed())
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<()> {
        let url = format!(
            "{}/models",
            self.config.upstream.base_url.trim_end_matches('/')
        );
        let timeout = self.config.upstream.health_timeout();
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.config.upstream.api_key)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| Self::transport_error(e, timeout.as_millis() as u64))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                message: sanitize_api_error(&body),
            });
        }
        Ok(())
    }
}

/// Reader task: turn `data:` SSE lines into [`StreamEvent`]s
async fn read_sse_lines<R>(
    reader: tokio::io::BufReader<R>,
    tx: mpsc::Sender<Result<StreamEvent>>,
    cancel: CancellationToken,
) where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut lines = reader.lines();

    loop {
        let line = tokio::select! {
            () = cancel.cancelled() => {
                let _ = tx.send(Err(Error::Cancelled)).await;
                return;
            }
            line = lines.next_line() => line,
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => return,
            Err(e) => {
                let _ = tx.send(Err(Error::Network(e.to_string()))).await;
                return;
            }
        };

        let Some(payload) = line.strip_prefix("data:").map(str::trim) else {
            // comments, blank keep-alive lines, event names
            continue;
        };
        if payload == DONE_SENTINEL {
            return;
        }

        match serde_json::from_str::<WireStreamChunk>(payload) {
            Ok(chunk) => {
                let content = chunk
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.delta.content)
                    .unwrap_or_default();
                let event = StreamEvent {
                    content,
                    usage: chunk.usage.map(TokenUsage::from),
                };
                if tx.send(Ok(event)).await.is_err() {
                    return;
                }
            }
            Err(e) => {
                warn!(error = %e, "Unparseable SSE payload");
                let _ = tx
                    .send(Err(Error::InvalidResponse(e.to_string())))
                    .await;
                return;
            }
        }
    }
}
