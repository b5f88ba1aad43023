//! Mock provider for testing
//!
//! Pops scripted outcomes off a queue and records every request it
//! receives. An exhausted queue answers with a canned completion.

use crate::completion::{
    ChatProvider, CompletionRequest, CompletionResponse, EventStream, StreamEvent, TokenUsage,
};
use crate::error::{Error, Result};
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;

/// One scripted provider outcome
enum Scripted {
    Completion(CompletionResponse),
    Failure(Error),
    Stream(Vec<Result<StreamEvent>>),
}

/// A scripted in-memory provider
pub struct MockProvider {
    outcomes: Arc<Mutex<VecDeque<Scripted>>>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
    healthy: AtomicBool,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    /// Create a mock with an empty script
    #[must_use]
    pub fn new() -> Self {
        Self {
            outcomes: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
            healthy: AtomicBool::new(true),
        }
    }

    /// Make subsequent health probes fail
    pub fn set_unhealthy(&self) {
        self.healthy.store(false, Ordering::SeqCst);
    }

    /// Queue a successful completion
    pub fn push_completion(&self, content: impl Into<String>, usage: Option<(u32, u32)>) {
        self.push(Scripted::Completion(CompletionResponse {
            content: content.into(),
            usage: usage.map(|(input_tokens, output_tokens)| TokenUsage {
                input_tokens,
                output_tokens,
            }),
        }));
    }

    /// Queue a failure
    pub fn push_failure(&self, error: Error) {
        self.push(Scripted::Failure(error));
    }

    /// Queue a stream of content deltas that ends cleanly
    pub fn push_stream(&self, chunks: &[&str]) {
        let events = chunks
            .iter()
            .map(|c| {
                Ok(StreamEvent {
                    content: (*c).to_string(),
                    usage: None,
                })
            })
            .collect();
        self.push(Scripted::Stream(events));
    }

    /// Queue a stream that yields `chunks` and then fails with `error`
    pub fn push_stream_then_failure(&self, chunks: &[&str], error: Error) {
        let mut events: Vec<Result<StreamEvent>> = chunks
            .iter()
            .map(|c| {
                Ok(StreamEvent {
                    content: (*c).to_string(),
                    usage: None,
                })
            })
            .collect();
        events.push(Err(error));
        self.push(Scripted::Stream(events));
    }

    /// Every request received so far, in order
    #[must_use]
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn push(&self, outcome: Scripted) {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(outcome);
    }

    fn pop(&self) -> Option<Scripted> {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    fn record(&self, request: &CompletionRequest) {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
    }
}

#[async_trait::async_trait]
impl ChatProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(
        &self,
        request: CompletionRequest,
        _cancel: &CancellationToken,
    ) -> Result<CompletionResponse> {
        self.record(&request);
        match self.pop() {
            Some(Scripted::Completion(response)) => Ok(response),
            Some(Scripted::Failure(error)) => Err(error),
            Some(Scripted::Stream(_)) => Err(Error::InvalidResponse(
                "scripted stream popped by unary call".to_string(),
            )),
            None => Ok(CompletionResponse {
                content: "mock response".to_string(),
                usage: None,
            }),
        }
    }

    async fn complete_stream(
        &self,
        request: CompletionRequest,
        _cancel: &CancellationToken,
    ) -> Result<EventStream> {
        self.record(&request);
        match self.pop() {
            Some(Scripted::Stream(events)) => Ok(futures::stream::iter(events).boxed()),
            Some(Scripted::Completion(response)) => {
                let event = StreamEvent {
                    content: response.content,
                    usage: response.usage,
                };
                Ok(futures::stream::iter(vec![Ok(event)]).boxed())
            }
            Some(Scripted::Failure(error)) => Err(error),
            None => Ok(futures::stream::iter(vec![Ok(StreamEvent {
                content: "mock response".to_string(),
                usage: None,
            })])
            .boxed()),
        }
    }

    async fn health_check(&self) -> Result<()> {
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::Network("scripted unhealthy".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ChatMessage;
    use crate::model::ModelId;
    use futures::StreamExt;

    fn request() -> CompletionRequest {
        CompletionRequest {
            model: ModelId::new("mock/model").unwrap(),
            messages: vec![ChatMessage::user("hi")],
            temperature: 0.7,
            max_tokens: 100,
        }
    }

    #[tokio::test]
    async fn test_scripted_order() {
        let mock = MockProvider::new();
        mock.push_completion("first", None);
        mock.push_failure(Error::Timeout(100));

        let cancel = CancellationToken::new();
        let first = mock.complete(request(), &cancel).await.unwrap();
        assert_eq!(first.content, "first");

        let second = mock.complete(request(), &cancel).await;
        assert!(matches!(second, Err(Error::Timeout(100))));

        assert_eq!(mock.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_scripted_health() {
        let mock = MockProvider::new();
        assert!(mock.health_check().await.is_ok());

        mock.set_unhealthy();
        assert!(mock.health_check().await.is_err());
    }

    #[tokio::test]
    async fn test_scripted_stream() {
        let mock = MockProvider::new();
        mock.push_stream(&["he", "llo"]);

        let cancel = CancellationToken::new();
        let stream = mock.complete_stream(request(), &cancel).await.unwrap();
        let events: Vec<_> = stream.collect().await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].as_ref().unwrap().content, "he");
        assert_eq!(events[1].as_ref().unwrap().content, "llo");
    }
}
