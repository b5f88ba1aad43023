//! Streaming pipeline
//!
//! The streaming variant of the orchestration pipeline: a producer task
//! drives the attempt loop, forwarding upstream content chunks into a
//! bounded channel the moment they arrive. The consumer (the HTTP response
//! writer) sets the pace; a slow consumer stalls the producer end to end.
//!
//! Fallback is only allowed while nothing has been emitted — once the
//! caller has seen partial content bound to one model, a failure terminates
//! the stream without a completion frame.

use crate::cost::CostAmount;
use crate::error::{Error, Result};
use crate::model::ModelId;
use crate::orchestrator::ChatOrchestrator;
use crate::request::ChatRequest;
use crate::token::TokenCount;
use futures::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

/// Frames buffered between producer and consumer
const FRAME_BUFFER: usize = 32;

/// Aggregate metadata carried by the final frame of a stream.
///
/// `total_tokens` is the number of non-empty chunks the stream emitted —
/// a deliberate proxy, kept even when the upstream reports exact usage on
/// its final event. The router's chars/4 estimate stands in for input
/// tokens on the accounting side.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamMetadata {
    /// Model that produced the stream
    pub model: ModelId,
    /// Emitted chunk count
    pub total_tokens: u32,
    /// Wall-clock duration of the whole stream
    pub response_time_ms: u64,
    /// Chunk throughput
    pub avg_tokens_per_second: f64,
    /// Estimated cost as accounted
    pub estimated_cost: CostAmount,
    /// Provider display name
    pub provider: String,
}

/// One element of the outbound stream
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamFrame {
    /// A content delta, forwarded in upstream order
    Chunk {
        /// Delta text
        content: String,
    },
    /// The single final frame after a clean stream
    Complete {
        /// Aggregate stream metadata
        metadata: StreamMetadata,
    },
}

/// Outbound frame stream handed to the transport
pub type FrameStream = ReceiverStream<Result<StreamFrame>>;

/// What to do with an attempt that failed transiently
enum AttemptFate {
    Roll(ModelId),
    Fail(Error),
}

impl ChatOrchestrator {
    /// Execute one streaming chat request.
    ///
    /// Validation and routing failures surface immediately as `Err` so the
    /// transport can still answer with a status code. After that, failures
    /// travel in-band: an `Err` item before any chunk, or — once content
    /// has flowed — a stream that ends without a `Complete` frame.
    #[instrument(skip(self, request, cancel), fields(messages = request.messages.len()))]
    pub fn execute_stream(
        self: &Arc<Self>,
        request: ChatRequest,
        cancel: CancellationToken,
    ) -> Result<FrameStream> {
        request.validate()?;

        let estimate = TokenCount::from_messages(&request.messages);
        let initial = self.router.select(estimate, request.requested_model())?;

        let (tx, rx) = mpsc::channel(FRAME_BUFFER);
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            orchestrator
                .stream_attempts(request, initial, estimate, cancel, tx)
                .await;
        });

        Ok(ReceiverStream::new(rx))
    }

    /// Producer side of the streaming pipeline
    async fn stream_attempts(
        &self,
        request: ChatRequest,
        initial: ModelId,
        estimate: TokenCount,
        cancel: CancellationToken,
        tx: mpsc::Sender<Result<StreamFrame>>,
    ) {
        let started = Instant::now();
        let mut current = initial;
        let mut attempts: u32 = 0;
        let mut attempted: Vec<ModelId> = Vec::new();

        'attempts: loop {
            attempts += 1;
            attempted.push(current.clone());

            let completion = self.attempt_request(&request, &current);
            let opened = self
                .resilience
                .execute(current.provider(), &cancel, || {
                    let completion = completion.clone();
                    let cancel = cancel.clone();
                    async move { self.provider.complete_stream(completion, &cancel).await }
                })
                .await;

            let mut upstream = match opened {
                Ok(stream) => stream,
                Err(Error::Cancelled) => return,
                Err(e) if e.is_transient() => {
                    match self.transient_fate(attempts, &current, &attempted) {
                        AttemptFate::Roll(next) => {
                            debug!(from = %current, to = %next, "Stream open failed, falling back");
                            current = next;
                            continue 'attempts;
                        }
                        AttemptFate::Fail(e) => {
                            let _ = tx.send(Err(e)).await;
                            return;
                        }
                    }
                }
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            };

            let mut chunks_emitted: u32 = 0;
            loop {
                let event = tokio::select! {
                    () = cancel.cancelled() => return,
                    event = upstream.next() => event,
                };

                match event {
                    Some(Ok(event)) => {
                        if event.content.is_empty() {
                            continue;
                        }
                        chunks_emitted += 1;
                        let frame = StreamFrame::Chunk {
                            content: event.content,
                        };
                        if tx.send(Ok(frame)).await.is_err() {
                            // consumer hung up
                            return;
                        }
                    }
                    Some(Err(Error::Cancelled)) => return,
                    Some(Err(e)) => {
                        self.resilience.breaker_for(current.provider()).record_failure();
                        if chunks_emitted == 0 && e.is_transient() {
                            match self.transient_fate(attempts, &current, &attempted) {
                                AttemptFate::Roll(next) => {
                                    debug!(from = %current, to = %next, "Stream failed before first chunk, falling back");
                                    current = next;
                                    continue 'attempts;
                                }
                                AttemptFate::Fail(e) => {
                                    let _ = tx.send(Err(e)).await;
                                    return;
                                }
                            }
                        }
                        if chunks_emitted == 0 {
                            let _ = tx.send(Err(e)).await;
                        } else {
                            // partial content already delivered; no fallback,
                            // no completion frame
                            warn!(
                                model = %current,
                                chunks = chunks_emitted,
                                error = %e,
                                "Mid-stream failure, closing stream"
                            );
                        }
                        return;
                    }
                    None => {
                        if chunks_emitted == 0 {
                            // a stream that ended without content is a
                            // transient failure of this attempt
                            warn!(model = %current, attempt = attempts, "Upstream stream was empty");
                            match self.transient_fate(attempts, &current, &attempted) {
                                AttemptFate::Roll(next) => {
                                    current = next;
                                    continue 'attempts;
                                }
                                AttemptFate::Fail(e) => {
                                    let _ = tx.send(Err(e)).await;
                                    return;
                                }
                            }
                        }

                        let response_time = started.elapsed();
                        let cost = self
                            .accountant
                            .track(
                                &current,
                                estimate,
                                TokenCount::new(chunks_emitted),
                                current.provider(),
                                response_time,
                                attempts > 1,
                            )
                            .await;

                        let response_time_ms = response_time.as_millis() as u64;
                        let metadata = StreamMetadata {
                            total_tokens: chunks_emitted,
                            response_time_ms,
                            avg_tokens_per_second: f64::from(chunks_emitted) * 1000.0
                                / response_time_ms.max(1) as f64,
                            estimated_cost: cost,
                            provider: current.provider().to_string(),
                            model: current,
                        };
                        let _ = tx.send(Ok(StreamFrame::Complete { metadata })).await;
                        return;
                    }
                }
            }
        }
    }

    fn transient_fate(
        &self,
        attempts: u32,
        current: &ModelId,
        attempted: &[ModelId],
    ) -> AttemptFate {
        if attempts >= self.config.max_attempts {
            return AttemptFate::Fail(Error::AllProvidersFailed(
                attempted.iter().map(ModelId::to_string).collect(),
            ));
        }
        match self.fallback.next(current, attempted) {
            Ok(next) => AttemptFate::Roll(next),
            Err(e) => AttemptFate::Fail(e),
        }
    }
}
