//! Resilient model client.
//!
//! Wraps a [`ChatProvider`] with the reliability layer: circuit breaker
//! admission per attempt, retry with exponential backoff for transient
//! failures, and heartbeat injection on streams. Permanent provider errors
//! (auth, invalid request) fail fast without retrying.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error, warn};

use fireside_core::{defaults, Error, Result};

use crate::breaker::CircuitBreaker;
use crate::heartbeat::with_heartbeats;
use crate::provider::{
    ChatProvider, ChunkStream, Completion, CompletionRequest, StreamChunk, TokenUsage,
};
use crate::retry::{retry_after, RetryPolicy};

/// Chat client with retries, circuit breaking, and stream heartbeats.
#[derive(Clone)]
pub struct ModelClient {
    provider: Arc<dyn ChatProvider>,
    breaker: Arc<CircuitBreaker>,
    retry: RetryPolicy,
    heartbeat_interval: Duration,
}

impl ModelClient {
    pub fn new(provider: Arc<dyn ChatProvider>) -> Self {
        Self {
            provider,
            breaker: Arc::new(CircuitBreaker::default()),
            retry: RetryPolicy::default(),
            heartbeat_interval: Duration::from_secs(defaults::HEARTBEAT_INTERVAL_SECS),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.breaker = breaker;
        self
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// The shared breaker, for observing state in callers and tests.
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Run a completion with breaker admission and retry.
    ///
    /// Each attempt asks the breaker first, so a circuit opening between
    /// attempts stops the retry loop immediately.
    pub async fn complete(&self, req: &CompletionRequest) -> Result<Completion> {
        let started = Instant::now();
        let mut last_err: Option<Error> = None;

        for attempt in 0..self.retry.max_attempts {
            self.breaker.try_acquire()?;

            match self.provider.complete(req).await {
                Ok(completion) => {
                    self.breaker.record_success();
                    debug!(
                        model = %req.model,
                        attempt,
                        duration_ms = started.elapsed().as_millis() as u64,
                        "Completion succeeded"
                    );
                    return Ok(completion);
                }
                Err(err) if err.is_transient() => {
                    self.breaker.record_failure();
                    let wait = self.retry.backoff(attempt, retry_after(&err));
                    warn!(
                        model = %req.model,
                        attempt,
                        error = %err,
                        backoff_ms = wait.as_millis() as u64,
                        "Transient provider failure"
                    );
                    last_err = Some(err);
                    if attempt + 1 < self.retry.max_attempts {
                        tokio::time::sleep(wait).await;
                    }
                }
                Err(err) => {
                    // The provider responded; the service is up even though
                    // this request can never succeed.
                    self.breaker.record_success();
                    error!(
                        model = %req.model,
                        error = %err,
                        "Permanent provider failure, not retrying"
                    );
                    return Err(err);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| Error::Internal("retry loop without attempts".to_string())))
    }

    /// Open a streaming completion, with heartbeats injected during
    /// provider silence. Streams are not retried; a failed open counts
    /// against the breaker and surfaces to the caller.
    pub async fn stream(&self, req: &CompletionRequest) -> Result<ChunkStream> {
        self.breaker.try_acquire()?;

        match self.provider.stream(req).await {
            Ok(stream) => {
                self.breaker.record_success();
                Ok(with_heartbeats(stream, self.heartbeat_interval))
            }
            Err(err) => {
                if err.is_transient() {
                    self.breaker.record_failure();
                } else {
                    self.breaker.record_success();
                }
                warn!(
                    model = %req.model,
                    error = %err,
                    "Failed to open completion stream"
                );
                Err(err)
            }
        }
    }
}

/// Drain a chunk stream into the full text and final usage.
///
/// Heartbeats are dropped. The first stream error aborts collection.
pub async fn collect(mut stream: ChunkStream) -> Result<(String, Option<TokenUsage>)> {
    use futures::StreamExt;

    let mut text = String::new();
    let mut usage = None;
    while let Some(chunk) = stream.next().await {
        match chunk? {
            StreamChunk::Delta(delta) => text.push_str(&delta),
            StreamChunk::Heartbeat => {}
            StreamChunk::Done(u) => {
                usage = u;
                break;
            }
        }
    }
    Ok((text, usage))
}
