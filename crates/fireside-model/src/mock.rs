//! Mock chat provider for deterministic testing.
//!
//! Implements [`ChatProvider`] with scripted outcomes: a default reply,
//! an optional queue of per-call outcomes (replies or failures), simulated
//! latency, and a call log for assertions.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let provider = MockChatProvider::new()
//!     .with_default_response(r#"{"text":"You've got this.","tone":"supportive","confidence":0.9}"#)
//!     .with_latency(Duration::from_millis(50));
//!
//! let completion = provider.complete(&request).await.unwrap();
//! assert_eq!(provider.call_count(), 1);
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream;

use fireside_core::{Error, ProviderErrorKind, Result};

use crate::provider::{
    ChatProvider, ChunkStream, Completion, CompletionRequest, StreamChunk, TokenUsage,
};

/// Scripted outcome for one call.
#[derive(Debug, Clone)]
pub enum MockOutcome {
    /// Return this text as the completion.
    Reply(String),
    /// Fail with this provider error kind.
    Fail(ProviderErrorKind),
}

/// One logged call, for assertions.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub model: String,
    pub prompt: String,
    pub streamed: bool,
}

#[derive(Default)]
struct MockInner {
    default_response: Mutex<String>,
    outcomes: Mutex<VecDeque<MockOutcome>>,
    latency: Mutex<Option<Duration>>,
    calls: Mutex<Vec<MockCall>>,
    started: AtomicUsize,
    completed: AtomicUsize,
}

/// Mock chat provider with scripted outcomes and a call log.
#[derive(Clone, Default)]
pub struct MockChatProvider {
    inner: Arc<MockInner>,
}

impl MockChatProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the reply used when the outcome queue is empty.
    pub fn with_default_response(self, response: impl Into<String>) -> Self {
        *self.inner.default_response.lock().unwrap() = response.into();
        self
    }

    /// Queue an outcome for the next call; queued outcomes are consumed
    /// in order before falling back to the default response.
    pub fn with_outcome(self, outcome: MockOutcome) -> Self {
        self.inner.outcomes.lock().unwrap().push_back(outcome);
        self
    }

    /// Queue a failure for the next call.
    pub fn with_failure(self, kind: ProviderErrorKind) -> Self {
        self.with_outcome(MockOutcome::Fail(kind))
    }

    /// Set simulated latency for every call.
    pub fn with_latency(self, latency: Duration) -> Self {
        *self.inner.latency.lock().unwrap() = Some(latency);
        self
    }

    /// All logged calls.
    pub fn calls(&self) -> Vec<MockCall> {
        self.inner.calls.lock().unwrap().clone()
    }

    /// Number of calls made (streaming and non-streaming).
    pub fn call_count(&self) -> usize {
        self.inner.calls.lock().unwrap().len()
    }

    /// Calls that have begun (including ones still sleeping on latency).
    pub fn started_count(&self) -> usize {
        self.inner.started.load(Ordering::SeqCst)
    }

    /// Calls that ran to completion (not cancelled mid-latency).
    pub fn completed_count(&self) -> usize {
        self.inner.completed.load(Ordering::SeqCst)
    }

    fn log_call(&self, req: &CompletionRequest, streamed: bool) {
        self.inner.calls.lock().unwrap().push(MockCall {
            model: req.model.clone(),
            prompt: req.prompt_text(),
            streamed,
        });
    }

    fn next_outcome(&self) -> MockOutcome {
        self.inner
            .outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                MockOutcome::Reply(self.inner.default_response.lock().unwrap().clone())
            })
    }

    async fn run(&self, req: &CompletionRequest, streamed: bool) -> Result<String> {
        self.inner.started.fetch_add(1, Ordering::SeqCst);
        self.log_call(req, streamed);

        let latency = *self.inner.latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        self.inner.completed.fetch_add(1, Ordering::SeqCst);

        match self.next_outcome() {
            MockOutcome::Reply(text) => Ok(text),
            MockOutcome::Fail(kind) => Err(Error::provider(kind, "scripted failure")),
        }
    }

    fn usage_for(text: &str) -> TokenUsage {
        TokenUsage {
            prompt_tokens: 20,
            completion_tokens: (text.len() / 4) as u32 + 1,
        }
    }
}

#[async_trait]
impl ChatProvider for MockChatProvider {
    async fn complete(&self, req: &CompletionRequest) -> Result<Completion> {
        let text = self.run(req, false).await?;
        let usage = Self::usage_for(&text);
        Ok(Completion {
            text,
            model: req.model.clone(),
            usage: Some(usage),
        })
    }

    async fn stream(&self, req: &CompletionRequest) -> Result<ChunkStream> {
        let text = self.run(req, true).await?;
        let usage = Self::usage_for(&text);

        // Word-by-word deltas, then a final Done carrying usage
        let mut chunks: Vec<Result<StreamChunk>> = Vec::new();
        let words: Vec<&str> = text.split_inclusive(' ').collect();
        for word in words {
            chunks.push(Ok(StreamChunk::Delta(word.to_string())));
        }
        chunks.push(Ok(StreamChunk::Done(Some(usage))));

        Ok(Box::pin(stream::iter(chunks)))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
