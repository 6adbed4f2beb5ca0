//! Chat provider abstraction.
//!
//! The [`ChatProvider`] trait is the seam between the model client (retry,
//! breaker, heartbeats) and a concrete backend. Production uses the
//! OpenAI-compatible backend; tests use [`crate::mock::MockChatProvider`].

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use fireside_core::Result;

/// Message role in a chat completion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One message in a chat completion request.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A completion request, already resolved to a concrete model name.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            max_tokens: None,
            temperature: None,
        }
    }

    /// Concatenated text of every message; used for token estimation.
    pub fn prompt_text(&self) -> String {
        self.messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Token usage reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// A finished (non-streaming) completion.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub model: String,
    pub usage: Option<TokenUsage>,
}

/// One event in a streaming completion.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    /// Incremental text.
    Delta(String),
    /// "Still typing" marker injected when the provider is silent.
    Heartbeat,
    /// End of stream, with usage when the provider reported it.
    Done(Option<TokenUsage>),
}

/// Lazy, finite, cancellable sequence of stream chunks. Cancelled by
/// dropping it — the underlying request is abandoned with it.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send>>;

/// Backend that can execute chat completions, blocking or streaming.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Execute a blocking completion.
    async fn complete(&self, req: &CompletionRequest) -> Result<Completion>;

    /// Open a streaming completion.
    async fn stream(&self, req: &CompletionRequest) -> Result<ChunkStream>;

    /// Provider name for logging.
    fn name(&self) -> &'static str;
}
