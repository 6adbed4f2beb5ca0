//! Model client layer for Fireside.
//!
//! Everything between the engine and the LLM provider lives here: the
//! [`ChatProvider`] trait and its OpenAI-compatible implementation, prompt
//! assembly with context budgeting, and the reliability wrapper
//! ([`ModelClient`]) that adds retries, circuit breaking, and stream
//! heartbeats. A scripted [`mock::MockChatProvider`] backs deterministic
//! tests throughout the workspace.

pub mod breaker;
pub mod client;
pub mod heartbeat;
pub mod mock;
pub mod openai;
pub mod prompt;
pub mod provider;
pub mod retry;

pub use breaker::{BreakerConfig, BreakerStatus, CircuitBreaker};
pub use client::{collect, ModelClient};
pub use openai::{OpenAiChatProvider, OpenAiConfig};
pub use prompt::PromptBuilder;
pub use provider::{
    ChatMessage, ChatProvider, ChunkStream, Completion, CompletionRequest, Role, StreamChunk,
    TokenUsage,
};
pub use retry::RetryPolicy;
