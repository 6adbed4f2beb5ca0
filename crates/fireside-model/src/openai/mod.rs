//! OpenAI-compatible chat backend.
//!
//! Speaks the `/chat/completions` wire format, which most hosted providers
//! and gateways accept. Maps HTTP failures onto the provider error taxonomy
//! so the client's retry policy and circuit breaker can classify them.

mod sse;
mod types;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, info};

use fireside_core::{defaults, Error, ProviderErrorKind, Result};

use crate::provider::{
    ChatProvider, ChunkStream, Completion, CompletionRequest, TokenUsage,
};
use types::{ApiMessage, ChatCompletionRequest, ChatCompletionResponse};

/// Configuration for the OpenAI-compatible backend.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Base URL for the API endpoint.
    pub base_url: String,
    /// API key (None for local/unauthenticated endpoints).
    pub api_key: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::PROVIDER_BASE_URL.to_string(),
            api_key: None,
            timeout_secs: defaults::PROVIDER_TIMEOUT_SECS,
        }
    }
}

impl OpenAiConfig {
    /// Load from environment variables with defaults.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `FIRESIDE_PROVIDER_BASE_URL` | `https://api.openai.com/v1` |
    /// | `FIRESIDE_PROVIDER_API_KEY` | unset |
    /// | `FIRESIDE_PROVIDER_TIMEOUT_SECS` | `60` |
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("FIRESIDE_PROVIDER_BASE_URL")
                .unwrap_or_else(|_| defaults::PROVIDER_BASE_URL.to_string()),
            api_key: std::env::var("FIRESIDE_PROVIDER_API_KEY").ok(),
            timeout_secs: std::env::var("FIRESIDE_PROVIDER_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults::PROVIDER_TIMEOUT_SECS),
        }
    }
}

/// OpenAI-compatible chat provider.
pub struct OpenAiChatProvider {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiChatProvider {
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {e}")))?;

        info!(
            base_url = %config.base_url,
            timeout_secs = config.timeout_secs,
            "Initializing OpenAI-compatible chat provider"
        );

        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(OpenAiConfig::from_env())
    }

    fn build_request(&self, req: &CompletionRequest, stream: bool) -> reqwest::RequestBuilder {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let body = ChatCompletionRequest {
            model: req.model.clone(),
            messages: req.messages.iter().map(ApiMessage::from).collect(),
            max_tokens: req.max_tokens,
            temperature: req.temperature,
            stream,
        };
        let mut builder = self.client.post(&url).json(&body);
        if let Some(key) = &self.config.api_key {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }
        builder
    }
}

#[async_trait]
impl ChatProvider for OpenAiChatProvider {
    async fn complete(&self, req: &CompletionRequest) -> Result<Completion> {
        debug!(model = %req.model, messages = req.messages.len(), "Chat completion request");

        let resp = self
            .build_request(req, false)
            .send()
            .await
            .map_err(map_transport_err)?;

        let status = resp.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(&resp);
            let body = resp.text().await.unwrap_or_default();
            return Err(map_status_err(status, retry_after, &body));
        }

        let parsed: ChatCompletionResponse = resp
            .json()
            .await
            .map_err(|e| Error::MalformedResponse(format!("invalid completion body: {e}")))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        Ok(Completion {
            text,
            model: parsed.model.unwrap_or_else(|| req.model.clone()),
            usage: parsed.usage.map(TokenUsage::from),
        })
    }

    async fn stream(&self, req: &CompletionRequest) -> Result<ChunkStream> {
        debug!(model = %req.model, "Chat completion stream request");

        let resp = self
            .build_request(req, true)
            .send()
            .await
            .map_err(map_transport_err)?;

        let status = resp.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(&resp);
            let body = resp.text().await.unwrap_or_default();
            return Err(map_status_err(status, retry_after, &body));
        }

        Ok(sse::parse_sse_stream(resp.bytes_stream()))
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

/// Map a reqwest transport failure to the provider taxonomy.
pub(crate) fn map_transport_err(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::provider(ProviderErrorKind::Timeout, e.to_string())
    } else {
        Error::provider(ProviderErrorKind::Network, e.to_string())
    }
}

fn parse_retry_after(resp: &reqwest::Response) -> Option<u64> {
    resp.headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
}

fn map_status_err(status: StatusCode, retry_after: Option<u64>, body: &str) -> Error {
    let message = format!("HTTP {}: {}", status.as_u16(), truncate(body, 200));
    let kind = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderErrorKind::Auth,
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            ProviderErrorKind::InvalidRequest
        }
        StatusCode::TOO_MANY_REQUESTS => ProviderErrorKind::RateLimited {
            retry_after_secs: retry_after,
        },
        s if s.is_server_error() => ProviderErrorKind::Server,
        _ => ProviderErrorKind::Network,
    };
    Error::provider(kind, message)
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
