//! Error types for the Fireside persona engine.

use thiserror::Error;
use uuid::Uuid;

/// Result type alias using Fireside's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Classification of LLM provider failures.
///
/// Drives the retry policy: transient kinds are retried with backoff,
/// permanent kinds escalate straight to the fallback path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// Request exceeded its deadline.
    Timeout,
    /// Provider returned 429. Carries the server-suggested retry delay when present.
    RateLimited { retry_after_secs: Option<u64> },
    /// Provider returned a 5xx status.
    Server,
    /// Connection-level failure (DNS, refused, reset).
    Network,
    /// Authentication or authorization rejected (401/403). Configuration problem.
    Auth,
    /// Provider rejected the request shape (400). Not retryable.
    InvalidRequest,
}

impl ProviderErrorKind {
    /// Transient failures are worth retrying; permanent ones are not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::RateLimited { .. } | Self::Server | Self::Network
        )
    }
}

impl std::fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::RateLimited { .. } => write!(f, "rate_limited"),
            Self::Server => write!(f, "server"),
            Self::Network => write!(f, "network"),
            Self::Auth => write!(f, "auth"),
            Self::InvalidRequest => write!(f, "invalid_request"),
        }
    }
}

/// Core error type for Fireside engine operations.
#[derive(Error, Debug)]
pub enum Error {
    /// LLM provider call failed.
    #[error("Provider error ({kind}): {message}")]
    Provider {
        kind: ProviderErrorKind,
        message: String,
    },

    /// Circuit breaker is open; the call was short-circuited without a network attempt.
    #[error("Circuit breaker open, retry eligible in {retry_in_secs}s")]
    CircuitOpen { retry_in_secs: u64 },

    /// CostGuard denied the call. A business decision, not a fault; always
    /// resolved via fallback, never surfaced to the end user as an error.
    #[error("Budget denied: {0}")]
    BudgetDenied(String),

    /// Model output contained no usable text.
    #[error("Malformed model response: {0}")]
    MalformedResponse(String),

    /// External store (journal, profile, insights, budget) operation failed.
    #[error("Store error: {0}")]
    Store(String),

    /// Journal entry not found.
    #[error("Journal entry not found: {0}")]
    EntryNotFound(Uuid),

    /// User profile not found.
    #[error("User profile not found: {0}")]
    UserNotFound(Uuid),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Construct a provider error.
    pub fn provider(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Error::Provider {
            kind,
            message: message.into(),
        }
    }

    /// True if retrying this error may succeed.
    ///
    /// `CircuitOpen` is deliberately not transient: the breaker exists to stop
    /// retries, so callers must go straight to fallback.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Provider { kind, .. } => kind.is_transient(),
            _ => false,
        }
    }

    /// True for provider errors that indicate a configuration problem
    /// (auth failure, malformed request) rather than transient load.
    pub fn is_permanent_provider(&self) -> bool {
        matches!(
            self,
            Error::Provider {
                kind: ProviderErrorKind::Auth | ProviderErrorKind::InvalidRequest,
                ..
            }
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
