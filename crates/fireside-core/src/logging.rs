//! Structured logging schema and field name constants for Fireside.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation tools can query by standardized field names across
//! every subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service (auth failures, permanent provider errors) |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events, entry-level completions |
//! | DEBUG | Decision points (selection scores, budget decisions, retries) |
//! | TRACE | Per-chunk stream data |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "engine", "model", "costguard"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "selector", "orchestrator", "breaker", "openai"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "select", "authorize", "complete", "respond"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Journal entry UUID being responded to.
pub const ENTRY_ID: &str = "entry_id";

/// User UUID the entry belongs to.
pub const USER_ID: &str = "user_id";

/// Persona kind handling the pipeline.
pub const PERSONA: &str = "persona";

/// Effective model tier after any CostGuard downgrade.
pub const MODEL_TIER: &str = "model_tier";

/// Model name used for the call.
pub const MODEL: &str = "model";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Tokens optimistically reserved before a call.
pub const TOKENS_RESERVED: &str = "tokens_reserved";

/// Actual tokens reported by the provider after a call.
pub const TOKENS_ACTUAL: &str = "tokens_actual";

/// Relevance score assigned by the selector.
pub const RELEVANCE: &str = "relevance";

/// Number of personas selected for an entry.
pub const SELECTED_COUNT: &str = "selected_count";

/// Confidence score of a synthesized response.
pub const CONFIDENCE: &str = "confidence";

/// Retry attempt number (0-based).
pub const ATTEMPT: &str = "attempt";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// True when the response came from the fallback engine.
pub const FALLBACK: &str = "fallback";

/// True when a budget decision was made without a reachable budget store.
pub const FAIL_OPEN: &str = "fail_open";

/// Circuit breaker status at decision time ("closed", "open", "half_open").
pub const BREAKER_STATE: &str = "breaker_state";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

/// Slow operation threshold exceeded.
pub const SLOW: &str = "slow";
