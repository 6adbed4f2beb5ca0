//! Centralized default constants for the Fireside persona engine.
//!
//! **This module is the single source of truth** for all shared default
//! values. Every crate references these constants instead of defining its own
//! magic numbers. When adding new constants, place them in the appropriate
//! section and document the rationale for the chosen value.

// =============================================================================
// PERSONA SELECTION
// =============================================================================

/// Minimum relevance score for a persona to be selected. Below this the
/// persona stays silent for the entry — zero-selection is a valid outcome.
pub const RELEVANCE_THRESHOLD: f32 = 0.35;

/// Maximum recent entries considered when scoring, to bound scoring cost.
pub const MAX_HISTORY_ENTRIES: usize = 20;

/// Stagger added between successive selected personas' recommended delays
/// so replies do not arrive in a robotic burst.
pub const DELAY_STAGGER_SECS: u64 = 30;

// =============================================================================
// ORCHESTRATION
// =============================================================================

/// Maximum persona pipelines dispatched concurrently per entry.
pub const CONCURRENCY_CAP: usize = 4;

/// Independent timeout per persona model call. A timed-out call is treated
/// identically to a failed call (fallback for that persona only).
pub const PERSONA_CALL_TIMEOUT_SECS: u64 = 30;

/// Upper bound on the in-stream pacing pause. Recommended delays may be
/// hours; a live connection cannot sleep that long, so the stream clamps.
pub const PACING_CAP_SECS: u64 = 5;

/// Buffered capacity of the per-request response event channel.
pub const STREAM_BUFFER: usize = 32;

/// Engine event bus broadcast channel capacity.
pub const EVENT_BUS_CAPACITY: usize = 256;

// =============================================================================
// TOKEN ESTIMATION
// =============================================================================

/// Rough characters-per-token ratio used for budget estimates. Exact BPE
/// counts are not needed anywhere; reconciliation against the provider's
/// reported usage corrects the estimate after each call.
pub const CHARS_PER_TOKEN: usize = 4;

/// Completion-side token estimate reserved per persona call.
pub const COMPLETION_TOKEN_ESTIMATE: i64 = 400;

/// Prompt token budget for context assembly. Oldest history is dropped
/// first when over budget; the current entry is never truncated.
pub const PROMPT_TOKEN_BUDGET: usize = 3000;

// =============================================================================
// COST CAPS (per subscription tier)
// =============================================================================

pub const FREE_DAILY_TOKEN_CAP: i64 = 10_000;
pub const FREE_MONTHLY_TOKEN_CAP: i64 = 150_000;

pub const PLUS_DAILY_TOKEN_CAP: i64 = 50_000;
pub const PLUS_MONTHLY_TOKEN_CAP: i64 = 1_000_000;

pub const PREMIUM_DAILY_TOKEN_CAP: i64 = 200_000;
pub const PREMIUM_MONTHLY_TOKEN_CAP: i64 = 5_000_000;

/// Global daily token ceiling across all users — prevents runaway spend.
pub const GLOBAL_DAILY_TOKEN_CEILING: i64 = 5_000_000;

/// Fraction of the global ceiling at which downgrading starts.
pub const GLOBAL_SOFT_FRACTION: f32 = 0.8;

/// TTL of the last-known-good counter snapshot used to bound the fail-open
/// path during budget-store outages.
pub const BUDGET_SNAPSHOT_TTL_SECS: u64 = 60;

// =============================================================================
// MODEL CLIENT
// =============================================================================

/// Default provider endpoint (OpenAI-compatible).
pub const PROVIDER_BASE_URL: &str = "https://api.openai.com/v1";

/// Provider HTTP timeout in seconds.
pub const PROVIDER_TIMEOUT_SECS: u64 = 60;

/// Model name for the economy tier.
pub const MODEL_ECONOMY: &str = "gpt-4o-mini";

/// Model name for the standard tier.
pub const MODEL_STANDARD: &str = "gpt-4o";

/// Model name for the premium tier.
pub const MODEL_PREMIUM: &str = "gpt-4.1";

/// Maximum attempts per call (initial attempt + retries).
pub const RETRY_MAX_ATTEMPTS: u32 = 3;

/// Base exponential backoff between attempts, in milliseconds.
pub const RETRY_BASE_BACKOFF_MS: u64 = 250;

/// Backoff ceiling in seconds, also capping server-suggested retry-after.
pub const RETRY_MAX_BACKOFF_SECS: u64 = 8;

/// Consecutive failures before the circuit breaker opens.
pub const BREAKER_FAILURE_THRESHOLD: u32 = 5;

/// Cooldown before the breaker admits a half-open probe, in seconds.
pub const BREAKER_COOLDOWN_SECS: u64 = 30;

/// Silence interval after which a "still typing" heartbeat is injected
/// into a chunk stream.
pub const HEARTBEAT_INTERVAL_SECS: u64 = 5;

// =============================================================================
// FALLBACK
// =============================================================================

/// Fixed confidence assigned to fallback responses. Deliberately modest so
/// downstream ranking prefers genuine model output when both exist.
pub const FALLBACK_CONFIDENCE: f32 = 0.35;
