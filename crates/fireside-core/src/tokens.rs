//! Token estimation heuristics for budgeting.
//!
//! Estimates only need to be good enough for optimistic reservation — the
//! cost guard reconciles against the provider's reported usage after every
//! call, so systematic error washes out.

use crate::defaults;

/// Estimate the token count of a piece of text.
///
/// Uses a chars-per-token ratio; always returns at least 1 for non-empty
/// text so reservations are never zero.
pub fn estimate_tokens(text: &str) -> i64 {
    if text.is_empty() {
        return 0;
    }
    (text.chars().count() / defaults::CHARS_PER_TOKEN + 1) as i64
}

/// Estimate the total token cost of one persona call: prompt plus a fixed
/// completion-side reserve.
pub fn estimate_call_tokens(prompt_text: &str) -> i64 {
    estimate_tokens(prompt_text) + defaults::COMPLETION_TOKEN_ESTIMATE
}
