//! Engine runtime configuration.
//!
//! Loaded once at startup from `FIRESIDE_*` environment variables with
//! fallback to the [`crate::defaults`] constants. Invalid values fall back
//! to defaults with a warning — configuration never panics.

use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::defaults;
use crate::models::ModelTier;

/// Orchestration and selection knobs, loaded once and not hot-reloaded.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum persona pipelines dispatched concurrently per entry.
    pub concurrency_cap: usize,
    /// Independent timeout per persona model call.
    pub persona_call_timeout: Duration,
    /// Minimum relevance score for a persona to be selected.
    pub relevance_threshold: f32,
    /// Maximum recent entries considered when scoring.
    pub max_history: usize,
    /// Upper bound on in-stream pacing pauses.
    pub pacing_cap: Duration,
    /// Per-request response channel capacity.
    pub stream_buffer: usize,
    /// Model name for the economy tier.
    pub economy_model: String,
    /// Model name for the standard tier.
    pub standard_model: String,
    /// Model name for the premium tier.
    pub premium_model: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            concurrency_cap: defaults::CONCURRENCY_CAP,
            persona_call_timeout: Duration::from_secs(defaults::PERSONA_CALL_TIMEOUT_SECS),
            relevance_threshold: defaults::RELEVANCE_THRESHOLD,
            max_history: defaults::MAX_HISTORY_ENTRIES,
            pacing_cap: Duration::from_secs(defaults::PACING_CAP_SECS),
            stream_buffer: defaults::STREAM_BUFFER,
            economy_model: defaults::MODEL_ECONOMY.to_string(),
            standard_model: defaults::MODEL_STANDARD.to_string(),
            premium_model: defaults::MODEL_PREMIUM.to_string(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `FIRESIDE_CONCURRENCY_CAP` | `4` | Max concurrent persona pipelines |
    /// | `FIRESIDE_PERSONA_TIMEOUT_SECS` | `30` | Per-call timeout |
    /// | `FIRESIDE_RELEVANCE_THRESHOLD` | `0.35` | Selection cutoff |
    /// | `FIRESIDE_MAX_HISTORY` | `20` | History entries for scoring |
    /// | `FIRESIDE_PACING_CAP_SECS` | `5` | Max in-stream pacing pause |
    /// | `FIRESIDE_MODEL_ECONOMY` | `gpt-4o-mini` | Economy-tier model |
    /// | `FIRESIDE_MODEL_STANDARD` | `gpt-4o` | Standard-tier model |
    /// | `FIRESIDE_MODEL_PREMIUM` | `gpt-4.1` | Premium-tier model |
    pub fn from_env() -> Self {
        let mut config = Self::default();

        config.concurrency_cap =
            env_parse("FIRESIDE_CONCURRENCY_CAP", config.concurrency_cap).max(1);
        config.persona_call_timeout = Duration::from_secs(
            env_parse(
                "FIRESIDE_PERSONA_TIMEOUT_SECS",
                config.persona_call_timeout.as_secs(),
            )
            .max(1),
        );

        let threshold: f32 = env_parse("FIRESIDE_RELEVANCE_THRESHOLD", config.relevance_threshold);
        config.relevance_threshold = threshold.clamp(0.0, 1.0);

        config.max_history = env_parse("FIRESIDE_MAX_HISTORY", config.max_history);
        config.pacing_cap = Duration::from_secs(env_parse(
            "FIRESIDE_PACING_CAP_SECS",
            config.pacing_cap.as_secs(),
        ));

        if let Ok(val) = std::env::var("FIRESIDE_MODEL_ECONOMY") {
            if !val.is_empty() {
                config.economy_model = val;
            }
        }
        if let Ok(val) = std::env::var("FIRESIDE_MODEL_STANDARD") {
            if !val.is_empty() {
                config.standard_model = val;
            }
        }
        if let Ok(val) = std::env::var("FIRESIDE_MODEL_PREMIUM") {
            if !val.is_empty() {
                config.premium_model = val;
            }
        }

        config
    }

    /// Provider model name for a backing tier.
    pub fn model_for_tier(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Economy => &self.economy_model,
            ModelTier::Standard => &self.standard_model,
            ModelTier::Premium => &self.premium_model,
        }
    }
}

/// Parse an env var, falling back to `default` (with a warning) when the
/// value is present but invalid.
fn env_parse<T: FromStr + Copy>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(val) => match val.parse::<T>() {
            Ok(parsed) => parsed,
            Err(_) => {
                warn!(key, value = %val, "Invalid value, using default");
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = EngineConfig::default();
        assert_eq!(config.concurrency_cap, 4);
        assert_eq!(config.persona_call_timeout, Duration::from_secs(30));
        assert!((config.relevance_threshold - 0.35).abs() < f32::EPSILON);
        assert_eq!(config.max_history, 20);
    }

    #[test]
    fn model_for_tier_maps_all_tiers() {
        let config = EngineConfig::default();
        assert_eq!(config.model_for_tier(ModelTier::Economy), "gpt-4o-mini");
        assert_eq!(config.model_for_tier(ModelTier::Standard), "gpt-4o");
        assert_eq!(config.model_for_tier(ModelTier::Premium), "gpt-4.1");
    }

    #[test]
    fn env_parse_invalid_falls_back() {
        // env mutation is process-global; use a key unique to this test
        std::env::set_var("FIRESIDE_TEST_PARSE_KEY", "not-a-number");
        let parsed: usize = env_parse("FIRESIDE_TEST_PARSE_KEY", 7);
        assert_eq!(parsed, 7);
        std::env::remove_var("FIRESIDE_TEST_PARSE_KEY");
    }

    #[test]
    fn env_parse_missing_uses_default() {
        let parsed: u64 = env_parse("FIRESIDE_TEST_MISSING_KEY", 42);
        assert_eq!(parsed, 42);
    }
}
