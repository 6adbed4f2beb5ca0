//! Process-wide circuit breaker for the LLM provider.
//!
//! A provider outage affects every concurrent caller at once, so the breaker
//! is intentionally shared state: initialized once at startup, updated
//! atomically behind a mutex, and exposed through a narrow interface
//! (`try_acquire` / `record_success` / `record_failure`).
//!
//! State machine: `Closed` → (failure threshold reached) → `Open` →
//! (cooldown elapsed) → `HalfOpen` with exactly one probe admitted →
//! success closes, failure re-opens and resets the cooldown.

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use fireside_core::{defaults, Error, Result};

/// Breaker tuning knobs.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures before the breaker opens.
    pub failure_threshold: u32,
    /// How long the breaker stays open before admitting a probe.
    pub cooldown: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: defaults::BREAKER_FAILURE_THRESHOLD,
            cooldown: Duration::from_secs(defaults::BREAKER_COOLDOWN_SECS),
        }
    }
}

impl BreakerConfig {
    /// Load from environment variables with defaults.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `FIRESIDE_BREAKER_THRESHOLD` | `5` |
    /// | `FIRESIDE_BREAKER_COOLDOWN_SECS` | `30` |
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(val) = std::env::var("FIRESIDE_BREAKER_THRESHOLD") {
            match val.parse::<u32>() {
                Ok(n) if n > 0 => config.failure_threshold = n,
                _ => warn!(value = %val, "Invalid FIRESIDE_BREAKER_THRESHOLD, using default"),
            }
        }
        if let Ok(val) = std::env::var("FIRESIDE_BREAKER_COOLDOWN_SECS") {
            match val.parse::<u64>() {
                Ok(secs) => config.cooldown = Duration::from_secs(secs),
                Err(_) => warn!(value = %val, "Invalid FIRESIDE_BREAKER_COOLDOWN_SECS, using default"),
            }
        }
        config
    }
}

/// Breaker status, for logging and introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerStatus {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerStatus::Closed => "closed",
            BreakerStatus::Open => "open",
            BreakerStatus::HalfOpen => "half_open",
        }
    }
}

struct BreakerState {
    status: BreakerStatus,
    consecutive_failures: u32,
    /// When the cooldown ends; only meaningful while `Open`.
    open_until: Option<Instant>,
    /// True while the single half-open probe is in flight.
    probe_in_flight: bool,
}

/// Shared circuit breaker. Clone-free: wrap in `Arc` and share.
pub struct CircuitBreaker {
    config: BreakerConfig,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            state: Mutex::new(BreakerState {
                status: BreakerStatus::Closed,
                consecutive_failures: 0,
                open_until: None,
                probe_in_flight: false,
            }),
        }
    }

    /// Check whether a call may proceed. While open, returns
    /// `Error::CircuitOpen` without any network attempt. During half-open,
    /// exactly one probe is admitted; concurrent callers are rejected until
    /// the probe resolves.
    pub fn try_acquire(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match state.status {
            BreakerStatus::Closed => Ok(()),
            BreakerStatus::Open => {
                let now = Instant::now();
                match state.open_until {
                    Some(until) if now >= until => {
                        debug!(breaker_state = "half_open", "Cooldown elapsed, admitting probe");
                        state.status = BreakerStatus::HalfOpen;
                        state.probe_in_flight = true;
                        Ok(())
                    }
                    Some(until) => Err(Error::CircuitOpen {
                        retry_in_secs: until.saturating_duration_since(now).as_secs().max(1),
                    }),
                    // Open without a deadline should not happen; fail closed-ish
                    None => Err(Error::CircuitOpen { retry_in_secs: 1 }),
                }
            }
            BreakerStatus::HalfOpen => {
                if state.probe_in_flight {
                    Err(Error::CircuitOpen { retry_in_secs: 1 })
                } else {
                    state.probe_in_flight = true;
                    Ok(())
                }
            }
        }
    }

    /// Record a successful call. Closes the breaker and resets counters.
    pub fn record_success(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.status != BreakerStatus::Closed {
            debug!(breaker_state = "closed", "Probe succeeded, closing breaker");
        }
        state.status = BreakerStatus::Closed;
        state.consecutive_failures = 0;
        state.open_until = None;
        state.probe_in_flight = false;
    }

    /// Record a failed call attempt. Opens the breaker when the consecutive
    /// failure threshold is reached, or immediately when a half-open probe
    /// fails (which also resets the cooldown).
    pub fn record_failure(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        let should_open = state.status == BreakerStatus::HalfOpen
            || state.consecutive_failures >= self.config.failure_threshold;
        if should_open && state.status != BreakerStatus::Open {
            warn!(
                consecutive_failures = state.consecutive_failures,
                cooldown_secs = self.config.cooldown.as_secs(),
                "Circuit breaker opening"
            );
        }
        if should_open {
            state.status = BreakerStatus::Open;
            state.open_until = Some(Instant::now() + self.config.cooldown);
            state.probe_in_flight = false;
        }
    }

    /// True when calls are currently short-circuited.
    pub fn is_open(&self) -> bool {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.status == BreakerStatus::Open
    }

    /// Current status, for logging.
    pub fn status(&self) -> BreakerStatus {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .status
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(BreakerConfig::default())
    }
}
