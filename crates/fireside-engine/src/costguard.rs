//! CostGuard: pre-call budget authorization and post-call reconciliation.
//!
//! Spending is tracked as atomic counters in the [`BudgetStore`], keyed per
//! user per day, per user per month, and globally per day. Authorization
//! reserves the estimated tokens optimistically (add, then check, then roll
//! back on denial) so concurrent calls can exhaust a cap but never exceed
//! it. After the call, [`CostGuard::reconcile`] corrects the reservation
//! against the provider's reported usage, and [`CostGuard::refund`] returns
//! it when the call never spent anything.
//!
//! A budget-store outage fails OPEN: responding is the product's core
//! promise, so the guard allows the call at the economy tier, bounded by a
//! short-TTL snapshot of the last known counter values.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::{debug, warn};

use fireside_core::models::{ModelTier, SubscriptionTier};
use fireside_core::traits::BudgetStore;
use fireside_core::{defaults, Error};
use uuid::Uuid;

/// CostGuard tuning knobs.
#[derive(Debug, Clone)]
pub struct CostGuardConfig {
    /// Global daily token ceiling across all users.
    pub global_daily_ceiling: i64,
    /// Fraction of the ceiling where downgrading begins.
    pub soft_fraction: f32,
    /// How long a counter snapshot bounds the fail-open path.
    pub snapshot_ttl: Duration,
}

impl Default for CostGuardConfig {
    fn default() -> Self {
        Self {
            global_daily_ceiling: defaults::GLOBAL_DAILY_TOKEN_CEILING,
            soft_fraction: defaults::GLOBAL_SOFT_FRACTION,
            snapshot_ttl: Duration::from_secs(defaults::BUDGET_SNAPSHOT_TTL_SECS),
        }
    }
}

impl CostGuardConfig {
    /// Load from environment variables with defaults.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `FIRESIDE_GLOBAL_DAILY_CEILING` | `5000000` |
    /// | `FIRESIDE_GLOBAL_SOFT_FRACTION` | `0.8` |
    /// | `FIRESIDE_BUDGET_SNAPSHOT_TTL_SECS` | `60` |
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(val) = std::env::var("FIRESIDE_GLOBAL_DAILY_CEILING") {
            match val.parse::<i64>() {
                Ok(n) if n > 0 => config.global_daily_ceiling = n,
                _ => warn!(value = %val, "Invalid FIRESIDE_GLOBAL_DAILY_CEILING, using default"),
            }
        }
        if let Ok(val) = std::env::var("FIRESIDE_GLOBAL_SOFT_FRACTION") {
            match val.parse::<f32>() {
                Ok(f) if (0.0..=1.0).contains(&f) => config.soft_fraction = f,
                _ => warn!(value = %val, "Invalid FIRESIDE_GLOBAL_SOFT_FRACTION, using default"),
            }
        }
        if let Ok(val) = std::env::var("FIRESIDE_BUDGET_SNAPSHOT_TTL_SECS") {
            match val.parse::<u64>() {
                Ok(secs) => config.snapshot_ttl = Duration::from_secs(secs),
                Err(_) => {
                    warn!(value = %val, "Invalid FIRESIDE_BUDGET_SNAPSHOT_TTL_SECS, using default")
                }
            }
        }
        config
    }

    fn soft_threshold(&self) -> i64 {
        (self.global_daily_ceiling as f64 * self.soft_fraction as f64) as i64
    }
}

/// Tokens reserved against the budget counters for one persona call.
/// Must be resolved with [`CostGuard::reconcile`] or [`CostGuard::refund`].
#[derive(Debug, Clone)]
pub struct Reservation {
    keys: Vec<String>,
    pub estimate: i64,
}

/// Outcome of a budget authorization.
#[derive(Debug)]
pub struct AuthorizationDecision {
    pub allowed: bool,
    /// Tier the call may use; may be cheaper than requested.
    pub effective_tier: ModelTier,
    /// Human-readable reason, for logs.
    pub reason: &'static str,
    /// True when the decision was made without a reachable budget store.
    pub fail_open: bool,
    /// Present iff `allowed` and the reservation landed in the store.
    pub reservation: Option<Reservation>,
}

impl AuthorizationDecision {
    fn denied(reason: &'static str) -> Self {
        Self {
            allowed: false,
            effective_tier: ModelTier::Economy,
            reason,
            fail_open: false,
            reservation: None,
        }
    }
}

struct Snapshot {
    value: i64,
    taken_at: Instant,
}

/// Budget authorization gate shared by every persona pipeline.
pub struct CostGuard {
    store: Arc<dyn BudgetStore>,
    config: CostGuardConfig,
    snapshots: Mutex<HashMap<String, Snapshot>>,
}

impl CostGuard {
    pub fn new(store: Arc<dyn BudgetStore>, config: CostGuardConfig) -> Self {
        Self {
            store,
            config,
            snapshots: Mutex::new(HashMap::new()),
        }
    }

    /// Authorize one persona call of an estimated size.
    ///
    /// Checks the user's daily cap, the user's monthly cap, and the global
    /// daily ceiling, in that order. The reservation is rolled back in full
    /// whenever a later check denies.
    pub async fn authorize(
        &self,
        user_id: Uuid,
        subscription: SubscriptionTier,
        requested_tier: ModelTier,
        estimated_tokens: i64,
    ) -> AuthorizationDecision {
        let now = Utc::now();
        let daily_key = daily_key(user_id, now);
        let monthly_key = monthly_key(user_id, now);
        let global_key = global_key(now);

        let mut reserved: Vec<String> = Vec::new();

        // User daily cap
        let daily = match self.reserve(&daily_key, estimated_tokens, &mut reserved).await {
            Ok(v) => v,
            Err(e) => {
                return self
                    .fail_open(user_id, subscription, &reserved, estimated_tokens, e)
                    .await
            }
        };
        if daily > subscription.daily_token_cap() {
            self.rollback(&reserved, estimated_tokens).await;
            debug!(user_id = %user_id, tokens = daily, "Daily token cap reached");
            return AuthorizationDecision::denied("user daily token cap reached");
        }

        // User monthly cap
        let monthly = match self
            .reserve(&monthly_key, estimated_tokens, &mut reserved)
            .await
        {
            Ok(v) => v,
            Err(e) => {
                return self
                    .fail_open(user_id, subscription, &reserved, estimated_tokens, e)
                    .await
            }
        };
        if monthly > subscription.monthly_token_cap() {
            self.rollback(&reserved, estimated_tokens).await;
            debug!(user_id = %user_id, tokens = monthly, "Monthly token cap reached");
            return AuthorizationDecision::denied("user monthly token cap reached");
        }

        // Global daily ceiling, with a soft band where spend is throttled
        // by downgrading before it is cut off entirely.
        let global = match self
            .reserve(&global_key, estimated_tokens, &mut reserved)
            .await
        {
            Ok(v) => v,
            Err(e) => {
                return self
                    .fail_open(user_id, subscription, &reserved, estimated_tokens, e)
                    .await
            }
        };

        let reservation = Reservation {
            keys: reserved.clone(),
            estimate: estimated_tokens,
        };

        if global > self.config.global_daily_ceiling {
            // Hard band: only premium subscribers keep responding, and only
            // on the cheapest model.
            if subscription == SubscriptionTier::Premium {
                warn!(global_tokens = global, "Global ceiling exceeded, premium-only economy mode");
                return AuthorizationDecision {
                    allowed: true,
                    effective_tier: ModelTier::Economy,
                    reason: "global ceiling exceeded, premium allowed at economy",
                    fail_open: false,
                    reservation: Some(reservation),
                };
            }
            self.rollback(&reserved, estimated_tokens).await;
            return AuthorizationDecision::denied("global daily ceiling reached");
        }

        if global > self.config.soft_threshold() {
            // Soft band: free users pause, paid users get downgraded.
            if subscription == SubscriptionTier::Free {
                self.rollback(&reserved, estimated_tokens).await;
                return AuthorizationDecision::denied("global budget constrained, free tier paused");
            }
            let effective = requested_tier.downgrade().unwrap_or(ModelTier::Economy);
            debug!(
                user_id = %user_id,
                requested = %requested_tier,
                effective = %effective,
                "Global budget constrained, downgrading model tier"
            );
            return AuthorizationDecision {
                allowed: true,
                effective_tier: effective,
                reason: "global budget constrained, downgraded",
                fail_open: false,
                reservation: Some(reservation),
            };
        }

        AuthorizationDecision {
            allowed: true,
            effective_tier: requested_tier,
            reason: "within budget",
            fail_open: false,
            reservation: Some(reservation),
        }
    }

    /// Correct a reservation against the provider's reported usage.
    pub async fn reconcile(&self, reservation: &Reservation, actual_tokens: i64) {
        let delta = actual_tokens - reservation.estimate;
        if delta == 0 {
            return;
        }
        for key in &reservation.keys {
            match self.store.add(key, delta).await {
                Ok(value) => self.remember(key, value),
                Err(e) => warn!(key, error = %e, "Failed to reconcile budget counter"),
            }
        }
        debug!(
            estimate = reservation.estimate,
            actual = actual_tokens,
            "Reservation reconciled"
        );
    }

    /// Return a reservation in full (the call never consumed tokens).
    pub async fn refund(&self, reservation: &Reservation) {
        for key in &reservation.keys {
            match self.store.add(key, -reservation.estimate).await {
                Ok(value) => self.remember(key, value),
                Err(e) => warn!(key, error = %e, "Failed to refund budget counter"),
            }
        }
    }

    async fn reserve(
        &self,
        key: &str,
        estimate: i64,
        reserved: &mut Vec<String>,
    ) -> Result<i64, Error> {
        let value = self.store.add(key, estimate).await?;
        reserved.push(key.to_string());
        self.remember(key, value);
        Ok(value)
    }

    /// Best-effort rollback of keys reserved so far.
    async fn rollback(&self, reserved: &[String], estimate: i64) {
        for key in reserved {
            if let Err(e) = self.store.add(key, -estimate).await {
                warn!(key, error = %e, "Failed to roll back budget reservation");
            }
        }
    }

    /// Build the fail-open decision after a store error. Allowed at the
    /// economy tier, unless a fresh snapshot says the user was already over
    /// their daily cap.
    async fn fail_open(
        &self,
        user_id: Uuid,
        subscription: SubscriptionTier,
        reserved: &[String],
        estimate: i64,
        err: Error,
    ) -> AuthorizationDecision {
        warn!(user_id = %user_id, error = %err, fail_open = true, "Budget store unreachable");
        // Whatever landed before the outage is unwound best-effort; the
        // fail-open decision carries no reservation.
        self.rollback(reserved, estimate).await;

        let daily_key = daily_key(user_id, Utc::now());
        let over_cap = {
            let snapshots = self.snapshots.lock().unwrap_or_else(|e| e.into_inner());
            snapshots.get(&daily_key).is_some_and(|snap| {
                snap.taken_at.elapsed() <= self.config.snapshot_ttl
                    && snap.value >= subscription.daily_token_cap()
            })
        };

        if over_cap {
            return AuthorizationDecision {
                allowed: false,
                effective_tier: ModelTier::Economy,
                reason: "budget store unreachable, last known counters over cap",
                fail_open: true,
                reservation: None,
            };
        }

        AuthorizationDecision {
            allowed: true,
            effective_tier: ModelTier::Economy,
            reason: "budget store unreachable, failing open at economy",
            fail_open: true,
            reservation: None,
        }
    }

    fn remember(&self, key: &str, value: i64) {
        let mut snapshots = self.snapshots.lock().unwrap_or_else(|e| e.into_inner());
        snapshots.insert(
            key.to_string(),
            Snapshot {
                value,
                taken_at: Instant::now(),
            },
        );
    }
}

fn daily_key(user_id: Uuid, now: DateTime<Utc>) -> String {
    format!("user:{}:daily:{}", user_id, now.format("%Y%m%d"))
}

fn monthly_key(user_id: Uuid, now: DateTime<Utc>) -> String {
    format!("user:{}:monthly:{}", user_id, now.format("%Y%m"))
}

fn global_key(now: DateTime<Utc>) -> String {
    format!("global:daily:{}", now.format("%Y%m%d"))
}
