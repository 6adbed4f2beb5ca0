//! Store traits consumed and produced-to by the engine.
//!
//! These are the narrow contracts to the rest of the product: the engine
//! reads journal entries and user profiles, writes finalized responses, and
//! tracks spend through an atomic budget counter. In-memory implementations
//! live in `fireside-engine::memory`; production bindings are wired up by
//! the hosting service.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    JournalEntry, PersonaKind, PersonaPreferences, StructuredPersonaResponse, SubscriptionTier,
};

/// Read access to journal entries. The engine never writes to this store.
#[async_trait]
pub trait JournalEntryStore: Send + Sync {
    /// Fetch a single entry by id. `Error::EntryNotFound` if absent.
    async fn get_entry(&self, id: Uuid) -> Result<JournalEntry>;

    /// Fetch the user's most recent entries, newest first, capped at `limit`.
    async fn get_recent_entries(&self, user_id: Uuid, limit: usize) -> Result<Vec<JournalEntry>>;
}

/// Read access to subscription tier and persona preferences.
#[async_trait]
pub trait UserProfileStore: Send + Sync {
    /// `Error::UserNotFound` if the user has no profile.
    async fn get_tier_and_preferences(
        &self,
        user_id: Uuid,
    ) -> Result<(SubscriptionTier, PersonaPreferences)>;
}

/// Write access to the AI-insights store for finalized responses.
#[async_trait]
pub trait InsightsStore: Send + Sync {
    /// Persist a finalized response keyed by (entry_id, persona). Idempotent:
    /// the same key overwrites rather than duplicates, so retries are safe.
    async fn put_response(
        &self,
        entry_id: Uuid,
        user_id: Uuid,
        response: &StructuredPersonaResponse,
    ) -> Result<()>;

    /// Count responses delivered per persona for a user since the given
    /// instant. Feeds the selector's load-balancing tie-break.
    async fn count_recent_responses(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<HashMap<PersonaKind, u64>>;
}

/// Atomic counter store backing the cost guard.
///
/// Counters are keyed by opaque strings (the cost guard owns the key
/// scheme). `add` must be atomic — the returned value is the counter
/// *after* the addition, with no window for a concurrent read-modify-write
/// race. A production binding maps this onto a key-value store's native
/// atomic increment; tests use the in-memory implementation.
#[async_trait]
pub trait BudgetStore: Send + Sync {
    /// Atomically add `delta` (may be negative) and return the new value.
    async fn add(&self, key: &str, delta: i64) -> Result<i64>;

    /// Read the current counter value (0 if the key has never been written).
    async fn get(&self, key: &str) -> Result<i64>;
}
