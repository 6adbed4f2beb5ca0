//! In-memory store implementations.
//!
//! Back the engine's store traits with plain hash maps. Used by every test
//! in the workspace and suitable for demos; production deployments bind
//! the traits to real storage in the hosting service.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use fireside_core::models::{
    JournalEntry, PersonaKind, PersonaPreferences, StructuredPersonaResponse, SubscriptionTier,
};
use fireside_core::traits::{BudgetStore, InsightsStore, JournalEntryStore, UserProfileStore};
use fireside_core::{Error, Result};

// ---------------------------------------------------------------------------
// Journal entries
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryJournalStore {
    entries: Mutex<HashMap<Uuid, JournalEntry>>,
}

impl InMemoryJournalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, entry: JournalEntry) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(entry.id, entry);
    }
}

#[async_trait]
impl JournalEntryStore for InMemoryJournalStore {
    async fn get_entry(&self, id: Uuid) -> Result<JournalEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .cloned()
            .ok_or(Error::EntryNotFound(id))
    }

    async fn get_recent_entries(&self, user_id: Uuid, limit: usize) -> Result<Vec<JournalEntry>> {
        let mut entries: Vec<JournalEntry> = self
            .entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        entries.truncate(limit);
        Ok(entries)
    }
}

// ---------------------------------------------------------------------------
// User profiles
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryProfileStore {
    profiles: Mutex<HashMap<Uuid, (SubscriptionTier, PersonaPreferences)>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user_id: Uuid, tier: SubscriptionTier, preferences: PersonaPreferences) {
        self.profiles
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(user_id, (tier, preferences));
    }
}

#[async_trait]
impl UserProfileStore for InMemoryProfileStore {
    async fn get_tier_and_preferences(
        &self,
        user_id: Uuid,
    ) -> Result<(SubscriptionTier, PersonaPreferences)> {
        self.profiles
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&user_id)
            .cloned()
            .ok_or(Error::UserNotFound(user_id))
    }
}

// ---------------------------------------------------------------------------
// Insights
// ---------------------------------------------------------------------------

struct StoredResponse {
    user_id: Uuid,
    response: StructuredPersonaResponse,
    stored_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct InMemoryInsightsStore {
    responses: Mutex<HashMap<(Uuid, PersonaKind), StoredResponse>>,
}

impl InMemoryInsightsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored responses for an entry, for test assertions.
    pub fn responses_for_entry(&self, entry_id: Uuid) -> Vec<StructuredPersonaResponse> {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|((id, _), _)| *id == entry_id)
            .map(|(_, stored)| stored.response.clone())
            .collect()
    }
}

#[async_trait]
impl InsightsStore for InMemoryInsightsStore {
    async fn put_response(
        &self,
        entry_id: Uuid,
        user_id: Uuid,
        response: &StructuredPersonaResponse,
    ) -> Result<()> {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(
                (entry_id, response.persona),
                StoredResponse {
                    user_id,
                    response: response.clone(),
                    stored_at: Utc::now(),
                },
            );
        Ok(())
    }

    async fn count_recent_responses(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<HashMap<PersonaKind, u64>> {
        let mut counts: HashMap<PersonaKind, u64> = HashMap::new();
        for ((_, persona), stored) in self
            .responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
        {
            if stored.user_id == user_id && stored.stored_at >= since {
                *counts.entry(*persona).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }
}

// ---------------------------------------------------------------------------
// Budget counters
// ---------------------------------------------------------------------------

/// Atomic in-memory counters with an outage switch for fail-open tests.
#[derive(Default)]
pub struct InMemoryBudgetStore {
    counters: Mutex<HashMap<String, i64>>,
    unreachable: AtomicBool,
}

impl InMemoryBudgetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a store outage: every operation fails until switched back.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    fn check_reachable(&self) -> Result<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            Err(Error::Store("budget store unreachable".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl BudgetStore for InMemoryBudgetStore {
    async fn add(&self, key: &str, delta: i64) -> Result<i64> {
        self.check_reachable()?;
        let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        let value = counters.entry(key.to_string()).or_insert(0);
        *value += delta;
        Ok(*value)
    }

    async fn get(&self, key: &str) -> Result<i64> {
        self.check_reachable()?;
        Ok(self
            .counters
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .copied()
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use fireside_core::models::EmotionalTone;

    fn response(persona: PersonaKind) -> StructuredPersonaResponse {
        StructuredPersonaResponse {
            persona,
            text: "hello".to_string(),
            tone: EmotionalTone::Neutral,
            confidence: 0.5,
            topics: vec![],
            suggested_actions: vec![],
            is_fallback: false,
            model: None,
        }
    }

    #[tokio::test]
    async fn journal_store_round_trip() {
        let store = InMemoryJournalStore::new();
        let entry = JournalEntry::new(Uuid::new_v4(), "hi");
        store.insert(entry.clone());

        let fetched = store.get_entry(entry.id).await.unwrap();
        assert_eq!(fetched.text, "hi");

        let missing = store.get_entry(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(missing, Error::EntryNotFound(_)));
    }

    #[tokio::test]
    async fn recent_entries_newest_first_and_capped() {
        let store = InMemoryJournalStore::new();
        let user = Uuid::new_v4();
        for i in 0..5 {
            let mut entry = JournalEntry::new(user, format!("entry {i}"));
            entry.created_at = Utc::now() - Duration::days(i);
            store.insert(entry);
        }
        store.insert(JournalEntry::new(Uuid::new_v4(), "other user"));

        let recent = store.get_recent_entries(user, 3).await.unwrap();
        assert_eq!(recent.len(), 3);
        assert!(recent[0].created_at > recent[1].created_at);
        assert_eq!(recent[0].text, "entry 0");
    }

    #[tokio::test]
    async fn profile_store_lookup() {
        let store = InMemoryProfileStore::new();
        let user = Uuid::new_v4();
        store.insert(user, SubscriptionTier::Plus, PersonaPreferences::all());

        let (tier, _) = store.get_tier_and_preferences(user).await.unwrap();
        assert_eq!(tier, SubscriptionTier::Plus);

        let missing = store
            .get_tier_and_preferences(Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(missing, Error::UserNotFound(_)));
    }

    #[tokio::test]
    async fn insights_put_is_idempotent() {
        let store = InMemoryInsightsStore::new();
        let entry_id = Uuid::new_v4();
        let user = Uuid::new_v4();

        store
            .put_response(entry_id, user, &response(PersonaKind::Haven))
            .await
            .unwrap();
        store
            .put_response(entry_id, user, &response(PersonaKind::Haven))
            .await
            .unwrap();
        store
            .put_response(entry_id, user, &response(PersonaKind::Sage))
            .await
            .unwrap();

        assert_eq!(store.responses_for_entry(entry_id).len(), 2);
    }

    #[tokio::test]
    async fn insights_count_respects_window_and_user() {
        let store = InMemoryInsightsStore::new();
        let user = Uuid::new_v4();
        store
            .put_response(Uuid::new_v4(), user, &response(PersonaKind::Ember))
            .await
            .unwrap();
        store
            .put_response(Uuid::new_v4(), user, &response(PersonaKind::Ember))
            .await
            .unwrap();
        store
            .put_response(Uuid::new_v4(), Uuid::new_v4(), &response(PersonaKind::Ember))
            .await
            .unwrap();

        let counts = store
            .count_recent_responses(user, Utc::now() - Duration::hours(24))
            .await
            .unwrap();
        assert_eq!(counts.get(&PersonaKind::Ember), Some(&2));

        let future = store
            .count_recent_responses(user, Utc::now() + Duration::hours(1))
            .await
            .unwrap();
        assert!(future.is_empty());
    }

    #[tokio::test]
    async fn budget_store_atomic_add_and_outage() {
        let store = InMemoryBudgetStore::new();
        assert_eq!(store.add("k", 5).await.unwrap(), 5);
        assert_eq!(store.add("k", -2).await.unwrap(), 3);
        assert_eq!(store.get("k").await.unwrap(), 3);
        assert_eq!(store.get("missing").await.unwrap(), 0);

        store.set_unreachable(true);
        assert!(store.add("k", 1).await.is_err());
        assert!(store.get("k").await.is_err());

        store.set_unreachable(false);
        assert_eq!(store.get("k").await.unwrap(), 3);
    }
}
