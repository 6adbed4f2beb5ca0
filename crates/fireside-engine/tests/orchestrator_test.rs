//! End-to-end orchestration tests over the in-memory stores and the mock
//! chat provider.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use fireside_core::config::EngineConfig;
use fireside_core::BudgetStore;
use fireside_core::events::EngineEvent;
use fireside_core::models::{
    EmotionalTone, JournalEntry, PersonaKind, PersonaPreferences, SubscriptionTier,
};
use fireside_engine::memory::{
    InMemoryBudgetStore, InMemoryInsightsStore, InMemoryJournalStore, InMemoryProfileStore,
};
use fireside_engine::{CostGuard, CostGuardConfig, MultiPersonaOrchestrator};
use fireside_model::mock::MockChatProvider;
use fireside_model::{ModelClient, RetryPolicy};
use fireside_core::ProviderErrorKind;

const WORK_STRESS_ENTRY: &str =
    "I'm overwhelmed with work deadlines and my manager is pressuring me";

const SCRIPTED_REPLY: &str = r#"{"text":"That is a lot to hold at once. Pressure like that is exhausting, and it makes sense you feel stretched thin.","tone":"supportive","confidence":0.9,"topics":["work_stress"],"suggested_actions":["write down the three loudest deadlines"]}"#;

struct Harness {
    orchestrator: MultiPersonaOrchestrator,
    provider: MockChatProvider,
    journal: Arc<InMemoryJournalStore>,
    profiles: Arc<InMemoryProfileStore>,
    insights: Arc<InMemoryInsightsStore>,
    budget: Arc<InMemoryBudgetStore>,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn harness(provider: MockChatProvider) -> Harness {
    init_tracing();
    let journal = Arc::new(InMemoryJournalStore::new());
    let profiles = Arc::new(InMemoryProfileStore::new());
    let insights = Arc::new(InMemoryInsightsStore::new());
    let budget = Arc::new(InMemoryBudgetStore::new());

    let client = ModelClient::new(Arc::new(provider.clone())).with_retry(RetryPolicy {
        max_attempts: 2,
        base_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(5),
    });

    let orchestrator = MultiPersonaOrchestrator::new(
        EngineConfig::default(),
        client,
        CostGuard::new(budget.clone(), CostGuardConfig::default()),
        journal.clone(),
        profiles.clone(),
        insights.clone(),
    );

    Harness {
        orchestrator,
        provider,
        journal,
        profiles,
        insights,
        budget,
    }
}

fn seed_entry(h: &Harness, tier: SubscriptionTier, text: &str) -> JournalEntry {
    let user = Uuid::new_v4();
    h.profiles.insert(user, tier, PersonaPreferences::all());
    let entry = JournalEntry::new(user, text);
    h.journal.insert(entry.clone());
    entry
}

#[tokio::test]
async fn overwhelmed_entry_end_to_end() {
    let h = harness(MockChatProvider::new().with_default_response(SCRIPTED_REPLY));
    let entry = seed_entry(&h, SubscriptionTier::Plus, WORK_STRESS_ENTRY);
    let mut events = h.orchestrator.events().subscribe();

    let set = h.orchestrator.respond(entry.id).await.unwrap();

    // The empath leads, the coach follows, the cheerleader stays quiet
    let personas: Vec<PersonaKind> = set.responses.iter().map(|r| r.persona).collect();
    assert_eq!(personas.first(), Some(&PersonaKind::Haven));
    assert!(personas.contains(&PersonaKind::Compass));
    assert!(!personas.contains(&PersonaKind::Ember));

    for resp in &set.responses {
        assert!(!resp.is_fallback);
        assert_eq!(resp.tone, EmotionalTone::Supportive);
        // Plus subscription resolves to the standard-tier model
        assert_eq!(resp.model.as_deref(), Some("gpt-4o"));
        assert!(resp.confidence > 0.8);
    }

    // One provider call per selected persona
    assert_eq!(h.provider.call_count(), set.responses.len());

    // Every response was persisted
    let stored = h.insights.responses_for_entry(entry.id);
    assert_eq!(stored.len(), set.responses.len());

    // Lifecycle events in phase order
    assert!(matches!(
        events.try_recv().unwrap(),
        EngineEvent::SelectionStarted { .. }
    ));
    assert!(matches!(
        events.try_recv().unwrap(),
        EngineEvent::PersonasSelected { selected, .. } if selected == set.responses.len()
    ));
    let mut saw_delivered = false;
    while let Ok(event) = events.try_recv() {
        if let EngineEvent::Delivered { responses, .. } = event {
            assert_eq!(responses, set.responses.len());
            saw_delivered = true;
        }
    }
    assert!(saw_delivered);
}

#[tokio::test]
async fn exhausted_budget_never_reaches_the_provider() {
    let h = harness(MockChatProvider::new().with_default_response(SCRIPTED_REPLY));
    let entry = seed_entry(&h, SubscriptionTier::Free, WORK_STRESS_ENTRY);

    // Burn the user's whole daily budget up front
    let today = chrono::Utc::now().format("%Y%m%d");
    let key = format!("user:{}:daily:{}", entry.user_id, today);
    h.budget.add(&key, 10_000).await.unwrap();

    let set = h.orchestrator.respond(entry.id).await.unwrap();

    assert!(!set.responses.is_empty());
    assert!(set.responses.iter().all(|r| r.is_fallback));
    assert_eq!(h.provider.call_count(), 0);

    // Fallbacks are still persisted
    assert_eq!(
        h.insights.responses_for_entry(entry.id).len(),
        set.responses.len()
    );
}

#[tokio::test]
async fn provider_outage_degrades_to_fallbacks() {
    let mut provider = MockChatProvider::new();
    // Enough scripted failures to cover every persona and retry
    for _ in 0..16 {
        provider = provider.with_failure(ProviderErrorKind::Server);
    }
    let h = harness(provider);
    let entry = seed_entry(&h, SubscriptionTier::Premium, WORK_STRESS_ENTRY);

    let set = h.orchestrator.respond(entry.id).await.unwrap();

    assert!(!set.responses.is_empty());
    for resp in &set.responses {
        assert!(resp.is_fallback);
        assert!(resp.model.is_none());
        assert!(!resp.text.is_empty());
    }

    // Refunds left the budget counters clean
    let today = chrono::Utc::now().format("%Y%m%d");
    let key = format!("user:{}:daily:{}", entry.user_id, today);
    assert_eq!(h.budget.get(&key).await.unwrap(), 0);
}

#[tokio::test]
async fn malformed_model_output_degrades_to_fallback() {
    let h = harness(MockChatProvider::new().with_default_response("   "));
    let entry = seed_entry(&h, SubscriptionTier::Plus, WORK_STRESS_ENTRY);

    let set = h.orchestrator.respond(entry.id).await.unwrap();
    assert!(set.responses.iter().all(|r| r.is_fallback));
}

#[tokio::test]
async fn disabled_personas_are_never_dispatched() {
    let h = harness(MockChatProvider::new().with_default_response(SCRIPTED_REPLY));
    let user = Uuid::new_v4();
    h.profiles.insert(
        user,
        SubscriptionTier::Plus,
        PersonaPreferences::only(&[PersonaKind::Compass]),
    );
    let entry = JournalEntry::new(user, WORK_STRESS_ENTRY);
    h.journal.insert(entry.clone());

    let set = h.orchestrator.respond(entry.id).await.unwrap();
    let personas: Vec<PersonaKind> = set.responses.iter().map(|r| r.persona).collect();
    assert_eq!(personas, vec![PersonaKind::Compass]);
}

#[tokio::test(start_paused = true)]
async fn pipelines_run_concurrently_not_sequentially() {
    let h = harness(
        MockChatProvider::new()
            .with_default_response(SCRIPTED_REPLY)
            .with_latency(Duration::from_secs(2)),
    );
    let entry = seed_entry(&h, SubscriptionTier::Plus, WORK_STRESS_ENTRY);

    let started = tokio::time::Instant::now();
    let set = h.orchestrator.respond(entry.id).await.unwrap();
    let elapsed = started.elapsed();

    assert!(set.responses.len() >= 2);
    // Wall clock tracks the slowest pipeline, not the sum of them
    assert!(elapsed >= Duration::from_secs(2));
    assert!(
        elapsed < Duration::from_secs(3),
        "pipelines appear to have run sequentially: {elapsed:?}"
    );
}

#[tokio::test]
async fn budget_store_outage_fails_open_on_economy() {
    let h = harness(MockChatProvider::new().with_default_response(SCRIPTED_REPLY));
    let entry = seed_entry(&h, SubscriptionTier::Plus, WORK_STRESS_ENTRY);
    h.budget.set_unreachable(true);

    let set = h.orchestrator.respond(entry.id).await.unwrap();

    // Calls went through, on the cheapest model
    assert!(set.responses.iter().all(|r| !r.is_fallback));
    assert!(set
        .responses
        .iter()
        .all(|r| r.model.as_deref() == Some("gpt-4o-mini")));
}
