//! Multi-persona orchestration.
//!
//! The orchestrator runs the full pipeline for one journal entry: load
//! context, analyze the signal, select personas, then fan the selected
//! personas out as concurrent pipelines (budget authorization, prompt
//! assembly, model call, synthesis). Every pipeline resolves to a response
//! — a failed model call degrades to a local fallback, never to an error
//! for the caller. Two delivery modes share the same pipeline: a batch
//! call returning all responses at once, and a cancellable event stream
//! that paces responses like staggered friends replying.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use fireside_core::config::EngineConfig;
use fireside_core::events::{EngineEvent, EngineEventBus, ResponseEvent, ResponseStream};
use fireside_core::models::{
    JournalEntry, PersonaProfile, PersonaRoster, SelectionResult, StructuredPersonaResponse,
    SubscriptionTier, UserHistory,
};
use fireside_core::traits::{InsightsStore, JournalEntryStore, UserProfileStore};
use fireside_core::{defaults, tokens, Result};
use fireside_model::{CompletionRequest, ModelClient};

use crate::costguard::CostGuard;
use crate::fallback::{EntryContext, FallbackEngine};
use crate::selector::PersonaSelector;
use crate::signal::analyze;
use crate::synthesizer::ResponseSynthesizer;

/// All responses produced for one entry, in selection order.
#[derive(Debug)]
pub struct EntryResponseSet {
    pub entry_id: Uuid,
    pub responses: Vec<StructuredPersonaResponse>,
}

/// The orchestration engine. Cheap to clone; all state is shared.
#[derive(Clone)]
pub struct MultiPersonaOrchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    config: EngineConfig,
    roster: PersonaRoster,
    selector: PersonaSelector,
    synthesizer: ResponseSynthesizer,
    fallback: FallbackEngine,
    costguard: CostGuard,
    client: ModelClient,
    prompt: fireside_model::PromptBuilder,
    journal: Arc<dyn JournalEntryStore>,
    profiles: Arc<dyn UserProfileStore>,
    insights: Arc<dyn InsightsStore>,
    events: EngineEventBus,
}

/// Everything loaded and decided before any persona pipeline runs.
struct Prepared {
    entry: JournalEntry,
    tier: SubscriptionTier,
    history: UserHistory,
    ctx: EntryContext,
    selection: SelectionResult,
}

impl MultiPersonaOrchestrator {
    pub fn new(
        config: EngineConfig,
        client: ModelClient,
        costguard: CostGuard,
        journal: Arc<dyn JournalEntryStore>,
        profiles: Arc<dyn UserProfileStore>,
        insights: Arc<dyn InsightsStore>,
    ) -> Self {
        let roster = PersonaRoster::builtin();
        let selector = PersonaSelector::new(roster.clone(), &config);
        Self {
            inner: Arc::new(Inner {
                selector,
                roster,
                synthesizer: ResponseSynthesizer::new(),
                fallback: FallbackEngine::new(),
                costguard,
                client,
                prompt: fireside_model::PromptBuilder::default(),
                journal,
                profiles,
                insights,
                events: EngineEventBus::default(),
                config,
            }),
        }
    }

    /// The engine's lifecycle event bus.
    pub fn events(&self) -> &EngineEventBus {
        &self.inner.events
    }

    /// Run the full pipeline and return every response at once.
    pub async fn respond(&self, entry_id: Uuid) -> Result<EntryResponseSet> {
        let started = Instant::now();
        let prep = Arc::new(self.inner.prepare(entry_id).await?);

        if prep.selection.is_empty() {
            self.inner.events.emit(EngineEvent::Delivered {
                entry_id,
                responses: 0,
            });
            return Ok(EntryResponseSet {
                entry_id,
                responses: Vec::new(),
            });
        }

        let results = self.inner.run_pipelines(&prep).await;

        // A pipeline slot missing here means the task panicked; resolve it
        // to a fallback so the entry still gets its full set.
        let responses: Vec<StructuredPersonaResponse> = (0..prep.selection.len())
            .map(|i| match results.get(&i) {
                Some(resp) => resp.clone(),
                None => {
                    let persona = prep.selection.selections[i].persona;
                    warn!(entry_id = %entry_id, persona = %persona, "Persona pipeline panicked, using fallback");
                    self.inner.fallback.respond(persona, &prep.ctx)
                }
            })
            .collect();

        self.inner.events.emit(EngineEvent::Delivered {
            entry_id,
            responses: responses.len(),
        });
        info!(
            entry_id = %entry_id,
            responses = responses.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Entry responses delivered"
        );

        Ok(EntryResponseSet {
            entry_id,
            responses,
        })
    }

    /// Run the pipeline and deliver responses as a paced, cancellable event
    /// stream. Responses arrive in selection order, each as `typing` →
    /// `content` → `complete`. Dropping the stream aborts all in-flight
    /// persona work.
    pub async fn respond_stream(&self, entry_id: Uuid) -> Result<ResponseStream> {
        let prep = Arc::new(self.inner.prepare(entry_id).await?);
        let (tx, rx) = mpsc::channel(self.inner.config.stream_buffer);

        if prep.selection.is_empty() {
            self.inner.events.emit(EngineEvent::Delivered {
                entry_id,
                responses: 0,
            });
            // tx dropped here; the stream ends immediately
            return Ok(ResponseStream::new(rx));
        }

        let inner = self.inner.clone();
        let driver = tokio::spawn(async move {
            inner.drive_stream(prep, tx).await;
        });

        Ok(ResponseStream::with_abort(rx, driver.abort_handle()))
    }
}

impl Inner {
    /// Load entry context and run selection. Store failures on the
    /// *required* data (entry, profile) surface as errors; history and
    /// response counts degrade to empty with a warning.
    async fn prepare(&self, entry_id: Uuid) -> Result<Prepared> {
        let entry = self.journal.get_entry(entry_id).await?;
        let (tier, preferences) = self.profiles.get_tier_and_preferences(entry.user_id).await?;

        let entries = match self
            .journal
            .get_recent_entries(entry.user_id, self.config.max_history)
            .await
        {
            Ok(entries) => entries,
            Err(e) => {
                warn!(entry_id = %entry_id, error = %e, "Failed to load history, scoring without it");
                Vec::new()
            }
        };
        let responses_last_day = match self
            .insights
            .count_recent_responses(entry.user_id, chrono::Utc::now() - chrono::Duration::hours(24))
            .await
        {
            Ok(counts) => counts,
            Err(e) => {
                warn!(entry_id = %entry_id, error = %e, "Failed to load response counts, ignoring");
                Default::default()
            }
        };
        let history = UserHistory {
            entries,
            responses_last_day,
        };

        self.events.emit(EngineEvent::SelectionStarted { entry_id });
        let signal = analyze(&entry, &history);
        let selection = self
            .selector
            .select_with_signal(&entry, &preferences, &history, &signal)?;
        self.events.emit(EngineEvent::PersonasSelected {
            entry_id,
            selected: selection.len(),
        });

        Ok(Prepared {
            ctx: EntryContext {
                entry_id,
                sentiment: signal.sentiment,
                topics: signal.topics,
            },
            entry,
            tier,
            history,
            selection,
        })
    }

    /// Fan the selected personas out under the concurrency cap and collect
    /// results by selection index. Panicked pipelines simply never insert.
    async fn run_pipelines(
        self: &Arc<Self>,
        prep: &Arc<Prepared>,
    ) -> BTreeMap<usize, StructuredPersonaResponse> {
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency_cap));
        let mut join_set = JoinSet::new();

        for index in 0..prep.selection.len() {
            let inner = self.clone();
            let prep = prep.clone();
            let semaphore = semaphore.clone();
            join_set.spawn(async move {
                // Closed only if the JoinSet is dropped, which tears this
                // task down with it
                let _permit = semaphore.acquire_owned().await;
                let response = inner.run_pipeline(&prep, index).await;
                (index, response)
            });
        }

        let mut results = BTreeMap::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, response)) => {
                    results.insert(index, response);
                }
                Err(e) if e.is_panic() => {
                    warn!(entry_id = %prep.ctx.entry_id, "Persona pipeline task panicked");
                }
                Err(_) => {}
            }
        }
        results
    }

    /// One persona's pipeline: authorize budget, build the prompt, call the
    /// model, synthesize. Never returns an error: every failure path
    /// resolves to the fallback response. Persists the final response
    /// before returning.
    async fn run_pipeline(
        self: &Arc<Self>,
        prep: &Arc<Prepared>,
        index: usize,
    ) -> StructuredPersonaResponse {
        let started = Instant::now();
        let persona = prep.selection.selections[index].persona;
        let entry_id = prep.ctx.entry_id;

        let response = match self.roster.get(persona) {
            Some(profile) => self.try_model_response(prep, profile).await,
            None => None,
        };
        let (response, is_fallback) = match response {
            Some(response) => (response, false),
            None => (self.fallback.respond(persona, &prep.ctx), true),
        };

        if let Err(e) = self
            .insights
            .put_response(entry_id, prep.entry.user_id, &response)
            .await
        {
            warn!(entry_id = %entry_id, persona = %persona, error = %e, "Failed to persist response");
        }

        self.events.emit(EngineEvent::PersonaCompleted {
            entry_id,
            persona,
            is_fallback,
            duration_ms: started.elapsed().as_millis() as u64,
        });

        response
    }

    /// The model-backed path. `None` means "use the fallback".
    async fn try_model_response(
        self: &Arc<Self>,
        prep: &Arc<Prepared>,
        profile: &PersonaProfile,
    ) -> Option<StructuredPersonaResponse> {
        let persona = profile.kind;
        let entry_id = prep.ctx.entry_id;

        let messages = self.prompt.build(profile, &prep.entry, &prep.history.entries);
        let prompt_text: String = messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let estimate = tokens::estimate_call_tokens(&prompt_text);

        let decision = self
            .costguard
            .authorize(
                prep.entry.user_id,
                prep.tier,
                prep.tier.default_model_tier(),
                estimate,
            )
            .await;
        if !decision.allowed {
            debug!(
                entry_id = %entry_id,
                persona = %persona,
                reason = decision.reason,
                fail_open = decision.fail_open,
                "Budget denied, using fallback"
            );
            return None;
        }

        self.events.emit(EngineEvent::PersonaDispatched {
            entry_id,
            persona,
            model_tier: decision.effective_tier,
        });

        let model = self.config.model_for_tier(decision.effective_tier);
        let mut request = CompletionRequest::new(model, messages);
        request.max_tokens = Some(defaults::COMPLETION_TOKEN_ESTIMATE as u32);

        let outcome = timeout(self.config.persona_call_timeout, self.client.complete(&request)).await;
        let completion = match outcome {
            Ok(Ok(completion)) => completion,
            Ok(Err(e)) => {
                warn!(entry_id = %entry_id, persona = %persona, error = %e, "Model call failed, using fallback");
                if let Some(reservation) = &decision.reservation {
                    self.costguard.refund(reservation).await;
                }
                return None;
            }
            Err(_) => {
                warn!(entry_id = %entry_id, persona = %persona, "Model call timed out, using fallback");
                if let Some(reservation) = &decision.reservation {
                    self.costguard.refund(reservation).await;
                }
                return None;
            }
        };

        // Correct the optimistic reservation against reported usage
        if let Some(reservation) = &decision.reservation {
            let actual = completion
                .usage
                .map(|u| u.total() as i64)
                .unwrap_or(reservation.estimate);
            self.costguard.reconcile(reservation, actual).await;
        }

        match self
            .synthesizer
            .synthesize(persona, &completion.text, &completion.model)
        {
            Ok(response) => Some(response),
            Err(e) => {
                warn!(entry_id = %entry_id, persona = %persona, error = %e, "Unusable model output, using fallback");
                None
            }
        }
    }

    /// Driver task for the streaming path: run the pipelines, then deliver
    /// in selection order with typing indicators and pacing pauses.
    async fn drive_stream(
        self: Arc<Self>,
        prep: Arc<Prepared>,
        tx: mpsc::Sender<ResponseEvent>,
    ) {
        let entry_id = prep.ctx.entry_id;
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency_cap));
        let mut join_set = JoinSet::new();

        for index in 0..prep.selection.len() {
            let inner = self.clone();
            let prep = prep.clone();
            let semaphore = semaphore.clone();
            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let response = inner.run_pipeline(&prep, index).await;
                (index, response)
            });
        }

        let mut ready: BTreeMap<usize, StructuredPersonaResponse> = BTreeMap::new();
        let mut next = 0usize;
        let mut delivered = 0usize;

        while let Some(joined) = join_set.join_next().await {
            if let Ok((index, response)) = joined {
                ready.insert(index, response);
            }
            while let Some(response) = ready.remove(&next) {
                if self.deliver(&prep, next, response, &tx).await.is_err() {
                    // Receiver gone; stop doing work for it
                    return;
                }
                delivered += 1;
                next += 1;
            }
        }

        // Any index never joined belongs to a panicked pipeline: close its
        // slot abnormally so consumers are not left waiting.
        for index in next..prep.selection.len() {
            let persona = prep.selection.selections[index].persona;
            if let Some(response) = ready.remove(&index) {
                if self.deliver(&prep, index, response, &tx).await.is_err() {
                    return;
                }
                delivered += 1;
                continue;
            }
            let _ = tx
                .send(ResponseEvent::Error {
                    persona,
                    message: "persona pipeline terminated abnormally".to_string(),
                })
                .await;
            let _ = tx.send(ResponseEvent::Complete { persona }).await;
        }

        self.events.emit(EngineEvent::Delivered {
            entry_id,
            responses: delivered,
        });
        info!(entry_id = %entry_id, responses = delivered, "Entry response stream complete");
    }

    /// Deliver one persona's turn: typing, a pacing pause scaled down from
    /// the recommended delay, then content and completion.
    async fn deliver(
        &self,
        prep: &Prepared,
        index: usize,
        response: StructuredPersonaResponse,
        tx: &mpsc::Sender<ResponseEvent>,
    ) -> std::result::Result<(), mpsc::error::SendError<ResponseEvent>> {
        let selection = &prep.selection.selections[index];
        let persona = selection.persona;

        tx.send(ResponseEvent::Typing { persona }).await?;

        // Recommended delays may be hours; a live connection gets a token
        // pause instead.
        let pause = selection.delay.min(self.config.pacing_cap);
        if pause > Duration::ZERO {
            tokio::time::sleep(pause).await;
        }

        tx.send(ResponseEvent::Content { persona, response }).await?;
        tx.send(ResponseEvent::Complete { persona }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::costguard::CostGuardConfig;
    use crate::memory::{
        InMemoryBudgetStore, InMemoryInsightsStore, InMemoryJournalStore, InMemoryProfileStore,
    };
    use fireside_core::models::PersonaPreferences;
    use fireside_core::Error;
    use fireside_model::mock::MockChatProvider;

    fn orchestrator(provider: MockChatProvider) -> (MultiPersonaOrchestrator, Arc<InMemoryJournalStore>, Arc<InMemoryProfileStore>) {
        let journal = Arc::new(InMemoryJournalStore::new());
        let profiles = Arc::new(InMemoryProfileStore::new());
        let insights = Arc::new(InMemoryInsightsStore::new());
        let budget = Arc::new(InMemoryBudgetStore::new());
        let orchestrator = MultiPersonaOrchestrator::new(
            EngineConfig::default(),
            ModelClient::new(Arc::new(provider)),
            CostGuard::new(budget, CostGuardConfig::default()),
            journal.clone(),
            profiles.clone(),
            insights,
        );
        (orchestrator, journal, profiles)
    }

    #[tokio::test]
    async fn unknown_entry_is_an_error() {
        let (orchestrator, _, _) = orchestrator(MockChatProvider::new());
        let err = orchestrator.respond(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, Error::EntryNotFound(_)));
    }

    #[tokio::test]
    async fn unknown_user_is_an_error() {
        let (orchestrator, journal, _) = orchestrator(MockChatProvider::new());
        let entry = JournalEntry::new(Uuid::new_v4(), "hello there");
        journal.insert(entry.clone());

        let err = orchestrator.respond(entry.id).await.unwrap_err();
        assert!(matches!(err, Error::UserNotFound(_)));
    }

    #[tokio::test]
    async fn mundane_entry_yields_empty_set() {
        let (orchestrator, journal, profiles) = orchestrator(MockChatProvider::new());
        let user = Uuid::new_v4();
        profiles.insert(user, SubscriptionTier::Plus, PersonaPreferences::all());
        let entry = JournalEntry::new(user, "Had toast. It rained a bit.");
        journal.insert(entry.clone());

        let set = orchestrator.respond(entry.id).await.unwrap();
        assert!(set.responses.is_empty());
    }

    #[tokio::test]
    async fn empty_selection_stream_ends_immediately() {
        use futures::StreamExt;

        let (orchestrator, journal, profiles) = orchestrator(MockChatProvider::new());
        let user = Uuid::new_v4();
        profiles.insert(user, SubscriptionTier::Plus, PersonaPreferences::all());
        let entry = JournalEntry::new(user, "Had toast. It rained a bit.");
        journal.insert(entry.clone());

        let mut stream = orchestrator.respond_stream(entry.id).await.unwrap();
        assert!(stream.next().await.is_none());
    }
}
