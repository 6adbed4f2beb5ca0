//! Persona selection.
//!
//! Scores every enabled persona against the entry signal and keeps those
//! above the relevance threshold, ordered by relevance. Zero selections is
//! a valid outcome: a mundane entry gets no proactive reply rather than a
//! forced one.

use std::time::Duration;

use tracing::{debug, warn};

use fireside_core::config::EngineConfig;
use fireside_core::models::{
    JournalEntry, PersonaPreferences, PersonaRoster, PersonaSelection, SelectionResult,
    StyleWeights, UserHistory,
};
use fireside_core::{defaults, Error, Result};

use crate::signal::{analyze, EntrySignal};

/// Scores personas for an entry and produces an ordered selection.
pub struct PersonaSelector {
    roster: PersonaRoster,
    relevance_threshold: f32,
}

impl PersonaSelector {
    pub fn new(roster: PersonaRoster, config: &EngineConfig) -> Self {
        Self {
            roster,
            relevance_threshold: config.relevance_threshold,
        }
    }

    /// Select personas for an entry, analyzing the signal internally.
    pub fn select(
        &self,
        entry: &JournalEntry,
        preferences: &PersonaPreferences,
        history: &UserHistory,
    ) -> Result<SelectionResult> {
        let signal = analyze(entry, history);
        self.select_with_signal(entry, preferences, history, &signal)
    }

    /// Select personas against an already-computed signal. The orchestrator
    /// uses this form so the signal is analyzed once and shared with the
    /// fallback path.
    pub fn select_with_signal(
        &self,
        entry: &JournalEntry,
        preferences: &PersonaPreferences,
        history: &UserHistory,
        signal: &EntrySignal,
    ) -> Result<SelectionResult> {
        if entry.text.trim().is_empty() {
            return Err(Error::InvalidInput("journal entry text is empty".into()));
        }

        let mut scored: Vec<(PersonaSelection, u64)> = Vec::new();
        for profile in self.roster.iter() {
            if !preferences.is_enabled(profile.kind) {
                continue;
            }
            let relevance = relevance(&profile.style, signal);
            if relevance.is_nan() {
                warn!(persona = %profile.kind, "Relevance score was NaN, skipping persona");
                continue;
            }
            debug!(
                entry_id = %entry.id,
                persona = %profile.kind,
                relevance,
                "Persona scored"
            );
            if relevance < self.relevance_threshold {
                continue;
            }
            scored.push((
                PersonaSelection {
                    persona: profile.kind,
                    relevance,
                    delay: Duration::from_secs(profile.base_delay_secs),
                },
                history.responses_for(profile.kind),
            ));
        }

        // Highest relevance first. Ties go to the persona that has replied
        // least in the last day, then to roster order, keeping the result
        // deterministic.
        scored.sort_by(|(a, a_recent), (b, b_recent)| {
            b.relevance
                .partial_cmp(&a.relevance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a_recent.cmp(b_recent))
                .then(persona_rank(a).cmp(&persona_rank(b)))
        });

        // Stagger recommended delays so replies trickle in rather than
        // arriving as one burst.
        let selections: Vec<PersonaSelection> = scored
            .into_iter()
            .enumerate()
            .map(|(i, (mut sel, _))| {
                sel.delay += Duration::from_secs(i as u64 * defaults::DELAY_STAGGER_SECS);
                sel
            })
            .collect();

        debug!(
            entry_id = %entry.id,
            selected_count = selections.len(),
            "Selection complete"
        );

        Ok(SelectionResult {
            entry_id: entry.id,
            selections,
        })
    }
}

fn persona_rank(sel: &PersonaSelection) -> usize {
    fireside_core::models::PersonaKind::ALL
        .iter()
        .position(|k| *k == sel.persona)
        .unwrap_or(usize::MAX)
}

/// Normalized dot product of persona style against the entry signal,
/// in [0, 1].
fn relevance(style: &StyleWeights, signal: &EntrySignal) -> f32 {
    let dot = style.empathy * signal.distress
        + style.celebration * signal.positivity
        + style.practicality * signal.actionability
        + style.reflection * signal.introspection;
    let total = style.total();
    if total <= 0.0 {
        return 0.0;
    }
    dot / total
}
