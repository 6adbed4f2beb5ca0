//! Shared domain types for the Fireside persona engine.
//!
//! Everything here is either read-only input (journal entries, profiles,
//! preferences), static configuration (the persona roster), or the structured
//! output shape persisted by the insights store.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Journal entries (read-only to the engine)
// ---------------------------------------------------------------------------

/// A user's journal entry. Owned by the journaling subsystem; the engine
/// only ever reads these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub text: String,
    pub created_at: DateTime<Utc>,
    /// Self-reported mood, 0.0 (low) to 1.0 (high).
    pub mood: Option<f32>,
    /// Self-reported energy, 0.0 to 1.0.
    pub energy: Option<f32>,
    /// Self-reported stress, 0.0 (calm) to 1.0 (maxed out).
    pub stress: Option<f32>,
}

impl JournalEntry {
    /// Create a new entry with a fresh id and the current timestamp.
    pub fn new(user_id: Uuid, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            text: text.into(),
            created_at: Utc::now(),
            mood: None,
            energy: None,
            stress: None,
        }
    }

    /// Attach mood/energy/stress scalar ratings (each 0.0-1.0).
    pub fn with_ratings(mut self, mood: f32, energy: f32, stress: f32) -> Self {
        self.mood = Some(mood.clamp(0.0, 1.0));
        self.energy = Some(energy.clamp(0.0, 1.0));
        self.stress = Some(stress.clamp(0.0, 1.0));
        self
    }
}

// ---------------------------------------------------------------------------
// Personas
// ---------------------------------------------------------------------------

/// The fixed set of AI personas.
///
/// Adding a persona means adding a variant here plus a profile entry in
/// [`PersonaRoster::builtin`] — no string-keyed dispatch anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonaKind {
    /// Reflective mentor.
    Sage,
    /// Warm encourager.
    Ember,
    /// Gentle empath.
    Haven,
    /// Practical coach.
    Compass,
}

impl PersonaKind {
    /// All personas in stable order (used for deterministic tie-breaks).
    pub const ALL: [PersonaKind; 4] = [
        PersonaKind::Sage,
        PersonaKind::Ember,
        PersonaKind::Haven,
        PersonaKind::Compass,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PersonaKind::Sage => "sage",
            PersonaKind::Ember => "ember",
            PersonaKind::Haven => "haven",
            PersonaKind::Compass => "compass",
        }
    }
}

impl std::fmt::Display for PersonaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-signal affinities used by the selector to score a persona against an
/// entry. Each weight is 0.0-1.0; higher means the persona cares more about
/// that dimension of the entry signal.
#[derive(Debug, Clone, Copy)]
pub struct StyleWeights {
    /// Affinity for distress (overwhelm, anxiety, low mood).
    pub empathy: f32,
    /// Affinity for upbeat, celebratory content.
    pub celebration: f32,
    /// Affinity for actionable, task-oriented content.
    pub practicality: f32,
    /// Affinity for introspective, meaning-seeking content.
    pub reflection: f32,
}

impl StyleWeights {
    /// Sum of all weights, used to normalize dot products into [0, 1].
    pub fn total(&self) -> f32 {
        self.empathy + self.celebration + self.practicality + self.reflection
    }
}

/// Static profile data for one persona. Loaded at startup, never mutated.
#[derive(Debug, Clone)]
pub struct PersonaProfile {
    pub kind: PersonaKind,
    pub display_name: &'static str,
    /// Short tone descriptor, interpolated into the system prompt.
    pub tone: &'static str,
    pub style: StyleWeights,
    /// Simulated typing speed for stream pacing.
    pub typing_chars_per_sec: f32,
    /// Base recommended delay before this persona replies. Personas with a
    /// slower, more deliberate personality get longer delays.
    pub base_delay_secs: u64,
}

/// The full persona roster. Static configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct PersonaRoster {
    profiles: Vec<PersonaProfile>,
}

impl PersonaRoster {
    /// The built-in roster covering every [`PersonaKind`] variant.
    pub fn builtin() -> Self {
        Self {
            profiles: vec![
                PersonaProfile {
                    kind: PersonaKind::Sage,
                    display_name: "Sage",
                    tone: "a calm, reflective mentor who asks gentle questions",
                    style: StyleWeights {
                        empathy: 0.4,
                        celebration: 0.2,
                        practicality: 0.3,
                        reflection: 0.9,
                    },
                    typing_chars_per_sec: 8.0,
                    base_delay_secs: 3600,
                },
                PersonaProfile {
                    kind: PersonaKind::Ember,
                    display_name: "Ember",
                    tone: "a warm, enthusiastic encourager who celebrates wins",
                    style: StyleWeights {
                        empathy: 0.5,
                        celebration: 0.9,
                        practicality: 0.2,
                        reflection: 0.2,
                    },
                    typing_chars_per_sec: 14.0,
                    base_delay_secs: 300,
                },
                PersonaProfile {
                    kind: PersonaKind::Haven,
                    display_name: "Haven",
                    tone: "a gentle, validating empath who sits with hard feelings",
                    style: StyleWeights {
                        empathy: 0.95,
                        celebration: 0.2,
                        practicality: 0.1,
                        reflection: 0.4,
                    },
                    typing_chars_per_sec: 10.0,
                    base_delay_secs: 60,
                },
                PersonaProfile {
                    kind: PersonaKind::Compass,
                    display_name: "Compass",
                    tone: "a practical, grounded coach who offers small next steps",
                    style: StyleWeights {
                        empathy: 0.3,
                        celebration: 0.2,
                        practicality: 0.9,
                        reflection: 0.3,
                    },
                    typing_chars_per_sec: 12.0,
                    base_delay_secs: 600,
                },
            ],
        }
    }

    pub fn get(&self, kind: PersonaKind) -> Option<&PersonaProfile> {
        self.profiles.iter().find(|p| p.kind == kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PersonaProfile> {
        self.profiles.iter()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

/// Which personas a user has enabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaPreferences {
    pub enabled: Vec<PersonaKind>,
}

impl PersonaPreferences {
    /// All personas enabled (the default for new users).
    pub fn all() -> Self {
        Self {
            enabled: PersonaKind::ALL.to_vec(),
        }
    }

    /// Only the given personas enabled.
    pub fn only(personas: &[PersonaKind]) -> Self {
        Self {
            enabled: personas.to_vec(),
        }
    }

    pub fn is_enabled(&self, kind: PersonaKind) -> bool {
        self.enabled.contains(&kind)
    }
}

impl Default for PersonaPreferences {
    fn default() -> Self {
        Self::all()
    }
}

// ---------------------------------------------------------------------------
// Subscription and model tiers
// ---------------------------------------------------------------------------

/// User subscription tier, read from the profile store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionTier {
    Free,
    Plus,
    Premium,
}

impl SubscriptionTier {
    pub fn daily_token_cap(&self) -> i64 {
        match self {
            SubscriptionTier::Free => crate::defaults::FREE_DAILY_TOKEN_CAP,
            SubscriptionTier::Plus => crate::defaults::PLUS_DAILY_TOKEN_CAP,
            SubscriptionTier::Premium => crate::defaults::PREMIUM_DAILY_TOKEN_CAP,
        }
    }

    pub fn monthly_token_cap(&self) -> i64 {
        match self {
            SubscriptionTier::Free => crate::defaults::FREE_MONTHLY_TOKEN_CAP,
            SubscriptionTier::Plus => crate::defaults::PLUS_MONTHLY_TOKEN_CAP,
            SubscriptionTier::Premium => crate::defaults::PREMIUM_MONTHLY_TOKEN_CAP,
        }
    }

    /// The backing model tier this subscription gets by default.
    pub fn default_model_tier(&self) -> ModelTier {
        match self {
            SubscriptionTier::Free => ModelTier::Economy,
            SubscriptionTier::Plus => ModelTier::Standard,
            SubscriptionTier::Premium => ModelTier::Premium,
        }
    }
}

impl std::fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubscriptionTier::Free => write!(f, "free"),
            SubscriptionTier::Plus => write!(f, "plus"),
            SubscriptionTier::Premium => write!(f, "premium"),
        }
    }
}

/// Backing model tier. CostGuard may downgrade a request to a cheaper tier
/// when the global budget is constrained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelTier {
    Economy,
    Standard,
    Premium,
}

impl ModelTier {
    /// The next cheaper tier, or `None` when already at the bottom.
    pub fn downgrade(&self) -> Option<ModelTier> {
        match self {
            ModelTier::Premium => Some(ModelTier::Standard),
            ModelTier::Standard => Some(ModelTier::Economy),
            ModelTier::Economy => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelTier::Economy => "economy",
            ModelTier::Standard => "standard",
            ModelTier::Premium => "premium",
        }
    }
}

impl std::fmt::Display for ModelTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Selection results
// ---------------------------------------------------------------------------

/// Bounded view of a user's recent activity, assembled by the orchestrator
/// from the journal and insights stores and fed to the selector.
#[derive(Debug, Clone, Default)]
pub struct UserHistory {
    /// Most recent entries first, capped at the configured history limit.
    pub entries: Vec<JournalEntry>,
    /// Responses delivered per persona in the trailing 24 hours.
    /// Feeds the selector's tie-break (load balancing across personas).
    pub responses_last_day: HashMap<PersonaKind, u64>,
}

impl UserHistory {
    pub fn responses_for(&self, kind: PersonaKind) -> u64 {
        self.responses_last_day.get(&kind).copied().unwrap_or(0)
    }
}

/// One selected persona with its relevance score and recommended delay.
#[derive(Debug, Clone)]
pub struct PersonaSelection {
    pub persona: PersonaKind,
    /// Relevance score in [0, 1]; higher is a better fit for this entry.
    pub relevance: f32,
    /// Recommended delay before this persona's reply is delivered. May be
    /// hours for slow-pacing personas; the streaming path clamps it.
    pub delay: Duration,
}

/// Ordered persona selection for one journal entry. Ephemeral — created per
/// request and not persisted.
#[derive(Debug, Clone)]
pub struct SelectionResult {
    pub entry_id: Uuid,
    /// Highest relevance first. May be empty: zero-selection is a valid
    /// outcome meaning "no proactive response this time".
    pub selections: Vec<PersonaSelection>,
}

impl SelectionResult {
    pub fn empty(entry_id: Uuid) -> Self {
        Self {
            entry_id,
            selections: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }

    pub fn len(&self) -> usize {
        self.selections.len()
    }
}

// ---------------------------------------------------------------------------
// Structured responses
// ---------------------------------------------------------------------------

/// Emotional tone of a persona response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmotionalTone {
    Supportive,
    Encouraging,
    Reflective,
    Concerned,
    Celebratory,
    Neutral,
}

impl EmotionalTone {
    /// Parse a tone from model output (case-insensitive, accepts hyphens).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "supportive" => Some(Self::Supportive),
            "encouraging" => Some(Self::Encouraging),
            "reflective" => Some(Self::Reflective),
            "concerned" => Some(Self::Concerned),
            "celebratory" => Some(Self::Celebratory),
            "neutral" => Some(Self::Neutral),
            _ => None,
        }
    }
}

impl std::fmt::Display for EmotionalTone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Supportive => write!(f, "supportive"),
            Self::Encouraging => write!(f, "encouraging"),
            Self::Reflective => write!(f, "reflective"),
            Self::Concerned => write!(f, "concerned"),
            Self::Celebratory => write!(f, "celebratory"),
            Self::Neutral => write!(f, "neutral"),
        }
    }
}

/// Coarse entry sentiment, derived from the entry signal. Drives fallback
/// template choice and the selector's distress/positivity scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Overwhelmed,
    Struggling,
    Neutral,
    Upbeat,
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Overwhelmed => write!(f, "overwhelmed"),
            Self::Struggling => write!(f, "struggling"),
            Self::Neutral => write!(f, "neutral"),
            Self::Upbeat => write!(f, "upbeat"),
        }
    }
}

/// The validated, typed output produced for each persona's reply.
///
/// Invariants: `text` is non-empty and `confidence` is in [0, 1]. Both the
/// synthesizer and the fallback engine uphold these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredPersonaResponse {
    pub persona: PersonaKind,
    pub text: String,
    pub tone: EmotionalTone,
    pub confidence: f32,
    pub topics: Vec<String>,
    pub suggested_actions: Vec<String>,
    /// True when this response was produced locally by the fallback engine
    /// rather than the model. Flagged internally, not necessarily exposed to
    /// the end user.
    pub is_fallback: bool,
    /// Model that produced the response; `None` for fallbacks.
    pub model: Option<String>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roster_covers_every_persona_kind() {
        let roster = PersonaRoster::builtin();
        for kind in PersonaKind::ALL {
            assert!(roster.get(kind).is_some(), "missing profile for {}", kind);
        }
        assert_eq!(roster.len(), PersonaKind::ALL.len());
    }

    #[test]
    fn style_weights_within_unit_range() {
        for profile in PersonaRoster::builtin().iter() {
            let w = profile.style;
            for v in [w.empathy, w.celebration, w.practicality, w.reflection] {
                assert!((0.0..=1.0).contains(&v), "{} weight out of range", profile.kind);
            }
            assert!(w.total() > 0.0);
        }
    }

    #[test]
    fn persona_kind_serde_snake_case() {
        assert_eq!(
            serde_json::to_string(&PersonaKind::Compass).unwrap(),
            "\"compass\""
        );
        let kind: PersonaKind = serde_json::from_str("\"haven\"").unwrap();
        assert_eq!(kind, PersonaKind::Haven);
    }

    #[test]
    fn tier_caps_are_ordered() {
        assert!(SubscriptionTier::Free.daily_token_cap() < SubscriptionTier::Plus.daily_token_cap());
        assert!(
            SubscriptionTier::Plus.daily_token_cap() < SubscriptionTier::Premium.daily_token_cap()
        );
        assert!(
            SubscriptionTier::Free.monthly_token_cap()
                < SubscriptionTier::Premium.monthly_token_cap()
        );
    }

    #[test]
    fn model_tier_downgrade_chain() {
        assert_eq!(ModelTier::Premium.downgrade(), Some(ModelTier::Standard));
        assert_eq!(ModelTier::Standard.downgrade(), Some(ModelTier::Economy));
        assert_eq!(ModelTier::Economy.downgrade(), None);
    }

    #[test]
    fn preferences_default_enables_all() {
        let prefs = PersonaPreferences::default();
        for kind in PersonaKind::ALL {
            assert!(prefs.is_enabled(kind));
        }
    }

    #[test]
    fn preferences_only_restricts() {
        let prefs = PersonaPreferences::only(&[PersonaKind::Haven]);
        assert!(prefs.is_enabled(PersonaKind::Haven));
        assert!(!prefs.is_enabled(PersonaKind::Sage));
    }

    #[test]
    fn emotional_tone_from_str_loose() {
        assert_eq!(
            EmotionalTone::from_str_loose("Supportive"),
            Some(EmotionalTone::Supportive)
        );
        assert_eq!(
            EmotionalTone::from_str_loose("CELEBRATORY"),
            Some(EmotionalTone::Celebratory)
        );
        assert_eq!(EmotionalTone::from_str_loose("sarcastic"), None);
    }

    #[test]
    fn journal_entry_ratings_clamped() {
        let entry = JournalEntry::new(Uuid::new_v4(), "hello").with_ratings(1.5, -0.2, 0.5);
        assert_eq!(entry.mood, Some(1.0));
        assert_eq!(entry.energy, Some(0.0));
        assert_eq!(entry.stress, Some(0.5));
    }

    #[test]
    fn structured_response_serde_round_trip() {
        let resp = StructuredPersonaResponse {
            persona: PersonaKind::Ember,
            text: "Nice work today.".to_string(),
            tone: EmotionalTone::Encouraging,
            confidence: 0.8,
            topics: vec!["gratitude".to_string()],
            suggested_actions: vec![],
            is_fallback: false,
            model: Some("gpt-4o-mini".to_string()),
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"persona\":\"ember\""));
        assert!(json.contains("\"tone\":\"encouraging\""));
        let back: StructuredPersonaResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(back, resp);
    }
}
