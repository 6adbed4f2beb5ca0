//! Core types, traits, and abstractions for the Fireside persona engine.
//!
//! This crate is the bottom of the workspace: shared domain models, the
//! error type, store traits, the event surfaces, token estimation, and
//! runtime configuration. It contains no I/O of its own — the model client
//! lives in `fireside-model` and the orchestration logic in
//! `fireside-engine`.

pub mod config;
pub mod defaults;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod tokens;
pub mod traits;

pub use config::EngineConfig;
pub use error::{Error, ProviderErrorKind, Result};
pub use events::{EngineEvent, EngineEventBus, ResponseEvent, ResponseStream};
pub use models::{
    EmotionalTone, JournalEntry, ModelTier, PersonaKind, PersonaPreferences, PersonaProfile,
    PersonaRoster, PersonaSelection, SelectionResult, Sentiment, StructuredPersonaResponse,
    StyleWeights, SubscriptionTier, UserHistory,
};
pub use traits::{BudgetStore, InsightsStore, JournalEntryStore, UserProfileStore};
