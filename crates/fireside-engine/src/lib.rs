//! Fireside orchestration engine.
//!
//! Given a finished journal entry, decides which AI personas should reply,
//! runs their model pipelines concurrently under budget and reliability
//! guards, and delivers validated structured responses either as a batch
//! or as a paced event stream.

pub mod costguard;
pub mod fallback;
pub mod memory;
pub mod orchestrator;
pub mod selector;
pub mod signal;
pub mod synthesizer;

pub use costguard::{AuthorizationDecision, CostGuard, CostGuardConfig, Reservation};
pub use fallback::{EntryContext, FallbackEngine};
pub use orchestrator::{EntryResponseSet, MultiPersonaOrchestrator};
pub use selector::PersonaSelector;
pub use signal::{analyze, EntrySignal};
pub use synthesizer::ResponseSynthesizer;
