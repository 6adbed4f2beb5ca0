//! Response synthesis: raw model output → validated structured response.
//!
//! Models are asked for JSON but do not reliably produce it, so parsing is
//! a cascade: strict JSON, then a fenced code block, then the outermost
//! brace span, then plain prose as a last resort. Synthesis is pure — the
//! same input always yields byte-identical output — which keeps retries
//! and replays safe.

use serde::Deserialize;
use tracing::debug;

use fireside_core::models::{EmotionalTone, PersonaKind, StructuredPersonaResponse};
use fireside_core::{Error, Result};

/// Confidence assumed when the model reports none.
const DEFAULT_CONFIDENCE: f32 = 0.7;

/// Penalty for replies too short to be a real response.
const SHORT_TEXT_PENALTY: f32 = 0.2;
const SHORT_TEXT_CHARS: usize = 40;

/// Penalty per boilerplate phrase that breaks the persona illusion.
const FILLER_PENALTY: f32 = 0.1;
const FILLER_PHRASES: [&str; 4] = [
    "as an ai",
    "as a language model",
    "i'm sorry, but i",
    "i cannot help with",
];

/// What the model was asked to produce. Field aliases absorb the usual
/// drift in model output.
#[derive(Debug, Deserialize)]
struct RawResponse {
    #[serde(alias = "response", alias = "reply", alias = "message")]
    text: String,
    #[serde(default)]
    tone: Option<String>,
    #[serde(default)]
    confidence: Option<f32>,
    #[serde(default, alias = "themes")]
    topics: Vec<String>,
    #[serde(default, alias = "actions", alias = "suggestions")]
    suggested_actions: Vec<String>,
}

/// Turns raw model output into a validated [`StructuredPersonaResponse`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseSynthesizer;

impl ResponseSynthesizer {
    pub fn new() -> Self {
        Self
    }

    /// Synthesize a structured response from raw model output.
    ///
    /// Errors with `MalformedResponse` only when no reply text can be
    /// recovered at all.
    pub fn synthesize(
        &self,
        persona: PersonaKind,
        raw: &str,
        model: &str,
    ) -> Result<StructuredPersonaResponse> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::MalformedResponse("model returned no text".into()));
        }

        let (parsed, structured) = match parse_json_cascade(trimmed) {
            Some(parsed) => (parsed, true),
            None => {
                debug!(persona = %persona, "Model output was not JSON, treating as prose");
                (
                    RawResponse {
                        text: trimmed.to_string(),
                        tone: None,
                        confidence: None,
                        topics: Vec::new(),
                        suggested_actions: Vec::new(),
                    },
                    false,
                )
            }
        };

        let text = parsed.text.trim().to_string();
        if text.is_empty() {
            return Err(Error::MalformedResponse(
                "model response contained an empty reply".into(),
            ));
        }

        let tone = parsed
            .tone
            .as_deref()
            .and_then(EmotionalTone::from_str_loose)
            .unwrap_or_else(|| default_tone(persona));

        let confidence = score_confidence(parsed.confidence, &text, structured);

        Ok(StructuredPersonaResponse {
            persona,
            text,
            tone,
            confidence,
            topics: parsed.topics,
            suggested_actions: parsed.suggested_actions,
            is_fallback: false,
            model: Some(model.to_string()),
        })
    }
}

/// Strict JSON, then fenced block, then outermost braces.
fn parse_json_cascade(raw: &str) -> Option<RawResponse> {
    if let Ok(parsed) = serde_json::from_str::<RawResponse>(raw) {
        return Some(parsed);
    }
    if let Some(fenced) = extract_fenced(raw) {
        if let Ok(parsed) = serde_json::from_str::<RawResponse>(fenced) {
            return Some(parsed);
        }
    }
    if let Some(braced) = extract_braced(raw) {
        if let Ok(parsed) = serde_json::from_str::<RawResponse>(braced) {
            return Some(parsed);
        }
    }
    None
}

/// Contents of the first ``` fence (with or without a `json` tag).
fn extract_fenced(raw: &str) -> Option<&str> {
    let start = raw.find("```")?;
    let after = &raw[start + 3..];
    let body_start = after.find('\n')? + 1;
    let body = &after[body_start..];
    let end = body.find("```")?;
    Some(body[..end].trim())
}

/// The span from the first `{` to the last `}`.
fn extract_braced(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end > start {
        Some(&raw[start..=end])
    } else {
        None
    }
}

fn default_tone(persona: PersonaKind) -> EmotionalTone {
    match persona {
        PersonaKind::Sage => EmotionalTone::Reflective,
        PersonaKind::Ember => EmotionalTone::Encouraging,
        PersonaKind::Haven => EmotionalTone::Supportive,
        PersonaKind::Compass => EmotionalTone::Neutral,
    }
}

/// Blend the reported confidence with local quality checks.
fn score_confidence(reported: Option<f32>, text: &str, structured: bool) -> f32 {
    // Prose that ignored the JSON instructions starts lower
    let base = reported
        .map(|c| c.clamp(0.0, 1.0))
        .unwrap_or(if structured { DEFAULT_CONFIDENCE } else { 0.5 });

    let mut confidence = base;
    if text.chars().count() < SHORT_TEXT_CHARS {
        confidence -= SHORT_TEXT_PENALTY;
    }
    let lower = text.to_lowercase();
    for phrase in FILLER_PHRASES {
        if lower.contains(phrase) {
            confidence -= FILLER_PENALTY;
        }
    }
    confidence.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthesize(raw: &str) -> Result<StructuredPersonaResponse> {
        ResponseSynthesizer::new().synthesize(PersonaKind::Haven, raw, "gpt-4o-mini")
    }

    #[test]
    fn strict_json_parsed() {
        let raw = r#"{"text":"That sounds genuinely hard. You're carrying a lot right now.","tone":"supportive","confidence":0.9,"topics":["work_stress"],"suggested_actions":["take a short walk"]}"#;
        let resp = synthesize(raw).unwrap();
        assert_eq!(resp.tone, EmotionalTone::Supportive);
        assert!((resp.confidence - 0.9).abs() < 1e-6);
        assert_eq!(resp.topics, vec!["work_stress"]);
        assert!(!resp.is_fallback);
        assert_eq!(resp.model.as_deref(), Some("gpt-4o-mini"));
    }

    #[test]
    fn fenced_json_parsed() {
        let raw = "Here is my response:\n```json\n{\"text\":\"Deep breath. One deadline at a time, you will get through this week.\",\"tone\":\"encouraging\"}\n```";
        let resp = synthesize(raw).unwrap();
        assert!(resp.text.starts_with("Deep breath."));
        assert_eq!(resp.tone, EmotionalTone::Encouraging);
    }

    #[test]
    fn braced_span_parsed() {
        let raw = "Sure! {\"text\":\"I hear how much pressure you are under lately, and it makes sense.\"} Hope that helps.";
        let resp = synthesize(raw).unwrap();
        assert!(resp.text.starts_with("I hear"));
        // No tone in the payload: persona default applies
        assert_eq!(resp.tone, EmotionalTone::Supportive);
    }

    #[test]
    fn prose_fallback_keeps_text() {
        let raw = "You deserve rest after a week like that. Try to protect your evening tonight.";
        let resp = synthesize(raw).unwrap();
        assert_eq!(resp.text, raw);
        assert!((resp.confidence - 0.5).abs() < 1e-6);
    }

    #[test]
    fn alias_fields_accepted() {
        let raw = r#"{"reply":"Celebrate this one properly, you earned every bit of it today!","themes":["gratitude"],"actions":["tell a friend"]}"#;
        let resp = synthesize(raw).unwrap();
        assert!(resp.text.starts_with("Celebrate"));
        assert_eq!(resp.topics, vec!["gratitude"]);
        assert_eq!(resp.suggested_actions, vec!["tell a friend"]);
    }

    #[test]
    fn unknown_tone_falls_back_to_persona_default() {
        let raw = r#"{"text":"Sending you a lot of warmth for the tough stretch you described.","tone":"sarcastic"}"#;
        let resp = synthesize(raw).unwrap();
        assert_eq!(resp.tone, EmotionalTone::Supportive);
    }

    #[test]
    fn out_of_range_confidence_clamped() {
        let raw = r#"{"text":"You showed up for yourself today and that matters more than you think.","confidence":3.2}"#;
        let resp = synthesize(raw).unwrap();
        assert!(resp.confidence <= 1.0);
    }

    #[test]
    fn short_text_penalized() {
        let long = synthesize(r#"{"text":"A longer reply that easily clears the minimum length bar.","confidence":0.8}"#).unwrap();
        let short = synthesize(r#"{"text":"Nice work!","confidence":0.8}"#).unwrap();
        assert!(short.confidence < long.confidence);
    }

    #[test]
    fn filler_phrases_penalized() {
        let clean = synthesize(r#"{"text":"Taking the evening off sounds exactly right after that week.","confidence":0.8}"#).unwrap();
        let filler = synthesize(r#"{"text":"As an AI, I think taking the evening off sounds right after that week.","confidence":0.8}"#).unwrap();
        assert!(filler.confidence < clean.confidence);
    }

    #[test]
    fn empty_output_is_malformed() {
        assert!(matches!(
            synthesize("   "),
            Err(Error::MalformedResponse(_))
        ));
        assert!(matches!(
            synthesize(r#"{"text":"  "}"#),
            Err(Error::MalformedResponse(_))
        ));
    }

    #[test]
    fn synthesis_is_deterministic() {
        let raw = r#"{"text":"Same input, same output, every single time it is asked to run.","confidence":0.6}"#;
        let a = synthesize(raw).unwrap();
        let b = synthesize(raw).unwrap();
        assert_eq!(a, b);
    }
}
