//! Prompt assembly with context-window budgeting.
//!
//! Builds the per-persona message list: persona system instructions, a
//! bounded block of recent-entry context, and the current entry. When the
//! assembled prompt would exceed the token budget, the *oldest* history
//! lines are dropped first — the current entry is never truncated.

use fireside_core::models::{JournalEntry, PersonaProfile};
use fireside_core::{defaults, tokens};

use crate::provider::ChatMessage;

/// Prompt builder with a fixed token budget.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    pub token_budget: usize,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self {
            token_budget: defaults::PROMPT_TOKEN_BUDGET,
        }
    }
}

impl PromptBuilder {
    pub fn new(token_budget: usize) -> Self {
        Self { token_budget }
    }

    /// Build the message list for one persona call.
    ///
    /// `history` is expected newest-first (as returned by the journal
    /// store); it is rendered chronologically in the prompt.
    pub fn build(
        &self,
        profile: &PersonaProfile,
        entry: &JournalEntry,
        history: &[JournalEntry],
    ) -> Vec<ChatMessage> {
        let system = self.system_prompt(profile);

        let fixed_cost = tokens::estimate_tokens(&system) as usize
            + tokens::estimate_tokens(&entry.text) as usize;
        let history_budget = self.token_budget.saturating_sub(fixed_cost);

        // Walk newest-first, keeping lines while they fit; oldest context
        // falls off first.
        let mut kept: Vec<String> = Vec::new();
        let mut used = 0usize;
        for past in history {
            if past.id == entry.id {
                continue;
            }
            let line = format!("{}: {}", past.created_at.format("%Y-%m-%d"), past.text);
            let cost = tokens::estimate_tokens(&line) as usize;
            if used + cost > history_budget {
                break;
            }
            used += cost;
            kept.push(line);
        }
        // Chronological order for the model
        kept.reverse();

        let user = if kept.is_empty() {
            format!("Today's journal entry:\n{}", entry.text)
        } else {
            format!(
                "Recent journal entries for context:\n{}\n\nToday's journal entry:\n{}",
                kept.join("\n"),
                entry.text
            )
        };

        vec![ChatMessage::system(system), ChatMessage::user(user)]
    }

    fn system_prompt(&self, profile: &PersonaProfile) -> String {
        format!(
            "You are {name}, {tone}, responding to a private wellness journal. \
             Write a short, personal reply to today's entry (2-4 sentences). \
             Respond with a JSON object with these fields: \
             \"text\" (your reply), \
             \"tone\" (one of: supportive, encouraging, reflective, concerned, celebratory, neutral), \
             \"confidence\" (0.0-1.0, how well your reply fits the entry), \
             \"topics\" (short tags for themes you noticed), \
             \"suggested_actions\" (0-3 small concrete suggestions, may be empty). \
             Do not mention being an AI.",
            name = profile.display_name,
            tone = profile.tone,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use fireside_core::models::{PersonaKind, PersonaRoster};
    use uuid::Uuid;

    fn profile() -> PersonaProfile {
        PersonaRoster::builtin()
            .get(PersonaKind::Haven)
            .unwrap()
            .clone()
    }

    fn entry(text: &str) -> JournalEntry {
        JournalEntry::new(Uuid::new_v4(), text)
    }

    fn history(n: usize, each_len: usize) -> Vec<JournalEntry> {
        let user = Uuid::new_v4();
        (0..n)
            .map(|i| {
                let mut e = JournalEntry::new(user, "x".repeat(each_len));
                e.created_at = Utc::now() - Duration::days(i as i64 + 1);
                e
            })
            .collect()
    }

    #[test]
    fn system_then_user_message() {
        let builder = PromptBuilder::default();
        let messages = builder.build(&profile(), &entry("rough day"), &[]);
        assert_eq!(messages.len(), 2);
        assert!(messages[0].content.contains("Haven"));
        assert!(messages[1].content.contains("rough day"));
    }

    #[test]
    fn current_entry_never_truncated() {
        // Budget far too small for anything, entry still included verbatim
        let builder = PromptBuilder::new(10);
        let long_entry = entry(&"today was a lot. ".repeat(50));
        let messages = builder.build(&profile(), &long_entry, &history(5, 200));
        assert!(messages[1].content.contains(long_entry.text.trim_end()));
    }

    #[test]
    fn oldest_history_dropped_first() {
        // Budget fits roughly two history lines beyond the fixed cost
        let hist = history(10, 400);
        let per_line = tokens::estimate_tokens(&format!(
            "{}: {}",
            hist[0].created_at.format("%Y-%m-%d"),
            hist[0].text
        )) as usize;
        let e = entry("short");
        let builder = PromptBuilder::default();
        let fixed = tokens::estimate_tokens(&builder.system_prompt(&profile())) as usize
            + tokens::estimate_tokens(&e.text) as usize;
        let builder = PromptBuilder::new(fixed + per_line * 2 + 1);

        let messages = builder.build(&profile(), &e, &hist);
        let body = &messages[1].content;

        // The two newest history entries survive, older ones are gone
        let day = |i: usize| hist[i].created_at.format("%Y-%m-%d").to_string();
        assert!(body.contains(&day(0)));
        assert!(body.contains(&day(1)));
        assert!(!body.contains(&day(5)));
    }

    #[test]
    fn history_rendered_chronologically() {
        let hist = history(3, 10);
        let builder = PromptBuilder::default();
        let body = builder.build(&profile(), &entry("hello"), &hist)[1]
            .content
            .clone();
        let oldest = body
            .find(&hist[2].created_at.format("%Y-%m-%d").to_string())
            .unwrap();
        let newest = body
            .find(&hist[0].created_at.format("%Y-%m-%d").to_string())
            .unwrap();
        assert!(oldest < newest);
    }

    #[test]
    fn current_entry_excluded_from_history_block() {
        let e = entry("today");
        let mut hist = history(2, 10);
        hist.insert(0, e.clone());
        let builder = PromptBuilder::default();
        let body = builder.build(&profile(), &e, &hist)[1].content.clone();
        // "today" appears exactly once (the current entry, not duplicated
        // from history)
        assert_eq!(body.matches("today").count(), 1);
    }
}
