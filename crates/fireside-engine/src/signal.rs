//! Entry signal analysis.
//!
//! Turns a raw journal entry (plus optional self-reported ratings and
//! recent history) into the numeric signal the selector scores personas
//! against. Keyword lexicons are deliberately simple: the signal only has
//! to rank persona fit, not understand the entry. The model sees the full
//! text later; this stage never calls the provider.

use once_cell::sync::Lazy;
use regex::Regex;

use fireside_core::models::{JournalEntry, Sentiment, UserHistory};

/// Numeric signal derived from one entry. All scores are in [0, 1].
#[derive(Debug, Clone)]
pub struct EntrySignal {
    /// Topic tags detected in the entry text.
    pub topics: Vec<String>,
    /// Coarse sentiment bucket, derived from the scores below.
    pub sentiment: Sentiment,
    /// Overwhelm, anxiety, low mood.
    pub distress: f32,
    /// Upbeat, celebratory content.
    pub positivity: f32,
    /// Task-oriented, actionable content.
    pub actionability: f32,
    /// Meaning-seeking, self-examining content.
    pub introspection: f32,
    /// Current mood minus the recent-history average; negative means the
    /// user is trending down. `None` without enough rated entries.
    pub mood_trend: Option<f32>,
}

/// Score added per matched keyword group, capped at 1.0.
const SCORE_PER_MATCH: f32 = 0.3;

/// Mood-trend drop that starts nudging distress upward.
const TREND_ALERT: f32 = -0.2;

static TOPIC_LEXICON: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        (
            "work_stress",
            r"(?i)\b(deadlines?|managers?|boss|workload|overtime|job|meetings?|coworkers?)\b",
        ),
        ("sleep", r"(?i)\b(sleep|sleeping|insomnia|tired|exhausted)\b"),
        (
            "relationships",
            r"(?i)\b(friends?|partner|wife|husband|boyfriend|girlfriend|relationship)\b",
        ),
        (
            "family",
            r"(?i)\b(family|mom|dad|mother|father|kids?|children|sister|brother)\b",
        ),
        (
            "health",
            r"(?i)\b(doctor|sick|illness|pain|headaches?|migraine|health)\b",
        ),
        (
            "exercise",
            r"(?i)\b(gym|running|workout|exercise|hike|hiking|yoga)\b",
        ),
        (
            "gratitude",
            r"(?i)\b(grateful|gratitude|thankful|appreciate[ds]?)\b",
        ),
        ("anxiety", r"(?i)\b(anxious|anxiety|panic|worried|worry)\b"),
    ]
    .into_iter()
    .map(|(name, pattern)| (name, Regex::new(pattern).expect("static topic regex")))
    .collect()
});

static DISTRESS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?i)\boverwhelm\w*\b",
        r"(?i)\b(anxious|anxiety|panic)\b",
        r"(?i)\bstress\w*\b",
        r"(?i)\bpressur\w*\b",
        r"(?i)\bdeadlines?\b",
        r"(?i)\b(exhausted|drained|burnt?\s?out|burned\s?out)\b",
        r"(?i)\b(hopeless|drowning|breaking\s+down)\b",
        r"(?i)\b(worried|worry|scared|afraid)\b",
        r"(?i)\b(sad|crying|cried|depress\w*|miserable)\b",
        r"(?i)\bcan.?t\s+(cope|sleep|keep\s+up|handle)\b",
    ])
});

static POSITIVITY: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?i)\b(grateful|gratitude|thankful)\b",
        r"(?i)\bproud\b",
        r"(?i)\b(happy|joy|joyful|delighted)\b",
        r"(?i)\b(excited|thrilled|amazing|wonderful)\b",
        r"(?i)\b(celebrat\w*|accomplish\w*|achiev\w*)\b",
        r"(?i)\b(great\s+day|good\s+day|went\s+well)\b",
        r"(?i)\b(finally\s+finished|nailed\s+it|big\s+win)\b",
    ])
});

static ACTIONABILITY: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?i)\bdeadlines?\b",
        r"(?i)\b(managers?|boss)\b",
        r"(?i)\b(tasks?|to-?do|checklist)\b",
        r"(?i)\b(plans?|planning|organiz\w*|schedul\w*)\b",
        r"(?i)\b(need\s+to|have\s+to|should)\b",
        r"(?i)\b(projects?|meetings?|presentation)\b",
        r"(?i)\b(goals?|steps?|finish\w*|fix\w*)\b",
    ])
});

static INTROSPECTION: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?i)\b(wonder\w*|wondering)\b",
        r"(?i)\b(meaning|purpose)\b",
        r"(?i)\b(realiz\w*|reflect\w*)\b",
        r"(?i)\b(thinking\s+about|been\s+thinking)\b",
        r"(?i)\b(why\s+do\s+i|who\s+am\s+i|what\s+do\s+i\s+want)\b",
        r"(?i)\b(feel\s+like|felt\s+like)\b",
        r"(?i)\b(understand|question\w*)\b",
    ])
});

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("static signal regex"))
        .collect()
}

/// Count of matching keyword groups mapped into [0, 1]. Each group counts
/// once no matter how often it matches.
fn score(text: &str, groups: &[Regex]) -> f32 {
    let matches = groups.iter().filter(|re| re.is_match(text)).count();
    (matches as f32 * SCORE_PER_MATCH).min(1.0)
}

/// Analyze one entry against the user's recent history.
pub fn analyze(entry: &JournalEntry, history: &UserHistory) -> EntrySignal {
    let text = entry.text.as_str();

    let topics: Vec<String> = TOPIC_LEXICON
        .iter()
        .filter(|(_, re)| re.is_match(text))
        .map(|(name, _)| (*name).to_string())
        .collect();

    let mut distress = score(text, &DISTRESS);
    let mut positivity = score(text, &POSITIVITY);
    let actionability = score(text, &ACTIONABILITY);
    let introspection = score(text, &INTROSPECTION);

    // Self-reported ratings override weak keyword evidence in either
    // direction: a high stress slider counts even when the prose is flat.
    if let Some(stress) = entry.stress {
        let mood_inverse = entry.mood.map(|m| 1.0 - m).unwrap_or(stress);
        distress = distress.max((stress + mood_inverse) / 2.0);
    }
    if let Some(mood) = entry.mood {
        if mood >= 0.7 {
            positivity = positivity.max(mood);
        }
    }

    let mood_trend = mood_trend(entry, history);
    if let Some(trend) = mood_trend {
        if trend <= TREND_ALERT {
            distress = (distress + 0.1).min(1.0);
        }
    }

    let sentiment = if distress >= 0.7 {
        Sentiment::Overwhelmed
    } else if distress >= 0.4 && distress >= positivity {
        Sentiment::Struggling
    } else if positivity >= 0.5 && positivity > distress {
        Sentiment::Upbeat
    } else {
        Sentiment::Neutral
    };

    EntrySignal {
        topics,
        sentiment,
        distress,
        positivity,
        actionability,
        introspection,
        mood_trend,
    }
}

/// Current mood minus the average of rated history entries. `None` unless
/// both the current entry and at least two history entries carry a mood.
fn mood_trend(entry: &JournalEntry, history: &UserHistory) -> Option<f32> {
    let current = entry.mood?;
    let past: Vec<f32> = history
        .entries
        .iter()
        .filter(|e| e.id != entry.id)
        .filter_map(|e| e.mood)
        .collect();
    if past.len() < 2 {
        return None;
    }
    let avg = past.iter().sum::<f32>() / past.len() as f32;
    Some(current - avg)
}
