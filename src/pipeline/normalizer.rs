use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

// Multi-word phrases first so "get rid of" wins over any single-word match.
static SYNONYMS: &[(&str, &str)] = &[
    ("get rid of", "delete"),
    ("cross off", "complete"),
    ("create", "add"),
    ("make", "add"),
    ("remember", "add"),
    ("remove", "delete"),
    ("cancel", "delete"),
    ("erase", "delete"),
    ("finish", "complete"),
    ("done", "complete"),
    ("show", "list"),
    ("display", "list"),
    ("view", "list"),
    ("change", "update"),
    ("rename", "update"),
    ("edit", "update"),
    ("modify", "update"),
];

pub const CANONICAL_VERBS: &[&str] = &["add", "list", "complete", "delete", "update"];

static FILLER_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?:\s*(?:please|hey|hi|hello|yo|ok|okay|can you|could you|would you|will you|i want to|i need to|i would like to|i'd like to|to)[,!]?\s+)*\s*",
    )
    .unwrap()
});

// "mark X as done" marks completion even though "done" is not at command
// position; the status word after "as" is part of the command, not content.
static STATUS_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bas\s+(done|finished|completed)\b").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transformation {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NormalizedMessage {
    pub text: String,
    pub transformations: Vec<Transformation>,
}

/// Byte offset where the command verb may start: past any leading filler run.
pub(crate) fn command_start(text: &str) -> usize {
    FILLER_PREFIX
        .find(text)
        .map(|m| m.end())
        .unwrap_or(0)
        .min(text.len())
}

fn matches_word_at(text: &str, offset: usize, word: &str) -> bool {
    // str::get keeps us off non-boundary byte offsets in multibyte input.
    let candidate = match text.get(offset..) {
        Some(rest) => rest,
        None => return false,
    };
    let prefix = match candidate.get(..word.len()) {
        Some(prefix) => prefix,
        None => return false,
    };
    if !prefix.eq_ignore_ascii_case(word) {
        return false;
    }
    match candidate[word.len()..].chars().next() {
        None => true,
        Some(c) => !c.is_alphanumeric(),
    }
}

/// Rewrites the command-position verb (and any "as done" status marker) to
/// canonical form. Words inside task content are never touched: only the one
/// verb sitting at command position is eligible.
pub fn normalize(message: &str) -> NormalizedMessage {
    let mut text = message.to_string();
    let mut transformations = Vec::new();

    let start = command_start(&text);
    for (synonym, canonical) in SYNONYMS {
        if matches_word_at(&text, start, synonym) {
            let end = start + synonym.len();
            let original = text[start..end].to_string();
            text.replace_range(start..end, canonical);
            transformations.push(Transformation {
                from: original,
                to: (*canonical).to_string(),
            });
            break;
        }
    }

    if let Some(caps) = STATUS_MARKER.captures(&text) {
        let word = caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_default();
        if !word.eq_ignore_ascii_case("complete") {
            let range = caps.get(1).map(|m| m.range()).unwrap_or_default();
            text.replace_range(range, "complete");
            transformations.push(Transformation {
                from: word,
                to: "complete".to_string(),
            });
        }
    }

    NormalizedMessage {
        text,
        transformations,
    }
}
