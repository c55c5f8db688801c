use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::pipeline::normalizer::command_start;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    AddTask,
    ListTasks,
    CompleteTask,
    DeleteTask,
    UpdateTask,
    IdentityQuery,
    Unknown,
}

impl Intent {
    pub fn is_mutating(self) -> bool {
        matches!(
            self,
            Intent::CompleteTask | Intent::DeleteTask | Intent::UpdateTask
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Intent::AddTask => "add_task",
            Intent::ListTasks => "list_tasks",
            Intent::CompleteTask => "complete_task",
            Intent::DeleteTask => "delete_task",
            Intent::UpdateTask => "update_task",
            Intent::IdentityQuery => "identity_query",
            Intent::Unknown => "unknown",
        }
    }
}

static NEGATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:don't|do not|dont|never|stop)\b").unwrap());

static IDENTITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:who am i|my account|my info|my profile|about me|user info)\b").unwrap()
});

static MARK_COMPLETE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bmark\b.*\bas complete\b").unwrap());

static LIST_QUESTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*what(?:'s| is| are)?\b.*\b(?:task|tasks|list|to do|todo)\b").unwrap()
});

static QUESTION_OPENER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(?:what|how|why|when|where|who)\b").unwrap());

fn command_verb(text: &str) -> Option<&'static str> {
    let start = command_start(text);
    let rest = text.get(start..)?;
    for verb in super::normalizer::CANONICAL_VERBS {
        // str::get rejects slices that would split a multibyte character.
        let matches = rest
            .get(..verb.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(verb))
            && rest[verb.len()..]
                .chars()
                .next()
                .map(|c| !c.is_alphanumeric())
                .unwrap_or(true);
        if matches {
            return Some(verb);
        }
    }
    None
}

/// Ordered keyword rules over normalized text; anything unrecognized or
/// contradictory falls through to `Unknown` rather than guessing.
pub fn classify(normalized_text: &str) -> Intent {
    let text = normalized_text.trim();
    if text.is_empty() {
        return Intent::Unknown;
    }

    if NEGATION.is_match(text) {
        return Intent::Unknown;
    }

    if IDENTITY.is_match(text) {
        return Intent::IdentityQuery;
    }

    if MARK_COMPLETE.is_match(text) {
        return Intent::CompleteTask;
    }

    if let Some(verb) = command_verb(text) {
        return match verb {
            "add" => Intent::AddTask,
            "list" => Intent::ListTasks,
            "complete" => Intent::CompleteTask,
            "delete" => Intent::DeleteTask,
            "update" => Intent::UpdateTask,
            _ => Intent::Unknown,
        };
    }

    if LIST_QUESTION.is_match(text) {
        return Intent::ListTasks;
    }

    if QUESTION_OPENER.is_match(text) {
        return Intent::Unknown;
    }

    Intent::Unknown
}
