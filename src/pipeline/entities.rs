use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::pipeline::intent::Intent;
use crate::pipeline::normalizer::command_start;

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_DESCRIPTION_LEN: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    All,
    Pending,
    Completed,
}

impl StatusFilter {
    pub fn as_str(self) -> &'static str {
        match self {
            StatusFilter::All => "all",
            StatusFilter::Pending => "pending",
            StatusFilter::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractedEntities {
    pub title: Option<String>,
    pub description: Option<String>,
    pub task_id: Option<i64>,
    pub status_filter: Option<StatusFilter>,
}

static TASK_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:\b(?:task|id)\s*#?\s*(\d+)\b|#(\d+)\b)").unwrap());

static COMPLETED_WORDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:completed|complete|done|finished)\b").unwrap());

static PENDING_WORDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:pending|incomplete|open|unfinished|remaining)\b").unwrap());

static FILLER_WORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:please|can you|could you|would you|for me|i want to|i need to)\b")
        .unwrap()
});

static LEADING_NOISE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:a\s+task\s+(?:to|called|named)\s+|a\s+task\s+|task\s+to\s+|the\s+|a\s+|my\s+)")
        .unwrap()
});

static TRAILING_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s.!?,]+$").unwrap());

static TRAILING_TASK_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\s+tasks?$").unwrap());

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].trim_end().to_string()
}

fn first_task_id(text: &str) -> Option<i64> {
    let caps = TASK_ID.captures(text)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .and_then(|m| m.as_str().parse::<i64>().ok())
}

// Remainder of the message after the command verb, scrubbed of filler and
// leading noise phrases. Nothing is invented: an empty remainder stays None.
fn target_text(text: &str) -> Option<String> {
    let start = command_start(text);
    let rest = &text[start..];
    let mut remainder = match rest.split_once(char::is_whitespace) {
        Some((_verb, tail)) => tail.to_string(),
        None => return None,
    };
    remainder = FILLER_WORDS.replace_all(&remainder, "").to_string();
    remainder = TASK_ID.replace_all(&remainder, "").to_string();
    let trimmed = remainder.trim();
    let stripped = LEADING_NOISE.replace(trimmed, "").to_string();
    let cleaned = TRAILING_PUNCT.replace(&stripped, "").trim().to_string();
    let non_targets = ["task", "a task", "it", "that", "this", "them", "one"];
    if cleaned.is_empty()
        || non_targets
            .iter()
            .any(|word| cleaned.eq_ignore_ascii_case(word))
    {
        None
    } else {
        Some(cleaned)
    }
}

fn status_filter_for_list(text: &str) -> StatusFilter {
    if PENDING_WORDS.is_match(text) {
        StatusFilter::Pending
    } else if COMPLETED_WORDS.is_match(text) {
        StatusFilter::Completed
    } else {
        StatusFilter::All
    }
}

/// Pulls structured fields out of the normalized text for a known intent.
/// Absent fields stay `None`; values are never fabricated.
pub fn extract(normalized_text: &str, intent: Intent) -> ExtractedEntities {
    let text = normalized_text.trim();
    let mut entities = ExtractedEntities::default();

    match intent {
        Intent::AddTask => {
            if let Some(content) = target_text(text) {
                let (title, description) = match content.split_once(':') {
                    Some((head, tail)) if !tail.trim().is_empty() => {
                        (head.trim().to_string(), Some(tail.trim().to_string()))
                    }
                    _ => (content, None),
                };
                entities.title = Some(truncate(&title_case(&title), MAX_TITLE_LEN));
                entities.description =
                    description.map(|d| truncate(&d, MAX_DESCRIPTION_LEN));
            }
        }
        Intent::ListTasks => {
            entities.status_filter = Some(status_filter_for_list(text));
        }
        Intent::CompleteTask | Intent::DeleteTask | Intent::UpdateTask => {
            entities.task_id = first_task_id(text);
            if entities.task_id.is_none() {
                if let Some(content) = target_text(text) {
                    // "the meeting task" names the task, it is not part of
                    // the title being matched.
                    let content = TRAILING_TASK_WORD.replace(&content, "").to_string();
                    if !content.trim().is_empty() {
                        entities.title =
                            Some(truncate(&title_case(content.trim()), MAX_TITLE_LEN));
                    }
                }
            }
        }
        Intent::IdentityQuery | Intent::Unknown => {}
    }

    entities
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_without_title_yields_all_none() {
        let entities = extract("Add task", Intent::AddTask);
        assert_eq!(entities, ExtractedEntities::default());
    }

    #[test]
    fn add_with_content_extracts_title() {
        let entities = extract("Add a task to buy milk", Intent::AddTask);
        assert_eq!(entities.title.as_deref(), Some("Buy Milk"));
        assert_eq!(entities.description, None);
        assert_eq!(entities.task_id, None);
    }

    #[test]
    fn add_verb_content_is_not_renormalized() {
        let entities = extract("Add a task to create a report", Intent::AddTask);
        assert_eq!(entities.title.as_deref(), Some("Create A Report"));
    }

    #[test]
    fn colon_splits_title_and_description() {
        let entities = extract(
            "Add groceries: milk, eggs and bread",
            Intent::AddTask,
        );
        assert_eq!(entities.title.as_deref(), Some("Groceries"));
        assert_eq!(entities.description.as_deref(), Some("milk, eggs and bread"));
    }

    #[test]
    fn explicit_numeric_references_only() {
        assert_eq!(extract("complete task 5", Intent::CompleteTask).task_id, Some(5));
        assert_eq!(extract("delete #3", Intent::DeleteTask).task_id, Some(3));
        assert_eq!(extract("update id 12", Intent::UpdateTask).task_id, Some(12));
        assert_eq!(
            extract("delete the 2024 report task", Intent::DeleteTask).task_id,
            None
        );
    }

    #[test]
    fn first_id_wins_when_multiple_present() {
        assert_eq!(
            extract("delete task 4 and task 9", Intent::DeleteTask).task_id,
            Some(4)
        );
    }

    #[test]
    fn mutating_intent_without_id_gets_title() {
        let entities = extract("delete the meeting task", Intent::DeleteTask);
        assert_eq!(entities.task_id, None);
        assert_eq!(entities.title.as_deref(), Some("Meeting"));
    }

    #[test]
    fn bare_task_word_is_not_a_title() {
        let entities = extract("delete the task", Intent::DeleteTask);
        assert_eq!(entities.task_id, None);
        assert_eq!(entities.title, None);
    }

    #[test]
    fn list_defaults_to_all_filter() {
        let entities = extract("list my tasks", Intent::ListTasks);
        assert_eq!(entities.status_filter, Some(StatusFilter::All));
    }

    #[test]
    fn list_filter_synonyms() {
        assert_eq!(
            extract("list completed tasks", Intent::ListTasks).status_filter,
            Some(StatusFilter::Completed)
        );
        assert_eq!(
            extract("list incomplete tasks", Intent::ListTasks).status_filter,
            Some(StatusFilter::Pending)
        );
        assert_eq!(
            extract("list DONE tasks", Intent::ListTasks).status_filter,
            Some(StatusFilter::Completed)
        );
    }

    #[test]
    fn long_title_is_truncated() {
        let long = format!("Add a task to {}", "x".repeat(400));
        let entities = extract(&long, Intent::AddTask);
        assert!(entities.title.unwrap().len() <= MAX_TITLE_LEN);
    }

    #[test]
    fn unknown_intent_extracts_nothing() {
        let entities = extract("what is up", Intent::Unknown);
        assert_eq!(entities, ExtractedEntities::default());
    }
}
