use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Casual,
    Professional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Authorization,
    Database,
    Tool,
    RateLimit,
    Unknown,
}

impl ErrorKind {
    /// Maps the closed set of tool error codes onto formatter categories.
    pub fn from_code(code: &str) -> Self {
        match code {
            "VALIDATION_ERROR" | "INVALID_TITLE" | "INVALID_FILTER" | "MISSING_IDENTIFIER"
            | "NO_UPDATES" | "AMBIGUOUS_MATCH" => ErrorKind::Validation,
            "TASK_NOT_FOUND" | "NOT_FOUND" => ErrorKind::NotFound,
            "UNAUTHORIZED" | "FORBIDDEN" => ErrorKind::Authorization,
            "DATABASE_ERROR" | "CONNECTION_ERROR" => ErrorKind::Database,
            "TOOL_ERROR" => ErrorKind::Tool,
            "RATE_LIMIT_EXCEEDED" => ErrorKind::RateLimit,
            _ => ErrorKind::Unknown,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FormattedReply {
    pub message: String,
    pub tone: Tone,
}

#[derive(Debug, Clone, Serialize)]
pub struct FormattedError {
    pub user_message: String,
    pub severity: Severity,
    pub suggested_action: String,
    pub show_details: bool,
}

static CASUAL_MARKERS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:hey|yo|sup|lol|haha|pls|plz|thx|gonna|wanna|u|ya)\b").unwrap()
});

fn contains_emoji(text: &str) -> bool {
    text.chars().any(|c| {
        let cp = c as u32;
        (0x1F300..=0x1FAFF).contains(&cp) || (0x2600..=0x27BF).contains(&cp)
    })
}

/// Casual when the triggering message carries informal markers (slang, emoji,
/// all-lowercase), professional otherwise.
pub fn detect_tone(user_message: &str) -> Tone {
    if CASUAL_MARKERS.is_match(user_message) || contains_emoji(user_message) {
        return Tone::Casual;
    }
    let has_alpha = user_message.chars().any(|c| c.is_alphabetic());
    let all_lower = has_alpha && !user_message.chars().any(|c| c.is_uppercase());
    if all_lower {
        Tone::Casual
    } else {
        Tone::Professional
    }
}

fn title_from(response: &Value) -> Option<&str> {
    response
        .get("data")
        .and_then(|d| d.get("title"))
        .and_then(|t| t.as_str())
}

fn fallback_message(response: &Value) -> String {
    response
        .get("message")
        .and_then(|m| m.as_str())
        .unwrap_or("Done.")
        .to_string()
}

fn list_summary(response: &Value) -> String {
    let data = response.get("data");
    let count = data
        .and_then(|d| d.get("count"))
        .and_then(|c| c.as_u64())
        .unwrap_or(0);
    if count == 0 {
        return "You have no tasks yet. Add one to get started!".to_string();
    }
    let mut out = format!(
        "You have {} task{}:",
        count,
        if count == 1 { "" } else { "s" }
    );
    if let Some(tasks) = data.and_then(|d| d.get("tasks")).and_then(|t| t.as_array()) {
        for task in tasks {
            let id = task.get("task_id").and_then(|v| v.as_i64()).unwrap_or(0);
            let title = task.get("title").and_then(|v| v.as_str()).unwrap_or("");
            let completed = task
                .get("completed")
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            let marker = if completed { "[x]" } else { "[ ]" };
            out.push_str(&format!("\n{} #{} {}", marker, id, title));
        }
    }
    out
}

/// Renders a successful tool result with per-tool templates. Pure function,
/// no external calls.
pub fn format_success(tool_name: &str, tool_response: &Value, user_message: &str) -> FormattedReply {
    let tone = detect_tone(user_message);
    let message = match tool_name {
        "add_task" => match title_from(tool_response) {
            Some(title) => format!("Task '{}' has been added to your list.", title),
            None => fallback_message(tool_response),
        },
        "list_tasks" => list_summary(tool_response),
        "complete_task" => match title_from(tool_response) {
            Some(title) => {
                let already = tool_response
                    .get("message")
                    .and_then(|m| m.as_str())
                    .map(|m| m.contains("already"))
                    .unwrap_or(false);
                if already {
                    format!("Task '{}' is already marked as complete.", title)
                } else {
                    format!("Task '{}' has been marked as complete.", title)
                }
            }
            None => fallback_message(tool_response),
        },
        "delete_task" => match title_from(tool_response) {
            Some(title) => format!("Task '{}' has been deleted.", title),
            None => fallback_message(tool_response),
        },
        "update_task" => match title_from(tool_response) {
            Some(title) => format!("Task '{}' has been updated.", title),
            None => fallback_message(tool_response),
        },
        "get_user_info" => {
            let data = tool_response.get("data");
            let total = data
                .and_then(|d| d.get("total"))
                .and_then(|v| v.as_u64())
                .unwrap_or(0);
            let pending = data
                .and_then(|d| d.get("pending"))
                .and_then(|v| v.as_u64())
                .unwrap_or(0);
            let completed = data
                .and_then(|d| d.get("completed"))
                .and_then(|v| v.as_u64())
                .unwrap_or(0);
            format!(
                "You have {} task{}: {} pending and {} completed.",
                total,
                if total == 1 { "" } else { "s" },
                pending,
                completed
            )
        }
        _ => fallback_message(tool_response),
    };
    FormattedReply { message, tone }
}

/// Maps an error category to safe user-facing text. `safe_message` lets tools
/// pass through text already crafted for users (validation hints, ambiguity
/// listings); everything else gets the generic template. Never leaks
/// internals; `show_details` is always false.
pub fn format_error(kind: ErrorKind, safe_message: Option<&str>) -> FormattedError {
    let (template, severity, action): (&str, Severity, &str) = match kind {
        ErrorKind::Validation => (
            "The information provided is invalid. Please check and try again.",
            Severity::Low,
            "Rephrase your request with the missing details.",
        ),
        ErrorKind::NotFound => (
            "Task not found. Use 'show tasks' to see your list.",
            Severity::Low,
            "Ask me to list your tasks.",
        ),
        ErrorKind::Authorization => (
            "You don't have permission to access that resource.",
            Severity::Medium,
            "Log in again or check the task you are referring to.",
        ),
        ErrorKind::Database => (
            "We're having trouble saving your changes. Please try again in a moment.",
            Severity::High,
            "Wait a moment and try again.",
        ),
        ErrorKind::Tool => (
            "That operation is temporarily unavailable. Please try again.",
            Severity::Medium,
            "Try again shortly.",
        ),
        ErrorKind::RateLimit => (
            "Too many requests. Please wait a moment and try again.",
            Severity::Medium,
            "Wait a moment before retrying.",
        ),
        ErrorKind::Unknown => (
            "Something went wrong. Please try again.",
            Severity::Medium,
            "Try again.",
        ),
    };

    let user_message = match (kind, safe_message) {
        (ErrorKind::Validation | ErrorKind::NotFound, Some(message)) if !message.is_empty() => {
            message.to_string()
        }
        _ => template.to_string(),
    };

    FormattedError {
        user_message,
        severity,
        suggested_action: action.to_string(),
        show_details: false,
    }
}
