use std::sync::Arc;

use serde_json::json;
use tracing::info;

use crate::conversations::{ConversationStore, MessageRecord, MessageRole};
use crate::error::{Result, TaskPilotError};
use crate::pipeline::formatter::{Severity, Tone};
use crate::services::orchestrator::{Orchestrator, Outcome};

const HISTORY_LIMIT: usize = 50;
const MAX_MESSAGE_LEN: usize = 10_000;

/// Reply returned to the calling surface (CLI, HTTP layer, tests).
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub conversation_id: i32,
    pub message_id: i32,
    pub message: String,
    pub tone: Option<Tone>,
    pub severity: Option<Severity>,
    pub timestamp: String,
}

/// Stateless chat entry point: every request resolves its conversation and
/// history from the database, so a restart loses nothing.
pub struct ChatService {
    conversations: Arc<ConversationStore>,
    orchestrator: Arc<Orchestrator>,
}

impl ChatService {
    pub fn new(conversations: Arc<ConversationStore>, orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            conversations,
            orchestrator,
        }
    }

    pub async fn process_message(
        &self,
        user_id: i64,
        message: &str,
        conversation_id: Option<i32>,
    ) -> Result<ChatReply> {
        let message = message.trim();
        if message.is_empty() {
            return Err(TaskPilotError::Runtime("message is empty".to_string()));
        }
        if message.chars().count() > MAX_MESSAGE_LEN {
            return Err(TaskPilotError::Runtime("message is too long".to_string()));
        }

        let conversation = match conversation_id {
            Some(id) => {
                let conversation = self
                    .conversations
                    .get_conversation(id)
                    .await?
                    .ok_or_else(|| {
                        TaskPilotError::Runtime("conversation not found".to_string())
                    })?;
                // A conversation belongs to exactly one user.
                if conversation.user_id != user_id {
                    return Err(TaskPilotError::Runtime(
                        "conversation not found".to_string(),
                    ));
                }
                conversation
            }
            None => self.conversations.get_or_create(user_id).await?,
        };

        self.conversations
            .append_message(conversation.id, MessageRole::User, message, None)
            .await?;

        let history = self.history(conversation.id).await?;
        let outcome = self
            .orchestrator
            .handle(user_id, user_id, message, &history)
            .await?;

        let (tone, severity, metadata) = match &outcome {
            Outcome::Success { tone, .. } => {
                (Some(*tone), None, json!({"status": "success", "tone": tone}))
            }
            Outcome::Failure(err) => (
                None,
                Some(err.severity),
                json!({
                    "status": "error",
                    "severity": err.severity,
                    "suggested_action": err.suggested_action,
                }),
            ),
        };

        let stored = self
            .conversations
            .append_message(
                conversation.id,
                MessageRole::Assistant,
                outcome.message(),
                Some(&metadata),
            )
            .await?;
        info!(
            conversation_id = conversation.id,
            message_id = stored.id,
            user_id,
            "chat turn persisted"
        );

        Ok(ChatReply {
            conversation_id: conversation.id,
            message_id: stored.id,
            message: outcome.message().to_string(),
            tone,
            severity,
            timestamp: stored.created_at,
        })
    }

    pub async fn history(&self, conversation_id: i32) -> Result<Vec<MessageRecord>> {
        self.conversations
            .history(conversation_id, HISTORY_LIMIT)
            .await
    }
}
