use diesel::dsl::max;
use diesel::prelude::*;
use diesel::result::DatabaseErrorKind;
use diesel_async::pooled_connection::bb8::PooledConnection;
use diesel_async::RunQueryDsl;
use serde::Serialize;
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::debug;

use crate::db::{self, SqliteAsyncConn, SqlitePool};
use crate::error::{Result, TaskPilotError};

mod schema;
use schema::{conversations, messages};

// Bounded retries for the optimistic sequence-number insert; each attempt
// re-reads the latest sequence so concurrent writers converge.
const SEQUENCE_RETRY_LIMIT: usize = 5;

type SqlitePooledConn<'a> = PooledConnection<'a, SqliteAsyncConn>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationRecord {
    pub id: i32,
    pub user_id: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageRecord {
    pub id: i32,
    pub conversation_id: i32,
    pub sequence_number: i64,
    pub role: String,
    pub content: String,
    pub created_at: String,
    pub metadata: Option<String>,
}

#[derive(Queryable)]
struct ConversationRow {
    id: i32,
    user_id: i64,
    created_at: i64,
    updated_at: i64,
}

#[derive(Queryable)]
struct MessageRow {
    id: i32,
    conversation_id: i32,
    sequence_number: i64,
    role: String,
    content: String,
    created_at: String,
    metadata: Option<String>,
}

#[derive(Insertable)]
#[diesel(table_name = conversations)]
struct NewConversation {
    user_id: i64,
    created_at: i64,
    updated_at: i64,
}

#[derive(Insertable)]
#[diesel(table_name = messages)]
struct NewMessage<'a> {
    conversation_id: i32,
    sequence_number: i64,
    role: &'a str,
    content: &'a str,
    created_at: &'a str,
    metadata: Option<&'a str>,
}

pub struct ConversationStore {
    pool: SqlitePool,
}

impl ConversationStore {
    pub async fn new(sqlite_path: impl AsRef<str>) -> Result<Self> {
        let pool = db::build_pool(sqlite_path.as_ref()).await?;
        Ok(Self { pool })
    }

    /// Most recent conversation for the user, or a fresh one when none exists.
    pub async fn get_or_create(&self, user_id: i64) -> Result<ConversationRecord> {
        let mut conn = self.conn().await?;
        let existing: Option<ConversationRow> = conversations::table
            .filter(conversations::user_id.eq(user_id))
            .order(conversations::updated_at.desc())
            .first(&mut conn)
            .await
            .optional()
            .map_err(|e| TaskPilotError::Database(e.to_string()))?;

        if let Some(row) = existing {
            return Ok(map_conversation(row));
        }

        let now = db::now_ts();
        diesel::insert_into(conversations::table)
            .values(&NewConversation {
                user_id,
                created_at: now,
                updated_at: now,
            })
            .execute(&mut conn)
            .await
            .map_err(|e| TaskPilotError::Database(e.to_string()))?;

        let row: ConversationRow = conversations::table
            .filter(conversations::user_id.eq(user_id))
            .order(conversations::id.desc())
            .first(&mut conn)
            .await
            .map_err(|e| TaskPilotError::Database(e.to_string()))?;
        debug!(conversation_id = row.id, user_id, "created conversation");
        Ok(map_conversation(row))
    }

    pub async fn get_conversation(&self, conversation_id: i32) -> Result<Option<ConversationRecord>> {
        let mut conn = self.conn().await?;
        let row: Option<ConversationRow> = conversations::table
            .filter(conversations::id.eq(conversation_id))
            .first(&mut conn)
            .await
            .optional()
            .map_err(|e| TaskPilotError::Database(e.to_string()))?;
        Ok(row.map(map_conversation))
    }

    /// Appends an immutable message with the next sequence number. The unique
    /// `(conversation_id, sequence_number)` constraint is the arbiter under
    /// concurrent writers; a conflict re-reads and retries with the next
    /// candidate instead of failing the write.
    pub async fn append_message(
        &self,
        conversation_id: i32,
        role: MessageRole,
        content: &str,
        metadata: Option<&Value>,
    ) -> Result<MessageRecord> {
        let metadata = match metadata {
            Some(value) => Some(
                serde_json::to_string(value)
                    .map_err(|e| TaskPilotError::Serialization(e.to_string()))?,
            ),
            None => None,
        };
        let created_at = rfc3339_now()?;

        let mut conn = self.conn().await?;
        for _ in 0..SEQUENCE_RETRY_LIMIT {
            let last: Option<i64> = messages::table
                .filter(messages::conversation_id.eq(conversation_id))
                .select(max(messages::sequence_number))
                .first::<Option<i64>>(&mut conn)
                .await
                .map_err(|e| TaskPilotError::Database(e.to_string()))?;
            let next = last.unwrap_or(0) + 1;

            let new = NewMessage {
                conversation_id,
                sequence_number: next,
                role: role.as_str(),
                content,
                created_at: &created_at,
                metadata: metadata.as_deref(),
            };
            match diesel::insert_into(messages::table)
                .values(&new)
                .execute(&mut conn)
                .await
            {
                Ok(_) => {
                    diesel::update(
                        conversations::table.filter(conversations::id.eq(conversation_id)),
                    )
                    .set(conversations::updated_at.eq(db::now_ts()))
                    .execute(&mut conn)
                    .await
                    .map_err(|e| TaskPilotError::Database(e.to_string()))?;

                    let row: MessageRow = messages::table
                        .filter(messages::conversation_id.eq(conversation_id))
                        .filter(messages::sequence_number.eq(next))
                        .first(&mut conn)
                        .await
                        .map_err(|e| TaskPilotError::Database(e.to_string()))?;
                    return Ok(map_message(row));
                }
                Err(diesel::result::Error::DatabaseError(
                    DatabaseErrorKind::UniqueViolation,
                    _,
                )) => {
                    debug!(conversation_id, candidate = next, "sequence conflict, retrying");
                    continue;
                }
                Err(e) => return Err(TaskPilotError::Database(e.to_string())),
            }
        }
        Err(TaskPilotError::Database(
            "could not assign message sequence number".to_string(),
        ))
    }

    /// Messages in ascending sequence order; `limit` of 0 means all.
    pub async fn history(&self, conversation_id: i32, limit: usize) -> Result<Vec<MessageRecord>> {
        let mut conn = self.conn().await?;
        let mut query = messages::table
            .filter(messages::conversation_id.eq(conversation_id))
            .order(messages::sequence_number.asc())
            .into_boxed();
        if limit > 0 {
            query = query.limit(limit as i64);
        }
        let rows: Vec<MessageRow> = query
            .load(&mut conn)
            .await
            .map_err(|e| TaskPilotError::Database(e.to_string()))?;
        Ok(rows.into_iter().map(map_message).collect())
    }

    async fn conn(&self) -> Result<SqlitePooledConn<'_>> {
        self.pool
            .get()
            .await
            .map_err(|e| TaskPilotError::Database(e.to_string()))
    }
}

// ISO-8601 UTC, millisecond precision.
fn rfc3339_now() -> Result<String> {
    let now = OffsetDateTime::now_utc();
    let ms = now.nanosecond() / 1_000_000 * 1_000_000;
    now.replace_nanosecond(ms)
        .map_err(|e| TaskPilotError::Runtime(e.to_string()))?
        .format(&Rfc3339)
        .map_err(|e| TaskPilotError::Runtime(e.to_string()))
}

fn map_conversation(row: ConversationRow) -> ConversationRecord {
    ConversationRecord {
        id: row.id,
        user_id: row.user_id,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

fn map_message(row: MessageRow) -> MessageRecord {
    MessageRecord {
        id: row.id,
        conversation_id: row.conversation_id,
        sequence_number: row.sequence_number,
        role: row.role,
        content: row.content,
        created_at: row.created_at,
        metadata: row.metadata,
    }
}

