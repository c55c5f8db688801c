use diesel::prelude::*;
use diesel_async::pooled_connection::bb8::PooledConnection;
use diesel_async::RunQueryDsl;
use serde::Serialize;

use crate::db::{self, SqliteAsyncConn, SqlitePool};
use crate::error::{Result, TaskPilotError};
use crate::pipeline::entities::StatusFilter;

mod schema;
use schema::tasks;

type SqlitePooledConn<'a> = PooledConnection<'a, SqliteAsyncConn>;

#[derive(Debug, Clone, Serialize)]
pub struct TaskItem {
    pub id: i32,
    pub user_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl TaskItem {
    pub fn status(&self) -> &'static str {
        if self.completed {
            "completed"
        } else {
            "pending"
        }
    }
}

#[derive(Queryable)]
struct TaskRow {
    id: i32,
    user_id: i64,
    title: String,
    description: Option<String>,
    completed: bool,
    created_at: i64,
    updated_at: i64,
}

#[derive(Insertable)]
#[diesel(table_name = tasks)]
struct NewTask<'a> {
    user_id: i64,
    title: &'a str,
    description: Option<&'a str>,
    completed: bool,
    created_at: i64,
    updated_at: i64,
}

#[derive(Debug, Clone, Default)]
pub struct TaskCounts {
    pub total: i64,
    pub pending: i64,
    pub completed: i64,
}

pub struct TaskStore {
    pool: SqlitePool,
}

impl TaskStore {
    pub async fn new(sqlite_path: impl AsRef<str>) -> Result<Self> {
        let pool = db::build_pool(sqlite_path.as_ref()).await?;
        Ok(Self { pool })
    }

    pub async fn create_task(
        &self,
        user_id: i64,
        title: &str,
        description: Option<&str>,
    ) -> Result<TaskItem> {
        let now = db::now_ts();
        let new = NewTask {
            user_id,
            title,
            description,
            completed: false,
            created_at: now,
            updated_at: now,
        };

        let mut conn = self.conn().await?;
        diesel::insert_into(tasks::table)
            .values(&new)
            .execute(&mut conn)
            .await
            .map_err(|e| TaskPilotError::Database(e.to_string()))?;

        let row: TaskRow = tasks::table
            .filter(tasks::user_id.eq(user_id))
            .order(tasks::id.desc())
            .first(&mut conn)
            .await
            .map_err(|e| TaskPilotError::Database(e.to_string()))?;
        Ok(map_row(row))
    }

    pub async fn list_tasks(
        &self,
        user_id: i64,
        status: StatusFilter,
        limit: usize,
    ) -> Result<Vec<TaskItem>> {
        let mut conn = self.conn().await?;
        let mut query = tasks::table.filter(tasks::user_id.eq(user_id)).into_boxed();

        match status {
            StatusFilter::Pending => {
                query = query.filter(tasks::completed.eq(false));
            }
            StatusFilter::Completed => {
                query = query.filter(tasks::completed.eq(true));
            }
            StatusFilter::All => {}
        }

        let rows: Vec<TaskRow> = query
            .order(tasks::id.asc())
            .limit(limit as i64)
            .load(&mut conn)
            .await
            .map_err(|e| TaskPilotError::Database(e.to_string()))?;
        Ok(rows.into_iter().map(map_row).collect())
    }

    /// Owner-scoped lookup; a task belonging to another user is
    /// indistinguishable from a missing one.
    pub async fn get_task(&self, user_id: i64, id: i32) -> Result<Option<TaskItem>> {
        let mut conn = self.conn().await?;
        let row: Option<TaskRow> = tasks::table
            .filter(tasks::user_id.eq(user_id))
            .filter(tasks::id.eq(id))
            .first(&mut conn)
            .await
            .optional()
            .map_err(|e| TaskPilotError::Database(e.to_string()))?;
        Ok(row.map(map_row))
    }

    pub async fn find_by_title(&self, user_id: i64, pattern: &str) -> Result<Vec<TaskItem>> {
        let mut conn = self.conn().await?;
        let rows: Vec<TaskRow> = tasks::table
            .filter(tasks::user_id.eq(user_id))
            .filter(tasks::title.like(format!("%{}%", pattern)))
            .order(tasks::id.asc())
            .load(&mut conn)
            .await
            .map_err(|e| TaskPilotError::Database(e.to_string()))?;
        Ok(rows.into_iter().map(map_row).collect())
    }

    pub async fn set_completed(&self, user_id: i64, id: i32, completed: bool) -> Result<Option<TaskItem>> {
        let now = db::now_ts();
        let mut conn = self.conn().await?;
        let updated = diesel::update(
            tasks::table
                .filter(tasks::user_id.eq(user_id))
                .filter(tasks::id.eq(id)),
        )
        .set((tasks::completed.eq(completed), tasks::updated_at.eq(now)))
        .execute(&mut conn)
        .await
        .map_err(|e| TaskPilotError::Database(e.to_string()))?;
        if updated == 0 {
            return Ok(None);
        }
        self.get_task(user_id, id).await
    }

    pub async fn update_task(
        &self,
        user_id: i64,
        id: i32,
        title: Option<&str>,
        description: Option<&str>,
    ) -> Result<Option<TaskItem>> {
        let now = db::now_ts();
        let mut conn = self.conn().await?;
        let target = tasks::table
            .filter(tasks::user_id.eq(user_id))
            .filter(tasks::id.eq(id));

        let updated = match (title, description) {
            (Some(title), Some(description)) => {
                diesel::update(target)
                    .set((
                        tasks::title.eq(title),
                        tasks::description.eq(Some(description)),
                        tasks::updated_at.eq(now),
                    ))
                    .execute(&mut conn)
                    .await
            }
            (Some(title), None) => {
                diesel::update(target)
                    .set((tasks::title.eq(title), tasks::updated_at.eq(now)))
                    .execute(&mut conn)
                    .await
            }
            (None, Some(description)) => {
                diesel::update(target)
                    .set((
                        tasks::description.eq(Some(description)),
                        tasks::updated_at.eq(now),
                    ))
                    .execute(&mut conn)
                    .await
            }
            (None, None) => return self.get_task(user_id, id).await,
        }
        .map_err(|e| TaskPilotError::Database(e.to_string()))?;

        if updated == 0 {
            return Ok(None);
        }
        self.get_task(user_id, id).await
    }

    pub async fn delete_task(&self, user_id: i64, id: i32) -> Result<bool> {
        let mut conn = self.conn().await?;
        let count = diesel::delete(
            tasks::table
                .filter(tasks::user_id.eq(user_id))
                .filter(tasks::id.eq(id)),
        )
        .execute(&mut conn)
        .await
        .map_err(|e| TaskPilotError::Database(e.to_string()))?;
        Ok(count > 0)
    }

    pub async fn counts(&self, user_id: i64) -> Result<TaskCounts> {
        let mut conn = self.conn().await?;
        let total: i64 = tasks::table
            .filter(tasks::user_id.eq(user_id))
            .count()
            .get_result(&mut conn)
            .await
            .map_err(|e| TaskPilotError::Database(e.to_string()))?;
        let completed: i64 = tasks::table
            .filter(tasks::user_id.eq(user_id))
            .filter(tasks::completed.eq(true))
            .count()
            .get_result(&mut conn)
            .await
            .map_err(|e| TaskPilotError::Database(e.to_string()))?;
        Ok(TaskCounts {
            total,
            pending: total - completed,
            completed,
        })
    }

    async fn conn(&self) -> Result<SqlitePooledConn<'_>> {
        self.pool
            .get()
            .await
            .map_err(|e| TaskPilotError::Database(e.to_string()))
    }
}

fn map_row(row: TaskRow) -> TaskItem {
    TaskItem {
        id: row.id,
        user_id: row.user_id,
        title: row.title,
        description: row.description,
        completed: row.completed,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}
