use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::error::Result;
use crate::interfaces::plugins::Tool;
use crate::pipeline::entities::{StatusFilter, MAX_DESCRIPTION_LEN, MAX_TITLE_LEN};
use crate::tasks::{TaskItem, TaskStore};

use super::{error_result, success_result};

const MISSING_IDENTIFIER_MSG: &str = "Please specify either a task ID or task title";
const NOT_FOUND_MSG: &str = "Task not found. Use 'show tasks' to see your list";

fn user_id_param(params: &Value) -> Option<i64> {
    params.get("user_id").and_then(|v| v.as_i64()).filter(|id| *id > 0)
}

fn str_param<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params.get(key).and_then(|v| v.as_str())
}

fn task_json(task: &TaskItem) -> Value {
    json!({
        "task_id": task.id,
        "title": task.title,
        "description": task.description,
        "completed": task.completed,
        "status": task.status(),
        "created_at": task.created_at,
        "updated_at": task.updated_at,
    })
}

enum Target {
    Found(TaskItem),
    Rejected(Value),
}

/// Resolves a task by id or by case-insensitive substring title match,
/// scoped to the owner. Zero matches and ambiguous matches come back as
/// ready-built error envelopes.
async fn resolve_target(
    store: &TaskStore,
    user_id: i64,
    task_id: Option<i64>,
    task_title: Option<&str>,
) -> Result<Target> {
    if let Some(id) = task_id {
        // Ids outside i32 cannot exist; a wrapped cast could hit a real row.
        let Ok(id) = i32::try_from(id) else {
            return Ok(Target::Rejected(error_result(NOT_FOUND_MSG, "TASK_NOT_FOUND")));
        };
        return match store.get_task(user_id, id).await? {
            Some(task) => Ok(Target::Found(task)),
            None => Ok(Target::Rejected(error_result(NOT_FOUND_MSG, "TASK_NOT_FOUND"))),
        };
    }

    let title = match task_title {
        Some(title) if !title.trim().is_empty() => title.trim(),
        _ => {
            return Ok(Target::Rejected(error_result(
                MISSING_IDENTIFIER_MSG,
                "MISSING_IDENTIFIER",
            )))
        }
    };

    let matches = store.find_by_title(user_id, title).await?;
    match matches.len() {
        0 => Ok(Target::Rejected(error_result(NOT_FOUND_MSG, "TASK_NOT_FOUND"))),
        1 => Ok(Target::Found(matches.into_iter().next().unwrap())),
        _ => {
            let listing: Vec<String> = matches
                .iter()
                .map(|t| format!("- {} (ID: {})", t.title, t.id))
                .collect();
            let message = format!(
                "Multiple tasks match that description:\n{}\nPlease be more specific or use the task ID.",
                listing.join("\n")
            );
            Ok(Target::Rejected(error_result(message, "AMBIGUOUS_MATCH")))
        }
    }
}

pub struct AddTaskTool {
    store: Arc<TaskStore>,
}

impl AddTaskTool {
    pub fn new(store: Arc<TaskStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for AddTaskTool {
    fn name(&self) -> &str {
        "add_task"
    }

    fn description(&self) -> &str {
        "Create a new task for the authenticated user with a title and optional description."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "user_id": { "type": "integer", "description": "ID of the authenticated user" },
                "title": { "type": "string", "description": "Task title" },
                "description": { "type": "string", "description": "Optional task description" }
            },
            "required": ["user_id", "title"]
        })
    }

    async fn execute(&self, params: Value) -> Result<Value> {
        let Some(user_id) = user_id_param(&params) else {
            return Ok(error_result("Invalid user ID", "VALIDATION_ERROR"));
        };

        let title = str_param(&params, "title").map(str::trim).unwrap_or("");
        if title.is_empty() {
            warn!(user_id, "add_task rejected: empty title");
            return Ok(error_result("Task title cannot be empty", "INVALID_TITLE"));
        }
        if title.chars().count() > MAX_TITLE_LEN {
            return Ok(error_result(
                format!("Task title cannot exceed {MAX_TITLE_LEN} characters"),
                "INVALID_TITLE",
            ));
        }
        let description = str_param(&params, "description")
            .map(str::trim)
            .filter(|d| !d.is_empty());
        if let Some(description) = description {
            if description.chars().count() > MAX_DESCRIPTION_LEN {
                return Ok(error_result(
                    format!("Task description cannot exceed {MAX_DESCRIPTION_LEN} characters"),
                    "VALIDATION_ERROR",
                ));
            }
        }

        let task = self.store.create_task(user_id, title, description).await?;
        info!(task_id = task.id, user_id, "task created");
        Ok(success_result(
            format!("Task '{}' created successfully", task.title),
            task_json(&task),
        ))
    }
}

pub struct ListTasksTool {
    store: Arc<TaskStore>,
}

impl ListTasksTool {
    pub fn new(store: Arc<TaskStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for ListTasksTool {
    fn name(&self) -> &str {
        "list_tasks"
    }

    fn description(&self) -> &str {
        "Retrieve tasks for the authenticated user, optionally filtered by completion status."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "user_id": { "type": "integer", "description": "ID of the authenticated user" },
                "filter": { "type": "string", "enum": ["all", "pending", "completed"] },
                "limit": { "type": "integer", "description": "Maximum number of tasks to return" }
            },
            "required": ["user_id"]
        })
    }

    async fn execute(&self, params: Value) -> Result<Value> {
        let Some(user_id) = user_id_param(&params) else {
            return Ok(error_result("Invalid user ID", "VALIDATION_ERROR"));
        };

        let filter = match str_param(&params, "filter").unwrap_or("all") {
            "all" => StatusFilter::All,
            "pending" => StatusFilter::Pending,
            "completed" => StatusFilter::Completed,
            _ => {
                return Ok(error_result(
                    "Filter must be 'all', 'pending', or 'completed'",
                    "INVALID_FILTER",
                ))
            }
        };
        let limit = params.get("limit").and_then(|v| v.as_u64()).unwrap_or(50) as usize;

        let tasks = self.store.list_tasks(user_id, filter, limit).await?;
        let task_list: Vec<Value> = tasks.iter().map(task_json).collect();
        let message = if task_list.is_empty() {
            "You have no tasks yet. Add one to get started!".to_string()
        } else {
            let filter_text = match filter {
                StatusFilter::All => String::new(),
                other => format!("{} ", other.as_str()),
            };
            let plural = if task_list.len() == 1 { "" } else { "s" };
            format!("You have {} {}task{}", task_list.len(), filter_text, plural)
        };

        Ok(success_result(
            message,
            json!({
                "tasks": task_list,
                "count": task_list.len(),
                "filter": filter.as_str(),
            }),
        ))
    }
}

pub struct CompleteTaskTool {
    store: Arc<TaskStore>,
}

impl CompleteTaskTool {
    pub fn new(store: Arc<TaskStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for CompleteTaskTool {
    fn name(&self) -> &str {
        "complete_task"
    }

    fn description(&self) -> &str {
        "Mark a task as completed. Accepts either task_id or task_title for identification."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "user_id": { "type": "integer", "description": "ID of the authenticated user" },
                "task_id": { "type": "integer", "description": "ID of the task to complete" },
                "task_title": { "type": "string", "description": "Title or partial title of the task" }
            },
            "required": ["user_id"]
        })
    }

    async fn execute(&self, params: Value) -> Result<Value> {
        let Some(user_id) = user_id_param(&params) else {
            return Ok(error_result("Invalid user ID", "VALIDATION_ERROR"));
        };
        let task_id = params.get("task_id").and_then(|v| v.as_i64());
        let task_title = str_param(&params, "task_title");
        if task_id.is_none() && task_title.map(str::trim).unwrap_or("").is_empty() {
            return Ok(error_result(MISSING_IDENTIFIER_MSG, "MISSING_IDENTIFIER"));
        }

        let task = match resolve_target(&self.store, user_id, task_id, task_title).await? {
            Target::Found(task) => task,
            Target::Rejected(envelope) => return Ok(envelope),
        };

        if task.completed {
            return Ok(success_result(
                format!("Task '{}' is already marked as complete", task.title),
                task_json(&task),
            ));
        }

        match self.store.set_completed(user_id, task.id, true).await? {
            Some(updated) => {
                info!(task_id = updated.id, user_id, "task completed");
                Ok(success_result(
                    format!("Task '{}' marked as complete", updated.title),
                    task_json(&updated),
                ))
            }
            None => Ok(error_result(NOT_FOUND_MSG, "TASK_NOT_FOUND")),
        }
    }
}

pub struct DeleteTaskTool {
    store: Arc<TaskStore>,
}

impl DeleteTaskTool {
    pub fn new(store: Arc<TaskStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for DeleteTaskTool {
    fn name(&self) -> &str {
        "delete_task"
    }

    fn description(&self) -> &str {
        "Permanently delete a task. Accepts either task_id or task_title for identification."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "user_id": { "type": "integer", "description": "ID of the authenticated user" },
                "task_id": { "type": "integer", "description": "ID of the task to delete" },
                "task_title": { "type": "string", "description": "Title or partial title of the task" }
            },
            "required": ["user_id"]
        })
    }

    async fn execute(&self, params: Value) -> Result<Value> {
        let Some(user_id) = user_id_param(&params) else {
            return Ok(error_result("Invalid user ID", "VALIDATION_ERROR"));
        };
        let task_id = params.get("task_id").and_then(|v| v.as_i64());
        let task_title = str_param(&params, "task_title");
        if task_id.is_none() && task_title.map(str::trim).unwrap_or("").is_empty() {
            return Ok(error_result(MISSING_IDENTIFIER_MSG, "MISSING_IDENTIFIER"));
        }

        let task = match resolve_target(&self.store, user_id, task_id, task_title).await? {
            Target::Found(task) => task,
            Target::Rejected(envelope) => return Ok(envelope),
        };

        if self.store.delete_task(user_id, task.id).await? {
            info!(task_id = task.id, user_id, "task deleted");
            Ok(success_result(
                format!("Task '{}' has been deleted", task.title),
                json!({ "task_id": task.id, "title": task.title }),
            ))
        } else {
            Ok(error_result(NOT_FOUND_MSG, "TASK_NOT_FOUND"))
        }
    }
}

pub struct UpdateTaskTool {
    store: Arc<TaskStore>,
}

impl UpdateTaskTool {
    pub fn new(store: Arc<TaskStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for UpdateTaskTool {
    fn name(&self) -> &str {
        "update_task"
    }

    fn description(&self) -> &str {
        "Update a task's title and/or description. Accepts either task_id or task_title for identification."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "user_id": { "type": "integer", "description": "ID of the authenticated user" },
                "task_id": { "type": "integer", "description": "ID of the task to update" },
                "task_title": { "type": "string", "description": "Current title or partial title of the task" },
                "new_title": { "type": "string", "description": "New title for the task" },
                "new_description": { "type": "string", "description": "New description for the task" }
            },
            "required": ["user_id"]
        })
    }

    async fn execute(&self, params: Value) -> Result<Value> {
        let Some(user_id) = user_id_param(&params) else {
            return Ok(error_result("Invalid user ID", "VALIDATION_ERROR"));
        };
        let task_id = params.get("task_id").and_then(|v| v.as_i64());
        let task_title = str_param(&params, "task_title");
        if task_id.is_none() && task_title.map(str::trim).unwrap_or("").is_empty() {
            return Ok(error_result(MISSING_IDENTIFIER_MSG, "MISSING_IDENTIFIER"));
        }

        let new_title = str_param(&params, "new_title");
        let new_description = str_param(&params, "new_description");
        if new_title.is_none() && new_description.is_none() {
            return Ok(error_result(
                "Please specify what you'd like to update",
                "NO_UPDATES",
            ));
        }
        if let Some(title) = new_title {
            if title.trim().is_empty() {
                return Ok(error_result("Task title cannot be empty", "INVALID_TITLE"));
            }
            if title.trim().chars().count() > MAX_TITLE_LEN {
                return Ok(error_result(
                    format!("Task title cannot exceed {MAX_TITLE_LEN} characters"),
                    "INVALID_TITLE",
                ));
            }
        }

        let task = match resolve_target(&self.store, user_id, task_id, task_title).await? {
            Target::Found(task) => task,
            Target::Rejected(envelope) => return Ok(envelope),
        };

        let updated = self
            .store
            .update_task(
                user_id,
                task.id,
                new_title.map(str::trim),
                new_description.map(str::trim),
            )
            .await?;
        match updated {
            Some(task) => {
                info!(task_id = task.id, user_id, "task updated");
                Ok(success_result("Task updated successfully", task_json(&task)))
            }
            None => Ok(error_result(NOT_FOUND_MSG, "TASK_NOT_FOUND")),
        }
    }
}
