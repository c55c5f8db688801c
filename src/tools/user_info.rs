use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::Result;
use crate::interfaces::plugins::Tool;
use crate::tasks::TaskStore;

use super::{error_result, success_result};

pub struct GetUserInfoTool {
    store: Arc<TaskStore>,
}

impl GetUserInfoTool {
    pub fn new(store: Arc<TaskStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for GetUserInfoTool {
    fn name(&self) -> &str {
        "get_user_info"
    }

    fn description(&self) -> &str {
        "Retrieve account information for the authenticated user, including task counts."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "user_id": { "type": "integer", "description": "ID of the authenticated user" }
            },
            "required": ["user_id"]
        })
    }

    async fn execute(&self, params: Value) -> Result<Value> {
        let user_id = match params.get("user_id").and_then(|v| v.as_i64()) {
            Some(id) if id > 0 => id,
            _ => return Ok(error_result("Invalid user ID", "VALIDATION_ERROR")),
        };

        let counts = self.store.counts(user_id).await?;
        Ok(success_result(
            format!(
                "You have {} tasks: {} pending and {} completed",
                counts.total, counts.pending, counts.completed
            ),
            json!({
                "user_id": user_id,
                "total": counts.total,
                "pending": counts.pending,
                "completed": counts.completed,
            }),
        ))
    }
}
