pub mod task_tools;
pub mod user_info;

use serde_json::{json, Value};

pub use task_tools::{
    AddTaskTool, CompleteTaskTool, DeleteTaskTool, ListTasksTool, UpdateTaskTool,
};
pub use user_info::GetUserInfoTool;

/// Structured tool envelope. Business-level failures (bad input, missing
/// task) are encoded here with `success: false` rather than surfaced as
/// transport errors, so the orchestrator can act on the error code.
pub(crate) fn success_result(message: impl Into<String>, data: Value) -> Value {
    json!({
        "success": true,
        "message": message.into(),
        "data": data,
    })
}

pub(crate) fn error_result(message: impl Into<String>, error_code: &str) -> Value {
    json!({
        "success": false,
        "message": message.into(),
        "error_code": error_code,
    })
}
