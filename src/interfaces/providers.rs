use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub arguments: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn generate_text(&self, messages: Vec<Value>, system_prompt: &str) -> Result<String>;

    async fn generate_with_tools(
        &self,
        messages: Vec<Value>,
        system_prompt: &str,
        tools: Vec<Value>,
    ) -> Result<LlmResponse>;
}
