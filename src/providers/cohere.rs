use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::CohereConfig;
use crate::error::{Result, TaskPilotError};
use crate::interfaces::providers::{LlmProvider, LlmResponse, ToolCall};

pub const DEFAULT_MODEL: &str = "command-r-plus";
pub const DEFAULT_BASE_URL: &str = "https://api.cohere.com";

const MAX_ATTEMPTS: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Chat provider backed by Cohere's v2 chat API.
pub struct CohereProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl CohereProvider {
    pub fn new(config: &CohereConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| TaskPilotError::Config("Cohere API key is not set".to_string()))?;
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TaskPilotError::Http(e.to_string()))?;
        Ok(Self {
            client,
            api_key,
            model: config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        })
    }

    /// Sends the chat request, retrying on rate limits and server errors
    /// with a doubling backoff.
    async fn chat(&self, body: Value) -> Result<Value> {
        let url = format!("{}/v2/chat", self.base_url.trim_end_matches('/'));
        let mut backoff = INITIAL_BACKOFF;

        for attempt in 1..=MAX_ATTEMPTS {
            let response = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await;

            match response {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response
                            .json::<Value>()
                            .await
                            .map_err(|e| TaskPilotError::Http(e.to_string()));
                    }
                    let retryable = status.as_u16() == 429 || status.is_server_error();
                    let detail = response.text().await.unwrap_or_default();
                    if !retryable || attempt == MAX_ATTEMPTS {
                        return Err(TaskPilotError::Http(format!(
                            "Cohere request failed with status {status}: {detail}"
                        )));
                    }
                    warn!(%status, attempt, "Cohere request throttled, retrying");
                }
                Err(e) => {
                    if attempt == MAX_ATTEMPTS {
                        return Err(TaskPilotError::Http(e.to_string()));
                    }
                    warn!(error = %e, attempt, "Cohere request failed, retrying");
                }
            }

            tokio::time::sleep(backoff).await;
            backoff *= 2;
        }

        Err(TaskPilotError::Http("Cohere request failed".to_string()))
    }

    fn build_messages(messages: Vec<Value>, system_prompt: &str) -> Vec<Value> {
        let mut out = Vec::with_capacity(messages.len() + 1);
        if !system_prompt.trim().is_empty() {
            out.push(json!({"role": "system", "content": system_prompt}));
        }
        out.extend(messages);
        out
    }
}

fn extract_text(body: &Value) -> String {
    body["message"]["content"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|item| item["text"].as_str())
        .collect::<Vec<_>>()
        .join("")
}

fn extract_tool_calls(body: &Value) -> Vec<ToolCall> {
    body["message"]["tool_calls"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|call| {
            let name = call["function"]["name"].as_str()?.to_string();
            // Arguments arrive as a JSON-encoded string.
            let arguments = call["function"]["arguments"]
                .as_str()
                .and_then(|raw| serde_json::from_str(raw).ok())
                .unwrap_or_else(|| json!({}));
            Some(ToolCall { name, arguments })
        })
        .collect()
}

#[async_trait]
impl LlmProvider for CohereProvider {
    async fn generate_text(&self, messages: Vec<Value>, system_prompt: &str) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": Self::build_messages(messages, system_prompt),
        });
        let response = self.chat(body).await?;
        debug!(model = %self.model, "Cohere text response received");
        Ok(extract_text(&response))
    }

    async fn generate_with_tools(
        &self,
        messages: Vec<Value>,
        system_prompt: &str,
        tools: Vec<Value>,
    ) -> Result<LlmResponse> {
        let mut body = json!({
            "model": self.model,
            "messages": Self::build_messages(messages, system_prompt),
        });
        if !tools.is_empty() {
            body["tools"] = Value::Array(tools);
        }
        let response = self.chat(body).await?;
        Ok(LlmResponse {
            text: extract_text(&response),
            tool_calls: extract_tool_calls(&response),
        })
    }
}
