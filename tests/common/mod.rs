#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use taskpilot::conversations::ConversationStore;
use taskpilot::error::Result;
use taskpilot::interfaces::providers::{LlmProvider, LlmResponse};
use taskpilot::plugins::ToolRegistry;
use taskpilot::services::{ChatService, Orchestrator};
use taskpilot::tasks::TaskStore;
use taskpilot::tools::{
    AddTaskTool, CompleteTaskTool, DeleteTaskTool, GetUserInfoTool, ListTasksTool, UpdateTaskTool,
};

/// Scripted provider: pops queued responses for tool-enabled calls and
/// records the prompts it saw.
pub struct QueueLlmProvider {
    queue: Mutex<VecDeque<LlmResponse>>,
    pub text: String,
    pub seen_messages: Mutex<Vec<Vec<Value>>>,
}

impl QueueLlmProvider {
    pub fn new(queue: Vec<LlmResponse>) -> Self {
        Self {
            queue: Mutex::new(VecDeque::from(queue)),
            text: "mock text".to_string(),
            seen_messages: Mutex::new(Vec::new()),
        }
    }

    pub fn with_text(text: &str) -> Self {
        let mut provider = Self::new(Vec::new());
        provider.text = text.to_string();
        provider
    }
}

#[async_trait]
impl LlmProvider for QueueLlmProvider {
    async fn generate_text(&self, messages: Vec<Value>, _system_prompt: &str) -> Result<String> {
        self.seen_messages.lock().await.push(messages);
        Ok(self.text.clone())
    }

    async fn generate_with_tools(
        &self,
        messages: Vec<Value>,
        _system_prompt: &str,
        _tools: Vec<Value>,
    ) -> Result<LlmResponse> {
        self.seen_messages.lock().await.push(messages);
        let mut guard = self.queue.lock().await;
        Ok(guard.pop_front().unwrap_or(LlmResponse {
            text: self.text.clone(),
            tool_calls: Vec::new(),
        }))
    }
}

pub async fn registry_with_tools(tasks: Arc<TaskStore>) -> Arc<ToolRegistry> {
    let registry = Arc::new(ToolRegistry::new());
    registry
        .register_tool(Arc::new(AddTaskTool::new(tasks.clone())))
        .await;
    registry
        .register_tool(Arc::new(ListTasksTool::new(tasks.clone())))
        .await;
    registry
        .register_tool(Arc::new(CompleteTaskTool::new(tasks.clone())))
        .await;
    registry
        .register_tool(Arc::new(DeleteTaskTool::new(tasks.clone())))
        .await;
    registry
        .register_tool(Arc::new(UpdateTaskTool::new(tasks.clone())))
        .await;
    registry
        .register_tool(Arc::new(GetUserInfoTool::new(tasks)))
        .await;
    registry
}

pub struct TestHarness {
    pub service: ChatService,
    pub tasks: Arc<TaskStore>,
    pub db_path: String,
    _dir: tempfile::TempDir,
}

pub async fn harness(provider: Option<Arc<dyn LlmProvider>>) -> TestHarness {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("taskpilot.db").to_string_lossy().to_string();

    let tasks = Arc::new(TaskStore::new(&db_path).await.expect("task store"));
    let conversations = Arc::new(
        ConversationStore::new(&db_path)
            .await
            .expect("conversation store"),
    );
    let registry = registry_with_tools(tasks.clone()).await;
    let orchestrator = Arc::new(Orchestrator::new(registry, provider, None));

    TestHarness {
        service: ChatService::new(conversations, orchestrator),
        tasks,
        db_path,
        _dir: dir,
    }
}
