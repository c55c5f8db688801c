use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::RwLock;

use crate::interfaces::plugins::Tool;

/// Runtime lookup table for the tools the orchestrator may execute.
/// A tool name that is not registered here is never invoked, no matter
/// what an intent maps to.
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
        }
    }

    /// Returns false when a tool with the same name is already registered.
    pub async fn register_tool(&self, tool: Arc<dyn Tool>) -> bool {
        let mut tools = self.tools.write().await;
        let name = tool.name().to_string();
        if tools.contains_key(&name) {
            return false;
        }
        tools.insert(name, tool);
        true
    }

    pub async fn get_tool(&self, tool_name: &str) -> Option<Arc<dyn Tool>> {
        let tools = self.tools.read().await;
        tools.get(tool_name).cloned()
    }

    pub async fn list_tools(&self) -> Vec<String> {
        let tools = self.tools.read().await;
        let mut names: Vec<String> = tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Tool specifications in the shape LLM providers expect.
    pub async fn tool_specs(&self) -> Vec<Value> {
        let tools = self.tools.read().await;
        let mut specs: Vec<Value> = tools
            .values()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name(),
                        "description": tool.description(),
                        "parameters": tool.parameters(),
                    }
                })
            })
            .collect();
        specs.sort_by_key(|spec| {
            spec["function"]["name"]
                .as_str()
                .unwrap_or_default()
                .to_string()
        });
        specs
    }
}
