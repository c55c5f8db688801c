use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::conversations::MessageRecord;
use crate::error::{Result, TaskPilotError};
use crate::interfaces::providers::LlmProvider;
use crate::pipeline::entities::{self, ExtractedEntities, StatusFilter};
use crate::pipeline::formatter::{self, ErrorKind, FormattedError, FormattedReply, Tone};
use crate::pipeline::intent::{self, Intent};
use crate::pipeline::mapper;
use crate::pipeline::normalizer;
use crate::pipeline::planner;
use crate::plugins::ToolRegistry;
use crate::security::{self, AccessRequest, Operation, ResourceRef};

pub const DEFAULT_INSTRUCTIONS: &str = "You are TaskPilot, a friendly assistant that helps users manage their todo list. Keep replies short and natural.";

/// Final pipeline verdict handed back to the chat layer.
#[derive(Debug, Clone)]
pub enum Outcome {
    Success { message: String, tone: Tone },
    Failure(FormattedError),
}

impl Outcome {
    pub fn message(&self) -> &str {
        match self {
            Outcome::Success { message, .. } => message,
            Outcome::Failure(err) => &err.user_message,
        }
    }

    fn from_reply(reply: FormattedReply) -> Self {
        Outcome::Success {
            message: reply.message,
            tone: reply.tone,
        }
    }
}

enum TitleMatch {
    Unique(i64),
    None,
    Ambiguous(Vec<(i64, String)>),
}

/// Drives one user message through the deterministic pipeline:
/// normalize, classify, extract, map, plan, then per step validate and
/// execute. A configured LLM provider only phrases the final reply (and
/// handles free-form chat); every task operation goes through the rule
/// pipeline and the registry.
pub struct Orchestrator {
    registry: Arc<ToolRegistry>,
    provider: Option<Arc<dyn LlmProvider>>,
    instructions: String,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<ToolRegistry>,
        provider: Option<Arc<dyn LlmProvider>>,
        instructions: Option<String>,
    ) -> Self {
        Self {
            registry,
            provider,
            instructions: instructions.unwrap_or_else(|| DEFAULT_INSTRUCTIONS.to_string()),
        }
    }

    pub async fn handle(
        &self,
        requesting_user_id: i64,
        session_user_id: i64,
        message: &str,
        history: &[MessageRecord],
    ) -> Result<Outcome> {
        let tone = formatter::detect_tone(message);
        let normalized = normalizer::normalize(message);
        let detected = intent::classify(&normalized.text);
        let extracted = entities::extract(&normalized.text, detected);
        debug!(
            intent = detected.as_str(),
            transformations = normalized.transformations.len(),
            "pipeline classified message"
        );

        if detected == Intent::Unknown {
            return self
                .free_form_reply(requesting_user_id, session_user_id, message, history, tone)
                .await;
        }

        let Some(_tool) = mapper::map_intent(detected) else {
            return self
                .free_form_reply(requesting_user_id, session_user_id, message, history, tone)
                .await;
        };

        let plan = planner::build_plan(detected, &extracted);
        if plan.steps.is_empty() {
            return self
                .free_form_reply(requesting_user_id, session_user_id, message, history, tone)
                .await;
        }
        let clarify = planner::needs_clarification(detected, &extracted);

        let mut resolved_id: Option<i64> = None;
        let mut last_result: Option<(String, Value)> = None;
        let mut tool_context: Vec<String> = Vec::new();

        for step in &plan.steps {
            let request = AccessRequest {
                requesting_user_id,
                session_user_id,
                operation: operation_for_tool(&step.tool),
                resource: ResourceRef {
                    resource_type: "task".to_string(),
                    resource_id: resolved_id.or(extracted.task_id),
                    owner_id: Some(session_user_id),
                },
            };
            let decision = security::validate(&request);
            if !decision.authorized {
                warn!(
                    tool = %step.tool,
                    step = step.step_number,
                    "authorization denied, abandoning plan"
                );
                let mut formatted =
                    formatter::format_error(ErrorKind::NotFound, Some(&decision.reason));
                formatted.severity = decision.severity;
                return Ok(Outcome::Failure(formatted));
            }

            let params = build_params(
                &step.tool,
                session_user_id,
                &extracted,
                resolved_id,
                clarify || step.depends_on.is_some(),
            );
            let envelope = self.execute_tool(&step.tool, params).await?;

            if envelope["success"] != Value::Bool(true) {
                let code = envelope["error_code"].as_str().unwrap_or("UNKNOWN_ERROR");
                let kind = ErrorKind::from_code(code);
                info!(tool = %step.tool, code, "tool reported failure, chain stopped");
                return Ok(Outcome::Failure(formatter::format_error(
                    kind,
                    envelope["message"].as_str(),
                )));
            }

            // A chained mutating step needs the id resolved from the listing.
            if step.depends_on.is_none() && plan.requires_chaining {
                let needle = extracted.title.as_deref().unwrap_or("");
                match match_title(&envelope, needle) {
                    TitleMatch::Unique(id) => resolved_id = Some(id),
                    TitleMatch::None => {
                        return Ok(Outcome::Failure(formatter::format_error(
                            ErrorKind::NotFound,
                            None,
                        )));
                    }
                    TitleMatch::Ambiguous(candidates) => {
                        let listing: Vec<String> = candidates
                            .iter()
                            .map(|(id, title)| format!("- {title} (ID: {id})"))
                            .collect();
                        let message = format!(
                            "Multiple tasks match that description:\n{}\nPlease be more specific or use the task ID.",
                            listing.join("\n")
                        );
                        return Ok(Outcome::Failure(formatter::format_error(
                            ErrorKind::Validation,
                            Some(&message),
                        )));
                    }
                }
            }

            if let Some(message) = envelope["message"].as_str() {
                tool_context.push(format!("Tool {}: {}", step.tool, message));
            }
            last_result = Some((step.tool.clone(), envelope));
        }

        let (tool_name, envelope) = last_result
            .ok_or_else(|| TaskPilotError::Runtime("plan produced no result".to_string()))?;

        if clarify {
            let listing = formatter::format_success(&tool_name, &envelope, message);
            return Ok(Outcome::Success {
                message: format!(
                    "I'm not sure which task you mean. {} Tell me the task ID and I'll take care of it.",
                    listing.message
                ),
                tone,
            });
        }

        if let Some(provider) = &self.provider {
            match self
                .phrase_with_llm(provider.as_ref(), history, &tool_context)
                .await
            {
                Ok(text) if !text.trim().is_empty() => {
                    return Ok(Outcome::Success { message: text, tone });
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "LLM phrasing failed, using template reply"),
            }
        }

        Ok(Outcome::from_reply(formatter::format_success(
            &tool_name, &envelope, message,
        )))
    }

    async fn execute_tool(&self, tool_name: &str, params: Value) -> Result<Value> {
        let Some(tool) = self.registry.get_tool(tool_name).await else {
            warn!(tool = tool_name, "tool not registered");
            return Ok(json!({
                "success": false,
                "message": "That operation is unavailable",
                "error_code": "TOOL_ERROR",
            }));
        };

        match tool.execute(params).await {
            Ok(envelope) => Ok(envelope),
            Err(e) => {
                error!(tool = tool_name, error = %e, "tool execution failed");
                let code = match e {
                    TaskPilotError::Database(_) => "DATABASE_ERROR",
                    _ => "TOOL_ERROR",
                };
                Ok(json!({
                    "success": false,
                    "message": "That operation failed. Please try again.",
                    "error_code": code,
                }))
            }
        }
    }

    /// Unknown intent: defer to the LLM with the tool specs exposed, so the
    /// model can still choose a task operation the rules missed. Without a
    /// provider, point the user at what the assistant can do.
    async fn free_form_reply(
        &self,
        requesting_user_id: i64,
        session_user_id: i64,
        message: &str,
        history: &[MessageRecord],
        tone: Tone,
    ) -> Result<Outcome> {
        if let Some(provider) = &self.provider {
            let messages = history_messages(history, Some(message));
            let tools = self.registry.tool_specs().await;
            match provider
                .generate_with_tools(messages, &self.instructions, tools)
                .await
            {
                Ok(response) => {
                    if response.tool_calls.is_empty() {
                        if !response.text.trim().is_empty() {
                            return Ok(Outcome::Success {
                                message: response.text,
                                tone,
                            });
                        }
                    } else {
                        return self
                            .run_llm_tool_calls(
                                provider.clone(),
                                requesting_user_id,
                                session_user_id,
                                history,
                                response.tool_calls,
                                tone,
                            )
                            .await;
                    }
                }
                Err(e) => warn!(error = %e, "LLM chat failed, using fallback reply"),
            }
        }
        Ok(Outcome::Success {
            message: "I can help you manage your tasks. Try something like 'add a task to buy milk', 'show my tasks', or 'mark task 2 as complete'.".to_string(),
            tone,
        })
    }

    /// Executes tool calls chosen by the LLM. The authenticated user id is
    /// injected over whatever the model supplied, and every call is
    /// authorized individually.
    async fn run_llm_tool_calls(
        &self,
        provider: Arc<dyn LlmProvider>,
        requesting_user_id: i64,
        session_user_id: i64,
        history: &[MessageRecord],
        tool_calls: Vec<crate::interfaces::providers::ToolCall>,
        tone: Tone,
    ) -> Result<Outcome> {
        let mut tool_context = Vec::new();
        for call in tool_calls {
            if !mapper::is_registered(&call.name) {
                warn!(tool = %call.name, "LLM requested unregistered tool, skipping");
                continue;
            }

            let request = AccessRequest {
                requesting_user_id,
                session_user_id,
                operation: operation_for_tool(&call.name),
                resource: ResourceRef {
                    resource_type: "task".to_string(),
                    resource_id: call.arguments["task_id"].as_i64(),
                    owner_id: Some(session_user_id),
                },
            };
            let decision = security::validate(&request);
            if !decision.authorized {
                let mut formatted =
                    formatter::format_error(ErrorKind::NotFound, Some(&decision.reason));
                formatted.severity = decision.severity;
                return Ok(Outcome::Failure(formatted));
            }

            let mut params = if call.arguments.is_object() {
                call.arguments.clone()
            } else {
                json!({})
            };
            params["user_id"] = json!(session_user_id);
            let envelope = self.execute_tool(&call.name, params).await?;
            if envelope["success"] != Value::Bool(true) {
                let code = envelope["error_code"].as_str().unwrap_or("UNKNOWN_ERROR");
                return Ok(Outcome::Failure(formatter::format_error(
                    ErrorKind::from_code(code),
                    envelope["message"].as_str(),
                )));
            }
            if let Some(message) = envelope["message"].as_str() {
                tool_context.push(format!("Tool {}: {}", call.name, message));
            }
        }

        if tool_context.is_empty() {
            return Ok(Outcome::Success {
                message: "I wasn't able to act on that. Could you rephrase your request?"
                    .to_string(),
                tone,
            });
        }

        match self
            .phrase_with_llm(provider.as_ref(), history, &tool_context)
            .await
        {
            Ok(text) if !text.trim().is_empty() => Ok(Outcome::Success { message: text, tone }),
            _ => Ok(Outcome::Success {
                message: format!("Operation completed. {}", tool_context.join(" ")),
                tone,
            }),
        }
    }

    async fn phrase_with_llm(
        &self,
        provider: &dyn LlmProvider,
        history: &[MessageRecord],
        tool_context: &[String],
    ) -> Result<String> {
        let follow_up = format!(
            "Tool execution results:\n{}\n\nProvide a natural language response to the user based on these results.",
            tool_context.join("\n")
        );
        let mut messages = history_messages(history, None);
        messages.push(json!({"role": "user", "content": follow_up}));
        provider.generate_text(messages, &self.instructions).await
    }
}

fn history_messages(history: &[MessageRecord], current: Option<&str>) -> Vec<Value> {
    let mut messages: Vec<Value> = history
        .iter()
        .map(|m| json!({"role": m.role, "content": m.content}))
        .collect();
    if let Some(current) = current {
        let already_recorded = history
            .last()
            .map(|m| m.role == "user" && m.content == current)
            .unwrap_or(false);
        if !already_recorded {
            messages.push(json!({"role": "user", "content": current}));
        }
    }
    messages
}

fn operation_for_tool(tool_name: &str) -> Operation {
    match tool_name {
        "delete_task" => Operation::Delete,
        "add_task" | "complete_task" | "update_task" => Operation::Write,
        _ => Operation::Read,
    }
}

/// Builds the payload for one plan step. A resolving `list_tasks` step and a
/// clarification listing both scan all statuses regardless of any filter the
/// user mentioned.
fn build_params(
    tool_name: &str,
    user_id: i64,
    extracted: &ExtractedEntities,
    resolved_id: Option<i64>,
    resolving: bool,
) -> Value {
    match tool_name {
        "add_task" => {
            let mut params = json!({"user_id": user_id});
            if let Some(title) = &extracted.title {
                params["title"] = json!(title);
            }
            if let Some(description) = &extracted.description {
                params["description"] = json!(description);
            }
            params
        }
        "list_tasks" => {
            let filter = if resolving {
                StatusFilter::All
            } else {
                extracted.status_filter.unwrap_or(StatusFilter::All)
            };
            json!({"user_id": user_id, "filter": filter.as_str()})
        }
        "complete_task" | "delete_task" => {
            let mut params = json!({"user_id": user_id});
            if let Some(id) = resolved_id.or(extracted.task_id) {
                params["task_id"] = json!(id);
            } else if let Some(title) = &extracted.title {
                params["task_title"] = json!(title);
            }
            params
        }
        "update_task" => {
            // The extracted title only names WHICH task to touch; updated
            // values never come from the rule pipeline, so the tool's own
            // no-updates validation answers when nothing was supplied.
            let mut params = json!({"user_id": user_id});
            if let Some(id) = resolved_id.or(extracted.task_id) {
                params["task_id"] = json!(id);
            } else if let Some(title) = &extracted.title {
                params["task_title"] = json!(title);
            }
            if let Some(description) = &extracted.description {
                params["new_description"] = json!(description);
            }
            params
        }
        _ => json!({"user_id": user_id}),
    }
}

/// Case-insensitive substring match of the wanted title against a
/// `list_tasks` envelope.
fn match_title(envelope: &Value, needle: &str) -> TitleMatch {
    let needle = needle.trim().to_lowercase();
    if needle.is_empty() {
        return TitleMatch::None;
    }
    let candidates: Vec<(i64, String)> = envelope["data"]["tasks"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|task| {
            let id = task["task_id"].as_i64()?;
            let title = task["title"].as_str()?;
            title
                .to_lowercase()
                .contains(&needle)
                .then(|| (id, title.to_string()))
        })
        .collect();

    match candidates.len() {
        0 => TitleMatch::None,
        1 => TitleMatch::Unique(candidates[0].0),
        _ => TitleMatch::Ambiguous(candidates),
    }
}
