use std::sync::Arc;

use clap::Parser;
use console::{style, Term};
use tokio::io::{self, AsyncBufReadExt};
use tracing_subscriber::EnvFilter;

use taskpilot::config::Config;
use taskpilot::conversations::ConversationStore;
use taskpilot::error::Result;
use taskpilot::interfaces::providers::LlmProvider;
use taskpilot::plugins::ToolRegistry;
use taskpilot::providers::CohereProvider;
use taskpilot::services::{ChatService, Orchestrator};
use taskpilot::tasks::TaskStore;
use taskpilot::tools::{
    AddTaskTool, CompleteTaskTool, DeleteTaskTool, GetUserInfoTool, ListTasksTool, UpdateTaskTool,
};

#[derive(Parser, Debug)]
#[command(name = "taskpilot")]
#[command(about = "TaskPilot chat assistant for natural-language task management")]
struct Cli {
    #[arg(long, help = "Path to a JSON config file")]
    config: Option<String>,

    #[arg(long, help = "SQLite database path (overrides config)")]
    db: Option<String>,

    #[arg(long, default_value_t = 1)]
    user_id: i64,

    #[arg(long, env = "COHERE_API_KEY")]
    cohere_api_key: Option<String>,

    #[arg(long, help = "Send a single message and exit")]
    prompt: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,taskpilot=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(key) = &cli.cohere_api_key {
        let cohere = config.cohere.get_or_insert_with(Default::default);
        cohere.api_key = Some(key.clone());
    }
    let db_path = cli.db.clone().unwrap_or_else(|| config.sqlite_path());

    let service = build_service(&config, &db_path).await?;

    let term = Term::stdout();
    if let Some(prompt) = &cli.prompt {
        let reply = service.process_message(cli.user_id, prompt, None).await?;
        term.write_line(&reply.message)
            .map_err(|e| taskpilot::TaskPilotError::Runtime(e.to_string()))?;
        return Ok(());
    }

    run_repl(&service, cli.user_id, &term).await
}

async fn build_service(config: &Config, db_path: &str) -> Result<ChatService> {
    let tasks = Arc::new(TaskStore::new(db_path).await?);
    let conversations = Arc::new(ConversationStore::new(db_path).await?);

    let registry = Arc::new(ToolRegistry::new());
    registry.register_tool(Arc::new(AddTaskTool::new(tasks.clone()))).await;
    registry.register_tool(Arc::new(ListTasksTool::new(tasks.clone()))).await;
    registry.register_tool(Arc::new(CompleteTaskTool::new(tasks.clone()))).await;
    registry.register_tool(Arc::new(DeleteTaskTool::new(tasks.clone()))).await;
    registry.register_tool(Arc::new(UpdateTaskTool::new(tasks.clone()))).await;
    registry.register_tool(Arc::new(GetUserInfoTool::new(tasks))).await;

    let provider = match config.cohere.as_ref() {
        Some(cohere) if cohere.api_key.as_deref().is_some_and(|k| !k.trim().is_empty()) => {
            Some(Arc::new(CohereProvider::new(cohere)?) as Arc<dyn LlmProvider>)
        }
        _ => None,
    };

    let instructions = config
        .agent
        .as_ref()
        .and_then(|agent| agent.instructions.clone());
    let orchestrator = Arc::new(Orchestrator::new(registry, provider, instructions));
    Ok(ChatService::new(conversations, orchestrator))
}

async fn run_repl(service: &ChatService, user_id: i64, term: &Term) -> Result<()> {
    term.write_line(&format!(
        "{} Type a request ('add a task to buy milk', 'show my tasks') or 'exit' to quit.",
        style("TaskPilot ready.").green().bold()
    ))
    .map_err(|e| taskpilot::TaskPilotError::Runtime(e.to_string()))?;

    let stdin = io::BufReader::new(io::stdin());
    let mut lines = stdin.lines();
    loop {
        term.write_str("> ")
            .map_err(|e| taskpilot::TaskPilotError::Runtime(e.to_string()))?;
        let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| taskpilot::TaskPilotError::Runtime(e.to_string()))?
        else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            break;
        }

        match service.process_message(user_id, line, None).await {
            Ok(reply) => {
                term.write_line(&reply.message)
                    .map_err(|e| taskpilot::TaskPilotError::Runtime(e.to_string()))?;
            }
            Err(e) => {
                term.write_line(&format!("{} {}", style("error:").red(), e))
                    .map_err(|e| taskpilot::TaskPilotError::Runtime(e.to_string()))?;
            }
        }
    }
    Ok(())
}
