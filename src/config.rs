use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{Result, TaskPilotError};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CohereConfig {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub sqlite_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentConfig {
    pub name: Option<String>,
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    pub cohere: Option<CohereConfig>,
    pub database: Option<DatabaseConfig>,
    pub agent: Option<AgentConfig>,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| TaskPilotError::Config(e.to_string()))?;
        let config: Config =
            serde_json::from_str(&content).map_err(|e| TaskPilotError::Config(e.to_string()))?;
        Ok(config)
    }

    pub fn sqlite_path(&self) -> String {
        self.database
            .as_ref()
            .and_then(|db| db.sqlite_path.clone())
            .filter(|path| !path.trim().is_empty())
            .unwrap_or_else(default_db_path)
    }
}

pub fn default_db_path() -> String {
    "./data/taskpilot.db".to_string()
}
