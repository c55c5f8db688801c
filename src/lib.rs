pub mod config;
pub mod conversations;
pub mod db;
pub mod error;
pub mod interfaces;
pub mod pipeline;
pub mod plugins;
pub mod providers;
pub mod security;
pub mod services;
pub mod tasks;
pub mod tools;

pub use crate::config::Config;
pub use crate::error::{Result, TaskPilotError};
pub use crate::services::{ChatReply, ChatService, Orchestrator};
