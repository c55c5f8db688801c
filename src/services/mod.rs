pub mod chat;
pub mod orchestrator;

pub use chat::{ChatReply, ChatService};
pub use orchestrator::{Orchestrator, Outcome};
