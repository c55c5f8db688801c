use crate::pipeline::intent::Intent;

/// The fixed tool registry surface. The mapper never returns a name outside
/// this set, even if the intent enum grows.
pub const REGISTERED_TOOLS: [&str; 6] = [
    "add_task",
    "list_tasks",
    "complete_task",
    "delete_task",
    "update_task",
    "get_user_info",
];

pub fn is_registered(tool_name: &str) -> bool {
    REGISTERED_TOOLS.contains(&tool_name)
}

fn table_lookup(intent: Intent) -> Option<&'static str> {
    match intent {
        Intent::AddTask => Some("add_task"),
        Intent::ListTasks => Some("list_tasks"),
        Intent::CompleteTask => Some("complete_task"),
        Intent::DeleteTask => Some("delete_task"),
        Intent::UpdateTask => Some("update_task"),
        Intent::IdentityQuery => Some("get_user_info"),
        Intent::Unknown => None,
    }
}

/// Static one-to-one lookup, gated by the registry check.
pub fn map_intent(intent: Intent) -> Option<&'static str> {
    table_lookup(intent).filter(|name| is_registered(name))
}
