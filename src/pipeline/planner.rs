use serde::Serialize;

use crate::pipeline::entities::ExtractedEntities;
use crate::pipeline::intent::Intent;
use crate::pipeline::mapper;

pub const MAX_PLAN_STEPS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanStep {
    pub step_number: u8,
    pub tool: String,
    pub reason: String,
    pub depends_on: Option<u8>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionPlan {
    pub requires_chaining: bool,
    pub steps: Vec<PlanStep>,
}

impl ExecutionPlan {
    fn single(tool: &str, reason: &str) -> Self {
        Self {
            requires_chaining: false,
            steps: vec![PlanStep {
                step_number: 1,
                tool: tool.to_string(),
                reason: reason.to_string(),
                depends_on: None,
            }],
        }
    }
}

/// Decides how many sequential tool calls resolve the request. Steps form a
/// strictly increasing list with `depends_on` pointing only backwards, so the
/// plan is acyclic by construction and capped at `MAX_PLAN_STEPS`.
pub fn build_plan(intent: Intent, entities: &ExtractedEntities) -> ExecutionPlan {
    let Some(tool) = mapper::map_intent(intent) else {
        return ExecutionPlan::default();
    };

    if !intent.is_mutating() {
        return ExecutionPlan::single(tool, "direct execution");
    }

    if entities.task_id.is_some() {
        return ExecutionPlan::single(tool, "task id provided");
    }

    if entities.title.is_some() {
        let plan = ExecutionPlan {
            requires_chaining: true,
            steps: vec![
                PlanStep {
                    step_number: 1,
                    tool: "list_tasks".to_string(),
                    reason: "resolve title to task id".to_string(),
                    depends_on: None,
                },
                PlanStep {
                    step_number: 2,
                    tool: tool.to_string(),
                    reason: "apply mutation to resolved task".to_string(),
                    depends_on: Some(1),
                },
            ],
        };
        debug_assert!(plan.steps.len() <= MAX_PLAN_STEPS);
        return plan;
    }

    // No id and no title: list only, then ask the user instead of guessing.
    ExecutionPlan::single("list_tasks", "ambiguous target, needs clarification")
}

/// True when the plan stops short of the requested mutation so the caller
/// should prompt for clarification after the listing step.
pub fn needs_clarification(intent: Intent, entities: &ExtractedEntities) -> bool {
    intent.is_mutating() && entities.task_id.is_none() && entities.title.is_none()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entities(title: Option<&str>, task_id: Option<i64>) -> ExtractedEntities {
        ExtractedEntities {
            title: title.map(|t| t.to_string()),
            description: None,
            task_id,
            status_filter: None,
        }
    }

    #[test]
    fn mutation_with_id_is_single_step() {
        let plan = build_plan(Intent::CompleteTask, &entities(None, Some(5)));
        assert!(!plan.requires_chaining);
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].tool, "complete_task");
        assert_eq!(plan.steps[0].depends_on, None);
    }

    #[test]
    fn delete_by_title_chains_through_list() {
        let plan = build_plan(Intent::DeleteTask, &entities(Some("Meeting task"), None));
        assert!(plan.requires_chaining);
        assert_eq!(plan.steps.len(), 2);
        assert_eq!(plan.steps[0].tool, "list_tasks");
        assert_eq!(plan.steps[0].depends_on, None);
        assert_eq!(plan.steps[1].tool, "delete_task");
        assert_eq!(plan.steps[1].depends_on, Some(1));
    }

    #[test]
    fn ambiguous_mutation_lists_then_halts() {
        let plan = build_plan(Intent::DeleteTask, &entities(None, None));
        assert!(!plan.requires_chaining);
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].tool, "list_tasks");
        assert!(needs_clarification(Intent::DeleteTask, &entities(None, None)));
    }

    #[test]
    fn add_list_identity_are_single_step() {
        for (intent, tool) in [
            (Intent::AddTask, "add_task"),
            (Intent::ListTasks, "list_tasks"),
            (Intent::IdentityQuery, "get_user_info"),
        ] {
            let plan = build_plan(intent, &entities(None, None));
            assert!(!plan.requires_chaining);
            assert_eq!(plan.steps.len(), 1);
            assert_eq!(plan.steps[0].tool, tool);
        }
    }

    #[test]
    fn unknown_intent_yields_empty_plan() {
        let plan = build_plan(Intent::Unknown, &entities(None, None));
        assert!(!plan.requires_chaining);
        assert!(plan.steps.is_empty());
    }

    #[test]
    fn plans_are_acyclic_and_bounded() {
        let plan = build_plan(Intent::UpdateTask, &entities(Some("Report"), None));
        assert!(plan.steps.len() <= MAX_PLAN_STEPS);
        for step in &plan.steps {
            if let Some(dep) = step.depends_on {
                assert!(dep < step.step_number);
            }
        }
    }
}
