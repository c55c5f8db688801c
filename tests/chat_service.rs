mod common;

use taskpilot::conversations::ConversationStore;
use taskpilot::pipeline::entities::StatusFilter;
use taskpilot::pipeline::formatter::Severity;

#[tokio::test]
async fn add_task_via_natural_language() {
    let h = common::harness(None).await;
    let reply = h
        .service
        .process_message(1, "Please add a task to buy milk", None)
        .await
        .expect("reply");

    assert!(reply.message.contains("Buy Milk"), "got: {}", reply.message);
    let tasks = h
        .tasks
        .list_tasks(1, StatusFilter::All, 10)
        .await
        .expect("list");
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].title, "Buy Milk");
}

#[tokio::test]
async fn mark_task_five_as_done_scenario() {
    let h = common::harness(None).await;
    for i in 1..=5 {
        h.tasks
            .create_task(1, &format!("Errand {i}"), None)
            .await
            .expect("create");
    }

    let reply = h
        .service
        .process_message(1, "Mark task 5 as done", None)
        .await
        .expect("reply");

    assert!(
        reply.message.contains("marked as complete"),
        "got: {}",
        reply.message
    );
    let task = h.tasks.get_task(1, 5).await.expect("get").expect("task");
    assert!(task.completed);
}

#[tokio::test]
async fn update_by_title_without_new_values_never_renames() {
    let h = common::harness(None).await;
    h.tasks
        .create_task(1, "Meeting task", None)
        .await
        .expect("create");

    let reply = h
        .service
        .process_message(1, "Change the meeting task", None)
        .await
        .expect("reply");

    assert!(
        reply.message.contains("what you'd like to update"),
        "got: {}",
        reply.message
    );
    let tasks = h
        .tasks
        .list_tasks(1, StatusFilter::All, 10)
        .await
        .expect("list");
    assert_eq!(tasks[0].title, "Meeting task");
}

#[tokio::test]
async fn delete_by_title_runs_two_step_chain() {
    let h = common::harness(None).await;
    h.tasks
        .create_task(1, "Meeting task", None)
        .await
        .expect("create");
    h.tasks
        .create_task(1, "Buy groceries", None)
        .await
        .expect("create");

    let reply = h
        .service
        .process_message(1, "Get rid of the meeting task", None)
        .await
        .expect("reply");

    assert!(
        reply.message.contains("has been deleted"),
        "got: {}",
        reply.message
    );
    let remaining = h
        .tasks
        .list_tasks(1, StatusFilter::All, 10)
        .await
        .expect("list");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].title, "Buy groceries");
}

#[tokio::test]
async fn ambiguous_title_asks_for_task_id() {
    let h = common::harness(None).await;
    h.tasks.create_task(1, "Call mom", None).await.expect("create");
    h.tasks
        .create_task(1, "Call dentist", None)
        .await
        .expect("create");

    let reply = h
        .service
        .process_message(1, "Delete the call task", None)
        .await
        .expect("reply");

    assert!(
        reply.message.contains("Multiple tasks match"),
        "got: {}",
        reply.message
    );
    assert_eq!(reply.severity, Some(Severity::Low));
    // Nothing was deleted.
    let remaining = h
        .tasks
        .list_tasks(1, StatusFilter::All, 10)
        .await
        .expect("list");
    assert_eq!(remaining.len(), 2);
}

#[tokio::test]
async fn mutating_request_without_target_prompts_for_clarification() {
    let h = common::harness(None).await;
    h.tasks
        .create_task(1, "Water plants", None)
        .await
        .expect("create");

    let reply = h
        .service
        .process_message(1, "delete it", None)
        .await
        .expect("reply");

    assert!(
        reply.message.contains("task ID"),
        "got: {}",
        reply.message
    );
    let remaining = h
        .tasks
        .list_tasks(1, StatusFilter::All, 10)
        .await
        .expect("list");
    assert_eq!(remaining.len(), 1);
}

#[tokio::test]
async fn unknown_intent_without_provider_gives_help_text() {
    let h = common::harness(None).await;
    let reply = h
        .service
        .process_message(1, "What is the weather like today?", None)
        .await
        .expect("reply");

    assert!(
        reply.message.contains("manage your tasks"),
        "got: {}",
        reply.message
    );
}

#[tokio::test]
async fn identity_query_reports_counts() {
    let h = common::harness(None).await;
    let first = h.tasks.create_task(1, "One", None).await.expect("create");
    h.tasks.create_task(1, "Two", None).await.expect("create");
    h.tasks
        .set_completed(1, first.id, true)
        .await
        .expect("complete");

    let reply = h
        .service
        .process_message(1, "What do you know about me?", None)
        .await
        .expect("reply");

    assert!(reply.message.contains('2'), "got: {}", reply.message);
    assert!(
        reply.message.contains("pending") && reply.message.contains("completed"),
        "got: {}",
        reply.message
    );
}

#[tokio::test]
async fn conversation_replay_survives_store_reopen() {
    let h = common::harness(None).await;
    let first = h
        .service
        .process_message(1, "add a task to water plants", None)
        .await
        .expect("reply");
    h.service
        .process_message(1, "show my tasks", None)
        .await
        .expect("reply");

    // A fresh store over the same file sees the identical ordered log.
    let reopened = ConversationStore::new(&h.db_path)
        .await
        .expect("reopen store");
    let replayed = reopened
        .history(first.conversation_id, 0)
        .await
        .expect("history");

    assert_eq!(replayed.len(), 4);
    for (i, message) in replayed.iter().enumerate() {
        assert_eq!(message.sequence_number, i as i64 + 1);
    }
    assert_eq!(replayed[0].role, "user");
    assert_eq!(replayed[1].role, "assistant");
    assert_eq!(replayed[0].content, "add a task to water plants");
}

#[tokio::test]
async fn cross_user_tasks_are_invisible() {
    let h = common::harness(None).await;
    h.tasks
        .create_task(2, "Other user's secret", None)
        .await
        .expect("create");

    let reply = h
        .service
        .process_message(1, "complete task 1", None)
        .await
        .expect("reply");

    assert!(
        reply.message.contains("not found") || reply.message.contains("Task not found"),
        "got: {}",
        reply.message
    );
    let other = h.tasks.get_task(2, 1).await.expect("get").expect("task");
    assert!(!other.completed);
}

#[tokio::test]
async fn conversations_are_user_scoped() {
    let h = common::harness(None).await;
    let reply = h
        .service
        .process_message(1, "show my tasks", None)
        .await
        .expect("reply");

    let err = h
        .service
        .process_message(2, "show my tasks", Some(reply.conversation_id))
        .await
        .expect_err("cross-user conversation must be rejected");
    assert!(format!("{err}").contains("not found"));
}
