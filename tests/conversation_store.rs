use serde_json::json;
use tempfile::tempdir;

use taskpilot::conversations::{ConversationStore, MessageRole};

async fn store_at(path: &str) -> ConversationStore {
    ConversationStore::new(path).await.expect("store")
}

#[tokio::test]
async fn sequence_numbers_start_at_one_and_have_no_gaps() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("conv.db").to_string_lossy().to_string();
    let store = store_at(&path).await;

    let conversation = store.get_or_create(1).await.expect("conversation");
    for i in 0..5 {
        store
            .append_message(
                conversation.id,
                if i % 2 == 0 {
                    MessageRole::User
                } else {
                    MessageRole::Assistant
                },
                &format!("message {i}"),
                None,
            )
            .await
            .expect("append");
    }

    let history = store.history(conversation.id, 0).await.expect("history");
    assert_eq!(history.len(), 5);
    for (i, message) in history.iter().enumerate() {
        assert_eq!(message.sequence_number, i as i64 + 1);
    }
}

#[tokio::test]
async fn replay_after_reopen_is_identical() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("conv.db").to_string_lossy().to_string();

    let conversation_id = {
        let store = store_at(&path).await;
        let conversation = store.get_or_create(7).await.expect("conversation");
        store
            .append_message(conversation.id, MessageRole::User, "add milk", None)
            .await
            .expect("append");
        store
            .append_message(
                conversation.id,
                MessageRole::Assistant,
                "Task 'Milk' has been added to your list.",
                Some(&json!({"status": "success"})),
            )
            .await
            .expect("append");
        conversation.id
    };

    let reopened = store_at(&path).await;
    let history = reopened.history(conversation_id, 0).await.expect("history");
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].content, "add milk");
    assert_eq!(history[0].role, "user");
    assert_eq!(history[1].role, "assistant");
    assert_eq!(
        history[1].metadata.as_deref(),
        Some(r#"{"status":"success"}"#)
    );
}

#[tokio::test]
async fn most_recent_conversation_is_reused() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("conv.db").to_string_lossy().to_string();
    let store = store_at(&path).await;

    let first = store.get_or_create(3).await.expect("first");
    let second = store.get_or_create(3).await.expect("second");
    assert_eq!(first.id, second.id);

    let other = store.get_or_create(4).await.expect("other user");
    assert_ne!(first.id, other.id);
}

#[tokio::test]
async fn timestamps_are_rfc3339_utc() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("conv.db").to_string_lossy().to_string();
    let store = store_at(&path).await;

    let conversation = store.get_or_create(1).await.expect("conversation");
    let message = store
        .append_message(conversation.id, MessageRole::User, "hi", None)
        .await
        .expect("append");

    assert!(message.created_at.ends_with('Z'), "got: {}", message.created_at);
    assert!(
        time::OffsetDateTime::parse(
            &message.created_at,
            &time::format_description::well_known::Rfc3339
        )
        .is_ok(),
        "got: {}",
        message.created_at
    );
}

#[tokio::test]
async fn interleaved_writers_never_collide() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("conv.db").to_string_lossy().to_string();
    let store = std::sync::Arc::new(store_at(&path).await);
    let conversation = store.get_or_create(1).await.expect("conversation");

    let mut handles = Vec::new();
    for i in 0..4 {
        let store = store.clone();
        let id = conversation.id;
        handles.push(tokio::spawn(async move {
            store
                .append_message(id, MessageRole::User, &format!("burst {i}"), None)
                .await
        }));
    }
    for handle in handles {
        handle.await.expect("join").expect("append");
    }

    let history = store.history(conversation.id, 0).await.expect("history");
    let sequences: Vec<i64> = history.iter().map(|m| m.sequence_number).collect();
    assert_eq!(sequences, vec![1, 2, 3, 4]);
}
