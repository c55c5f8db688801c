use httpmock::prelude::*;
use serde_json::json;

use taskpilot::config::CohereConfig;
use taskpilot::interfaces::providers::LlmProvider;
use taskpilot::providers::CohereProvider;

fn provider_for(server: &MockServer) -> CohereProvider {
    CohereProvider::new(&CohereConfig {
        api_key: Some("test-key".to_string()),
        model: Some("command-r-plus".to_string()),
        base_url: Some(server.base_url()),
    })
    .expect("provider")
}

#[tokio::test]
async fn generate_text_parses_v2_response() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v2/chat")
                .header("authorization", "Bearer test-key")
                .json_body_partial(r#"{"model": "command-r-plus"}"#);
            then.status(200).json_body(json!({
                "message": {
                    "content": [{"type": "text", "text": "Hello there!"}]
                }
            }));
        })
        .await;

    let provider = provider_for(&server);
    let text = provider
        .generate_text(
            vec![json!({"role": "user", "content": "hi"})],
            "be helpful",
        )
        .await
        .expect("text");

    assert_eq!(text, "Hello there!");
    mock.assert_async().await;
}

#[tokio::test]
async fn generate_with_tools_parses_tool_calls() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v2/chat");
            then.status(200).json_body(json!({
                "message": {
                    "content": [],
                    "tool_calls": [{
                        "id": "call_0",
                        "type": "function",
                        "function": {
                            "name": "list_tasks",
                            "arguments": "{\"filter\": \"pending\"}"
                        }
                    }]
                }
            }));
        })
        .await;

    let provider = provider_for(&server);
    let response = provider
        .generate_with_tools(
            vec![json!({"role": "user", "content": "show pending"})],
            "",
            vec![json!({"type": "function", "function": {"name": "list_tasks"}})],
        )
        .await
        .expect("response");

    assert_eq!(response.tool_calls.len(), 1);
    assert_eq!(response.tool_calls[0].name, "list_tasks");
    assert_eq!(response.tool_calls[0].arguments["filter"], "pending");
}

#[tokio::test]
async fn rate_limit_is_retried_three_times() {
    let server = MockServer::start_async().await;
    let throttled = server
        .mock_async(|when, then| {
            when.method(POST).path("/v2/chat");
            then.status(429).json_body(json!({"message": "rate limited"}));
        })
        .await;

    let provider = provider_for(&server);
    let result = provider
        .generate_text(vec![json!({"role": "user", "content": "hi"})], "")
        .await;

    assert_eq!(throttled.hits_async().await, 3);
    assert!(result.is_err());
}

#[tokio::test]
async fn non_retryable_status_fails_fast() {
    let server = MockServer::start_async().await;
    let rejected = server
        .mock_async(|when, then| {
            when.method(POST).path("/v2/chat");
            then.status(401).json_body(json!({"message": "bad key"}));
        })
        .await;

    let provider = provider_for(&server);
    let result = provider
        .generate_text(vec![json!({"role": "user", "content": "hi"})], "")
        .await;

    assert_eq!(rejected.hits_async().await, 1);
    assert!(result.is_err());
}

#[tokio::test]
async fn missing_api_key_is_config_error() {
    let result = CohereProvider::new(&CohereConfig {
        api_key: None,
        model: None,
        base_url: None,
    });
    let err = match result {
        Err(e) => e,
        Ok(_) => panic!("provider built without an API key"),
    };
    assert!(format!("{err}").contains("API key"));
}
