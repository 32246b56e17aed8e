use integration_tests::{Script, TestServer, complete_text_response, text_stream, tool_call_stream};
use serde_json::json;

const MODEL: &str = "claude-sonnet-4-20250514-responses";

#[tokio::test]
async fn sync_text_response_round_trips() {
    let server = TestServer::builder().start().await;
    server.push_script(Script::Complete(complete_text_response("hi there", 10, 5)));

    let response = server
        .create_response(json!({
            "model": MODEL,
            "input": "hello",
        }))
        .await;

    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "completed");

    let output = body["output"].as_array().unwrap();
    assert_eq!(output.len(), 1);
    assert_eq!(output[0]["type"], "message");
    assert_eq!(output[0]["content"][0]["text"], "hi there");
    assert_eq!(body["usage"]["input_tokens"], 10);
    assert_eq!(body["usage"]["output_tokens"], 5);
}

#[tokio::test]
async fn streaming_text_only_emits_expected_event_sequence() {
    let server = TestServer::builder().start().await;
    server.push_script(Script::Stream(text_stream("Hello, ", "world!", 8, 4)));

    let response = server
        .create_response(json!({
            "model": MODEL,
            "input": "hello",
            "stream": true,
        }))
        .await;

    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/event-stream"
    );

    let frames = TestServer::parse_sse(response).await;
    let event_names: Vec<&str> = frames.iter().map(|(name, _)| name.as_str()).collect();

    assert_eq!(
        event_names,
        vec![
            "response.in_progress",
            "response.output_item.added",
            "response.content_part.added",
            "response.output_text.delta",
            "response.output_text.delta",
            "response.output_text.done",
            "response.content_part.done",
            "response.output_item.done",
            "response.completed",
        ]
    );

    let deltas: Vec<&str> = frames
        .iter()
        .filter(|(name, _)| name == "response.output_text.delta")
        .map(|(_, data)| data["delta"].as_str().unwrap())
        .collect();
    assert_eq!(deltas, vec!["Hello, ", "world!"]);

    let sequence_numbers: Vec<i64> = frames.iter().map(|(_, data)| data["sequence_number"].as_i64().unwrap()).collect();
    let mut sorted = sequence_numbers.clone();
    sorted.sort();
    assert_eq!(sequence_numbers, sorted, "sequence numbers must be strictly increasing");
    assert_eq!(sequence_numbers.first(), Some(&1));
}

#[tokio::test]
async fn streaming_pure_tool_call_opens_no_message_item() {
    let server = TestServer::builder().start().await;
    server.push_script(Script::Stream(tool_call_stream(
        "toolu_1",
        "get_weather",
        r#"{"city":"Paris"}"#,
        12,
        6,
    )));

    let response = server
        .create_response(json!({
            "model": MODEL,
            "input": "what's the weather in Paris?",
            "stream": true,
            "tools": [{"type": "function", "name": "get_weather", "parameters": {"type": "object"}}],
        }))
        .await;

    assert_eq!(response.status(), 200);

    let frames = TestServer::parse_sse(response).await;
    let event_names: Vec<&str> = frames.iter().map(|(name, _)| name.as_str()).collect();

    assert!(!event_names.contains(&"response.output_text.delta"));
    assert!(!event_names.contains(&"response.content_part.added"));
    assert!(event_names.contains(&"response.output_item.added"));
    assert!(event_names.contains(&"response.output_item.done"));
    assert_eq!(event_names.last(), Some(&"response.completed"));
}

#[tokio::test]
async fn get_and_delete_a_stored_response() {
    let server = TestServer::builder().start().await;
    server.push_script(Script::Complete(complete_text_response("stored reply", 3, 2)));

    let created: serde_json::Value = server
        .create_response(json!({"model": MODEL, "input": "hello", "store": true}))
        .await
        .json()
        .await
        .unwrap();

    let id = created["id"].as_str().unwrap();

    let fetched = server.get_response(id).await;
    assert_eq!(fetched.status(), 200);
    let fetched: serde_json::Value = fetched.json().await.unwrap();
    assert_eq!(fetched["id"], id);

    let deleted = server.delete_response(id).await;
    assert_eq!(deleted.status(), 200);

    let missing = server.get_response(id).await;
    assert_eq!(missing.status(), 404);
}

#[tokio::test]
async fn streaming_stored_response_is_gettable_after_completion() {
    let server = TestServer::builder().start().await;
    server.push_script(Script::Stream(text_stream("Hello, ", "world!", 8, 4)));

    let response = server
        .create_response(json!({
            "model": MODEL,
            "input": "hello",
            "stream": true,
            "store": true,
        }))
        .await;

    assert_eq!(response.status(), 200);

    let frames = TestServer::parse_sse(response).await;
    let id = frames
        .iter()
        .find_map(|(name, data)| (name == "response.completed").then(|| data["response"]["id"].as_str().unwrap().to_string()))
        .expect("a response.completed frame carries the final response object");

    let fetched = server.get_response(&id).await;
    assert_eq!(fetched.status(), 200);
    let fetched: serde_json::Value = fetched.json().await.unwrap();

    assert_eq!(fetched["status"], "completed");
    let output = fetched["output"].as_array().unwrap();
    assert_eq!(output.len(), 1);
    assert_eq!(output[0]["content"][0]["text"], "Hello, world!");
    assert_eq!(fetched["usage"]["input_tokens"], 8);
    assert_eq!(fetched["usage"]["output_tokens"], 4);
}

#[tokio::test]
async fn compact_endpoint_requires_previous_response_id() {
    let server = TestServer::builder().start().await;

    let response = server
        .compact_response(json!({
            "model": MODEL,
            "input": "continue",
        }))
        .await;

    assert_eq!(response.status(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"]["param"], "previous_response_id");
}

#[tokio::test]
async fn list_models_exposes_the_registered_model() {
    let server = TestServer::builder().start().await;

    let response = server.list_models().await;
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    let ids: Vec<&str> = body["data"].as_array().unwrap().iter().map(|m| m["id"].as_str().unwrap()).collect();
    assert!(ids.contains(&MODEL));
}

#[tokio::test]
async fn missing_bearer_token_is_rejected_when_api_keys_are_configured() {
    let server = TestServer::builder().with_api_key("s3cr3t").start().await;
    server.push_script(Script::Complete(complete_text_response("hi there", 1, 1)));

    let response = server
        .create_response(json!({"model": MODEL, "input": "hello"}))
        .await;

    assert_eq!(response.status(), 200, "the helper always attaches the configured key");

    let unauthenticated = reqwest::Client::new()
        .post(format!("http://{}/v1/responses", server.address()))
        .json(&json!({"model": MODEL, "input": "hello"}))
        .send()
        .await
        .unwrap();
    assert_eq!(unauthenticated.status(), 401);
}
