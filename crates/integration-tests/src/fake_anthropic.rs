//! A scriptable stand-in for the Anthropic Messages API, in the same spirit as the small axum
//! servers the `providers` crate spins up in its own adapter tests — just long-lived enough to
//! back a full [`crate::TestServer`] instead of a single request.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use axum::{
    Json, Router,
    extract::State,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// One scripted reply to the next `POST /v1/messages` call.
pub enum Script {
    /// A complete, non-streaming `AnthropicResponse` body.
    Complete(Value),
    /// A sequence of SSE event frames, each `(event type, data payload)`, sent in order on a
    /// streaming call.
    Stream(Vec<(&'static str, Value)>),
}

#[derive(Clone)]
struct SharedState {
    queue: Arc<Mutex<VecDeque<Script>>>,
}

/// A fake Anthropic backend: bind it, push [`Script`] entries, and point an `AnthropicAdapter`
/// at its `base_url`.
pub struct FakeAnthropicServer {
    pub base_url: url::Url,
    queue: Arc<Mutex<VecDeque<Script>>>,
    shutdown: CancellationToken,
}

impl FakeAnthropicServer {
    pub async fn start() -> Self {
        let queue = Arc::new(Mutex::new(VecDeque::new()));
        let state = SharedState { queue: queue.clone() };

        let app = Router::new()
            .route("/v1/messages", post(handle_messages))
            .route("/v1/models", get(handle_models))
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("fake anthropic server should bind");
        let address = listener.local_addr().expect("bound listener has a local address");

        let shutdown = CancellationToken::new();
        let shutdown_for_task = shutdown.clone();

        tokio::spawn(async move {
            let server = axum::serve(listener, app);
            tokio::select! {
                result = server => { let _ = result; }
                _ = shutdown_for_task.cancelled() => {}
            }
        });

        let base_url = url::Url::parse(&format!("http://{address}")).expect("socket address is a valid URL");

        Self { base_url, queue, shutdown }
    }

    /// Queues the reply the next `POST /v1/messages` call will receive. Scripts are consumed
    /// FIFO, one per call.
    pub fn push(&self, script: Script) {
        self.queue.lock().unwrap().push_back(script);
    }
}

impl Drop for FakeAnthropicServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn handle_messages(State(state): State<SharedState>, Json(body): Json<Value>) -> Response {
    let script = state.queue.lock().unwrap().pop_front();

    let is_streaming = body.get("stream").and_then(Value::as_bool).unwrap_or(false);

    match script {
        Some(Script::Complete(value)) => Json(value).into_response(),
        Some(Script::Stream(events)) => {
            if !is_streaming {
                return Json(json!({"type": "error", "error": {"type": "invalid_request_error", "message": "server was scripted with a Stream reply but request did not set stream=true"}})).into_response();
            }

            let mut body = String::new();
            for (event_type, data) in events {
                body.push_str(&format!("event: {event_type}\ndata: {data}\n\n", data = data));
            }

            Response::builder()
                .header("content-type", "text/event-stream")
                .body(axum::body::Body::from(body))
                .unwrap()
        }
        None => Json(json!({"type": "error", "error": {"type": "server_error", "message": "no script queued for this call"}})).into_response(),
    }
}

async fn handle_models() -> Response {
    Json(json!({
        "data": [
            {"id": "claude-sonnet-4-20250514"},
        ]
    }))
    .into_response()
}

/// Convenience builders for the canned Anthropic `AnthropicResponse` JSON body, covering the
/// content-block shapes the adapter understands.
pub fn complete_text_response(text: &str, input_tokens: u32, output_tokens: u32) -> Value {
    json!({
        "id": "msg_fake",
        "type": "message",
        "role": "assistant",
        "content": [{"type": "text", "text": text}],
        "model": "claude-sonnet-4-20250514",
        "stop_reason": "end_turn",
        "stop_sequence": null,
        "usage": {"input_tokens": input_tokens, "output_tokens": output_tokens}
    })
}

/// A scripted text-only stream: `message_start` -> one text block with two deltas -> stop.
pub fn text_stream(first_delta: &str, second_delta: &str, input_tokens: u32, output_tokens: u32) -> Vec<(&'static str, Value)> {
    vec![
        (
            "message_start",
            json!({"type": "message_start", "message": {"id": "msg_fake", "model": "claude-sonnet-4-20250514", "usage": {"input_tokens": input_tokens, "output_tokens": 0}}}),
        ),
        (
            "content_block_start",
            json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}}),
        ),
        (
            "content_block_delta",
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": first_delta}}),
        ),
        (
            "content_block_delta",
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": second_delta}}),
        ),
        ("content_block_stop", json!({"type": "content_block_stop", "index": 0})),
        (
            "message_delta",
            json!({"type": "message_delta", "delta": {"stop_reason": "end_turn"}, "usage": {"input_tokens": input_tokens, "output_tokens": output_tokens}}),
        ),
        ("message_stop", json!({"type": "message_stop"})),
    ]
}

/// A scripted pure-tool-call stream: one `tool_use` block, no text.
pub fn tool_call_stream(call_id: &str, name: &str, arguments_json: &str, input_tokens: u32, output_tokens: u32) -> Vec<(&'static str, Value)> {
    vec![
        (
            "message_start",
            json!({"type": "message_start", "message": {"id": "msg_fake", "model": "claude-sonnet-4-20250514", "usage": {"input_tokens": input_tokens, "output_tokens": 0}}}),
        ),
        (
            "content_block_start",
            json!({"type": "content_block_start", "index": 0, "content_block": {"type": "tool_use", "id": call_id, "name": name}}),
        ),
        (
            "content_block_delta",
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "input_json_delta", "partial_json": arguments_json}}),
        ),
        ("content_block_stop", json!({"type": "content_block_stop", "index": 0})),
        (
            "message_delta",
            json!({"type": "message_delta", "delta": {"stop_reason": "tool_use"}, "usage": {"input_tokens": input_tokens, "output_tokens": output_tokens}}),
        ),
        ("message_stop", json!({"type": "message_stop"})),
    ]
}
