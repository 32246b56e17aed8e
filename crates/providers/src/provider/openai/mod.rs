mod wire;

use std::collections::HashSet;

use async_trait::async_trait;
use config::OpenAiCompatibleProviderConfig;
use eventsource_stream::Eventsource;
use futures::{StreamExt, stream::BoxStream};
use reqwest::{Client, header::AUTHORIZATION};
use secrecy::ExposeSecret;

use self::wire::{ChatCompletionsChunk, ChatCompletionsRequest, ChatCompletionsResponse, finish_reason_to_stop_reason};
use crate::{
    ProviderError, Result,
    http_client::http_client,
    structured_output,
    types::{ContentKind, ModelInfo, ProviderContent, ProviderEvent, ProviderRequest, ProviderResult, StopReason, Usage},
};

/// Speaks any OpenAI-compatible `POST {base_url}/chat/completions` backend.
pub struct OpenAiAdapter {
    client: Client,
    name: String,
    config: OpenAiCompatibleProviderConfig,
}

impl OpenAiAdapter {
    pub fn new(name: String, config: OpenAiCompatibleProviderConfig) -> Self {
        Self {
            client: http_client(),
            name,
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.as_str().trim_end_matches('/'))
    }

    fn request_builder(&self, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self.client.post(self.url(path)).header("Content-Type", "application/json");

        if let Some(api_key) = &self.config.api_key {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", api_key.expose_secret()));
        }

        builder
    }

    fn map_error_status(status: reqwest::StatusCode, body: String) -> ProviderError {
        match status.as_u16() {
            401 => ProviderError::AuthenticationFailed(body),
            404 => ProviderError::ModelNotFound(body),
            429 => ProviderError::RateLimitExceeded { message: body },
            400 => ProviderError::InvalidRequest(body),
            500 => ProviderError::InternalError(Some(body)),
            status => ProviderError::ProviderApiError { status, message: body },
        }
    }
}

#[async_trait]
impl crate::ProviderAdapter for OpenAiAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResult> {
        let wants_structured_output = structured_output::wants_structured_output(&request.text_format);

        let mut request = request;
        structured_output::inject(&mut request);

        let mut wire_request = ChatCompletionsRequest::from(request);
        wire_request.stream = false;

        let body = sonic_rs::to_vec(&wire_request)
            .map_err(|e| ProviderError::InvalidRequest(format!("failed to serialize request: {e}")))?;

        let response = self
            .request_builder("/chat/completions")
            .body(body)
            .send()
            .await
            .map_err(|e| ProviderError::ConnectionError(e.to_string()))?;

        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_else(|_| "unknown error".to_string());
            return Err(Self::map_error_status(status, text));
        }

        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::ConnectionError(e.to_string()))?;

        let wire_response: ChatCompletionsResponse = sonic_rs::from_str(&text).map_err(|e| {
            log::error!("failed to parse chat-completions response: {e}");
            ProviderError::InternalError(None)
        })?;

        let Some(choice) = wire_response.choices.into_iter().next() else {
            return Err(ProviderError::InternalError(Some("empty choices array".to_string())));
        };

        let mut content = Vec::new();

        if let Some(text) = choice.message.content {
            content.push(ProviderContent::Text(text));
        }

        for tool_call in choice.message.tool_calls {
            let arguments = sonic_rs::from_str(&tool_call.function.arguments).unwrap_or(serde_json::Value::Null);
            content.push(ProviderContent::ToolCall {
                id: tool_call.id,
                name: tool_call.function.name,
                arguments,
            });
        }

        let result = ProviderResult {
            content,
            stop_reason: finish_reason_to_stop_reason(choice.finish_reason.as_deref()),
            usage: wire_response.usage.into(),
            model: wire_response.model,
        };

        Ok(if wants_structured_output { structured_output::unwrap_result(result) } else { result })
    }

    async fn stream(&self, mut request: ProviderRequest) -> Result<BoxStream<'static, Result<ProviderEvent>>> {
        request.stream = true;
        let wants_structured_output = structured_output::wants_structured_output(&request.text_format);
        structured_output::inject(&mut request);
        let mut wire_request = ChatCompletionsRequest::from(request);
        wire_request.stream = true;

        let body = sonic_rs::to_vec(&wire_request)
            .map_err(|e| ProviderError::InvalidRequest(format!("failed to serialize request: {e}")))?;

        let response = self
            .request_builder("/chat/completions")
            .body(body)
            .send()
            .await
            .map_err(|e| ProviderError::ConnectionError(e.to_string()))?;

        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_else(|_| "unknown error".to_string());
            return Err(Self::map_error_status(status, text));
        }

        let event_stream = response.bytes_stream().eventsource();
        let mut text_opened = false;
        let mut tool_call_ids: std::collections::HashMap<u32, String> = std::collections::HashMap::new();
        let mut usage = Usage::default();
        let mut opened: HashSet<String> = HashSet::new();

        let chunk_stream = event_stream.flat_map(move |event| {
            let Ok(event) = event else {
                log::warn!("SSE parsing error in chat-completions stream");
                return futures::stream::iter(Vec::new());
            };

            if event.data == "[DONE]" {
                return futures::stream::iter(Vec::new());
            }

            let Ok(chunk) = sonic_rs::from_str::<ChatCompletionsChunk>(&event.data) else {
                log::warn!("failed to parse chat-completions stream chunk");
                return futures::stream::iter(Vec::new());
            };

            let mut events = Vec::new();

            if let Some(chunk_usage) = chunk.usage {
                usage = chunk_usage.into();
            }

            for choice in chunk.choices {
                if let Some(text) = choice.delta.content {
                    if !text_opened {
                        text_opened = true;
                        opened.insert("text".to_string());
                        events.push(Ok(ProviderEvent::ContentStart {
                            content_id: "text".to_string(),
                            kind: ContentKind::Text,
                            name: None,
                        }));
                    }
                    events.push(Ok(ProviderEvent::TextDelta {
                        content_id: "text".to_string(),
                        delta: text,
                    }));
                }

                for tool_call in choice.delta.tool_calls {
                    let content_id = tool_call_ids
                        .entry(tool_call.index)
                        .or_insert_with(|| tool_call.id.clone().unwrap_or_else(|| tool_call.index.to_string()))
                        .clone();

                    let name = tool_call.function.as_ref().and_then(|f| f.name.clone());

                    if opened.insert(content_id.clone()) {
                        events.push(Ok(ProviderEvent::ContentStart {
                            content_id: content_id.clone(),
                            kind: ContentKind::ToolCall,
                            name,
                        }));
                    }

                    if let Some(function) = tool_call.function
                        && let Some(arguments) = function.arguments
                    {
                        events.push(Ok(ProviderEvent::ToolArgumentsDelta {
                            content_id: content_id.clone(),
                            delta: arguments,
                        }));
                    }
                }

                if let Some(reason) = choice.finish_reason {
                    for content_id in opened.drain() {
                        events.push(Ok(ProviderEvent::ContentDone {
                            content_id,
                            final_content: None,
                        }));
                    }
                    events.push(Ok(ProviderEvent::MessageDone {
                        stop_reason: finish_reason_to_stop_reason(Some(&reason)),
                        usage,
                    }));
                }
            }

            futures::stream::iter(events)
        });

        let chunk_stream: BoxStream<'static, Result<ProviderEvent>> = Box::pin(chunk_stream);

        Ok(if wants_structured_output {
            structured_output::rewrite_stream(chunk_stream)
        } else {
            chunk_stream
        })
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let Some(api_key) = self.config.api_key.as_ref() else {
            return Ok(Vec::new());
        };

        #[derive(serde::Deserialize)]
        struct ModelsResponse {
            data: Vec<ApiModel>,
        }

        #[derive(serde::Deserialize)]
        struct ApiModel {
            id: String,
            #[serde(default)]
            owned_by: Option<String>,
        }

        let response = self
            .client
            .get(self.url("/models"))
            .bearer_auth(api_key.expose_secret())
            .send()
            .await
            .map_err(|e| ProviderError::ConnectionError(e.to_string()))?;

        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_else(|_| "unknown error".to_string());
            return Err(Self::map_error_status(status, text));
        }

        let parsed: ModelsResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InternalError(Some(e.to_string())))?;

        Ok(parsed
            .data
            .into_iter()
            .map(|model| ModelInfo {
                id: model.id,
                owned_by: model.owned_by.unwrap_or_else(|| "openai".to_string()),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{Json, Router, extract::State, http::HeaderMap, response::IntoResponse, routing::post};
    use secrecy::SecretString;
    use serde_json::{Value, json};
    use tokio::net::TcpListener;
    use url::Url;

    use super::*;
    use crate::{ProviderAdapter, types::{ProviderContentPart, ProviderMessage, ProviderRole}};

    #[derive(Clone)]
    struct CaptureState {
        captured: Arc<Mutex<Option<(HeaderMap, Value)>>>,
    }

    async fn handle_completions(State(state): State<CaptureState>, headers: HeaderMap, Json(body): Json<Value>) -> impl IntoResponse {
        *state.captured.lock().unwrap() = Some((headers, body));

        Json(json!({
            "id": "chatcmpl-123",
            "model": "gpt-4o-mini",
            "choices": [{
                "message": {"content": "hello there", "tool_calls": []},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 7, "completion_tokens": 3}
        }))
    }

    #[tokio::test]
    async fn complete_sends_bearer_token_and_parses_response() {
        let state = CaptureState {
            captured: Arc::new(Mutex::new(None)),
        };

        let app = Router::new()
            .route("/chat/completions", post(handle_completions))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let config = OpenAiCompatibleProviderConfig {
            base_url: Url::parse(&format!("http://{address}")).unwrap(),
            api_key: Some(SecretString::from("sk-test".to_string())),
        };

        let adapter = OpenAiAdapter::new("openai".to_string(), config);

        let request = ProviderRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![ProviderMessage {
                role: ProviderRole::User,
                content: vec![ProviderContentPart::Text("hello".to_string())],
            }],
            ..Default::default()
        };

        let result = adapter.complete(request).await.unwrap();

        assert_eq!(result.usage.input_tokens, 7);
        assert_eq!(result.stop_reason, StopReason::EndTurn);
        match &result.content[0] {
            ProviderContent::Text(text) => assert_eq!(text, "hello there"),
            other => panic!("unexpected content: {other:?}"),
        }

        let captured = state.captured.lock().unwrap().clone().expect("captured request");
        let (headers, body) = captured;
        assert_eq!(headers.get("authorization").unwrap(), "Bearer sk-test");
        assert_eq!(body.get("stream").and_then(Value::as_bool), Some(false));
    }
}
