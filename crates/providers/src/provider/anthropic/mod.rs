mod wire;

use async_trait::async_trait;
use config::AnthropicProviderConfig;
use eventsource_stream::Eventsource;
use futures::{StreamExt, stream::BoxStream};
use reqwest::{Client, header::CONTENT_TYPE};
use secrecy::ExposeSecret;

use self::wire::{AnthropicRequest, AnthropicResponse, AnthropicStreamEvent, AnthropicStreamProcessor};
use crate::{
    ProviderError, Result,
    http_client::http_client,
    structured_output,
    types::{ModelInfo, ProviderContent, ProviderEvent, ProviderRequest, ProviderResult},
};

/// Speaks the Anthropic Messages API: `POST {base_url}/v1/messages`, streamed or not.
pub struct AnthropicAdapter {
    client: Client,
    name: String,
    config: AnthropicProviderConfig,
}

impl AnthropicAdapter {
    pub fn new(name: String, config: AnthropicProviderConfig) -> Self {
        Self {
            client: http_client(),
            name,
            config,
        }
    }

    fn request_builder(&self, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{path}", self.config.base_url.as_str().trim_end_matches('/'));

        let mut builder = self
            .client
            .post(url)
            .header("anthropic-version", &self.config.api_version)
            .header(CONTENT_TYPE, "application/json");

        if let Some(api_key) = &self.config.api_key {
            builder = builder.header("x-api-key", api_key.expose_secret());
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
impl crate::ProviderAdapter for AnthropicAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResult> {
        let wants_structured_output = structured_output::wants_structured_output(&request.text_format);

        let mut request = request;
        structured_output::inject(&mut request);
        let wire_request = AnthropicRequest::from(request);

        let body = sonic_rs::to_vec(&wire_request)
            .map_err(|e| ProviderError::InvalidRequest(format!("failed to serialize request: {e}")))?;

        let response = self
            .request_builder("/v1/messages")
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

        let wire_response: AnthropicResponse =
            sonic_rs::from_str(&text).map_err(|e| {
                log::error!("failed to parse Anthropic response: {e}");
                ProviderError::InternalError(None)
            })?;

        let content = wire_response
            .content
            .into_iter()
            .filter_map(|block| match block.kind {
                wire::AnthropicContentKind::Text => Some(ProviderContent::Text(block.text.unwrap_or_default())),
                wire::AnthropicContentKind::Thinking => Some(ProviderContent::Thinking(block.thinking.unwrap_or_default())),
                wire::AnthropicContentKind::ToolUse => Some(ProviderContent::ToolCall {
                    id: block.id.unwrap_or_default(),
                    name: block.name.unwrap_or_default(),
                    arguments: block.input.unwrap_or_default(),
                }),
                wire::AnthropicContentKind::Other => None,
            })
            .collect();

        let result = ProviderResult {
            content,
            stop_reason: wire_response.stop_reason.map(Into::into).unwrap_or_default(),
            usage: wire_response.usage.into(),
            model: wire_response.model,
        };

        Ok(if wants_structured_output { structured_output::unwrap_result(result) } else { result })
    }

    async fn stream(&self, mut request: ProviderRequest) -> Result<BoxStream<'static, Result<ProviderEvent>>> {
        request.stream = true;
        let wants_structured_output = structured_output::wants_structured_output(&request.text_format);
        structured_output::inject(&mut request);
        let wire_request = AnthropicRequest::from(request);

        let body = sonic_rs::to_vec(&wire_request)
            .map_err(|e| ProviderError::InvalidRequest(format!("failed to serialize request: {e}")))?;

        let response = self
            .request_builder("/v1/messages")
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

        let chunk_stream = futures::stream::unfold(
            (Box::pin(event_stream), AnthropicStreamProcessor::new(), Vec::<ProviderEvent>::new()),
            |(mut stream, mut processor, mut pending)| async move {
                loop {
                    if let Some(event) = pending.pop() {
                        return Some((Ok(event), (stream, processor, pending)));
                    }

                    let event = stream.next().await?;

                    let Ok(event) = event else {
                        log::warn!("SSE parsing error in Anthropic stream");
                        continue;
                    };

                    let Ok(parsed) = sonic_rs::from_str::<AnthropicStreamEvent<'_>>(&event.data) else {
                        log::warn!("failed to parse Anthropic stream event");
                        continue;
                    };

                    let mut projected = processor.process(parsed);
                    if projected.is_empty() {
                        continue;
                    }

                    projected.reverse();
                    pending = projected;
                }
            },
        );

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
        }

        let url = format!("{}/v1/models", self.config.base_url.as_str().trim_end_matches('/'));

        let response = self
            .client
            .get(url)
            .header("x-api-key", api_key.expose_secret())
            .header("anthropic-version", &self.config.api_version)
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
                owned_by: "anthropic".to_string(),
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

    async fn handle_messages(State(state): State<CaptureState>, headers: HeaderMap, Json(body): Json<Value>) -> impl IntoResponse {
        *state.captured.lock().unwrap() = Some((headers, body));

        Json(json!({
            "id": "msg_123",
            "type": "message",
            "role": "assistant",
            "content": [{"type": "text", "text": "hi there"}],
            "model": "claude-3-sonnet-20240229",
            "stop_reason": "end_turn",
            "stop_sequence": null,
            "usage": {"input_tokens": 10, "output_tokens": 5}
        }))
    }

    #[tokio::test]
    async fn complete_sends_expected_headers_and_parses_response() {
        let state = CaptureState {
            captured: Arc::new(Mutex::new(None)),
        };

        let app = Router::new()
            .route("/v1/messages", post(handle_messages))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let config = AnthropicProviderConfig {
            base_url: Url::parse(&format!("http://{address}")).unwrap(),
            api_key: Some(SecretString::from("test-key".to_string())),
            api_version: "2023-06-01".to_string(),
        };

        let adapter = AnthropicAdapter::new("anthropic".to_string(), config);

        let request = ProviderRequest {
            model: "claude-3-sonnet-20240229".to_string(),
            messages: vec![ProviderMessage {
                role: ProviderRole::User,
                content: vec![ProviderContentPart::Text("hello".to_string())],
            }],
            ..Default::default()
        };

        let result = adapter.complete(request).await.unwrap();

        assert_eq!(result.usage.input_tokens, 10);
        assert_eq!(result.usage.output_tokens, 5);
        match &result.content[0] {
            ProviderContent::Text(text) => assert_eq!(text, "hi there"),
            other => panic!("unexpected content: {other:?}"),
        }

        let captured = state.captured.lock().unwrap().clone().expect("captured request");
        let (headers, body) = captured;
        assert_eq!(headers.get("x-api-key").unwrap(), "test-key");
        assert_eq!(headers.get("anthropic-version").unwrap(), "2023-06-01");
        assert_eq!(body.get("model").and_then(Value::as_str), Some("claude-3-sonnet-20240229"));
    }
}
