//! Anthropic Messages API wire types, both for requests and for the streaming response.
//!
//! See <https://docs.anthropic.com/en/api/messages> and
//! <https://docs.anthropic.com/en/api/messages-streaming>.

use std::{borrow::Cow, collections::HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{
    ContentKind, ProviderContentPart, ProviderEvent, ProviderRequest, ProviderRole, StopReason, ToolChoice, Usage,
};

#[derive(Debug, Serialize)]
pub struct AnthropicRequest {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub messages: Vec<AnthropicMessage>,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<AnthropicTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<AnthropicToolChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking: Option<AnthropicThinking>,
    pub stream: bool,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicThinking {
    Enabled { budget_tokens: u32 },
}

#[derive(Debug, Serialize)]
pub struct AnthropicMessage {
    pub role: &'static str,
    pub content: Vec<AnthropicRequestContent>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicRequestContent {
    Text { text: String },
    Image { source: AnthropicImageSource },
    ToolUse { id: String, name: String, input: Value },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicImageSource {
    Base64 { media_type: String, data: String },
    Url { url: String },
}

#[derive(Debug, Serialize)]
pub struct AnthropicTool {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub input_schema: Value,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicToolChoice {
    Auto,
    Any,
    Tool { name: String },
}

const DEFAULT_MAX_TOKENS: u32 = 4096;

impl From<ProviderRequest> for AnthropicRequest {
    fn from(request: ProviderRequest) -> Self {
        let messages = request
            .messages
            .into_iter()
            .map(|message| AnthropicMessage {
                role: match message.role {
                    ProviderRole::User | ProviderRole::Tool => "user",
                    ProviderRole::Assistant => "assistant",
                },
                content: message.content.into_iter().map(Into::into).collect(),
            })
            .collect();

        let tools = request
            .tools
            .into_iter()
            .map(|tool| AnthropicTool {
                name: tool.name,
                description: tool.description,
                input_schema: tool.parameters,
            })
            .collect();

        let tool_choice = request.tool_choice.map(|choice| match choice {
            ToolChoice::Auto => AnthropicToolChoice::Auto,
            ToolChoice::Required => AnthropicToolChoice::Any,
            ToolChoice::Named(name) => AnthropicToolChoice::Tool { name },
            ToolChoice::None => AnthropicToolChoice::Auto,
        });

        let thinking = request.reasoning_budget.map(|budget_tokens| AnthropicThinking::Enabled { budget_tokens });

        // Anthropic requires max_tokens to exceed the thinking budget, and rejects temperature/
        // top_p entirely while extended thinking is enabled.
        let max_tokens = request.max_output_tokens.unwrap_or(DEFAULT_MAX_TOKENS);
        let (max_tokens, temperature, top_p) = match request.reasoning_budget {
            Some(budget_tokens) => (max_tokens.max(budget_tokens + DEFAULT_MAX_TOKENS), None, None),
            None => (max_tokens, request.temperature, request.top_p),
        };

        Self {
            model: request.model,
            system: request.system,
            messages,
            max_tokens,
            temperature,
            top_p,
            tools,
            tool_choice,
            thinking,
            stream: request.stream,
        }
    }
}

impl From<ProviderContentPart> for AnthropicRequestContent {
    fn from(part: ProviderContentPart) -> Self {
        match part {
            ProviderContentPart::Text(text) => AnthropicRequestContent::Text { text },
            ProviderContentPart::Image {
                base64: Some(data),
                media_type: Some(media_type),
                ..
            } => AnthropicRequestContent::Image {
                source: AnthropicImageSource::Base64 { media_type, data },
            },
            ProviderContentPart::Image { url: Some(url), .. } => AnthropicRequestContent::Image {
                source: AnthropicImageSource::Url { url },
            },
            ProviderContentPart::Image { .. } => AnthropicRequestContent::Text { text: String::new() },
            ProviderContentPart::ToolUse { id, name, input } => AnthropicRequestContent::ToolUse { id, name, input },
            ProviderContentPart::ToolResult {
                tool_call_id,
                content,
                is_error,
            } => AnthropicRequestContent::ToolResult {
                tool_use_id: tool_call_id,
                content,
                is_error,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AnthropicResponse {
    pub id: String,
    pub content: Vec<AnthropicContentBlock>,
    pub model: String,
    pub stop_reason: Option<AnthropicStopReason>,
    pub usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
pub struct AnthropicContentBlock {
    #[serde(rename = "type")]
    pub kind: AnthropicContentKind,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub thinking: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub input: Option<Value>,
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnthropicContentKind {
    Text,
    ToolUse,
    Thinking,
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnthropicStopReason {
    EndTurn,
    MaxTokens,
    StopSequence,
    ToolUse,
    #[serde(other)]
    Other,
}

impl From<AnthropicStopReason> for StopReason {
    fn from(reason: AnthropicStopReason) -> Self {
        match reason {
            AnthropicStopReason::EndTurn | AnthropicStopReason::Other => StopReason::EndTurn,
            AnthropicStopReason::StopSequence => StopReason::Stop,
            AnthropicStopReason::MaxTokens => StopReason::MaxTokens,
            AnthropicStopReason::ToolUse => StopReason::ToolUse,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct AnthropicUsage {
    #[serde(default)]
    pub input_tokens: u32,
    #[serde(default)]
    pub output_tokens: u32,
}

impl From<AnthropicUsage> for Usage {
    fn from(usage: AnthropicUsage) -> Self {
        Self {
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
        }
    }
}

/// Streaming event types, tagged by Anthropic's `type` field.
///
/// See the event flow documented on [`AnthropicStreamProcessor`]: `message_start` ->
/// `content_block_start` -> `content_block_delta`* -> `content_block_stop` -> `message_delta` ->
/// `message_stop`.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", bound = "'de: 'a")]
pub enum AnthropicStreamEvent<'a> {
    #[serde(rename = "message_start")]
    MessageStart { message: AnthropicMessageStart<'a> },
    #[serde(rename = "content_block_start")]
    ContentBlockStart {
        index: u32,
        content_block: AnthropicContentBlockStart,
    },
    #[serde(rename = "content_block_delta")]
    ContentBlockDelta { index: u32, delta: AnthropicBlockDelta<'a> },
    #[serde(rename = "content_block_stop")]
    ContentBlockStop { index: u32 },
    #[serde(rename = "message_delta")]
    MessageDelta {
        delta: AnthropicMessageDeltaData,
        usage: AnthropicUsage,
    },
    #[serde(rename = "message_stop")]
    MessageStop,
    #[serde(rename = "ping")]
    Ping,
    #[serde(rename = "error")]
    Error { error: AnthropicStreamError<'a> },
}

#[derive(Debug, Deserialize)]
pub struct AnthropicMessageStart<'a> {
    pub id: &'a str,
    pub model: &'a str,
    pub usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicContentBlockStart {
    Text { text: String },
    ToolUse { id: String, name: String },
    Thinking { thinking: String },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicBlockDelta<'a> {
    TextDelta { text: Cow<'a, str> },
    InputJsonDelta { partial_json: Cow<'a, str> },
    ThinkingDelta { thinking: Cow<'a, str> },
    /// The signature accompanying a thinking block; opaque to us, never surfaced upstream.
    SignatureDelta { signature: Cow<'a, str> },
}

#[derive(Debug, Deserialize)]
pub struct AnthropicMessageDeltaData {
    #[serde(default)]
    pub stop_reason: Option<AnthropicStopReason>,
}

#[derive(Debug, Deserialize)]
pub struct AnthropicStreamError<'a> {
    #[serde(rename = "type")]
    pub error_type: &'a str,
    pub message: &'a str,
}

/// Tracks per-block identity across an Anthropic stream so that `ProviderEvent` content IDs
/// stay stable between `content_block_start` and the deltas/stop that follow.
pub struct AnthropicStreamProcessor {
    block_ids: HashMap<u32, String>,
    usage: Usage,
}

impl AnthropicStreamProcessor {
    pub fn new() -> Self {
        Self {
            block_ids: HashMap::new(),
            usage: Usage::default(),
        }
    }

    /// Projects one Anthropic event onto zero or more normalized [`ProviderEvent`]s.
    pub fn process(&mut self, event: AnthropicStreamEvent<'_>) -> Vec<ProviderEvent> {
        match event {
            AnthropicStreamEvent::MessageStart { message, .. } => {
                self.usage = message.usage.into();
                Vec::new()
            }
            AnthropicStreamEvent::ContentBlockStart { index, content_block } => {
                let content_id = index.to_string();
                self.block_ids.insert(index, content_id.clone());

                match content_block {
                    AnthropicContentBlockStart::Text { .. } => vec![ProviderEvent::ContentStart {
                        content_id,
                        kind: ContentKind::Text,
                        name: None,
                    }],
                    AnthropicContentBlockStart::ToolUse { name, .. } => vec![ProviderEvent::ContentStart {
                        content_id,
                        kind: ContentKind::ToolCall,
                        name: Some(name),
                    }],
                    AnthropicContentBlockStart::Thinking { .. } => vec![ProviderEvent::ContentStart {
                        content_id,
                        kind: ContentKind::Thinking,
                        name: None,
                    }],
                }
            }
            AnthropicStreamEvent::ContentBlockDelta { index, delta } => {
                let Some(content_id) = self.block_ids.get(&index).cloned() else {
                    return Vec::new();
                };

                match delta {
                    AnthropicBlockDelta::TextDelta { text } => vec![ProviderEvent::TextDelta {
                        content_id,
                        delta: text.into_owned(),
                    }],
                    AnthropicBlockDelta::InputJsonDelta { partial_json } => vec![ProviderEvent::ToolArgumentsDelta {
                        content_id,
                        delta: partial_json.into_owned(),
                    }],
                    AnthropicBlockDelta::ThinkingDelta { thinking } => vec![ProviderEvent::TextDelta {
                        content_id,
                        delta: thinking.into_owned(),
                    }],
                    AnthropicBlockDelta::SignatureDelta { .. } => Vec::new(),
                }
            }
            AnthropicStreamEvent::ContentBlockStop { index } => {
                let Some(content_id) = self.block_ids.remove(&index) else {
                    return Vec::new();
                };
                vec![ProviderEvent::ContentDone {
                    content_id,
                    final_content: None,
                }]
            }
            AnthropicStreamEvent::MessageDelta { delta, usage } => {
                self.usage = usage.into();
                vec![ProviderEvent::MessageDone {
                    stop_reason: delta.stop_reason.map(Into::into).unwrap_or(StopReason::EndTurn),
                    usage: self.usage,
                }]
            }
            AnthropicStreamEvent::Error { error } => vec![ProviderEvent::Error(error.message.to_string())],
            AnthropicStreamEvent::MessageStop | AnthropicStreamEvent::Ping => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProviderRequest;

    #[test]
    fn reasoning_budget_enables_thinking_and_drops_sampling_params() {
        let request = ProviderRequest {
            model: "claude-sonnet-4".to_string(),
            max_output_tokens: Some(2048),
            temperature: Some(0.7),
            top_p: Some(0.9),
            reasoning_budget: Some(8192),
            ..Default::default()
        };

        let wire = AnthropicRequest::from(request);

        assert!(matches!(wire.thinking, Some(AnthropicThinking::Enabled { budget_tokens: 8192 })));
        assert!(wire.temperature.is_none());
        assert!(wire.top_p.is_none());
        assert!(wire.max_tokens > 8192);
    }

    #[test]
    fn no_reasoning_budget_leaves_sampling_params_untouched() {
        let request = ProviderRequest {
            model: "claude-sonnet-4".to_string(),
            temperature: Some(0.5),
            ..Default::default()
        };

        let wire = AnthropicRequest::from(request);

        assert!(wire.thinking.is_none());
        assert_eq!(wire.temperature, Some(0.5));
    }

    #[test]
    fn thinking_block_start_and_delta_route_as_thinking_content() {
        let mut processor = AnthropicStreamProcessor::new();

        let start = processor.process(AnthropicStreamEvent::ContentBlockStart {
            index: 0,
            content_block: AnthropicContentBlockStart::Thinking {
                thinking: String::new(),
            },
        });
        assert!(matches!(start[0], ProviderEvent::ContentStart { kind: ContentKind::Thinking, .. }));

        let delta = processor.process(AnthropicStreamEvent::ContentBlockDelta {
            index: 0,
            delta: AnthropicBlockDelta::ThinkingDelta {
                thinking: Cow::Borrowed("because..."),
            },
        });
        match &delta[0] {
            ProviderEvent::TextDelta { delta, .. } => assert_eq!(delta, "because..."),
            other => panic!("unexpected event: {other:?}"),
        }

        let signature = processor.process(AnthropicStreamEvent::ContentBlockDelta {
            index: 0,
            delta: AnthropicBlockDelta::SignatureDelta {
                signature: Cow::Borrowed("sig"),
            },
        });
        assert!(signature.is_empty());
    }
}
