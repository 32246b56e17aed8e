//! OpenAI-compatible chat-completions wire types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{ProviderContentPart, ProviderMessage, ProviderRequest, ProviderRole, StopReason, ToolChoice, Usage};

#[derive(Debug, Serialize)]
pub struct ChatCompletionsRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ChatTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<Value>,
    pub stream: bool,
}

#[derive(Debug, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<ChatContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ChatToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// Chat-completions `content` accepts either a bare string or an array of typed parts; we only
/// need the array form once an image is present in the turn.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ChatContent {
    Text(String),
    Parts(Vec<ChatContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatContentPart {
    Text { text: String },
    ImageUrl { image_url: ChatImageUrl },
}

#[derive(Debug, Serialize)]
pub struct ChatImageUrl {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct ChatToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub function: ChatFunctionCall,
}

#[derive(Debug, Serialize)]
pub struct ChatFunctionCall {
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Serialize)]
pub struct ChatTool {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub function: ChatFunctionDef,
}

#[derive(Debug, Serialize)]
pub struct ChatFunctionDef {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parameters: Value,
}

impl From<ProviderRequest> for ChatCompletionsRequest {
    fn from(request: ProviderRequest) -> Self {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);

        if let Some(system) = request.system {
            messages.push(ChatMessage {
                role: "system",
                content: Some(ChatContent::Text(system)),
                tool_calls: Vec::new(),
                tool_call_id: None,
            });
        }

        messages.extend(request.messages.into_iter().map(ChatMessage::from));

        let tools = request
            .tools
            .into_iter()
            .map(|tool| ChatTool {
                kind: "function",
                function: ChatFunctionDef {
                    name: tool.name,
                    description: tool.description,
                    parameters: tool.parameters,
                },
            })
            .collect();

        let tool_choice = request.tool_choice.map(|choice| match choice {
            ToolChoice::Auto => Value::String("auto".to_string()),
            ToolChoice::None => Value::String("none".to_string()),
            ToolChoice::Required => Value::String("required".to_string()),
            ToolChoice::Named(name) => serde_json::json!({"type": "function", "function": {"name": name}}),
        });

        Self {
            model: request.model,
            messages,
            temperature: request.temperature,
            top_p: request.top_p,
            max_tokens: request.max_output_tokens,
            tools,
            tool_choice,
            stream: request.stream,
        }
    }
}

impl From<ProviderMessage> for ChatMessage {
    fn from(message: ProviderMessage) -> Self {
        let role = match message.role {
            ProviderRole::User => "user",
            ProviderRole::Assistant => "assistant",
            ProviderRole::Tool => "tool",
        };

        let mut text_parts = Vec::new();
        let mut image_parts = Vec::new();
        let mut tool_calls = Vec::new();
        let mut tool_call_id = None;

        for part in message.content {
            match part {
                ProviderContentPart::Text(text) => text_parts.push(text),
                ProviderContentPart::Image { url, base64, media_type } => {
                    let url = url.unwrap_or_else(|| {
                        format!(
                            "data:{};base64,{}",
                            media_type.unwrap_or_else(|| "application/octet-stream".to_string()),
                            base64.unwrap_or_default()
                        )
                    });
                    image_parts.push(url);
                }
                ProviderContentPart::ToolUse { id, name, input } => tool_calls.push(ChatToolCall {
                    id,
                    kind: "function",
                    function: ChatFunctionCall {
                        name,
                        arguments: serde_json::to_string(&input).unwrap_or_default(),
                    },
                }),
                ProviderContentPart::ToolResult {
                    tool_call_id: id,
                    content,
                    ..
                } => {
                    tool_call_id = Some(id);
                    text_parts.push(content);
                }
            }
        }

        let content = if image_parts.is_empty() {
            if text_parts.is_empty() {
                None
            } else {
                Some(ChatContent::Text(text_parts.join("")))
            }
        } else {
            let mut parts: Vec<ChatContentPart> = text_parts
                .into_iter()
                .map(|text| ChatContentPart::Text { text })
                .collect();

            parts.extend(
                image_parts
                    .into_iter()
                    .map(|url| ChatContentPart::ImageUrl { image_url: ChatImageUrl { url } }),
            );

            Some(ChatContent::Parts(parts))
        };

        Self {
            role,
            content,
            tool_calls,
            tool_call_id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionsResponse {
    pub id: String,
    pub model: String,
    pub choices: Vec<ChatChoice>,
    #[serde(default)]
    pub usage: ChatUsage,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ChatResponseMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ChatResponseToolCall>,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponseToolCall {
    pub id: String,
    pub function: ChatResponseFunctionCall,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponseFunctionCall {
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChatUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
}

impl From<ChatUsage> for Usage {
    fn from(usage: ChatUsage) -> Self {
        Self {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        }
    }
}

pub fn finish_reason_to_stop_reason(reason: Option<&str>) -> StopReason {
    match reason {
        Some("length") => StopReason::MaxTokens,
        Some("tool_calls") => StopReason::ToolUse,
        Some("stop") => StopReason::Stop,
        _ => StopReason::EndTurn,
    }
}

/// One chunk of a streamed chat-completions response.
#[derive(Debug, Deserialize)]
pub struct ChatCompletionsChunk {
    pub id: String,
    #[serde(default)]
    pub model: String,
    pub choices: Vec<ChatChunkChoice>,
    #[serde(default)]
    pub usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChunkChoice {
    pub delta: ChatChunkDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChatChunkDelta {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ChatChunkToolCall>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChunkToolCall {
    pub index: u32,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub function: Option<ChatChunkFunctionCall>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChatChunkFunctionCall {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
}
