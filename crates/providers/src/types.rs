//! Provider-agnostic request/response/event shapes.
//!
//! These types sit between the orchestrator's Responses-API data model and a concrete
//! upstream's wire format. Adapters translate in both directions; nothing outside this crate
//! needs to know whether the upstream spoke Anthropic's Messages API or an OpenAI-compatible
//! chat-completions API.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A single normalized request sent to an upstream provider.
#[derive(Debug, Clone, Default)]
pub struct ProviderRequest {
    pub model: String,
    pub system: Option<String>,
    pub messages: Vec<ProviderMessage>,
    pub tools: Vec<ToolDefinition>,
    pub tool_choice: Option<ToolChoice>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_output_tokens: Option<u32>,
    pub stream: bool,
    pub text_format: Option<TextFormat>,
    pub parallel_tool_calls: Option<bool>,
    /// Thinking-token budget requested via `reasoning.effort`. Only Anthropic's adapter currently
    /// acts on this; others ignore it.
    pub reasoning_budget: Option<u32>,
}

/// A role-tagged turn in the conversation being sent upstream.
#[derive(Debug, Clone)]
pub struct ProviderMessage {
    pub role: ProviderRole,
    pub content: Vec<ProviderContentPart>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderRole {
    User,
    Assistant,
    Tool,
}

/// One piece of a message's content, in the shape both Anthropic and OpenAI-style APIs agree on
/// closely enough to share a single representation.
#[derive(Debug, Clone)]
pub enum ProviderContentPart {
    Text(String),
    Image {
        url: Option<String>,
        base64: Option<String>,
        media_type: Option<String>,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_call_id: String,
        content: String,
        is_error: bool,
    },
}

/// A tool made available to the model for this request.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: Option<String>,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone)]
pub enum ToolChoice {
    Auto,
    None,
    Required,
    Named(String),
}

/// Requested shape of the model's text output, mirrored from the Responses API's `text.format`.
#[derive(Debug, Clone)]
pub enum TextFormat {
    Text,
    JsonObject,
    JsonSchema {
        name: String,
        schema: serde_json::Value,
        strict: bool,
    },
}

/// The full, non-streaming result of a provider call.
#[derive(Debug, Clone, Default)]
pub struct ProviderResult {
    pub content: Vec<ProviderContent>,
    pub stop_reason: StopReason,
    pub usage: Usage,
    pub model: String,
}

/// One piece of completed output content from a non-streaming call.
#[derive(Debug, Clone)]
pub enum ProviderContent {
    Text(String),
    Thinking(String),
    ToolCall {
        id: String,
        name: String,
        arguments: serde_json::Value,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopReason {
    #[default]
    EndTurn,
    ToolUse,
    MaxTokens,
    Stop,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// A normalized increment of a streamed provider response.
///
/// Adapters project upstream-specific SSE framing onto this enum; the orchestrator owns output
/// item indexing and never sees an upstream's native event shape.
#[derive(Debug, Clone)]
pub enum ProviderEvent {
    /// The upstream opened a new piece of content (text, tool call, or thinking) identified by
    /// `content_id` for the lifetime of this stream. `name` is set for tool calls. The
    /// orchestrator decides how this maps onto a Responses API output item.
    ContentStart {
        content_id: String,
        kind: ContentKind,
        name: Option<String>,
    },
    /// An incremental delta for text or thinking content previously opened via `ContentStart`.
    TextDelta { content_id: String, delta: String },
    /// An incremental delta of a tool call's JSON arguments, as raw partial text.
    ToolArgumentsDelta { content_id: String, delta: String },
    /// The content identified by `content_id` is complete. `final_content` overwrites the
    /// accumulated buffer when present (used by tool calls, whose arguments are published whole
    /// on completion rather than trusted to the accumulated deltas).
    ContentDone {
        content_id: String,
        final_content: Option<String>,
    },
    /// The stream has finished; carries final usage and stop reason.
    MessageDone { stop_reason: StopReason, usage: Usage },
    /// The upstream reported an error mid-stream.
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Text,
    ToolCall,
    Thinking,
}

/// Metadata describing a model the provider can serve, surfaced through `/v1/models`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub owned_by: String,
}

/// Extra per-request routing information adapters may need but that isn't part of the
/// normalized request body itself (e.g. which of a provider's configured models to resolve
/// against aliases declared in configuration).
#[derive(Debug, Clone, Default)]
pub struct ModelAliases(pub HashMap<String, String>);

impl ModelAliases {
    pub fn resolve<'a>(&'a self, requested: &'a str) -> &'a str {
        self.0.get(requested).map(String::as_str).unwrap_or(requested)
    }
}
