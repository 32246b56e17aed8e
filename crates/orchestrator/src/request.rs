//! The Responses API request body and its nested item/tool types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

fn default_true() -> bool {
    true
}

/// `POST /v1/responses` request body.
#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    pub model: String,
    pub input: Input,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub previous_response_id: Option<String>,
    #[serde(default)]
    pub tools: Vec<ToolDefinition>,
    #[serde(default)]
    pub tool_choice: Option<ToolChoice>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub top_p: Option<f32>,
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default = "default_true")]
    pub store: bool,
    #[serde(default)]
    pub background: bool,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub truncation: Truncation,
    #[serde(default)]
    pub parallel_tool_calls: Option<bool>,
    #[serde(default)]
    pub text: Option<TextOptions>,
    #[serde(default)]
    pub reasoning: Option<ReasoningOptions>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Truncation {
    #[default]
    Auto,
    Disabled,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextOptions {
    pub format: TextFormat,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextFormat {
    Text,
    JsonObject,
    JsonSchema { name: String, schema: Value, #[serde(default)] strict: bool },
}

impl From<TextFormat> for providers::TextFormat {
    fn from(format: TextFormat) -> Self {
        match format {
            TextFormat::Text => providers::TextFormat::Text,
            TextFormat::JsonObject => providers::TextFormat::JsonObject,
            TextFormat::JsonSchema { name, schema, strict } => {
                providers::TextFormat::JsonSchema { name, schema, strict }
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReasoningOptions {
    pub effort: ReasoningEffort,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningEffort {
    Low,
    Medium,
    High,
}

impl ReasoningEffort {
    /// Maps a qualitative effort level to an integer thinking-token budget.
    pub fn token_budget(self) -> u32 {
        match self {
            ReasoningEffort::Low => 1024,
            ReasoningEffort::Medium => 8192,
            ReasoningEffort::High => 32768,
        }
    }
}

/// `input`: either a bare string or an ordered sequence of items.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Input {
    Text(String),
    Items(Vec<InputItem>),
}

/// A single entry of `input`, tagged by `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputItem {
    Message {
        role: MessageRole,
        content: MessageContent,
    },
    FunctionCall {
        call_id: String,
        name: String,
        arguments: String,
    },
    FunctionCallOutput {
        call_id: String,
        output: String,
    },
    ItemReference {
        id: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    System,
    Developer,
}

/// A message's `content`: either plain text or a sequence of content parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    InputText { text: String },
    OutputText { text: String },
    InputImage { image_url: Option<String> },
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: Option<Value>,
}

/// Built-in tool types the orchestrator does not implement; requesting one of these fails the
/// request with `not_implemented` upstream of any provider call.
pub const UNIMPLEMENTED_TOOL_TYPES: &[&str] = &[
    "web_search_preview",
    "file_search",
    "code_interpreter",
    "image_generation",
    "computer_use_preview",
];

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ToolChoice {
    Mode(ToolChoiceMode),
    Function { #[serde(rename = "type")] kind: FunctionChoiceType, name: String },
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoiceMode {
    Auto,
    Required,
    None,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionChoiceType {
    Function,
}

impl From<ToolChoice> for providers::ToolChoice {
    fn from(choice: ToolChoice) -> Self {
        match choice {
            ToolChoice::Mode(ToolChoiceMode::Auto) => providers::ToolChoice::Auto,
            ToolChoice::Mode(ToolChoiceMode::Required) => providers::ToolChoice::Required,
            ToolChoice::Mode(ToolChoiceMode::None) => providers::ToolChoice::None,
            ToolChoice::Function { name, .. } => providers::ToolChoice::Named(name),
        }
    }
}
