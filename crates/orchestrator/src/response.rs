//! The Responses API response object, its output items, and the persisted row shape.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::request::InputItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
    Cancelled,
    Incomplete,
}

impl ResponseStatus {
    /// A row in one of these statuses can still be written to by a partial update or transitioned
    /// by a cancel.
    pub fn is_in_flight(self) -> bool {
        matches!(self, ResponseStatus::Queued | ResponseStatus::InProgress)
    }

    /// A row in one of these statuses is write-once: no further status transition is permitted.
    pub fn is_terminal(self) -> bool {
        !self.is_in_flight()
    }
}

/// One element of a response's `output` array.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputItem {
    Message {
        id: String,
        status: ItemStatus,
        role: AssistantRole,
        content: Vec<OutputContent>,
    },
    FunctionCall {
        id: String,
        call_id: String,
        status: ItemStatus,
        name: String,
        arguments: String,
    },
    Reasoning {
        id: String,
        summary: Vec<SummaryText>,
        status: ItemStatus,
        encrypted_content: Option<String>,
    },
}

impl OutputItem {
    pub fn id(&self) -> &str {
        match self {
            OutputItem::Message { id, .. } => id,
            OutputItem::FunctionCall { id, .. } => id,
            OutputItem::Reasoning { id, .. } => id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    InProgress,
    Completed,
    Incomplete,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssistantRole {
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputContent {
    OutputText {
        text: String,
        annotations: Vec<serde_json::Value>,
    },
}

impl OutputContent {
    pub fn text(text: impl Into<String>) -> Self {
        OutputContent::OutputText {
            text: text.into(),
            annotations: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryText {
    #[serde(rename = "type")]
    pub kind: SummaryTextKind,
    pub text: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryTextKind {
    SummaryText,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
    pub input_tokens_details: InputTokensDetails,
}

impl Usage {
    pub fn new(input_tokens: u32, output_tokens: u32, cached_tokens: Option<u32>) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
            input_tokens_details: InputTokensDetails {
                cached_tokens: cached_tokens.unwrap_or_default(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct InputTokensDetails {
    pub cached_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncompleteDetails {
    pub reason: String,
}

/// A row as read from or written to the [`crate::ResponseStore`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredResponse {
    pub id: String,
    pub status: ResponseStatus,
    pub model: String,
    /// Mirrors the request's `store` flag. Rows with `store=false` are never written, so this
    /// is always `true` for any row actually read back; kept so continuation can assert it
    /// explicitly rather than relying on an invariant enforced only by absence.
    pub store: bool,
    pub created_at: i64,
    pub completed_at: Option<i64>,
    pub cancelled_at: Option<i64>,
    pub input_items: Vec<InputItem>,
    pub output_items: Vec<OutputItem>,
    pub usage: Option<Usage>,
    pub error: Option<crate::error::ErrorPayload>,
    pub incomplete_details: Option<IncompleteDetails>,
    pub metadata: HashMap<String, String>,
    pub parallel_tool_calls: Option<bool>,
}

/// The JSON object returned to clients, derived from a [`StoredResponse`] (or, for streaming
/// responses still in flight, built directly by the orchestrator).
#[derive(Debug, Clone, Serialize)]
pub struct ResponseObject {
    pub id: String,
    pub object: &'static str,
    pub status: ResponseStatus,
    pub model: String,
    pub created_at: i64,
    pub completed_at: Option<i64>,
    pub cancelled_at: Option<i64>,
    pub output: Vec<OutputItem>,
    pub usage: Option<Usage>,
    pub metadata: HashMap<String, String>,
    pub parallel_tool_calls: Option<bool>,
    pub error: Option<crate::error::ErrorPayload>,
    pub incomplete_details: Option<IncompleteDetails>,
}

impl From<StoredResponse> for ResponseObject {
    fn from(row: StoredResponse) -> Self {
        Self {
            id: row.id,
            object: "response",
            status: row.status,
            model: row.model,
            created_at: row.created_at,
            completed_at: row.completed_at,
            cancelled_at: row.cancelled_at,
            output: row.output_items,
            usage: row.usage,
            metadata: row.metadata,
            parallel_tool_calls: row.parallel_tool_calls,
            error: row.error,
            incomplete_details: row.incomplete_details,
        }
    }
}
