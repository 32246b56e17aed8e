//! Normalized access to upstream LLM providers.
//!
//! This crate knows how to speak to an Anthropic-style Messages API or an OpenAI-compatible
//! chat-completions API and project either one onto a single [`ProviderAdapter`] trait and a
//! shared set of request/response/event types. It does not know anything about the Responses
//! API surface the orchestrator exposes to clients.

mod adapter;
mod error;
mod http_client;
mod provider;
pub mod structured_output;
mod types;

pub use adapter::ProviderAdapter;
pub use error::{ProviderError, Result};
pub use http_client::http_client;
pub use provider::anthropic::AnthropicAdapter;
pub use provider::openai::OpenAiAdapter;
pub use types::{
    ContentKind, ModelAliases, ModelInfo, ProviderContent, ProviderContentPart, ProviderEvent,
    ProviderMessage, ProviderRequest, ProviderResult, ProviderRole, StopReason, TextFormat,
    ToolChoice, ToolDefinition, Usage,
};
