//! The Responses API orchestrator: conversation assembly, provider-adapter driving, SSE event
//! projection, and the persistence contract, free of any HTTP or database dependency.
//!
//! Mirrors the teacher's separation between `llm` (provider-facing) and the handler layer: this
//! crate is the `llm`-shaped core, generalized to a single richer wire protocol instead of one
//! per upstream.

mod assembler;
mod error;
mod ids;
mod request;
mod resolver;
mod response;
mod service;
mod store;
mod stream;

pub use assembler::{assemble, AssembledConversation};
pub use error::{ErrorPayload, OrchestratorError};
pub use request::{
    ContentPart, FunctionChoiceType, Input, InputItem, MessageContent, MessageRole,
    ReasoningEffort, ReasoningOptions, Request, TextFormat, TextOptions, ToolChoice,
    ToolChoiceMode, ToolDefinition, Truncation, UNIMPLEMENTED_TOOL_TYPES,
};
pub use resolver::{registrations_from_models, ModelRegistration, ModelSummary, Resolver, ResolvedModel};
pub use response::{
    AssistantRole, IncompleteDetails, InputTokensDetails, ItemStatus, OutputContent, OutputItem,
    ResponseObject, ResponseStatus, StoredResponse, SummaryText, SummaryTextKind, Usage,
};
pub use service::{CreateOutcome, OrchestratorService};
pub use store::{ConnectedStore, ResponseStore, StoreError, StoreProvider};
pub use stream::{SseEvent, StreamProjector, DONE_FRAME};
