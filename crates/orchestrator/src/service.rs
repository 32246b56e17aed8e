//! Ties the resolver, assembler, provider adapters, and persistence gateway together into the
//! three execution modes the Responses API surface exposes: synchronous, streaming, background.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use futures::StreamExt;
use providers::{ProviderContent, ProviderEvent, ProviderRequest, ProviderResult};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    assembler::{self, AssembledConversation},
    error::OrchestratorError,
    ids,
    request::Request,
    resolver::Resolver,
    response::{AssistantRole, ItemStatus, OutputContent, OutputItem, ResponseObject, ResponseStatus, StoredResponse, SummaryText, SummaryTextKind, Usage},
    store::{ResponseStore, StoreProvider},
    stream::{StreamProjector, DONE_FRAME},
};

/// Interval used to coalesce partial-output checkpoints during a streaming response.
const CHECKPOINT_DEBOUNCE: Duration = Duration::from_secs(1);

/// The outcome of `create`, one variant per execution mode.
pub enum CreateOutcome {
    /// `stream=false, background=false`: the finished response object.
    Sync(ResponseObject),
    /// `stream=true`: a channel of already-framed SSE text chunks (`event: ...\ndata: ...\n\n`).
    /// The HTTP layer forwards these verbatim as the response body.
    Stream(mpsc::UnboundedReceiver<String>),
    /// `background=true, store=true`: the immediate `in_progress` response object. The provider
    /// call continues in a spawned task.
    Background(ResponseObject),
}

pub struct OrchestratorService {
    resolver: Arc<Resolver>,
    store: Option<Arc<dyn StoreProvider>>,
    /// Cancellation tokens for streaming responses currently being driven by `run_stream`, keyed
    /// by response id. Lets `cancel()` signal a live task in addition to writing the `cancelled`
    /// row; entries are removed once their stream reaches a terminal state.
    in_flight: Arc<Mutex<HashMap<String, CancellationToken>>>,
}

impl OrchestratorService {
    pub fn new(resolver: Arc<Resolver>, store: Option<Arc<dyn StoreProvider>>) -> Self {
        Self {
            resolver,
            store,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Resolves the configured store, connecting it on first use. Fails with `server_error` both
    /// when no store is configured at all and when connecting fails.
    async fn store(&self) -> Result<Arc<dyn ResponseStore>, OrchestratorError> {
        let provider = self
            .store
            .as_ref()
            .ok_or_else(|| OrchestratorError::ServerError("no store configured".to_string()))?;

        provider.get_or_connect().await.map_err(|e| OrchestratorError::ServerError(e.to_string()))
    }

    /// Validates request-level invariants that don't depend on the resolver or store.
    fn validate(request: &Request) -> Result<(), OrchestratorError> {
        if let Some(temperature) = request.temperature
            && !(0.0..=2.0).contains(&temperature)
        {
            return Err(OrchestratorError::InvalidRequest("temperature must be between 0 and 2".to_string()));
        }

        if let Some(top_p) = request.top_p
            && !(0.0..=1.0).contains(&top_p)
        {
            return Err(OrchestratorError::InvalidRequest("top_p must be between 0 and 1".to_string()));
        }

        if let Some(max_output_tokens) = request.max_output_tokens
            && max_output_tokens == 0
        {
            return Err(OrchestratorError::InvalidRequest("max_output_tokens must be greater than 0".to_string()));
        }

        if request.background && !request.store {
            return Err(OrchestratorError::InvalidRequest("background requires store=true".to_string()));
        }

        Ok(())
    }

    /// Resolves the model, assembles the conversation, and builds the provider-agnostic request
    /// shared by every execution mode.
    async fn prepare(&self, request: &Request) -> Result<(ProviderRequest, AssembledConversation, Arc<dyn providers::ProviderAdapter>), OrchestratorError> {
        let resolved = self.resolver.resolve(&request.model)?;
        let assembled = assembler::assemble(request, self.store.as_ref()).await?;

        let text_format = request.text.as_ref().map(|t| t.format.clone().into());
        let tool_choice = request.tool_choice.clone().map(Into::into);
        let reasoning_budget = request.reasoning.as_ref().map(|r| r.effort.token_budget());

        let provider_request = ProviderRequest {
            model: resolved.underlying_model.clone(),
            system: assembled.system.clone(),
            messages: assembled.messages.clone(),
            tools: assembled.tools.clone(),
            tool_choice,
            temperature: request.temperature,
            top_p: request.top_p,
            max_output_tokens: request.max_output_tokens,
            stream: request.stream,
            text_format,
            parallel_tool_calls: request.parallel_tool_calls,
            reasoning_budget,
        };

        Ok((provider_request, assembled, resolved.adapter))
    }

    pub async fn create(&self, request: Request, cancellation: CancellationToken) -> Result<CreateOutcome, OrchestratorError> {
        Self::validate(&request)?;

        if request.stream {
            let receiver = self.create_streaming(request, cancellation).await?;
            return Ok(CreateOutcome::Stream(receiver));
        }

        if request.background {
            let response = self.create_background(request).await?;
            return Ok(CreateOutcome::Background(response));
        }

        let response = self.create_sync(request).await?;
        Ok(CreateOutcome::Sync(response))
    }

    /// §4.3 — synchronous non-streaming path.
    async fn create_sync(&self, request: Request) -> Result<ResponseObject, OrchestratorError> {
        let (provider_request, assembled, adapter) = self.prepare(&request).await?;
        let response_id = ids::response_id();
        let created_at = now();

        let result = adapter.complete(provider_request).await;

        match result {
            Ok(result) => {
                let response = self.finish_sync(&request, &response_id, created_at, assembled, result).await?;
                Ok(response)
            }
            Err(error) => {
                let orchestrator_error: OrchestratorError = error.into();
                if request.store {
                    self.persist_failure(&request, &response_id, created_at, assembled.input_items, &orchestrator_error).await;
                }
                Err(orchestrator_error)
            }
        }
    }

    async fn finish_sync(
        &self,
        request: &Request,
        response_id: &str,
        created_at: i64,
        assembled: AssembledConversation,
        result: ProviderResult,
    ) -> Result<ResponseObject, OrchestratorError> {
        let output_items = project_non_streaming(result.content);
        let usage = Usage::new(result.usage.input_tokens, result.usage.output_tokens, None);

        let completed_at = now();

        if request.store {
            let stored = StoredResponse {
                id: response_id.to_string(),
                status: ResponseStatus::Completed,
                model: request.model.clone(),
                store: true,
                created_at,
                completed_at: Some(completed_at),
                cancelled_at: None,
                input_items: assembled.input_items,
                output_items: output_items.clone(),
                usage: Some(usage),
                error: None,
                incomplete_details: None,
                metadata: request.metadata.clone(),
                parallel_tool_calls: request.parallel_tool_calls,
            };

            let store = self.store().await?;
            store.upsert(stored).await.map_err(|e| OrchestratorError::ServerError(e.to_string()))?;
        }

        Ok(ResponseObject {
            id: response_id.to_string(),
            object: "response",
            status: ResponseStatus::Completed,
            model: request.model.clone(),
            created_at,
            completed_at: Some(completed_at),
            cancelled_at: None,
            output: output_items,
            usage: Some(usage),
            metadata: request.metadata.clone(),
            parallel_tool_calls: request.parallel_tool_calls,
            error: None,
            incomplete_details: None,
        })
    }

    async fn persist_failure(&self, request: &Request, response_id: &str, created_at: i64, input_items: Vec<crate::request::InputItem>, error: &OrchestratorError) {
        let store = match self.store().await {
            Ok(store) => store,
            Err(e) => {
                log::warn!("failed to persist failed response {response_id}: {e}");
                return;
            }
        };

        let stored = StoredResponse {
            id: response_id.to_string(),
            status: ResponseStatus::Failed,
            model: request.model.clone(),
            store: true,
            created_at,
            completed_at: None,
            cancelled_at: None,
            input_items,
            output_items: Vec::new(),
            usage: None,
            error: Some(error.to_payload(None)),
            incomplete_details: None,
            metadata: request.metadata.clone(),
            parallel_tool_calls: request.parallel_tool_calls,
        };

        if let Err(e) = store.upsert(stored).await {
            log::warn!("failed to persist failed response {response_id}: {e}");
        }
    }

    /// §4.4 — streaming path. Spawns a task owning the projector and the adapter's event stream;
    /// the returned receiver yields already-framed SSE text chunks.
    async fn create_streaming(&self, request: Request, cancellation: CancellationToken) -> Result<mpsc::UnboundedReceiver<String>, OrchestratorError> {
        let (provider_request, assembled, adapter) = self.prepare(&request).await?;
        let response_id = ids::response_id();
        let created_at = now();

        let provider_stream = adapter.stream(provider_request).await.map_err(OrchestratorError::from)?;

        let store = if request.store { Some(self.store().await?) } else { None };

        if let Some(store) = &store {
            let stored = StoredResponse {
                id: response_id.clone(),
                status: ResponseStatus::InProgress,
                model: request.model.clone(),
                store: true,
                created_at,
                completed_at: None,
                cancelled_at: None,
                input_items: assembled.input_items.clone(),
                output_items: Vec::new(),
                usage: None,
                error: None,
                incomplete_details: None,
                metadata: request.metadata.clone(),
                parallel_tool_calls: request.parallel_tool_calls,
            };

            store.upsert(stored).await.map_err(|e| OrchestratorError::ServerError(e.to_string()))?;
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        let metadata = request.metadata.clone();
        let parallel_tool_calls = request.parallel_tool_calls;
        let model = request.model.clone();

        let in_flight = self.in_flight.clone();
        in_flight.lock().unwrap().insert(response_id.clone(), cancellation.clone());
        let in_flight_id = response_id.clone();

        tokio::spawn(async move {
            run_stream(
                provider_stream,
                StreamProjector::new(response_id, model, created_at, metadata, parallel_tool_calls),
                sender,
                store,
                cancellation,
            )
            .await;
            in_flight.lock().unwrap().remove(&in_flight_id);
        });

        Ok(receiver)
    }

    /// §4.5 — background mode. The HTTP layer returns the `in_progress` object from this call
    /// immediately; the provider call runs in a detached task afterward.
    async fn create_background(&self, request: Request) -> Result<ResponseObject, OrchestratorError> {
        let store = self.store().await?;

        let (provider_request, assembled, adapter) = self.prepare(&request).await?;
        let response_id = ids::response_id();
        let created_at = now();

        let initial = StoredResponse {
            id: response_id.clone(),
            status: ResponseStatus::InProgress,
            model: request.model.clone(),
            store: true,
            created_at,
            completed_at: None,
            cancelled_at: None,
            input_items: assembled.input_items.clone(),
            output_items: Vec::new(),
            usage: None,
            error: None,
            incomplete_details: None,
            metadata: request.metadata.clone(),
            parallel_tool_calls: request.parallel_tool_calls,
        };

        store.upsert(initial).await.map_err(|e| OrchestratorError::ServerError(e.to_string()))?;

        let response = ResponseObject {
            id: response_id.clone(),
            object: "response",
            status: ResponseStatus::InProgress,
            model: request.model.clone(),
            created_at,
            completed_at: None,
            cancelled_at: None,
            output: Vec::new(),
            usage: None,
            metadata: request.metadata.clone(),
            parallel_tool_calls: request.parallel_tool_calls,
            error: None,
            incomplete_details: None,
        };

        let model = request.model.clone();
        let metadata = request.metadata.clone();
        let parallel_tool_calls = request.parallel_tool_calls;

        tokio::spawn(async move {
            let result = adapter.complete(provider_request).await;
            let completed_at = now();

            let stored = match result {
                Ok(result) => {
                    let output_items = project_non_streaming(result.content);
                    let usage = Usage::new(result.usage.input_tokens, result.usage.output_tokens, None);

                    StoredResponse {
                        id: response_id.clone(),
                        status: ResponseStatus::Completed,
                        model,
                        store: true,
                        created_at,
                        completed_at: Some(completed_at),
                        cancelled_at: None,
                        input_items: assembled.input_items,
                        output_items,
                        usage: Some(usage),
                        error: None,
                        incomplete_details: None,
                        metadata,
                        parallel_tool_calls,
                    }
                }
                Err(error) => {
                    let orchestrator_error: OrchestratorError = error.into();
                    StoredResponse {
                        id: response_id.clone(),
                        status: ResponseStatus::Failed,
                        model,
                        store: true,
                        created_at,
                        completed_at: None,
                        cancelled_at: None,
                        input_items: assembled.input_items,
                        output_items: Vec::new(),
                        usage: None,
                        error: Some(orchestrator_error.to_payload(None)),
                        incomplete_details: None,
                        metadata,
                        parallel_tool_calls,
                    }
                }
            };

            if let Err(e) = store.upsert(stored).await {
                log::warn!("failed to persist background response {response_id}: {e}");
            }
        });

        Ok(response)
    }

    pub async fn get(&self, id: &str) -> Result<ResponseObject, OrchestratorError> {
        let store = self.store().await?;
        let row = store
            .get(id)
            .await
            .map_err(|e| OrchestratorError::ServerError(e.to_string()))?
            .ok_or_else(|| OrchestratorError::NotFound(format!("no response found with id `{id}`")))?;
        Ok(row.into())
    }

    pub async fn delete(&self, id: &str) -> Result<(), OrchestratorError> {
        let store = self.store().await?;
        let deleted = store.delete(id).await.map_err(|e| OrchestratorError::ServerError(e.to_string()))?;
        if deleted {
            Ok(())
        } else {
            Err(OrchestratorError::NotFound(format!("no response found with id `{id}`")))
        }
    }

    /// `POST /v1/responses/{id}/cancel`. Best-effort: flips the row's status if still in flight;
    /// reports `conflict` for a response that is already terminal or was never stored.
    pub async fn cancel(&self, id: &str) -> Result<ResponseObject, OrchestratorError> {
        let store = self.store().await?;

        let row = store
            .get(id)
            .await
            .map_err(|e| OrchestratorError::ServerError(e.to_string()))?
            .ok_or_else(|| OrchestratorError::NotFound(format!("no response found with id `{id}`")))?;

        if !row.status.is_in_flight() {
            return Err(OrchestratorError::Conflict(format!("response `{id}` is not in a cancellable state")));
        }

        let cancelled_at = now();
        let applied = store
            .cancel(id, cancelled_at)
            .await
            .map_err(|e| OrchestratorError::ServerError(e.to_string()))?;

        if !applied {
            return Err(OrchestratorError::Conflict(format!("response `{id}` is not in a cancellable state")));
        }

        if let Some(token) = self.in_flight.lock().unwrap().get(id) {
            token.cancel();
        }

        let mut row = row;
        row.status = ResponseStatus::Cancelled;
        row.cancelled_at = Some(cancelled_at);
        Ok(row.into())
    }
}

/// Drives one streaming response to completion: pulls events from the adapter, projects them
/// through `projector`, forwards framed SSE text to `sender`, and checkpoints partial output to
/// `store` on a ~1 s debounce. Runs until the adapter stream ends, a non-abort error occurs, or
/// `cancellation` fires.
async fn run_stream(
    mut provider_stream: futures::stream::BoxStream<'static, providers::Result<ProviderEvent>>,
    mut projector: StreamProjector,
    sender: mpsc::UnboundedSender<String>,
    store: Option<Arc<dyn ResponseStore>>,
    cancellation: CancellationToken,
) {
    let response_id = projector.response_id().to_string();

    let _ = sender.send(projector.open().to_sse_frame());

    let mut checkpoint_due = false;
    let mut checkpoint_timer = Box::pin(tokio::time::sleep(CHECKPOINT_DEBOUNCE));

    loop {
        tokio::select! {
            biased;

            _ = cancellation.cancelled() => {
                if let Some(store) = &store {
                    let response = projector.abort_response_object();
                    persist_terminal(&response_id, &response, store).await;
                }
                let _ = sender.send(DONE_FRAME.to_string());
                return;
            }

            _ = &mut checkpoint_timer, if checkpoint_due => {
                checkpoint_due = false;
                if let Some(store) = &store {
                    let output_items = projector.partial_output_items();
                    if let Err(e) = store.partial_update(&response_id, output_items).await {
                        log::warn!("checkpoint write failed for {response_id}: {e}");
                    }
                }
            }

            next = provider_stream.next() => {
                match next {
                    Some(Ok(providers::ProviderEvent::Error(message))) => {
                        let events = projector.process(ProviderEvent::Error(message));
                        if let Some(store) = &store {
                            if let Some(response) = terminal_response(&events) {
                                persist_terminal(&response_id, response, store).await;
                            }
                        }
                        for event in events {
                            let _ = sender.send(event.to_sse_frame());
                        }
                        let _ = sender.send(DONE_FRAME.to_string());
                        return;
                    }
                    Some(Ok(event)) => {
                        let is_text_delta = matches!(event, ProviderEvent::TextDelta { .. });
                        let events = projector.process(event);
                        let completed = terminal_response(&events).is_some();

                        if completed {
                            if let Some(store) = &store {
                                let response = terminal_response(&events).expect("checked above");
                                persist_terminal(&response_id, response, store).await;
                            }
                        }

                        for event in &events {
                            let _ = sender.send(event.to_sse_frame());
                        }

                        if completed {
                            let _ = sender.send(DONE_FRAME.to_string());
                            return;
                        }

                        if is_text_delta && !checkpoint_due {
                            checkpoint_due = true;
                            checkpoint_timer.as_mut().reset(tokio::time::Instant::now() + CHECKPOINT_DEBOUNCE);
                        }
                    }
                    Some(Err(providers::ProviderError::Aborted)) => {
                        if let Some(store) = &store {
                            let response = projector.abort_response_object();
                            persist_terminal(&response_id, &response, store).await;
                        }
                        let _ = sender.send(DONE_FRAME.to_string());
                        return;
                    }
                    Some(Err(error)) => {
                        let orchestrator_error: OrchestratorError = error.into();
                        let events = projector.process(ProviderEvent::Error(orchestrator_error.to_string()));
                        if let Some(store) = &store {
                            if let Some(response) = terminal_response(&events) {
                                persist_terminal(&response_id, response, store).await;
                            }
                        }
                        for event in events {
                            let _ = sender.send(event.to_sse_frame());
                        }
                        let _ = sender.send(DONE_FRAME.to_string());
                        return;
                    }
                    None => {
                        // Upstream closed without an explicit message_done; treat as completion
                        // with whatever was accumulated so the response still reaches a terminal
                        // status instead of hanging in_progress forever.
                        let events = projector.process(ProviderEvent::MessageDone {
                            stop_reason: providers::StopReason::EndTurn,
                            usage: providers::Usage::default(),
                        });
                        if let Some(store) = &store {
                            if let Some(response) = terminal_response(&events) {
                                persist_terminal(&response_id, response, store).await;
                            }
                        }
                        for event in &events {
                            let _ = sender.send(event.to_sse_frame());
                        }
                        let _ = sender.send(DONE_FRAME.to_string());
                        return;
                    }
                }
            }
        }
    }
}

/// Picks the terminal response object, if any, out of one batch of projected SSE events.
fn terminal_response(events: &[crate::stream::SseEvent]) -> Option<&ResponseObject> {
    events.iter().find_map(|event| match event {
        crate::stream::SseEvent::ResponseCompleted { response, .. } | crate::stream::SseEvent::ResponseFailed { response, .. } => Some(response),
        _ => None,
    })
}

/// Builds and writes the terminal row for a streaming response that just reached `completed`,
/// `failed`, or `incomplete` (abort). Mirrors `finish_sync`/the background task's persistence so
/// a subsequent `GET` reflects what streaming actually produced instead of the initial
/// `in_progress` row.
async fn persist_terminal(response_id: &str, response: &ResponseObject, store: &Arc<dyn ResponseStore>) {
    let Some(stored) = response_to_stored(response_id, response, store).await else {
        return;
    };

    if let Err(e) = store.upsert(stored).await {
        log::warn!("failed to persist terminal response {response_id}: {e}");
    }
}

/// Builds the row to persist for a stream that just reached a terminal state, preserving
/// whatever input items the initial `in_progress` row already carries.
async fn response_to_stored(response_id: &str, response: &ResponseObject, store: &Arc<dyn ResponseStore>) -> Option<StoredResponse> {
    let existing = match store.get(response_id).await {
        Ok(row) => row,
        Err(e) => {
            log::warn!("failed to read back {response_id} while persisting terminal state: {e}");
            None
        }
    }?;

    Some(StoredResponse {
        id: response_id.to_string(),
        status: response.status,
        model: response.model.clone(),
        store: true,
        created_at: response.created_at,
        completed_at: response.completed_at,
        cancelled_at: response.cancelled_at,
        input_items: existing.input_items,
        output_items: response.output.clone(),
        usage: response.usage,
        error: response.error.clone(),
        incomplete_details: response.incomplete_details.clone(),
        metadata: response.metadata.clone(),
        parallel_tool_calls: response.parallel_tool_calls,
    })
}

/// §4.3 step 2 — projects a non-streaming result's content into output items, moving any
/// reasoning item to the head of the list.
fn project_non_streaming(content: Vec<ProviderContent>) -> Vec<OutputItem> {
    let mut reasoning = Vec::new();
    let mut rest = Vec::new();

    for piece in content {
        match piece {
            ProviderContent::Text(text) => rest.push(OutputItem::Message {
                id: ids::message_id(),
                status: ItemStatus::Completed,
                role: AssistantRole::Assistant,
                content: vec![OutputContent::text(text)],
            }),
            ProviderContent::Thinking(text) => reasoning.push(OutputItem::Reasoning {
                id: ids::reasoning_id(),
                summary: vec![SummaryText {
                    kind: SummaryTextKind::SummaryText,
                    text,
                }],
                status: ItemStatus::Completed,
                encrypted_content: None,
            }),
            ProviderContent::ToolCall { id, name, arguments } => rest.push(OutputItem::FunctionCall {
                id: ids::function_call_id(),
                call_id: id,
                status: ItemStatus::Completed,
                name,
                arguments: serde_json::to_string(&arguments).unwrap_or_default(),
            }),
        }
    }

    reasoning.append(&mut rest);
    reasoning
}

fn now() -> i64 {
    jiff::Timestamp::now().as_second()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_non_streaming_moves_reasoning_to_head() {
        let content = vec![
            ProviderContent::Text("the answer is 4".to_string()),
            ProviderContent::Thinking("2 + 2 = 4".to_string()),
        ];

        let items = project_non_streaming(content);

        assert_eq!(items.len(), 2);
        assert!(matches!(items[0], OutputItem::Reasoning { .. }));
        assert!(matches!(items[1], OutputItem::Message { .. }));
    }

    #[test]
    fn project_non_streaming_without_reasoning_keeps_message_order() {
        let content = vec![ProviderContent::Text("hi".to_string())];

        let items = project_non_streaming(content);

        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], OutputItem::Message { .. }));
    }
}
