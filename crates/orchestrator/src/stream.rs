//! Projects normalized [`providers::ProviderEvent`]s onto the Responses API's richer SSE event
//! sequence: stable ids, monotonic sequence numbers, and lazy output-item opening.
//!
//! [`StreamProjector`] is deliberately pure and synchronous — it owns no I/O, so the invariants
//! in the component design (sequencing, id stability, output-index assignment) are unit
//! testable by feeding it a canned [`ProviderEvent`] sequence, the same way the teacher's stream
//! processors are tested in isolation from their HTTP transport.

use std::collections::HashMap;

use indexmap::IndexMap;
use providers::{ContentKind, ProviderEvent, StopReason, Usage as ProviderUsage};
use serde::Serialize;

use crate::{
    error::ErrorPayload,
    ids,
    response::{AssistantRole, ItemStatus, OutputContent, OutputItem, ResponseObject, ResponseStatus, SummaryText, SummaryTextKind, Usage},
};

/// One typed SSE payload. `event_name()` gives the `event:` line; serializing the payload gives
/// the `data:` line. The two must always agree on `type`, which is asserted in tests.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum SseEvent {
    #[serde(rename = "response.in_progress")]
    ResponseInProgress { sequence_number: u64, response: ResponseObject },
    #[serde(rename = "response.output_item.added")]
    OutputItemAdded {
        sequence_number: u64,
        output_index: usize,
        item: OutputItem,
    },
    #[serde(rename = "response.content_part.added")]
    ContentPartAdded {
        sequence_number: u64,
        item_id: String,
        output_index: usize,
        content_index: usize,
        part: OutputContent,
    },
    #[serde(rename = "response.output_text.delta")]
    OutputTextDelta {
        sequence_number: u64,
        item_id: String,
        output_index: usize,
        content_index: usize,
        delta: String,
    },
    #[serde(rename = "response.output_text.done")]
    OutputTextDone {
        sequence_number: u64,
        item_id: String,
        output_index: usize,
        content_index: usize,
        text: String,
    },
    #[serde(rename = "response.content_part.done")]
    ContentPartDone {
        sequence_number: u64,
        item_id: String,
        output_index: usize,
        content_index: usize,
        part: OutputContent,
    },
    #[serde(rename = "response.output_item.done")]
    OutputItemDone {
        sequence_number: u64,
        output_index: usize,
        item: OutputItem,
    },
    #[serde(rename = "response.completed")]
    ResponseCompleted { sequence_number: u64, response: ResponseObject },
    #[serde(rename = "response.failed")]
    ResponseFailed { sequence_number: u64, response: ResponseObject },
    #[serde(rename = "error")]
    Error { error: ErrorPayload },
}

impl SseEvent {
    /// The `event:` line. Must equal this payload's own serialized `type` field (invariant 2).
    pub fn event_name(&self) -> &'static str {
        match self {
            SseEvent::ResponseInProgress { .. } => "response.in_progress",
            SseEvent::OutputItemAdded { .. } => "response.output_item.added",
            SseEvent::ContentPartAdded { .. } => "response.content_part.added",
            SseEvent::OutputTextDelta { .. } => "response.output_text.delta",
            SseEvent::OutputTextDone { .. } => "response.output_text.done",
            SseEvent::ContentPartDone { .. } => "response.content_part.done",
            SseEvent::OutputItemDone { .. } => "response.output_item.done",
            SseEvent::ResponseCompleted { .. } => "response.completed",
            SseEvent::ResponseFailed { .. } => "response.failed",
            SseEvent::Error { .. } => "error",
        }
    }

    /// Renders this event as the two-line-plus-blank SSE frame the wire format requires.
    pub fn to_sse_frame(&self) -> String {
        let data = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        format!("event: {}\ndata: {data}\n\n", self.event_name())
    }
}

/// The literal terminal frame. Carries no `event:` line per the wire format.
pub const DONE_FRAME: &str = "data: [DONE]\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContentRoute {
    Message,
    Thinking,
    ToolCall,
}

struct MessageState {
    id: String,
    output_index: usize,
    text: String,
    done: bool,
}

struct ToolCallState {
    fc_id: String,
    call_id: String,
    name: String,
    output_index: usize,
    arguments: String,
    done: bool,
}

/// How a stream ended, reported by the engine driving [`StreamProjector`] once the upstream's
/// event iterator is exhausted or errors.
pub enum StreamOutcome {
    Completed { response: ResponseObject },
    Failed { response: ResponseObject },
    Aborted { partial_output: Vec<OutputItem> },
}

/// Mutable state threaded through one streaming response. Not `Send`-shared: one instance per
/// in-flight request, owned exclusively by that request's task.
pub struct StreamProjector {
    response_id: String,
    model: String,
    created_at: i64,
    metadata: HashMap<String, String>,
    parallel_tool_calls: Option<bool>,

    sequence: u64,
    next_output_index: usize,

    message: Option<MessageState>,
    thinking_text: String,
    thinking_started: bool,
    tool_calls: IndexMap<String, ToolCallState>,
    content_routes: HashMap<String, ContentRoute>,

    usage: Option<Usage>,
}

impl StreamProjector {
    pub fn new(
        response_id: String,
        model: String,
        created_at: i64,
        metadata: HashMap<String, String>,
        parallel_tool_calls: Option<bool>,
    ) -> Self {
        Self {
            response_id,
            model,
            created_at,
            metadata,
            parallel_tool_calls,
            sequence: 0,
            next_output_index: 0,
            message: None,
            thinking_text: String::new(),
            thinking_started: false,
            tool_calls: IndexMap::new(),
            content_routes: HashMap::new(),
            usage: None,
        }
    }

    fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    fn allocate_output_index(&mut self) -> usize {
        let index = self.next_output_index;
        self.next_output_index += 1;
        index
    }

    /// The event that opens the stream. Must be the caller's first emitted frame.
    pub fn open(&mut self) -> SseEvent {
        let response = self.in_progress_response_object();
        SseEvent::ResponseInProgress {
            sequence_number: self.next_sequence(),
            response,
        }
    }

    fn in_progress_response_object(&self) -> ResponseObject {
        ResponseObject {
            id: self.response_id.clone(),
            object: "response",
            status: ResponseStatus::InProgress,
            model: self.model.clone(),
            created_at: self.created_at,
            completed_at: None,
            cancelled_at: None,
            output: Vec::new(),
            usage: None,
            metadata: self.metadata.clone(),
            parallel_tool_calls: self.parallel_tool_calls,
            error: None,
            incomplete_details: None,
        }
    }

    /// Projects one normalized provider event onto zero or more SSE frames. Returns `None` once
    /// the stream has reached a terminal frame (`response.completed`/`response.failed`); the
    /// caller must not call this again afterward.
    pub fn process(&mut self, event: ProviderEvent) -> Vec<SseEvent> {
        match event {
            ProviderEvent::ContentStart { content_id, kind, name } => self.on_content_start(content_id, kind, name),
            ProviderEvent::TextDelta { content_id, delta } => self.on_text_delta(content_id, delta),
            ProviderEvent::ToolArgumentsDelta { content_id, delta } => self.on_tool_arguments_delta(content_id, delta),
            ProviderEvent::ContentDone { content_id, final_content } => self.on_content_done(content_id, final_content),
            ProviderEvent::MessageDone { stop_reason, usage } => self.on_message_done(stop_reason, usage),
            ProviderEvent::Error(message) => self.on_error(message),
        }
    }

    fn on_content_start(&mut self, content_id: String, kind: ContentKind, name: Option<String>) -> Vec<SseEvent> {
        match kind {
            ContentKind::Text => {
                self.content_routes.insert(content_id, ContentRoute::Message);
                Vec::new()
            }
            ContentKind::Thinking => {
                self.content_routes.insert(content_id, ContentRoute::Thinking);
                Vec::new()
            }
            ContentKind::ToolCall => {
                let output_index = self.allocate_output_index();
                let fc_id = ids::function_call_id();
                let name = name.unwrap_or_default();

                self.tool_calls.insert(
                    content_id.clone(),
                    ToolCallState {
                        fc_id: fc_id.clone(),
                        call_id: content_id.clone(),
                        name: name.clone(),
                        output_index,
                        arguments: String::new(),
                        done: false,
                    },
                );
                self.content_routes.insert(content_id.clone(), ContentRoute::ToolCall);

                let item = OutputItem::FunctionCall {
                    id: fc_id,
                    call_id: content_id,
                    status: ItemStatus::InProgress,
                    name,
                    arguments: String::new(),
                };

                vec![SseEvent::OutputItemAdded {
                    sequence_number: self.next_sequence(),
                    output_index,
                    item,
                }]
            }
        }
    }

    fn on_text_delta(&mut self, content_id: String, delta: String) -> Vec<SseEvent> {
        match self.content_routes.get(&content_id) {
            Some(ContentRoute::Thinking) => {
                self.thinking_started = true;
                self.thinking_text.push_str(&delta);
                Vec::new()
            }
            Some(ContentRoute::ToolCall) => Vec::new(),
            _ => {
                let mut events = Vec::new();

                if self.message.is_none() {
                    let output_index = self.allocate_output_index();
                    let id = ids::message_id();

                    events.push(SseEvent::OutputItemAdded {
                        sequence_number: self.next_sequence(),
                        output_index,
                        item: OutputItem::Message {
                            id: id.clone(),
                            status: ItemStatus::InProgress,
                            role: AssistantRole::Assistant,
                            content: Vec::new(),
                        },
                    });
                    events.push(SseEvent::ContentPartAdded {
                        sequence_number: self.next_sequence(),
                        item_id: id.clone(),
                        output_index,
                        content_index: 0,
                        part: OutputContent::text(""),
                    });

                    self.message = Some(MessageState {
                        id,
                        output_index,
                        text: String::new(),
                        done: false,
                    });
                }

                let message = self.message.as_mut().expect("just opened above");
                message.text.push_str(&delta);

                if !delta.is_empty() {
                    events.push(SseEvent::OutputTextDelta {
                        sequence_number: self.next_sequence(),
                        item_id: message.id.clone(),
                        output_index: message.output_index,
                        content_index: 0,
                        delta,
                    });
                }

                events
            }
        }
    }

    fn on_tool_arguments_delta(&mut self, content_id: String, delta: String) -> Vec<SseEvent> {
        if let Some(tool_call) = self.tool_calls.get_mut(&content_id) {
            tool_call.arguments.push_str(&delta);
        }
        Vec::new()
    }

    fn on_content_done(&mut self, content_id: String, final_content: Option<String>) -> Vec<SseEvent> {
        match self.content_routes.get(&content_id).copied() {
            Some(ContentRoute::Message) => self.finalize_message(final_content),
            Some(ContentRoute::Thinking) => {
                if let Some(text) = final_content {
                    self.thinking_text = text;
                }
                self.thinking_started = true;
                Vec::new()
            }
            Some(ContentRoute::ToolCall) => self.finalize_tool_call(&content_id, final_content),
            None => Vec::new(),
        }
    }

    fn finalize_message(&mut self, final_content: Option<String>) -> Vec<SseEvent> {
        let Some(message) = self.message.as_mut() else {
            return Vec::new();
        };

        if message.done {
            return Vec::new();
        }

        if let Some(text) = final_content {
            message.text = text;
        }
        message.done = true;

        let item_id = message.id.clone();
        let output_index = message.output_index;
        let text = message.text.clone();

        vec![
            SseEvent::OutputTextDone {
                sequence_number: self.next_sequence(),
                item_id: item_id.clone(),
                output_index,
                content_index: 0,
                text: text.clone(),
            },
            SseEvent::ContentPartDone {
                sequence_number: self.next_sequence(),
                item_id: item_id.clone(),
                output_index,
                content_index: 0,
                part: OutputContent::text(text.clone()),
            },
            SseEvent::OutputItemDone {
                sequence_number: self.next_sequence(),
                output_index,
                item: OutputItem::Message {
                    id: item_id,
                    status: ItemStatus::Completed,
                    role: AssistantRole::Assistant,
                    content: vec![OutputContent::text(text)],
                },
            },
        ]
    }

    fn finalize_tool_call(&mut self, content_id: &str, final_content: Option<String>) -> Vec<SseEvent> {
        let Some(tool_call) = self.tool_calls.get_mut(content_id) else {
            return Vec::new();
        };

        if tool_call.done {
            return Vec::new();
        }

        if let Some(arguments) = final_content {
            tool_call.arguments = arguments;
        }
        tool_call.done = true;

        let item = OutputItem::FunctionCall {
            id: tool_call.fc_id.clone(),
            call_id: tool_call.call_id.clone(),
            status: ItemStatus::Completed,
            name: tool_call.name.clone(),
            arguments: tool_call.arguments.clone(),
        };

        vec![SseEvent::OutputItemDone {
            sequence_number: self.next_sequence(),
            output_index: tool_call.output_index,
            item,
        }]
    }

    fn on_message_done(&mut self, stop_reason: StopReason, usage: ProviderUsage) -> Vec<SseEvent> {
        let mut events = Vec::new();

        events.extend(self.finalize_message(None));

        let tool_call_ids: Vec<String> = self.tool_calls.keys().cloned().collect();
        for content_id in tool_call_ids {
            events.extend(self.finalize_tool_call(&content_id, None));
        }

        let usage = Usage::new(usage.input_tokens, usage.output_tokens, None);
        self.usage = Some(usage);

        let response = self.build_response_object(ResponseStatus::Completed, usage, stop_reason, None, None);

        events.push(SseEvent::ResponseCompleted {
            sequence_number: self.next_sequence(),
            response,
        });

        events
    }

    fn on_error(&mut self, message: String) -> Vec<SseEvent> {
        let error = ErrorPayload {
            message,
            kind: "server_error".to_string(),
            param: None,
            code: None,
        };

        let response = self.build_response_object(
            ResponseStatus::Failed,
            self.usage.unwrap_or_default(),
            StopReason::EndTurn,
            Some(error.clone()),
            None,
        );

        vec![
            SseEvent::Error { error },
            SseEvent::ResponseFailed {
                sequence_number: self.next_sequence(),
                response,
            },
        ]
    }

    /// Builds the final `output` array: reasoning (if any thinking was accumulated) at the head,
    /// then every message/function-call item in first-appearance order.
    fn build_output_items(&self) -> Vec<OutputItem> {
        let mut items = Vec::new();

        if self.thinking_started {
            items.push(OutputItem::Reasoning {
                id: ids::reasoning_id(),
                summary: vec![SummaryText {
                    kind: SummaryTextKind::SummaryText,
                    text: self.thinking_text.clone(),
                }],
                status: ItemStatus::Completed,
                encrypted_content: None,
            });
        }

        let mut indexed: Vec<(usize, OutputItem)> = Vec::new();

        if let Some(message) = &self.message {
            indexed.push((
                message.output_index,
                OutputItem::Message {
                    id: message.id.clone(),
                    status: if message.done { ItemStatus::Completed } else { ItemStatus::InProgress },
                    role: AssistantRole::Assistant,
                    content: vec![OutputContent::text(message.text.clone())],
                },
            ));
        }

        for tool_call in self.tool_calls.values() {
            indexed.push((
                tool_call.output_index,
                OutputItem::FunctionCall {
                    id: tool_call.fc_id.clone(),
                    call_id: tool_call.call_id.clone(),
                    status: if tool_call.done { ItemStatus::Completed } else { ItemStatus::InProgress },
                    name: tool_call.name.clone(),
                    arguments: tool_call.arguments.clone(),
                },
            ));
        }

        indexed.sort_by_key(|(index, _)| *index);
        items.extend(indexed.into_iter().map(|(_, item)| item));

        items
    }

    fn build_response_object(
        &self,
        status: ResponseStatus,
        usage: Usage,
        _stop_reason: StopReason,
        error: Option<ErrorPayload>,
        incomplete_reason: Option<&str>,
    ) -> ResponseObject {
        ResponseObject {
            id: self.response_id.clone(),
            object: "response",
            status,
            model: self.model.clone(),
            created_at: self.created_at,
            completed_at: if status == ResponseStatus::Completed {
                Some(jiff::Timestamp::now().as_second())
            } else {
                None
            },
            cancelled_at: None,
            output: self.build_output_items(),
            usage: Some(usage),
            metadata: self.metadata.clone(),
            parallel_tool_calls: self.parallel_tool_calls,
            error,
            incomplete_details: incomplete_reason.map(|reason| crate::response::IncompleteDetails {
                reason: reason.to_string(),
            }),
        }
    }

    /// Partial output for a checkpoint write or an abort: whatever has accumulated so far,
    /// regardless of whether any item has reached its terminal status.
    pub fn partial_output_items(&self) -> Vec<OutputItem> {
        self.build_output_items()
    }

    /// Builds the `incomplete` response object written when the stream is torn down by the
    /// caller's cancellation signal.
    pub fn abort_response_object(&self) -> ResponseObject {
        self.build_response_object(ResponseStatus::Incomplete, self.usage.unwrap_or_default(), StopReason::Cancelled, None, Some("interrupted"))
    }

    pub fn response_id(&self) -> &str {
        &self.response_id
    }
}

#[cfg(test)]
mod tests {
    use providers::Usage as ProviderUsage;

    use super::*;

    fn projector() -> StreamProjector {
        StreamProjector::new(
            "resp_test".to_string(),
            "claude-sonnet-4-responses".to_string(),
            1_700_000_000,
            HashMap::new(),
            None,
        )
    }

    fn event_types(events: &[SseEvent]) -> Vec<&'static str> {
        events.iter().map(SseEvent::event_name).collect()
    }

    /// S1 — text-only streaming response.
    #[test]
    fn text_only_stream_projects_expected_sequence() {
        let mut p = projector();
        let mut all = vec![p.open()];

        all.extend(p.process(ProviderEvent::ContentStart {
            content_id: "0".to_string(),
            kind: ContentKind::Text,
            name: None,
        }));
        all.extend(p.process(ProviderEvent::TextDelta {
            content_id: "0".to_string(),
            delta: "Hello".to_string(),
        }));
        all.extend(p.process(ProviderEvent::TextDelta {
            content_id: "0".to_string(),
            delta: " world".to_string(),
        }));
        all.extend(p.process(ProviderEvent::ContentDone {
            content_id: "0".to_string(),
            final_content: None,
        }));
        all.extend(p.process(ProviderEvent::MessageDone {
            stop_reason: StopReason::EndTurn,
            usage: ProviderUsage {
                input_tokens: 10,
                output_tokens: 5,
            },
        }));

        assert_eq!(
            event_types(&all),
            vec![
                "response.in_progress",
                "response.output_item.added",
                "response.content_part.added",
                "response.output_text.delta",
                "response.output_text.delta",
                "response.output_text.done",
                "response.content_part.done",
                "response.output_item.done",
                "response.completed",
            ]
        );

        // Invariant 1: sequence numbers strictly increasing starting at 1.
        let sequences: Vec<u64> = all
            .iter()
            .map(|e| match e {
                SseEvent::ResponseInProgress { sequence_number, .. }
                | SseEvent::OutputItemAdded { sequence_number, .. }
                | SseEvent::ContentPartAdded { sequence_number, .. }
                | SseEvent::OutputTextDelta { sequence_number, .. }
                | SseEvent::OutputTextDone { sequence_number, .. }
                | SseEvent::ContentPartDone { sequence_number, .. }
                | SseEvent::OutputItemDone { sequence_number, .. }
                | SseEvent::ResponseCompleted { sequence_number, .. }
                | SseEvent::ResponseFailed { sequence_number, .. } => *sequence_number,
                SseEvent::Error { .. } => 0,
            })
            .collect();
        assert_eq!(sequences[0], 1);
        assert!(sequences.windows(2).all(|w| w[0] < w[1]));

        if let SseEvent::ResponseCompleted { response, .. } = all.last().unwrap() {
            assert_eq!(response.usage.unwrap().total_tokens, 15);
            assert_eq!(response.output.len(), 1);
        } else {
            panic!("expected response.completed");
        }
    }

    /// S2 — pure tool call, no message item opened.
    #[test]
    fn pure_tool_call_opens_no_message_item() {
        let mut p = projector();
        let mut all = vec![p.open()];

        all.extend(p.process(ProviderEvent::ContentStart {
            content_id: "call_abc".to_string(),
            kind: ContentKind::ToolCall,
            name: Some("get_weather".to_string()),
        }));
        all.extend(p.process(ProviderEvent::ToolArgumentsDelta {
            content_id: "call_abc".to_string(),
            delta: "{\"city\":\"NYC\"}".to_string(),
        }));
        all.extend(p.process(ProviderEvent::ContentDone {
            content_id: "call_abc".to_string(),
            final_content: None,
        }));
        all.extend(p.process(ProviderEvent::MessageDone {
            stop_reason: StopReason::ToolUse,
            usage: ProviderUsage::default(),
        }));

        assert_eq!(
            event_types(&all),
            vec![
                "response.in_progress",
                "response.output_item.added",
                "response.output_item.done",
                "response.completed",
            ]
        );

        match &all[1] {
            SseEvent::OutputItemAdded { output_index, item, .. } => {
                assert_eq!(*output_index, 0);
                assert!(matches!(item, OutputItem::FunctionCall { .. }));
            }
            other => panic!("unexpected: {other:?}"),
        }

        match &all[2] {
            SseEvent::OutputItemDone { item, .. } => match item {
                OutputItem::FunctionCall { arguments, status, .. } => {
                    assert_eq!(arguments, "{\"city\":\"NYC\"}");
                    assert_eq!(*status, ItemStatus::Completed);
                }
                other => panic!("unexpected: {other:?}"),
            },
            other => panic!("unexpected: {other:?}"),
        }
    }

    /// S3 — mixed text then tool call; message at index 0, function_call at index 1.
    #[test]
    fn mixed_text_then_tool_call_assigns_indices_in_arrival_order() {
        let mut p = projector();
        let mut all = vec![p.open()];

        all.extend(p.process(ProviderEvent::ContentStart {
            content_id: "0".to_string(),
            kind: ContentKind::Text,
            name: None,
        }));
        all.extend(p.process(ProviderEvent::TextDelta {
            content_id: "0".to_string(),
            delta: "Sure, checking".to_string(),
        }));
        all.extend(p.process(ProviderEvent::ContentDone {
            content_id: "0".to_string(),
            final_content: None,
        }));
        all.extend(p.process(ProviderEvent::ContentStart {
            content_id: "call_abc".to_string(),
            kind: ContentKind::ToolCall,
            name: Some("get_weather".to_string()),
        }));
        all.extend(p.process(ProviderEvent::ContentDone {
            content_id: "call_abc".to_string(),
            final_content: Some("{}".to_string()),
        }));
        all.extend(p.process(ProviderEvent::MessageDone {
            stop_reason: StopReason::ToolUse,
            usage: ProviderUsage::default(),
        }));

        let SseEvent::ResponseCompleted { response, .. } = all.last().unwrap() else {
            panic!("expected response.completed");
        };
        assert_eq!(response.output.len(), 2);
        match &response.output[0] {
            OutputItem::Message { .. } => {}
            other => panic!("expected message at index 0: {other:?}"),
        }
        match &response.output[1] {
            OutputItem::FunctionCall { .. } => {}
            other => panic!("expected function_call at index 1: {other:?}"),
        }
    }

    /// Invariant 7: no text_delta ever arrives -> no message-shaped events at all.
    #[test]
    fn no_text_delta_means_no_message_events() {
        let mut p = projector();
        let mut all = vec![p.open()];

        all.extend(p.process(ProviderEvent::ContentStart {
            content_id: "call_abc".to_string(),
            kind: ContentKind::ToolCall,
            name: Some("noop".to_string()),
        }));
        all.extend(p.process(ProviderEvent::ContentDone {
            content_id: "call_abc".to_string(),
            final_content: Some("{}".to_string()),
        }));
        all.extend(p.process(ProviderEvent::MessageDone {
            stop_reason: StopReason::ToolUse,
            usage: ProviderUsage::default(),
        }));

        assert!(
            !event_types(&all)
                .iter()
                .any(|t| t.starts_with("response.output_text") || t.starts_with("response.content_part"))
        );
    }

    /// Open question: an opened text item whose only delta was empty still gets a "done" event
    /// carrying empty text (the orchestrator filters the wire delta, not the open/close pair).
    #[test]
    fn empty_delta_still_opens_and_closes_the_message_item() {
        let mut p = projector();
        let mut all = vec![p.open()];

        all.extend(p.process(ProviderEvent::ContentStart {
            content_id: "0".to_string(),
            kind: ContentKind::Text,
            name: None,
        }));
        all.extend(p.process(ProviderEvent::TextDelta {
            content_id: "0".to_string(),
            delta: String::new(),
        }));
        all.extend(p.process(ProviderEvent::ContentDone {
            content_id: "0".to_string(),
            final_content: None,
        }));

        let types = event_types(&all);
        assert!(types.contains(&"response.output_item.added"));
        assert!(!types.contains(&"response.output_text.delta"));

        all.extend(p.process(ProviderEvent::MessageDone {
            stop_reason: StopReason::EndTurn,
            usage: ProviderUsage::default(),
        }));

        assert!(event_types(&all).contains(&"response.output_text.done"));
    }

    #[test]
    fn event_name_matches_serialized_type_field() {
        let mut p = projector();
        for event in [p.open()] {
            let value: serde_json::Value = serde_json::from_str(&serde_json::to_string(&event).unwrap()).unwrap();
            assert_eq!(value["type"].as_str().unwrap(), event.event_name());
        }
    }
}
