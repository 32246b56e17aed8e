//! Assembles a provider-ready conversation from a [`Request`] plus, when `previous_response_id`
//! is set, a stored prior response.

use std::sync::Arc;

use providers::{ProviderContentPart, ProviderMessage, ProviderRole, ToolDefinition};

use crate::{
    error::OrchestratorError,
    request::{ContentPart, InputItem, Input, MessageContent, MessageRole, Request, UNIMPLEMENTED_TOOL_TYPES},
    store::StoreProvider,
};

/// Output of assembling a conversation: the messages and system prompt ready to hand to a
/// [`providers::ProviderRequest`], plus the full normalized input item list the orchestrator
/// persists verbatim as `input_items`.
pub struct AssembledConversation {
    pub messages: Vec<ProviderMessage>,
    pub system: Option<String>,
    pub input_items: Vec<InputItem>,
    pub tools: Vec<ToolDefinition>,
}

/// Builds the normalized conversation for a request, replaying a prior response's stored items
/// first when `previous_response_id` is set.
pub async fn assemble(
    request: &Request,
    store: Option<&Arc<dyn StoreProvider>>,
) -> Result<AssembledConversation, OrchestratorError> {
    let mut items = Vec::new();

    if let Some(previous_id) = &request.previous_response_id {
        let provider = store.ok_or_else(|| {
            OrchestratorError::InvalidRequest("previous_response_id requires a configured store".to_string())
        })?;

        let store = provider
            .get_or_connect()
            .await
            .map_err(|e| OrchestratorError::ServerError(e.to_string()))?;

        let previous = store
            .get(previous_id)
            .await
            .map_err(|e| OrchestratorError::ServerError(e.to_string()))?
            .ok_or_else(|| OrchestratorError::NotFound(format!("no response found with id `{previous_id}`")))?;

        if !previous.store {
            return Err(OrchestratorError::InvalidRequest(format!(
                "response `{previous_id}` was created with store=false and cannot be continued"
            )));
        }

        items.extend(previous.input_items);
        items.extend(previous.output_items.iter().cloned().map(output_item_to_input_item));
    }

    let known_ids: std::collections::HashSet<&str> = items.iter().filter_map(input_item_id).collect();

    match &request.input {
        Input::Text(text) => items.push(InputItem::Message {
            role: MessageRole::User,
            content: MessageContent::Text(text.clone()),
        }),
        Input::Items(new_items) => {
            for item in new_items {
                match item {
                    InputItem::ItemReference { id } => {
                        if !known_ids.contains(id.as_str()) {
                            continue;
                        }
                    }
                    other => items.push(other.clone()),
                }
            }
        }
    }

    reject_unimplemented_tools(request)?;

    let (messages, system) = translate_items(&items, request.instructions.as_deref());

    let tools = request
        .tools
        .iter()
        .filter(|t| t.kind == "function")
        .filter_map(|t| {
            Some(ToolDefinition {
                name: t.name.clone()?,
                description: t.description.clone(),
                parameters: t.parameters.clone().unwrap_or(serde_json::json!({})),
            })
        })
        .collect();

    Ok(AssembledConversation {
        messages,
        system,
        input_items: items,
        tools,
    })
}

fn reject_unimplemented_tools(request: &Request) -> Result<(), OrchestratorError> {
    for tool in &request.tools {
        if UNIMPLEMENTED_TOOL_TYPES.contains(&tool.kind.as_str()) {
            return Err(OrchestratorError::NotImplemented(format!(
                "built-in tool `{}` is not implemented",
                tool.kind
            )));
        }
    }

    Ok(())
}

/// `item_reference` dedup is keyed against ids already present in the seed (stored input/output
/// items); only `function_call`/`function_call_output` carry a stable id usable for that lookup.
fn input_item_id(item: &InputItem) -> Option<&str> {
    match item {
        InputItem::FunctionCall { call_id, .. } => Some(call_id.as_str()),
        InputItem::FunctionCallOutput { call_id, .. } => Some(call_id.as_str()),
        _ => None,
    }
}

/// Replays a stored output item as an input item so it can be re-translated identically on
/// continuation.
fn output_item_to_input_item(item: crate::response::OutputItem) -> InputItem {
    match item {
        crate::response::OutputItem::Message { content, .. } => InputItem::Message {
            role: MessageRole::Assistant,
            content: MessageContent::Parts(
                content
                    .into_iter()
                    .map(|c| match c {
                        crate::response::OutputContent::OutputText { text, .. } => ContentPart::OutputText { text },
                    })
                    .collect(),
            ),
        },
        crate::response::OutputItem::FunctionCall {
            call_id, name, arguments, ..
        } => InputItem::FunctionCall { call_id, name, arguments },
        crate::response::OutputItem::Reasoning { .. } => {
            // Reasoning items carry no input-side representation; the spec's continuation
            // contract only replays message/function_call output.
            InputItem::Message {
                role: MessageRole::Assistant,
                content: MessageContent::Parts(Vec::new()),
            }
        }
    }
}

/// Translates the normalized item list into provider messages plus a hoisted system string, per
/// the algorithm in the component design.
fn translate_items(items: &[InputItem], instructions: Option<&str>) -> (Vec<ProviderMessage>, Option<String>) {
    let mut messages: Vec<ProviderMessage> = Vec::new();
    let mut system_parts: Vec<String> = Vec::new();

    if let Some(instructions) = instructions {
        system_parts.push(instructions.to_string());
    }

    for item in items {
        match item {
            InputItem::Message {
                role: MessageRole::System | MessageRole::Developer,
                content,
            } => {
                system_parts.push(content_text(content));
            }
            InputItem::Message { role, content } => {
                let provider_role = match role {
                    MessageRole::User => ProviderRole::User,
                    MessageRole::Assistant => ProviderRole::Assistant,
                    MessageRole::System | MessageRole::Developer => unreachable!("handled above"),
                };

                let parts = translate_content(content);
                if parts.is_empty() {
                    continue;
                }

                messages.push(ProviderMessage {
                    role: provider_role,
                    content: parts,
                });
            }
            InputItem::FunctionCall {
                call_id,
                name,
                arguments,
                ..
            } => {
                let input = serde_json::from_str(arguments).unwrap_or_else(|_| serde_json::Value::String(arguments.clone()));

                let part = ProviderContentPart::ToolUse {
                    id: call_id.clone(),
                    name: name.clone(),
                    input,
                };

                match messages.last_mut() {
                    Some(ProviderMessage {
                        role: ProviderRole::Assistant,
                        content,
                    }) => content.push(part),
                    _ => messages.push(ProviderMessage {
                        role: ProviderRole::Assistant,
                        content: vec![part],
                    }),
                }
            }
            InputItem::FunctionCallOutput { call_id, output } => {
                let part = ProviderContentPart::ToolResult {
                    tool_call_id: call_id.clone(),
                    content: output.clone(),
                    is_error: false,
                };

                let tail_already_has_tool_result = matches!(
                    messages.last(),
                    Some(ProviderMessage { role: ProviderRole::User, content })
                        if content.iter().any(|p| matches!(p, ProviderContentPart::ToolResult { .. }))
                );

                if tail_already_has_tool_result {
                    messages.last_mut().unwrap().content.push(part);
                } else {
                    messages.push(ProviderMessage {
                        role: ProviderRole::User,
                        content: vec![part],
                    });
                }
            }
            InputItem::ItemReference { .. } => {
                // Resolved (or dropped) before this pass ever runs.
            }
        }
    }

    let system = if system_parts.is_empty() {
        None
    } else {
        Some(system_parts.join("\n"))
    };

    (messages, system)
}

fn content_text(content: &MessageContent) -> String {
    match content {
        MessageContent::Text(text) => text.clone(),
        MessageContent::Parts(parts) => parts
            .iter()
            .filter_map(|part| match part {
                ContentPart::InputText { text } | ContentPart::OutputText { text } => Some(text.clone()),
                ContentPart::InputImage { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

fn translate_content(content: &MessageContent) -> Vec<ProviderContentPart> {
    match content {
        MessageContent::Text(text) => vec![ProviderContentPart::Text(text.clone())],
        MessageContent::Parts(parts) => parts
            .iter()
            .filter_map(|part| match part {
                ContentPart::InputText { text } | ContentPart::OutputText { text } => {
                    Some(ProviderContentPart::Text(text.clone()))
                }
                ContentPart::InputImage { image_url: Some(url) } => Some(translate_image(url)),
                ContentPart::InputImage { image_url: None } => None,
            })
            .collect(),
    }
}

fn translate_image(url: &str) -> ProviderContentPart {
    if let Some(rest) = url.strip_prefix("data:")
        && let Some((media_type, b64)) = rest.split_once(";base64,")
    {
        return ProviderContentPart::Image {
            base64: Some(b64.to_string()),
            media_type: Some(media_type.to_string()),
            url: None,
        };
    }

    ProviderContentPart::Image {
        base64: None,
        media_type: None,
        url: Some(url.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::ToolDefinition as RequestToolDefinition;

    fn user_text(text: &str) -> InputItem {
        InputItem::Message {
            role: MessageRole::User,
            content: MessageContent::Text(text.to_string()),
        }
    }

    #[test]
    fn system_and_developer_text_is_hoisted_and_joined() {
        let items = vec![
            InputItem::Message {
                role: MessageRole::System,
                content: MessageContent::Text("be terse".to_string()),
            },
            InputItem::Message {
                role: MessageRole::Developer,
                content: MessageContent::Text("use markdown".to_string()),
            },
            user_text("hi"),
        ];

        let (messages, system) = translate_items(&items, Some("top level"));

        assert_eq!(system.as_deref(), Some("top level\nbe terse\nuse markdown"));
        assert_eq!(messages.len(), 1);
    }

    #[test]
    fn function_call_attaches_to_trailing_assistant_message() {
        let items = vec![
            InputItem::Message {
                role: MessageRole::Assistant,
                content: MessageContent::Text("let me check".to_string()),
            },
            InputItem::FunctionCall {
                call_id: "call_1".to_string(),
                name: "get_weather".to_string(),
                arguments: "{\"city\":\"NYC\"}".to_string(),
            },
        ];

        let (messages, _) = translate_items(&items, None);

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content.len(), 2);
        assert!(matches!(messages[0].content[1], ProviderContentPart::ToolUse { .. }));
    }

    #[test]
    fn function_call_starts_new_message_without_trailing_assistant() {
        let items = vec![InputItem::FunctionCall {
            call_id: "call_1".to_string(),
            name: "get_weather".to_string(),
            arguments: "not json".to_string(),
        }];

        let (messages, _) = translate_items(&items, None);

        assert_eq!(messages.len(), 1);
        match &messages[0].content[0] {
            ProviderContentPart::ToolUse { input, .. } => {
                assert_eq!(input.as_str(), Some("not json"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn function_call_output_groups_onto_trailing_user_tool_results() {
        let items = vec![
            InputItem::FunctionCallOutput {
                call_id: "call_1".to_string(),
                output: "72F".to_string(),
            },
            InputItem::FunctionCallOutput {
                call_id: "call_2".to_string(),
                output: "sunny".to_string(),
            },
        ];

        let (messages, _) = translate_items(&items, None);

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content.len(), 2);
    }

    #[test]
    fn data_uri_image_becomes_base64_part() {
        let items = vec![InputItem::Message {
            role: MessageRole::User,
            content: MessageContent::Parts(vec![ContentPart::InputImage {
                image_url: Some("data:image/png;base64,QUJD".to_string()),
            }]),
        }];

        let (messages, _) = translate_items(&items, None);

        match &messages[0].content[0] {
            ProviderContentPart::Image { base64, media_type, url } => {
                assert_eq!(base64.as_deref(), Some("QUJD"));
                assert_eq!(media_type.as_deref(), Some("image/png"));
                assert!(url.is_none());
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn image_without_url_is_dropped() {
        let items = vec![InputItem::Message {
            role: MessageRole::User,
            content: MessageContent::Parts(vec![ContentPart::InputImage { image_url: None }]),
        }];

        let (messages, _) = translate_items(&items, None);
        assert!(messages.is_empty());
    }

    #[test]
    fn unimplemented_tool_type_is_rejected() {
        let mut request = sample_request();
        request.tools.push(RequestToolDefinition {
            kind: "code_interpreter".to_string(),
            name: None,
            description: None,
            parameters: None,
        });

        let err = reject_unimplemented_tools(&request).unwrap_err();
        assert_eq!(err.error_type(), "not_implemented");
    }

    fn sample_request() -> Request {
        Request {
            model: "claude-sonnet-4-responses".to_string(),
            input: Input::Text("hi".to_string()),
            instructions: None,
            previous_response_id: None,
            tools: Vec::new(),
            tool_choice: None,
            temperature: None,
            top_p: None,
            max_output_tokens: None,
            stream: false,
            store: true,
            background: false,
            metadata: Default::default(),
            truncation: Default::default(),
            parallel_tool_calls: None,
            text: None,
            reasoning: None,
        }
    }
}
