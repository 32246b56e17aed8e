//! The `text.format` trick: neither the Anthropic Messages API nor vanilla OpenAI-compatible
//! chat-completions have a uniform structured-output mechanism, so `json_object`/`json_schema`
//! requests are implemented as a synthetic, forced tool call instead. The orchestrator passes
//! `text_format` through without knowing this; only the adapters (and this shared helper) know
//! the trick.

use futures::{StreamExt, stream::BoxStream};

use crate::{
    Result,
    types::{ContentKind, ProviderContent, ProviderEvent, ProviderRequest, ProviderResult, TextFormat, ToolChoice, ToolDefinition},
};

/// Name of the synthetic tool. Chosen to be unlikely to collide with a caller-supplied tool.
pub const JSON_RESPONSE_TOOL_NAME: &str = "__json_response__";

/// Mutates `request` to add the synthetic tool and force tool choice onto it, if `text_format`
/// calls for structured output. A no-op for `TextFormat::Text` or no format at all.
pub fn inject(request: &mut ProviderRequest) {
    let schema = match &request.text_format {
        None | Some(TextFormat::Text) => return,
        Some(TextFormat::JsonObject) => serde_json::json!({ "type": "object" }),
        Some(TextFormat::JsonSchema { schema, .. }) => schema.clone(),
    };

    request.tools.push(ToolDefinition {
        name: JSON_RESPONSE_TOOL_NAME.to_string(),
        description: Some("Emit the final answer matching the required JSON shape.".to_string()),
        parameters: schema,
    });
    request.tool_choice = Some(ToolChoice::Named(JSON_RESPONSE_TOOL_NAME.to_string()));
}

/// Whether `inject` would do anything for this format. Adapters check this once up front so they
/// only pay for `unwrap_result`/`rewrite_stream` when structured output was actually requested.
pub fn wants_structured_output(text_format: &Option<TextFormat>) -> bool {
    !matches!(text_format, None | Some(TextFormat::Text))
}

/// Replaces the synthetic tool call in a non-streaming result with the text it was standing in
/// for. A no-op if the model didn't call it (e.g. it errored before calling any tool).
pub fn unwrap_result(mut result: ProviderResult) -> ProviderResult {
    if let Some(pos) = result
        .content
        .iter()
        .position(|c| matches!(c, ProviderContent::ToolCall { name, .. } if name == JSON_RESPONSE_TOOL_NAME))
        && let ProviderContent::ToolCall { arguments, .. } = result.content.remove(pos)
    {
        result.content.insert(pos, ProviderContent::Text(serde_json::to_string(&arguments).unwrap_or_default()));
    }

    result
}

/// Rewrites a streamed adapter's events so the synthetic tool call is reported as ordinary text
/// content instead of a `function_call` item. Once the synthetic tool's `content_id` is seen in
/// `ContentStart`, every subsequent event for that id is translated: `ToolArgumentsDelta` becomes
/// `TextDelta`, and the `kind` reported to the caller is `Text` from the start.
pub fn rewrite_stream(stream: BoxStream<'static, Result<ProviderEvent>>) -> BoxStream<'static, Result<ProviderEvent>> {
    futures::stream::unfold((stream, None::<String>), |(mut stream, mut structured_id)| async move {
        let event = match stream.next().await? {
            Ok(event) => event,
            Err(error) => return Some((Err(error), (stream, structured_id))),
        };

        let event = match event {
            ProviderEvent::ContentStart {
                content_id,
                kind: ContentKind::ToolCall,
                name: Some(name),
            } if name == JSON_RESPONSE_TOOL_NAME => {
                structured_id = Some(content_id.clone());
                ProviderEvent::ContentStart {
                    content_id,
                    kind: ContentKind::Text,
                    name: None,
                }
            }
            ProviderEvent::ToolArgumentsDelta { content_id, delta } if structured_id.as_deref() == Some(content_id.as_str()) => {
                ProviderEvent::TextDelta { content_id, delta }
            }
            other => other,
        };

        Some((Ok(event), (stream, structured_id)))
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProviderContent;

    #[test]
    fn inject_is_noop_for_plain_text() {
        let mut request = ProviderRequest::default();
        request.text_format = Some(TextFormat::Text);
        inject(&mut request);
        assert!(request.tools.is_empty());
        assert!(request.tool_choice.is_none());
    }

    #[test]
    fn inject_adds_forced_tool_for_json_schema() {
        let mut request = ProviderRequest::default();
        request.text_format = Some(TextFormat::JsonSchema {
            name: "answer".to_string(),
            schema: serde_json::json!({"type": "object", "properties": {"x": {"type": "number"}}}),
            strict: true,
        });

        inject(&mut request);

        assert_eq!(request.tools.len(), 1);
        assert_eq!(request.tools[0].name, JSON_RESPONSE_TOOL_NAME);
        assert!(matches!(request.tool_choice, Some(ToolChoice::Named(ref n)) if n == JSON_RESPONSE_TOOL_NAME));
    }

    #[test]
    fn unwrap_result_replaces_tool_call_with_text() {
        let result = ProviderResult {
            content: vec![ProviderContent::ToolCall {
                id: "call_1".to_string(),
                name: JSON_RESPONSE_TOOL_NAME.to_string(),
                arguments: serde_json::json!({"x": 1}),
            }],
            ..Default::default()
        };

        let result = unwrap_result(result);
        match &result.content[0] {
            ProviderContent::Text(text) => assert_eq!(text, "{\"x\":1}"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn rewrite_stream_converts_synthetic_tool_call_to_text() {
        let events = vec![
            Ok(ProviderEvent::ContentStart {
                content_id: "call_1".to_string(),
                kind: ContentKind::ToolCall,
                name: Some(JSON_RESPONSE_TOOL_NAME.to_string()),
            }),
            Ok(ProviderEvent::ToolArgumentsDelta {
                content_id: "call_1".to_string(),
                delta: "{\"x\":1}".to_string(),
            }),
            Ok(ProviderEvent::ContentDone {
                content_id: "call_1".to_string(),
                final_content: None,
            }),
        ];

        let stream = futures::stream::iter(events).boxed();
        let rewritten: Vec<_> = rewrite_stream(stream).collect().await;

        assert!(matches!(
            rewritten[0].as_ref().unwrap(),
            ProviderEvent::ContentStart { kind: ContentKind::Text, name: None, .. }
        ));
        assert!(matches!(rewritten[1].as_ref().unwrap(), ProviderEvent::TextDelta { .. }));
    }
}
