//! Request rewriter: Anthropic Messages → OpenAI Chat Completions.
//!
//! Covers upstream model selection, message history conversion (including
//! the tool-call integrity repair pass), tool definition and tool_choice
//! mapping, and operator-side parameter overrides.

use std::collections::BTreeSet;

use serde_json::{Value, json};

use crate::{
    error::{Error, Result},
    messages::{anthropic, openai},
    token::{TokenCache, TokenCounter},
};

/// Prompt estimates above this route to the long-context model slot.
const LONG_CONTEXT_THRESHOLD: usize = 100_000;

/// Rejects requests that would fail upstream anyway, before any translation
/// work happens.
pub fn validate(request: &anthropic::MessagesRequest) -> Result<()> {
    if request.model.is_empty() {
        return Err(Error::InvalidRequest("model must not be empty".to_string()));
    }

    if request.messages.is_empty() {
        return Err(Error::InvalidRequest("messages must not be empty".to_string()));
    }

    if request.max_tokens == 0 {
        return Err(Error::InvalidRequest(
            "max_tokens must be a positive integer".to_string(),
        ));
    }

    if let Some(temperature) = request.temperature
        && !(0.0..=1.0).contains(&temperature)
    {
        return Err(Error::InvalidRequest(
            "temperature must be between 0.0 and 1.0".to_string(),
        ));
    }

    if let Some(top_p) = request.top_p
        && !(0.0..=1.0).contains(&top_p)
    {
        return Err(Error::InvalidRequest(
            "top_p must be between 0.0 and 1.0".to_string(),
        ));
    }

    if let Some(top_k) = request.top_k
        && top_k == 0
    {
        return Err(Error::InvalidRequest("top_k must be at least 1".to_string()));
    }

    if request.messages.iter().any(|message| message.content.is_empty()) {
        return Err(Error::InvalidRequest(
            "message content must not be empty".to_string(),
        ));
    }

    Ok(())
}

/// Translates a validated Anthropic request into the upstream OpenAI form.
///
/// The prompt-token estimate computed for model routing is stored in the
/// token cache under `request_id` so response assembly can backfill usage
/// counters the upstream omits.
pub fn rewrite(
    request: &anthropic::MessagesRequest,
    request_id: &str,
    config: &config::Config,
    cache: &TokenCache,
) -> openai::ChatCompletionRequest {
    let estimate = TokenCounter.count_request(
        &request.messages,
        request.system.as_ref(),
        request.tools.as_deref(),
    );
    cache.put(request_id, estimate as u32);

    let model = select_model(request, config, estimate);
    log::info!("Model resolved: {} -> {model}", request.model);

    let messages = convert_messages(request);

    let overrides = &config.parameter_overrides;

    if overrides.max_tokens.is_some()
        || overrides.temperature.is_some()
        || overrides.top_p.is_some()
        || overrides.top_k.is_some()
    {
        log::debug!(
            "Applying parameter overrides: max_tokens={:?}, temperature={:?}, top_p={:?}, top_k={:?}",
            overrides.max_tokens,
            overrides.temperature,
            overrides.top_p,
            overrides.top_k
        );
    }

    openai::ChatCompletionRequest {
        model,
        messages,
        max_tokens: Some(overrides.max_tokens.unwrap_or(request.max_tokens)),
        temperature: overrides.temperature.or(request.temperature),
        top_p: overrides.top_p.or(request.top_p),
        top_k: overrides.top_k.or(request.top_k),
        stream: request.stream,
        stop: request.stop_sequences.clone(),
        tools: convert_tools(request.tools.as_deref()),
        tool_choice: request.tool_choice.as_ref().map(convert_tool_choice),
    }
}

/// Resolves the upstream model from the routing slots.
///
/// A comma in the inbound model name is an escape hatch: the caller wants
/// that exact upstream model string. Without a configured default slot the
/// inbound name passes through unchanged. Unset slots fall back to the
/// resolution reached so far.
fn select_model(request: &anthropic::MessagesRequest, config: &config::Config, estimate: usize) -> String {
    let requested = &request.model;

    if requested.contains(',') {
        return requested.clone();
    }

    let Some(default) = config.models.default.clone() else {
        return requested.clone();
    };

    let mut resolved = default.clone();

    if requested.contains("haiku") {
        resolved = config.models.small.clone().unwrap_or(resolved);
    } else if requested.contains("sonnet") {
        resolved = default;
    }

    if request.thinking.as_ref().is_some_and(anthropic::Thinking::is_enabled) {
        resolved = config.models.think.clone().unwrap_or(resolved);
    }

    if estimate > LONG_CONTEXT_THRESHOLD {
        resolved = config.models.long_context.clone().unwrap_or(resolved);
    }

    resolved
}

fn convert_messages(request: &anthropic::MessagesRequest) -> Vec<openai::ChatMessage> {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);

    match &request.system {
        Some(anthropic::SystemPrompt::Text(prompt)) => {
            messages.push(system_message(prompt.clone()));
        }
        Some(anthropic::SystemPrompt::Blocks(blocks)) => {
            for block in blocks {
                messages.push(system_message(block.text.clone()));
            }
        }
        None => {}
    }

    for message in &request.messages {
        convert_message(message, &mut messages);
    }

    repair_tool_calls(messages)
}

fn system_message(prompt: String) -> openai::ChatMessage {
    openai::ChatMessage {
        role: openai::ChatRole::System,
        content: Some(openai::MessageContent::Text(prompt)),
        tool_calls: None,
        tool_call_id: None,
    }
}

fn convert_role(role: anthropic::Role) -> openai::ChatRole {
    match role {
        anthropic::Role::User => openai::ChatRole::User,
        anthropic::Role::Assistant => openai::ChatRole::Assistant,
    }
}

/// Converts one Anthropic message, appending the resulting OpenAI messages.
///
/// Block content is partitioned: text and image blocks form the main
/// message's content, `tool_use` blocks become `tool_calls` on it, and each
/// `tool_result` becomes its own `tool` message after it. Replayed thinking
/// blocks have no OpenAI counterpart; the turn itself still goes out as a
/// content-less message so the history keeps its shape. Only a message
/// reduced to nothing but its tool results emits no main message.
fn convert_message(message: &anthropic::Message, out: &mut Vec<openai::ChatMessage>) {
    let role = convert_role(message.role);

    let blocks = match &message.content {
        anthropic::MessageContent::Text(text) => {
            out.push(openai::ChatMessage {
                role,
                content: Some(openai::MessageContent::Text(text.clone())),
                tool_calls: None,
                tool_call_id: None,
            });

            return;
        }
        anthropic::MessageContent::Blocks(blocks) => blocks,
    };

    let mut parts = Vec::new();
    let mut tool_calls = Vec::new();
    let mut tool_results = Vec::new();

    for block in blocks {
        match block {
            anthropic::ContentBlock::Text { text } => {
                parts.push(openai::ContentPart::Text { text: text.clone() });
            }
            anthropic::ContentBlock::Image { source } => {
                if let Some(part) = convert_image(source) {
                    parts.push(part);
                }
            }
            anthropic::ContentBlock::ToolUse { id, name, input } => {
                tool_calls.push(openai::ToolCall {
                    id: id.clone(),
                    kind: openai::ToolCallType::Function,
                    function: openai::FunctionCall {
                        name: name.clone(),
                        arguments: serde_json::to_string(input).unwrap_or_else(|_| "{}".to_string()),
                    },
                });
            }
            anthropic::ContentBlock::ToolResult { tool_use_id, content, .. } => {
                tool_results.push((tool_use_id.clone(), tool_result_text(content.as_ref())));
            }
            anthropic::ContentBlock::Thinking { .. } => {}
        }
    }

    let content = if parts.is_empty() {
        None
    } else if parts.len() == 1
        && let openai::ContentPart::Text { text } = &parts[0]
    {
        Some(openai::MessageContent::Text(text.clone()))
    } else {
        Some(openai::MessageContent::Parts(parts))
    };

    if content.is_some() || !tool_calls.is_empty() || tool_results.is_empty() {
        out.push(openai::ChatMessage {
            role,
            content,
            tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
            tool_call_id: None,
        });
    }

    for (tool_use_id, text) in tool_results {
        out.push(openai::ChatMessage {
            role: openai::ChatRole::Tool,
            content: Some(openai::MessageContent::Text(text)),
            tool_calls: None,
            tool_call_id: Some(tool_use_id),
        });
    }
}

fn convert_image(source: &anthropic::ImageSource) -> Option<openai::ContentPart> {
    let url = match source.source_type.as_str() {
        "base64" => {
            let media_type = source.media_type.as_deref()?;
            let data = source.data.as_deref()?;

            format!("data:{media_type};base64,{data}")
        }
        "url" => source.url.clone()?,
        other => {
            log::debug!("Dropping image block with unsupported source type: {other}");
            return None;
        }
    };

    Some(openai::ContentPart::ImageUrl {
        image_url: openai::ImageUrl { url },
    })
}

fn tool_result_text(content: Option<&anthropic::ToolResultContent>) -> String {
    match content {
        None => String::new(),
        Some(anthropic::ToolResultContent::Text(text)) => text.clone(),
        Some(anthropic::ToolResultContent::Blocks(blocks)) => {
            serde_json::to_string(blocks).unwrap_or_default()
        }
    }
}

/// Drops message spans that violate the upstream tool-call pairing rules.
///
/// Clients routinely replay partial histories; forwarding an assistant
/// message whose tool calls lack their results (or a tool message without
/// its assistant) would make the upstream reject the whole request, so such
/// spans are removed wholesale and only logged.
fn repair_tool_calls(messages: Vec<openai::ChatMessage>) -> Vec<openai::ChatMessage> {
    let mut kept = Vec::with_capacity(messages.len());
    let mut i = 0;

    while i < messages.len() {
        let current = &messages[i];

        let declared: BTreeSet<&str> = match (&current.role, &current.tool_calls) {
            (openai::ChatRole::Assistant, Some(calls)) if !calls.is_empty() => {
                calls.iter().map(|call| call.id.as_str()).collect()
            }
            _ => BTreeSet::new(),
        };

        if !declared.is_empty() {
            let mut found = BTreeSet::new();
            let mut j = i + 1;

            while j < messages.len() && messages[j].role == openai::ChatRole::Tool {
                if let Some(id) = &messages[j].tool_call_id
                    && declared.contains(id.as_str())
                {
                    found.insert(id.as_str());
                }

                j += 1;
            }

            if found == declared {
                kept.extend(messages[i..j].iter().cloned());
            } else {
                log::debug!(
                    "Dropping incomplete tool call span: expected {} results, found {}",
                    declared.len(),
                    found.len()
                );
            }

            i = j;
        } else if current.role == openai::ChatRole::Tool {
            if has_declaring_assistant(&messages[..i], current.tool_call_id.as_deref()) {
                kept.push(current.clone());
            } else {
                log::debug!(
                    "Dropping tool message without a declaring assistant: {:?}",
                    current.tool_call_id
                );
            }

            i += 1;
        } else {
            kept.push(current.clone());
            i += 1;
        }
    }

    kept
}

/// Scans backward over the contiguous run of tool and assistant messages for
/// one that declared the given tool call id.
fn has_declaring_assistant(preceding: &[openai::ChatMessage], tool_call_id: Option<&str>) -> bool {
    let Some(tool_call_id) = tool_call_id else {
        return false;
    };

    for message in preceding.iter().rev() {
        match message.role {
            openai::ChatRole::Assistant => {
                if let Some(calls) = &message.tool_calls
                    && calls.iter().any(|call| call.id == tool_call_id)
                {
                    return true;
                }
            }
            openai::ChatRole::Tool => {}
            _ => break,
        }
    }

    false
}

fn convert_tools(tools: Option<&[anthropic::Tool]>) -> Option<Vec<openai::Tool>> {
    let tools = tools?;

    if tools.is_empty() {
        return None;
    }

    Some(
        tools
            .iter()
            .map(|tool| openai::Tool {
                kind: openai::ToolCallType::Function,
                function: openai::FunctionDefinition {
                    name: tool.name.clone(),
                    description: tool.description.clone(),
                    parameters: tool.input_schema.clone(),
                },
            })
            .collect(),
    )
}

/// Maps the Anthropic `tool_choice` onto the OpenAI vocabulary. Shapes
/// outside the mapping table are forwarded untouched.
fn convert_tool_choice(choice: &Value) -> Value {
    match choice {
        Value::String(mode) => match mode.as_str() {
            "any" => json!("required"),
            "auto" => json!("auto"),
            _ => choice.clone(),
        },
        Value::Object(object) if object.get("type").and_then(Value::as_str) == Some("tool") => {
            match object.get("name").and_then(Value::as_str) {
                Some(name) if !name.is_empty() => {
                    json!({"type": "function", "function": {"name": name}})
                }
                _ => choice.clone(),
            }
        }
        _ => choice.clone(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::messages::anthropic::MessagesRequest;

    fn routing_config() -> config::Config {
        serde_json::from_value(json!({
            "models": {
                "default": "gpt-4o",
                "small": "gpt-4o-mini",
                "think": "o1",
                "long_context": "gpt-4o-long"
            }
        }))
        .unwrap()
    }

    fn request(value: Value) -> MessagesRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn minimal_request_maps_to_default_slot() {
        let request = request(json!({
            "model": "claude-3-5-sonnet-20241022",
            "max_tokens": 100,
            "messages": [{"role": "user", "content": "hi"}]
        }));
        let cache = TokenCache::new(16);

        let mut upstream = rewrite(&request, "req-1", &routing_config(), &cache);
        upstream.stream = Some(false);

        assert_eq!(
            serde_json::to_value(&upstream).unwrap(),
            json!({
                "model": "gpt-4o",
                "messages": [{"role": "user", "content": "hi"}],
                "max_tokens": 100,
                "stream": false
            })
        );

        assert!(cache.get("req-1", false).is_some());
    }

    #[test]
    fn identical_string_content_passes_through() {
        let request = request(json!({
            "model": "claude-3-5-haiku-20241022",
            "max_tokens": 10,
            "messages": [{"role": "user", "content": "exactly this string"}]
        }));
        let cache = TokenCache::new(16);

        let upstream = rewrite(&request, "req-1", &routing_config(), &cache);

        let Some(openai::MessageContent::Text(text)) = &upstream.messages[0].content else {
            unreachable!("expected string content");
        };
        assert_eq!(text, "exactly this string");
        assert_eq!(upstream.model, "gpt-4o-mini");
    }

    #[test]
    fn comma_in_model_bypasses_routing() {
        let request = request(json!({
            "model": "meta-llama/llama-3,raw",
            "max_tokens": 10,
            "messages": [{"role": "user", "content": "hi"}]
        }));
        let cache = TokenCache::new(16);

        let upstream = rewrite(&request, "req-1", &routing_config(), &cache);
        assert_eq!(upstream.model, "meta-llama/llama-3,raw");
    }

    #[test]
    fn unset_default_slot_passes_model_through() {
        let request = request(json!({
            "model": "claude-3-5-sonnet-20241022",
            "max_tokens": 10,
            "messages": [{"role": "user", "content": "hi"}]
        }));
        let cache = TokenCache::new(16);

        let upstream = rewrite(&request, "req-1", &config::Config::default(), &cache);
        assert_eq!(upstream.model, "claude-3-5-sonnet-20241022");
    }

    #[test]
    fn thinking_routes_to_think_slot() {
        let request = request(json!({
            "model": "claude-3-5-sonnet-20241022",
            "max_tokens": 10,
            "thinking": {"type": "enabled"},
            "messages": [{"role": "user", "content": "hi"}]
        }));
        let cache = TokenCache::new(16);

        let upstream = rewrite(&request, "req-1", &routing_config(), &cache);
        assert_eq!(upstream.model, "o1");
    }

    #[test]
    fn long_context_overrides_other_slots() {
        let request = request(json!({
            "model": "claude-3-5-haiku-20241022",
            "max_tokens": 10,
            "messages": [{"role": "user", "content": "word ".repeat(120_000)}]
        }));
        let cache = TokenCache::new(16);

        let upstream = rewrite(&request, "req-1", &routing_config(), &cache);
        assert_eq!(upstream.model, "gpt-4o-long");
    }

    #[test]
    fn system_prompt_forms() {
        let cache = TokenCache::new(16);

        let string_form = request(json!({
            "model": "claude-3-5-sonnet-20241022",
            "max_tokens": 10,
            "system": "Be terse.",
            "messages": [{"role": "user", "content": "hi"}]
        }));

        let upstream = rewrite(&string_form, "req-1", &routing_config(), &cache);
        assert_eq!(upstream.messages[0].role, openai::ChatRole::System);
        assert_eq!(upstream.messages.len(), 2);

        let block_form = request(json!({
            "model": "claude-3-5-sonnet-20241022",
            "max_tokens": 10,
            "system": [
                {"type": "text", "text": "Be terse."},
                {"type": "text", "text": "Answer in French."}
            ],
            "messages": [{"role": "user", "content": "hi"}]
        }));

        let upstream = rewrite(&block_form, "req-2", &routing_config(), &cache);
        assert_eq!(upstream.messages.len(), 3);
        assert_eq!(upstream.messages[1].role, openai::ChatRole::System);
    }

    #[test]
    fn tool_use_and_result_become_paired_messages() {
        let request = request(json!({
            "model": "claude-3-5-sonnet-20241022",
            "max_tokens": 10,
            "messages": [
                {"role": "assistant", "content": [
                    {"type": "tool_use", "id": "t1", "name": "f", "input": {}}
                ]},
                {"role": "user", "content": [
                    {"type": "tool_result", "tool_use_id": "t1", "content": "ok"}
                ]},
                {"role": "user", "content": "thanks"}
            ]
        }));
        let cache = TokenCache::new(16);

        let upstream = rewrite(&request, "req-1", &routing_config(), &cache);

        assert_eq!(upstream.messages.len(), 3);

        let assistant = &upstream.messages[0];
        assert_eq!(assistant.role, openai::ChatRole::Assistant);
        assert!(assistant.content.is_none());
        let calls = assistant.tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].id, "t1");
        assert_eq!(calls[0].function.name, "f");
        assert_eq!(calls[0].function.arguments, "{}");

        let tool = &upstream.messages[1];
        assert_eq!(tool.role, openai::ChatRole::Tool);
        assert_eq!(tool.tool_call_id.as_deref(), Some("t1"));
        let Some(openai::MessageContent::Text(text)) = &tool.content else {
            unreachable!("expected string content");
        };
        assert_eq!(text, "ok");
    }

    #[test]
    fn orphaned_tool_calls_are_dropped_wholesale() {
        let request = request(json!({
            "model": "claude-3-5-sonnet-20241022",
            "max_tokens": 10,
            "messages": [
                {"role": "assistant", "content": [
                    {"type": "text", "text": "calling"},
                    {"type": "tool_use", "id": "t1", "name": "f", "input": {}}
                ]},
                {"role": "user", "content": "no result here"}
            ]
        }));
        let cache = TokenCache::new(16);

        let upstream = rewrite(&request, "req-1", &routing_config(), &cache);

        assert_eq!(upstream.messages.len(), 1);
        assert_eq!(upstream.messages[0].role, openai::ChatRole::User);
    }

    #[test]
    fn partial_tool_results_drop_the_whole_span() {
        let request = request(json!({
            "model": "claude-3-5-sonnet-20241022",
            "max_tokens": 10,
            "messages": [
                {"role": "assistant", "content": [
                    {"type": "tool_use", "id": "t1", "name": "f", "input": {}},
                    {"type": "tool_use", "id": "t2", "name": "g", "input": {}}
                ]},
                {"role": "user", "content": [
                    {"type": "tool_result", "tool_use_id": "t1", "content": "ok"}
                ]},
                {"role": "user", "content": "continue"}
            ]
        }));
        let cache = TokenCache::new(16);

        let upstream = rewrite(&request, "req-1", &routing_config(), &cache);

        assert_eq!(upstream.messages.len(), 1);
        assert_eq!(upstream.messages[0].role, openai::ChatRole::User);
    }

    #[test]
    fn bare_tool_message_without_assistant_is_dropped() {
        let request = request(json!({
            "model": "claude-3-5-sonnet-20241022",
            "max_tokens": 10,
            "messages": [
                {"role": "user", "content": [
                    {"type": "tool_result", "tool_use_id": "ghost", "content": "ok"}
                ]},
                {"role": "user", "content": "hello"}
            ]
        }));
        let cache = TokenCache::new(16);

        let upstream = rewrite(&request, "req-1", &routing_config(), &cache);

        assert_eq!(upstream.messages.len(), 1);
        let Some(openai::MessageContent::Text(text)) = &upstream.messages[0].content else {
            unreachable!("expected string content");
        };
        assert_eq!(text, "hello");
    }

    #[test]
    fn mixed_text_and_tool_use_keeps_text_as_content() {
        let request = request(json!({
            "model": "claude-3-5-sonnet-20241022",
            "max_tokens": 10,
            "messages": [
                {"role": "assistant", "content": [
                    {"type": "text", "text": "Let me check."},
                    {"type": "tool_use", "id": "t1", "name": "f", "input": {"q": 1}}
                ]},
                {"role": "user", "content": [
                    {"type": "tool_result", "tool_use_id": "t1", "content": [{"type": "text", "text": "ok"}]}
                ]}
            ]
        }));
        let cache = TokenCache::new(16);

        let upstream = rewrite(&request, "req-1", &routing_config(), &cache);

        let assistant = &upstream.messages[0];
        let Some(openai::MessageContent::Text(text)) = &assistant.content else {
            unreachable!("expected string content");
        };
        assert_eq!(text, "Let me check.");
        assert_eq!(
            assistant.tool_calls.as_ref().unwrap()[0].function.arguments,
            "{\"q\":1}"
        );

        let tool = &upstream.messages[1];
        let Some(openai::MessageContent::Text(text)) = &tool.content else {
            unreachable!("expected string content");
        };
        assert_eq!(text, "[{\"type\":\"text\",\"text\":\"ok\"}]");
    }

    #[test]
    fn thinking_only_turn_keeps_a_content_less_message() {
        let request = request(json!({
            "model": "claude-3-5-sonnet-20241022",
            "max_tokens": 10,
            "messages": [
                {"role": "assistant", "content": [
                    {"type": "thinking", "thinking": "mulling it over", "signature": "1"}
                ]},
                {"role": "user", "content": "go on"}
            ]
        }));
        let cache = TokenCache::new(16);

        let upstream = rewrite(&request, "req-1", &routing_config(), &cache);

        // The thinking block itself has no OpenAI counterpart, but the turn
        // survives so the role alternation stays intact.
        assert_eq!(upstream.messages.len(), 2);
        assert_eq!(upstream.messages[0].role, openai::ChatRole::Assistant);
        assert!(upstream.messages[0].content.is_none());
        assert!(upstream.messages[0].tool_calls.is_none());
        assert_eq!(upstream.messages[1].role, openai::ChatRole::User);
    }

    #[test]
    fn image_blocks_become_image_url_parts() {
        let request = request(json!({
            "model": "claude-3-5-sonnet-20241022",
            "max_tokens": 10,
            "messages": [{"role": "user", "content": [
                {"type": "text", "text": "what is this?"},
                {"type": "image", "source": {"type": "base64", "media_type": "image/png", "data": "aGk="}}
            ]}]
        }));
        let cache = TokenCache::new(16);

        let upstream = rewrite(&request, "req-1", &routing_config(), &cache);

        let Some(openai::MessageContent::Parts(parts)) = &upstream.messages[0].content else {
            unreachable!("expected multi-part content");
        };
        assert_eq!(parts.len(), 2);

        let openai::ContentPart::ImageUrl { image_url } = &parts[1] else {
            unreachable!("expected image part");
        };
        assert_eq!(image_url.url, "data:image/png;base64,aGk=");
    }

    #[test]
    fn tool_definitions_and_choice_are_mapped() {
        let request = request(json!({
            "model": "claude-3-5-sonnet-20241022",
            "max_tokens": 10,
            "messages": [{"role": "user", "content": "hi"}],
            "tools": [{
                "name": "get_weather",
                "description": "Get the weather",
                "input_schema": {"type": "object"}
            }],
            "tool_choice": {"type": "tool", "name": "get_weather"}
        }));
        let cache = TokenCache::new(16);

        let upstream = rewrite(&request, "req-1", &routing_config(), &cache);

        let tool = &upstream.tools.as_ref().unwrap()[0];
        assert_eq!(tool.function.name, "get_weather");
        assert_eq!(tool.function.parameters, Some(json!({"type": "object"})));

        assert_eq!(
            upstream.tool_choice,
            Some(json!({"type": "function", "function": {"name": "get_weather"}}))
        );
    }

    #[test]
    fn tool_choice_string_mapping() {
        assert_eq!(convert_tool_choice(&json!("any")), json!("required"));
        assert_eq!(convert_tool_choice(&json!("auto")), json!("auto"));
        assert_eq!(convert_tool_choice(&json!("none")), json!("none"));
        assert_eq!(
            convert_tool_choice(&json!({"type": "auto"})),
            json!({"type": "auto"})
        );
    }

    #[test]
    fn overrides_replace_client_values_per_parameter() {
        let request = request(json!({
            "model": "claude-3-5-sonnet-20241022",
            "max_tokens": 100,
            "temperature": 0.3,
            "top_p": 0.5,
            "messages": [{"role": "user", "content": "hi"}]
        }));
        let cache = TokenCache::new(16);

        let mut config = routing_config();
        config.parameter_overrides.temperature = Some(0.9);
        config.parameter_overrides.top_k = Some(40);

        let upstream = rewrite(&request, "req-1", &config, &cache);

        assert_eq!(upstream.max_tokens, Some(100));
        assert_eq!(upstream.temperature, Some(0.9));
        assert_eq!(upstream.top_p, Some(0.5));
        assert_eq!(upstream.top_k, Some(40));
    }

    #[test]
    fn validation_rejects_bad_requests() {
        let no_messages = request(json!({
            "model": "claude-3-5-sonnet-20241022",
            "max_tokens": 10,
            "messages": []
        }));
        assert!(matches!(validate(&no_messages), Err(Error::InvalidRequest(_))));

        let zero_max_tokens = request(json!({
            "model": "claude-3-5-sonnet-20241022",
            "max_tokens": 0,
            "messages": [{"role": "user", "content": "hi"}]
        }));
        assert!(matches!(validate(&zero_max_tokens), Err(Error::InvalidRequest(_))));

        let bad_temperature = request(json!({
            "model": "claude-3-5-sonnet-20241022",
            "max_tokens": 10,
            "temperature": 1.5,
            "messages": [{"role": "user", "content": "hi"}]
        }));
        assert!(matches!(validate(&bad_temperature), Err(Error::InvalidRequest(_))));

        let empty_content = request(json!({
            "model": "claude-3-5-sonnet-20241022",
            "max_tokens": 10,
            "messages": [{"role": "user", "content": []}]
        }));
        assert!(matches!(validate(&empty_content), Err(Error::InvalidRequest(_))));

        let valid = request(json!({
            "model": "claude-3-5-sonnet-20241022",
            "max_tokens": 10,
            "temperature": 1.0,
            "top_k": 1,
            "messages": [{"role": "user", "content": "hi"}]
        }));
        assert!(validate(&valid).is_ok());
    }
}
