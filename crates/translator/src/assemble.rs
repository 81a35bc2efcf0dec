//! Non-streaming response assembler: OpenAI Chat Completion → Anthropic
//! Messages response.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Value, json};

use crate::{
    error::{Error, Result},
    messages::{anthropic, openai},
    token::{TokenCache, TokenCounter},
};

fn think_span() -> &'static Regex {
    static THINK_SPAN: OnceLock<Regex> = OnceLock::new();

    THINK_SPAN.get_or_init(|| {
        Regex::new(r"(?s)<think(?:ing)?>(.*?)</think(?:ing)?>").expect("static pattern is valid")
    })
}

/// Rebuilds an Anthropic response from the first upstream choice.
///
/// `original_model` is the model string the client asked for; it is echoed
/// back so clients never see the upstream routing. Usage counters the
/// upstream omits are backfilled from the token cache (prompt side, entry
/// consumed) and the estimator (completion side).
pub fn assemble(
    response: openai::ChatCompletionResponse,
    original_model: Option<&str>,
    request_id: &str,
    cache: &TokenCache,
) -> Result<anthropic::MessagesResponse> {
    let Some(choice) = response.choices.into_iter().next() else {
        return Err(Error::InvalidUpstream(
            "upstream response has no choices".to_string(),
        ));
    };

    let content = extract_content_blocks(&choice.message);

    let usage = convert_usage(response.usage, request_id, &content, cache);

    let model = match original_model {
        Some(model) if !model.is_empty() => model.to_string(),
        _ => response.model,
    };

    Ok(anthropic::MessagesResponse {
        id: response.id,
        kind: "message".to_string(),
        role: anthropic::Role::Assistant,
        content,
        model,
        stop_reason: Some(map_finish_reason(choice.finish_reason)),
        stop_sequence: None,
        usage,
    })
}

/// Content blocks in document order: reasoning first, then text with inline
/// `<think>` spans separated out, then tool calls. An upstream message with
/// nothing usable yields a single empty text block.
fn extract_content_blocks(message: &openai::ResponseMessage) -> Vec<anthropic::ResponseContent> {
    let mut blocks = Vec::new();

    if let Some(reasoning) = &message.reasoning_content
        && !reasoning.trim().is_empty()
    {
        blocks.push(anthropic::ResponseContent::Thinking {
            thinking: reasoning.trim().to_string(),
            signature: Some(unix_ms().to_string()),
        });
    }

    if let Some(content) = &message.content
        && !content.trim().is_empty()
    {
        if let Some(captures) = think_span().captures(content) {
            if blocks.is_empty() {
                let thinking = captures
                    .get(1)
                    .map(|span| span.as_str().trim())
                    .unwrap_or_default();

                if !thinking.is_empty() {
                    blocks.push(anthropic::ResponseContent::Thinking {
                        thinking: thinking.to_string(),
                        signature: Some(unix_ms().to_string()),
                    });
                }
            }

            let clean = think_span().replace_all(content, "");
            let clean = clean.trim();

            if !clean.is_empty() {
                blocks.push(anthropic::ResponseContent::Text {
                    text: clean.to_string(),
                });
            }
        } else {
            blocks.push(anthropic::ResponseContent::Text {
                text: content.trim().to_string(),
            });
        }
    }

    if let Some(tool_calls) = &message.tool_calls {
        for tool_call in tool_calls {
            blocks.push(anthropic::ResponseContent::ToolUse {
                id: tool_call.id.clone(),
                name: tool_call.function.name.clone(),
                input: parse_tool_arguments(&tool_call.function.arguments),
            });
        }
    }

    if blocks.is_empty() {
        blocks.push(anthropic::ResponseContent::Text { text: String::new() });
    }

    blocks
}

/// Parses tool-call arguments defensively. Some upstreams emit single-quoted
/// pseudo-JSON; a quote swap recovers most of those. Anything still broken
/// degrades to an empty object.
pub(crate) fn parse_tool_arguments(arguments: &str) -> Value {
    if arguments.is_empty() {
        return json!({});
    }

    match serde_json::from_str(arguments) {
        Ok(value) => value,
        Err(_) => {
            let corrected = arguments.replace('\'', "\"");

            serde_json::from_str(&corrected).unwrap_or_else(|error| {
                log::warn!(
                    "Failed to parse tool call arguments, falling back to empty input: {error}"
                );
                json!({})
            })
        }
    }
}

fn map_finish_reason(reason: Option<openai::FinishReason>) -> anthropic::StopReason {
    match reason {
        Some(openai::FinishReason::Stop) => anthropic::StopReason::EndTurn,
        Some(openai::FinishReason::Length) => anthropic::StopReason::MaxTokens,
        Some(openai::FinishReason::ContentFilter) => anthropic::StopReason::ContentFilter,
        Some(openai::FinishReason::ToolCalls) | Some(openai::FinishReason::FunctionCall) => {
            anthropic::StopReason::ToolUse
        }
        Some(openai::FinishReason::Other) | None => anthropic::StopReason::EndTurn,
    }
}

fn convert_usage(
    usage: Option<openai::Usage>,
    request_id: &str,
    blocks: &[anthropic::ResponseContent],
    cache: &TokenCache,
) -> anthropic::Usage {
    let usage = usage.unwrap_or_default();

    let mut input_tokens = usage.prompt_tokens;

    if input_tokens == 0
        && let Some(cached) = cache.get(request_id, true)
    {
        input_tokens = cached;
    }

    let mut output_tokens = usage.completion_tokens;

    if output_tokens == 0 {
        output_tokens = TokenCounter.count_response(blocks) as u32;
    }

    anthropic::Usage::new(input_tokens, output_tokens)
}

pub(crate) fn unix_ms() -> i64 {
    jiff::Timestamp::now().as_millisecond()
}
