//! Streaming converter: OpenAI SSE chunks → Anthropic stream events.
//!
//! The converter is a state machine fed one decoded upstream chunk at a
//! time. Events are emitted as soon as their chunk is processed; nothing is
//! buffered beyond the events of the current chunk. Guarantees upheld per
//! stream: a single `message_start` before everything, dense block indices
//! with paired start/stop events, thinking blocks closed by a
//! `signature_delta`, a single `message_delta` carrying the stop reason, and
//! a terminal `message_stop` after which no further events are produced.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::pin::Pin;
use std::sync::Arc;

use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use serde_json::json;

use crate::{
    assemble::unix_ms,
    messages::{
        anthropic::{
            ContentDelta, ErrorDetail, MessageDelta, MessageStart, ResponseContent, Role,
            StopReason, StreamEvent, Usage,
        },
        openai,
    },
    token::{TokenCache, TokenCounter},
};

/// How the upstream encodes reasoning, decided on the first delta that
/// shows either signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ThinkingMode {
    /// No reasoning observed (yet).
    Inactive,
    /// Reasoning arrives inline as a `<think>…</think>` span in `content`.
    Inline,
    /// Reasoning arrives in the dedicated `reasoning_content` field.
    Reasoning,
}

#[derive(Debug)]
struct ToolCallBlock {
    id: String,
    name: String,
    arguments: String,
    synthetic: bool,
}

/// Per-stream conversion state.
#[derive(Debug)]
pub struct StreamState {
    message_id: String,
    model: String,
    request_id: String,
    cache: Arc<TokenCache>,
    started: bool,
    finished: bool,
    content_index: u32,
    block_open: bool,
    text_started: bool,
    thinking_started: bool,
    thinking_closed: bool,
    thinking_mode: ThinkingMode,
    tag_carry: String,
    tool_blocks: BTreeMap<u32, ToolCallBlock>,
    accumulated_output: String,
    total_chunks: u64,
}

impl StreamState {
    /// Fresh state for one stream. The message id is synthesized here since
    /// the upstream ids are not Anthropic-shaped.
    pub fn new(model: String, request_id: String, cache: Arc<TokenCache>) -> Self {
        Self {
            message_id: format!("msg_{}", unix_ms()),
            model,
            request_id,
            cache,
            started: false,
            finished: false,
            content_index: 0,
            block_open: false,
            text_started: false,
            thinking_started: false,
            thinking_closed: false,
            thinking_mode: ThinkingMode::Inactive,
            tag_carry: String::new(),
            tool_blocks: BTreeMap::new(),
            accumulated_output: String::new(),
            total_chunks: 0,
        }
    }

    /// Decodes and processes the payload of one `data:` line. Parse failures
    /// are logged and skipped.
    pub fn process_data(&mut self, data: &str) -> Vec<StreamEvent> {
        match serde_json::from_str::<openai::ChatCompletionChunk>(data) {
            Ok(chunk) => self.process_chunk(chunk),
            Err(error) => {
                let preview: String = data.chars().take(100).collect();
                log::error!("Failed to parse upstream stream chunk: {error}, data: {preview}");
                Vec::new()
            }
        }
    }

    /// Processes one decoded chunk. Returns the Anthropic events it
    /// produces, in emission order.
    pub fn process_chunk(&mut self, chunk: openai::ChatCompletionChunk) -> Vec<StreamEvent> {
        if self.finished {
            return Vec::new();
        }

        self.total_chunks += 1;

        let mut events = Vec::new();

        if let Some(error) = &chunk.error {
            log::error!("Upstream reported an in-band error: {error}");

            events.push(StreamEvent::Error {
                message: ErrorDetail {
                    error_type: "api_error".to_string(),
                    message: serde_json::to_string(error).unwrap_or_default(),
                },
            });

            return events;
        }

        if !self.started {
            self.started = true;

            let input_tokens = self.cache.get(&self.request_id, false).unwrap_or(0);

            events.push(StreamEvent::MessageStart {
                message: MessageStart {
                    id: self.message_id.clone(),
                    kind: "message".to_string(),
                    role: Role::Assistant,
                    content: Vec::new(),
                    model: self.model.clone(),
                    stop_reason: None,
                    stop_sequence: None,
                    usage: Usage::new(input_tokens, 0),
                },
            });
        }

        let chunk_usage = chunk.usage;

        let Some(choice) = chunk.choices.into_iter().next() else {
            return events;
        };

        let delta = choice.delta.unwrap_or_default();
        let finish_reason = choice.finish_reason;
        let usage = choice.usage.or(chunk_usage);

        let has_content = delta.content.as_deref().is_some_and(|c| !c.is_empty());
        let has_reasoning = delta.reasoning_content.as_deref().is_some_and(|c| !c.is_empty());
        let has_tool_calls = delta.tool_calls.as_ref().is_some_and(|t| !t.is_empty());

        if !has_content && !has_reasoning && !has_tool_calls && finish_reason.is_none() {
            return events;
        }

        let leftover_text = self.thinking_events(&delta, &mut events);

        if let Some(text) = leftover_text {
            self.text_events(&text, &mut events);
        }

        if let Some(tool_calls) = &delta.tool_calls {
            self.tool_events(tool_calls, &mut events);
        }

        if let Some(reason) = finish_reason {
            self.finish_events(map_finish_reason(reason), usage, &mut events);
        }

        events
    }

    /// Best-effort finalization for streams the upstream ended without a
    /// finish chunk.
    pub fn finalize_eof(&mut self) -> Vec<StreamEvent> {
        if !self.started || self.finished {
            self.finished = true;
            return Vec::new();
        }

        log::debug!("Upstream stream ended without a finish chunk, finalizing");

        let mut events = Vec::new();
        self.close_thinking(&mut events);
        self.finish_events(StopReason::EndTurn, None, &mut events);

        events
    }

    /// Terminates the stream after a transport failure, surfacing it in-band
    /// since the HTTP status line is long gone.
    pub fn transport_error(&mut self, message: String) -> Vec<StreamEvent> {
        if self.finished {
            return Vec::new();
        }

        self.finished = true;

        vec![StreamEvent::Error {
            message: ErrorDetail {
                error_type: "api_error".to_string(),
                message,
            },
        }]
    }

    /// Handles thinking detection and emission for one delta. Returns text
    /// that must continue through the regular text phase: the whole content
    /// while thinking is inactive, or the remainder behind an inline closing
    /// tag.
    fn thinking_events(&mut self, delta: &openai::ChunkDelta, events: &mut Vec<StreamEvent>) -> Option<String> {
        let content = delta.content.clone().unwrap_or_default();
        let reasoning = delta.reasoning_content.as_deref().unwrap_or_default();

        if self.thinking_mode == ThinkingMode::Inactive && !self.thinking_closed {
            if content.contains("<think>") || content.contains("<thinking>") {
                self.thinking_mode = ThinkingMode::Inline;
            } else if !reasoning.is_empty() {
                self.thinking_mode = ThinkingMode::Reasoning;
            }
        }

        match self.thinking_mode {
            ThinkingMode::Inactive => (!content.is_empty()).then_some(content),
            ThinkingMode::Reasoning => {
                if reasoning.is_empty() {
                    // The thinking phase ends with the first delta that has
                    // no reasoning; its content flows on as regular text.
                    self.close_thinking(events);

                    (!content.is_empty()).then_some(content)
                } else {
                    self.start_thinking(events);
                    self.emit_thinking(reasoning, events);

                    None
                }
            }
            ThinkingMode::Inline => {
                self.start_thinking(events);

                let mut combined = std::mem::take(&mut self.tag_carry);
                combined.push_str(&content);

                let combined = strip_opening_tags(&combined);

                if let Some((thinking, rest)) = split_at_closing_tag(&combined) {
                    if !thinking.is_empty() {
                        self.emit_thinking(thinking, events);
                    }

                    self.close_thinking(events);

                    (!rest.is_empty()).then(|| rest.to_string())
                } else {
                    let (visible, carry) = split_partial_closing_suffix(&combined);
                    self.tag_carry = carry.to_string();

                    if !visible.is_empty() {
                        self.emit_thinking(visible, events);
                    }

                    None
                }
            }
        }
    }

    fn start_thinking(&mut self, events: &mut Vec<StreamEvent>) {
        if self.thinking_started {
            return;
        }

        self.thinking_started = true;
        self.block_open = true;

        events.push(StreamEvent::ContentBlockStart {
            index: self.content_index,
            content_block: ResponseContent::Thinking {
                thinking: String::new(),
                signature: None,
            },
        });
        events.push(StreamEvent::Ping);
    }

    fn emit_thinking(&mut self, thinking: &str, events: &mut Vec<StreamEvent>) {
        self.accumulated_output.push_str(thinking);

        events.push(StreamEvent::ContentBlockDelta {
            index: self.content_index,
            delta: ContentDelta::ThinkingDelta {
                thinking: thinking.to_string(),
            },
        });
    }

    /// Terminates an open thinking block: the synthetic signature comes
    /// first, then the stop event.
    fn close_thinking(&mut self, events: &mut Vec<StreamEvent>) {
        self.thinking_mode = ThinkingMode::Inactive;

        if !self.thinking_started || self.thinking_closed {
            return;
        }

        self.thinking_closed = true;

        events.push(StreamEvent::ContentBlockDelta {
            index: self.content_index,
            delta: ContentDelta::SignatureDelta {
                signature: unix_ms().to_string(),
            },
        });
        events.push(StreamEvent::ContentBlockStop {
            index: self.content_index,
        });

        self.content_index += 1;
        self.block_open = false;
    }

    fn text_events(&mut self, text: &str, events: &mut Vec<StreamEvent>) {
        if text.is_empty() {
            return;
        }

        if !self.text_started {
            self.text_started = true;
            self.block_open = true;

            events.push(StreamEvent::ContentBlockStart {
                index: self.content_index,
                content_block: ResponseContent::Text { text: String::new() },
            });
            events.push(StreamEvent::Ping);
        }

        self.accumulated_output.push_str(text);

        events.push(StreamEvent::ContentBlockDelta {
            index: self.content_index,
            delta: ContentDelta::TextDelta {
                text: text.to_string(),
            },
        });
    }

    fn tool_events(&mut self, tool_calls: &[openai::ToolCallDelta], events: &mut Vec<StreamEvent>) {
        let mut processed: BTreeSet<u32> = BTreeSet::new();

        for tool_call in tool_calls {
            let index = tool_call.index.unwrap_or(0);

            if !processed.insert(index) {
                continue;
            }

            let upstream_name = tool_call
                .function
                .as_ref()
                .and_then(|function| function.name.clone())
                .filter(|name| !name.is_empty());
            let upstream_id = tool_call.id.clone().filter(|id| !id.is_empty());

            if !self.tool_blocks.contains_key(&index) {
                // Block index as the client sees it; it decides whether a
                // previous block needs closing first.
                let block_index = self.tool_blocks.len() as u32 + u32::from(self.text_started);

                if block_index != 0 && self.block_open {
                    events.push(StreamEvent::ContentBlockStop {
                        index: self.content_index,
                    });
                    self.content_index += 1;
                }

                let synthetic = upstream_id.is_none() && upstream_name.is_none();
                let id = upstream_id.unwrap_or_else(|| format!("call_{}_{index}", unix_ms()));
                let name = upstream_name.unwrap_or_else(|| format!("tool_{index}"));

                if !name.starts_with("tool_") {
                    self.accumulated_output.push_str(&name);
                }

                events.push(StreamEvent::ContentBlockStart {
                    index: self.content_index,
                    content_block: ResponseContent::ToolUse {
                        id: id.clone(),
                        name: name.clone(),
                        input: json!({}),
                    },
                });
                events.push(StreamEvent::Ping);

                self.block_open = true;

                self.tool_blocks.insert(
                    index,
                    ToolCallBlock {
                        id,
                        name,
                        arguments: String::new(),
                        synthetic,
                    },
                );
            } else if let (Some(id), Some(name)) = (upstream_id, upstream_name)
                && let Some(block) = self.tool_blocks.get_mut(&index)
                && block.synthetic
            {
                // The real identifiers arrived late; adopt them without
                // emitting new events.
                block.id = id;
                block.name = name;
                block.synthetic = false;
            }

            let arguments = tool_call
                .function
                .as_ref()
                .and_then(|function| function.arguments.as_deref())
                .filter(|fragment| !fragment.is_empty());

            if let Some(fragment) = arguments {
                if let Some(block) = self.tool_blocks.get_mut(&index) {
                    block.arguments.push_str(fragment);
                }

                self.accumulated_output.push_str(fragment);

                events.push(StreamEvent::ContentBlockDelta {
                    index: self.content_index,
                    delta: ContentDelta::InputJsonDelta {
                        partial_json: fragment.to_string(),
                    },
                });
            }
        }
    }

    fn finish_events(
        &mut self,
        stop_reason: StopReason,
        usage: Option<openai::Usage>,
        events: &mut Vec<StreamEvent>,
    ) {
        self.finished = true;

        if self.block_open {
            events.push(StreamEvent::ContentBlockStop {
                index: self.content_index,
            });
            self.block_open = false;
        }

        let usage = usage.unwrap_or_default();

        let mut input_tokens = usage.prompt_tokens;

        if input_tokens == 0
            && let Some(cached) = self.cache.get(&self.request_id, true)
        {
            input_tokens = cached;
        }

        let mut output_tokens = usage.completion_tokens;

        if output_tokens == 0 && !self.accumulated_output.is_empty() {
            output_tokens = TokenCounter.count_text(&self.accumulated_output) as u32;
        }

        events.push(StreamEvent::MessageDelta {
            delta: MessageDelta {
                stop_reason: Some(stop_reason),
                stop_sequence: None,
            },
            usage: Usage::new(input_tokens, output_tokens),
        });
        events.push(StreamEvent::MessageStop);

        log::debug!(
            "Stream {} finished: stop_reason={stop_reason}, chunks={}, tool_calls={}, input_tokens={input_tokens}, output_tokens={output_tokens}",
            self.message_id,
            self.total_chunks,
            self.tool_blocks.len()
        );

        for block in self.tool_blocks.values() {
            log::debug!(
                "Tool call {} ({}): {} argument bytes",
                block.id,
                block.name,
                block.arguments.len()
            );
        }
    }
}

fn map_finish_reason(reason: openai::FinishReason) -> StopReason {
    match reason {
        openai::FinishReason::Stop => StopReason::EndTurn,
        openai::FinishReason::Length => StopReason::MaxTokens,
        openai::FinishReason::ToolCalls | openai::FinishReason::FunctionCall => StopReason::ToolUse,
        openai::FinishReason::ContentFilter => StopReason::StopSequence,
        openai::FinishReason::Other => StopReason::EndTurn,
    }
}

fn strip_opening_tags(text: &str) -> String {
    text.replace("<thinking>", "").replace("<think>", "")
}

/// Splits at the first closing tag, returning the thinking text before it
/// and the remainder behind it.
fn split_at_closing_tag(text: &str) -> Option<(&str, &str)> {
    let long = text.find("</thinking>");
    let short = text.find("</think>");

    match (long, short) {
        (Some(at), Some(other)) if at <= other => Some((&text[..at], &text[at + "</thinking>".len()..])),
        (_, Some(at)) => Some((&text[..at], &text[at + "</think>".len()..])),
        (Some(at), None) => Some((&text[..at], &text[at + "</thinking>".len()..])),
        (None, None) => None,
    }
}

/// Holds back a trailing fragment that could be the start of a closing tag
/// split across deltas, e.g. a delta ending in `</thin`.
fn split_partial_closing_suffix(text: &str) -> (&str, &str) {
    if let Some(at) = text.rfind('<') {
        let suffix = &text[at..];

        if suffix.len() < "</thinking>".len()
            && ("</thinking>".starts_with(suffix) || "</think>".starts_with(suffix))
        {
            return (&text[..at], suffix);
        }
    }

    (text, "")
}

struct StreamContext<I> {
    inner: I,
    state: StreamState,
    queue: VecDeque<StreamEvent>,
    done: bool,
}

/// Adapts an upstream SSE byte stream into Anthropic stream events.
///
/// Only `data:` lines are meaningful; `data: [DONE]` is a terminator
/// indicator, though normal finalization is driven by the first chunk with a
/// finish reason. Transport errors after the first event surface as a single
/// in-band `error` event. Dropping the returned stream drops the upstream
/// body and releases the connection.
pub fn convert_stream<S, B, E>(
    upstream: S,
    model: String,
    request_id: String,
    cache: Arc<TokenCache>,
) -> impl Stream<Item = StreamEvent> + Send
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let inner: Pin<Box<dyn Stream<Item = _> + Send>> = Box::pin(upstream.eventsource());

    let context = StreamContext {
        inner,
        state: StreamState::new(model, request_id, cache),
        queue: VecDeque::new(),
        done: false,
    };

    futures::stream::unfold(context, |mut context| async move {
        loop {
            if let Some(event) = context.queue.pop_front() {
                return Some((event, context));
            }

            if context.done {
                return None;
            }

            match context.inner.next().await {
                Some(Ok(message)) => {
                    if message.data == "[DONE]" {
                        continue;
                    }

                    let events = context.state.process_data(&message.data);
                    context.queue.extend(events);
                }
                Some(Err(error)) => {
                    log::error!("Upstream stream transport error: {error}");

                    let events = context.state.transport_error(error.to_string());
                    context.queue.extend(events);
                    context.done = true;
                }
                None => {
                    let events = context.state.finalize_eof();
                    context.queue.extend(events);
                    context.done = true;
                }
            }
        }
    })
}
