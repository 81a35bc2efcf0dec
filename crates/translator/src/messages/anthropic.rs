//! Anthropic Messages API wire types.
//!
//! Request types cover what clients send to `POST /v1/messages`; response and
//! stream-event types cover what the proxy sends back. The format differs
//! from OpenAI's in several key ways: messages carry content block arrays,
//! the system prompt lives outside the message list, and tool use is
//! expressed as `tool_use`/`tool_result` blocks instead of function calls.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request body for the Anthropic Messages API.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MessagesRequest {
    /// The model requested by the client, e.g. "claude-3-5-sonnet-20241022".
    /// Resolved against the configured routing slots before forwarding.
    pub model: String,

    /// The conversation, alternating between user and assistant turns.
    pub messages: Vec<Message>,

    /// Maximum number of tokens to generate. Required by the protocol.
    pub max_tokens: u32,

    /// System prompt, either a plain string or a list of text blocks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<SystemPrompt>,

    /// Tools available to the model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,

    /// Tool selection directive. Kept as a raw value because unmapped shapes
    /// are forwarded to the upstream untouched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<Value>,

    /// Sampling temperature in `[0, 1]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Nucleus sampling parameter in `[0, 1]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Only sample from the top K tokens, at least 1.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,

    /// Sequences that cause generation to stop.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,

    /// When true, the response is delivered as Server-Sent Events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,

    /// Extended thinking switch, either a boolean or `{type: "enabled", ...}`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking: Option<Thinking>,

    /// Opaque client metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// System prompt in string or block-list form.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum SystemPrompt {
    /// Plain string prompt.
    Text(String),
    /// Ordered list of text fragments.
    Blocks(Vec<SystemBlock>),
}

/// One fragment of a block-list system prompt.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SystemBlock {
    /// Always "text".
    #[serde(rename = "type", default = "text_block_type")]
    pub block_type: String,
    /// The fragment text.
    pub text: String,
}

fn text_block_type() -> String {
    "text".to_string()
}

/// Extended thinking switch.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Thinking {
    /// Boolean form.
    Flag(bool),
    /// Object form, `{type: "enabled", budget_tokens: ...}`.
    Config(ThinkingConfig),
}

/// Object form of the thinking switch.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ThinkingConfig {
    /// "enabled" or "disabled".
    #[serde(rename = "type")]
    pub mode: String,
    /// Token budget for the thinking phase.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_tokens: Option<u32>,
}

impl Thinking {
    /// Whether the request asks for a thinking-capable model.
    pub fn is_enabled(&self) -> bool {
        match self {
            Thinking::Flag(enabled) => *enabled,
            Thinking::Config(config) => config.mode == "enabled",
        }
    }
}

/// A message in the conversation.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Message {
    /// The sender of the message.
    pub role: Role,
    /// String content or a list of typed blocks.
    pub content: MessageContent,
}

/// Role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User message.
    User,
    /// Assistant message.
    Assistant,
}

/// Message content, a plain string or an ordered block list.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Plain string content.
    Text(String),
    /// Typed content blocks.
    Blocks(Vec<ContentBlock>),
}

impl MessageContent {
    /// True for an empty string or an empty block list.
    pub fn is_empty(&self) -> bool {
        match self {
            MessageContent::Text(text) => text.is_empty(),
            MessageContent::Blocks(blocks) => blocks.is_empty(),
        }
    }
}

/// Content block in a request message.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    /// Plain text.
    #[serde(rename = "text")]
    Text {
        /// The text content.
        text: String,
    },

    /// Image content.
    #[serde(rename = "image")]
    Image {
        /// The image source.
        source: ImageSource,
    },

    /// A tool invocation issued by the assistant.
    #[serde(rename = "tool_use")]
    ToolUse {
        /// Unique identifier for this tool use.
        id: String,
        /// Name of the tool.
        name: String,
        /// Input parameters for the tool.
        input: Value,
    },

    /// Result of a tool invocation, supplied by the user turn.
    #[serde(rename = "tool_result")]
    ToolResult {
        /// The tool use this result answers.
        tool_use_id: String,
        /// Result payload, a string or a list of blocks.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<ToolResultContent>,
        /// Whether the tool execution failed.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },

    /// Replayed model reasoning from an earlier assistant turn.
    #[serde(rename = "thinking")]
    Thinking {
        /// The reasoning text.
        thinking: String,
        /// Opaque signature attached to the reasoning block.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },
}

/// Payload of a `tool_result` block.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ToolResultContent {
    /// Plain string result.
    Text(String),
    /// Structured result blocks, forwarded as serialized JSON.
    Blocks(Vec<Value>),
}

/// Image source for image content blocks.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImageSource {
    /// "base64" or "url".
    #[serde(rename = "type")]
    pub source_type: String,
    /// Media type of the image, e.g. "image/jpeg".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    /// Base64-encoded image data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    /// Direct URL, for url-typed sources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Tool definition.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Tool {
    /// The name of the tool.
    pub name: String,
    /// What the tool does.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema of the tool's input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
}

/// Response body for the Anthropic Messages API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesResponse {
    /// Unique identifier for this message.
    pub id: String,

    /// Always "message".
    #[serde(rename = "type")]
    pub kind: String,

    /// Always assistant.
    pub role: Role,

    /// The generated content blocks.
    pub content: Vec<ResponseContent>,

    /// The model reported back to the client.
    pub model: String,

    /// Why generation stopped.
    pub stop_reason: Option<StopReason>,

    /// The stop sequence that fired, if any.
    pub stop_sequence: Option<String>,

    /// Token accounting.
    pub usage: Usage,
}

/// Content block in a response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ResponseContent {
    /// Plain text.
    #[serde(rename = "text")]
    Text {
        /// The text content.
        text: String,
    },

    /// Model reasoning, rendered separately by clients.
    #[serde(rename = "thinking")]
    Thinking {
        /// The reasoning text.
        thinking: String,
        /// Opaque per-block signature.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },

    /// A tool invocation.
    #[serde(rename = "tool_use")]
    ToolUse {
        /// Unique identifier for this tool use.
        id: String,
        /// Name of the tool.
        name: String,
        /// Parsed input parameters.
        input: Value,
    },
}

/// The reason why the model stopped generating tokens.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The model reached a natural stopping point.
    EndTurn,
    /// The generation hit the requested token limit.
    MaxTokens,
    /// A stop sequence from the request fired.
    StopSequence,
    /// The model invoked a tool.
    ToolUse,
    /// The upstream content filter intervened.
    ContentFilter,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::EndTurn => write!(f, "end_turn"),
            StopReason::MaxTokens => write!(f, "max_tokens"),
            StopReason::StopSequence => write!(f, "stop_sequence"),
            StopReason::ToolUse => write!(f, "tool_use"),
            StopReason::ContentFilter => write!(f, "content_filter"),
        }
    }
}

/// Token usage statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    /// Number of input tokens.
    pub input_tokens: u32,
    /// Number of output tokens.
    pub output_tokens: u32,
    /// Input tokens spent creating cache entries. Always zero here; the
    /// upstream protocol has no equivalent.
    #[serde(default)]
    pub cache_creation_input_tokens: u32,
    /// Input tokens served from cache. Always zero here.
    #[serde(default)]
    pub cache_read_input_tokens: u32,
}

impl Usage {
    /// Usage with the two counters the proxy can actually account for.
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
            cache_creation_input_tokens: 0,
            cache_read_input_tokens: 0,
        }
    }
}

/// Error envelope returned on every failed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Always "error".
    #[serde(rename = "type")]
    pub kind: String,
    /// Error details.
    pub error: ErrorDetail,
}

/// Error details inside the envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Taxonomy slot, e.g. "invalid_request_error".
    #[serde(rename = "type")]
    pub error_type: String,
    /// Human-readable error message.
    pub message: String,
}

/// Streaming event surface for SSE responses.
///
/// Each variant maps to a concrete SSE `event:` name. Streams begin with a
/// single `message_start`, emit one or more content block lifecycles
/// (`content_block_start` → `content_block_delta*` → `content_block_stop`)
/// with dense indices starting at 0, then a single `message_delta` carrying
/// the stop reason and usage, and finish with `message_stop`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Start of a message.
    MessageStart {
        /// The initial message metadata.
        message: MessageStart,
    },

    /// Start of a content block.
    ContentBlockStart {
        /// The index of the content block.
        index: u32,
        /// The block being started, with empty payload.
        content_block: ResponseContent,
    },

    /// Incremental update inside a content block.
    ContentBlockDelta {
        /// The index of the content block.
        index: u32,
        /// The delta payload.
        delta: ContentDelta,
    },

    /// End of a content block.
    ContentBlockStop {
        /// The index of the content block.
        index: u32,
    },

    /// Top-level message changes, emitted exactly once before the stop.
    MessageDelta {
        /// Stop reason and stop sequence.
        delta: MessageDelta,
        /// Final usage counters.
        usage: Usage,
    },

    /// End of the stream.
    MessageStop,

    /// Keep-alive heartbeat.
    Ping,

    /// In-band error, used once the HTTP status line is already out.
    Error {
        /// The error payload.
        message: ErrorDetail,
    },
}

impl StreamEvent {
    /// The SSE `event:` name for this payload.
    pub fn name(&self) -> &'static str {
        match self {
            StreamEvent::MessageStart { .. } => "message_start",
            StreamEvent::ContentBlockStart { .. } => "content_block_start",
            StreamEvent::ContentBlockDelta { .. } => "content_block_delta",
            StreamEvent::ContentBlockStop { .. } => "content_block_stop",
            StreamEvent::MessageDelta { .. } => "message_delta",
            StreamEvent::MessageStop => "message_stop",
            StreamEvent::Ping => "ping",
            StreamEvent::Error { .. } => "error",
        }
    }
}

/// Message metadata announced by `message_start`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageStart {
    /// Unique message id, `msg_<unix-ms>`.
    pub id: String,
    /// Always "message".
    #[serde(rename = "type")]
    pub kind: String,
    /// Always assistant.
    pub role: Role,
    /// Empty at stream start.
    pub content: Vec<ResponseContent>,
    /// The model reported back to the client.
    pub model: String,
    /// Null at stream start.
    pub stop_reason: Option<StopReason>,
    /// Null at stream start.
    pub stop_sequence: Option<String>,
    /// Input tokens known at stream start.
    pub usage: Usage,
}

/// Delta payload inside `content_block_delta`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentDelta {
    /// Text appended to a text block.
    TextDelta {
        /// The text fragment.
        text: String,
    },

    /// Reasoning appended to a thinking block.
    ThinkingDelta {
        /// The reasoning fragment.
        thinking: String,
    },

    /// Signature closing a thinking block.
    SignatureDelta {
        /// Opaque signature value.
        signature: String,
    },

    /// Partial JSON appended to a tool_use block's input.
    InputJsonDelta {
        /// The JSON fragment.
        partial_json: String,
    },
}

/// Payload of a `message_delta` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDelta {
    /// Why generation stopped.
    pub stop_reason: Option<StopReason>,
    /// The stop sequence that fired, if any.
    pub stop_sequence: Option<String>,
}
