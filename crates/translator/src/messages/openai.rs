//! OpenAI Chat Completions wire types.
//!
//! Requests are what the proxy sends upstream; responses and stream chunks
//! are what comes back. Deserialization is lenient: upstreams in the wild
//! omit ids, usage blocks, and tool-call fields freely, so nearly everything
//! carries a default.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request body for `POST /chat/completions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    /// The upstream model identifier.
    pub model: String,

    /// The conversation, including system and tool messages.
    pub messages: Vec<ChatMessage>,

    /// Maximum number of tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Nucleus sampling parameter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Top-K sampling parameter. Not part of the official OpenAI surface but
    /// accepted by many compatible servers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,

    /// Whether to stream the response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,

    /// Sequences that cause generation to stop.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,

    /// Tool definitions in function form.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,

    /// Tool selection directive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<Value>,
}

/// A message in the OpenAI conversation format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The sender of the message.
    pub role: ChatRole,

    /// String content or multi-part content. Absent on assistant messages
    /// that only carry tool calls.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<MessageContent>,

    /// Tool invocations attached to an assistant message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,

    /// Correlates a tool message with the call it answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// Role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// System instructions.
    System,
    /// End-user message.
    User,
    /// Model output.
    Assistant,
    /// Tool execution result.
    Tool,
}

/// Message content, a plain string or a list of typed parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Plain string content.
    Text(String),
    /// Multi-part content.
    Parts(Vec<ContentPart>),
}

/// One part of a multi-part message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentPart {
    /// Plain text part.
    #[serde(rename = "text")]
    Text {
        /// The text content.
        text: String,
    },

    /// Image part.
    #[serde(rename = "image_url")]
    ImageUrl {
        /// The image reference.
        image_url: ImageUrl,
    },
}

/// Image reference inside an `image_url` part.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageUrl {
    /// A fetchable URL or a `data:` URL.
    pub url: String,
}

/// A completed tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this call.
    pub id: String,
    /// Always function.
    #[serde(rename = "type")]
    pub kind: ToolCallType,
    /// The invoked function.
    pub function: FunctionCall,
}

/// Tool call discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCallType {
    /// Function call.
    Function,
}

/// Function name and serialized arguments of a tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    /// The function name.
    pub name: String,
    /// JSON-encoded arguments.
    pub arguments: String,
}

/// Tool definition in function form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    /// Always function.
    #[serde(rename = "type")]
    pub kind: ToolCallType,
    /// The function definition.
    pub function: FunctionDefinition,
}

/// Function metadata of a tool definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDefinition {
    /// The function name.
    pub name: String,
    /// What the function does.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema of the parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

/// Non-streaming response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    /// Response identifier.
    #[serde(default)]
    pub id: String,
    /// The model that produced the response.
    #[serde(default)]
    pub model: String,
    /// Response alternatives; the proxy only reads the first.
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
    /// Token accounting, when the upstream provides it.
    #[serde(default)]
    pub usage: Option<Usage>,
}

/// One response alternative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatChoice {
    /// Position in the choices array.
    #[serde(default)]
    pub index: u32,
    /// The generated message.
    pub message: ResponseMessage,
    /// Why generation stopped.
    #[serde(default)]
    pub finish_reason: Option<FinishReason>,
}

/// The generated message of a non-streaming choice.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseMessage {
    /// Always assistant in practice.
    #[serde(default)]
    pub role: Option<ChatRole>,
    /// The generated text, possibly with inline `<think>` spans.
    #[serde(default)]
    pub content: Option<String>,
    /// Dedicated reasoning channel used by some upstreams.
    #[serde(default)]
    pub reasoning_content: Option<String>,
    /// Tool invocations.
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCall>>,
}

/// Why the upstream stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural stop.
    Stop,
    /// Token limit hit.
    Length,
    /// Content filter intervened.
    ContentFilter,
    /// The model called tools.
    ToolCalls,
    /// Legacy function-call stop.
    FunctionCall,
    /// Anything the upstream invents beyond the documented set.
    #[serde(other)]
    Other,
}

/// Token accounting. Missing counters deserialize as zero, which the proxy
/// treats as "unknown" and backfills.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    /// Prompt-side token count.
    #[serde(default)]
    pub prompt_tokens: u32,
    /// Completion-side token count.
    #[serde(default)]
    pub completion_tokens: u32,
    /// Sum of both.
    #[serde(default)]
    pub total_tokens: u32,
}

/// One SSE chunk of a streaming response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    /// Response identifier.
    #[serde(default)]
    pub id: String,
    /// The model producing the stream.
    #[serde(default)]
    pub model: String,
    /// Chunk alternatives; the proxy only reads the first.
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    /// Usage, usually only on the terminal chunk.
    #[serde(default)]
    pub usage: Option<Usage>,
    /// In-band upstream error object.
    #[serde(default)]
    pub error: Option<Value>,
}

/// One alternative inside a chunk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkChoice {
    /// Position in the choices array.
    #[serde(default)]
    pub index: u32,
    /// The incremental update.
    #[serde(default)]
    pub delta: Option<ChunkDelta>,
    /// Set on the terminal chunk.
    #[serde(default)]
    pub finish_reason: Option<FinishReason>,
    /// Some upstreams attach usage to the choice instead of the chunk.
    #[serde(default)]
    pub usage: Option<Usage>,
}

/// Incremental update inside a chunk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkDelta {
    /// Role, sent once on the first chunk.
    #[serde(default)]
    pub role: Option<String>,
    /// Text fragment.
    #[serde(default)]
    pub content: Option<String>,
    /// Reasoning fragment from the dedicated channel.
    #[serde(default)]
    pub reasoning_content: Option<String>,
    /// Incremental tool invocations.
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCallDelta>>,
}

/// Incremental tool invocation inside a chunk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolCallDelta {
    /// Which tool call this fragment belongs to.
    #[serde(default)]
    pub index: Option<u32>,
    /// Call identifier, present on the opening fragment at best.
    #[serde(default)]
    pub id: Option<String>,
    /// Call discriminator.
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    /// Function fragment.
    #[serde(default)]
    pub function: Option<FunctionDelta>,
}

/// Function fragment of an incremental tool invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FunctionDelta {
    /// Function name, present on the opening fragment at best.
    #[serde(default)]
    pub name: Option<String>,
    /// Argument fragment to append.
    #[serde(default)]
    pub arguments: Option<String>,
}
