//! Token estimation and the per-request prompt-token cache.
//!
//! Counts are estimates: all textual surfaces of a payload are concatenated
//! in document order and encoded once with the `o200k_base` vocabulary. The
//! only consumers are long-context routing and usage backfill when the
//! upstream omits its counters, so key ordering inside serialized JSON does
//! not matter for correctness.

use std::sync::OnceLock;

use mini_moka::sync::Cache;
use serde_json::Value;
use tiktoken_rs::CoreBPE;

use crate::messages::anthropic::{Message, MessageContent, ContentBlock, ResponseContent, SystemPrompt, Tool};

fn encoder() -> &'static CoreBPE {
    static ENCODER: OnceLock<CoreBPE> = OnceLock::new();

    ENCODER.get_or_init(|| tiktoken_rs::o200k_base().expect("o200k_base vocabulary is bundled"))
}

fn push_json(buffer: &mut String, value: &Value) {
    match value {
        Value::Null => {}
        Value::Object(map) if map.is_empty() => {}
        other => {
            if let Ok(json) = serde_json::to_string(other) {
                buffer.push_str(&json);
            }
        }
    }
}

/// Estimates token counts of Anthropic-format payloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenCounter;

impl TokenCounter {
    /// Token estimate for a full request: message contents, system prompt and
    /// tool definitions.
    pub fn count_request(
        &self,
        messages: &[Message],
        system: Option<&SystemPrompt>,
        tools: Option<&[Tool]>,
    ) -> usize {
        let mut text = String::new();

        for message in messages {
            match &message.content {
                MessageContent::Text(content) => text.push_str(content),
                MessageContent::Blocks(blocks) => {
                    for block in blocks {
                        match block {
                            ContentBlock::Text { text: fragment } => text.push_str(fragment),
                            ContentBlock::ToolUse { input, .. } => push_json(&mut text, input),
                            _ => {}
                        }
                    }
                }
            }
        }

        match system {
            Some(SystemPrompt::Text(prompt)) => text.push_str(prompt),
            Some(SystemPrompt::Blocks(blocks)) => {
                for block in blocks {
                    text.push_str(&block.text);
                }
            }
            None => {}
        }

        if let Some(tools) = tools {
            for tool in tools {
                text.push_str(&tool.name);

                if let Some(description) = &tool.description {
                    text.push_str(description);
                }

                if let Some(schema) = &tool.input_schema {
                    push_json(&mut text, schema);
                }
            }
        }

        self.count_text(&text)
    }

    /// Token estimate for assembled response blocks, used when the upstream
    /// omits `completion_tokens`.
    pub fn count_response(&self, blocks: &[ResponseContent]) -> usize {
        let mut text = String::new();

        for block in blocks {
            match block {
                ResponseContent::Text { text: fragment } => text.push_str(fragment),
                ResponseContent::Thinking { thinking, .. } => text.push_str(thinking),
                ResponseContent::ToolUse { name, input, .. } => {
                    push_json(&mut text, input);
                    text.push_str(name);
                }
            }
        }

        self.count_text(&text)
    }

    /// Token estimate for a raw text buffer.
    pub fn count_text(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }

        encoder().encode_ordinary(text).len()
    }
}

/// Thread-safe mapping from request id to the prompt-token estimate.
///
/// Entries are written by the rewriter and consumed by the assembler or the
/// stream finisher. The cache is bounded so abandoned requests cannot grow it
/// without limit; within one request's lifetime an entry is never evicted in
/// practice.
#[derive(Debug, Clone)]
pub struct TokenCache {
    inner: Cache<String, u32>,
}

impl TokenCache {
    /// A cache holding at most `capacity` entries.
    pub fn new(capacity: u64) -> Self {
        Self {
            inner: Cache::builder().max_capacity(capacity).build(),
        }
    }

    /// Stores the estimate for a request. Empty ids and zero counts are
    /// ignored, matching the fallback semantics of the readers.
    pub fn put(&self, request_id: &str, tokens: u32) {
        if request_id.is_empty() || tokens == 0 {
            return;
        }

        self.inner.insert(request_id.to_string(), tokens);
    }

    /// Reads the estimate, removing the entry when `delete` is set. Missing
    /// keys return `None` either way.
    pub fn get(&self, request_id: &str, delete: bool) -> Option<u32> {
        if request_id.is_empty() {
            return None;
        }

        let tokens = self.inner.get(&request_id.to_string())?;

        if delete {
            self.inner.invalidate(&request_id.to_string());
        }

        Some(tokens)
    }

    /// Drops all entries.
    pub fn clear(&self) {
        self.inner.invalidate_all();
    }

    /// Approximate number of live entries.
    pub fn size(&self) -> u64 {
        self.inner.entry_count()
    }
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new(10_000)
    }
}
