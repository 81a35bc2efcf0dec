//! End-to-end translation tests that drive the full pipeline without a
//! network: Anthropic request → OpenAI request, fake upstream reply →
//! Anthropic response, and upstream SSE bytes → Anthropic SSE events.

use std::sync::Arc;

use futures::StreamExt;
use serde_json::json;

use translator::{
    assemble::assemble,
    messages::{
        anthropic::{ContentDelta, ResponseContent, StopReason, StreamEvent},
        openai,
    },
    rewrite::{rewrite, validate},
    stream::convert_stream,
    token::TokenCache,
};

fn routing_config() -> config::Config {
    serde_json::from_value(json!({"models": {"default": "gpt-4o"}})).unwrap()
}

#[test]
fn text_only_round_trip_preserves_the_string() {
    let request: translator::messages::anthropic::MessagesRequest = serde_json::from_value(json!({
        "model": "claude-3-5-sonnet-20241022",
        "max_tokens": 100,
        "messages": [{"role": "user", "content": "X"}]
    }))
    .unwrap();

    let cache = TokenCache::new(16);

    validate(&request).unwrap();
    let mut upstream = rewrite(&request, "req-1", &routing_config(), &cache);
    upstream.stream = Some(false);

    assert_eq!(
        serde_json::to_value(&upstream).unwrap(),
        json!({
            "model": "gpt-4o",
            "messages": [{"role": "user", "content": "X"}],
            "max_tokens": 100,
            "stream": false
        })
    );

    // The upstream echoes the text back.
    let reply: openai::ChatCompletionResponse = serde_json::from_value(json!({
        "id": "chatcmpl-1",
        "model": "gpt-4o",
        "choices": [{
            "message": {"role": "assistant", "content": "X"},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 1, "completion_tokens": 1, "total_tokens": 2}
    }))
    .unwrap();

    let response = assemble(reply, Some(&request.model), "req-1", &cache).unwrap();

    assert_eq!(response.model, "claude-3-5-sonnet-20241022");
    assert_eq!(response.stop_reason, Some(StopReason::EndTurn));
    assert_eq!(response.usage.input_tokens, 1);
    assert_eq!(response.usage.output_tokens, 1);

    assert_eq!(response.content.len(), 1);
    let ResponseContent::Text { text } = &response.content[0] else {
        unreachable!("expected a text block");
    };
    assert_eq!(text, "X");
}

fn sse_frames(payloads: &[serde_json::Value]) -> Vec<Result<bytes::Bytes, std::convert::Infallible>> {
    let mut frames: Vec<_> = payloads
        .iter()
        .map(|payload| Ok(bytes::Bytes::from(format!("data: {payload}\n\n"))))
        .collect();

    frames.push(Ok(bytes::Bytes::from("data: [DONE]\n\n")));
    frames
}

#[tokio::test]
async fn inline_thinking_stream_matches_the_protocol() {
    let payloads = [
        json!({"choices": [{"delta": {"content": "<think>"}}]}),
        json!({"choices": [{"delta": {"content": "plan"}}]}),
        json!({"choices": [{"delta": {"content": "</think>"}}]}),
        json!({"choices": [{"delta": {"content": "Hello"}}]}),
        json!({"choices": [{"delta": {}, "finish_reason": "stop"}]}),
    ];

    let events: Vec<StreamEvent> = convert_stream(
        futures::stream::iter(sse_frames(&payloads)),
        "claude-3-5-sonnet-20241022".to_string(),
        "req-1".to_string(),
        Arc::new(TokenCache::new(16)),
    )
    .collect()
    .await;

    let names: Vec<&str> = events.iter().map(StreamEvent::name).collect();

    assert_eq!(
        names,
        vec![
            "message_start",
            "content_block_start",
            "ping",
            "content_block_delta",
            "content_block_delta",
            "content_block_stop",
            "content_block_start",
            "ping",
            "content_block_delta",
            "content_block_stop",
            "message_delta",
            "message_stop",
        ]
    );

    let StreamEvent::ContentBlockDelta { index, delta } = &events[3] else {
        unreachable!("expected content_block_delta");
    };
    assert_eq!(*index, 0);
    assert!(matches!(delta, ContentDelta::ThinkingDelta { thinking } if thinking == "plan"));

    let StreamEvent::ContentBlockDelta { index, delta } = &events[8] else {
        unreachable!("expected content_block_delta");
    };
    assert_eq!(*index, 1);
    assert!(matches!(delta, ContentDelta::TextDelta { text } if text == "Hello"));

    let StreamEvent::MessageDelta { delta, .. } = &events[10] else {
        unreachable!("expected message_delta");
    };
    assert_eq!(delta.stop_reason, Some(StopReason::EndTurn));
}

#[tokio::test]
async fn streaming_tool_call_forwards_partial_json() {
    let payloads = [
        json!({"choices": [{"delta": {"tool_calls": [{
            "index": 0,
            "id": "x",
            "function": {"name": "f", "arguments": "{\"a\":"}
        }]}}]}),
        json!({"choices": [{"delta": {"tool_calls": [{
            "index": 0,
            "function": {"arguments": "1}"}
        }]}}]}),
        json!({"choices": [{"delta": {}, "finish_reason": "tool_calls"}]}),
    ];

    let events: Vec<StreamEvent> = convert_stream(
        futures::stream::iter(sse_frames(&payloads)),
        "claude-3-5-sonnet-20241022".to_string(),
        "req-1".to_string(),
        Arc::new(TokenCache::new(16)),
    )
    .collect()
    .await;

    let starts: Vec<&ResponseContent> = events
        .iter()
        .filter_map(|event| match event {
            StreamEvent::ContentBlockStart { content_block, .. } => Some(content_block),
            _ => None,
        })
        .collect();

    assert_eq!(starts.len(), 1);
    let ResponseContent::ToolUse { id, name, .. } = starts[0] else {
        unreachable!("expected a tool_use block");
    };
    assert_eq!(id, "x");
    assert_eq!(name, "f");

    let fragments: Vec<&str> = events
        .iter()
        .filter_map(|event| match event {
            StreamEvent::ContentBlockDelta {
                delta: ContentDelta::InputJsonDelta { partial_json },
                ..
            } => Some(partial_json.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(fragments, vec!["{\"a\":", "1}"]);

    let StreamEvent::MessageDelta { delta, .. } = events
        .iter()
        .find(|event| matches!(event, StreamEvent::MessageDelta { .. }))
        .unwrap()
    else {
        unreachable!("expected message_delta");
    };
    assert_eq!(delta.stop_reason, Some(StopReason::ToolUse));
}

#[tokio::test]
async fn chunk_split_mid_frame_is_reassembled() {
    // The SSE decoder must cope with frames split at arbitrary byte
    // boundaries, as TCP will happily do.
    let whole = "data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"}}]}\n\ndata: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n";
    let (left, right) = whole.split_at(23);

    let frames = vec![
        Ok::<_, std::convert::Infallible>(bytes::Bytes::from(left.to_string())),
        Ok(bytes::Bytes::from(right.to_string())),
    ];

    let events: Vec<StreamEvent> = convert_stream(
        futures::stream::iter(frames),
        "claude-3-5-sonnet-20241022".to_string(),
        "req-1".to_string(),
        Arc::new(TokenCache::new(16)),
    )
    .collect()
    .await;

    let text: String = events
        .iter()
        .filter_map(|event| match event {
            StreamEvent::ContentBlockDelta {
                delta: ContentDelta::TextDelta { text },
                ..
            } => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(text, "Hello");
    assert!(matches!(events.last(), Some(StreamEvent::MessageStop)));
}

#[tokio::test]
async fn cached_prompt_tokens_flow_into_stream_usage() {
    let cache = Arc::new(TokenCache::new(16));

    // Simulates what the rewriter does before the upstream call.
    let request: translator::messages::anthropic::MessagesRequest = serde_json::from_value(json!({
        "model": "claude-3-5-sonnet-20241022",
        "max_tokens": 100,
        "messages": [{"role": "user", "content": "tell me a story"}]
    }))
    .unwrap();

    rewrite(&request, "req-1", &routing_config(), &cache);
    let estimate = cache.get("req-1", false).unwrap();

    let payloads = [
        json!({"choices": [{"delta": {"content": "Once upon a time"}}]}),
        json!({"choices": [{"delta": {}, "finish_reason": "stop"}]}),
    ];

    let events: Vec<StreamEvent> = convert_stream(
        futures::stream::iter(sse_frames(&payloads)),
        request.model.clone(),
        "req-1".to_string(),
        cache.clone(),
    )
    .collect()
    .await;

    let StreamEvent::MessageStart { message } = &events[0] else {
        unreachable!("expected message_start");
    };
    assert_eq!(message.usage.input_tokens, estimate);

    let StreamEvent::MessageDelta { usage, .. } = events
        .iter()
        .find(|event| matches!(event, StreamEvent::MessageDelta { .. }))
        .unwrap()
    else {
        unreachable!("expected message_delta");
    };
    assert_eq!(usage.input_tokens, estimate);
    assert!(usage.output_tokens > 0);

    // Finalization consumed the cache entry.
    assert_eq!(cache.get("req-1", false), None);
}
