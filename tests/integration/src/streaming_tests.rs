//! Streaming through each adapter: event order, terminal states and cancellation

use crate::fixtures::*;
use crate::mock_providers::*;
use gateway_core::{
    Category, Cause, LanguageModel, Sentinel, StopReason, StreamEvent, StreamIterator,
    ToolCallDelta, Usage,
};
use gateway_providers::{AnthropicModel, GoogleModel, OpenAiModel};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Drain every non-terminal event
async fn drain(stream: &mut StreamIterator) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    while stream.next().await {
        events.extend(stream.current().cloned());
    }
    events
}

fn deltas(events: &[StreamEvent]) -> Vec<&ToolCallDelta> {
    events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::ToolCallDelta(d) => Some(d),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_anthropic_stream_events() {
    let mock = MockAnthropic::new().await;
    mock.mock_stream(anthropic_stream_body()).await;
    let model = AnthropicModel::from_target(&anthropic_target(&mock.url())).expect("model");

    let mut stream = model
        .stream_text(&weather_prompt(), &CancellationToken::new())
        .expect("stream");
    let events = drain(&mut stream).await;

    let text: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::ContentDelta(t) => Some(t.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(text, vec!["Checking ", "now."]);

    let tool_deltas = deltas(&events);
    assert_eq!(tool_deltas.len(), 4);
    assert_eq!(tool_deltas[0].id.as_deref(), Some("toolu_9"));
    assert_eq!(tool_deltas[1].arguments.as_deref(), Some("{\"city\": "));
    let completed = tool_deltas[3].completed.as_ref().expect("completed call");
    assert_eq!(completed.arguments, json!({"city": "Paris"}));

    assert!(stream.is_done());
    assert!(stream.err().is_none());
    match stream.current() {
        Some(StreamEvent::MessageDone { stop_reason, usage }) => {
            assert_eq!(*stop_reason, StopReason::ToolUse);
            assert_eq!(*usage, Usage::new(25, 18, 0));
        }
        other => panic!("expected message_done, got {other:?}"),
    }
    assert!(!stream.next().await);

    let body = request_json(&mock.requests().await[0]);
    assert_eq!(body["stream"], true);
}

#[tokio::test]
async fn test_anthropic_stream_collect() {
    let mock = MockAnthropic::new().await;
    mock.mock_stream(anthropic_stream_body()).await;
    let model = AnthropicModel::from_target(&anthropic_target(&mock.url())).expect("model");

    let result = model
        .stream_text(&weather_prompt(), &CancellationToken::new())
        .expect("stream")
        .collect()
        .await
        .expect("collect");

    assert_eq!(result.text(), "Checking now.");
    assert_eq!(result.tool_calls()[0].name, "get_weather");
    assert_eq!(result.stop_reason, StopReason::ToolUse);
}

#[tokio::test]
async fn test_openai_stream_collect() {
    let mock = MockOpenAI::new().await;
    mock.mock_stream(openai_stream_body()).await;
    let model = OpenAiModel::from_target(&openai_target(&mock.url())).expect("model");

    let result = model
        .stream_text(&weather_prompt(), &CancellationToken::new())
        .expect("stream")
        .collect()
        .await
        .expect("collect");

    assert_eq!(result.text(), "Hello");
    let calls = result.tool_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].id, "call_7");
    assert_eq!(calls[0].arguments, json!({"city": "Paris"}));
    assert_eq!(result.stop_reason, StopReason::ToolUse);
    assert_eq!(result.usage, Usage::new(40, 15, 0));

    let body = request_json(&mock.requests().await[0]);
    assert_eq!(body["stream"], true);
    assert_eq!(body["stream_options"]["include_usage"], true);
}

#[tokio::test]
async fn test_gemini_stream_collect() {
    let mock = MockGoogle::new().await;
    mock.mock_stream("gemini-2.5-flash", gemini_stream_body()).await;
    let model = GoogleModel::gemini(&gemini_target(&mock.url())).expect("model");

    let mut stream = model
        .stream_text(&weather_prompt(), &CancellationToken::new())
        .expect("stream");
    let events = drain(&mut stream).await;

    // whole calls only, no fragments
    let tool_deltas = deltas(&events);
    assert_eq!(tool_deltas.len(), 1);
    assert!(tool_deltas[0].arguments.is_none());
    assert_eq!(
        tool_deltas[0].completed.as_ref().map(|c| c.name.as_str()),
        Some("get_weather")
    );
    match stream.current() {
        Some(StreamEvent::MessageDone { stop_reason, usage }) => {
            assert_eq!(*stop_reason, StopReason::ToolUse);
            assert_eq!(*usage, Usage::new(9, 7, 0));
        }
        other => panic!("expected message_done, got {other:?}"),
    }
}

#[tokio::test]
async fn test_truncated_stream_is_an_error() {
    let mock = MockAnthropic::new().await;
    let body = sse_with_names(&[
        ("message_start", json!({"type": "message_start", "message": {"usage": {"input_tokens": 3}}})),
        ("content_block_delta", json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "partial"}})),
    ]);
    mock.mock_stream(body).await;
    let model = AnthropicModel::from_target(&anthropic_target(&mock.url())).expect("model");

    let mut stream = model
        .stream_text(&prompt("hi"), &CancellationToken::new())
        .expect("stream");
    let events = drain(&mut stream).await;

    assert_eq!(events.len(), 1);
    let err = stream.err().expect("latched error");
    assert!(err.is(Sentinel::Stream));
    assert!(matches!(err.cause(), Some(Cause::Decode(_))));
    assert!(matches!(stream.current(), Some(StreamEvent::Error(_))));
}

#[tokio::test]
async fn test_in_band_stream_error() {
    let mock = MockAnthropic::new().await;
    let body = sse_with_names(&[
        ("content_block_delta", json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "Hi"}})),
        ("error", json!({"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}})),
    ]);
    mock.mock_stream(body).await;
    let model = AnthropicModel::from_target(&anthropic_target(&mock.url())).expect("model");

    let err = model
        .stream_text(&prompt("hi"), &CancellationToken::new())
        .expect("stream")
        .collect()
        .await
        .expect_err("overloaded");

    assert!(err.is(Sentinel::Stream));
    assert!(err.is(Category::ServiceUnavailable));
}

#[tokio::test]
async fn test_stream_http_error_status() {
    let mock = MockOpenAI::new().await;
    mock.mock_chat(429, openai_error("rate_limit_exceeded", "Slow down"))
        .await;
    let model = OpenAiModel::from_target(&openai_target(&mock.url())).expect("model");

    let mut stream = model
        .stream_text(&prompt("hi"), &CancellationToken::new())
        .expect("stream");
    assert!(!stream.next().await);

    let err = stream.err().expect("latched error");
    assert!(err.is(Sentinel::Stream));
    assert!(err.is(Category::RateLimited));
}

#[tokio::test]
async fn test_anthropic_stream_http_error_status() {
    let mock = MockAnthropic::new().await;
    mock.mock_messages(401, anthropic_error("authentication_error", "bad key"))
        .await;
    let model = AnthropicModel::from_target(&anthropic_target(&mock.url())).expect("model");

    let err = model
        .stream_text(&prompt("hi"), &CancellationToken::new())
        .expect("stream")
        .collect()
        .await
        .expect_err("unauthorized");

    assert!(err.is(Sentinel::Stream));
    assert!(err.is(Category::AuthFailed));
}

#[tokio::test]
async fn test_parent_cancellation_latches_error() {
    let mock = MockOpenAI::new().await;
    mock.mock_stream_delayed(openai_stream_body(), Duration::from_secs(10))
        .await;
    let model = OpenAiModel::from_target(&openai_target(&mock.url())).expect("model");

    let parent = CancellationToken::new();
    let mut stream = model.stream_text(&prompt("hi"), &parent).expect("stream");

    let trigger = parent.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let more = tokio::time::timeout(Duration::from_secs(2), stream.next())
        .await
        .expect("cancellation unblocks next");
    assert!(!more);

    let err = stream.err().expect("latched error");
    assert!(err.is_cancelled());
    assert!(err.is(Sentinel::Stream));
    assert!(err.is(Category::ServiceUnavailable));
}

#[tokio::test]
async fn test_close_leaves_parent_untouched() {
    let mock = MockOpenAI::new().await;
    mock.mock_stream(openai_stream_body()).await;
    let model = OpenAiModel::from_target(&openai_target(&mock.url())).expect("model");

    let parent = CancellationToken::new();
    let mut stream = model.stream_text(&prompt("hi"), &parent).expect("stream");
    assert!(stream.next().await);

    stream.close();
    stream.close();

    assert!(!stream.next().await);
    assert!(stream.err().is_none());
    assert!(stream.is_done());
    assert!(!parent.is_cancelled());
}
