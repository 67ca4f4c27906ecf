//! Test fixtures: targets pointed at mock servers, vendor payloads and SSE bodies

use gateway_config::TargetConfig;
use gateway_core::{GenerateTextOptions, Message, ToolDefinition};
use serde_json::{json, Value};
use std::time::Duration;

pub const TEST_KEY: &str = "test-key";

/// Anthropic target against a mock server
pub fn anthropic_target(base_url: &str) -> TargetConfig {
    TargetConfig::new("anthropic", "claude-sonnet-4-5")
        .with_api_key(TEST_KEY)
        .with_base_url(base_url)
        .with_timeout(Duration::from_secs(5))
}

/// OpenAI target against a mock server
pub fn openai_target(base_url: &str) -> TargetConfig {
    TargetConfig::new("openai", "gpt-4o")
        .with_api_key(TEST_KEY)
        .with_base_url(base_url)
        .with_timeout(Duration::from_secs(5))
}

/// Gemini API target against a mock server
pub fn gemini_target(base_url: &str) -> TargetConfig {
    TargetConfig::new("gemini", "gemini-2.5-flash")
        .with_api_key(TEST_KEY)
        .with_base_url(base_url)
        .with_timeout(Duration::from_secs(5))
}

/// Vertex AI target with batch staging; API and storage share the mock server
pub fn vertex_target(base_url: &str) -> TargetConfig {
    TargetConfig::new("vertex", "gemini-2.5-pro")
        .with_project("test-project", "us-central1")
        .with_base_url(base_url)
        .with_property("access_token", json!("test-token"))
        .with_property("storage_base_url", json!(base_url))
        .with_property("batch_bucket", json!("test-bucket"))
        .with_timeout(Duration::from_secs(5))
}

/// A single user prompt
pub fn prompt(text: &str) -> GenerateTextOptions {
    GenerateTextOptions::from_prompt(text)
}

/// A prompt offering one `get_weather` tool
pub fn weather_prompt() -> GenerateTextOptions {
    GenerateTextOptions::builder()
        .system("You answer weather questions.")
        .message(Message::user("What's the weather in Paris?"))
        .tool(ToolDefinition::new(
            "get_weather",
            "Current weather for a city",
            json!({
                "type": "object",
                "properties": {"city": {"type": "string"}},
                "required": ["city"]
            }),
        ))
        .build()
        .expect("valid options")
}

// Anthropic payloads

pub fn anthropic_message(text: &str) -> Value {
    json!({
        "id": "msg_01",
        "type": "message",
        "role": "assistant",
        "model": "claude-sonnet-4-5",
        "content": [{"type": "text", "text": text}],
        "stop_reason": "end_turn",
        "usage": {"input_tokens": 12, "output_tokens": 6}
    })
}

pub fn anthropic_tool_message() -> Value {
    json!({
        "id": "msg_02",
        "type": "message",
        "role": "assistant",
        "model": "claude-sonnet-4-5",
        "content": [
            {"type": "text", "text": "Let me check."},
            {"type": "tool_use", "id": "toolu_1", "name": "get_weather", "input": {"city": "Paris"}}
        ],
        "stop_reason": "tool_use",
        "usage": {"input_tokens": 30, "output_tokens": 20}
    })
}

pub fn anthropic_error(kind: &str, message: &str) -> Value {
    json!({"type": "error", "error": {"type": kind, "message": message}})
}

pub fn anthropic_batch(id: &str, status: &str, results_url: Option<&str>) -> Value {
    json!({
        "id": id,
        "type": "message_batch",
        "processing_status": status,
        "request_counts": {"processing": 0, "succeeded": 1, "errored": 1, "canceled": 0, "expired": 0},
        "created_at": "2025-06-01T10:00:00Z",
        "ended_at": (status == "ended").then_some("2025-06-01T10:30:00Z"),
        "results_url": results_url
    })
}

/// Text then a tool call with fragmented arguments
pub fn anthropic_stream_body() -> String {
    sse_with_names(&[
        ("message_start", json!({"type": "message_start", "message": {"usage": {"input_tokens": 25, "output_tokens": 1}}})),
        ("content_block_start", json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}})),
        ("content_block_delta", json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "Checking "}})),
        ("content_block_delta", json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "now."}})),
        ("content_block_stop", json!({"type": "content_block_stop", "index": 0})),
        ("content_block_start", json!({"type": "content_block_start", "index": 1, "content_block": {"type": "tool_use", "id": "toolu_9", "name": "get_weather", "input": {}}})),
        ("content_block_delta", json!({"type": "content_block_delta", "index": 1, "delta": {"type": "input_json_delta", "partial_json": "{\"city\": "}})),
        ("content_block_delta", json!({"type": "content_block_delta", "index": 1, "delta": {"type": "input_json_delta", "partial_json": "\"Paris\"}"}})),
        ("content_block_stop", json!({"type": "content_block_stop", "index": 1})),
        ("message_delta", json!({"type": "message_delta", "delta": {"stop_reason": "tool_use"}, "usage": {"output_tokens": 18}})),
        ("message_stop", json!({"type": "message_stop"})),
    ])
}

// OpenAI payloads

pub fn openai_completion(text: &str) -> Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "created": 1_735_689_600,
        "model": "gpt-4o-2024-08-06",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": text},
            "finish_reason": "stop"
        }],
        "usage": {
            "prompt_tokens": 11,
            "completion_tokens": 9,
            "total_tokens": 20,
            "completion_tokens_details": {"reasoning_tokens": 4}
        }
    })
}

pub fn openai_error(code: &str, message: &str) -> Value {
    json!({"error": {"message": message, "type": "invalid_request_error", "param": null, "code": code}})
}

pub fn openai_stream_body() -> String {
    let mut chunks = vec![
        json!({"choices": [{"index": 0, "delta": {"role": "assistant", "content": "Hel"}, "finish_reason": null}]}),
        json!({"choices": [{"index": 0, "delta": {"content": "lo"}, "finish_reason": null}]}),
        json!({"choices": [{"index": 0, "delta": {"tool_calls": [{"index": 0, "id": "call_7", "type": "function", "function": {"name": "get_weather", "arguments": ""}}]}, "finish_reason": null}]}),
        json!({"choices": [{"index": 0, "delta": {"tool_calls": [{"index": 0, "function": {"arguments": "{\"city\":"}}]}, "finish_reason": null}]}),
        json!({"choices": [{"index": 0, "delta": {"tool_calls": [{"index": 0, "function": {"arguments": "\"Paris\"}"}}]}, "finish_reason": null}]}),
        json!({"choices": [{"index": 0, "delta": {}, "finish_reason": "tool_calls"}]}),
        json!({"choices": [], "usage": {"prompt_tokens": 40, "completion_tokens": 15, "total_tokens": 55}}),
    ]
    .into_iter()
    .map(|chunk| chunk.to_string())
    .collect::<Vec<_>>();
    chunks.push("[DONE]".to_string());
    sse_data(&chunks)
}

pub fn openai_batch(id: &str, status: &str, output_file_id: Option<&str>) -> Value {
    json!({
        "id": id,
        "object": "batch",
        "endpoint": "/v1/chat/completions",
        "input_file_id": "file-in",
        "completion_window": "24h",
        "status": status,
        "output_file_id": output_file_id,
        "error_file_id": null,
        "created_at": 1_735_689_600,
        "completed_at": (status == "completed").then_some(1_735_693_200),
        "request_counts": {"total": 2, "completed": 1, "failed": 1}
    })
}

// Gemini payloads

pub fn gemini_response(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP"
        }],
        "usageMetadata": {"promptTokenCount": 8, "candidatesTokenCount": 5, "thoughtsTokenCount": 3},
        "modelVersion": "gemini-2.5-flash-001"
    })
}

pub fn google_error(code: u16, status: &str, message: &str) -> Value {
    json!({"error": {"code": code, "message": message, "status": status}})
}

pub fn gemini_stream_body() -> String {
    let chunks = [
        json!({"candidates": [{"content": {"role": "model", "parts": [{"text": "Sunny "}]}}]}),
        json!({"candidates": [{"content": {"role": "model", "parts": [{"functionCall": {"name": "get_weather", "args": {"city": "Paris"}}}]}}]}),
        json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": "today."}]}, "finishReason": "STOP"}],
            "usageMetadata": {"promptTokenCount": 9, "candidatesTokenCount": 7}
        }),
    ]
    .iter()
    .map(Value::to_string)
    .collect::<Vec<_>>();
    sse_data(&chunks)
}

pub fn vertex_batch_job(name: &str, state: &str) -> Value {
    json!({
        "name": name,
        "displayName": "gateway-batch",
        "model": "publishers/google/models/gemini-2.5-pro",
        "state": state,
        "createTime": "2025-06-01T10:00:00Z",
        "endTime": (state == "JOB_STATE_SUCCEEDED").then_some("2025-06-01T11:00:00Z"),
        "inputConfig": {"instancesFormat": "jsonl", "gcsSource": {"uris": ["gs://test-bucket/in/input.jsonl"]}},
        "outputConfig": {"predictionsFormat": "jsonl", "gcsDestination": {"outputUriPrefix": "gs://test-bucket/out"}},
        "outputInfo": {"gcsOutputDirectory": "gs://test-bucket/out/prediction-1"},
        "completionStats": {"successfulCount": "1", "failedCount": "1"}
    })
}

// SSE framing

/// `data:`-only events
pub fn sse_data(payloads: &[String]) -> String {
    payloads.iter().map(|p| format!("data: {p}\n\n")).collect()
}

/// Named events
pub fn sse_with_names(events: &[(&str, Value)]) -> String {
    events
        .iter()
        .map(|(name, data)| format!("event: {name}\ndata: {data}\n\n"))
        .collect()
}

/// JSON Lines body
pub fn jsonl(lines: &[Value]) -> String {
    lines.iter().map(|l| format!("{l}\n")).collect()
}
