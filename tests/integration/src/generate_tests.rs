//! Single-generation round trips through each adapter

use crate::fixtures::*;
use crate::mock_providers::*;
use gateway_core::{ContentBlock, LanguageModel, Message, StopReason, ToolCall, Usage};
use gateway_providers::{AnthropicModel, GoogleModel, OpenAiModel};
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_anthropic_generate_text() {
    let mock = MockAnthropic::new().await;
    mock.mock_messages(200, anthropic_message("Hello there")).await;

    let model = AnthropicModel::from_target(&anthropic_target(&mock.url())).expect("model");
    let result = model
        .generate_text(&prompt("Hi"), &CancellationToken::new())
        .await
        .expect("generation");

    assert_eq!(result.text(), "Hello there");
    assert_eq!(result.stop_reason, StopReason::EndTurn);
    assert_eq!(result.usage, Usage::new(12, 6, 0));
    assert_eq!(result.model_id, "claude-sonnet-4-5");
    assert!(result.raw_request.is_some());
    assert_eq!(result.raw_response, Some(anthropic_message("Hello there")));
}

#[tokio::test]
async fn test_anthropic_request_shape() {
    let mock = MockAnthropic::new().await;
    mock.mock_messages(200, anthropic_tool_message()).await;

    let model = AnthropicModel::from_target(&anthropic_target(&mock.url())).expect("model");
    let result = model
        .generate_text(&weather_prompt(), &CancellationToken::new())
        .await
        .expect("generation");

    assert_eq!(result.stop_reason, StopReason::ToolUse);
    let calls = result.tool_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].arguments, json!({"city": "Paris"}));

    let requests = mock.requests().await;
    let body = request_json(&requests[0]);
    assert_eq!(body["model"], "claude-sonnet-4-5");
    assert_eq!(body["system"], "You answer weather questions.");
    assert_eq!(body["max_tokens"], 4096);
    assert_eq!(body["messages"][0]["role"], "user");
    assert_eq!(body["tools"][0]["name"], "get_weather");
    assert_eq!(body["tools"][0]["input_schema"]["required"], json!(["city"]));
}

#[tokio::test]
async fn test_anthropic_tool_result_turn() {
    let mock = MockAnthropic::new().await;
    mock.mock_messages(200, anthropic_message("It is sunny.")).await;

    let mut options = weather_prompt();
    options.messages.push(Message::assistant_tool_calls(vec![ToolCall::new(
        "toolu_1",
        "get_weather",
        json!({"city": "Paris"}),
    )]));
    options
        .messages
        .push(Message::tool_result("toolu_1", "22C and sunny", false));

    let model = AnthropicModel::from_target(&anthropic_target(&mock.url())).expect("model");
    model
        .generate_text(&options, &CancellationToken::new())
        .await
        .expect("generation");

    let body = request_json(&mock.requests().await[0]);
    let messages = body["messages"].as_array().expect("messages");
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1]["content"][0]["type"], "tool_use");
    assert_eq!(messages[2]["role"], "user");
    assert_eq!(messages[2]["content"][0]["type"], "tool_result");
    assert_eq!(messages[2]["content"][0]["tool_use_id"], "toolu_1");
}

#[tokio::test]
async fn test_openai_generate_text() {
    let mock = MockOpenAI::new().await;
    mock.mock_chat(200, openai_completion("Bonjour")).await;

    let model = OpenAiModel::from_target(&openai_target(&mock.url())).expect("model");
    let result = model
        .generate_text(&prompt("Say hello in French"), &CancellationToken::new())
        .await
        .expect("generation");

    assert_eq!(result.text(), "Bonjour");
    assert_eq!(result.stop_reason, StopReason::EndTurn);
    // reasoning tokens are reported separately from output tokens
    assert_eq!(result.usage, Usage::new(11, 5, 4));
    assert_eq!(result.usage.total_tokens, 20);
}

#[tokio::test]
async fn test_openai_extensions_and_defaults() {
    let mock = MockOpenAI::new().await;
    mock.mock_chat(200, openai_completion("ok")).await;

    let mut target = openai_target(&mock.url());
    target.max_tokens = Some(256);
    target.temperature = Some(0.2);
    let model = OpenAiModel::from_target(&target).expect("model");

    let mut options = prompt("hi");
    options.temperature = Some(0.9);
    options.extensions.insert("seed".to_string(), json!(7));
    model
        .generate_text(&options, &CancellationToken::new())
        .await
        .expect("generation");

    let body = request_json(&mock.requests().await[0]);
    assert_eq!(body["seed"], 7);
    assert_eq!(body["max_completion_tokens"], 256);
    let temperature = body["temperature"].as_f64().expect("temperature");
    assert!((temperature - 0.9).abs() < 1e-6);
    assert_eq!(body["messages"], json!([{"role": "user", "content": "hi"}]));
}

#[tokio::test]
async fn test_gemini_generate_text() {
    let mock = MockGoogle::new().await;
    mock.mock_generate("gemini-2.5-flash", 200, gemini_response("Hola"))
        .await;

    let model = GoogleModel::gemini(&gemini_target(&mock.url())).expect("model");
    let result = model
        .generate_text(&weather_prompt(), &CancellationToken::new())
        .await
        .expect("generation");

    assert_eq!(result.text(), "Hola");
    assert_eq!(result.usage, Usage::new(8, 5, 3));
    assert_eq!(result.model_id, "gemini-2.5-flash-001");

    let body = request_json(&mock.requests().await[0]);
    assert_eq!(
        body["systemInstruction"]["parts"][0]["text"],
        "You answer weather questions."
    );
    assert_eq!(body["contents"][0]["role"], "user");
    assert_eq!(
        body["tools"][0]["functionDeclarations"][0]["name"],
        "get_weather"
    );
}

#[tokio::test]
async fn test_vertex_generate_text() {
    let mock = MockGoogle::new().await;
    mock.mock_vertex_generate("gemini-2.5-pro", gemini_response("Ciao"))
        .await;

    let model = GoogleModel::vertex(&vertex_target(&mock.url())).expect("model");
    assert_eq!(model.provider(), "vertex");
    let result = model
        .generate_text(&prompt("hi"), &CancellationToken::new())
        .await
        .expect("generation");

    assert_eq!(
        result.content,
        vec![ContentBlock::text("Ciao")]
    );
}
