//! Error classification over real HTTP responses

use crate::fixtures::*;
use crate::mock_providers::*;
use gateway_core::{Category, Cause, GatewayError, LanguageModel, Sentinel};
use gateway_providers::{AnthropicModel, GoogleModel, OpenAiModel};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_anthropic_status_classification() {
    let cases = [
        (429, "rate_limit_error", Some(Category::RateLimited)),
        (401, "authentication_error", Some(Category::AuthFailed)),
        (402, "billing_error", Some(Category::InsufficientCredits)),
        (400, "invalid_request_error", Some(Category::BadRequest)),
        (500, "api_error", Some(Category::ServiceUnavailable)),
        (529, "overloaded_error", Some(Category::ServiceUnavailable)),
        (404, "not_found_error", None),
    ];

    for (status, kind, expected) in cases {
        let mock = MockAnthropic::new().await;
        mock.mock_messages(status, anthropic_error(kind, "boom")).await;
        let model = AnthropicModel::from_target(&anthropic_target(&mock.url())).expect("model");

        let err = model
            .generate_text(&prompt("hi"), &CancellationToken::new())
            .await
            .expect_err("vendor error");

        assert!(err.is(Sentinel::Generation), "status {status}");
        assert_eq!(err.category(), expected, "status {status}");
        match err.cause() {
            Some(Cause::Api { status: got, code, message }) => {
                assert_eq!(*got, status);
                assert_eq!(code.as_deref(), Some(kind));
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected cause {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_openai_rate_limit_is_retryable() {
    let mock = MockOpenAI::new().await;
    mock.mock_chat(429, openai_error("rate_limit_exceeded", "Slow down"))
        .await;
    let model = OpenAiModel::from_target(&openai_target(&mock.url())).expect("model");

    let err = model
        .generate_text(&prompt("hi"), &CancellationToken::new())
        .await
        .expect_err("rate limited");

    assert!(err.is(Sentinel::Generation));
    assert!(err.is(Category::RateLimited));
    assert!(err.is_retryable());
    assert!(err.to_string().contains("openai"));
}

#[tokio::test]
async fn test_openai_auth_failure_is_not_retryable() {
    let mock = MockOpenAI::new().await;
    mock.mock_chat(401, openai_error("invalid_api_key", "Incorrect API key"))
        .await;
    let model = OpenAiModel::from_target(&openai_target(&mock.url())).expect("model");

    let err = model
        .generate_text(&prompt("hi"), &CancellationToken::new())
        .await
        .expect_err("unauthorized");

    assert!(err.is(Category::AuthFailed));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_gemini_error_envelope() {
    let mock = MockGoogle::new().await;
    mock.mock_generate(
        "gemini-2.5-flash",
        503,
        google_error(503, "UNAVAILABLE", "The model is overloaded."),
    )
    .await;
    let model = GoogleModel::gemini(&gemini_target(&mock.url())).expect("model");

    let err = model
        .generate_text(&prompt("hi"), &CancellationToken::new())
        .await
        .expect_err("unavailable");

    assert!(err.is(Category::ServiceUnavailable));
    assert_eq!(err.cause().and_then(Cause::status), Some(503));
    assert!(err.to_string().contains("gemini"));
}

#[tokio::test]
async fn test_unparseable_error_body() {
    let mock = MockOpenAI::new().await;
    wiremock::Mock::given(wiremock::matchers::method("POST"))
        .respond_with(wiremock::ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&mock.server)
        .await;
    let model = OpenAiModel::from_target(&openai_target(&mock.url())).expect("model");

    let err = model
        .generate_text(&prompt("hi"), &CancellationToken::new())
        .await
        .expect_err("server error");

    assert!(err.is(Category::ServiceUnavailable));
    assert!(err.to_string().contains("upstream exploded"));
}

#[tokio::test]
async fn test_malformed_success_body() {
    let mock = MockAnthropic::new().await;
    wiremock::Mock::given(wiremock::matchers::method("POST"))
        .respond_with(wiremock::ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&mock.server)
        .await;
    let model = AnthropicModel::from_target(&anthropic_target(&mock.url())).expect("model");

    let err = model
        .generate_text(&prompt("hi"), &CancellationToken::new())
        .await
        .expect_err("decode failure");

    assert!(err.is(Sentinel::Generation));
    assert!(matches!(err.cause(), Some(Cause::Decode(_))));
    assert_eq!(err.category(), None);
}

#[tokio::test]
async fn test_generate_cancelled_by_caller() {
    let mock = MockOpenAI::new().await;
    mock.mock_chat_delayed(openai_completion("late"), Duration::from_secs(10))
        .await;
    let model = OpenAiModel::from_target(&openai_target(&mock.url())).expect("model");

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = tokio::time::timeout(
        Duration::from_secs(2),
        model.generate_text(&prompt("hi"), &cancel),
    )
    .await
    .expect("cancellation returns promptly")
    .expect_err("cancelled");

    assert!(err.is_cancelled());
    assert!(err.is(Sentinel::Generation));
    assert!(err.is(Category::ServiceUnavailable));
}

#[tokio::test]
async fn test_validation_fails_before_network() {
    let mock = MockAnthropic::new().await;
    let model = AnthropicModel::from_target(&anthropic_target(&mock.url())).expect("model");

    let mut options = prompt("hi");
    options.temperature = Some(5.0);
    let err = model
        .generate_text(&options, &CancellationToken::new())
        .await
        .expect_err("invalid temperature");

    assert!(matches!(err, GatewayError::Validation { .. }));
    assert!(err.is(Category::BadRequest));
    assert!(mock.requests().await.is_empty());
}

#[tokio::test]
async fn test_closed_model_rejects_calls() {
    let mock = MockOpenAI::new().await;
    let model = OpenAiModel::from_target(&openai_target(&mock.url())).expect("model");

    model.close().await.expect("close");
    model.close().await.expect("second close is a no-op");

    let err = model
        .generate_text(&prompt("hi"), &CancellationToken::new())
        .await
        .expect_err("closed");
    assert!(matches!(err, GatewayError::Closed { .. }));
    assert!(model
        .stream_text(&prompt("hi"), &CancellationToken::new())
        .is_err());
    assert!(mock.requests().await.is_empty());
}

#[test]
fn test_missing_api_key_is_configuration_error() {
    let mut target = anthropic_target("http://localhost:1");
    target.api_key = None;
    let err = AnthropicModel::from_target(&target).expect_err("no key");
    assert!(matches!(err, GatewayError::Configuration { .. }));
}
