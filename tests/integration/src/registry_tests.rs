//! Config file to registry to live call

use crate::fixtures::*;
use crate::mock_providers::*;
use gateway_config::{load_config, ConfigError};
use gateway_core::{GatewayError, LanguageModel};
use gateway_providers::Registry;
use pretty_assertions::assert_eq;
use std::io::Write;
use std::path::Path;
use tokio_util::sync::CancellationToken;

fn write_config(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).expect("create config");
    file.write_all(content.as_bytes()).expect("write config");
    path
}

#[tokio::test]
async fn test_yaml_config_to_generation() {
    let anthropic = MockAnthropic::new().await;
    anthropic.mock_messages(200, anthropic_message("From YAML")).await;
    let google = MockGoogle::new().await;
    google
        .mock_vertex_generate("gemini-2.5-pro", gemini_response("From Vertex"))
        .await;

    let yaml = format!(
        r#"
default_target: claude
targets:
  claude:
    provider: anthropic
    model: claude-sonnet-4-5
    api_key: ${{IT_UNSET_ANTHROPIC_KEY:-{TEST_KEY}}}
    base_url: {anthropic}
    timeout: 5s
  pro:
    provider: vertex
    model: gemini-2.5-pro
    project_id: test-project
    location: ${{IT_UNSET_VERTEX_LOCATION:-us-central1}}
    base_url: {google}
    properties:
      access_token: test-token
"#,
        anthropic = anthropic.url(),
        google = google.url(),
    );
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_config(dir.path(), "gateway.yaml", &yaml);

    let config = load_config(Some(&path)).await.expect("config");
    assert_eq!(config.default_target_name(), Some("claude"));

    let registry = Registry::from_config(&config).expect("registry");
    assert_eq!(registry.names(), vec!["claude", "pro"]);

    let claude = registry.get("claude").expect("claude");
    let result = claude
        .generate_text(&prompt("hi"), &CancellationToken::new())
        .await
        .expect("generation");
    assert_eq!(result.text(), "From YAML");

    let pro = registry.get("pro").expect("pro");
    assert_eq!(pro.provider(), "vertex");
    let result = pro
        .generate_text(&prompt("hi"), &CancellationToken::new())
        .await
        .expect("generation");
    assert_eq!(result.text(), "From Vertex");

    registry.close_all().await.expect("close");
    assert!(matches!(
        claude
            .generate_text(&prompt("hi"), &CancellationToken::new())
            .await,
        Err(GatewayError::Closed { .. })
    ));
}

#[tokio::test]
async fn test_toml_config() {
    let openai = MockOpenAI::new().await;
    openai.mock_chat(200, openai_completion("From TOML")).await;

    let toml = format!(
        r#"
[targets.gpt]
provider = "openai"
model = "gpt-4o"
api_key = "{TEST_KEY}"
base_url = "{url}"
max_tokens = 128
"#,
        url = openai.url(),
    );
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_config(dir.path(), "gateway.toml", &toml);

    let config = load_config(Some(&path)).await.expect("config");
    // a single target is the default
    assert_eq!(config.default_target_name(), Some("gpt"));

    let registry = Registry::from_config(&config).expect("registry");
    let result = registry
        .get("gpt")
        .expect("gpt")
        .generate_text(&prompt("hi"), &CancellationToken::new())
        .await
        .expect("generation");
    assert_eq!(result.text(), "From TOML");

    let body = request_json(&openai.requests().await[0]);
    assert_eq!(body["max_completion_tokens"], 128);
}

#[tokio::test]
async fn test_unknown_provider_in_config() {
    let yaml = r"
targets:
  titan:
    provider: bedrock
    model: amazon.titan-text-express-v1
";
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_config(dir.path(), "gateway.yml", yaml);

    let config = load_config(Some(&path)).await.expect("config");
    let err = Registry::from_config(&config).expect_err("unknown provider");

    assert!(matches!(err, GatewayError::Configuration { .. }));
    assert!(err.to_string().contains("bedrock"));
}

#[tokio::test]
async fn test_config_errors() {
    let dir = tempfile::tempdir().expect("tempdir");

    let missing_env = write_config(
        dir.path(),
        "env.yaml",
        "targets:\n  a:\n    provider: openai\n    model: gpt-4o\n    api_key: ${IT_NEVER_SET_KEY}\n",
    );
    let err = load_config(Some(&missing_env)).await.expect_err("missing env");
    assert!(matches!(err, ConfigError::MissingEnv(name) if name == "IT_NEVER_SET_KEY"));

    let bad_default = write_config(
        dir.path(),
        "default.yaml",
        "default_target: nope\ntargets:\n  a:\n    provider: openai\n    model: gpt-4o\n",
    );
    let err = load_config(Some(&bad_default)).await.expect_err("bad default");
    assert!(matches!(err, ConfigError::Validation(_)));

    let vertex_without_project = write_config(
        dir.path(),
        "vertex.yaml",
        "targets:\n  v:\n    provider: vertex\n    model: gemini-2.5-pro\n",
    );
    let err = load_config(Some(&vertex_without_project))
        .await
        .expect_err("missing project");
    assert!(err.to_string().contains("project_id"));

    let err = load_config(Some(&dir.path().join("gateway.json")))
        .await
        .expect_err("unsupported format");
    assert!(matches!(err, ConfigError::UnsupportedFormat(ext) if ext == "json"));
}
