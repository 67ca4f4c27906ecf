//! Mock vendor APIs for integration testing
//!
//! One wiremock server per test, with helpers that mount the routes each adapter calls.

use crate::fixtures::TEST_KEY;
use serde_json::Value;
use std::time::Duration;
use wiremock::matchers::{header, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

/// Mock Anthropic Messages API
pub struct MockAnthropic {
    pub server: MockServer,
}

impl MockAnthropic {
    pub async fn new() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// `POST /v1/messages` answering with a JSON body
    pub async fn mock_messages(&self, status: u16, body: Value) {
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", TEST_KEY))
            .and(header("anthropic-version", "2023-06-01"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// `POST /v1/messages` answering with an event stream
    pub async fn mock_stream(&self, body: String) {
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(event_stream(body))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_batch_get(&self, id: &str, body: Value) {
        Mock::given(method("GET"))
            .and(path(format!("/v1/messages/batches/{id}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_batch_create(&self, body: Value) {
        Mock::given(method("POST"))
            .and(path("/v1/messages/batches"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(1)
            .mount(&self.server)
            .await;
    }

    pub async fn mock_batch_results(&self, id: &str, body: String) {
        Mock::given(method("GET"))
            .and(path(format!("/v1/messages/batches/{id}/results")))
            .and(header("x-api-key", TEST_KEY))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/binary"))
            .mount(&self.server)
            .await;
    }

    /// Requests received so far, in order
    pub async fn requests(&self) -> Vec<Request> {
        self.server.received_requests().await.unwrap_or_default()
    }
}

/// Mock OpenAI Chat Completions, Files and Batches APIs
pub struct MockOpenAI {
    pub server: MockServer,
}

impl MockOpenAI {
    pub async fn new() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// `POST /v1/chat/completions` answering with a JSON body
    pub async fn mock_chat(&self, status: u16, body: Value) {
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", format!("Bearer {TEST_KEY}").as_str()))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// `POST /v1/chat/completions` answering after a delay
    pub async fn mock_chat_delayed(&self, body: Value, delay: Duration) {
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body).set_delay(delay))
            .mount(&self.server)
            .await;
    }

    /// `POST /v1/chat/completions` answering with an event stream
    pub async fn mock_stream(&self, body: String) {
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(event_stream(body))
            .mount(&self.server)
            .await;
    }

    /// `POST /v1/chat/completions` whose event stream starts only after a delay
    pub async fn mock_stream_delayed(&self, body: String, delay: Duration) {
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(event_stream(body).set_delay(delay))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_file_upload(&self, file_id: &str) {
        Mock::given(method("POST"))
            .and(path("/v1/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": file_id,
                "object": "file",
                "purpose": "batch",
                "filename": "batch.jsonl",
                "bytes": 512
            })))
            .expect(1)
            .mount(&self.server)
            .await;
    }

    pub async fn mock_batch_create(&self, body: Value) {
        Mock::given(method("POST"))
            .and(path("/v1/batches"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(1)
            .mount(&self.server)
            .await;
    }

    pub async fn mock_batch_get(&self, id: &str, body: Value) {
        Mock::given(method("GET"))
            .and(path(format!("/v1/batches/{id}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_batch_list(&self, body: Value) {
        Mock::given(method("GET"))
            .and(path("/v1/batches"))
            .and(query_param("limit", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_batch_cancel(&self, id: &str, body: Value) {
        Mock::given(method("POST"))
            .and(path(format!("/v1/batches/{id}/cancel")))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_file_content(&self, file_id: &str, body: String) {
        Mock::given(method("GET"))
            .and(path(format!("/v1/files/{file_id}/content")))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/binary"))
            .mount(&self.server)
            .await;
    }

    /// Requests received so far, in order
    pub async fn requests(&self) -> Vec<Request> {
        self.server.received_requests().await.unwrap_or_default()
    }
}

/// Mock Gemini API, Vertex AI and Cloud Storage
pub struct MockGoogle {
    pub server: MockServer,
}

impl MockGoogle {
    pub async fn new() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// Gemini API `generateContent`
    pub async fn mock_generate(&self, model: &str, status: u16, body: Value) {
        Mock::given(method("POST"))
            .and(path(format!("/v1beta/models/{model}:generateContent")))
            .and(header("x-goog-api-key", TEST_KEY))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Gemini API `streamGenerateContent?alt=sse`
    pub async fn mock_stream(&self, model: &str, body: String) {
        Mock::given(method("POST"))
            .and(path(format!("/v1beta/models/{model}:streamGenerateContent")))
            .and(query_param("alt", "sse"))
            .respond_with(event_stream(body))
            .mount(&self.server)
            .await;
    }

    /// Vertex AI `generateContent` under the test project
    pub async fn mock_vertex_generate(&self, model: &str, body: Value) {
        Mock::given(method("POST"))
            .and(path(format!(
                "/v1/projects/test-project/locations/us-central1/publishers/google/models/{model}:generateContent"
            )))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Cloud Storage media upload into the test bucket
    pub async fn mock_object_upload(&self) {
        Mock::given(method("POST"))
            .and(path("/upload/storage/v1/b/test-bucket/o"))
            .and(query_param("uploadType", "media"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "bucket": "test-bucket",
                "name": "gateway-batches/run/input.jsonl"
            })))
            .expect(1)
            .mount(&self.server)
            .await;
    }

    pub async fn mock_batch_create(&self, body: Value) {
        Mock::given(method("POST"))
            .and(path(
                "/v1/projects/test-project/locations/us-central1/batchPredictionJobs",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(1)
            .mount(&self.server)
            .await;
    }

    pub async fn mock_batch_get(&self, job_id: &str, body: Value) {
        Mock::given(method("GET"))
            .and(path(format!(
                "/v1/projects/test-project/locations/us-central1/batchPredictionJobs/{job_id}"
            )))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Object listing under a prefix
    pub async fn mock_object_list(&self, names: &[&str]) {
        let items: Vec<Value> = names
            .iter()
            .map(|name| serde_json::json!({"name": name, "bucket": "test-bucket"}))
            .collect();
        Mock::given(method("GET"))
            .and(path("/storage/v1/b/test-bucket/o"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"items": items})),
            )
            .mount(&self.server)
            .await;
    }

    /// Media download of any object whose name matches `name_pattern`
    pub async fn mock_object_media(&self, name_pattern: &str, body: String) {
        Mock::given(method("GET"))
            .and(path_regex(format!(
                "^/storage/v1/b/test-bucket/o/{name_pattern}$"
            )))
            .and(query_param("alt", "media"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/binary"))
            .mount(&self.server)
            .await;
    }

    /// Requests received so far, in order
    pub async fn requests(&self) -> Vec<Request> {
        self.server.received_requests().await.unwrap_or_default()
    }
}

/// `200 text/event-stream` response carrying `body`
pub fn event_stream(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "text/event-stream")
}

/// JSON body of a received request
pub fn request_json(request: &Request) -> Value {
    serde_json::from_slice(&request.body).unwrap_or(Value::Null)
}
