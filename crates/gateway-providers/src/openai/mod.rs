//! OpenAI Chat Completions adapter.

mod batch;
mod mapping;
mod types;

use crate::common::{base_url, check_target, encode_body, require_api_key, ModelDefaults};
use crate::http::{build_client, transport_cause, Call};
use crate::registry::ProviderFactory;
use async_stream::try_stream;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use gateway_config::TargetConfig;
use gateway_core::{
    forward, spawn_stream, BatchCapableModel, Capabilities, Cause, GatewayError, GatewayResult,
    GenerateTextOptions, GenerateTextResult, LanguageModel, Lifecycle, RawClient, Sentinel,
    StreamIterator,
};
use gateway_telemetry::provider_span;
use reqwest::{Client, RequestBuilder};
use reqwest_eventsource::{Event, EventSource};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, Instrument};

/// Provider name
pub const PROVIDER: &str = "openai";

/// Public API endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

const CHAT_PATH: &str = "/v1/chat/completions";

/// Bearer-authenticated OpenAI client. Exposed through [`LanguageModel::raw_client`].
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: Client,
    base_url: String,
    api_key: SecretString,
    organization: Option<String>,
}

impl OpenAiClient {
    /// Create a client over an existing HTTP pool
    pub fn new(http: Client, base_url: impl Into<String>, api_key: SecretString) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key,
            organization: None,
        }
    }

    /// Send `OpenAI-Organization` with every request
    #[must_use]
    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    /// Underlying HTTP client
    #[must_use]
    pub fn http(&self) -> &Client {
        &self.http
    }

    /// API base URL
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST to a path under the base URL
    pub fn post(&self, path: &str) -> RequestBuilder {
        self.authorize(self.http.post(format!("{}{path}", self.base_url)))
    }

    /// GET a path under the base URL
    pub fn get(&self, path: &str) -> RequestBuilder {
        self.authorize(self.http.get(format!("{}{path}", self.base_url)))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.bearer_auth(self.api_key.expose_secret());
        match &self.organization {
            Some(organization) => request.header("OpenAI-Organization", organization),
            None => request,
        }
    }
}

/// A chat model behind the Chat Completions API
#[derive(Debug)]
pub struct OpenAiModel {
    model_id: String,
    client: OpenAiClient,
    defaults: ModelDefaults,
    lifecycle: Lifecycle,
}

impl OpenAiModel {
    /// Create a model over a configured client
    pub fn new(model_id: impl Into<String>, client: OpenAiClient, defaults: ModelDefaults) -> Self {
        Self {
            model_id: model_id.into(),
            client,
            defaults,
            lifecycle: Lifecycle::default(),
        }
    }

    /// Build a model from a target configuration
    ///
    /// # Errors
    /// Returns a configuration error for an invalid target or a missing API key, or a
    /// `client_construction` error
    pub fn from_target(target: &TargetConfig) -> GatewayResult<Self> {
        check_target(target)?;
        let api_key = require_api_key(target)?;
        let http = build_client(PROVIDER, target.timeout)?;
        let mut client = OpenAiClient::new(http, base_url(target, DEFAULT_BASE_URL), api_key);
        if let Some(organization) = target.property_str("organization") {
            client = client.with_organization(organization);
        }

        debug!(model = %target.model, base_url = %client.base_url, "Created OpenAI model");
        Ok(Self::new(
            target.model.clone(),
            client,
            ModelDefaults::from_target(target),
        ))
    }

    fn call(sentinel: Sentinel) -> Call<'static> {
        Call::new(PROVIDER, sentinel, mapping::parse_error)
    }

    pub(crate) fn request_body(
        &self,
        options: &GenerateTextOptions,
        sentinel: Sentinel,
        stream: bool,
    ) -> GatewayResult<serde_json::Value> {
        let prepared = self.defaults.prepare(options)?;
        let request = mapping::to_request(&self.model_id, &prepared, stream)?;
        encode_body(PROVIDER, sentinel, &request, &prepared.extensions)
    }
}

/// SSE `data` payloads until `[DONE]`, with failures classified as stream errors
fn event_data(mut source: EventSource) -> impl Stream<Item = GatewayResult<String>> + Send {
    try_stream! {
        while let Some(event) = source.next().await {
            match event {
                Ok(Event::Open) => trace!(provider = PROVIDER, "Event stream opened"),
                Ok(Event::Message(message)) => {
                    if message.data.trim() == "[DONE]" {
                        break;
                    }
                    yield message.data;
                }
                Err(reqwest_eventsource::Error::StreamEnded) => break,
                Err(err) => {
                    // Stop the built-in reconnect before reporting
                    source.close();
                    Err::<(), GatewayError>(eventsource_error(err).await)?;
                }
            }
        }
        source.close();
    }
}

async fn eventsource_error(err: reqwest_eventsource::Error) -> GatewayError {
    let cause = match err {
        reqwest_eventsource::Error::InvalidStatusCode(status, response) => {
            let body = response.text().await.unwrap_or_default();
            mapping::parse_error(status.as_u16(), &body)
        }
        reqwest_eventsource::Error::Transport(e) => transport_cause(&e),
        other => Cause::Decode(other.to_string()),
    };
    GatewayError::classify(PROVIDER, Sentinel::Stream, cause)
}

#[async_trait]
impl LanguageModel for OpenAiModel {
    fn provider(&self) -> &str {
        PROVIDER
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            streaming: true,
            tool_calling: true,
            vision: true,
            audio: true,
            batch_processing: true,
            structured_output: true,
            reasoning: true,
        }
    }

    async fn generate_text(
        &self,
        options: &GenerateTextOptions,
        cancel: &CancellationToken,
    ) -> GatewayResult<GenerateTextResult> {
        self.lifecycle.ensure_open(&self.model_id)?;
        let body = self.request_body(options, Sentinel::Generation, false)?;

        let mut request = self.client.post(CHAT_PATH).json(&body);
        if let Some(timeout) = self.defaults.timeout {
            request = request.timeout(timeout);
        }

        let (response, raw) = Self::call(Sentinel::Generation)
            .json::<types::ChatResponse>(request, Some(cancel))
            .instrument(provider_span!(PROVIDER, self.model_id, "generate_text"))
            .await?;

        let result = mapping::from_response(PROVIDER, Sentinel::Generation, &self.model_id, response)?;
        Ok(result.with_raw(Some(body), Some(raw)))
    }

    fn stream_text(
        &self,
        options: &GenerateTextOptions,
        cancel: &CancellationToken,
    ) -> GatewayResult<StreamIterator> {
        self.lifecycle.ensure_open(&self.model_id)?;
        let body = self.request_body(options, Sentinel::Stream, true)?;

        let source = EventSource::new(self.client.post(CHAT_PATH).json(&body)).map_err(|e| {
            GatewayError::classify(
                PROVIDER,
                Sentinel::Stream,
                Cause::Other(format!("failed to open event stream: {e}")),
            )
        })?;

        let span = provider_span!(PROVIDER, self.model_id, "stream_text");
        Ok(spawn_stream(PROVIDER, self.model_id.clone(), cancel, move |sink| {
            forward(event_data(source), mapping::StreamMapper::new(PROVIDER), sink).instrument(span)
        }))
    }

    fn as_batch(&self) -> Option<&dyn BatchCapableModel> {
        Some(self)
    }

    fn raw_client(&self) -> RawClient<'_> {
        RawClient::new(&self.client)
    }

    async fn close(&self) -> GatewayResult<()> {
        if self.lifecycle.close() {
            debug!(model = %self.model_id, "Closed OpenAI model");
        }
        Ok(())
    }
}

/// Builds [`OpenAiModel`]s for `provider: openai` targets
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenAiFactory;

impl ProviderFactory for OpenAiFactory {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    fn create_model(&self, target: &TargetConfig) -> GatewayResult<Arc<dyn LanguageModel>> {
        Ok(Arc::new(OpenAiModel::from_target(target)?))
    }
}
