//! Anthropic Messages API adapter.

mod batch;
mod mapping;
mod types;

use crate::common::{base_url, check_target, encode_body, require_api_key, ModelDefaults};
use crate::http::{build_client, Call};
use crate::registry::ProviderFactory;
use crate::sse::drive_sse;
use async_trait::async_trait;
use gateway_config::TargetConfig;
use gateway_core::{
    spawn_stream, BatchCapableModel, Capabilities, GatewayResult, GenerateTextOptions,
    GenerateTextResult, LanguageModel, Lifecycle, RawClient, Sentinel, StreamIterator,
};
use gateway_telemetry::provider_span;
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, Instrument};

/// Provider name
pub const PROVIDER: &str = "anthropic";

/// Public API endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// `anthropic-version` header value, overridable with the `anthropic_version` property
pub const DEFAULT_API_VERSION: &str = "2023-06-01";

/// Authenticated Messages API client. Exposed through [`LanguageModel::raw_client`].
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    http: Client,
    base_url: String,
    api_key: SecretString,
    version: String,
}

impl AnthropicClient {
    /// Create a client over an existing HTTP pool
    pub fn new(
        http: Client,
        base_url: impl Into<String>,
        api_key: SecretString,
        version: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key,
            version: version.into(),
        }
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

    /// POST to a path under the base URL with authentication headers
    pub fn post(&self, path: &str) -> RequestBuilder {
        self.authorize(self.http.post(format!("{}{path}", self.base_url)))
    }

    /// GET a path under the base URL with authentication headers
    pub fn get(&self, path: &str) -> RequestBuilder {
        self.get_url(&format!("{}{path}", self.base_url))
    }

    /// GET an absolute URL, such as a batch `results_url`
    pub fn get_url(&self, url: &str) -> RequestBuilder {
        self.authorize(self.http.get(url))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", &self.version)
    }
}

/// A Claude model behind the Messages API
#[derive(Debug)]
pub struct AnthropicModel {
    model_id: String,
    client: AnthropicClient,
    defaults: ModelDefaults,
    lifecycle: Lifecycle,
}

impl AnthropicModel {
    /// Create a model over a configured client
    pub fn new(model_id: impl Into<String>, client: AnthropicClient, defaults: ModelDefaults) -> Self {
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
        let version = target
            .property_str("anthropic_version")
            .unwrap_or(DEFAULT_API_VERSION);
        let client = AnthropicClient::new(http, base_url(target, DEFAULT_BASE_URL), api_key, version);

        debug!(model = %target.model, base_url = %client.base_url, "Created Anthropic model");
        Ok(Self::new(
            target.model.clone(),
            client,
            ModelDefaults::from_target(target),
        ))
    }

    fn call(sentinel: Sentinel) -> Call<'static> {
        Call::new(PROVIDER, sentinel, mapping::parse_error)
    }

    /// Validate, apply defaults and encode a Messages request body
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

#[async_trait]
impl LanguageModel for AnthropicModel {
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
            audio: false,
            batch_processing: true,
            structured_output: false,
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

        let mut request = self.client.post("/v1/messages").json(&body);
        if let Some(timeout) = self.defaults.timeout {
            request = request.timeout(timeout);
        }

        let (response, raw) = Self::call(Sentinel::Generation)
            .json::<types::MessagesResponse>(request, Some(cancel))
            .instrument(provider_span!(PROVIDER, self.model_id, "generate_text"))
            .await?;

        Ok(mapping::from_response(&self.model_id, response).with_raw(Some(body), Some(raw)))
    }

    fn stream_text(
        &self,
        options: &GenerateTextOptions,
        cancel: &CancellationToken,
    ) -> GatewayResult<StreamIterator> {
        self.lifecycle.ensure_open(&self.model_id)?;
        let body = self.request_body(options, Sentinel::Stream, true)?;
        let request = self
            .client
            .post("/v1/messages")
            .header("accept", "text/event-stream")
            .json(&body);

        let span = provider_span!(PROVIDER, self.model_id, "stream_text");
        Ok(spawn_stream(PROVIDER, self.model_id.clone(), cancel, move |sink| {
            drive_sse(
                Self::call(Sentinel::Stream),
                request,
                mapping::StreamMapper::new(PROVIDER),
                sink,
            )
            .instrument(span)
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
            debug!(model = %self.model_id, "Closed Anthropic model");
        }
        Ok(())
    }
}

/// Builds [`AnthropicModel`]s for `provider: anthropic` targets
#[derive(Debug, Default, Clone, Copy)]
pub struct AnthropicFactory;

impl ProviderFactory for AnthropicFactory {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    fn create_model(&self, target: &TargetConfig) -> GatewayResult<Arc<dyn LanguageModel>> {
        Ok(Arc::new(AnthropicModel::from_target(target)?))
    }
}
