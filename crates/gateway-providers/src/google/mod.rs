//! Google Gemini adapter for the Gemini API and Vertex AI.
//!
//! Both surfaces speak the same `generateContent` protocol and differ in endpoint layout
//! and authentication:
//!
//! - Gemini API: `{base}/v1beta/models/{model}:{action}` with an `x-goog-api-key` header
//! - Vertex AI: `{base}/v1/projects/{project}/locations/{location}/publishers/google/models/{model}:{action}`
//!   with a bearer token, where `{base}` is the regional `aiplatform` host
//!
//! Batch prediction is only available on Vertex AI and stages JSONL through Cloud Storage.

mod batch;
mod mapping;
mod types;

use crate::common::{check_target, encode_body, non_blank, require_api_key, ModelDefaults};
use crate::http::{build_client, Call};
use crate::registry::ProviderFactory;
use crate::sse::drive_sse;
use async_trait::async_trait;
use gateway_config::TargetConfig;
use gateway_core::{
    spawn_stream, BatchCapableModel, Capabilities, GatewayError, GatewayResult,
    GenerateTextOptions, GenerateTextResult, LanguageModel, Lifecycle, RawClient, Sentinel,
    StreamIterator,
};
use gateway_telemetry::provider_span;
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, Instrument};

/// Provider name for the Gemini API
pub const GEMINI_PROVIDER: &str = "gemini";

/// Provider name for Vertex AI
pub const VERTEX_PROVIDER: &str = "vertex";

/// Gemini API endpoint
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Cloud Storage endpoint used to stage batch files
pub const STORAGE_BASE_URL: &str = "https://storage.googleapis.com";

/// Which Google surface a client talks to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GoogleApiType {
    /// Gemini API, authenticated with an API key
    GeminiApi,
    /// Vertex AI in a project and location, authenticated with an OAuth access token
    VertexAi {
        /// Google Cloud project ID
        project_id: String,
        /// Region such as `us-central1`, or `global`
        location: String,
    },
}

impl GoogleApiType {
    /// Provider name for this surface
    #[must_use]
    pub fn provider(&self) -> &'static str {
        match self {
            Self::GeminiApi => GEMINI_PROVIDER,
            Self::VertexAi { .. } => VERTEX_PROVIDER,
        }
    }

    /// Default API host
    #[must_use]
    pub fn default_base_url(&self) -> String {
        match self {
            Self::GeminiApi => GEMINI_BASE_URL.to_string(),
            Self::VertexAi { location, .. } if location == "global" => {
                "https://aiplatform.googleapis.com".to_string()
            }
            Self::VertexAi { location, .. } => format!("https://{location}-aiplatform.googleapis.com"),
        }
    }
}

/// Authenticated client for one Google surface. Exposed through
/// [`LanguageModel::raw_client`].
#[derive(Debug, Clone)]
pub struct GoogleClient {
    http: Client,
    api_type: GoogleApiType,
    base_url: String,
    storage_base_url: String,
    credential: SecretString,
}

impl GoogleClient {
    /// Create a client over an existing HTTP pool. `credential` is the API key for the
    /// Gemini API or an access token for Vertex AI.
    pub fn new(
        http: Client,
        api_type: GoogleApiType,
        base_url: Option<&str>,
        credential: SecretString,
    ) -> Self {
        let base_url = base_url
            .map_or_else(|| api_type.default_base_url(), str::to_string)
            .trim_end_matches('/')
            .to_string();
        Self {
            http,
            api_type,
            base_url,
            storage_base_url: STORAGE_BASE_URL.to_string(),
            credential,
        }
    }

    /// Override the Cloud Storage endpoint
    #[must_use]
    pub fn with_storage_base_url(mut self, url: impl Into<String>) -> Self {
        self.storage_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Surface this client talks to
    #[must_use]
    pub fn api_type(&self) -> &GoogleApiType {
        &self.api_type
    }

    /// Underlying HTTP client
    #[must_use]
    pub fn http(&self) -> &Client {
        &self.http
    }

    /// API host
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Project and location resource prefix, Vertex AI only
    fn location_path(&self) -> Option<String> {
        match &self.api_type {
            GoogleApiType::GeminiApi => None,
            GoogleApiType::VertexAi {
                project_id,
                location,
            } => Some(format!("/v1/projects/{project_id}/locations/{location}")),
        }
    }

    /// URL of a model action such as `generateContent`
    #[must_use]
    pub fn model_url(&self, model: &str, action: &str) -> String {
        match self.location_path() {
            None => format!("{}/v1beta/models/{model}:{action}", self.base_url),
            Some(prefix) => format!(
                "{}{prefix}/publishers/google/models/{model}:{action}",
                self.base_url
            ),
        }
    }

    /// URL of the batch prediction collection, Vertex AI only
    pub(crate) fn batch_jobs_url(&self) -> Option<String> {
        self.location_path()
            .map(|prefix| format!("{}{prefix}/batchPredictionJobs", self.base_url))
    }

    pub(crate) fn storage_url(&self, path: &str) -> String {
        format!("{}{path}", self.storage_base_url)
    }

    /// Attach credentials to a request
    pub fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.api_type {
            GoogleApiType::GeminiApi => {
                request.header("x-goog-api-key", self.credential.expose_secret())
            }
            GoogleApiType::VertexAi { .. } => request.bearer_auth(self.credential.expose_secret()),
        }
    }

    pub(crate) fn post(&self, url: &str) -> RequestBuilder {
        self.authorize(self.http.post(url))
    }

    pub(crate) fn get(&self, url: &str) -> RequestBuilder {
        self.authorize(self.http.get(url))
    }
}

/// A Gemini model on either surface
#[derive(Debug)]
pub struct GoogleModel {
    model_id: String,
    client: GoogleClient,
    defaults: ModelDefaults,
    lifecycle: Lifecycle,
    /// Cloud Storage bucket for batch staging; batch support requires it
    batch_bucket: Option<String>,
}

impl GoogleModel {
    /// Create a model over a configured client
    pub fn new(model_id: impl Into<String>, client: GoogleClient, defaults: ModelDefaults) -> Self {
        Self {
            model_id: model_id.into(),
            client,
            defaults,
            lifecycle: Lifecycle::default(),
            batch_bucket: None,
        }
    }

    /// Enable batch prediction staged through the given bucket. Ignored on the Gemini API.
    #[must_use]
    pub fn with_batch_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.batch_bucket = Some(bucket.into());
        self
    }

    /// Build a Gemini API model from a target configuration
    ///
    /// # Errors
    /// Returns a configuration error for an invalid target or a missing API key
    pub fn gemini(target: &TargetConfig) -> GatewayResult<Self> {
        check_target(target)?;
        let api_key = require_api_key(target)?;
        let http = build_client(GEMINI_PROVIDER, target.timeout)?;
        let client = GoogleClient::new(
            http,
            GoogleApiType::GeminiApi,
            target.base_url.as_deref(),
            api_key,
        );

        debug!(model = %target.model, "Created Gemini API model");
        Ok(Self::new(target.model.clone(), client, ModelDefaults::from_target(target)))
    }

    /// Build a Vertex AI model from a target configuration.
    ///
    /// The access token comes from `api_key` or the `access_token` property. Setting the
    /// `batch_bucket` property enables batch prediction; `storage_base_url` overrides the
    /// Cloud Storage endpoint.
    ///
    /// # Errors
    /// Returns a configuration error for an invalid target or without a project, location or
    /// access token
    pub fn vertex(target: &TargetConfig) -> GatewayResult<Self> {
        check_target(target)?;
        let project_id = target
            .project_id
            .clone()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| {
                GatewayError::configuration("project_id is required for provider 'vertex'")
            })?;
        let location = target
            .location
            .clone()
            .filter(|l| !l.trim().is_empty())
            .ok_or_else(|| {
                GatewayError::configuration("location is required for provider 'vertex'")
            })?;
        let token = target
            .api_key
            .clone()
            .filter(non_blank)
            .or_else(|| {
                target
                    .property_str("access_token")
                    .map(|t| SecretString::new(t.to_string()))
                    .filter(non_blank)
            })
            .ok_or_else(|| {
                GatewayError::configuration(
                    "an access token (api_key or properties.access_token) is required for provider 'vertex'",
                )
            })?;

        let http = build_client(VERTEX_PROVIDER, target.timeout)?;
        let mut client = GoogleClient::new(
            http,
            GoogleApiType::VertexAi {
                project_id,
                location,
            },
            target.base_url.as_deref(),
            token,
        );
        if let Some(storage) = target.property_str("storage_base_url") {
            client = client.with_storage_base_url(storage);
        }

        let mut model = Self::new(target.model.clone(), client, ModelDefaults::from_target(target));
        if let Some(bucket) = target.property_str("batch_bucket") {
            model = model.with_batch_bucket(bucket);
        }

        debug!(
            model = %target.model,
            base_url = %model.client.base_url,
            batch = model.batch_bucket.is_some(),
            "Created Vertex AI model"
        );
        Ok(model)
    }

    fn provider_name(&self) -> &'static str {
        self.client.api_type.provider()
    }

    fn call(&self, sentinel: Sentinel) -> Call<'static> {
        Call::new(self.provider_name(), sentinel, mapping::parse_error)
    }

    fn supports_batch(&self) -> bool {
        matches!(self.client.api_type, GoogleApiType::VertexAi { .. }) && self.batch_bucket.is_some()
    }

    pub(crate) fn request_body(
        &self,
        options: &GenerateTextOptions,
        sentinel: Sentinel,
    ) -> GatewayResult<serde_json::Value> {
        let prepared = self.defaults.prepare(options)?;
        let request = mapping::to_request(&prepared)?;
        encode_body(self.provider_name(), sentinel, &request, &prepared.extensions)
    }
}

#[async_trait]
impl LanguageModel for GoogleModel {
    fn provider(&self) -> &str {
        self.provider_name()
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
            batch_processing: self.supports_batch(),
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
        let body = self.request_body(options, Sentinel::Generation)?;

        let url = self.client.model_url(&self.model_id, "generateContent");
        let mut request = self.client.post(&url).json(&body);
        if let Some(timeout) = self.defaults.timeout {
            request = request.timeout(timeout);
        }

        let (response, raw) = self
            .call(Sentinel::Generation)
            .json::<types::GenerateContentResponse>(request, Some(cancel))
            .instrument(provider_span!(self.provider_name(), self.model_id, "generate_text"))
            .await?;

        Ok(mapping::from_response(&self.model_id, response).with_raw(Some(body), Some(raw)))
    }

    fn stream_text(
        &self,
        options: &GenerateTextOptions,
        cancel: &CancellationToken,
    ) -> GatewayResult<StreamIterator> {
        self.lifecycle.ensure_open(&self.model_id)?;
        let body = self.request_body(options, Sentinel::Stream)?;

        let url = self.client.model_url(&self.model_id, "streamGenerateContent");
        let request = self
            .client
            .post(&url)
            .query(&[("alt", "sse")])
            .json(&body);

        let provider = self.provider_name();
        let call = self.call(Sentinel::Stream);
        let span = provider_span!(provider, self.model_id, "stream_text");
        Ok(spawn_stream(provider, self.model_id.clone(), cancel, move |sink| {
            drive_sse(call, request, mapping::StreamMapper::new(provider), sink).instrument(span)
        }))
    }

    fn as_batch(&self) -> Option<&dyn BatchCapableModel> {
        if self.supports_batch() {
            Some(self)
        } else {
            None
        }
    }

    fn raw_client(&self) -> RawClient<'_> {
        RawClient::new(&self.client)
    }

    async fn close(&self) -> GatewayResult<()> {
        if self.lifecycle.close() {
            debug!(provider = self.provider_name(), model = %self.model_id, "Closed Google model");
        }
        Ok(())
    }
}

/// Builds Gemini API models for `provider: gemini` targets
#[derive(Debug, Default, Clone, Copy)]
pub struct GeminiFactory;

impl ProviderFactory for GeminiFactory {
    fn provider(&self) -> &'static str {
        GEMINI_PROVIDER
    }

    fn create_model(&self, target: &TargetConfig) -> GatewayResult<Arc<dyn LanguageModel>> {
        Ok(Arc::new(GoogleModel::gemini(target)?))
    }
}

/// Builds Vertex AI models for `provider: vertex` targets
#[derive(Debug, Default, Clone, Copy)]
pub struct VertexFactory;

impl ProviderFactory for VertexFactory {
    fn provider(&self) -> &'static str {
        VERTEX_PROVIDER
    }

    fn create_model(&self, target: &TargetConfig) -> GatewayResult<Arc<dyn LanguageModel>> {
        Ok(Arc::new(GoogleModel::vertex(target)?))
    }
}
