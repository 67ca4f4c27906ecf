//! Configuration types.

use crate::error::ConfigError;
use gateway_telemetry::LoggingConfig;
use secrecy::SecretString;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use validator::Validate;

/// Providers that need a project and location instead of an API key alone
const REGION_SCOPED_PROVIDERS: &[&str] = &["vertex"];

/// Root gateway configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Named targets, keyed by caller-chosen name
    #[serde(default)]
    pub targets: BTreeMap<String, TargetConfig>,

    /// Target used when the caller names none
    #[serde(default)]
    pub default_target: Option<String>,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl GatewayConfig {
    /// Validate every target and the default target reference
    ///
    /// # Errors
    /// Returns the first validation failure, prefixed with the target name
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, target) in &self.targets {
            target
                .check()
                .map_err(|e| ConfigError::Validation(format!("target '{name}': {e}")))?;
        }

        if let Some(default) = &self.default_target {
            if !self.targets.contains_key(default) {
                return Err(ConfigError::Validation(format!(
                    "default_target '{default}' is not a configured target"
                )));
            }
        }

        Ok(())
    }

    /// Look up a target by name
    #[must_use]
    pub fn target(&self, name: &str) -> Option<&TargetConfig> {
        self.targets.get(name)
    }

    /// Name of the target to use when none is given: `default_target`, or the only target
    #[must_use]
    pub fn default_target_name(&self) -> Option<&str> {
        self.default_target.as_deref().or_else(|| {
            if self.targets.len() == 1 {
                self.targets.keys().next().map(String::as_str)
            } else {
                None
            }
        })
    }
}

/// Configuration of one named model target
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct TargetConfig {
    /// Provider name: `anthropic`, `openai`, `gemini` or `vertex`
    #[validate(length(min = 1, max = 64))]
    pub provider: String,

    /// Vendor API key
    #[serde(default)]
    pub api_key: Option<SecretString>,

    /// Vendor model identifier
    #[validate(length(min = 1, max = 256))]
    pub model: String,

    /// Override of the vendor base URL
    #[serde(default)]
    pub base_url: Option<String>,

    /// Cloud project (region-scoped providers)
    #[serde(default)]
    pub project_id: Option<String>,

    /// Cloud location (region-scoped providers)
    #[serde(default)]
    pub location: Option<String>,

    /// Default `max_tokens` for requests that leave it unset
    #[serde(default)]
    #[validate(range(min = 1))]
    pub max_tokens: Option<u32>,

    /// Default temperature for requests that leave it unset
    #[serde(default)]
    #[validate(range(min = 0.0, max = 2.0))]
    pub temperature: Option<f32>,

    /// HTTP request timeout
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Provider-only settings, passed through uninterpreted
    #[serde(default)]
    pub properties: HashMap<String, serde_json::Value>,
}

fn default_timeout() -> Duration {
    Duration::from_secs(120)
}

impl TargetConfig {
    /// Create a target with defaults
    #[must_use]
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            api_key: None,
            model: model.into(),
            base_url: None,
            project_id: None,
            location: None,
            max_tokens: None,
            temperature: None,
            timeout: default_timeout(),
            properties: HashMap::new(),
        }
    }

    /// Set the API key
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::new(api_key.into()));
        self
    }

    /// Set the base URL
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set project and location
    #[must_use]
    pub fn with_project(mut self, project_id: impl Into<String>, location: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self.location = Some(location.into());
        self
    }

    /// Set a provider-only property
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    /// Set the request timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// String-valued property
    #[must_use]
    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(serde_json::Value::as_str)
    }

    /// Whether the provider is scoped to a cloud project and region
    #[must_use]
    pub fn is_region_scoped(&self) -> bool {
        REGION_SCOPED_PROVIDERS.contains(&self.provider.as_str())
    }

    /// Field and cross-field validation
    ///
    /// # Errors
    /// Returns a description of the first invalid field
    pub fn check(&self) -> Result<(), ConfigError> {
        self.validate()
            .map_err(|e| ConfigError::Validation(e.to_string()))?;

        if let Some(base_url) = &self.base_url {
            url::Url::parse(base_url)
                .map_err(|e| ConfigError::Validation(format!("base_url '{base_url}': {e}")))?;
        }

        if self.is_region_scoped() {
            if self.project_id.as_deref().map_or(true, str::is_empty) {
                return Err(ConfigError::Validation(format!(
                    "project_id is required for provider '{}'",
                    self.provider
                )));
            }
            if self.location.as_deref().map_or(true, str::is_empty) {
                return Err(ConfigError::Validation(format!(
                    "location is required for provider '{}'",
                    self.provider
                )));
            }
        }

        Ok(())
    }
}
