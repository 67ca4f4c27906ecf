//! Model registry keyed by target name.

use crate::anthropic::AnthropicFactory;
use crate::google::{GeminiFactory, VertexFactory};
use crate::openai::OpenAiFactory;
use gateway_config::{GatewayConfig, TargetConfig};
use gateway_core::{GatewayError, GatewayResult, LanguageModel};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Creates model instances for one provider name
pub trait ProviderFactory: Send + Sync {
    /// Provider name matched against `TargetConfig::provider`
    fn provider(&self) -> &'static str;

    /// Create a model for a target.
    ///
    /// # Errors
    /// Returns a configuration error when the target lacks a required setting
    fn create_model(&self, target: &TargetConfig) -> GatewayResult<Arc<dyn LanguageModel>>;
}

/// Named, configured models
pub struct Registry {
    factories: HashMap<&'static str, Box<dyn ProviderFactory>>,
    models: HashMap<String, Arc<dyn LanguageModel>>,
}

impl Registry {
    /// Registry without factories or models
    #[must_use]
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
            models: HashMap::new(),
        }
    }

    /// Registry with the built-in `anthropic`, `openai`, `gemini` and `vertex` factories
    #[must_use]
    pub fn with_default_factories() -> Self {
        let mut registry = Self::new();
        registry.add_factory(Box::new(AnthropicFactory));
        registry.add_factory(Box::new(OpenAiFactory));
        registry.add_factory(Box::new(GeminiFactory));
        registry.add_factory(Box::new(VertexFactory));
        registry
    }

    /// Build every target of a configuration with the built-in factories
    ///
    /// # Errors
    /// Returns a configuration error for an unknown provider or an incomplete target
    pub fn from_config(config: &GatewayConfig) -> GatewayResult<Self> {
        let mut registry = Self::with_default_factories();
        for (name, target) in &config.targets {
            registry.add_target(name, target)?;
        }
        info!(targets = registry.models.len(), "Model registry ready");
        Ok(registry)
    }

    /// Add or replace the factory for its provider name
    pub fn add_factory(&mut self, factory: Box<dyn ProviderFactory>) {
        self.factories.insert(factory.provider(), factory);
    }

    /// Create a model for a target and register it under `name`
    ///
    /// # Errors
    /// Returns a configuration error for an unknown provider or an incomplete target
    pub fn add_target(&mut self, name: &str, target: &TargetConfig) -> GatewayResult<()> {
        target
            .check()
            .map_err(|e| GatewayError::configuration(format!("target '{name}': {e}")))?;
        let factory = self.factories.get(target.provider.as_str()).ok_or_else(|| {
            GatewayError::configuration(format!(
                "target '{name}' uses unknown provider '{}'",
                target.provider
            ))
        })?;
        let model = factory.create_model(target)?;
        self.register(name, model);
        Ok(())
    }

    /// Register a model under a name, replacing any previous entry
    pub fn register(&mut self, name: impl Into<String>, model: Arc<dyn LanguageModel>) {
        let name = name.into();
        if self.models.insert(name.clone(), model).is_some() {
            warn!(target_name = %name, "Replaced registered model");
        }
    }

    /// Model registered under `name`
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn LanguageModel>> {
        self.models.get(name).cloned()
    }

    /// Registered names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.models.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Close every registered model. Closing continues past failures; the first one is
    /// returned.
    ///
    /// # Errors
    /// Returns the first close failure
    pub async fn close_all(&self) -> GatewayResult<()> {
        let mut first_error = None;
        for (name, model) in &self.models {
            if let Err(err) = model.close().await {
                warn!(target_name = %name, error = %err, "Failed to close model");
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_default_factories()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut factories: Vec<&str> = self.factories.keys().copied().collect();
        factories.sort_unstable();
        f.debug_struct("Registry")
            .field("factories", &factories)
            .field("models", &self.names())
            .finish()
    }
}
