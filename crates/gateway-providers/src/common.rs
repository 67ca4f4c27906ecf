//! Mapping helpers shared by the adapters.

use gateway_config::TargetConfig;
use gateway_core::{
    BatchRequestItem, Cause, GatewayError, GatewayResult, GenerateTextOptions, Sentinel,
};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;

/// Per-target request defaults
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ModelDefaults {
    /// Used when the request leaves `max_tokens` unset
    pub max_tokens: Option<u32>,
    /// Used when the request leaves `temperature` unset
    pub temperature: Option<f32>,
    /// Per-request HTTP timeout
    pub timeout: Option<Duration>,
}

impl ModelDefaults {
    /// Defaults taken from a target configuration
    #[must_use]
    pub fn from_target(target: &TargetConfig) -> Self {
        Self {
            max_tokens: target.max_tokens,
            temperature: target.temperature,
            timeout: Some(target.timeout),
        }
    }

    /// Validate the caller's options and fill unset fields from the defaults
    pub(crate) fn prepare(&self, options: &GenerateTextOptions) -> GatewayResult<GenerateTextOptions> {
        options.validate()?;
        let mut prepared = options.clone();
        prepared.apply_defaults(self.max_tokens, self.temperature);
        Ok(prepared)
    }
}

/// Field validation of a target, run before any client is built
pub(crate) fn check_target(target: &TargetConfig) -> GatewayResult<()> {
    target.check()?;
    Ok(())
}

/// A secret holding something other than whitespace
pub(crate) fn non_blank(secret: &SecretString) -> bool {
    !secret.expose_secret().trim().is_empty()
}

/// API key of a target, required by key-authenticated vendors. A blank key counts as missing.
pub(crate) fn require_api_key(target: &TargetConfig) -> GatewayResult<SecretString> {
    target.api_key.clone().filter(non_blank).ok_or_else(|| {
        GatewayError::configuration(format!(
            "api_key is required for provider '{}'",
            target.provider
        ))
    })
}

/// Base URL of a target without a trailing slash
pub(crate) fn base_url(target: &TargetConfig, default: &str) -> String {
    target
        .base_url
        .as_deref()
        .unwrap_or(default)
        .trim_end_matches('/')
        .to_string()
}

/// Serialize a vendor request and merge the caller's extension keys on top
pub(crate) fn encode_body<T: Serialize>(
    provider: &str,
    sentinel: Sentinel,
    request: &T,
    extensions: &serde_json::Map<String, serde_json::Value>,
) -> GatewayResult<serde_json::Value> {
    let mut body = serde_json::to_value(request).map_err(|e| {
        GatewayError::classify(provider, sentinel, Cause::Other(format!("failed to encode request: {e}")))
    })?;

    if let Some(object) = body.as_object_mut() {
        for (key, value) in extensions {
            object.insert(key.clone(), value.clone());
        }
    }
    Ok(body)
}

/// Parse accumulated tool arguments. Empty text means no arguments.
pub(crate) fn parse_arguments(
    provider: &str,
    sentinel: Sentinel,
    raw: &str,
) -> GatewayResult<serde_json::Value> {
    if raw.trim().is_empty() {
        return Ok(serde_json::Value::Object(serde_json::Map::new()));
    }
    serde_json::from_str(raw).map_err(|e| {
        GatewayError::classify(
            provider,
            sentinel,
            Cause::Decode(format!("tool call arguments are not valid JSON: {e}")),
        )
    })
}

/// Reject empty submissions and duplicate custom IDs before any item is mapped
pub(crate) fn check_batch_items(items: &[BatchRequestItem]) -> GatewayResult<()> {
    if items.is_empty() {
        return Err(GatewayError::validation(
            "batch must contain at least one item",
            Some("items".to_string()),
            "empty_batch",
        ));
    }

    let mut seen = HashSet::with_capacity(items.len());
    for item in items {
        if item.custom_id.is_empty() {
            return Err(GatewayError::validation(
                "batch item custom_id cannot be empty",
                Some("custom_id".to_string()),
                "missing_custom_id",
            ));
        }
        if !seen.insert(item.custom_id.as_str()) {
            return Err(GatewayError::validation(
                format!("duplicate batch custom_id '{}'", item.custom_id),
                Some("custom_id".to_string()),
                "duplicate_custom_id",
            ));
        }
    }
    Ok(())
}

/// Name of the tool call a result answers, looked up from earlier assistant turns
pub(crate) fn tool_name_for<'a>(options: &'a GenerateTextOptions, tool_call_id: &str) -> Option<&'a str> {
    options
        .messages
        .iter()
        .flat_map(|m| m.content.iter())
        .filter_map(gateway_core::ContentBlock::as_tool_call)
        .find(|call| call.id == tool_call_id)
        .map(|call| call.name.as_str())
}
