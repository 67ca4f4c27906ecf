//! Generation options shared by every provider.
//!
//! [`GenerateTextOptions`] is the unified request: conversation, tools, sampling
//! parameters and provider-only extensions. Adapters translate it into their vendor's wire
//! format.

use crate::error::GatewayError;
use crate::message::{Message, Role, ToolDefinition};
use crate::types::{MaxTokens, Temperature, TopP};
use serde::{Deserialize, Serialize};

/// Unified text generation request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateTextOptions {
    /// Conversation turns
    pub messages: Vec<Message>,

    /// Tools offered to the model
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    /// System prompt, merged with any system-role messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Sampling temperature; `None` means unset, not zero
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Nucleus sampling; `None` means unset, not zero
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Stop sequences
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop_words: Vec<String>,

    /// How the model may use the tools
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,

    /// Structured output schema
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,

    /// Token budget for reasoning ("thinking")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking_budget: Option<u32>,

    /// Provider-specific safety thresholds
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub safety_settings: Vec<SafetySetting>,

    /// Provider-only request fields, merged into the vendor request body as-is
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extensions: serde_json::Map<String, serde_json::Value>,
}

impl GenerateTextOptions {
    /// Create a new builder for `GenerateTextOptions`
    #[must_use]
    pub fn builder() -> GenerateTextOptionsBuilder {
        GenerateTextOptionsBuilder::default()
    }

    /// Options holding a single user message
    #[must_use]
    pub fn from_prompt(prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::user(prompt)],
            ..Self::default()
        }
    }

    /// Get validated temperature
    ///
    /// # Errors
    /// Returns error if temperature is out of range
    pub fn validated_temperature(&self) -> Result<Option<Temperature>, GatewayError> {
        self.temperature.map(Temperature::new).transpose()
    }

    /// Get validated top_p
    ///
    /// # Errors
    /// Returns error if top_p is out of range
    pub fn validated_top_p(&self) -> Result<Option<TopP>, GatewayError> {
        self.top_p.map(TopP::new).transpose()
    }

    /// Get validated max_tokens
    ///
    /// # Errors
    /// Returns error if max_tokens is zero
    pub fn validated_max_tokens(&self) -> Result<Option<MaxTokens>, GatewayError> {
        self.max_tokens.map(MaxTokens::new).transpose()
    }

    /// Validate the options before outbound mapping
    ///
    /// # Errors
    /// Returns error if any field is invalid
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.messages.is_empty() {
            return Err(GatewayError::validation(
                "messages cannot be empty",
                Some("messages".to_string()),
                "empty_messages",
            ));
        }

        self.validated_temperature()?;
        self.validated_top_p()?;
        self.validated_max_tokens()?;

        for message in &self.messages {
            for block in &message.content {
                block.validate()?;
            }
        }

        for tool in &self.tools {
            if tool.name.is_empty() {
                return Err(GatewayError::validation(
                    "tool name cannot be empty",
                    Some("tools".to_string()),
                    "invalid_tool",
                ));
            }
        }

        Ok(())
    }

    /// Fill unset sampling parameters from target defaults
    pub fn apply_defaults(&mut self, max_tokens: Option<u32>, temperature: Option<f32>) {
        if self.max_tokens.is_none() {
            self.max_tokens = max_tokens;
        }
        if self.temperature.is_none() {
            self.temperature = temperature;
        }
    }

    /// The effective system prompt: `system` followed by the text of every system-role
    /// message, separated by blank lines.
    #[must_use]
    pub fn system_prompt(&self) -> Option<String> {
        let parts: Vec<String> = self
            .system
            .iter()
            .cloned()
            .chain(
                self.messages
                    .iter()
                    .filter(|m| m.role == Role::System)
                    .map(Message::text),
            )
            .filter(|s| !s.is_empty())
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n\n"))
        }
    }

    /// Messages that are not system turns, in order
    pub fn conversation(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.role != Role::System)
    }
}

/// Builder for `GenerateTextOptions`
#[derive(Debug, Default)]
pub struct GenerateTextOptionsBuilder {
    options: GenerateTextOptions,
}

impl GenerateTextOptionsBuilder {
    /// Set the messages
    #[must_use]
    pub fn messages(mut self, messages: Vec<Message>) -> Self {
        self.options.messages = messages;
        self
    }

    /// Add a message
    #[must_use]
    pub fn message(mut self, message: Message) -> Self {
        self.options.messages.push(message);
        self
    }

    /// Set the system prompt
    #[must_use]
    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.options.system = Some(system.into());
        self
    }

    /// Add a tool
    #[must_use]
    pub fn tool(mut self, tool: ToolDefinition) -> Self {
        self.options.tools.push(tool);
        self
    }

    /// Set tool_choice
    #[must_use]
    pub fn tool_choice(mut self, tool_choice: ToolChoice) -> Self {
        self.options.tool_choice = Some(tool_choice);
        self
    }

    /// Set max_tokens
    #[must_use]
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.options.max_tokens = Some(max_tokens);
        self
    }

    /// Set the temperature
    #[must_use]
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.options.temperature = Some(temperature);
        self
    }

    /// Set top_p
    #[must_use]
    pub fn top_p(mut self, top_p: f32) -> Self {
        self.options.top_p = Some(top_p);
        self
    }

    /// Add a stop sequence
    #[must_use]
    pub fn stop_word(mut self, stop: impl Into<String>) -> Self {
        self.options.stop_words.push(stop.into());
        self
    }

    /// Set response_format
    #[must_use]
    pub fn response_format(mut self, response_format: ResponseFormat) -> Self {
        self.options.response_format = Some(response_format);
        self
    }

    /// Set the reasoning token budget
    #[must_use]
    pub fn thinking_budget(mut self, budget: u32) -> Self {
        self.options.thinking_budget = Some(budget);
        self
    }

    /// Add a safety setting
    #[must_use]
    pub fn safety_setting(mut self, setting: SafetySetting) -> Self {
        self.options.safety_settings.push(setting);
        self
    }

    /// Add a provider-only extension field
    #[must_use]
    pub fn extension(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.options.extensions.insert(key.into(), value);
        self
    }

    /// Build the options
    ///
    /// # Errors
    /// Returns error if the options fail validation
    pub fn build(self) -> Result<GenerateTextOptions, GatewayError> {
        self.options.validate()?;
        Ok(self.options)
    }
}

/// Tool choice configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    /// The model decides
    Auto,
    /// Tools are not called
    None,
    /// The model must call at least one tool
    Required,
}

/// Structured output schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFormat {
    /// Schema name, required by some vendors
    #[serde(default = "default_schema_name")]
    pub name: String,
    /// JSON Schema the output must follow
    pub schema: serde_json::Value,
    /// Ask the vendor to enforce the schema strictly
    #[serde(default)]
    pub strict: bool,
}

fn default_schema_name() -> String {
    "response".to_string()
}

impl ResponseFormat {
    /// Create a response format from a schema
    #[must_use]
    pub fn json_schema(schema: serde_json::Value) -> Self {
        Self {
            name: default_schema_name(),
            schema,
            strict: false,
        }
    }
}

/// Provider-specific safety threshold (e.g. Gemini harm categories)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetySetting {
    /// Harm category, e.g. `HARM_CATEGORY_HATE_SPEECH`
    pub category: String,
    /// Threshold, e.g. `BLOCK_ONLY_HIGH`
    pub threshold: String,
}
