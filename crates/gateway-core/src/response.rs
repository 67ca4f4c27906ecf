//! Generation result envelope.

use crate::message::{ContentBlock, ToolCall};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified result of a single generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateTextResult {
    /// Generated content in vendor order
    pub content: Vec<ContentBlock>,
    /// Why generation ended
    pub stop_reason: StopReason,
    /// Token accounting
    pub usage: Usage,
    /// Model that produced the result
    pub model_id: String,
    /// Untranslated vendor request, for debugging only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_request: Option<serde_json::Value>,
    /// Untranslated vendor response, for debugging only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<serde_json::Value>,
}

impl GenerateTextResult {
    /// Create a result without raw payloads
    #[must_use]
    pub fn new(
        content: Vec<ContentBlock>,
        stop_reason: StopReason,
        usage: Usage,
        model_id: impl Into<String>,
    ) -> Self {
        Self {
            content,
            stop_reason,
            usage,
            model_id: model_id.into(),
            raw_request: None,
            raw_response: None,
        }
    }

    /// Attach the untranslated vendor payloads
    #[must_use]
    pub fn with_raw(
        mut self,
        request: Option<serde_json::Value>,
        response: Option<serde_json::Value>,
    ) -> Self {
        self.raw_request = request;
        self.raw_response = response;
        self
    }

    /// Concatenated text content
    #[must_use]
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentBlock::as_text)
            .collect()
    }

    /// Tool calls requested by the model
    #[must_use]
    pub fn tool_calls(&self) -> Vec<&ToolCall> {
        self.content
            .iter()
            .filter_map(ContentBlock::as_tool_call)
            .collect()
    }
}

/// Why generation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Natural end of turn; also the default for unrecognised vendor reasons
    #[default]
    EndTurn,
    /// Token limit reached
    MaxTokens,
    /// The model requested a tool call
    ToolUse,
    /// A stop sequence or content filter ended the output
    Stop,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::EndTurn => "end_turn",
            Self::MaxTokens => "max_tokens",
            Self::ToolUse => "tool_use",
            Self::Stop => "stop",
        };
        f.write_str(s)
    }
}

/// Token usage statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Prompt tokens
    pub input_tokens: u32,
    /// Visible output tokens, excluding reasoning
    pub output_tokens: u32,
    /// Total as reported by the vendor
    pub total_tokens: u32,
    /// Reasoning tokens, disjoint from `output_tokens`
    pub thinking_tokens: u32,
}

impl Usage {
    /// Usage with the total derived from the parts
    #[must_use]
    pub fn new(input_tokens: u32, output_tokens: u32, thinking_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens + thinking_tokens,
            thinking_tokens,
        }
    }
}
