//! Vendor-neutral conversational turns and multi-modal content.

use crate::error::{GatewayError, GatewayResult};
use serde::{Deserialize, Serialize};

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User turn
    User,
    /// Assistant turn
    Assistant,
    /// System instructions
    System,
    /// Tool results
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::System => write!(f, "system"),
            Self::Tool => write!(f, "tool"),
        }
    }
}

/// A conversational turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Author of the turn
    pub role: Role,
    /// Ordered content blocks
    pub content: Vec<ContentBlock>,
}

impl Message {
    /// Create a message from a role and content blocks
    #[must_use]
    pub fn new(role: Role, content: Vec<ContentBlock>) -> Self {
        Self { role, content }
    }

    /// Create a system message
    #[must_use]
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, vec![ContentBlock::text(text)])
    }

    /// Create a user message
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![ContentBlock::text(text)])
    }

    /// Create an assistant message
    #[must_use]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, vec![ContentBlock::text(text)])
    }

    /// Create a user message with text followed by an image
    #[must_use]
    pub fn user_with_image(text: impl Into<String>, image: MediaSource) -> Self {
        Self::new(
            Role::User,
            vec![ContentBlock::text(text), ContentBlock::Image { source: image }],
        )
    }

    /// Create an assistant message that requests tool calls
    #[must_use]
    pub fn assistant_tool_calls(calls: Vec<ToolCall>) -> Self {
        Self::new(
            Role::Assistant,
            calls.into_iter().map(ContentBlock::ToolCall).collect(),
        )
    }

    /// Create a tool message carrying one tool result
    #[must_use]
    pub fn tool_result(
        tool_call_id: impl Into<String>,
        content: impl Into<String>,
        is_error: bool,
    ) -> Self {
        Self::new(
            Role::Tool,
            vec![ContentBlock::tool_result(tool_call_id, content, is_error)],
        )
    }

    /// Concatenated text of all text blocks
    #[must_use]
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentBlock::as_text)
            .collect::<Vec<_>>()
            .join("")
    }
}

/// Content block, one payload per tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text
    Text {
        /// The text
        text: String,
    },
    /// Image input
    Image {
        /// Where the image bytes come from
        source: MediaSource,
    },
    /// Audio input
    Audio {
        /// Where the audio bytes come from
        source: MediaSource,
    },
    /// Document or other file input
    File {
        /// Where the file comes from
        source: MediaSource,
        /// Original file name, when known
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filename: Option<String>,
    },
    /// Tool invocation requested by the model
    ToolCall(ToolCall),
    /// Result of a tool invocation
    ToolResult(ToolResult),
}

impl ContentBlock {
    /// Text block
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Image from raw bytes
    pub fn image_bytes(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self::Image {
            source: MediaSource::bytes(data, mime_type),
        }
    }

    /// Image from a URL (`https:` or `data:`)
    pub fn image_url(url: impl Into<String>) -> Self {
        Self::Image {
            source: MediaSource::url(url),
        }
    }

    /// Audio from raw bytes
    pub fn audio_bytes(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self::Audio {
            source: MediaSource::bytes(data, mime_type),
        }
    }

    /// File previously uploaded to the provider
    pub fn file_reference(file_id: impl Into<String>, mime_type: Option<String>) -> Self {
        Self::File {
            source: MediaSource::File {
                file_id: file_id.into(),
                mime_type,
            },
            filename: None,
        }
    }

    /// Tool call block
    pub fn tool_call(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        Self::ToolCall(ToolCall::new(id, name, arguments))
    }

    /// Tool result block
    pub fn tool_result(
        tool_call_id: impl Into<String>,
        content: impl Into<String>,
        is_error: bool,
    ) -> Self {
        Self::ToolResult(ToolResult {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
            is_error,
        })
    }

    /// Text payload, if this is a text block
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }

    /// Tool call payload, if this is a tool call block
    #[must_use]
    pub fn as_tool_call(&self) -> Option<&ToolCall> {
        match self {
            Self::ToolCall(call) => Some(call),
            _ => None,
        }
    }

    /// Tag name used in logs and errors
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Image { .. } => "image",
            Self::Audio { .. } => "audio",
            Self::File { .. } => "file",
            Self::ToolCall(_) => "tool_call",
            Self::ToolResult(_) => "tool_result",
        }
    }

    /// Empty text blocks carry nothing and are dropped during mapping.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Text { text } if text.is_empty())
    }

    /// Reject blocks whose payload is missing for their tag.
    ///
    /// # Errors
    /// Returns a validation error naming the block kind and the missing field
    pub fn validate(&self) -> GatewayResult<()> {
        let missing = |field: &str| {
            Err(GatewayError::validation(
                format!("{} block is missing its {field}", self.kind()),
                Some(field.to_string()),
                "missing_payload",
            ))
        };

        match self {
            Self::Text { .. } => Ok(()),
            Self::Image { source } | Self::Audio { source } | Self::File { source, .. } => {
                match source {
                    MediaSource::Bytes { data, .. } if data.is_empty() => missing("data"),
                    MediaSource::Bytes { mime_type, .. } if mime_type.is_empty() => {
                        missing("mime_type")
                    }
                    MediaSource::Url { url, .. } if url.trim().is_empty() => missing("url"),
                    MediaSource::File { file_id, .. } if file_id.trim().is_empty() => {
                        missing("file_id")
                    }
                    _ => Ok(()),
                }
            }
            Self::ToolCall(call) if call.name.is_empty() => missing("name"),
            Self::ToolCall(call) if call.id.is_empty() => missing("id"),
            Self::ToolCall(_) => Ok(()),
            Self::ToolResult(result) if result.tool_call_id.is_empty() => missing("tool_call_id"),
            Self::ToolResult(_) => Ok(()),
        }
    }
}

/// Origin of image, audio or file content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MediaSource {
    /// Raw bytes with their MIME type
    Bytes {
        /// Raw bytes (base64 when serialized)
        #[serde(with = "base64_bytes")]
        data: Vec<u8>,
        /// MIME type, e.g. `image/png`
        mime_type: String,
    },
    /// Remote or `data:` URL
    Url {
        /// The URL
        url: String,
        /// MIME type hint for remote URLs
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
    },
    /// Provider-side file reference
    File {
        /// Provider file identifier or URI
        file_id: String,
        /// MIME type hint
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
    },
}

impl MediaSource {
    /// Raw bytes source
    pub fn bytes(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self::Bytes {
            data,
            mime_type: mime_type.into(),
        }
    }

    /// URL source without a MIME hint
    pub fn url(url: impl Into<String>) -> Self {
        Self::Url {
            url: url.into(),
            mime_type: None,
        }
    }
}

/// Tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Call identifier, echoed back in the matching tool result
    pub id: String,
    /// Tool name
    pub name: String,
    /// Opaque JSON arguments
    pub arguments: serde_json::Value,
}

impl ToolCall {
    /// Create a tool call
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// Result of executing a tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    /// ID of the call this answers
    pub tool_call_id: String,
    /// Tool output as text
    pub content: String,
    /// Whether the tool failed
    #[serde(default)]
    pub is_error: bool,
}

/// Callable capability offered to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name
    pub name: String,
    /// What the tool does
    #[serde(default)]
    pub description: String,
    /// JSON Schema of the arguments, passed through unvalidated
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    /// Create a tool definition
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
