//! Translation between unified types and the Messages API.

use super::types::{
    AnthropicMessage, AnthropicTool, AnthropicToolChoice, ApiErrorBody, BlockDelta, BlockSource,
    ErrorEnvelope, MessagesRequest, MessagesResponse, RequestBlock, ResponseBlock, StreamPayload,
    ThinkingConfig,
};
use crate::common::parse_arguments;
use crate::http::plain_error;
use crate::media::{self, ResolvedMedia};
use crate::sse::SseEvent;
use gateway_core::{
    Cause, ChunkMapper, ContentBlock, GatewayError, GatewayResult, GenerateTextOptions,
    GenerateTextResult, MediaSource, Role, Sentinel, StopReason, StreamEvent, ToolCall,
    ToolCallDelta, ToolChoice, Usage,
};
use std::collections::HashMap;
use tracing::{debug, trace};

/// `max_tokens` is mandatory on this API
pub(crate) const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Build a Messages request from prepared options
pub(crate) fn to_request(
    model: &str,
    options: &GenerateTextOptions,
    stream: bool,
) -> GatewayResult<MessagesRequest> {
    let mut messages: Vec<AnthropicMessage> = Vec::new();

    for message in options.conversation() {
        let role = match message.role {
            Role::Assistant => "assistant",
            // Tool results travel in user turns
            Role::User | Role::Tool | Role::System => "user",
        };

        let mut content = Vec::with_capacity(message.content.len());
        for block in &message.content {
            block.validate()?;
            if let Some(mapped) = map_block(block) {
                content.push(mapped);
            }
        }
        if content.is_empty() {
            continue;
        }

        match messages.last_mut() {
            Some(last) if last.role == role => last.content.extend(content),
            _ => messages.push(AnthropicMessage { role, content }),
        }
    }

    if options.response_format.is_some() {
        debug!(model = %model, "Structured output is not supported by this provider; ignoring response_format");
    }

    Ok(MessagesRequest {
        model: model.to_string(),
        max_tokens: options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        system: options.system_prompt(),
        messages,
        temperature: options.temperature,
        top_p: options.top_p,
        stop_sequences: options.stop_words.clone(),
        tools: options
            .tools
            .iter()
            .map(|tool| AnthropicTool {
                name: tool.name.clone(),
                description: tool.description.clone(),
                input_schema: tool.parameters.clone(),
            })
            .collect(),
        tool_choice: options.tool_choice.map(|choice| match choice {
            ToolChoice::Auto => AnthropicToolChoice::Auto,
            ToolChoice::None => AnthropicToolChoice::None,
            ToolChoice::Required => AnthropicToolChoice::Any,
        }),
        thinking: options.thinking_budget.map(|budget_tokens| ThinkingConfig {
            kind: "enabled",
            budget_tokens,
        }),
        stream,
    })
}

/// Map one content block; `None` drops blocks this API cannot carry
pub(crate) fn map_block(block: &ContentBlock) -> Option<RequestBlock> {
    match block {
        ContentBlock::Text { text } if text.is_empty() => None,
        ContentBlock::Text { text } => Some(RequestBlock::Text { text: text.clone() }),
        ContentBlock::Image { source } => Some(RequestBlock::Image {
            source: block_source(source, "image/png"),
        }),
        ContentBlock::File { source, filename } => Some(RequestBlock::Document {
            source: block_source(source, "application/pdf"),
            title: filename.clone(),
        }),
        ContentBlock::Audio { .. } => {
            trace!("Dropping audio block; not supported by the Messages API");
            None
        }
        ContentBlock::ToolCall(call) => Some(RequestBlock::ToolUse {
            id: call.id.clone(),
            name: call.name.clone(),
            input: call.arguments.clone(),
        }),
        ContentBlock::ToolResult(result) => Some(RequestBlock::ToolResult {
            tool_use_id: result.tool_call_id.clone(),
            content: result.content.clone(),
            is_error: result.is_error,
        }),
    }
}

fn block_source(source: &MediaSource, fallback_mime: &str) -> BlockSource {
    match media::resolve(source) {
        ResolvedMedia::Inline { data, mime_type } => BlockSource::Base64 {
            media_type: if mime_type.is_empty() {
                fallback_mime.to_string()
            } else {
                mime_type
            },
            data: media::encode_base64(&data),
        },
        ResolvedMedia::Remote { url, .. } => BlockSource::Url {
            url: url.to_string(),
        },
        ResolvedMedia::File { file_id, .. } => BlockSource::File {
            file_id: file_id.to_string(),
        },
    }
}

/// Map a Messages response to a unified result
pub(crate) fn from_response(model_id: &str, response: MessagesResponse) -> GenerateTextResult {
    let content = response
        .content
        .into_iter()
        .filter_map(|block| match block {
            ResponseBlock::Text { text } => Some(ContentBlock::text(text)),
            ResponseBlock::ToolUse { id, name, input } => {
                Some(ContentBlock::ToolCall(ToolCall::new(id, name, input)))
            }
            ResponseBlock::Other => None,
        })
        .collect();

    let usage = Usage::new(
        response.usage.prompt_tokens(),
        response.usage.output_tokens,
        0,
    );
    let model = if response.model.is_empty() {
        model_id.to_string()
    } else {
        response.model
    };

    GenerateTextResult::new(
        content,
        map_stop_reason(response.stop_reason.as_deref()),
        usage,
        model,
    )
}

/// Map a vendor stop reason; unknown values become `EndTurn`
pub(crate) fn map_stop_reason(reason: Option<&str>) -> StopReason {
    match reason {
        Some("max_tokens") => StopReason::MaxTokens,
        Some("tool_use") => StopReason::ToolUse,
        Some("stop_sequence") => StopReason::Stop,
        _ => StopReason::EndTurn,
    }
}

/// HTTP-like status for an API error type
pub(crate) fn status_for_error_type(kind: &str) -> Option<u16> {
    let status = match kind {
        "invalid_request_error" => 400,
        "authentication_error" => 401,
        "billing_error" => 402,
        "permission_error" => 403,
        "not_found_error" => 404,
        "request_too_large" => 413,
        "rate_limit_error" => 429,
        "api_error" => 500,
        "timeout_error" => 504,
        "overloaded_error" => 529,
        _ => return None,
    };
    Some(status)
}

/// Cause for an API error body reported outside the HTTP status (stream and batch items)
pub(crate) fn error_body_cause(error: &ApiErrorBody) -> Cause {
    match status_for_error_type(&error.kind) {
        Some(status) => Cause::api_with_code(status, Some(error.kind.clone()), error.message.clone()),
        None => Cause::Other(format!("{}: {}", error.kind, error.message)),
    }
}

/// Parse an error response body
pub(crate) fn parse_error(status: u16, body: &str) -> Cause {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => Cause::api_with_code(
            status,
            Some(envelope.error.kind),
            envelope.error.message,
        ),
        Err(_) => plain_error(status, body),
    }
}

#[derive(Debug, Default)]
struct ToolBlock {
    id: String,
    name: String,
    arguments: String,
}

/// Stream chunk mapper.
///
/// Tool input arrives as `input_json_delta` fragments, forwarded as they come and
/// re-emitted as one completed call at `content_block_stop`.
pub(crate) struct StreamMapper {
    provider: String,
    tools: HashMap<u32, ToolBlock>,
    input_tokens: u32,
    output_tokens: u32,
    stop_reason: Option<String>,
}

impl StreamMapper {
    pub(crate) fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            tools: HashMap::new(),
            input_tokens: 0,
            output_tokens: 0,
            stop_reason: None,
        }
    }

    fn decode_error(&self, message: String) -> GatewayError {
        GatewayError::classify(self.provider.as_str(), Sentinel::Stream, Cause::Decode(message))
    }
}

impl ChunkMapper for StreamMapper {
    type Chunk = SseEvent;

    fn map_chunk(&mut self, chunk: SseEvent) -> GatewayResult<Vec<StreamEvent>> {
        if chunk.data.trim().is_empty() {
            return Ok(Vec::new());
        }
        let payload: StreamPayload = serde_json::from_str(&chunk.data)
            .map_err(|e| self.decode_error(format!("invalid stream event: {e}")))?;

        let events = match payload {
            StreamPayload::MessageStart { message } => {
                self.input_tokens = message.usage.prompt_tokens();
                self.output_tokens = message.usage.output_tokens;
                Vec::new()
            }
            StreamPayload::ContentBlockStart {
                index,
                content_block,
            } => match content_block {
                ResponseBlock::Text { text } if !text.is_empty() => {
                    vec![StreamEvent::ContentDelta(text)]
                }
                ResponseBlock::ToolUse { id, name, .. } => {
                    let delta = ToolCallDelta::start(index, id.clone(), name.clone());
                    self.tools.insert(
                        index,
                        ToolBlock {
                            id,
                            name,
                            arguments: String::new(),
                        },
                    );
                    vec![StreamEvent::ToolCallDelta(delta)]
                }
                _ => Vec::new(),
            },
            StreamPayload::ContentBlockDelta { index, delta } => match delta {
                BlockDelta::TextDelta { text } => vec![StreamEvent::ContentDelta(text)],
                BlockDelta::InputJsonDelta { partial_json } => {
                    if let Some(tool) = self.tools.get_mut(&index) {
                        tool.arguments.push_str(&partial_json);
                    }
                    vec![StreamEvent::ToolCallDelta(ToolCallDelta::fragment(
                        index,
                        partial_json,
                    ))]
                }
                BlockDelta::Other => Vec::new(),
            },
            StreamPayload::ContentBlockStop { index } => match self.tools.remove(&index) {
                Some(tool) => {
                    let arguments = parse_arguments(&self.provider, Sentinel::Stream, &tool.arguments)?;
                    let call = ToolCall::new(tool.id, tool.name, arguments);
                    vec![StreamEvent::ToolCallDelta(ToolCallDelta::completed(index, call))]
                }
                None => Vec::new(),
            },
            StreamPayload::MessageDelta { delta, usage } => {
                if delta.stop_reason.is_some() {
                    self.stop_reason = delta.stop_reason;
                }
                if let Some(usage) = usage {
                    self.output_tokens = usage.output_tokens;
                }
                Vec::new()
            }
            StreamPayload::MessageStop => vec![StreamEvent::MessageDone {
                stop_reason: map_stop_reason(self.stop_reason.as_deref()),
                usage: Usage::new(self.input_tokens, self.output_tokens, 0),
            }],
            StreamPayload::Error { error } => {
                return Err(GatewayError::classify(
                    self.provider.as_str(),
                    Sentinel::Stream,
                    error_body_cause(&error),
                ));
            }
            StreamPayload::Ping | StreamPayload::Unknown => Vec::new(),
        };

        Ok(events)
    }
}
