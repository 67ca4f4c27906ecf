//! Translation between unified types and Chat Completions.

use super::types::{
    ApiErrorBody, ChatChunk, ChatMessage, ChatRequest, ChatResponse, ChatResponseFormat, ChatTool,
    ChatToolCall, ChatUsage, ContentPart, ErrorEnvelope, FilePart, FunctionCall,
    FunctionDefinition, ImageUrl, InputAudio, JsonSchemaFormat, MessageContent, StreamOptions,
};
use crate::common::parse_arguments;
use crate::http::plain_error;
use crate::media::{self, ResolvedMedia};
use gateway_core::{
    Cause, ChunkMapper, ContentBlock, GatewayError, GatewayResult, GenerateTextOptions,
    GenerateTextResult, Message, Role, Sentinel, StopReason, StreamEvent, ToolCall, ToolCallDelta,
    ToolChoice, Usage,
};
use std::collections::BTreeMap;
use tracing::debug;

/// Build a Chat Completions request from prepared options
pub(crate) fn to_request(
    model: &str,
    options: &GenerateTextOptions,
    stream: bool,
) -> GatewayResult<ChatRequest> {
    let mut messages = Vec::with_capacity(options.messages.len() + 1);

    if let Some(system) = options.system_prompt() {
        messages.push(ChatMessage {
            role: "system",
            content: Some(MessageContent::Text(system)),
            tool_calls: Vec::new(),
            tool_call_id: None,
        });
    }

    for message in options.conversation() {
        for block in &message.content {
            block.validate()?;
        }
        map_message(message, &mut messages);
    }

    Ok(ChatRequest {
        model: model.to_string(),
        messages,
        max_completion_tokens: options.max_tokens,
        temperature: options.temperature,
        top_p: options.top_p,
        stop: options.stop_words.clone(),
        tools: options
            .tools
            .iter()
            .map(|tool| ChatTool {
                kind: "function",
                function: FunctionDefinition {
                    name: tool.name.clone(),
                    description: tool.description.clone(),
                    parameters: tool.parameters.clone(),
                },
            })
            .collect(),
        tool_choice: options.tool_choice.map(|choice| match choice {
            ToolChoice::Auto => "auto",
            ToolChoice::None => "none",
            ToolChoice::Required => "required",
        }),
        response_format: options.response_format.as_ref().map(|format| ChatResponseFormat {
            kind: "json_schema",
            json_schema: JsonSchemaFormat {
                name: format.name.clone(),
                schema: format.schema.clone(),
                strict: format.strict,
            },
        }),
        reasoning_effort: options.thinking_budget.map(reasoning_effort),
        stream,
        stream_options: stream.then_some(StreamOptions {
            include_usage: true,
        }),
    })
}

/// Reasoning models take an effort level instead of a token budget
pub(crate) fn reasoning_effort(budget: u32) -> &'static str {
    match budget {
        0..=1024 => "low",
        1025..=8192 => "medium",
        _ => "high",
    }
}

fn map_message(message: &Message, out: &mut Vec<ChatMessage>) {
    // Every tool result is its own `tool` message, whatever role carried it
    for block in &message.content {
        if let ContentBlock::ToolResult(result) = block {
            out.push(ChatMessage {
                role: "tool",
                content: Some(MessageContent::Text(result.content.clone())),
                tool_calls: Vec::new(),
                tool_call_id: Some(result.tool_call_id.clone()),
            });
        }
    }

    match message.role {
        Role::Assistant => {
            let text = message.text();
            let tool_calls: Vec<ChatToolCall> = message
                .content
                .iter()
                .filter_map(ContentBlock::as_tool_call)
                .map(|call| ChatToolCall {
                    id: call.id.clone(),
                    kind: "function",
                    function: FunctionCall {
                        name: call.name.clone(),
                        arguments: call.arguments.to_string(),
                    },
                })
                .collect();

            if text.is_empty() && tool_calls.is_empty() {
                return;
            }
            out.push(ChatMessage {
                role: "assistant",
                content: (!text.is_empty()).then_some(MessageContent::Text(text)),
                tool_calls,
                tool_call_id: None,
            });
        }
        Role::User | Role::System => {
            let parts: Vec<ContentPart> = message.content.iter().filter_map(map_part).collect();
            let content = match parts.as_slice() {
                [] => return,
                [ContentPart::Text { text }] => MessageContent::Text(text.clone()),
                _ => MessageContent::Parts(parts),
            };
            out.push(ChatMessage {
                role: "user",
                content: Some(content),
                tool_calls: Vec::new(),
                tool_call_id: None,
            });
        }
        Role::Tool => {}
    }
}

fn map_part(block: &ContentBlock) -> Option<ContentPart> {
    match block {
        ContentBlock::Text { text } if text.is_empty() => None,
        ContentBlock::Text { text } => Some(ContentPart::Text { text: text.clone() }),
        ContentBlock::Image { source } => {
            let url = match media::resolve(source) {
                ResolvedMedia::Inline { data, mime_type } => media::to_data_url(&mime_type, &data),
                ResolvedMedia::Remote { url, .. } => url.to_string(),
                ResolvedMedia::File { file_id, .. } => {
                    return Some(ContentPart::File {
                        file: FilePart {
                            file_id: Some(file_id.to_string()),
                            filename: None,
                            file_data: None,
                        },
                    });
                }
            };
            Some(ContentPart::ImageUrl {
                image_url: ImageUrl { url },
            })
        }
        ContentBlock::Audio { source } => match media::resolve(source) {
            ResolvedMedia::Inline { data, mime_type } => Some(ContentPart::InputAudio {
                input_audio: InputAudio {
                    data: media::encode_base64(&data),
                    format: audio_format(&mime_type),
                },
            }),
            _ => {
                debug!("Dropping audio reference; only inline audio is accepted");
                None
            }
        },
        ContentBlock::File { source, filename } => match media::resolve(source) {
            ResolvedMedia::File { file_id, .. } => Some(ContentPart::File {
                file: FilePart {
                    file_id: Some(file_id.to_string()),
                    filename: None,
                    file_data: None,
                },
            }),
            ResolvedMedia::Inline { data, mime_type } => Some(ContentPart::File {
                file: FilePart {
                    file_id: None,
                    filename: Some(filename.clone().unwrap_or_else(|| "file".to_string())),
                    file_data: Some(media::to_data_url(&mime_type, &data)),
                },
            }),
            ResolvedMedia::Remote { .. } => {
                debug!("Dropping file URL; upload the file and reference its ID instead");
                None
            }
        },
        ContentBlock::ToolCall(_) | ContentBlock::ToolResult(_) => None,
    }
}

/// `input_audio.format` for a MIME type
pub(crate) fn audio_format(mime_type: &str) -> String {
    match mime_type {
        "audio/wav" | "audio/x-wav" | "audio/wave" => "wav".to_string(),
        "audio/mpeg" | "audio/mp3" => "mp3".to_string(),
        other => other.rsplit('/').next().unwrap_or(other).to_string(),
    }
}

/// Map a Chat Completions response to a unified result
pub(crate) fn from_response(
    provider: &str,
    sentinel: Sentinel,
    model_id: &str,
    response: ChatResponse,
) -> GatewayResult<GenerateTextResult> {
    let choice = response.choices.into_iter().next().ok_or_else(|| {
        GatewayError::classify(
            provider,
            sentinel,
            Cause::Decode("response contains no choices".to_string()),
        )
    })?;

    let mut content = Vec::new();
    match (choice.message.content, choice.message.refusal) {
        (Some(text), _) if !text.is_empty() => content.push(ContentBlock::text(text)),
        (_, Some(refusal)) if !refusal.is_empty() => content.push(ContentBlock::text(refusal)),
        _ => {}
    }
    for call in choice.message.tool_calls {
        let arguments = parse_arguments(provider, sentinel, &call.function.arguments)?;
        content.push(ContentBlock::ToolCall(ToolCall::new(
            call.id,
            call.function.name,
            arguments,
        )));
    }

    let model = if response.model.is_empty() {
        model_id.to_string()
    } else {
        response.model
    };

    Ok(GenerateTextResult::new(
        content,
        map_finish_reason(choice.finish_reason.as_deref()),
        map_usage(response.usage),
        model,
    ))
}

/// Map a vendor finish reason; unknown values become `EndTurn`
pub(crate) fn map_finish_reason(reason: Option<&str>) -> StopReason {
    match reason {
        Some("length") => StopReason::MaxTokens,
        Some("tool_calls" | "function_call") => StopReason::ToolUse,
        Some("content_filter") => StopReason::Stop,
        _ => StopReason::EndTurn,
    }
}

/// Completion tokens include reasoning; report them separately
pub(crate) fn map_usage(usage: Option<ChatUsage>) -> Usage {
    let Some(usage) = usage else {
        return Usage::default();
    };
    let reasoning = usage
        .completion_tokens_details
        .map_or(0, |details| details.reasoning_tokens);
    Usage::new(
        usage.prompt_tokens,
        usage.completion_tokens.saturating_sub(reasoning),
        reasoning,
    )
}

/// Parse an error response body
pub(crate) fn parse_error(status: u16, body: &str) -> Cause {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => {
            let code = envelope.error.code();
            Cause::api_with_code(status, code, envelope.error.message)
        }
        Err(_) => plain_error(status, body),
    }
}

/// Cause for an error object delivered inside a stream
fn stream_error_cause(error: &ApiErrorBody) -> Cause {
    let status = match error.kind.as_deref() {
        Some("invalid_request_error") => Some(400),
        Some("authentication_error") => Some(401),
        Some("insufficient_quota") => Some(402),
        Some("rate_limit_exceeded" | "requests" | "tokens") => Some(429),
        Some("server_error") => Some(500),
        _ => None,
    };
    match status {
        Some(status) => Cause::api_with_code(status, error.code(), error.message.clone()),
        None => Cause::Other(error.message.clone()),
    }
}

#[derive(Debug, Default)]
struct PendingCall {
    id: String,
    name: String,
    arguments: String,
}

/// Stream chunk mapper over SSE `data` payloads.
///
/// The finish reason arrives before the usage chunk, so `MessageDone` is emitted from
/// [`ChunkMapper::finish`] once `[DONE]` closes the stream.
pub(crate) struct StreamMapper {
    provider: String,
    calls: BTreeMap<u32, PendingCall>,
    stop_reason: Option<StopReason>,
    usage: Usage,
}

impl StreamMapper {
    pub(crate) fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            calls: BTreeMap::new(),
            stop_reason: None,
            usage: Usage::default(),
        }
    }
}

impl ChunkMapper for StreamMapper {
    type Chunk = String;

    fn map_chunk(&mut self, chunk: String) -> GatewayResult<Vec<StreamEvent>> {
        if chunk.trim().is_empty() {
            return Ok(Vec::new());
        }
        let chunk: ChatChunk = serde_json::from_str(&chunk).map_err(|e| {
            GatewayError::classify(
                self.provider.as_str(),
                Sentinel::Stream,
                Cause::Decode(format!("invalid stream chunk: {e}")),
            )
        })?;

        if let Some(error) = &chunk.error {
            return Err(GatewayError::classify(
                self.provider.as_str(),
                Sentinel::Stream,
                stream_error_cause(error),
            ));
        }
        if chunk.usage.is_some() {
            self.usage = map_usage(chunk.usage);
        }

        let mut events = Vec::new();
        let Some(choice) = chunk.choices.into_iter().next() else {
            return Ok(events);
        };

        if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
            events.push(StreamEvent::ContentDelta(text));
        }

        for delta in choice.delta.tool_calls {
            let pending = self.calls.entry(delta.index).or_default();
            let (name, arguments) = delta
                .function
                .map(|f| (f.name, f.arguments))
                .unwrap_or_default();

            if let Some(name) = name {
                pending.name = name;
            }
            if let Some(id) = delta.id {
                pending.id = id;
                events.push(StreamEvent::ToolCallDelta(ToolCallDelta::start(
                    delta.index,
                    pending.id.clone(),
                    pending.name.clone(),
                )));
            }
            if let Some(arguments) = arguments.filter(|a| !a.is_empty()) {
                pending.arguments.push_str(&arguments);
                events.push(StreamEvent::ToolCallDelta(ToolCallDelta::fragment(
                    delta.index,
                    arguments,
                )));
            }
        }

        if let Some(reason) = choice.finish_reason {
            for (index, call) in std::mem::take(&mut self.calls) {
                let arguments = parse_arguments(&self.provider, Sentinel::Stream, &call.arguments)?;
                events.push(StreamEvent::ToolCallDelta(ToolCallDelta::completed(
                    index,
                    ToolCall::new(call.id, call.name, arguments),
                )));
            }
            self.stop_reason = Some(map_finish_reason(Some(&reason)));
        }

        Ok(events)
    }

    fn finish(&mut self) -> Vec<StreamEvent> {
        match self.stop_reason.take() {
            Some(stop_reason) => vec![StreamEvent::MessageDone {
                stop_reason,
                usage: self.usage,
            }],
            None => Vec::new(),
        }
    }
}
