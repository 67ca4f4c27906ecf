//! Translation between unified types and `generateContent`.

use super::types::{
    Blob, Content, ErrorBody, ErrorEnvelope, FileData, FunctionCall, FunctionCallingConfig,
    FunctionDeclaration, FunctionResponse, GenerateContentRequest, GenerateContentResponse,
    GenerationConfig, Part, SafetySetting, ThinkingConfig, Tool, ToolConfig, UsageMetadata,
};
use crate::common::tool_name_for;
use crate::http::plain_error;
use crate::media::{self, ResolvedMedia};
use crate::sse::SseEvent;
use gateway_core::{
    Cause, ChunkMapper, ContentBlock, GatewayError, GatewayResult, GenerateTextOptions,
    GenerateTextResult, MediaSource, Role, Sentinel, StopReason, StreamEvent, ToolCall,
    ToolCallDelta, ToolChoice, Usage,
};
use serde_json::json;
use uuid::Uuid;

/// Build a `generateContent` body from prepared options
pub(crate) fn to_request(options: &GenerateTextOptions) -> GatewayResult<GenerateContentRequest> {
    let mut contents: Vec<Content> = Vec::new();

    for message in options.conversation() {
        let role = match message.role {
            Role::Assistant => "model",
            Role::User | Role::Tool | Role::System => "user",
        };

        let mut parts = Vec::with_capacity(message.content.len());
        for block in &message.content {
            block.validate()?;
            if let Some(part) = map_block(options, block) {
                parts.push(part);
            }
        }
        if parts.is_empty() {
            continue;
        }

        match contents.last_mut() {
            Some(last) if last.role.as_deref() == Some(role) => last.parts.extend(parts),
            _ => contents.push(Content {
                role: Some(role.to_string()),
                parts,
            }),
        }
    }

    let generation_config = GenerationConfig {
        temperature: options.temperature,
        top_p: options.top_p,
        max_output_tokens: options.max_tokens,
        stop_sequences: options.stop_words.clone(),
        response_mime_type: options
            .response_format
            .as_ref()
            .map(|_| "application/json"),
        response_schema: options.response_format.as_ref().map(|f| f.schema.clone()),
        thinking_config: options
            .thinking_budget
            .map(|thinking_budget| ThinkingConfig { thinking_budget }),
    };

    let tools = if options.tools.is_empty() {
        Vec::new()
    } else {
        vec![Tool {
            function_declarations: options
                .tools
                .iter()
                .map(|tool| FunctionDeclaration {
                    name: tool.name.clone(),
                    description: tool.description.clone(),
                    parameters: (!tool.parameters.is_null()).then(|| tool.parameters.clone()),
                })
                .collect(),
        }]
    };

    Ok(GenerateContentRequest {
        contents,
        system_instruction: options.system_prompt().map(|system| Content {
            role: None,
            parts: vec![Part::text(system)],
        }),
        generation_config: (!generation_config.is_empty()).then_some(generation_config),
        tools,
        tool_config: options.tool_choice.map(|choice| ToolConfig {
            function_calling_config: FunctionCallingConfig {
                mode: match choice {
                    ToolChoice::Auto => "AUTO",
                    ToolChoice::None => "NONE",
                    ToolChoice::Required => "ANY",
                },
            },
        }),
        safety_settings: options
            .safety_settings
            .iter()
            .map(|s| SafetySetting {
                category: s.category.clone(),
                threshold: s.threshold.clone(),
            })
            .collect(),
    })
}

fn map_block(options: &GenerateTextOptions, block: &ContentBlock) -> Option<Part> {
    match block {
        ContentBlock::Text { text } if text.is_empty() => None,
        ContentBlock::Text { text } => Some(Part::text(text.clone())),
        ContentBlock::Image { source }
        | ContentBlock::Audio { source }
        | ContentBlock::File { source, .. } => Some(media_part(source)),
        ContentBlock::ToolCall(call) => Some(Part {
            function_call: Some(FunctionCall {
                id: None,
                name: call.name.clone(),
                args: call.arguments.clone(),
            }),
            ..Part::default()
        }),
        ContentBlock::ToolResult(result) => {
            let name = tool_name_for(options, &result.tool_call_id).unwrap_or(&result.tool_call_id);
            let response = if result.is_error {
                json!({ "error": result.content })
            } else {
                json!({ "result": result.content })
            };
            Some(Part {
                function_response: Some(FunctionResponse {
                    name: name.to_string(),
                    response,
                }),
                ..Part::default()
            })
        }
    }
}

fn media_part(source: &MediaSource) -> Part {
    match media::resolve(source) {
        ResolvedMedia::Inline { data, mime_type } => Part {
            inline_data: Some(Blob {
                mime_type,
                data: media::encode_base64(&data),
            }),
            ..Part::default()
        },
        ResolvedMedia::Remote { url, mime_type } => Part {
            file_data: Some(FileData {
                mime_type: mime_type
                    .or_else(|| media::guess_mime_type(url))
                    .map(str::to_string),
                file_uri: url.to_string(),
            }),
            ..Part::default()
        },
        ResolvedMedia::File { file_id, mime_type } => Part {
            file_data: Some(FileData {
                mime_type: mime_type.map(str::to_string),
                file_uri: file_id.to_string(),
            }),
            ..Part::default()
        },
    }
}

/// Map a vendor finish reason; unknown values become `EndTurn`
pub(crate) fn map_finish_reason(reason: Option<&str>) -> StopReason {
    match reason {
        Some("MAX_TOKENS") => StopReason::MaxTokens,
        Some("SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII") => {
            StopReason::Stop
        }
        _ => StopReason::EndTurn,
    }
}

fn map_usage(usage: Option<UsageMetadata>) -> Usage {
    usage.map_or_else(Usage::default, |u| {
        Usage::new(
            u.prompt_token_count,
            u.candidates_token_count,
            u.thoughts_token_count,
        )
    })
}

/// Function calls may omit an ID; generate one so results can reference it
fn call_id(id: Option<String>) -> String {
    id.filter(|id| !id.is_empty())
        .unwrap_or_else(|| format!("call_{}", Uuid::new_v4().simple()))
}

/// Visible parts of the first candidate, thoughts skipped
fn candidate_blocks(content: Option<Content>) -> Vec<ContentBlock> {
    content
        .map(|c| c.parts)
        .unwrap_or_default()
        .into_iter()
        .filter(|part| !part.thought)
        .filter_map(|part| {
            if let Some(call) = part.function_call {
                let arguments = if call.args.is_null() {
                    json!({})
                } else {
                    call.args
                };
                return Some(ContentBlock::ToolCall(ToolCall::new(
                    call_id(call.id),
                    call.name,
                    arguments,
                )));
            }
            part.text
                .filter(|text| !text.is_empty())
                .map(ContentBlock::text)
        })
        .collect()
}

/// Map a `generateContent` response to a unified result
pub(crate) fn from_response(model_id: &str, response: GenerateContentResponse) -> GenerateTextResult {
    let usage = map_usage(response.usage_metadata);
    let model = response.model_version.unwrap_or_else(|| model_id.to_string());

    let Some(candidate) = response.candidates.into_iter().next() else {
        // A blocked prompt yields no candidates
        let blocked = response
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .is_some();
        let stop = if blocked { StopReason::Stop } else { StopReason::EndTurn };
        return GenerateTextResult::new(Vec::new(), stop, usage, model);
    };

    let content = candidate_blocks(candidate.content);
    let stop_reason = if content.iter().any(|b| b.as_tool_call().is_some()) {
        StopReason::ToolUse
    } else {
        map_finish_reason(candidate.finish_reason.as_deref())
    };

    GenerateTextResult::new(content, stop_reason, usage, model)
}

fn error_cause(status: u16, error: ErrorBody) -> Cause {
    Cause::api_with_code(status, error.status, error.message)
}

/// Parse an error response body
pub(crate) fn parse_error(status: u16, body: &str) -> Cause {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => error_cause(status, envelope.error),
        Err(_) => plain_error(status, body),
    }
}

/// Stream chunk mapper. Each SSE event is a complete partial response; function calls
/// always arrive whole.
pub(crate) struct StreamMapper {
    provider: &'static str,
    next_index: u32,
    saw_tool_call: bool,
    usage: Usage,
}

impl StreamMapper {
    pub(crate) fn new(provider: &'static str) -> Self {
        Self {
            provider,
            next_index: 0,
            saw_tool_call: false,
            usage: Usage::default(),
        }
    }
}

impl ChunkMapper for StreamMapper {
    type Chunk = SseEvent;

    fn map_chunk(&mut self, chunk: SseEvent) -> GatewayResult<Vec<StreamEvent>> {
        if chunk.data.trim().is_empty() {
            return Ok(Vec::new());
        }
        let response: GenerateContentResponse = serde_json::from_str(&chunk.data).map_err(|e| {
            GatewayError::classify(
                self.provider,
                Sentinel::Stream,
                Cause::Decode(format!("invalid stream chunk: {e}")),
            )
        })?;

        if let Some(error) = response.error {
            let status = error.code.unwrap_or(500);
            return Err(GatewayError::classify(
                self.provider,
                Sentinel::Stream,
                error_cause(status, error),
            ));
        }
        if response.usage_metadata.is_some() {
            self.usage = map_usage(response.usage_metadata);
        }

        let mut events = Vec::new();
        let Some(candidate) = response.candidates.into_iter().next() else {
            if response.prompt_feedback.and_then(|f| f.block_reason).is_some() {
                events.push(StreamEvent::MessageDone {
                    stop_reason: StopReason::Stop,
                    usage: self.usage,
                });
            }
            return Ok(events);
        };

        for block in candidate_blocks(candidate.content) {
            match block {
                ContentBlock::Text { text } => events.push(StreamEvent::ContentDelta(text)),
                ContentBlock::ToolCall(call) => {
                    self.saw_tool_call = true;
                    events.push(StreamEvent::ToolCallDelta(ToolCallDelta::completed(
                        self.next_index,
                        call,
                    )));
                    self.next_index += 1;
                }
                _ => {}
            }
        }

        if let Some(reason) = candidate.finish_reason {
            let stop_reason = if self.saw_tool_call {
                StopReason::ToolUse
            } else {
                map_finish_reason(Some(&reason))
            };
            events.push(StreamEvent::MessageDone {
                stop_reason,
                usage: self.usage,
            });
        }

        Ok(events)
    }
}
