//! Server-sent events and JSON Lines over a streamed response body.

use crate::http::{transport_cause, Call};
use async_stream::try_stream;
use futures::{Stream, StreamExt};
use gateway_core::{forward, ChunkMapper, EventSink, GatewayError, GatewayResult, Sentinel, StreamEvent};
use reqwest::{RequestBuilder, Response};

/// One server-sent event
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SseEvent {
    /// `event:` field, if present
    pub event: Option<String>,
    /// Joined `data:` lines
    pub data: String,
}

/// Incremental SSE decoder. Buffers bytes so multi-byte characters and events may span
/// chunk boundaries.
#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    /// Feed bytes and return every complete event
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend(chunk.iter().copied().filter(|b| *b != b'\r'));

        let mut events = Vec::new();
        while let Some(pos) = find(&self.buffer, b"\n\n") {
            let raw: Vec<u8> = self.buffer.drain(..pos + 2).collect();
            if let Some(event) = parse_event(&raw[..pos]) {
                events.push(event);
            }
        }
        events
    }

    /// Flush a trailing event not followed by a blank line
    pub(crate) fn finish(&mut self) -> Option<SseEvent> {
        let raw = std::mem::take(&mut self.buffer);
        parse_event(&raw)
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn parse_event(raw: &[u8]) -> Option<SseEvent> {
    let text = String::from_utf8_lossy(raw);
    let mut event = None;
    let mut data: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = line.split_once(':').unwrap_or((line, ""));
        let value = value.strip_prefix(' ').unwrap_or(value);
        match field {
            "event" => event = Some(value.to_string()),
            "data" => data.push(value),
            _ => {}
        }
    }

    if data.is_empty() && event.is_none() {
        return None;
    }
    Some(SseEvent {
        event,
        data: data.join("\n"),
    })
}

/// Decode a streamed response body as server-sent events
pub(crate) fn sse_events(
    provider: String,
    response: Response,
) -> impl Stream<Item = GatewayResult<SseEvent>> + Send {
    try_stream! {
        let mut bytes = response.bytes_stream();
        let mut decoder = SseDecoder::default();

        while let Some(chunk) = bytes.next().await {
            let chunk = chunk.map_err(|e| {
                GatewayError::classify(provider.as_str(), Sentinel::Stream, transport_cause(&e))
            })?;
            for event in decoder.push(&chunk) {
                yield event;
            }
        }

        if let Some(event) = decoder.finish() {
            yield event;
        }
    }
}

/// Stream producer for SSE endpoints: open the request, then forward decoded events
/// through the mapper until a terminal event.
pub(crate) async fn drive_sse<M>(
    call: Call<'static>,
    request: RequestBuilder,
    mapper: M,
    sink: EventSink,
) where
    M: ChunkMapper<Chunk = SseEvent>,
{
    let response = match sink.guard(call.send(request, None)).await {
        None => return,
        Some(Err(err)) => {
            sink.send(StreamEvent::Error(err)).await;
            return;
        }
        Some(Ok(response)) => response,
    };
    forward(sse_events(call.provider.to_string(), response), mapper, sink).await;
}

/// Decode a streamed response body as non-empty JSON Lines
pub(crate) fn json_lines(
    provider: String,
    sentinel: Sentinel,
    response: Response,
) -> impl Stream<Item = GatewayResult<String>> + Send {
    try_stream! {
        let mut bytes = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(chunk) = bytes.next().await {
            let chunk = chunk.map_err(|e| {
                GatewayError::classify(provider.as_str(), sentinel, transport_cause(&e))
            })?;
            buffer.extend_from_slice(&chunk);

            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&line).trim().to_string();
                if !line.is_empty() {
                    yield line;
                }
            }
        }

        let tail = String::from_utf8_lossy(&buffer).trim().to_string();
        if !tail.is_empty() {
            yield tail;
        }
    }
}
