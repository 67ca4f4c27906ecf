//! Streaming generation: unified events, the pull-based iterator and the producer side.
//!
//! Each `stream_text` call spawns exactly one producer task that owns a bounded queue of
//! [`StreamEvent`]s. The caller pulls events through a [`StreamIterator`]. Both the
//! producer's queue writes and the consumer's reads race against a cancellation token, with
//! cancellation winning ties, so a slow or vanished consumer can never wedge the producer.
//!
//! ```no_run
//! # async fn demo(mut stream: gateway_core::StreamIterator) {
//! use gateway_core::StreamEvent;
//!
//! while stream.next().await {
//!     if let Some(StreamEvent::ContentDelta(text)) = stream.current() {
//!         print!("{text}");
//!     }
//! }
//! if let Some(err) = stream.err() {
//!     eprintln!("stream failed: {err}");
//! }
//! # }
//! ```

use crate::error::{Cause, GatewayError, GatewayResult, Sentinel};
use crate::message::{ContentBlock, ToolCall};
use crate::response::{GenerateTextResult, StopReason, Usage};
use futures::{Stream, StreamExt};
use std::collections::BTreeMap;
use std::future::Future;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Capacity of the per-stream event queue
pub const STREAM_BUFFER: usize = 64;

/// One unified streaming event
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// Text fragment
    ContentDelta(String),
    /// Partial or completed tool call
    ToolCallDelta(ToolCallDelta),
    /// Normal end of the stream
    MessageDone {
        /// Why generation ended
        stop_reason: StopReason,
        /// Final token accounting
        usage: Usage,
    },
    /// Classified failure; ends the stream
    Error(GatewayError),
}

impl StreamEvent {
    /// Whether this event ends the stream
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::MessageDone { .. } | Self::Error(_))
    }
}

/// Incremental tool call update.
///
/// Vendors that stream raw argument JSON produce fragments in `arguments` followed by one
/// delta carrying the parsed `completed` call. Vendors that only deliver whole calls send
/// the `completed` delta alone. Treat anything without `completed` as provisional.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ToolCallDelta {
    /// Position of the call within the response
    pub index: u32,
    /// Call ID, usually on the first fragment only
    pub id: Option<String>,
    /// Tool name, usually on the first fragment only
    pub name: Option<String>,
    /// Raw argument JSON fragment
    pub arguments: Option<String>,
    /// Fully accumulated call with valid JSON arguments
    pub completed: Option<ToolCall>,
}

impl ToolCallDelta {
    /// Delta announcing a new call
    pub fn start(index: u32, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            index,
            id: Some(id.into()),
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Delta carrying an argument fragment
    pub fn fragment(index: u32, arguments: impl Into<String>) -> Self {
        Self {
            index,
            arguments: Some(arguments.into()),
            ..Self::default()
        }
    }

    /// Delta carrying the finished call
    #[must_use]
    pub fn completed(index: u32, call: ToolCall) -> Self {
        Self {
            index,
            id: Some(call.id.clone()),
            name: Some(call.name.clone()),
            arguments: None,
            completed: Some(call),
        }
    }
}

/// Outcome of one iterator step
enum Step {
    /// A non-terminal event is in `current`
    Event,
    /// The terminal event is in `current`
    Last,
    /// Nothing new arrived
    Finished,
}

/// Pull-based consumer over one stream's event queue.
///
/// States are `active` and `done`. The iterator owns a child of the caller's cancellation
/// token: [`close`](Self::close) or dropping the iterator stops the producer without
/// touching the caller's token, while cancelling the caller's token latches a
/// `service_unavailable` error.
#[derive(Debug)]
pub struct StreamIterator {
    provider: String,
    model_id: String,
    rx: mpsc::Receiver<StreamEvent>,
    cancel: CancellationToken,
    current: Option<StreamEvent>,
    err: Option<GatewayError>,
    done: bool,
}

impl StreamIterator {
    /// Provider that produced the stream
    #[must_use]
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Model that produced the stream
    #[must_use]
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Wait for the next event.
    ///
    /// Returns `true` when a content or tool call delta is available through
    /// [`current`](Self::current). Returns `false` once the stream is done: after
    /// `MessageDone` (left in `current`), after an error (latched in [`err`](Self::err)),
    /// after [`close`](Self::close), or on cancellation of the caller's token.
    pub async fn next(&mut self) -> bool {
        matches!(self.advance().await, Step::Event)
    }

    /// Last event received
    #[must_use]
    pub fn current(&self) -> Option<&StreamEvent> {
        self.current.as_ref()
    }

    /// Latched error, if the stream failed
    #[must_use]
    pub fn err(&self) -> Option<&GatewayError> {
        self.err.as_ref()
    }

    /// Whether the iterator has reached `done`
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Stop the producer and mark the stream done. Safe to call any number of times.
    pub fn close(&mut self) {
        if !self.done {
            debug!(provider = %self.provider, model = %self.model_id, "Stream closed by caller");
        }
        self.done = true;
        self.cancel.cancel();
    }

    /// Drain the stream into a single result.
    ///
    /// Text deltas are concatenated in arrival order and tool call deltas are accumulated
    /// per index, preferring the completed call. A latched error is returned instead of
    /// any partial content.
    ///
    /// # Errors
    /// Returns the latched stream error, or a decode error if a tool call never completed
    /// with valid JSON arguments
    pub async fn collect(mut self) -> GatewayResult<GenerateTextResult> {
        let mut text = String::new();
        let mut calls: BTreeMap<u32, PartialToolCall> = BTreeMap::new();
        let mut stop_reason = StopReason::default();
        let mut usage = Usage::default();

        loop {
            let step = self.advance().await;
            if matches!(step, Step::Event | Step::Last) {
                match &self.current {
                    Some(StreamEvent::ContentDelta(delta)) => text.push_str(delta),
                    Some(StreamEvent::ToolCallDelta(delta)) => {
                        calls.entry(delta.index).or_default().apply(delta);
                    }
                    Some(StreamEvent::MessageDone {
                        stop_reason: reason,
                        usage: final_usage,
                    }) => {
                        stop_reason = *reason;
                        usage = *final_usage;
                    }
                    Some(StreamEvent::Error(_)) | None => {}
                }
            }
            if !matches!(step, Step::Event) {
                break;
            }
        }

        if let Some(err) = self.err.take() {
            return Err(err);
        }

        let mut content = Vec::with_capacity(calls.len() + 1);
        if !text.is_empty() {
            content.push(ContentBlock::text(text));
        }
        for (index, partial) in calls {
            let call = partial.finish().ok_or_else(|| {
                GatewayError::classify(
                    self.provider.clone(),
                    Sentinel::Stream,
                    Cause::Decode(format!("tool call {index} has incomplete arguments")),
                )
            })?;
            content.push(ContentBlock::ToolCall(call));
        }

        Ok(GenerateTextResult::new(
            content,
            stop_reason,
            usage,
            self.model_id.clone(),
        ))
    }

    async fn advance(&mut self) -> Step {
        if self.done {
            return Step::Finished;
        }

        let received = tokio::select! {
            biased;
            () = self.cancel.cancelled() => {
                // close() marks done before cancelling, so this is the caller's token
                let err = GatewayError::cancelled(self.provider.clone(), Sentinel::Stream);
                self.latch(err);
                return Step::Last;
            }
            event = self.rx.recv() => event,
        };

        match received {
            Some(StreamEvent::Error(err)) => {
                self.latch(err);
                Step::Last
            }
            Some(event) if event.is_terminal() => {
                trace!(provider = %self.provider, "Stream finished");
                self.current = Some(event);
                self.finish();
                Step::Last
            }
            Some(event) => {
                self.current = Some(event);
                Step::Event
            }
            None => {
                let err = GatewayError::classify(
                    self.provider.clone(),
                    Sentinel::Stream,
                    Cause::Other("event source closed before the stream completed".to_string()),
                );
                self.latch(err);
                Step::Last
            }
        }
    }

    fn latch(&mut self, err: GatewayError) {
        debug!(provider = %self.provider, model = %self.model_id, error = %err, "Stream failed");
        self.current = Some(StreamEvent::Error(err.clone()));
        self.err = Some(err);
        self.finish();
    }

    fn finish(&mut self) {
        self.done = true;
        self.cancel.cancel();
    }
}

impl Drop for StreamIterator {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[derive(Debug, Default)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
    completed: Option<ToolCall>,
}

impl PartialToolCall {
    fn apply(&mut self, delta: &ToolCallDelta) {
        if let Some(id) = &delta.id {
            self.id.clone_from(id);
        }
        if let Some(name) = &delta.name {
            self.name.clone_from(name);
        }
        if let Some(fragment) = &delta.arguments {
            self.arguments.push_str(fragment);
        }
        if let Some(call) = &delta.completed {
            self.completed = Some(call.clone());
        }
    }

    fn finish(self) -> Option<ToolCall> {
        if let Some(call) = self.completed {
            return Some(call);
        }
        let arguments = if self.arguments.trim().is_empty() {
            serde_json::Value::Object(serde_json::Map::new())
        } else {
            serde_json::from_str(&self.arguments).ok()?
        };
        Some(ToolCall::new(self.id, self.name, arguments))
    }
}

/// Producer half of a stream. Owned by exactly one background task.
#[derive(Debug, Clone)]
pub struct EventSink {
    provider: String,
    tx: mpsc::Sender<StreamEvent>,
    cancel: CancellationToken,
}

impl EventSink {
    /// Queue an event, racing the cancellation signal.
    ///
    /// Returns `false` if the stream was cancelled or the consumer is gone, in which case
    /// the producer should exit.
    pub async fn send(&self, event: StreamEvent) -> bool {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => false,
            sent = self.tx.send(event) => sent.is_ok(),
        }
    }

    /// Run a future unless the stream is cancelled first
    pub async fn guard<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => None,
            output = fut => Some(output),
        }
    }

    /// Whether the stream was cancelled
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Provider name used for stream errors
    #[must_use]
    pub fn provider(&self) -> &str {
        &self.provider
    }
}

/// Spawn a stream producer and return the consumer iterator.
///
/// The producer receives an [`EventSink`] wired to a child of `parent`. Must be called
/// from within a Tokio runtime.
pub fn spawn_stream<F, Fut>(
    provider: impl Into<String>,
    model_id: impl Into<String>,
    parent: &CancellationToken,
    producer: F,
) -> StreamIterator
where
    F: FnOnce(EventSink) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let provider = provider.into();
    let model_id = model_id.into();
    let (tx, rx) = mpsc::channel(STREAM_BUFFER);
    let cancel = parent.child_token();

    let sink = EventSink {
        provider: provider.clone(),
        tx,
        cancel: cancel.clone(),
    };

    debug!(provider = %provider, model = %model_id, "Starting stream producer");
    tokio::spawn(producer(sink));

    StreamIterator {
        provider,
        model_id,
        rx,
        cancel,
        current: None,
        err: None,
        done: false,
    }
}

/// Translates native vendor chunks into unified events.
pub trait ChunkMapper: Send {
    /// Native chunk type
    type Chunk: Send;

    /// Map one chunk to zero or more events
    ///
    /// # Errors
    /// Returns a classified error if the chunk reports a failure or cannot be decoded
    fn map_chunk(&mut self, chunk: Self::Chunk) -> GatewayResult<Vec<StreamEvent>>;

    /// Flush state once the native stream ends. Returns the terminal event when the vendor
    /// signalled completion without a trailing chunk.
    fn finish(&mut self) -> Vec<StreamEvent> {
        Vec::new()
    }
}

/// Drive a native chunk stream through a mapper into the sink.
///
/// Stops after the first terminal event. If the native stream ends without one, a
/// `stream` error is sent so a truncated response is never reported as complete.
pub async fn forward<S, M>(source: S, mut mapper: M, sink: EventSink)
where
    S: Stream<Item = GatewayResult<M::Chunk>> + Send,
    M: ChunkMapper,
{
    let mut source = std::pin::pin!(source);

    loop {
        let Some(next) = sink.guard(source.next()).await else {
            trace!(provider = %sink.provider, "Stream producer cancelled");
            return;
        };
        let Some(item) = next else {
            break;
        };

        let events = match item.and_then(|chunk| mapper.map_chunk(chunk)) {
            Ok(events) => events,
            Err(err) => {
                sink.send(StreamEvent::Error(err)).await;
                return;
            }
        };

        if !emit(&sink, events).await {
            return;
        }
    }

    if !emit(&sink, mapper.finish()).await {
        return;
    }

    let err = GatewayError::classify(
        sink.provider.clone(),
        Sentinel::Stream,
        Cause::Decode("stream ended without a completion event".to_string()),
    );
    sink.send(StreamEvent::Error(err)).await;
}

/// Send events in order. Returns `false` once the stream should stop.
async fn emit(sink: &EventSink, events: Vec<StreamEvent>) -> bool {
    for event in events {
        let terminal = event.is_terminal();
        if !sink.send(event).await || terminal {
            return false;
        }
    }
    true
}
