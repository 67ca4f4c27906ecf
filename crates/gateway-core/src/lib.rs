//! # Gateway Core
//!
//! Vendor-neutral types and traits for the LLM gateway.
//!
//! This crate provides the foundational types used throughout the gateway:
//! - Unified messages and multi-modal content blocks
//! - Generation options and results
//! - Error classification shared by every provider
//! - The streaming iterator and its producer side
//! - `LanguageModel` / `BatchCapableModel` traits and batch types

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod batch;
pub mod error;
pub mod message;
pub mod provider;
pub mod request;
pub mod response;
pub mod streaming;
pub mod types;

// Re-export commonly used types
pub use batch::{
    BatchJob, BatchJobPage, BatchRequestItem, BatchResult, BatchResultStream, BatchStatus,
    BatchStorage, ListBatchJobsQuery,
};
pub use error::{Category, Cause, ErrorTag, GatewayError, GatewayResult, Sentinel};
pub use message::{ContentBlock, MediaSource, Message, Role, ToolCall, ToolDefinition, ToolResult};
pub use provider::{
    batch_capable, BatchCapableModel, Capabilities, Capability, LanguageModel, Lifecycle,
    RawClient,
};
pub use request::{GenerateTextOptions, ResponseFormat, SafetySetting, ToolChoice};
pub use response::{GenerateTextResult, StopReason, Usage};
pub use streaming::{
    forward, spawn_stream, ChunkMapper, EventSink, StreamEvent, StreamIterator, ToolCallDelta,
};
pub use types::{MaxTokens, Temperature, TopP};
