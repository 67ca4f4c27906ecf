//! Provider-facing traits.
//!
//! [`LanguageModel`] is the minimal contract every adapter satisfies. Batch support is an
//! extension, [`BatchCapableModel`], reached through [`LanguageModel::as_batch`] only when
//! the model declares [`Capability::BatchProcessing`].

use crate::batch::{BatchJob, BatchJobPage, BatchRequestItem, BatchResultStream, ListBatchJobsQuery};
use crate::error::{GatewayError, GatewayResult};
use crate::request::GenerateTextOptions;
use crate::response::GenerateTextResult;
use crate::streaming::StreamIterator;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;

/// Named optional feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// `stream_text`
    Streaming,
    /// Tool definitions and tool calls
    ToolCalling,
    /// Image input
    Vision,
    /// Audio input
    Audio,
    /// The five batch operations
    BatchProcessing,
    /// Schema-constrained output
    StructuredOutput,
    /// Thinking budget
    Reasoning,
}

impl Capability {
    /// Every capability, in declaration order
    pub const ALL: [Self; 7] = [
        Self::Streaming,
        Self::ToolCalling,
        Self::Vision,
        Self::Audio,
        Self::BatchProcessing,
        Self::StructuredOutput,
        Self::Reasoning,
    ];
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Streaming => "streaming",
            Self::ToolCalling => "tool_calling",
            Self::Vision => "vision",
            Self::Audio => "audio",
            Self::BatchProcessing => "batch_processing",
            Self::StructuredOutput => "structured_output",
            Self::Reasoning => "reasoning",
        };
        f.write_str(s)
    }
}

/// Capabilities a model declares
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct Capabilities {
    /// Supports streaming
    pub streaming: bool,
    /// Supports tool calling
    pub tool_calling: bool,
    /// Accepts image input
    pub vision: bool,
    /// Accepts audio input
    pub audio: bool,
    /// Supports the batch protocol
    pub batch_processing: bool,
    /// Supports structured output
    pub structured_output: bool,
    /// Supports a thinking budget
    pub reasoning: bool,
}

impl Capabilities {
    /// Whether the capability is declared
    #[must_use]
    pub fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::Streaming => self.streaming,
            Capability::ToolCalling => self.tool_calling,
            Capability::Vision => self.vision,
            Capability::Audio => self.audio,
            Capability::BatchProcessing => self.batch_processing,
            Capability::StructuredOutput => self.structured_output,
            Capability::Reasoning => self.reasoning,
        }
    }

    /// Declared capabilities, in declaration order
    #[must_use]
    pub fn list(&self) -> Vec<Capability> {
        Capability::ALL
            .into_iter()
            .filter(|c| self.supports(*c))
            .collect()
    }

    /// Fail with `Unsupported` unless the capability is declared
    ///
    /// # Errors
    /// Returns `GatewayError::Unsupported` for an undeclared capability
    pub fn require(&self, capability: Capability) -> GatewayResult<()> {
        if self.supports(capability) {
            Ok(())
        } else {
            Err(GatewayError::Unsupported { capability })
        }
    }
}

/// Opaque handle to a model's vendor client.
///
/// Escape hatch for vendor features outside the unified surface. Code using it gives up
/// the provider-agnostic guarantees.
#[derive(Clone, Copy)]
pub struct RawClient<'a> {
    inner: &'a (dyn Any + Send + Sync),
    type_name: &'static str,
}

impl<'a> RawClient<'a> {
    /// Wrap a vendor client
    pub fn new<T: Any + Send + Sync>(client: &'a T) -> Self {
        Self {
            inner: client,
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Concrete type name of the wrapped client
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Borrow the client as `T`
    ///
    /// # Errors
    /// Returns `RawClientMismatch` if the client is not a `T`
    pub fn downcast<T: Any>(&self) -> GatewayResult<&'a T> {
        self.inner
            .downcast_ref::<T>()
            .ok_or(GatewayError::RawClientMismatch {
                expected: std::any::type_name::<T>(),
                actual: self.type_name,
            })
    }
}

impl fmt::Debug for RawClient<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawClient")
            .field("type_name", &self.type_name)
            .finish()
    }
}

/// A configured model instance. Safe for concurrent use.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Provider name, e.g. `"anthropic"`
    fn provider(&self) -> &str;

    /// Vendor model identifier
    fn model_id(&self) -> &str;

    /// Declared capabilities
    fn capabilities(&self) -> Capabilities;

    /// Run one generation
    ///
    /// # Errors
    /// Returns a validation error for bad options, or a classified provider error
    async fn generate_text(
        &self,
        options: &GenerateTextOptions,
        cancel: &CancellationToken,
    ) -> GatewayResult<GenerateTextResult>;

    /// Start a streaming generation.
    ///
    /// Returns immediately after spawning the producer; network failures surface through
    /// the iterator's latched error.
    ///
    /// # Errors
    /// Returns a validation error for bad options or `Closed` after `close`
    fn stream_text(
        &self,
        options: &GenerateTextOptions,
        cancel: &CancellationToken,
    ) -> GatewayResult<StreamIterator>;

    /// Batch extension, present only when `batch_processing` is declared
    fn as_batch(&self) -> Option<&dyn BatchCapableModel> {
        None
    }

    /// Vendor client escape hatch
    fn raw_client(&self) -> RawClient<'_>;

    /// Release the vendor client. Idempotent.
    ///
    /// # Errors
    /// Adapters may report a failure while releasing resources
    async fn close(&self) -> GatewayResult<()>;
}

/// Batch extension of [`LanguageModel`]
#[async_trait]
pub trait BatchCapableModel: Send + Sync {
    /// Submit items as one vendor job. Fails before submission if any item fails mapping.
    ///
    /// # Errors
    /// Returns a validation error for a bad item or a `batch` provider error
    async fn submit_batch(&self, items: &[BatchRequestItem]) -> GatewayResult<BatchJob>;

    /// Poll one job
    ///
    /// # Errors
    /// Returns a `batch` provider error
    async fn get_batch_job(&self, id: &str) -> GatewayResult<BatchJob>;

    /// List jobs, newest first
    ///
    /// # Errors
    /// Returns a `batch` provider error
    async fn list_batch_jobs(&self, query: &ListBatchJobsQuery) -> GatewayResult<BatchJobPage>;

    /// Lazily stream results of a completed job. Each call re-fetches from the vendor.
    ///
    /// # Errors
    /// Returns `BatchNotReady` unless the job has completed
    async fn download_batch_results(&self, id: &str) -> GatewayResult<BatchResultStream>;

    /// Request cancellation. The `Cancelled` status is observed by a later poll.
    ///
    /// # Errors
    /// Returns a `batch` provider error
    async fn cancel_batch_job(&self, id: &str) -> GatewayResult<BatchJob>;
}

/// Resolve the batch extension of a model
///
/// # Errors
/// Returns `Unsupported` if the model does not declare batch processing
pub fn batch_capable(model: &dyn LanguageModel) -> GatewayResult<&dyn BatchCapableModel> {
    model.capabilities().require(Capability::BatchProcessing)?;
    model.as_batch().ok_or(GatewayError::Unsupported {
        capability: Capability::BatchProcessing,
    })
}

/// Open/closed flag shared by adapters
#[derive(Debug, Default)]
pub struct Lifecycle {
    closed: AtomicBool,
}

impl Lifecycle {
    /// Mark closed. Returns `true` only for the call that closed it.
    pub fn close(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }

    /// Whether `close` has been called
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Fail with `Closed` once closed
    ///
    /// # Errors
    /// Returns `GatewayError::Closed` after `close`
    pub fn ensure_open(&self, model_id: &str) -> GatewayResult<()> {
        if self.is_closed() {
            Err(GatewayError::Closed {
                model_id: model_id.to_string(),
            })
        } else {
            Ok(())
        }
    }
}
