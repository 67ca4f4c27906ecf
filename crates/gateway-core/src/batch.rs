//! Batch job lifecycle types.
//!
//! A batch moves `Pending -> Processing -> {Completed | Failed | Cancelled}`. Results can
//! only be downloaded once the job is [`BatchStatus::Completed`]; each item is matched back
//! to the caller's `custom_id` and fails independently of its siblings.

use crate::error::{GatewayError, GatewayResult};
use crate::request::GenerateTextOptions;
use crate::response::GenerateTextResult;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One request inside a batch submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRequestItem {
    /// Caller-chosen identifier echoed back in the result
    pub custom_id: String,
    /// Full generation options for this item
    pub options: GenerateTextOptions,
}

impl BatchRequestItem {
    /// Create a batch item
    pub fn new(custom_id: impl Into<String>, options: GenerateTextOptions) -> Self {
        Self {
            custom_id: custom_id.into(),
            options,
        }
    }
}

/// Unified batch status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Accepted, not yet running
    Pending,
    /// Running or finalising
    Processing,
    /// Finished; results are downloadable
    Completed,
    /// Failed or expired
    Failed,
    /// Cancelled by the caller
    Cancelled,
}

impl BatchStatus {
    /// Whether the job can no longer change state
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Provider-specific bulk I/O reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BatchStorage {
    /// Vendor file storage (input and, once done, output file IDs)
    FileId {
        /// Uploaded input file
        input_file_id: String,
        /// Output file, once available
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output_file_id: Option<String>,
        /// Per-item error file, once available
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error_file_id: Option<String>,
    },
    /// Object storage URIs (e.g. `gs://bucket/prefix`)
    ObjectStorage {
        /// Input JSONL object
        input_uri: String,
        /// Output prefix
        output_uri: String,
    },
    /// Requests were sent inline with the submit call
    Inline,
}

/// A vendor-side batch job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchJob {
    /// Vendor job ID
    pub id: String,
    /// Unified status
    pub status: BatchStatus,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Time the job reached a terminal state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Items submitted
    pub total_count: u32,
    /// Items finished successfully
    pub done_count: u32,
    /// Items that failed
    pub failed_count: u32,
    /// Where the job's input and output live
    pub storage: BatchStorage,
    /// Job-level failure description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchJob {
    /// Reject result downloads for jobs that have not completed
    ///
    /// # Errors
    /// Returns `BatchNotReady` unless the job status is `Completed`
    pub fn ensure_downloadable(&self) -> GatewayResult<()> {
        if self.status == BatchStatus::Completed {
            Ok(())
        } else {
            Err(GatewayError::BatchNotReady {
                id: self.id.clone(),
                status: self.status,
            })
        }
    }
}

/// Outcome of one batch item
#[derive(Debug, Clone)]
pub struct BatchResult {
    /// Identifier from the matching `BatchRequestItem`
    pub custom_id: String,
    /// Exactly one of result or error
    pub result: Result<GenerateTextResult, GatewayError>,
}

impl BatchResult {
    /// Successful item
    pub fn success(custom_id: impl Into<String>, result: GenerateTextResult) -> Self {
        Self {
            custom_id: custom_id.into(),
            result: Ok(result),
        }
    }

    /// Failed item
    pub fn failure(custom_id: impl Into<String>, error: GatewayError) -> Self {
        Self {
            custom_id: custom_id.into(),
            result: Err(error),
        }
    }

    /// Whether the item succeeded
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Listing filter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListBatchJobsQuery {
    /// Maximum jobs per page
    pub limit: Option<u32>,
    /// Cursor from a previous page
    pub after: Option<String>,
}

/// One page of batch jobs
#[derive(Debug, Clone, PartialEq)]
pub struct BatchJobPage {
    /// Jobs on this page
    pub jobs: Vec<BatchJob>,
    /// Cursor for the next page, `None` on the last page
    pub next_cursor: Option<String>,
}

/// Lazy, finite stream of batch results
pub type BatchResultStream = BoxStream<'static, GatewayResult<BatchResult>>;
