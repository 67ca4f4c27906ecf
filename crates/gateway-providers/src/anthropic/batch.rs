//! Message Batches API.

use super::mapping::{error_body_cause, from_response};
use super::types::{
    BatchCreateRequest, BatchEntry, BatchItemResult, BatchList, BatchResultLine, MessageBatch,
};
use super::{AnthropicModel, PROVIDER};
use crate::common::check_batch_items;
use crate::sse::json_lines;
use async_trait::async_trait;
use futures::StreamExt;
use gateway_core::{
    BatchCapableModel, BatchJob, BatchJobPage, BatchRequestItem, BatchResult, BatchResultStream,
    BatchStatus, BatchStorage, Cause, GatewayError, GatewayResult, ListBatchJobsQuery, Sentinel,
};
use tracing::{debug, info};

const BATCHES_PATH: &str = "/v1/messages/batches";

/// Unified status for a `processing_status`.
///
/// `ended` covers every terminal outcome, including cancellation; cancelled items surface
/// as per-item errors in the results.
pub(crate) fn map_status(status: &str) -> BatchStatus {
    match status {
        "in_progress" | "canceling" => BatchStatus::Processing,
        "ended" => BatchStatus::Completed,
        other => {
            debug!(status = %other, "Unknown batch processing status");
            BatchStatus::Pending
        }
    }
}

pub(crate) fn to_job(batch: MessageBatch) -> BatchJob {
    let counts = batch.request_counts;
    BatchJob {
        status: map_status(&batch.processing_status),
        id: batch.id,
        created_at: batch.created_at,
        completed_at: batch.ended_at,
        total_count: counts.processing
            + counts.succeeded
            + counts.errored
            + counts.canceled
            + counts.expired,
        done_count: counts.succeeded,
        failed_count: counts.errored + counts.canceled + counts.expired,
        storage: BatchStorage::Inline,
        error: None,
    }
}

/// Decode one line of a results file
pub(crate) fn parse_result_line(model_id: &str, line: &str) -> GatewayResult<BatchResult> {
    let parsed: BatchResultLine = serde_json::from_str(line).map_err(|e| {
        GatewayError::classify(
            PROVIDER,
            Sentinel::Batch,
            Cause::Decode(format!("invalid batch result line: {e}")),
        )
    })?;

    let item_error = |cause: Cause| GatewayError::classify(PROVIDER, Sentinel::Batch, cause);
    let result = match parsed.result {
        BatchItemResult::Succeeded { message } => {
            BatchResult::success(parsed.custom_id, from_response(model_id, message))
        }
        BatchItemResult::Errored { error } => {
            BatchResult::failure(parsed.custom_id, item_error(error_body_cause(&error.error)))
        }
        BatchItemResult::Canceled => BatchResult::failure(
            parsed.custom_id,
            item_error(Cause::Other("request was canceled before processing".to_string())),
        ),
        BatchItemResult::Expired => BatchResult::failure(
            parsed.custom_id,
            item_error(Cause::Other("request expired before processing".to_string())),
        ),
    };
    Ok(result)
}

#[async_trait]
impl BatchCapableModel for AnthropicModel {
    async fn submit_batch(&self, items: &[BatchRequestItem]) -> GatewayResult<BatchJob> {
        self.lifecycle.ensure_open(&self.model_id)?;
        check_batch_items(items)?;

        let requests = items
            .iter()
            .map(|item| {
                Ok(BatchEntry {
                    custom_id: item.custom_id.clone(),
                    params: self.request_body(&item.options, Sentinel::Batch, false)?,
                })
            })
            .collect::<GatewayResult<Vec<_>>>()?;

        let (batch, _) = Self::call(Sentinel::Batch)
            .json::<MessageBatch>(
                self.client.post(BATCHES_PATH).json(&BatchCreateRequest { requests }),
                None,
            )
            .await?;

        info!(batch_id = %batch.id, items = items.len(), "Submitted Anthropic message batch");
        Ok(to_job(batch))
    }

    async fn get_batch_job(&self, id: &str) -> GatewayResult<BatchJob> {
        self.lifecycle.ensure_open(&self.model_id)?;
        let (batch, _) = Self::call(Sentinel::Batch)
            .json::<MessageBatch>(self.client.get(&format!("{BATCHES_PATH}/{id}")), None)
            .await?;
        Ok(to_job(batch))
    }

    async fn list_batch_jobs(&self, query: &ListBatchJobsQuery) -> GatewayResult<BatchJobPage> {
        self.lifecycle.ensure_open(&self.model_id)?;

        let mut request = self.client.get(BATCHES_PATH);
        if let Some(limit) = query.limit {
            request = request.query(&[("limit", limit.to_string())]);
        }
        if let Some(after) = &query.after {
            request = request.query(&[("after_id", after)]);
        }

        let (list, _) = Self::call(Sentinel::Batch)
            .json::<BatchList>(request, None)
            .await?;

        let next_cursor = if list.has_more { list.last_id } else { None };
        Ok(BatchJobPage {
            jobs: list.data.into_iter().map(to_job).collect(),
            next_cursor,
        })
    }

    async fn download_batch_results(&self, id: &str) -> GatewayResult<BatchResultStream> {
        self.lifecycle.ensure_open(&self.model_id)?;
        let call = Self::call(Sentinel::Batch);

        let (batch, _) = call
            .json::<MessageBatch>(self.client.get(&format!("{BATCHES_PATH}/{id}")), None)
            .await?;
        let results_url = batch.results_url.clone();
        to_job(batch).ensure_downloadable()?;

        let results_url = results_url.ok_or_else(|| {
            call.error(Cause::Other(format!("batch {id} has no results_url")))
        })?;
        let response = call.send(self.client.get_url(&results_url), None).await?;

        let model_id = self.model_id.clone();
        Ok(json_lines(PROVIDER.to_string(), Sentinel::Batch, response)
            .map(move |line| line.and_then(|line| parse_result_line(&model_id, &line)))
            .boxed())
    }

    async fn cancel_batch_job(&self, id: &str) -> GatewayResult<BatchJob> {
        self.lifecycle.ensure_open(&self.model_id)?;
        let (batch, _) = Self::call(Sentinel::Batch)
            .json::<MessageBatch>(self.client.post(&format!("{BATCHES_PATH}/{id}/cancel")), None)
            .await?;

        info!(batch_id = %batch.id, "Requested Anthropic batch cancellation");
        Ok(to_job(batch))
    }
}
