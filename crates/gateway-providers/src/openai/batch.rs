//! Batch API over uploaded JSONL files.

use super::mapping::{from_response, parse_error};
use super::types::{
    BatchCreateRequest, BatchInputLine, BatchList, BatchObject, BatchOutputLine, ChatResponse,
    FileObject,
};
use super::{OpenAiModel, CHAT_PATH, PROVIDER};
use crate::common::check_batch_items;
use crate::sse::json_lines;
use async_stream::try_stream;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use gateway_core::{
    BatchCapableModel, BatchJob, BatchJobPage, BatchRequestItem, BatchResult, BatchResultStream,
    BatchStatus, BatchStorage, Cause, GatewayError, GatewayResult, ListBatchJobsQuery, Sentinel,
};
use reqwest::multipart::{Form, Part};
use tracing::{debug, info};

const FILES_PATH: &str = "/v1/files";
const BATCHES_PATH: &str = "/v1/batches";
const COMPLETION_WINDOW: &str = "24h";

/// Unified status for a vendor batch status
pub(crate) fn map_status(status: &str) -> BatchStatus {
    match status {
        "validating" => BatchStatus::Pending,
        "in_progress" | "finalizing" | "cancelling" => BatchStatus::Processing,
        "completed" => BatchStatus::Completed,
        "failed" | "expired" => BatchStatus::Failed,
        "cancelled" => BatchStatus::Cancelled,
        other => {
            debug!(status = %other, "Unknown batch status");
            BatchStatus::Pending
        }
    }
}

fn timestamp(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

pub(crate) fn to_job(batch: BatchObject) -> BatchJob {
    let counts = batch.request_counts.unwrap_or_default();
    let finished_at = batch
        .completed_at
        .or(batch.failed_at)
        .or(batch.expired_at)
        .or(batch.cancelled_at);
    let error = batch
        .errors
        .and_then(|errors| errors.data.into_iter().next())
        .map(|entry| match entry.code {
            Some(code) => format!("{code}: {}", entry.message),
            None => entry.message,
        });

    BatchJob {
        status: map_status(&batch.status),
        id: batch.id,
        created_at: timestamp(batch.created_at),
        completed_at: finished_at.map(timestamp),
        total_count: counts.total,
        done_count: counts.completed,
        failed_count: counts.failed,
        storage: BatchStorage::FileId {
            input_file_id: batch.input_file_id,
            output_file_id: batch.output_file_id,
            error_file_id: batch.error_file_id,
        },
        error,
    }
}

/// Decode one line of an output or error file
pub(crate) fn parse_output_line(model_id: &str, line: &str) -> GatewayResult<BatchResult> {
    let parsed: BatchOutputLine = serde_json::from_str(line).map_err(|e| {
        GatewayError::classify(
            PROVIDER,
            Sentinel::Batch,
            Cause::Decode(format!("invalid batch output line: {e}")),
        )
    })?;
    let item_error = |cause: Cause| GatewayError::classify(PROVIDER, Sentinel::Batch, cause);

    if let Some(error) = parsed.error {
        let message = match error.code {
            Some(code) => format!("{code}: {}", error.message),
            None => error.message,
        };
        return Ok(BatchResult::failure(parsed.custom_id, item_error(Cause::Other(message))));
    }

    let Some(response) = parsed.response else {
        return Ok(BatchResult::failure(
            parsed.custom_id,
            item_error(Cause::Decode("output line has neither response nor error".to_string())),
        ));
    };

    if !(200..300).contains(&response.status_code) {
        let cause = parse_error(response.status_code, &response.body.to_string());
        return Ok(BatchResult::failure(parsed.custom_id, item_error(cause)));
    }

    let result = serde_json::from_value::<ChatResponse>(response.body)
        .map_err(|e| item_error(Cause::Decode(format!("unexpected response shape: {e}"))))
        .and_then(|chat| from_response(PROVIDER, Sentinel::Batch, model_id, chat));
    Ok(BatchResult {
        custom_id: parsed.custom_id,
        result,
    })
}

impl OpenAiModel {
    async fn fetch_batch(&self, id: &str) -> GatewayResult<BatchObject> {
        let (batch, _) = Self::call(Sentinel::Batch)
            .json::<BatchObject>(self.client.get(&format!("{BATCHES_PATH}/{id}")), None)
            .await?;
        Ok(batch)
    }

    async fn upload_jsonl(&self, jsonl: String) -> GatewayResult<FileObject> {
        let call = Self::call(Sentinel::Batch);
        let part = Part::bytes(jsonl.into_bytes())
            .file_name("batch.jsonl")
            .mime_str("application/jsonl")
            .map_err(|e| call.error(Cause::Other(format!("invalid upload part: {e}"))))?;
        let form = Form::new().text("purpose", "batch").part("file", part);

        let (file, _) = call
            .json::<FileObject>(self.client.post(FILES_PATH).multipart(form), None)
            .await?;
        Ok(file)
    }
}

#[async_trait]
impl BatchCapableModel for OpenAiModel {
    async fn submit_batch(&self, items: &[BatchRequestItem]) -> GatewayResult<BatchJob> {
        self.lifecycle.ensure_open(&self.model_id)?;
        check_batch_items(items)?;

        let mut jsonl = String::new();
        for item in items {
            let line = BatchInputLine {
                custom_id: &item.custom_id,
                method: "POST",
                url: CHAT_PATH,
                body: self.request_body(&item.options, Sentinel::Batch, false)?,
            };
            let encoded = serde_json::to_string(&line).map_err(|e| {
                Self::call(Sentinel::Batch).error(Cause::Other(format!("failed to encode batch line: {e}")))
            })?;
            jsonl.push_str(&encoded);
            jsonl.push('\n');
        }

        let file = self.upload_jsonl(jsonl).await?;
        debug!(file_id = %file.id, "Uploaded batch input file");

        let (batch, _) = Self::call(Sentinel::Batch)
            .json::<BatchObject>(
                self.client.post(BATCHES_PATH).json(&BatchCreateRequest {
                    input_file_id: &file.id,
                    endpoint: CHAT_PATH,
                    completion_window: COMPLETION_WINDOW,
                }),
                None,
            )
            .await?;

        info!(batch_id = %batch.id, items = items.len(), "Submitted OpenAI batch");
        Ok(to_job(batch))
    }

    async fn get_batch_job(&self, id: &str) -> GatewayResult<BatchJob> {
        self.lifecycle.ensure_open(&self.model_id)?;
        Ok(to_job(self.fetch_batch(id).await?))
    }

    async fn list_batch_jobs(&self, query: &ListBatchJobsQuery) -> GatewayResult<BatchJobPage> {
        self.lifecycle.ensure_open(&self.model_id)?;

        let mut request = self.client.get(BATCHES_PATH);
        if let Some(limit) = query.limit {
            request = request.query(&[("limit", limit.to_string())]);
        }
        if let Some(after) = &query.after {
            request = request.query(&[("after", after)]);
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

        let job = to_job(self.fetch_batch(id).await?);
        job.ensure_downloadable()?;

        let file_ids: Vec<String> = match job.storage {
            BatchStorage::FileId {
                output_file_id,
                error_file_id,
                ..
            } => output_file_id.into_iter().chain(error_file_id).collect(),
            _ => Vec::new(),
        };

        let client = self.client.clone();
        let model_id = self.model_id.clone();
        let stream = try_stream! {
            for file_id in file_ids {
                let response = Self::call(Sentinel::Batch)
                    .send(client.get(&format!("{FILES_PATH}/{file_id}/content")), None)
                    .await?;
                let mut lines = std::pin::pin!(json_lines(PROVIDER.to_string(), Sentinel::Batch, response));
                while let Some(line) = lines.next().await {
                    yield parse_output_line(&model_id, &line?)?;
                }
            }
        };
        Ok(stream.boxed())
    }

    async fn cancel_batch_job(&self, id: &str) -> GatewayResult<BatchJob> {
        self.lifecycle.ensure_open(&self.model_id)?;
        let (batch, _) = Self::call(Sentinel::Batch)
            .json::<BatchObject>(self.client.post(&format!("{BATCHES_PATH}/{id}/cancel")), None)
            .await?;

        info!(batch_id = %batch.id, "Requested OpenAI batch cancellation");
        Ok(to_job(batch))
    }
}
