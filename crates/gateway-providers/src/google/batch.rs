//! Vertex AI batch prediction staged through Cloud Storage.

use super::mapping::from_response;
use super::types::{
    BatchInputLine, BatchJobList, BatchOutputLine, BatchPredictionJob, CreateBatchJob,
    GcsDestination, GcsSource, InputConfig, ObjectList, OutputConfig,
};
use super::{GoogleClient, GoogleModel};
use crate::common::check_batch_items;
use crate::http::Call;
use crate::sse::json_lines;
use async_stream::try_stream;
use async_trait::async_trait;
use futures::StreamExt;
use gateway_core::{
    BatchCapableModel, BatchJob, BatchJobPage, BatchRequestItem, BatchResult, BatchResultStream,
    BatchStatus, BatchStorage, Capability, Cause, GatewayError, GatewayResult, ListBatchJobsQuery,
    Sentinel,
};
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

const STAGING_PREFIX: &str = "gateway-batches";

/// Unified status for a `JOB_STATE_*` value
pub(crate) fn map_state(state: &str) -> BatchStatus {
    match state.strip_prefix("JOB_STATE_").unwrap_or(state) {
        "RUNNING" | "UPDATING" | "PAUSED" | "CANCELLING" => BatchStatus::Processing,
        "SUCCEEDED" | "PARTIALLY_SUCCEEDED" => BatchStatus::Completed,
        "FAILED" | "EXPIRED" => BatchStatus::Failed,
        "CANCELLED" => BatchStatus::Cancelled,
        _ => BatchStatus::Pending,
    }
}

/// Split `gs://bucket/path` into bucket and object path
pub(crate) fn split_gcs_uri(uri: &str) -> Option<(&str, &str)> {
    let rest = uri.strip_prefix("gs://")?;
    match rest.split_once('/') {
        Some((bucket, path)) if !bucket.is_empty() => Some((bucket, path.trim_end_matches('/'))),
        None if !rest.is_empty() => Some((rest, "")),
        _ => None,
    }
}

pub(crate) fn to_job(job: BatchPredictionJob) -> BatchJob {
    let stats = job.completion_stats.unwrap_or_default();
    let input_uri = job
        .input_config
        .and_then(|c| c.gcs_source)
        .and_then(|s| s.uris.into_iter().next())
        .unwrap_or_default();
    let output_uri = job
        .output_info
        .and_then(|i| i.gcs_output_directory)
        .or_else(|| {
            job.output_config
                .and_then(|c| c.gcs_destination)
                .map(|d| d.output_uri_prefix)
        })
        .unwrap_or_default();

    BatchJob {
        id: job.name.rsplit('/').next().unwrap_or(&job.name).to_string(),
        status: map_state(&job.state),
        created_at: job.create_time,
        completed_at: job.end_time,
        total_count: stats.successful_count + stats.failed_count + stats.incomplete_count,
        done_count: stats.successful_count,
        failed_count: stats.failed_count,
        storage: BatchStorage::ObjectStorage {
            input_uri,
            output_uri,
        },
        error: job.error.map(|e| e.message),
    }
}

/// Decode one prediction line
pub(crate) fn parse_output_line(
    provider: &'static str,
    model_id: &str,
    line: &str,
) -> GatewayResult<BatchResult> {
    let item_error = |cause: Cause| GatewayError::classify(provider, Sentinel::Batch, cause);
    let parsed: BatchOutputLine = serde_json::from_str(line)
        .map_err(|e| item_error(Cause::Decode(format!("invalid prediction line: {e}"))))?;

    let custom_id = parsed.key.unwrap_or_default();
    if let Some(status) = parsed.status.filter(|s| !s.is_empty()) {
        return Ok(BatchResult::failure(custom_id, item_error(Cause::Other(status))));
    }
    match parsed.response {
        Some(response) => Ok(BatchResult::success(custom_id, from_response(model_id, response))),
        None => Ok(BatchResult::failure(
            custom_id,
            item_error(Cause::Decode("prediction line has no response".to_string())),
        )),
    }
}

impl GoogleModel {
    fn jobs_url(&self) -> GatewayResult<String> {
        self.client.batch_jobs_url().ok_or(GatewayError::Unsupported {
            capability: Capability::BatchProcessing,
        })
    }

    fn bucket(&self) -> GatewayResult<&str> {
        self.batch_bucket
            .as_deref()
            .filter(|_| self.supports_batch())
            .ok_or(GatewayError::Unsupported {
                capability: Capability::BatchProcessing,
            })
    }

    async fn fetch_job(&self, id: &str) -> GatewayResult<BatchPredictionJob> {
        let url = format!("{}/{id}", self.jobs_url()?);
        let (job, _) = self
            .call(Sentinel::Batch)
            .json::<BatchPredictionJob>(self.client.get(&url), None)
            .await?;
        Ok(job)
    }

    async fn upload_object(&self, bucket: &str, name: &str, body: String) -> GatewayResult<()> {
        let url = self.client.storage_url(&format!("/upload/storage/v1/b/{bucket}/o"));
        let request = self
            .client
            .post(&url)
            .query(&[("uploadType", "media"), ("name", name)])
            .header("content-type", "application/jsonl")
            .body(body);
        self.call(Sentinel::Batch).send(request, None).await?;
        Ok(())
    }
}

/// Object names under a prefix, following pagination
async fn list_objects(
    client: &GoogleClient,
    call: Call<'static>,
    bucket: &str,
    prefix: &str,
) -> GatewayResult<Vec<String>> {
    let url = client.storage_url(&format!("/storage/v1/b/{bucket}/o"));
    let mut names = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let mut request = client.get(&url).query(&[("prefix", prefix)]);
        if let Some(token) = &page_token {
            request = request.query(&[("pageToken", token)]);
        }
        let (page, _) = call.json::<ObjectList>(request, None).await?;
        names.extend(page.items.into_iter().map(|o| o.name));

        match page.next_page_token.filter(|t| !t.is_empty()) {
            Some(token) => page_token = Some(token),
            None => return Ok(names),
        }
    }
}

/// Media download URL for an object; the name is one percent-encoded path segment
fn object_media_url(
    client: &GoogleClient,
    call: Call<'static>,
    bucket: &str,
    name: &str,
) -> GatewayResult<Url> {
    let mut url = Url::parse(&client.storage_url(&format!("/storage/v1/b/{bucket}/o")))
        .map_err(|e| call.error(Cause::Other(format!("invalid storage URL: {e}"))))?;
    url.path_segments_mut()
        .map_err(|()| call.error(Cause::Other("storage URL cannot be a base".to_string())))?
        .push(name);
    url.query_pairs_mut().append_pair("alt", "media");
    Ok(url)
}

#[async_trait]
impl BatchCapableModel for GoogleModel {
    async fn submit_batch(&self, items: &[BatchRequestItem]) -> GatewayResult<BatchJob> {
        self.lifecycle.ensure_open(&self.model_id)?;
        let bucket = self.bucket()?;
        check_batch_items(items)?;

        let mut jsonl = String::new();
        for item in items {
            let line = BatchInputLine {
                key: &item.custom_id,
                request: self.request_body(&item.options, Sentinel::Batch)?,
            };
            let encoded = serde_json::to_string(&line).map_err(|e| {
                self.call(Sentinel::Batch)
                    .error(Cause::Other(format!("failed to encode batch line: {e}")))
            })?;
            jsonl.push_str(&encoded);
            jsonl.push('\n');
        }

        let run = Uuid::new_v4().simple().to_string();
        let input_name = format!("{STAGING_PREFIX}/{run}/input.jsonl");
        self.upload_object(bucket, &input_name, jsonl).await?;
        debug!(bucket = %bucket, object = %input_name, "Uploaded batch input");

        let create = CreateBatchJob {
            display_name: format!("gateway-{run}"),
            model: format!("publishers/google/models/{}", self.model_id),
            input_config: InputConfig {
                instances_format: "jsonl".to_string(),
                gcs_source: Some(GcsSource {
                    uris: vec![format!("gs://{bucket}/{input_name}")],
                }),
            },
            output_config: OutputConfig {
                predictions_format: "jsonl".to_string(),
                gcs_destination: Some(GcsDestination {
                    output_uri_prefix: format!("gs://{bucket}/{STAGING_PREFIX}/{run}/output"),
                }),
            },
        };

        let (job, _) = self
            .call(Sentinel::Batch)
            .json::<BatchPredictionJob>(self.client.post(&self.jobs_url()?).json(&create), None)
            .await?;

        info!(job = %job.name, items = items.len(), "Submitted Vertex AI batch prediction job");
        Ok(to_job(job))
    }

    async fn get_batch_job(&self, id: &str) -> GatewayResult<BatchJob> {
        self.lifecycle.ensure_open(&self.model_id)?;
        Ok(to_job(self.fetch_job(id).await?))
    }

    async fn list_batch_jobs(&self, query: &ListBatchJobsQuery) -> GatewayResult<BatchJobPage> {
        self.lifecycle.ensure_open(&self.model_id)?;

        let mut request = self.client.get(&self.jobs_url()?);
        if let Some(limit) = query.limit {
            request = request.query(&[("pageSize", limit.to_string())]);
        }
        if let Some(after) = &query.after {
            request = request.query(&[("pageToken", after)]);
        }

        let (list, _) = self
            .call(Sentinel::Batch)
            .json::<BatchJobList>(request, None)
            .await?;

        Ok(BatchJobPage {
            jobs: list.batch_prediction_jobs.into_iter().map(to_job).collect(),
            next_cursor: list.next_page_token.filter(|t| !t.is_empty()),
        })
    }

    async fn download_batch_results(&self, id: &str) -> GatewayResult<BatchResultStream> {
        self.lifecycle.ensure_open(&self.model_id)?;
        let call = self.call(Sentinel::Batch);

        let job = to_job(self.fetch_job(id).await?);
        job.ensure_downloadable()?;

        let BatchStorage::ObjectStorage { output_uri, .. } = &job.storage else {
            return Err(call.error(Cause::Other(format!("job {id} has no output location"))));
        };
        let (bucket, prefix) = split_gcs_uri(output_uri)
            .map(|(b, p)| (b.to_string(), p.to_string()))
            .ok_or_else(|| call.error(Cause::Other(format!("unexpected output location '{output_uri}'"))))?;

        let client = self.client.clone();
        let provider = self.provider_name();
        let model_id = self.model_id.clone();
        let stream = try_stream! {
            let names = list_objects(&client, call, &bucket, &prefix).await?;
            for name in names.into_iter().filter(|n| n.ends_with(".jsonl")) {
                let url = object_media_url(&client, call, &bucket, &name)?;
                let response = call.send(client.get(url.as_str()), None).await?;
                let mut lines = std::pin::pin!(json_lines(provider.to_string(), Sentinel::Batch, response));
                while let Some(line) = lines.next().await {
                    yield parse_output_line(provider, &model_id, &line?)?;
                }
            }
        };
        Ok(stream.boxed())
    }

    async fn cancel_batch_job(&self, id: &str) -> GatewayResult<BatchJob> {
        self.lifecycle.ensure_open(&self.model_id)?;

        let url = format!("{}/{id}:cancel", self.jobs_url()?);
        self.call(Sentinel::Batch)
            .send(self.client.post(&url).json(&serde_json::json!({})), None)
            .await?;
        info!(job = %id, "Requested Vertex AI batch cancellation");

        self.get_batch_job(id).await
    }
}
