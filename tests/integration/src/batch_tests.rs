//! Batch submit, poll, list, download and cancel against mock vendor APIs

use crate::fixtures::*;
use crate::mock_providers::*;
use futures::TryStreamExt;
use gateway_core::{
    batch_capable, BatchCapableModel, BatchRequestItem, BatchResult, BatchStatus, BatchStorage,
    Category, GatewayError, LanguageModel, ListBatchJobsQuery, Sentinel,
};
use gateway_providers::{AnthropicModel, GoogleModel, OpenAiModel};
use pretty_assertions::assert_eq;
use serde_json::json;

fn items() -> Vec<BatchRequestItem> {
    vec![
        BatchRequestItem::new("req-a", prompt("First question")),
        BatchRequestItem::new("req-b", prompt("Second question")),
    ]
}

fn by_id<'a>(results: &'a [BatchResult], id: &str) -> &'a BatchResult {
    results
        .iter()
        .find(|r| r.custom_id == id)
        .unwrap_or_else(|| panic!("no result for {id}"))
}

#[tokio::test]
async fn test_anthropic_submit_batch() {
    let mock = MockAnthropic::new().await;
    mock.mock_batch_create(anthropic_batch("msgbatch_1", "in_progress", None))
        .await;
    let model = AnthropicModel::from_target(&anthropic_target(&mock.url())).expect("model");

    let job = batch_capable(&model)
        .expect("batch capable")
        .submit_batch(&items())
        .await
        .expect("submit");

    assert_eq!(job.id, "msgbatch_1");
    assert_eq!(job.status, BatchStatus::Processing);
    assert_eq!(job.storage, BatchStorage::Inline);
    assert_eq!(job.total_count, 2);

    let body = request_json(&mock.requests().await[0]);
    let requests = body["requests"].as_array().expect("requests");
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0]["custom_id"], "req-a");
    assert_eq!(requests[0]["params"]["model"], "claude-sonnet-4-5");
    assert_eq!(
        requests[1]["params"]["messages"][0]["content"][0]["text"],
        "Second question"
    );
}

#[tokio::test]
async fn test_duplicate_custom_ids_rejected_locally() {
    let mock = MockAnthropic::new().await;
    let model = AnthropicModel::from_target(&anthropic_target(&mock.url())).expect("model");

    let duplicated = vec![
        BatchRequestItem::new("same", prompt("a")),
        BatchRequestItem::new("same", prompt("b")),
    ];
    let err = model
        .submit_batch(&duplicated)
        .await
        .expect_err("duplicate ids");

    assert!(matches!(err, GatewayError::Validation { .. }));
    assert!(model.submit_batch(&[]).await.is_err());
    assert!(mock.requests().await.is_empty());
}

#[tokio::test]
async fn test_anthropic_download_requires_completion() {
    let mock = MockAnthropic::new().await;
    mock.mock_batch_get("msgbatch_1", anthropic_batch("msgbatch_1", "in_progress", None))
        .await;
    let model = AnthropicModel::from_target(&anthropic_target(&mock.url())).expect("model");

    let err = model
        .download_batch_results("msgbatch_1")
        .await
        .err()
        .expect("not ready");

    match err {
        GatewayError::BatchNotReady { id, status } => {
            assert_eq!(id, "msgbatch_1");
            assert_eq!(status, BatchStatus::Processing);
        }
        other => panic!("unexpected error {other}"),
    }
}

#[tokio::test]
async fn test_anthropic_download_results() {
    let mock = MockAnthropic::new().await;
    let results_url = format!("{}/v1/messages/batches/msgbatch_1/results", mock.url());
    mock.mock_batch_get(
        "msgbatch_1",
        anthropic_batch("msgbatch_1", "ended", Some(&results_url)),
    )
    .await;
    mock.mock_batch_results(
        "msgbatch_1",
        jsonl(&[
            json!({"custom_id": "req-a", "result": {"type": "succeeded", "message": anthropic_message("Answer A")}}),
            json!({"custom_id": "req-b", "result": {"type": "errored", "error": {"type": "error", "error": {"type": "invalid_request_error", "message": "too long"}}}}),
        ]),
    )
    .await;
    let model = AnthropicModel::from_target(&anthropic_target(&mock.url())).expect("model");

    let results: Vec<BatchResult> = model
        .download_batch_results("msgbatch_1")
        .await
        .expect("download")
        .try_collect()
        .await
        .expect("results");

    assert_eq!(results.len(), 2);
    let a = by_id(&results, "req-a");
    assert!(a.is_success());
    assert_eq!(a.result.as_ref().map(|r| r.text()).ok(), Some("Answer A".to_string()));

    let b = by_id(&results, "req-b");
    let err = b.result.as_ref().expect_err("item error");
    assert!(err.is(Sentinel::Batch));
    assert!(err.is(Category::BadRequest));
}

#[tokio::test]
async fn test_openai_submit_batch() {
    let mock = MockOpenAI::new().await;
    mock.mock_file_upload("file-abc").await;
    mock.mock_batch_create(openai_batch("batch_1", "validating", None))
        .await;
    let model = OpenAiModel::from_target(&openai_target(&mock.url())).expect("model");

    let job = model.submit_batch(&items()).await.expect("submit");

    assert_eq!(job.id, "batch_1");
    assert_eq!(job.status, BatchStatus::Pending);
    assert!(matches!(job.storage, BatchStorage::FileId { .. }));

    let requests = mock.requests().await;
    assert_eq!(requests.len(), 2);
    let upload = String::from_utf8_lossy(&requests[0].body).to_string();
    assert!(upload.contains("name=\"purpose\""));
    assert!(upload.contains("\"custom_id\":\"req-a\""));
    assert!(upload.contains("\"url\":\"/v1/chat/completions\""));

    let create = request_json(&requests[1]);
    assert_eq!(
        create,
        json!({
            "input_file_id": "file-abc",
            "endpoint": "/v1/chat/completions",
            "completion_window": "24h"
        })
    );
}

#[tokio::test]
async fn test_openai_download_results() {
    let mock = MockOpenAI::new().await;
    mock.mock_batch_get("batch_1", openai_batch("batch_1", "completed", Some("file-out")))
        .await;
    mock.mock_file_content(
        "file-out",
        jsonl(&[
            json!({"id": "r1", "custom_id": "req-a", "response": {"status_code": 200, "body": openai_completion("Answer A")}, "error": null}),
            json!({"id": "r2", "custom_id": "req-b", "response": {"status_code": 429, "body": openai_error("rate_limit_exceeded", "Slow down")}, "error": null}),
        ]),
    )
    .await;
    let model = OpenAiModel::from_target(&openai_target(&mock.url())).expect("model");

    let job = model.get_batch_job("batch_1").await.expect("job");
    assert_eq!(job.status, BatchStatus::Completed);
    assert_eq!((job.total_count, job.done_count, job.failed_count), (2, 1, 1));
    assert!(job.completed_at.is_some());

    let results: Vec<BatchResult> = model
        .download_batch_results("batch_1")
        .await
        .expect("download")
        .try_collect()
        .await
        .expect("results");

    assert_eq!(results.len(), 2);
    assert!(by_id(&results, "req-a").is_success());
    let err = by_id(&results, "req-b").result.as_ref().expect_err("item error");
    assert!(err.is(Category::RateLimited));
}

#[tokio::test]
async fn test_openai_list_and_cancel() {
    let mock = MockOpenAI::new().await;
    mock.mock_batch_list(json!({
        "object": "list",
        "data": [
            openai_batch("batch_1", "in_progress", None),
            openai_batch("batch_2", "completed", Some("file-out"))
        ],
        "first_id": "batch_1",
        "last_id": "batch_2",
        "has_more": true
    }))
    .await;
    mock.mock_batch_cancel("batch_1", openai_batch("batch_1", "cancelling", None))
        .await;
    let model = OpenAiModel::from_target(&openai_target(&mock.url())).expect("model");

    let page = model
        .list_batch_jobs(&ListBatchJobsQuery {
            limit: Some(2),
            after: None,
        })
        .await
        .expect("list");
    let ids: Vec<&str> = page.jobs.iter().map(|j| j.id.as_str()).collect();
    assert_eq!(ids, vec!["batch_1", "batch_2"]);
    assert_eq!(page.next_cursor.as_deref(), Some("batch_2"));

    let job = model.cancel_batch_job("batch_1").await.expect("cancel");
    assert_eq!(job.status, BatchStatus::Processing);
}

#[tokio::test]
async fn test_vertex_submit_batch() {
    let mock = MockGoogle::new().await;
    mock.mock_object_upload().await;
    mock.mock_batch_create(vertex_batch_job(
        "projects/test-project/locations/us-central1/batchPredictionJobs/42",
        "JOB_STATE_PENDING",
    ))
    .await;
    let model = GoogleModel::vertex(&vertex_target(&mock.url())).expect("model");
    assert!(model.capabilities().batch_processing);

    let job = model.submit_batch(&items()).await.expect("submit");

    assert_eq!(job.id, "42");
    assert_eq!(job.status, BatchStatus::Pending);
    assert!(matches!(job.storage, BatchStorage::ObjectStorage { .. }));

    let requests = mock.requests().await;
    let upload = String::from_utf8_lossy(&requests[0].body).to_string();
    let first: serde_json::Value =
        serde_json::from_str(upload.lines().next().expect("line")).expect("json line");
    assert_eq!(first["key"], "req-a");
    assert_eq!(first["request"]["contents"][0]["parts"][0]["text"], "First question");

    let create = request_json(&requests[1]);
    assert_eq!(create["model"], "publishers/google/models/gemini-2.5-pro");
    assert_eq!(create["inputConfig"]["instancesFormat"], "jsonl");
    let source = create["inputConfig"]["gcsSource"]["uris"][0]
        .as_str()
        .expect("uri");
    assert!(source.starts_with("gs://test-bucket/"));
}

#[tokio::test]
async fn test_vertex_download_results() {
    let mock = MockGoogle::new().await;
    mock.mock_batch_get(
        "42",
        vertex_batch_job(
            "projects/test-project/locations/us-central1/batchPredictionJobs/42",
            "JOB_STATE_SUCCEEDED",
        ),
    )
    .await;
    mock.mock_object_list(&[
        "out/prediction-1/predictions_00001.jsonl",
        "out/prediction-1/_SUCCESS",
    ])
    .await;
    mock.mock_object_media(
        r"out%2Fprediction-1%2Fpredictions_00001\.jsonl",
        jsonl(&[
            json!({"key": "req-a", "response": gemini_response("Answer A"), "status": ""}),
            json!({"key": "req-b", "status": "Bad Request: invalid argument"}),
        ]),
    )
    .await;
    let model = GoogleModel::vertex(&vertex_target(&mock.url())).expect("model");

    let results: Vec<BatchResult> = model
        .download_batch_results("42")
        .await
        .expect("download")
        .try_collect()
        .await
        .expect("results");

    assert_eq!(results.len(), 2);
    assert!(by_id(&results, "req-a").is_success());
    assert!(!by_id(&results, "req-b").is_success());
}

#[tokio::test]
async fn test_gemini_api_has_no_batch() {
    let mock = MockGoogle::new().await;
    let model = GoogleModel::gemini(&gemini_target(&mock.url())).expect("model");

    assert!(!model.capabilities().batch_processing);
    assert!(model.as_batch().is_none());
    let err = batch_capable(&model).err().expect("unsupported");
    assert!(matches!(err, GatewayError::Unsupported { .. }));
}
