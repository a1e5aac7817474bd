//! HTTP API tests against an in-process router.

#![cfg(unix)]

mod common;

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use chaptergrab_core::{Chapter, JobStatus, MediaInfo};
use common::{fixtures, TestFixture};

const VIDEO: &str = "https://www.youtube.com/watch?v=abc123";

/// Opens the progress stream for `identifier` and returns its body.
async fn open_stream(fixture: &TestFixture, identifier: &str) -> (StatusCode, Body, Option<String>) {
    let uri = format!(
        "/api/v1/downloads/progress?identifier={}",
        urlencoding::encode(identifier)
    );
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = fixture.router.clone().oneshot(request).await.unwrap();
    let content_type = response
        .headers()
        .get("content-type")
        .map(|v| v.to_str().unwrap().to_string());
    (response.status(), response.into_body(), content_type)
}

/// Reads NDJSON records until one of type `kind` arrives.
async fn read_until(body: &mut Body, kind: &str) -> Vec<Value> {
    let mut records = Vec::new();
    let mut buffer = String::new();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let frame = tokio::time::timeout_at(deadline, body.frame())
            .await
            .unwrap_or_else(|_| panic!("no {} record before timeout: {:?}", kind, records))
            .expect("stream ended")
            .expect("stream error");
        let Ok(data) = frame.into_data() else { continue };
        buffer.push_str(std::str::from_utf8(&data).unwrap());
        while let Some(pos) = buffer.find('\n') {
            let line: String = buffer.drain(..=pos).collect();
            if line.trim().is_empty() {
                // keep-alive
                continue;
            }
            let record: Value = serde_json::from_str(line.trim()).unwrap();
            let done = record["type"] == kind;
            records.push(record);
            if done {
                return records;
            }
        }
    }
}

#[tokio::test]
async fn test_health() {
    let fixture = TestFixture::new().await;
    let response = fixture.get("/api/v1/health").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
}

#[tokio::test]
async fn test_config_is_sanitized() {
    let fixture = TestFixture::new().await;
    let response = fixture.get("/api/v1/config").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["downloader"]["extra_args_count"], 0);
    assert!(response.body["downloader"].get("extra_args").is_none());
}

#[tokio::test]
async fn test_start_returns_accepted_and_completes() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post("/api/v1/downloads", json!({ "url": VIDEO, "qualitySelector": "best" }))
        .await;
    assert_eq!(response.status, StatusCode::ACCEPTED);
    assert_eq!(response.body["status"], "started");
    assert_eq!(response.body["key"], "youtube:abc123");
    assert_eq!(response.body["mode"], "fresh");
    assert_eq!(response.body["launched"], true);

    fixture.wait_for_status(VIDEO, JobStatus::Done).await;

    let status = fixture
        .get("/api/v1/downloads/status?identifier=youtube:abc123")
        .await;
    assert_eq!(status.status, StatusCode::OK);
    assert_eq!(status.body["status"], "done");
    assert_eq!(status.body["progress"]["type"], "done");
    assert_eq!(status.body["progress"]["percent"], 100.0);
}

#[tokio::test]
async fn test_start_rejects_empty_identifier() {
    let fixture = TestFixture::new().await;
    let response = fixture.post("/api/v1/downloads", json!({ "url": "  " })).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.body["error"].is_string());
    assert!(fixture.engine.invocations().is_empty());
}

#[tokio::test]
async fn test_start_with_missing_downloader_reports_not_launched() {
    let fixture = TestFixture::new().await;
    std::fs::remove_file(fixture.temp_dir.path().join("fake-yt-dlp")).unwrap();

    let response = fixture.post("/api/v1/downloads", json!({ "url": VIDEO })).await;
    assert_eq!(response.status, StatusCode::ACCEPTED);
    assert_eq!(response.body["launched"], false);

    let status = fixture.get("/api/v1/downloads/status?identifier=abc123").await;
    // bare ids are their own key, unlike the normalized URL
    assert_eq!(status.status, StatusCode::NOT_FOUND);

    let status = fixture
        .get("/api/v1/downloads/status?identifier=youtube:abc123")
        .await;
    assert_eq!(status.body["status"], "error");
    assert_eq!(status.body["progress"]["type"], "error");
}

#[tokio::test]
async fn test_pause_unknown_job_is_noop() {
    let fixture = TestFixture::new().await;
    let response = fixture
        .post("/api/v1/downloads/pause", json!({ "identifier": VIDEO }))
        .await;
    assert_eq!(response.status, StatusCode::ACCEPTED);
    assert_eq!(response.body["status"], "nothing_to_pause");
}

#[tokio::test]
async fn test_pause_rejects_empty_identifier() {
    let fixture = TestFixture::new().await;
    let response = fixture
        .post("/api/v1/downloads/pause", json!({ "identifier": "" }))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_status_unknown_job() {
    let fixture = TestFixture::new().await;
    let response = fixture
        .get("/api/v1/downloads/status?identifier=nothing-here")
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_downloads() {
    let fixture = TestFixture::new().await;
    let empty = fixture.get("/api/v1/downloads").await;
    assert_eq!(empty.body["count"], 0);

    fixture.post("/api/v1/downloads", json!({ "url": VIDEO })).await;
    fixture.wait_for_status(VIDEO, JobStatus::Done).await;

    let response = fixture.get("/api/v1/downloads").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["count"], 1);
    assert_eq!(response.body["jobs"][0]["key"], "youtube:abc123");
    assert_eq!(response.body["jobs"][0]["identifier"], VIDEO);
}

#[tokio::test]
async fn test_progress_stream_replays_snapshot() {
    let fixture = TestFixture::new().await;
    fixture.post("/api/v1/downloads", json!({ "url": VIDEO })).await;
    fixture.wait_for_status(VIDEO, JobStatus::Done).await;

    let (status, mut body, content_type) = open_stream(&fixture, VIDEO).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("application/x-ndjson"));

    let records = read_until(&mut body, "done").await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["percent"], 100.0);
}

#[tokio::test]
async fn test_progress_stream_follows_pause_and_resume() {
    let fixture = TestFixture::with_script(fixtures::LONG_RUNNING_SCRIPT).await;

    // subscribe before the job exists
    let (_, mut body, _) = open_stream(&fixture, VIDEO).await;

    fixture.post("/api/v1/downloads", json!({ "url": VIDEO })).await;
    fixture.wait_for_status(VIDEO, JobStatus::Running).await;

    let pause = fixture
        .post("/api/v1/downloads/pause", json!({ "url": VIDEO }))
        .await;
    assert_eq!(pause.body["status"], "pausing");

    let first_cycle = read_until(&mut body, "paused").await;
    assert_eq!(first_cycle[0]["message"], "Starting download...");
    assert_eq!(
        first_cycle.iter().filter(|r| r["type"] == "paused").count(),
        1
    );
    fixture.wait_for_status(VIDEO, JobStatus::Paused).await;

    let resume = fixture.post("/api/v1/downloads", json!({ "url": VIDEO })).await;
    assert_eq!(resume.body["mode"], "resume");

    let second_cycle = read_until(&mut body, "progress").await;
    assert_eq!(second_cycle[0]["message"], "Resuming download...");

    fixture
        .post("/api/v1/downloads/pause", json!({ "url": VIDEO }))
        .await;
    read_until(&mut body, "paused").await;
}

#[tokio::test]
async fn test_progress_stream_disconnect_releases_listener() {
    let fixture = TestFixture::new().await;
    let key = chaptergrab_core::JobKey::parse(VIDEO).unwrap();

    let (_, body, _) = open_stream(&fixture, VIDEO).await;
    assert_eq!(fixture.registry.events().listener_count(&key), 1);

    drop(body);
    assert_eq!(fixture.registry.events().listener_count(&key), 0);
}

#[tokio::test]
async fn test_progress_stream_requires_identifier() {
    let fixture = TestFixture::new().await;
    let (status, _, _) = open_stream(&fixture, " ").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_info_returns_metadata() {
    let fixture = TestFixture::new().await;
    fixture.metadata.set_result(
        VIDEO,
        MediaInfo {
            title: "Talk".to_string(),
            description: None,
            duration: Some(600.0),
            thumbnail: Some("https://i.ytimg.com/vi/abc123/hq.jpg".to_string()),
            filesize: Some(1_048_576),
            chapters: vec![Chapter {
                index: 0,
                time: "00:00:00".to_string(),
                name: "Intro".to_string(),
            }],
        },
    );

    let response = fixture
        .post("/api/v1/info", json!({ "url": VIDEO, "qualitySelector": "best" }))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["title"], "Talk");
    assert_eq!(response.body["chapters"][0]["name"], "Intro");
    assert_eq!(
        fixture.metadata.lookups(),
        vec![(VIDEO.to_string(), Some("best".to_string()))]
    );
}

#[tokio::test]
async fn test_info_errors_map_to_status() {
    let fixture = TestFixture::new().await;

    let unknown = fixture.post("/api/v1/info", json!({ "url": VIDEO })).await;
    assert_eq!(unknown.status, StatusCode::BAD_GATEWAY);

    let empty = fixture.post("/api/v1/info", json!({ "url": "" })).await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let fixture = TestFixture::new().await;
    fixture.get("/api/v1/health").await;

    let response = fixture.get("/metrics").await;
    assert_eq!(response.status, StatusCode::OK);
    let text = response.body.as_str().unwrap();
    assert!(text.contains("chaptergrab_http_requests_total"));
}
