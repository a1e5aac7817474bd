//! Common test utilities for API testing.
//!
//! Builds an in-process router around a real [`JobRegistry`] driving a fake
//! downloader script, plus a mock metadata provider.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use chaptergrab_core::{
    testing::{MockMetadataProvider, RecordingEngine},
    Config, DownloaderConfig, JobRegistry, JobStatus, JobKey, YtDlpEngine,
};
use chaptergrab_server::AppState;

/// Re-export fixtures for test convenience
pub use chaptergrab_core::testing::fixtures;

/// Test fixture with a scripted downloader and mock metadata.
pub struct TestFixture {
    pub router: Router,
    pub registry: Arc<JobRegistry>,
    pub engine: Arc<RecordingEngine<YtDlpEngine>>,
    pub metadata: Arc<MockMetadataProvider>,
    /// Holds the fake downloader script and its argument log.
    pub temp_dir: TempDir,
    pub output_dir: PathBuf,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Fixture whose downloader exits successfully.
    pub async fn new() -> Self {
        Self::with_script(fixtures::SUCCESS_SCRIPT).await
    }

    /// Fixture whose downloader runs `script`.
    pub async fn with_script(script: &str) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let program =
            fixtures::downloader_script(temp_dir.path(), script).expect("Failed to write script");
        let output_dir = temp_dir.path().join("downloads");

        let downloader = DownloaderConfig::with_program(&program)
            .with_output_dir(&output_dir)
            .with_grace_period_ms(500);
        let config = Config {
            downloader: downloader.clone(),
            ..Default::default()
        };

        let engine = Arc::new(RecordingEngine::new(YtDlpEngine::new(&program)));
        let registry = Arc::new(JobRegistry::new(engine.clone(), downloader));
        let metadata = Arc::new(MockMetadataProvider::new());

        let state = Arc::new(AppState::with_components(
            config,
            Arc::clone(&registry),
            metadata.clone(),
        ));
        let router = chaptergrab_server::create_router(state);

        Self {
            router,
            registry,
            engine,
            metadata,
            temp_dir,
            output_dir,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let builder = Request::builder().method(method).uri(path);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        TestResponse { status, body }
    }

    /// Polls the registry until the job reaches `status`.
    pub async fn wait_for_status(&self, identifier: &str, status: JobStatus) {
        let key = JobKey::parse(identifier).unwrap();
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        loop {
            if self.registry.status(&key) == Some(status) {
                return;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "job {} never reached {:?} (now {:?})",
                identifier,
                status,
                self.registry.status(&key)
            );
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}
