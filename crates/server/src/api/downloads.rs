//! Download job API handlers.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use chaptergrab_core::{JobError, JobKey, JobSummary, LaunchMode, PauseOutcome, StartRequest};

use super::{api_error, ApiError};
use crate::state::AppState;

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct PauseRequest {
    #[serde(alias = "url")]
    pub identifier: String,
}

#[derive(Debug, Deserialize)]
pub struct IdentifierParams {
    #[serde(alias = "url")]
    pub identifier: String,
}

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub status: String,
    pub key: JobKey,
    pub mode: LaunchMode,
    /// False when the downloader could not be spawned; the error record is
    /// already on the progress stream.
    pub launched: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct PauseResponse {
    pub status: PauseOutcome,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct JobListResponse {
    pub jobs: Vec<JobSummary>,
    pub count: usize,
}

fn bad_request(e: JobError) -> ApiError {
    api_error(StatusCode::BAD_REQUEST, e.to_string())
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/v1/downloads
///
/// Start, restart or resume a download. Returns as soon as the job is
/// initiated; progress (including spawn failures) arrives on the progress
/// stream.
pub async fn start_download(
    State(state): State<Arc<AppState>>,
    Json(body): Json<StartRequest>,
) -> Result<(StatusCode, Json<StartResponse>), ApiError> {
    let ack = state.registry().start(body).await.map_err(bad_request)?;
    info!(key = %ack.key, mode = ack.mode.as_str(), "Download initiated");

    let message = match ack.mode {
        LaunchMode::Resume => "Download resuming",
        LaunchMode::Restart => "Download restarted",
        LaunchMode::Fresh => "Download initiated",
    };
    Ok((
        StatusCode::ACCEPTED,
        Json(StartResponse {
            status: "started".to_string(),
            key: ack.key,
            mode: ack.mode,
            launched: ack.launched,
            message: message.to_string(),
        }),
    ))
}

/// POST /api/v1/downloads/pause
///
/// Request a pause. Pausing an unknown or idle job is not an error.
pub async fn pause_download(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PauseRequest>,
) -> Result<(StatusCode, Json<PauseResponse>), ApiError> {
    let outcome = state
        .registry()
        .request_pause(&body.identifier)
        .await
        .map_err(bad_request)?;

    let message = match outcome {
        PauseOutcome::Pausing => "Pause requested",
        PauseOutcome::NothingToPause => "No active download to pause",
    };
    Ok((
        StatusCode::ACCEPTED,
        Json(PauseResponse {
            status: outcome,
            message: message.to_string(),
        }),
    ))
}

/// GET /api/v1/downloads/status?identifier=
///
/// Latest known state of one job.
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    Query(params): Query<IdentifierParams>,
) -> Result<Json<JobSummary>, ApiError> {
    let key = JobKey::parse(&params.identifier).map_err(bad_request)?;
    match state.registry().get(&key) {
        Some(job) => Ok(Json(job)),
        None => Err(api_error(
            StatusCode::NOT_FOUND,
            format!("No download found for: {}", params.identifier),
        )),
    }
}

/// GET /api/v1/downloads
///
/// All jobs known to this process, most recently updated first.
pub async fn list_downloads(State(state): State<Arc<AppState>>) -> Json<JobListResponse> {
    let jobs = state.registry().list();
    let count = jobs.len();
    Json(JobListResponse { jobs, count })
}
