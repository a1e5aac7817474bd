//! Metadata lookup API handler.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};

use chaptergrab_core::{InfoRequest, MediaInfo, MetadataError};

use super::{api_error, ApiError};
use crate::state::AppState;

/// POST /api/v1/info
///
/// Title, duration, thumbnail, size estimate and chapters for a URL.
pub async fn get_info(
    State(state): State<Arc<AppState>>,
    Json(body): Json<InfoRequest>,
) -> Result<Json<MediaInfo>, ApiError> {
    state
        .metadata()
        .lookup(&body.url, body.quality_selector.as_deref())
        .await
        .map(Json)
        .map_err(|e| {
            let status = match &e {
                MetadataError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                MetadataError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                MetadataError::LookupFailed { .. } | MetadataError::ParseError { .. } => {
                    StatusCode::BAD_GATEWAY
                }
                MetadataError::EngineNotFound { .. } | MetadataError::Io(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            };
            api_error(status, e.to_string())
        })
}
