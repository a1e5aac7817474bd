use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{downloads, handlers, info, middleware::metrics_middleware, progress};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Jobs
        .route(
            "/downloads",
            post(downloads::start_download).get(downloads::list_downloads),
        )
        .route("/downloads/pause", post(downloads::pause_download))
        .route("/downloads/status", get(downloads::get_status))
        .route("/downloads/progress", get(progress::progress_stream))
        // Metadata lookup
        .route("/info", post(info::get_info))
        .route_layer(middleware::from_fn(metrics_middleware));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        // The UI is served from a different origin.
        .layer(CorsLayer::permissive())
}
