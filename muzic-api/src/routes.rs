//! API route configuration.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers;
use crate::state::AppState;

/// Largest accepted request body (search queries only).
const MAX_BODY_BYTES: usize = 16 * 1024;

/// Creates the API router with all routes configured.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/api/status", get(handlers::status))

        // Resolution + relay
        .route("/api/music/:id", get(handlers::resolve_music))
        .route("/api/stream/:id", get(handlers::stream_music))

        // Search
        .route("/api/search", post(handlers::search))

        // Diagnostics
        .route("/api/cache/stats", get(handlers::cache_stats))

        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}
