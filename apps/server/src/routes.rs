//! API routes.

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tldw_core::upload::MAX_SUBTITLE_BYTES;
use tower_http::trace::TraceLayer;

use crate::{
    handlers::{
        delete_subtitles, health, list_backends, list_history, summarize, upload_subtitles,
    },
    state::AppState,
};

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/summarize", post(summarize))
        // Oversized bodies are rejected before they reach the upload store.
        .route(
            "/subtitles",
            post(upload_subtitles)
                .layer(DefaultBodyLimit::max(MAX_SUBTITLE_BYTES))
                .delete(delete_subtitles),
        )
        .route("/history", get(list_history))
        .route("/backends", get(list_backends));

    Router::new()
        .route("/health", get(health))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
