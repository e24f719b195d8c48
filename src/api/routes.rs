//! API Routes
//!
//! Configures the Axum router for the caching proxy.

use axum::{
    routing::{delete, get},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    clear_cache_handler, create_handler, create_related_handler, delete_handler, get_handler,
    health_handler, invalidate_entity_handler, invalidate_record_handler, list_handler,
    patch_handler, related_handler, stats_handler, update_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET|POST /api/:entity` - Cached list / create
/// - `GET|PUT|PATCH|DELETE /api/:entity/:id` - Cached record / writes
/// - `GET|POST /api/:entity/:id/:related` - Nested collection
/// - `DELETE /cache`, `/cache/:entity`, `/cache/:entity/:id` - Manual invalidation
/// - `GET /stats` - Cache diagnostics
/// - `GET /health` - Health check endpoint
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/:entity", get(list_handler).post(create_handler))
        .route(
            "/api/:entity/:id",
            get(get_handler)
                .put(update_handler)
                .patch(patch_handler)
                .delete(delete_handler),
        )
        .route(
            "/api/:entity/:id/:related",
            get(related_handler).post(create_related_handler),
        )
        .route("/cache", delete(clear_cache_handler))
        .route("/cache/:entity", delete(invalidate_entity_handler))
        .route("/cache/:entity/:id", delete(invalidate_record_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
