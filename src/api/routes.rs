//! API Routes
//!
//! Configures the Axum router with the admin endpoints and the cached
//! content surface.

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::content::content_routes;
use super::handlers::{
    clear_handler, delete_handler, get_handler, health_handler, invalidate_handler,
    keys_handler, prune_handler, set_handler, stats_handler, warmup_handler, AppState,
};
use super::middleware::response_cache_middleware;

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /health` - Health check
/// - `GET /stats` - Statistics for every component
/// - `GET /store`, `PUT /store` - List keys, store a value
/// - `GET /store/:key`, `DELETE /store/:key` - Read or delete a value
/// - `POST /cache/invalidate` - Drop matching keys everywhere
/// - `DELETE /cache` - Clear every cache
/// - `POST /cache/prune` - Drop expired entries
/// - `POST /warmup` - Register routes and run a warm cycle
/// - `GET /content/*path` - Memoized documents behind the response cache
///
/// # Middleware
/// - CORS: Allows any origin (configurable for production)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let content = content_routes(state.memo.clone()).layer(middleware::from_fn_with_state(
        state.responses.clone(),
        response_cache_middleware,
    ));

    Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .route("/store", get(keys_handler).put(set_handler))
        .route("/store/:key", get(get_handler).delete(delete_handler))
        .route("/cache", delete(clear_handler))
        .route("/cache/invalidate", post(invalidate_handler))
        .route("/cache/prune", post(prune_handler))
        .route("/warmup", post(warmup_handler))
        .with_state(state)
        .merge(content)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
