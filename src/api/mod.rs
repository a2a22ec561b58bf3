//! API Module
//!
//! HTTP surface of the caching engine: admin handlers, the response caching
//! middleware and the memoized content routes.
//!
//! # Endpoints
//! - `GET /health`, `GET /stats`
//! - `GET|PUT /store`, `GET|DELETE /store/:key`
//! - `POST /cache/invalidate`, `DELETE /cache`, `POST /cache/prune`
//! - `POST /warmup`
//! - `GET /content/*path`

pub mod content;
pub mod handlers;
pub mod middleware;
pub mod routes;

pub use content::content_routes;
pub use handlers::*;
pub use middleware::{response_cache_middleware, X_CACHE};
pub use routes::create_router;
