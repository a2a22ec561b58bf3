//! Response caching middleware
//!
//! Serves GET and HEAD requests from the [`ResponseCache`], answering
//! matching `If-None-Match` headers with 304 and caching misses.

use axum::extract::{Request, State};
use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::middleware::Next;
use axum::response::Response;

use crate::response::{response_cache_key, CacheResponseOptions, ResponseCache};

/// Header reporting whether a response came from the cache.
pub const X_CACHE: HeaderName = HeaderName::from_static("x-cache");

/// Middleware for `axum::middleware::from_fn_with_state`.
pub async fn response_cache_middleware(
    State(cache): State<ResponseCache>,
    request: Request,
    next: Next,
) -> Response {
    if request.method() != Method::GET && request.method() != Method::HEAD {
        return next.run(request).await;
    }

    let key = response_cache_key(request.method(), request.uri());

    let if_none_match = request
        .headers()
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok());
    if let Some(etag) = if_none_match {
        if let Some(response) = cache.create_conditional_response(&key, etag).await {
            return mark(response, "HIT");
        }
    }

    if let Some(response) = cache.get_streaming_response(&key).await {
        return mark(response, "HIT");
    }

    let response = next.run(request).await;
    let response = cache
        .cache_response(&key, response, CacheResponseOptions::default())
        .await;
    mark(response, "MISS")
}

fn mark(mut response: Response, status: &'static str) -> Response {
    response
        .headers_mut()
        .insert(X_CACHE, HeaderValue::from_static(status));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::ResponseCacheConfig;
    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{middleware, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app(cache: ResponseCache, calls: Arc<AtomicUsize>) -> Router {
        let counted = calls.clone();
        Router::new()
            .route(
                "/data",
                get(move || {
                    let calls = counted.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        "fresh data"
                    }
                }),
            )
            .route(
                "/submit",
                post(move || {
                    let calls = calls.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        "submitted"
                    }
                }),
            )
            .layer(middleware::from_fn_with_state(
                cache,
                response_cache_middleware,
            ))
    }

    fn request(method: Method, uri: &str) -> Request {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let cache = ResponseCache::new(ResponseCacheConfig::default()).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let app = app(cache, calls.clone());

        let first = app.clone().oneshot(request(Method::GET, "/data")).await.unwrap();
        assert_eq!(first.headers()[X_CACHE], "MISS");
        assert!(first.headers().contains_key(header::ETAG));
        assert_eq!(body_string(first).await, "fresh data");

        let second = app.oneshot(request(Method::GET, "/data")).await.unwrap();
        assert_eq!(second.headers()[X_CACHE], "HIT");
        assert_eq!(body_string(second).await, "fresh data");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_matching_etag_returns_304() {
        let cache = ResponseCache::new(ResponseCacheConfig::default()).unwrap();
        let app = app(cache, Arc::new(AtomicUsize::new(0)));

        let first = app.clone().oneshot(request(Method::GET, "/data")).await.unwrap();
        let etag = first.headers()[header::ETAG].clone();

        let mut conditional = request(Method::GET, "/data");
        conditional.headers_mut().insert(header::IF_NONE_MATCH, etag);
        let response = app.oneshot(conditional).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
        assert!(body_string(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_post_bypasses_cache() {
        let cache = ResponseCache::new(ResponseCacheConfig::default()).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let app = app(cache.clone(), calls.clone());

        for _ in 0..2 {
            let response = app.clone().oneshot(request(Method::POST, "/submit")).await.unwrap();
            assert!(!response.headers().contains_key(X_CACHE));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty().await);
    }
}
