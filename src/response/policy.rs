//! Cacheability policy and key derivation for responses.

use axum::http::{header, HeaderMap, Method, StatusCode, Uri};

/// Decides whether a response may be stored.
///
/// Only 2xx and 3xx statuses are cacheable, and a `Cache-Control` header
/// carrying `no-cache` or `no-store` vetoes storage.
pub fn should_cache(status: StatusCode, headers: &HeaderMap) -> bool {
    if !(status.is_success() || status.is_redirection()) {
        return false;
    }

    !headers
        .get_all(header::CACHE_CONTROL)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(|directive| directive.trim().to_ascii_lowercase())
        .any(|directive| directive == "no-cache" || directive == "no-store")
}

/// Key under which a response for `method uri` is cached: `METHOD:path?query`.
pub fn response_cache_key(method: &Method, uri: &Uri) -> String {
    let path_and_query = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());
    format!("{}:{}", method, path_and_query)
}
