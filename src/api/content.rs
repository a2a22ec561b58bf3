//! Content Routes
//!
//! The origin surface served by the binary. Every document is produced by a
//! memoized handler, so repeat requests skip rendering even when the
//! response cache misses.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{json, Value};

use crate::error::{CacheError, Result};
use crate::memo::{MemoizeOptions, Memoizer, RequestInfo};

#[derive(Clone)]
struct ContentState {
    memo: Memoizer<Value>,
    options: Arc<MemoizeOptions<RequestInfo, Value>>,
}

/// Routes under `/content`, without the response cache layer.
pub fn content_routes(memo: Memoizer<Value>) -> Router {
    let state = ContentState {
        memo,
        options: Arc::new(MemoizeOptions::new("content").tag("content")),
    };

    Router::new()
        .route("/content/*path", get(content_handler))
        .with_state(state)
}

/// Handler for GET /content/*path
async fn content_handler(
    State(state): State<ContentState>,
    request: Request,
) -> Result<Json<Value>> {
    let info = RequestInfo::from_request(&request);
    let target = info.clone();

    state
        .memo
        .execute(&info, &state.options, move || async move {
            Ok::<_, CacheError>(render_document(&target))
        })
        .await
        .map(Json)
}

fn render_document(info: &RequestInfo) -> Value {
    json!({
        "path": info.path,
        "query": info.query,
        "rendered_at": Utc::now().to_rfc3339(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memo::MemoConfig;
    use axum::body::Body;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    async fn fetch(router: Router, uri: &str) -> Value {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_repeat_request_is_memoized() {
        let memo = Memoizer::new(MemoConfig::default()).unwrap();
        let router = content_routes(memo.clone());

        let first = fetch(router.clone(), "/content/docs/intro").await;
        let second = fetch(router, "/content/docs/intro").await;

        assert_eq!(first["path"], "/content/docs/intro");
        assert_eq!(first["rendered_at"], second["rendered_at"]);
        assert_eq!(memo.stats().await.cache_hits, 1);
        assert_eq!(memo.invalidate_by_tag("content").await, 1);
    }
}
