//! Integration Tests for API Endpoints
//!
//! Tests full request/response cycles through the public router.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use route_cache::{api::create_router, AppState, Config};
use serde_json::Value;
use std::time::Duration;
use tower::ServiceExt;

// == Helper Functions ==

fn create_test_app() -> Router {
    create_router(AppState::from_config(&Config::default()).unwrap())
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

// == Store Endpoint Tests ==

#[tokio::test]
async fn test_set_and_get_value() {
    let app = create_test_app();

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            "/store",
            r#"{"key":"user:1","value":{"name":"Ada"}}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert!(json["message"].as_str().unwrap().contains("user:1"));

    let response = app.oneshot(empty_request("GET", "/store/user:1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["value"]["name"], "Ada");
}

#[tokio::test]
async fn test_value_expires_after_ttl() {
    let app = create_test_app();

    app.clone()
        .oneshot(json_request(
            "PUT",
            "/store",
            r#"{"key":"short","value":1,"ttl":1}"#,
        ))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(1100)).await;

    let response = app.oneshot(empty_request("GET", "/store/short")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_set_rejects_empty_key() {
    let response = create_test_app()
        .oneshot(json_request("PUT", "/store", r#"{"key":"","value":1}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_to_json(response.into_body()).await;
    assert!(json["error"].as_str().unwrap().contains("empty"));
}

#[tokio::test]
async fn test_delete_then_get_not_found() {
    let app = create_test_app();
    app.clone()
        .oneshot(json_request("PUT", "/store", r#"{"key":"gone","value":true}"#))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(empty_request("DELETE", "/store/gone"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(empty_request("GET", "/store/gone")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// == Content + Response Cache Tests ==

#[tokio::test]
async fn test_content_hit_after_miss() {
    let app = create_test_app();

    let first = app
        .clone()
        .oneshot(empty_request("GET", "/content/guide?lang=en"))
        .await
        .unwrap();
    assert_eq!(first.headers()["x-cache"], "MISS");
    let first_body = body_to_json(first.into_body()).await;

    let second = app
        .oneshot(empty_request("GET", "/content/guide?lang=en"))
        .await
        .unwrap();
    assert_eq!(second.headers()["x-cache"], "HIT");
    assert_eq!(body_to_json(second.into_body()).await, first_body);
}

#[tokio::test]
async fn test_conditional_request_returns_304() {
    let app = create_test_app();

    let first = app
        .clone()
        .oneshot(empty_request("GET", "/content/etag"))
        .await
        .unwrap();
    let etag = first.headers()[header::ETAG].clone();

    let conditional = Request::builder()
        .uri("/content/etag")
        .header(header::IF_NONE_MATCH, etag)
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(conditional).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(bytes.is_empty());
}

// == Admin Endpoint Tests ==

#[tokio::test]
async fn test_invalidate_removes_cached_content() {
    let app = create_test_app();
    app.clone()
        .oneshot(empty_request("GET", "/content/news/1"))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/cache/invalidate",
            r#"{"pattern":"/content/news/"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["responses"], 1);
    assert_eq!(json["memo"], 1);

    let again = app
        .oneshot(empty_request("GET", "/content/news/1"))
        .await
        .unwrap();
    assert_eq!(again.headers()["x-cache"], "MISS");
}

#[tokio::test]
async fn test_invalidate_rejects_bad_regex() {
    let response = create_test_app()
        .oneshot(json_request(
            "POST",
            "/cache/invalidate",
            r#"{"pattern":"(","regex":true}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_warmup_then_served_from_cache() {
    let app = create_test_app();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/warmup",
            r#"{"routes":[{"path":"/content/landing","priority":90}]}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["registered"], 1);
    assert_eq!(json["report"]["succeeded"], 1);

    let served = app
        .oneshot(empty_request("GET", "/content/landing"))
        .await
        .unwrap();
    assert_eq!(served.headers()["x-cache"], "HIT");
}

#[tokio::test]
async fn test_stats_reports_every_component() {
    let app = create_test_app();
    app.clone()
        .oneshot(empty_request("GET", "/content/stats-demo"))
        .await
        .unwrap();

    let response = app.oneshot(empty_request("GET", "/stats")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["responses"]["total_responses"], 1);
    assert_eq!(json["memo"]["cache_misses"], 1);
    assert_eq!(json["warmer"]["state"], "idle");
    assert!(json["store"].get("hits").is_some());
}

#[tokio::test]
async fn test_clear_and_prune() {
    let app = create_test_app();
    app.clone()
        .oneshot(json_request("PUT", "/store", r#"{"key":"k","value":1}"#))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(empty_request("POST", "/cache/prune"))
        .await
        .unwrap();
    assert_eq!(body_to_json(response.into_body()).await["total"], 0);

    let response = app
        .clone()
        .oneshot(empty_request("DELETE", "/cache"))
        .await
        .unwrap();
    assert_eq!(body_to_json(response.into_body()).await["store"], 1);

    let response = app.oneshot(empty_request("GET", "/store")).await.unwrap();
    assert_eq!(body_to_json(response.into_body()).await["count"], 0);
}

// == Health Endpoint Tests ==

#[tokio::test]
async fn test_health_endpoint() {
    let response = create_test_app()
        .oneshot(empty_request("GET", "/health"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], "healthy");
    assert!(json.get("timestamp").is_some());
}
