//! API Handlers
//!
//! HTTP request handlers for the admin endpoints.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;
use tracing::info;

use crate::api::content::content_routes;
use crate::cache::{LruStore, SharedLruStore};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::memo::Memoizer;
use crate::models::{
    GetResponse, HealthResponse, InvalidateRequest, KeyResponse, KeysResponse, RemovedResponse,
    SetRequest, StatsResponse, WarmupRequest, WarmupResponse,
};
use crate::response::ResponseCache;
use crate::tasks::Prune;
use crate::warmer::{CacheWarmer, RouterFetcher, WarmupRoute};

/// Application state shared across all handlers.
///
/// Every component is a cheap, cloneable handle onto shared storage.
#[derive(Clone)]
pub struct AppState {
    /// Key-value store, also the target of precomputed values
    pub store: SharedLruStore<String, Value>,
    pub responses: ResponseCache,
    pub memo: Memoizer<Value>,
    pub warmer: CacheWarmer,
}

impl AppState {
    /// Builds every component from configuration.
    ///
    /// The warmer fetches through the content routes directly, so warming
    /// renders documents without passing through the response cache layer.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let store = LruStore::new(config.lru_config())?.shared();
        let responses = ResponseCache::new(config.response_cache_config())?;
        let memo = Memoizer::new(config.memo_config())?;
        let fetcher = Arc::new(RouterFetcher::new(content_routes(memo.clone())));
        let warmer = CacheWarmer::new(
            config.warmer_config(),
            fetcher,
            responses.clone(),
            store.clone(),
        )?;

        Ok(Self {
            store,
            responses,
            memo,
            warmer,
        })
    }

    /// Caches visited by the background prune task.
    pub fn prune_targets(&self) -> Vec<Arc<dyn Prune>> {
        vec![
            Arc::new(self.store.clone()),
            Arc::new(self.responses.clone()),
            Arc::new(self.memo.clone()),
        ]
    }
}

/// Handler for PUT /store
///
/// Stores a JSON value with optional TTL in seconds.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<KeyResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let ttl = req.ttl.map(Duration::from_secs);
    state.store.write().await.set(req.key.clone(), req.value, ttl);

    Ok(Json(KeyResponse::set(req.key)))
}

/// Handler for GET /store/:key
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    // Write lock: a hit promotes the entry
    let value = state
        .store
        .write()
        .await
        .get(&key)
        .ok_or_else(|| CacheError::NotFound(format!("Key '{}' not found", key)))?;

    Ok(Json(GetResponse::new(key, value)))
}

/// Handler for DELETE /store/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<KeyResponse>> {
    if !state.store.write().await.delete(&key) {
        return Err(CacheError::NotFound(format!("Key '{}' not found", key)));
    }

    Ok(Json(KeyResponse::deleted(key)))
}

/// Handler for GET /store
pub async fn keys_handler(State(state): State<AppState>) -> Json<KeysResponse> {
    Json(KeysResponse::new(state.store.read().await.keys()))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let store = state.store.read().await.stats();

    Json(StatsResponse {
        store,
        responses: state.responses.stats().await,
        memo: state.memo.stats().await,
        warmer: state.warmer.stats().await,
    })
}

/// Handler for POST /cache/invalidate
///
/// Removes matching keys from every component.
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Json(req): Json<InvalidateRequest>,
) -> Result<Json<RemovedResponse>> {
    let pattern = req.to_pattern()?;

    let store = {
        let mut store = state.store.write().await;
        let doomed: Vec<String> = store
            .keys()
            .into_iter()
            .filter(|key| pattern.matches(key))
            .collect();
        for key in &doomed {
            store.delete(key);
        }
        doomed.len()
    };
    let responses = state
        .responses
        .invalidate_where(|key| pattern.matches(key))
        .await;
    let memo = state.memo.invalidate(pattern.clone()).await;

    let removed = RemovedResponse::new(store, responses, memo);
    info!(pattern = %req.pattern, total = removed.total, "Invalidated cache entries");
    Ok(Json(removed))
}

/// Handler for DELETE /cache
pub async fn clear_handler(State(state): State<AppState>) -> Json<RemovedResponse> {
    let store = {
        let mut store = state.store.write().await;
        let count = store.len();
        store.clear();
        count
    };
    let responses = state.responses.len().await;
    state.responses.clear().await;
    let memo = state.memo.len().await;
    state.memo.clear().await;

    info!("Cleared all caches");
    Json(RemovedResponse::new(store, responses, memo))
}

/// Handler for POST /cache/prune
pub async fn prune_handler(State(state): State<AppState>) -> Json<RemovedResponse> {
    let store = state.store.write().await.prune();
    let responses = state.responses.prune().await;
    let memo = state.memo.prune().await;

    Json(RemovedResponse::new(store, responses, memo))
}

/// Handler for POST /warmup
///
/// Registers any routes in the body, then runs one warm cycle.
pub async fn warmup_handler(
    State(state): State<AppState>,
    Json(req): Json<WarmupRequest>,
) -> Result<Json<WarmupResponse>> {
    let options = req.options();
    let routes = req
        .routes
        .into_iter()
        .map(|route| route.into_route())
        .collect::<Result<Vec<WarmupRoute>>>()?;
    let registered = routes.len();

    state.warmer.register_routes(routes).await;
    let report = state.warmer.warm_cache(options).await;

    Ok(Json(WarmupResponse { registered, report }))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WarmupRouteRequest;

    fn state() -> AppState {
        AppState::from_config(&Config::default()).unwrap()
    }

    fn set_request(key: &str, value: Value) -> SetRequest {
        SetRequest {
            key: key.to_string(),
            value,
            ttl: None,
        }
    }

    #[tokio::test]
    async fn test_set_and_get_handler() {
        let state = state();

        let result = set_handler(
            State(state.clone()),
            Json(set_request("test_key", Value::from("test_value"))),
        )
        .await;
        assert!(result.is_ok());

        let response = get_handler(State(state.clone()), Path("test_key".to_string()))
            .await
            .unwrap();
        assert_eq!(response.value, "test_value");
    }

    #[tokio::test]
    async fn test_get_nonexistent_key() {
        let result = get_handler(State(state()), Path("nonexistent".to_string())).await;
        assert!(matches!(result, Err(CacheError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_handler() {
        let state = state();
        set_handler(State(state.clone()), Json(set_request("to_delete", Value::Null)))
            .await
            .unwrap();

        assert!(delete_handler(State(state.clone()), Path("to_delete".to_string()))
            .await
            .is_ok());
        assert!(delete_handler(State(state), Path("to_delete".to_string()))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_set_invalid_request() {
        let result = set_handler(State(state()), Json(set_request("", Value::Null))).await;
        assert!(matches!(result, Err(CacheError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_invalidate_spans_components() {
        let state = state();
        set_handler(State(state.clone()), Json(set_request("GET:/users/1", Value::Null)))
            .await
            .unwrap();
        set_handler(State(state.clone()), Json(set_request("GET:/posts/1", Value::Null)))
            .await
            .unwrap();

        let removed = invalidate_handler(
            State(state.clone()),
            Json(InvalidateRequest {
                pattern: "/users/".to_string(),
                regex: false,
            }),
        )
        .await
        .unwrap();

        assert_eq!(removed.store, 1);
        assert_eq!(removed.total, 1);
        assert_eq!(keys_handler(State(state)).await.count, 1);
    }

    #[tokio::test]
    async fn test_clear_handler_counts_entries() {
        let state = state();
        set_handler(State(state.clone()), Json(set_request("a", Value::Null)))
            .await
            .unwrap();

        let removed = clear_handler(State(state.clone())).await;
        assert_eq!(removed.store, 1);
        assert_eq!(keys_handler(State(state)).await.count, 0);
    }

    #[tokio::test]
    async fn test_warmup_handler_fills_response_cache() {
        let state = state();
        let req = WarmupRequest {
            routes: vec![WarmupRouteRequest {
                path: "/content/home".to_string(),
                method: None,
                priority: Some(90),
                query: None,
                payload: None,
            }],
            ..WarmupRequest::default()
        };

        let response = warmup_handler(State(state.clone()), Json(req)).await.unwrap();

        assert_eq!(response.registered, 1);
        assert_eq!(response.report.succeeded, 1);
        assert!(state.responses.get("GET:/content/home").await.is_some());
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await;
        assert_eq!(response.status, "healthy");
    }
}
