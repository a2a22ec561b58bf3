//! Response DTOs for the admin API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::CacheStats;
use crate::memo::MemoStats;
use crate::response::ResponseCacheStats;
use crate::warmer::{WarmerStats, WarmupReport};

/// Response body for GET /store/:key
#[derive(Debug, Clone, Serialize)]
pub struct GetResponse {
    /// The requested key
    pub key: String,
    /// The stored value
    pub value: serde_json::Value,
}

impl GetResponse {
    pub fn new(key: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Response body for a successful write or delete
#[derive(Debug, Clone, Serialize)]
pub struct KeyResponse {
    /// Success message
    pub message: String,
    /// The key that was affected
    pub key: String,
}

impl KeyResponse {
    pub fn set(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' set successfully", key),
            key,
        }
    }

    pub fn deleted(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' deleted successfully", key),
            key,
        }
    }
}

/// Response body for GET /store
#[derive(Debug, Clone, Serialize)]
pub struct KeysResponse {
    /// Live keys, most recently used first
    pub keys: Vec<String>,
    pub count: usize,
}

impl KeysResponse {
    pub fn new(keys: Vec<String>) -> Self {
        Self {
            count: keys.len(),
            keys,
        }
    }
}

/// Response body for GET /stats, one section per component
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub store: CacheStats,
    pub responses: ResponseCacheStats,
    pub memo: MemoStats,
    pub warmer: WarmerStats,
}

/// Per-component counts of removed entries
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct RemovedResponse {
    pub store: usize,
    pub responses: usize,
    pub memo: usize,
    pub total: usize,
}

impl RemovedResponse {
    pub fn new(store: usize, responses: usize, memo: usize) -> Self {
        Self {
            store,
            responses,
            memo,
            total: store + responses + memo,
        }
    }
}

/// Response body for POST /warmup
#[derive(Debug, Clone, Serialize)]
pub struct WarmupResponse {
    /// Routes registered by this request
    pub registered: usize,
    pub report: WarmupReport,
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_response_serialize() {
        let resp = GetResponse::new("test_key", serde_json::json!("test_value"));
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("test_key"));
        assert!(json.contains("test_value"));
    }

    #[test]
    fn test_key_response_messages() {
        assert!(KeyResponse::set("my_key").message.contains("set successfully"));
        assert!(KeyResponse::deleted("old").message.contains("deleted"));
    }

    #[test]
    fn test_removed_response_total() {
        let resp = RemovedResponse::new(1, 2, 3);
        assert_eq!(resp.total, 6);
    }

    #[test]
    fn test_keys_response_count() {
        let resp = KeysResponse::new(vec!["a".into(), "b".into()]);
        assert_eq!(resp.count, 2);
    }

    #[test]
    fn test_health_response_serialize() {
        let resp = HealthResponse::healthy();
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("timestamp"));
    }
}
