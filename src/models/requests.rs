//! Request DTOs for the admin API
//!
//! Defines the structure of incoming HTTP request bodies.

use axum::http::Method;
use regex::Regex;
use serde::Deserialize;

use crate::error::{CacheError, Result};
use crate::memo::InvalidationPattern;
use crate::warmer::{WarmOptions, WarmupRoute};

/// Request body for storing a value (PUT /store)
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    /// The cache key
    pub key: String,
    /// Any JSON value
    pub value: serde_json::Value,
    /// Optional TTL in seconds (uses default if not specified)
    #[serde(default)]
    pub ttl: Option<u64>,
}

impl SetRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.key.is_empty() {
            return Some("Key cannot be empty".to_string());
        }
        if self.key.len() > 256 {
            return Some("Key exceeds maximum length of 256 characters".to_string());
        }
        if self.ttl == Some(0) {
            return Some("TTL must be greater than 0".to_string());
        }
        None
    }
}

/// Request body for POST /cache/invalidate
#[derive(Debug, Clone, Deserialize)]
pub struct InvalidateRequest {
    /// Substring, or a regex when `regex` is set
    pub pattern: String,
    #[serde(default)]
    pub regex: bool,
}

impl InvalidateRequest {
    pub fn to_pattern(&self) -> Result<InvalidationPattern> {
        if self.pattern.is_empty() {
            return Err(CacheError::InvalidRequest(
                "Pattern cannot be empty".to_string(),
            ));
        }
        if self.regex {
            Regex::new(&self.pattern)
                .map(InvalidationPattern::Regex)
                .map_err(|e| CacheError::InvalidRequest(e.to_string()))
        } else {
            Ok(InvalidationPattern::Substring(self.pattern.clone()))
        }
    }
}

/// A route to register before warming
#[derive(Debug, Clone, Deserialize)]
pub struct WarmupRouteRequest {
    pub path: String,
    /// Defaults to GET
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub priority: Option<u32>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
}

impl WarmupRouteRequest {
    pub fn into_route(self) -> Result<WarmupRoute> {
        if !self.path.starts_with('/') {
            return Err(CacheError::InvalidRequest(format!(
                "Route path must start with '/': {}",
                self.path
            )));
        }
        let method = match self.method.as_deref() {
            Some(raw) => Method::from_bytes(raw.to_ascii_uppercase().as_bytes())
                .map_err(|e| CacheError::InvalidRequest(e.to_string()))?,
            None => Method::GET,
        };

        let mut route = WarmupRoute::new(method, self.path);
        if let Some(priority) = self.priority {
            route = route.priority(priority);
        }
        if let Some(query) = self.query {
            route = route.query(query);
        }
        if let Some(payload) = self.payload {
            route = route.payload(payload);
        }
        Ok(route)
    }
}

/// Request body for POST /warmup
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WarmupRequest {
    /// Registered before the cycle starts
    #[serde(default)]
    pub routes: Vec<WarmupRouteRequest>,
    /// Restrict the cycle to these paths
    #[serde(default)]
    pub paths: Option<Vec<String>>,
    #[serde(default)]
    pub max_routes: Option<usize>,
    #[serde(default)]
    pub skip_low_priority: bool,
}

impl WarmupRequest {
    pub fn options(&self) -> WarmOptions {
        WarmOptions {
            routes: self.paths.clone(),
            max_routes: self.max_routes,
            skip_low_priority: self.skip_low_priority,
        }
    }
}
