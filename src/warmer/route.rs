//! Warmup routes and the priority-ordered registry that holds them.

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, Request};

use crate::error::{CacheError, Result};

/// Highest priority a route can carry.
pub const MAX_PRIORITY: u32 = 100;

// == Warmup Route ==
/// A route the warmer should keep populated.
#[derive(Debug, Clone, PartialEq)]
pub struct WarmupRoute {
    pub path: String,
    pub method: Method,
    /// 0..=100, higher warms first
    pub priority: u32,
    /// Observed request frequency, informational
    pub frequency: u64,
    pub query: Option<String>,
    /// Sent with every warm request
    pub headers: HeaderMap,
    /// When set, stored as a JSON 200 response instead of fetching the route
    pub payload: Option<serde_json::Value>,
}

impl WarmupRoute {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method,
            priority: 50,
            frequency: 0,
            query: None,
            headers: HeaderMap::new(),
            payload: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// Sets the priority, capped at [`MAX_PRIORITY`].
    pub fn priority(mut self, priority: u32) -> Self {
        self.priority = priority.min(MAX_PRIORITY);
        self
    }

    pub fn frequency(mut self, frequency: u64) -> Self {
        self.frequency = frequency;
        self
    }

    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Path plus query string.
    pub fn uri(&self) -> String {
        match self.query.as_deref().filter(|q| !q.is_empty()) {
            Some(query) => format!("{}?{}", self.path, query),
            None => self.path.clone(),
        }
    }

    /// Key the warmed response is stored under. Matches
    /// [`response_cache_key`](crate::response::response_cache_key).
    pub fn cache_key(&self) -> String {
        format!("{}:{}", self.method, self.uri())
    }

    /// Builds the request used to fetch this route.
    pub fn to_request(&self) -> Result<Request<Body>> {
        let mut builder = Request::builder()
            .method(self.method.clone())
            .uri(self.uri());
        if let Some(headers) = builder.headers_mut() {
            headers.extend(self.headers.clone());
        }
        builder
            .body(Body::empty())
            .map_err(|e| CacheError::InvalidRequest(format!("{}: {}", self.uri(), e)))
    }
}

// == Route Registry ==
/// Routes kept in priority-descending order; equal priorities keep their
/// registration order.
#[derive(Debug, Clone, Default)]
pub struct RouteRegistry {
    routes: Vec<WarmupRoute>,
}

impl RouteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a route, replacing any route with the same cache key.
    pub fn register(&mut self, route: WarmupRoute) {
        let key = route.cache_key();
        self.routes.retain(|existing| existing.cache_key() != key);
        let at = self
            .routes
            .partition_point(|existing| existing.priority >= route.priority);
        self.routes.insert(at, route);
    }

    pub fn register_all(&mut self, routes: impl IntoIterator<Item = WarmupRoute>) {
        for route in routes {
            self.register(route);
        }
    }

    /// Removes the route stored under `cache_key`.
    pub fn unregister(&mut self, cache_key: &str) -> bool {
        let before = self.routes.len();
        self.routes.retain(|route| route.cache_key() != cache_key);
        self.routes.len() != before
    }

    /// The first `max_routes` routes that pass both filters, still in
    /// priority order.
    pub fn select(
        &self,
        paths: Option<&[String]>,
        min_priority: Option<u32>,
        max_routes: usize,
    ) -> Vec<WarmupRoute> {
        self.routes
            .iter()
            .filter(|route| paths.map_or(true, |paths| paths.contains(&route.path)))
            .filter(|route| min_priority.map_or(true, |min| route.priority >= min))
            .take(max_routes)
            .cloned()
            .collect()
    }

    pub fn routes(&self) -> &[WarmupRoute] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
