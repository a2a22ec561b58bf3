//! Response Cache Module
//!
//! Stores full response snapshots and replays them as fresh body streams.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::cache::{LruConfig, LruStore};
use crate::error::Result;
use crate::response::{generate_etag, should_cache, CachedResponse};

// == Config ==
/// Construction parameters for [`ResponseCache`].
#[derive(Debug, Clone)]
pub struct ResponseCacheConfig {
    /// Maximum number of cached responses
    pub max_entries: usize,
    /// Lifetime of a cached response, None = until evicted
    pub ttl: Option<Duration>,
    /// Attach a body-hash ETag when the caller does not say otherwise
    pub generate_etag: bool,
    /// Bodies at least this large are stored gzip-compressed (0 disables)
    pub compression_threshold: usize,
    /// Bodies larger than this pass through without being cached
    pub max_body_bytes: usize,
    /// Chunk size used when replaying a cached body as a stream
    pub stream_chunk_size: usize,
}

impl Default for ResponseCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 500,
            ttl: Some(Duration::from_secs(300)),
            generate_etag: true,
            compression_threshold: 1024,
            max_body_bytes: 5 * 1024 * 1024,
            stream_chunk_size: 16 * 1024,
        }
    }
}

/// Per-call overrides for [`ResponseCache::cache_response`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheResponseOptions {
    /// Store even when the policy says the response is not cacheable
    pub force_cache: bool,
    /// Overrides the configured ETag default
    pub generate_etag: Option<bool>,
}

/// What [`ResponseCache::store_response`] did with a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    Stored,
    /// Refused by the caching policy
    NotCacheable,
    /// Body larger than `max_body_bytes`
    TooLarge,
    /// Body stream failed before it ended
    BodyError,
}

impl CacheOutcome {
    pub fn is_stored(self) -> bool {
        self == CacheOutcome::Stored
    }
}

// == Stats ==
/// Counters reported by [`ResponseCache::stats`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResponseCacheStats {
    /// Responses currently cached
    pub total_responses: usize,
    /// Responses stored since startup
    pub stored: u64,
    /// Responses the policy (or size ceiling) refused to store
    pub skipped: u64,
    pub streaming_hits: u64,
    pub streaming_misses: u64,
    /// 304 answers produced from a matching ETag
    pub conditional_hits: u64,
    pub evictions: u64,
    /// Original body bytes across all stored responses
    pub original_bytes: u64,
    /// Bytes actually kept after compression
    pub stored_bytes: u64,
    /// stored_bytes / original_bytes, 1.0 before anything is stored
    pub compression_ratio: f64,
    pub hit_rate: f64,
}

#[derive(Debug, Default)]
struct Counters {
    stored: u64,
    skipped: u64,
    streaming_hits: u64,
    streaming_misses: u64,
    conditional_hits: u64,
    original_bytes: u64,
    stored_bytes: u64,
}

#[derive(Debug)]
struct Inner {
    store: LruStore<String, CachedResponse>,
    counters: Counters,
}

// == Response Cache ==
/// Cloneable handle to a shared response snapshot cache.
#[derive(Clone)]
pub struct ResponseCache {
    inner: Arc<RwLock<Inner>>,
    config: Arc<ResponseCacheConfig>,
}

impl ResponseCache {
    // == Constructor ==
    /// Creates an empty cache. Fails when the capacity or TTL is invalid.
    pub fn new(config: ResponseCacheConfig) -> Result<Self> {
        let store = LruStore::new(LruConfig {
            max_entries: config.max_entries,
            default_ttl: config.ttl,
            ..LruConfig::default()
        })?;

        Ok(Self {
            inner: Arc::new(RwLock::new(Inner {
                store,
                counters: Counters::default(),
            })),
            config: Arc::new(config),
        })
    }

    /// Active configuration.
    pub fn config(&self) -> &ResponseCacheConfig {
        &self.config
    }

    /// Whether a response may be stored under the default policy.
    pub fn should_cache<B>(&self, response: &Response<B>) -> bool {
        should_cache(response.status(), response.headers())
    }

    // == Cache Response ==
    /// Snapshots `response` under `key` and returns a response for the client.
    ///
    /// The returned response always carries the full original body. When the
    /// policy refuses the response, the body exceeds `max_body_bytes`, or the
    /// body stream fails midway, nothing is stored and the bytes read so far
    /// are replayed ahead of the untouched remainder.
    pub async fn cache_response(
        &self,
        key: &str,
        response: Response,
        options: CacheResponseOptions,
    ) -> Response {
        self.store_response(key, response, options).await.0
    }

    /// Same as [`cache_response`](Self::cache_response), also reporting
    /// whether a snapshot was stored.
    pub async fn store_response(
        &self,
        key: &str,
        response: Response,
        options: CacheResponseOptions,
    ) -> (Response, CacheOutcome) {
        if !options.force_cache && !self.should_cache(&response) {
            self.inner.write().await.counters.skipped += 1;
            debug!(key, status = %response.status(), "Response not cacheable");
            return (response, CacheOutcome::NotCacheable);
        }

        let (mut parts, body) = response.into_parts();
        let limit = self.config.max_body_bytes;

        let declared = parts
            .headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        if declared.map_or(false, |len| len > limit) {
            self.inner.write().await.counters.skipped += 1;
            debug!(key, "Declared body exceeds cacheable size");
            return (Response::from_parts(parts, body), CacheOutcome::TooLarge);
        }

        let mut data = body.into_data_stream();
        let mut chunks: Vec<Bytes> = Vec::new();
        let mut total = 0usize;

        while let Some(next) = data.next().await {
            match next {
                Ok(chunk) => {
                    total += chunk.len();
                    chunks.push(chunk);
                    if total > limit {
                        self.inner.write().await.counters.skipped += 1;
                        debug!(key, total, "Body exceeds cacheable size, passing through");
                        let replay = stream::iter(chunks.into_iter().map(Ok)).chain(data);
                        let passed = Response::from_parts(parts, Body::from_stream(replay));
                        return (passed, CacheOutcome::TooLarge);
                    }
                }
                Err(err) => {
                    warn!(key, error = %err, "Failed to read response body, skipping cache");
                    let replay = stream::iter(
                        chunks
                            .into_iter()
                            .map(Ok)
                            .chain(std::iter::once(Err(err))),
                    );
                    let passed = Response::from_parts(parts, Body::from_stream(replay));
                    return (passed, CacheOutcome::BodyError);
                }
            }
        }

        let body = match chunks.len() {
            1 => chunks.remove(0),
            _ => Bytes::from(chunks.concat()),
        };

        let want_etag = options.generate_etag.unwrap_or(self.config.generate_etag);
        let etag = if want_etag {
            let tag = generate_etag(&body);
            if let Ok(value) = HeaderValue::from_str(&tag) {
                parts.headers.insert(header::ETAG, value);
            }
            Some(tag)
        } else {
            parts
                .headers
                .get(header::ETAG)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        let snapshot = CachedResponse::new(
            parts.status,
            parts.headers.clone(),
            body.clone(),
            etag,
            self.config.compression_threshold,
        );
        self.insert(key, snapshot).await;

        (Response::from_parts(parts, Body::from(body)), CacheOutcome::Stored)
    }

    /// Stores a prepared snapshot, replacing any previous one under `key`.
    pub async fn insert(&self, key: &str, snapshot: CachedResponse) {
        let mut inner = self.inner.write().await;
        inner.counters.stored += 1;
        inner.counters.original_bytes += snapshot.size_bytes as u64;
        inner.counters.stored_bytes += snapshot.stored_bytes() as u64;
        debug!(
            key,
            size = snapshot.size_bytes,
            compressed = snapshot.compressed,
            "Cached response"
        );
        inner.store.set(key.to_string(), snapshot, None);
    }

    /// Snapshot stored under `key`, without affecting hit counters.
    pub async fn get(&self, key: &str) -> Option<CachedResponse> {
        self.inner.read().await.store.peek(&key.to_string()).cloned()
    }

    // == Get Streaming Response ==
    /// Rebuilds the cached response with its body replayed as a fresh stream.
    ///
    /// Every call yields an independent stream; reading one never consumes the
    /// stored snapshot.
    pub async fn get_streaming_response(&self, key: &str) -> Option<Response> {
        let snapshot = {
            let mut inner = self.inner.write().await;
            match inner.store.get(&key.to_string()) {
                Some(snapshot) => {
                    inner.counters.streaming_hits += 1;
                    snapshot
                }
                None => {
                    inner.counters.streaming_misses += 1;
                    return None;
                }
            }
        };

        let body = match snapshot.body_bytes() {
            Ok(body) => body,
            Err(err) => {
                warn!(key, error = %err, "Dropping unreadable cached response");
                let mut inner = self.inner.write().await;
                inner.store.delete(&key.to_string());
                inner.counters.streaming_hits -= 1;
                inner.counters.streaming_misses += 1;
                return None;
            }
        };

        let chunk_size = self.config.stream_chunk_size.max(1);
        let chunks: Vec<std::result::Result<Bytes, std::io::Error>> = (0..body.len())
            .step_by(chunk_size)
            .map(|start| Ok(body.slice(start..(start + chunk_size).min(body.len()))))
            .collect();

        let mut response = Response::new(Body::from_stream(stream::iter(chunks)));
        *response.status_mut() = snapshot.status;
        *response.headers_mut() = snapshot.headers;
        Some(response)
    }

    // == Conditional Response ==
    /// Answers a conditional request.
    ///
    /// Returns a bodyless 304 when `if_none_match` equals the stored ETag for
    /// `key`; returns None on any mismatch or when nothing is cached.
    pub async fn create_conditional_response(
        &self,
        key: &str,
        if_none_match: &str,
    ) -> Option<Response> {
        let mut inner = self.inner.write().await;
        let etag = inner.store.peek(&key.to_string())?.etag.clone()?;
        if etag != if_none_match.trim() {
            return None;
        }
        let headers = inner
            .store
            .get(&key.to_string())
            .map(|snapshot| not_modified_headers(&snapshot.headers))
            .unwrap_or_default();
        inner.counters.conditional_hits += 1;
        drop(inner);

        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NOT_MODIFIED;
        *response.headers_mut() = headers;
        Some(response)
    }

    /// Removes one cached response.
    pub async fn delete(&self, key: &str) -> bool {
        self.inner.write().await.store.delete(&key.to_string())
    }

    /// Removes every cached response whose key starts with `prefix`.
    pub async fn invalidate_prefix(&self, prefix: &str) -> usize {
        self.invalidate_where(|key| key.starts_with(prefix)).await
    }

    /// Removes every cached response whose key satisfies `matches`.
    pub async fn invalidate_where<F>(&self, matches: F) -> usize
    where
        F: Fn(&str) -> bool,
    {
        let mut inner = self.inner.write().await;
        let doomed: Vec<String> = inner
            .store
            .keys()
            .into_iter()
            .filter(|key| matches(key))
            .collect();
        for key in &doomed {
            inner.store.delete(key);
        }
        doomed.len()
    }

    /// Drops every cached response.
    pub async fn clear(&self) {
        self.inner.write().await.store.clear();
    }

    /// Drops expired responses and returns how many were removed.
    pub async fn prune(&self) -> usize {
        self.inner.write().await.store.prune()
    }

    /// Number of cached responses.
    pub async fn len(&self) -> usize {
        self.inner.read().await.store.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.store.is_empty()
    }

    // == Stats ==
    /// Returns current response cache statistics.
    pub async fn stats(&self) -> ResponseCacheStats {
        let inner = self.inner.read().await;
        let store_stats = inner.store.stats();
        let c = &inner.counters;
        let lookups = c.streaming_hits + c.streaming_misses;

        ResponseCacheStats {
            total_responses: store_stats.total_entries,
            stored: c.stored,
            skipped: c.skipped,
            streaming_hits: c.streaming_hits,
            streaming_misses: c.streaming_misses,
            conditional_hits: c.conditional_hits,
            evictions: store_stats.evictions,
            original_bytes: c.original_bytes,
            stored_bytes: c.stored_bytes,
            compression_ratio: if c.original_bytes == 0 {
                1.0
            } else {
                c.stored_bytes as f64 / c.original_bytes as f64
            },
            hit_rate: if lookups == 0 {
                0.0
            } else {
                c.streaming_hits as f64 / lookups as f64
            },
        }
    }
}

/// Validator and caching headers a 304 repeats from the stored response.
fn not_modified_headers(stored: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for name in [
        header::ETAG,
        header::CACHE_CONTROL,
        header::VARY,
        header::EXPIRES,
        header::CONTENT_LOCATION,
    ] {
        if let Some(value) = stored.get(&name) {
            headers.insert(name, value.clone());
        }
    }
    headers
}
