//! Memoizer Module
//!
//! Fingerprint-keyed result caching for handlers and functions, built on the
//! LRU store.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard, RwLock};
use tracing::{debug, warn};

use crate::cache::{LruConfig, LruStore};
use crate::error::Result;
use crate::memo::key::{
    default_request_key, fingerprint, stable_args_key, tag_pattern, tag_suffix, user_pattern,
};
use crate::memo::stats::{MemoCounters, MemoStats};
use crate::memo::RequestInfo;

// == Config ==
/// Construction parameters for [`Memoizer`].
#[derive(Debug, Clone)]
pub struct MemoConfig {
    pub max_entries: usize,
    /// TTL for results whose options do not set one
    pub default_ttl: Option<Duration>,
    /// Concurrent misses for one key wait for the first execution
    pub single_flight: bool,
}

impl Default for MemoConfig {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            default_ttl: Some(Duration::from_secs(300)),
            single_flight: true,
        }
    }
}

// == Memoized Result ==
/// A stored result and what it cost to compute.
#[derive(Debug, Clone)]
pub struct MemoizedResult<V> {
    pub value: V,
    pub fingerprint: String,
    pub computed_at: DateTime<Utc>,
    pub execution_time_ms: f64,
    /// Incremented only when the result is served from cache
    pub hit_count: u64,
}

/// Entry summary returned by [`Memoizer::get_popular_results`].
#[derive(Debug, Clone, Serialize)]
pub struct PopularResult {
    pub key: String,
    pub fingerprint: String,
    pub hit_count: u64,
    pub execution_time_ms: f64,
    /// hit_count * execution_time_ms
    pub time_saved_ms: f64,
}

// == Options ==
pub type KeyGenerator<I> = Arc<dyn Fn(&I) -> String + Send + Sync>;
pub type ShouldMemoize<V> = Arc<dyn Fn(&V) -> bool + Send + Sync>;

/// Per-wrapper settings. `I` is the input a key is derived from: a
/// [`RequestInfo`] for handlers, the argument value for functions.
pub struct MemoizeOptions<I, V> {
    pub name: String,
    key_generator: Option<KeyGenerator<I>>,
    should_memoize: Option<ShouldMemoize<V>>,
    ttl: Option<Duration>,
    tags: Vec<String>,
}

impl<I, V> Clone for MemoizeOptions<I, V> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            key_generator: self.key_generator.clone(),
            should_memoize: self.should_memoize.clone(),
            ttl: self.ttl,
            tags: self.tags.clone(),
        }
    }
}

impl<I, V> MemoizeOptions<I, V> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key_generator: None,
            should_memoize: None,
            ttl: None,
            tags: Vec::new(),
        }
    }

    /// Replaces the default key derivation.
    pub fn key_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn(&I) -> String + Send + Sync + 'static,
    {
        self.key_generator = Some(Arc::new(generator));
        self
    }

    /// Only results accepted by `predicate` are stored.
    pub fn should_memoize<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&V) -> bool + Send + Sync + 'static,
    {
        self.should_memoize = Some(Arc::new(predicate));
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Tags a wrapper's entries for [`Memoizer::invalidate_by_tag`].
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    fn resolve_key<D>(&self, input: &I, default: D) -> Result<String>
    where
        D: FnOnce(&str, &I) -> Result<String>,
    {
        let base = match &self.key_generator {
            Some(generator) => generator(input),
            None => default(&self.name, input)?,
        };
        Ok(format!("{}{}", base, tag_suffix(&self.tags)))
    }
}

// == Invalidation Pattern ==
/// Selects keys to drop in [`Memoizer::invalidate`].
#[derive(Debug, Clone)]
pub enum InvalidationPattern {
    /// Key contains the string
    Substring(String),
    /// Key matches the regex
    Regex(Regex),
}

impl InvalidationPattern {
    pub fn matches(&self, key: &str) -> bool {
        match self {
            InvalidationPattern::Substring(needle) => key.contains(needle.as_str()),
            InvalidationPattern::Regex(regex) => regex.is_match(key),
        }
    }
}

impl From<&str> for InvalidationPattern {
    fn from(value: &str) -> Self {
        InvalidationPattern::Substring(value.to_string())
    }
}

impl From<String> for InvalidationPattern {
    fn from(value: String) -> Self {
        InvalidationPattern::Substring(value)
    }
}

impl From<Regex> for InvalidationPattern {
    fn from(value: Regex) -> Self {
        InvalidationPattern::Regex(value)
    }
}

struct Inner<V> {
    store: LruStore<String, MemoizedResult<V>>,
    counters: MemoCounters,
}

type KeyLocks = Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>;

/// Holds a key's single-flight lock and drops the key's map entry once no
/// other caller shares it, including when the owning future is cancelled.
struct InFlight<'a> {
    locks: &'a KeyLocks,
    key: &'a str,
    held: Option<OwnedMutexGuard<()>>,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.held.take();
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks
            .get(self.key)
            .map_or(false, |lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(self.key);
        }
    }
}

// == Memoizer ==
/// Cloneable handle to a shared memoization cache.
pub struct Memoizer<V> {
    inner: Arc<RwLock<Inner<V>>>,
    in_flight: KeyLocks,
    config: Arc<MemoConfig>,
}

impl<V> Clone for Memoizer<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            in_flight: Arc::clone(&self.in_flight),
            config: Arc::clone(&self.config),
        }
    }
}

impl<V> Memoizer<V>
where
    V: Clone + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates an empty memoizer. Fails when the capacity or TTL is invalid.
    pub fn new(config: MemoConfig) -> Result<Self> {
        let store = LruStore::new(LruConfig {
            max_entries: config.max_entries,
            default_ttl: config.default_ttl,
            ..LruConfig::default()
        })?;

        Ok(Self {
            inner: Arc::new(RwLock::new(Inner {
                store,
                counters: MemoCounters::default(),
            })),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            config: Arc::new(config),
        })
    }

    // == Memoize ==
    /// Wraps a request handler.
    pub fn memoize<H>(
        &self,
        handler: H,
        options: MemoizeOptions<RequestInfo, V>,
    ) -> MemoizedHandler<V, H> {
        MemoizedHandler {
            memoizer: self.clone(),
            handler,
            options,
        }
    }

    /// Wraps an argument-keyed function.
    pub fn memoize_function<A, F>(
        &self,
        function: F,
        options: MemoizeOptions<A, V>,
    ) -> MemoizedFunction<V, A, F> {
        MemoizedFunction {
            memoizer: self.clone(),
            function,
            options,
        }
    }

    /// Middleware form: serves `request` from cache or runs `next` once.
    pub async fn execute<F, Fut, E>(
        &self,
        request: &RequestInfo,
        options: &MemoizeOptions<RequestInfo, V>,
        next: F,
    ) -> std::result::Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<V, E>>,
    {
        let key = options
            .resolve_key(request, |name, req| Ok(default_request_key(name, req)))
            .unwrap_or_else(|_| default_request_key(&options.name, request));
        self.run(key, options.ttl, options.should_memoize.as_ref(), next)
            .await
    }

    /// Cache-or-compute under an explicit key.
    ///
    /// Errors from `compute` are returned unchanged and never stored.
    async fn run<F, Fut, E>(
        &self,
        key: String,
        ttl: Option<Duration>,
        should_memoize: Option<&ShouldMemoize<V>>,
        compute: F,
    ) -> std::result::Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<V, E>>,
    {
        if let Some(value) = self.lookup(&key).await {
            return Ok(value);
        }

        let flight = if self.config.single_flight {
            let lock = self.key_lock(&key);
            let mut flight = InFlight {
                locks: &self.in_flight,
                key: &key,
                held: None,
            };
            flight.held = Some(lock.lock_owned().await);
            if let Some(value) = self.lookup(&key).await {
                return Ok(value);
            }
            Some(flight)
        } else {
            None
        };

        self.inner.write().await.counters.misses += 1;

        let started = Instant::now();
        let outcome = compute().await;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        {
            let mut inner = self.inner.write().await;
            match &outcome {
                Ok(value) => {
                    inner.counters.record_execution(elapsed_ms);
                    if should_memoize.map_or(true, |accept| accept(value)) {
                        let result = MemoizedResult {
                            value: value.clone(),
                            fingerprint: fingerprint(&key),
                            computed_at: Utc::now(),
                            execution_time_ms: elapsed_ms,
                            hit_count: 0,
                        };
                        debug!(key = %key, elapsed_ms, "Memoized result");
                        inner.store.set(key.clone(), result, ttl);
                    }
                }
                Err(_) => inner.counters.errors += 1,
            }
        }

        drop(flight);
        outcome
    }

    async fn lookup(&self, key: &str) -> Option<V> {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        let result = inner.store.get_mut(&key.to_string())?;
        result.hit_count += 1;
        let saved = result.execution_time_ms;
        let value = result.value.clone();
        inner.counters.hits += 1;
        inner.counters.total_time_saved_ms += saved;
        Some(value)
    }

    async fn record_bypass(&self) {
        self.inner.write().await.counters.bypassed += 1;
    }

    fn key_lock(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(key.to_string()).or_default())
    }

    // == Invalidate ==
    /// Drops every entry whose key matches; returns how many were removed.
    pub async fn invalidate(&self, pattern: impl Into<InvalidationPattern>) -> usize {
        let pattern = pattern.into();
        let mut inner = self.inner.write().await;
        let doomed: Vec<String> = inner
            .store
            .entries()
            .map(|(key, _)| key)
            .filter(|key| pattern.matches(key))
            .cloned()
            .collect();
        for key in &doomed {
            inner.store.delete(key);
        }
        debug!(removed = doomed.len(), "Invalidated memoized results");
        doomed.len()
    }

    /// Drops results keyed for `user_id` by the default request key.
    pub async fn invalidate_for_user(&self, user_id: &str) -> usize {
        match user_pattern(user_id) {
            Ok(pattern) => self.invalidate(pattern).await,
            Err(err) => {
                warn!(error = %err, "Could not build user invalidation pattern");
                0
            }
        }
    }

    /// Drops results from wrappers tagged with `tag`.
    pub async fn invalidate_by_tag(&self, tag: &str) -> usize {
        match tag_pattern(tag) {
            Ok(pattern) => self.invalidate(pattern).await,
            Err(err) => {
                warn!(error = %err, "Could not build tag invalidation pattern");
                0
            }
        }
    }

    // == Popular Results ==
    /// Top `limit` entries by estimated time saved (hit_count * execution time).
    pub async fn get_popular_results(&self, limit: usize) -> Vec<PopularResult> {
        let inner = self.inner.read().await;
        let mut popular: Vec<PopularResult> = inner
            .store
            .entries()
            .map(|(key, entry)| PopularResult {
                key: key.clone(),
                fingerprint: entry.value.fingerprint.clone(),
                hit_count: entry.value.hit_count,
                execution_time_ms: entry.value.execution_time_ms,
                time_saved_ms: entry.value.hit_count as f64 * entry.value.execution_time_ms,
            })
            .collect();
        popular.sort_by(|a, b| b.time_saved_ms.total_cmp(&a.time_saved_ms));
        popular.truncate(limit);
        popular
    }

    // == Stats ==
    pub async fn stats(&self) -> MemoStats {
        let inner = self.inner.read().await;
        let store_stats = inner.store.stats();
        let c = &inner.counters;
        MemoStats {
            total_calls: c.hits + c.misses,
            cache_hits: c.hits,
            cache_misses: c.misses,
            bypassed: c.bypassed,
            errors: c.errors,
            hit_rate: c.hit_rate(),
            average_execution_ms: c.average_execution_ms,
            total_time_saved_ms: c.total_time_saved_ms,
            entries: store_stats.total_entries,
            evictions: store_stats.evictions,
            approx_memory_bytes: store_stats.approx_memory_bytes,
        }
    }

    /// Drops all results and resets the counters.
    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        inner.store.clear();
        inner.counters = MemoCounters::default();
    }

    /// Drops expired results.
    pub async fn prune(&self) -> usize {
        self.inner.write().await.store.prune()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.store.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.store.is_empty()
    }
}

// == Memoized Handler ==
/// A request handler wrapped by [`Memoizer::memoize`].
pub struct MemoizedHandler<V, H> {
    memoizer: Memoizer<V>,
    handler: H,
    options: MemoizeOptions<RequestInfo, V>,
}

impl<V, H> MemoizedHandler<V, H>
where
    V: Clone + Send + Sync + 'static,
{
    /// Serves the request from cache, or runs the handler exactly once.
    pub async fn call<Fut, E>(&self, request: RequestInfo) -> std::result::Result<V, E>
    where
        H: Fn(RequestInfo) -> Fut,
        Fut: Future<Output = std::result::Result<V, E>>,
    {
        let key = self
            .options
            .resolve_key(&request, |name, req| Ok(default_request_key(name, req)))
            .unwrap_or_else(|_| default_request_key(&self.options.name, &request));
        self.memoizer
            .run(
                key,
                self.options.ttl,
                self.options.should_memoize.as_ref(),
                || (self.handler)(request),
            )
            .await
    }
}

// == Memoized Function ==
/// An argument-keyed function wrapped by [`Memoizer::memoize_function`].
pub struct MemoizedFunction<V, A, F> {
    memoizer: Memoizer<V>,
    function: F,
    options: MemoizeOptions<A, V>,
}

impl<V, A, F> MemoizedFunction<V, A, F>
where
    V: Clone + Send + Sync + 'static,
    A: Serialize,
{
    /// Serves the call from cache, or runs the function exactly once.
    ///
    /// Arguments that fail to serialize run uncached.
    pub async fn call<Fut, E>(&self, args: A) -> std::result::Result<V, E>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = std::result::Result<V, E>>,
    {
        match self.options.resolve_key(&args, |name, a| stable_args_key(name, a)) {
            Ok(key) => {
                self.memoizer
                    .run(
                        key,
                        self.options.ttl,
                        self.options.should_memoize.as_ref(),
                        || (self.function)(args),
                    )
                    .await
            }
            Err(err) => {
                warn!(name = %self.options.name, error = %err, "Running memoized function uncached");
                self.memoizer.record_bypass().await;
                (self.function)(args).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn memoizer() -> Memoizer<String> {
        Memoizer::new(MemoConfig::default()).unwrap()
    }

    fn user_request(path: &str, user: &str) -> RequestInfo {
        RequestInfo::new(Method::GET, path).with_user(user)
    }

    fn counting_handler(
        calls: Arc<AtomicUsize>,
    ) -> impl Fn(RequestInfo) -> futures::future::Ready<std::result::Result<String, Infallible>>
    {
        move |req: RequestInfo| {
            calls.fetch_add(1, Ordering::SeqCst);
            futures::future::ready(Ok(format!("payload for {}", req.path)))
        }
    }

    #[tokio::test]
    async fn test_new_rejects_zero_capacity() {
        let config = MemoConfig {
            max_entries: 0,
            ..MemoConfig::default()
        };
        assert!(Memoizer::<String>::new(config).is_err());
    }

    #[tokio::test]
    async fn test_same_request_runs_handler_once() {
        let memo = memoizer();
        let calls = Arc::new(AtomicUsize::new(0));
        let handler = memo.memoize(counting_handler(calls.clone()), MemoizeOptions::new("users"));

        let first = handler.call(user_request("/users/1", "u1")).await.unwrap();
        let second = handler.call(user_request("/users/1", "u1")).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let stats = memo.stats().await;
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.cache_misses, 1);
        assert_eq!(stats.total_calls, 2);
    }

    #[tokio::test]
    async fn test_different_user_misses() {
        let memo = memoizer();
        let calls = Arc::new(AtomicUsize::new(0));
        let handler = memo.memoize(counting_handler(calls.clone()), MemoizeOptions::new("users"));

        handler.call(user_request("/users/1", "u1")).await.unwrap();
        handler.call(user_request("/users/1", "u2")).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_handler_error_propagates_uncached() {
        let memo = memoizer();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let handler = memo.memoize(
            move |_req: RequestInfo| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err::<String, _>("boom") }
            },
            MemoizeOptions::new("failing"),
        );

        let req = user_request("/x", "u1");
        assert_eq!(handler.call(req.clone()).await, Err("boom"));
        assert_eq!(handler.call(req).await, Err("boom"));

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(memo.is_empty().await);
        assert_eq!(memo.stats().await.errors, 2);
    }

    #[tokio::test]
    async fn test_should_memoize_rejects_value() {
        let memo = memoizer();
        let calls = Arc::new(AtomicUsize::new(0));
        let options = MemoizeOptions::new("picky").should_memoize(|v: &String| !v.contains("/skip"));
        let handler = memo.memoize(counting_handler(calls.clone()), options);

        handler.call(user_request("/skip", "u")).await.unwrap();
        handler.call(user_request("/skip", "u")).await.unwrap();
        handler.call(user_request("/keep", "u")).await.unwrap();
        handler.call(user_request("/keep", "u")).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_custom_key_generator() {
        let memo = memoizer();
        let calls = Arc::new(AtomicUsize::new(0));
        let options = MemoizeOptions::new("by-path").key_generator(|req: &RequestInfo| req.path.clone());
        let handler = memo.memoize(counting_handler(calls.clone()), options);

        handler.call(user_request("/shared", "u1")).await.unwrap();
        handler.call(user_request("/shared", "u2")).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_execute_middleware_form() {
        let memo = memoizer();
        let options = MemoizeOptions::new("mw");
        let req = user_request("/mw", "u1");

        let first = memo
            .execute(&req, &options, || async { Ok::<_, Infallible>("fresh".to_string()) })
            .await
            .unwrap();
        let second = memo
            .execute(&req, &options, || async {
                Ok::<_, Infallible>("never returned".to_string())
            })
            .await
            .unwrap();

        assert_eq!(first, "fresh");
        assert_eq!(second, "fresh");
    }

    #[tokio::test]
    async fn test_memoize_function_by_arguments() {
        let memo: Memoizer<u64> = Memoizer::new(MemoConfig::default()).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let add = memo.memoize_function(
            move |(a, b): (u64, u64)| {
                counter.fetch_add(1, Ordering::SeqCst);
                async move { Ok::<_, Infallible>(a + b) }
            },
            MemoizeOptions::new("add"),
        );

        assert_eq!(add.call((2, 3)).await.unwrap(), 5);
        assert_eq!(add.call((2, 3)).await.unwrap(), 5);
        assert_eq!(add.call((3, 2)).await.unwrap(), 5);

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_single_flight_dedupes_concurrent_misses() {
        let memo = memoizer();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let handler = memo.memoize(
            move |_req: RequestInfo| {
                counter.fetch_add(1, Ordering::SeqCst);
                async {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok::<_, Infallible>("slow".to_string())
                }
            },
            MemoizeOptions::new("slow"),
        );

        let calls_in = (0..5).map(|_| handler.call(user_request("/slow", "u")));
        let results = futures::future::join_all(calls_in).await;

        assert!(results.iter().all(|r| r.as_deref() == Ok("slow")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(memo.stats().await.cache_hits, 4);
    }

    fn in_flight_keys<V>(memo: &Memoizer<V>) -> usize {
        memo.in_flight.lock().unwrap().len()
    }

    #[tokio::test]
    async fn test_cancelled_call_releases_key_lock() {
        let memo = memoizer();
        let handler = memo.memoize(
            |_req: RequestInfo| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, Infallible>("never".to_string())
            },
            MemoizeOptions::new("stuck"),
        );

        let cancelled =
            tokio::time::timeout(Duration::from_millis(20), handler.call(user_request("/stuck", "u")))
                .await;
        assert!(cancelled.is_err());
        assert_eq!(in_flight_keys(&memo), 0);
        assert!(memo.is_empty().await);
    }

    #[tokio::test]
    async fn test_completed_calls_leave_no_key_locks() {
        let memo = memoizer();
        let calls = Arc::new(AtomicUsize::new(0));
        let handler = memo.memoize(counting_handler(calls), MemoizeOptions::new("users"));

        handler.call(user_request("/users/1", "u1")).await.unwrap();
        handler.call(user_request("/users/1", "u1")).await.unwrap();

        assert_eq!(in_flight_keys(&memo), 0);
    }

    #[tokio::test]
    async fn test_without_single_flight_each_miss_executes() {
        let memo: Memoizer<String> = Memoizer::new(MemoConfig {
            single_flight: false,
            ..MemoConfig::default()
        })
        .unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let handler = memo.memoize(
            move |_req: RequestInfo| {
                counter.fetch_add(1, Ordering::SeqCst);
                async {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok::<_, Infallible>("slow".to_string())
                }
            },
            MemoizeOptions::new("slow"),
        );

        let calls_in = (0..3).map(|_| handler.call(user_request("/slow", "u")));
        futures::future::join_all(calls_in).await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_invalidate_exact_matches_only() {
        let memo = memoizer();
        let calls = Arc::new(AtomicUsize::new(0));
        let handler = memo.memoize(counting_handler(calls.clone()), MemoizeOptions::new("h"));
        for path in ["/users/1", "/users/2", "/posts/1"] {
            handler.call(user_request(path, "u1")).await.unwrap();
        }

        assert_eq!(memo.invalidate("/users/").await, 2);
        assert_eq!(memo.len().await, 1);

        let regex = Regex::new(r"/posts/\d+").unwrap();
        assert_eq!(memo.invalidate(regex).await, 1);
        assert!(memo.is_empty().await);
    }

    #[tokio::test]
    async fn test_invalidate_for_user_and_tag() {
        let memo = memoizer();
        let calls = Arc::new(AtomicUsize::new(0));
        let tagged = memo.memoize(
            counting_handler(calls.clone()),
            MemoizeOptions::new("profile").tag("profiles"),
        );
        let plain = memo.memoize(counting_handler(calls.clone()), MemoizeOptions::new("feed"));

        tagged.call(user_request("/me", "1")).await.unwrap();
        tagged.call(user_request("/me", "12")).await.unwrap();
        plain.call(user_request("/feed", "1")).await.unwrap();

        assert_eq!(memo.invalidate_for_user("1").await, 2);
        assert_eq!(memo.len().await, 1);
        assert_eq!(memo.invalidate_by_tag("profiles").await, 1);
        assert!(memo.is_empty().await);
    }

    #[tokio::test]
    async fn test_popular_results_ordering() {
        let memo: Memoizer<u64> = Memoizer::new(MemoConfig::default()).unwrap();
        let slow = memo.memoize_function(
            |ms: u64| async move {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok::<_, Infallible>(ms)
            },
            MemoizeOptions::new("sleep"),
        );

        slow.call(30).await.unwrap();
        slow.call(1).await.unwrap();
        for _ in 0..3 {
            slow.call(30).await.unwrap();
            slow.call(1).await.unwrap();
        }

        let popular = memo.get_popular_results(1).await;
        assert_eq!(popular.len(), 1);
        assert_eq!(popular[0].key, "sleep:30");
        assert_eq!(popular[0].hit_count, 3);
        assert!(memo.stats().await.total_time_saved_ms >= 90.0);
    }

    #[tokio::test]
    async fn test_ttl_expiry_and_clear() {
        let memo = memoizer();
        let calls = Arc::new(AtomicUsize::new(0));
        let handler = memo.memoize(
            counting_handler(calls.clone()),
            MemoizeOptions::new("short").ttl(Duration::from_millis(20)),
        );

        handler.call(user_request("/t", "u")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(memo.prune().await, 1);
        handler.call(user_request("/t", "u")).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        memo.clear().await;
        let stats = memo.stats().await;
        assert_eq!(stats.entries, 0);
        assert_eq!(stats.total_calls, 0);
    }
}
