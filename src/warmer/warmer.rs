//! Cache Warmer Module
//!
//! Populates the response cache and the LRU store ahead of traffic, in
//! priority order, with bounded concurrency, per-attempt timeouts and
//! fixed-delay retries.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use bytes::Bytes;
use chrono::{Timelike, Utc};
use futures::future::{join_all, BoxFuture};
use serde_json::Value;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::SharedLruStore;
use crate::error::{CacheError, Result};
use crate::response::{
    generate_etag, CacheOutcome, CacheResponseOptions, CachedResponse, ResponseCache,
};
use crate::warmer::patterns::{analytics_routes, expand_patterns, AnalyticsSnapshot, IntelligentWarmup};
use crate::warmer::stats::{RouteOutcome, WarmerCounters, WarmerState, WarmerStats, WarmupReport};
use crate::warmer::{RouteFetcher, RouteRegistry, WarmupRoute};

/// Route cap used by [`CacheWarmer::warm_from_analytics`].
const ANALYTICS_MAX_ROUTES: usize = 50;

// == Config ==
#[derive(Debug, Clone)]
pub struct WarmerConfig {
    /// Routes warmed at once; each batch is awaited before the next starts
    pub max_concurrency: usize,
    /// Limit for a single warm attempt
    pub timeout: Duration,
    /// Total attempts per route, including the first
    pub retry_attempts: u32,
    pub retry_delay: Duration,
    /// Routes below this priority are skipped when low priority is excluded
    pub min_priority: u32,
    /// Default cap on routes per warm cycle
    pub max_routes: usize,
}

impl Default for WarmerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 5,
            timeout: Duration::from_secs(10),
            retry_attempts: 3,
            retry_delay: Duration::from_secs(1),
            min_priority: 30,
            max_routes: 100,
        }
    }
}

/// Selection for [`CacheWarmer::warm_cache`].
#[derive(Debug, Clone, Default)]
pub struct WarmOptions {
    /// Only warm registered routes with these paths
    pub routes: Option<Vec<String>>,
    /// Overrides [`WarmerConfig::max_routes`]
    pub max_routes: Option<usize>,
    /// Skip routes below [`WarmerConfig::min_priority`]
    pub skip_low_priority: bool,
}

// == Precompute ==
pub type ComputeFn = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync>;

/// A value computed out of band and stored in the LRU store.
#[derive(Clone)]
pub struct PrecomputeRoute {
    pub path: String,
    pub method: Method,
    compute: ComputeFn,
    cache_key: Option<String>,
    ttl: Option<Duration>,
}

impl PrecomputeRoute {
    pub fn new<F, Fut>(method: Method, path: impl Into<String>, compute: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        Self {
            path: path.into(),
            method,
            compute: Arc::new(move || Box::pin(compute())),
            cache_key: None,
            ttl: None,
        }
    }

    pub fn cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = Some(key.into());
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Explicit key, or `METHOD:path`.
    pub fn key(&self) -> String {
        self.cache_key
            .clone()
            .unwrap_or_else(|| format!("{}:{}", self.method, self.path))
    }
}

impl std::fmt::Debug for PrecomputeRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrecomputeRoute")
            .field("key", &self.key())
            .field("ttl", &self.ttl)
            .finish()
    }
}

// == Cache Warmer ==
/// Cloneable handle; clones share routes, counters and the periodic task.
#[derive(Clone)]
pub struct CacheWarmer {
    config: Arc<WarmerConfig>,
    registry: Arc<RwLock<RouteRegistry>>,
    fetcher: Arc<dyn RouteFetcher>,
    responses: ResponseCache,
    store: SharedLruStore<String, Value>,
    counters: Arc<RwLock<WarmerCounters>>,
    state: Arc<Mutex<WarmerState>>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl CacheWarmer {
    // == Constructor ==
    /// Creates a warmer filling `responses` through `fetcher` and `store`
    /// through precompute functions.
    pub fn new(
        config: WarmerConfig,
        fetcher: Arc<dyn RouteFetcher>,
        responses: ResponseCache,
        store: SharedLruStore<String, Value>,
    ) -> Result<Self> {
        if config.max_concurrency == 0 {
            return Err(CacheError::Configuration(
                "max_concurrency must be greater than 0".to_string(),
            ));
        }
        if config.timeout.is_zero() {
            return Err(CacheError::Configuration(
                "warmup timeout must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            config: Arc::new(config),
            registry: Arc::new(RwLock::new(RouteRegistry::new())),
            fetcher,
            responses,
            store,
            counters: Arc::new(RwLock::new(WarmerCounters::default())),
            state: Arc::new(Mutex::new(WarmerState::Idle)),
            task: Arc::new(Mutex::new(None)),
        })
    }

    pub fn config(&self) -> &WarmerConfig {
        &self.config
    }

    // == Registration ==
    pub async fn register_route(&self, route: WarmupRoute) {
        debug!(key = %route.cache_key(), priority = route.priority, "Registered warmup route");
        self.registry.write().await.register(route);
    }

    pub async fn register_routes(&self, routes: impl IntoIterator<Item = WarmupRoute>) {
        self.registry.write().await.register_all(routes);
    }

    /// Registered routes in warm order.
    pub async fn routes(&self) -> Vec<WarmupRoute> {
        self.registry.read().await.routes().to_vec()
    }

    // == Warm Cache ==
    /// Warms the selected registered routes and reports the outcome.
    ///
    /// Failures are counted and logged, never returned.
    pub async fn warm_cache(&self, options: WarmOptions) -> WarmupReport {
        let started = Instant::now();
        self.set_state(WarmerState::Selecting);

        let min_priority = options.skip_low_priority.then_some(self.config.min_priority);
        let max_routes = options.max_routes.unwrap_or(self.config.max_routes);
        let selected = self.registry.read().await.select(
            options.routes.as_deref(),
            min_priority,
            max_routes,
        );

        self.set_state(WarmerState::Dispatching);
        let mut report = WarmupReport {
            attempted: selected.len(),
            ..WarmupReport::default()
        };

        for batch in selected.chunks(self.config.max_concurrency) {
            let outcomes = join_all(batch.iter().map(|route| self.warm_with_retry(route))).await;
            report.batches += 1;

            let mut counters = self.counters.write().await;
            for outcome in &outcomes {
                counters.record(outcome);
                if outcome.succeeded {
                    report.succeeded += 1;
                } else {
                    report.failed += 1;
                }
            }
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        {
            let mut counters = self.counters.write().await;
            counters.cycles += 1;
            counters.last_warmup = Some(Utc::now());
        }
        self.set_state(WarmerState::Completed);
        info!(
            attempted = report.attempted,
            succeeded = report.succeeded,
            failed = report.failed,
            duration_ms = report.duration_ms,
            "Cache warm cycle finished"
        );
        self.set_state(WarmerState::Idle);
        report
    }

    /// Registers routes derived from analytics and warms the top 50.
    pub async fn warm_from_analytics(&self, snapshot: &AnalyticsSnapshot) -> WarmupReport {
        self.register_routes(analytics_routes(snapshot, Utc::now()))
            .await;
        self.warm_cache(WarmOptions {
            max_routes: Some(ANALYTICS_MAX_ROUTES),
            ..WarmOptions::default()
        })
        .await
    }

    /// Pattern-driven warmup for the current UTC hour.
    pub async fn intelligent_warmup(&self, patterns: &IntelligentWarmup) -> WarmupReport {
        self.intelligent_warmup_at(patterns, Utc::now().hour()).await
    }

    /// Pattern-driven warmup as if the clock read `hour` (0..24, UTC).
    pub async fn intelligent_warmup_at(
        &self,
        patterns: &IntelligentWarmup,
        hour: u32,
    ) -> WarmupReport {
        self.register_routes(expand_patterns(patterns, hour)).await;
        self.warm_cache(WarmOptions {
            skip_low_priority: true,
            ..WarmOptions::default()
        })
        .await
    }

    async fn warm_with_retry(&self, route: &WarmupRoute) -> RouteOutcome {
        let attempts = self.config.retry_attempts.max(1);
        let started = Instant::now();
        let mut timeouts = 0;

        for attempt in 1..=attempts {
            match tokio::time::timeout(self.config.timeout, self.warm_once(route)).await {
                Ok(Ok(())) => {
                    return RouteOutcome {
                        succeeded: true,
                        attempts: attempt,
                        timeouts,
                        elapsed_ms: started.elapsed().as_secs_f64() * 1000.0,
                    };
                }
                Ok(Err(err)) => {
                    warn!(key = %route.cache_key(), attempt, error = %err, "Warmup attempt failed");
                }
                Err(_) => {
                    timeouts += 1;
                    warn!(
                        key = %route.cache_key(),
                        attempt,
                        error = %CacheError::Timeout(self.config.timeout),
                        "Warmup attempt failed"
                    );
                }
            }

            if attempt < attempts {
                tokio::time::sleep(self.config.retry_delay).await;
            }
        }

        RouteOutcome {
            succeeded: false,
            attempts,
            timeouts,
            elapsed_ms: started.elapsed().as_secs_f64() * 1000.0,
        }
    }

    async fn warm_once(&self, route: &WarmupRoute) -> Result<()> {
        let key = route.cache_key();

        if let Some(payload) = &route.payload {
            let snapshot = self.payload_snapshot(payload)?;
            self.responses.insert(&key, snapshot).await;
            return Ok(());
        }

        let response = self.fetcher.fetch(route).await?;
        if !response.status().is_success() {
            return Err(CacheError::Fetch(format!(
                "{} returned {}",
                key,
                response.status()
            )));
        }

        let options = CacheResponseOptions {
            force_cache: true,
            generate_etag: None,
        };
        let (_, outcome) = self.responses.store_response(&key, response, options).await;
        match outcome {
            CacheOutcome::Stored => Ok(()),
            CacheOutcome::BodyError => Err(CacheError::Codec(format!(
                "{} body failed while caching",
                key
            ))),
            CacheOutcome::TooLarge | CacheOutcome::NotCacheable => Err(CacheError::Fetch(
                format!("{} response was not cached ({:?})", key, outcome),
            )),
        }
    }

    fn payload_snapshot(&self, payload: &Value) -> Result<CachedResponse> {
        let body = Bytes::from(serde_json::to_vec(payload)?);
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );

        let config = self.responses.config();
        let etag = config.generate_etag.then(|| generate_etag(&body));
        if let Some(value) = etag.as_deref().and_then(|t| HeaderValue::from_str(t).ok()) {
            headers.insert(header::ETAG, value);
        }

        Ok(CachedResponse::new(
            StatusCode::OK,
            headers,
            body,
            etag,
            config.compression_threshold,
        ))
    }

    // == Precompute ==
    /// Runs each compute function under the timeout and stores successes in
    /// the LRU store. One failure never aborts the others.
    pub async fn precompute_routes(&self, routes: Vec<PrecomputeRoute>) -> WarmupReport {
        let started = Instant::now();
        let mut report = WarmupReport {
            attempted: routes.len(),
            ..WarmupReport::default()
        };

        for batch in routes.chunks(self.config.max_concurrency) {
            let results = join_all(batch.iter().map(|route| self.precompute_one(route))).await;
            report.batches += 1;

            let mut counters = self.counters.write().await;
            for ok in results {
                if ok {
                    report.succeeded += 1;
                    counters.precomputed += 1;
                } else {
                    report.failed += 1;
                    counters.precompute_failures += 1;
                }
            }
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            attempted = report.attempted,
            succeeded = report.succeeded,
            "Precompute finished"
        );
        report
    }

    async fn precompute_one(&self, route: &PrecomputeRoute) -> bool {
        let key = route.key();
        match tokio::time::timeout(self.config.timeout, (route.compute)()).await {
            Ok(Ok(value)) => {
                self.store.write().await.set(key, value, route.ttl);
                true
            }
            Ok(Err(err)) => {
                warn!(key = %key, error = %err, "Precompute failed");
                false
            }
            Err(_) => {
                warn!(key = %key, error = %CacheError::Timeout(self.config.timeout), "Precompute failed");
                false
            }
        }
    }

    // == Stats ==
    pub async fn stats(&self) -> WarmerStats {
        let registered_routes = self.registry.read().await.len();
        let c = self.counters.read().await;
        WarmerStats {
            state: self.state(),
            registered_routes,
            cycles: c.cycles,
            succeeded: c.succeeded,
            failed: c.failed,
            timeouts: c.timeouts,
            retries: c.retries,
            precomputed: c.precomputed,
            precompute_failures: c.precompute_failures,
            average_duration_ms: c.average_duration_ms,
            last_warmup: c.last_warmup,
        }
    }

    pub fn state(&self) -> WarmerState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: WarmerState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    // == Periodic Warming ==
    /// Warms all registered routes every `interval` until [`stop`](Self::stop).
    ///
    /// Replaces a loop started earlier.
    pub fn start(&self, interval: Duration) {
        let warmer = self.clone();
        let handle = tokio::spawn(async move {
            info!("Cache warmer started with interval of {:?}", interval);
            loop {
                tokio::time::sleep(interval).await;
                warmer.warm_cache(WarmOptions::default()).await;
            }
        });

        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = task.replace(handle) {
            previous.abort();
        }
    }

    /// Stops periodic warming. Returns false when no loop was running.
    pub fn stop(&self) -> bool {
        let previous = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.set_state(WarmerState::Idle);
        match previous {
            Some(handle) => {
                handle.abort();
                info!("Cache warmer stopped");
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(false, |handle| !handle.is_finished())
    }
}
