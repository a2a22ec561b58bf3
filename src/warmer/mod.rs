//! Warmer Module
//!
//! Proactive, best-effort population of the response cache and LRU store.

mod fetcher;
mod patterns;
mod route;
mod stats;
#[allow(clippy::module_inception)]
mod warmer;

pub use fetcher::{RouteFetcher, RouterFetcher};
pub use patterns::{
    analytics_routes, expand_patterns, frequency_priority, recency_priority, AnalyticsSnapshot,
    GeographicPattern, IntelligentWarmup, RecentRoute, TimePattern, TopRoute, UserSegment,
    TIME_PATTERN_BOOST,
};
pub use route::{RouteRegistry, WarmupRoute, MAX_PRIORITY};
pub use stats::{WarmerState, WarmerStats, WarmupReport};
pub use warmer::{CacheWarmer, ComputeFn, PrecomputeRoute, WarmOptions, WarmerConfig};
