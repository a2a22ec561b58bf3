//! Derives warmup routes from analytics and declarative patterns.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::warmer::route::{WarmupRoute, MAX_PRIORITY};

/// Boost applied to routes from a time pattern that is currently active.
pub const TIME_PATTERN_BOOST: u32 = 20;

// == Analytics ==
/// A frequently requested route.
#[derive(Debug, Clone)]
pub struct TopRoute {
    pub path: String,
    pub frequency: u64,
}

/// A recently requested route.
#[derive(Debug, Clone)]
pub struct RecentRoute {
    pub path: String,
    pub last_accessed: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct AnalyticsSnapshot {
    pub top_routes: Vec<TopRoute>,
    pub recent_routes: Vec<RecentRoute>,
}

/// Priority for a top route: `min(frequency * 10, 100)`.
pub fn frequency_priority(frequency: u64) -> u32 {
    frequency.saturating_mul(10).min(MAX_PRIORITY as u64) as u32
}

/// Priority for a recent route: `max(50 - age_minutes, 10)`.
pub fn recency_priority(age_minutes: i64) -> u32 {
    (50 - age_minutes.max(0)).max(10) as u32
}

/// Routes for every top and recent entry, as seen at `now`.
///
/// A path that is both top and recent keeps the higher of its two priorities.
pub fn analytics_routes(snapshot: &AnalyticsSnapshot, now: DateTime<Utc>) -> Vec<WarmupRoute> {
    let top = snapshot.top_routes.iter().map(|top| {
        WarmupRoute::get(top.path.clone())
            .priority(frequency_priority(top.frequency))
            .frequency(top.frequency)
    });
    let recent = snapshot.recent_routes.iter().map(|recent| {
        let age = now.signed_duration_since(recent.last_accessed).num_minutes();
        WarmupRoute::get(recent.path.clone()).priority(recency_priority(age))
    });
    merge_routes(top.chain(recent))
}

/// Collapses routes sharing a cache key into the first occurrence, raised to
/// the highest priority and frequency seen for that key.
fn merge_routes(routes: impl IntoIterator<Item = WarmupRoute>) -> Vec<WarmupRoute> {
    let mut merged: Vec<WarmupRoute> = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();

    for route in routes {
        let key = route.cache_key();
        match seen.get(&key) {
            Some(&at) => {
                let kept = &mut merged[at];
                kept.priority = kept.priority.max(route.priority);
                kept.frequency = kept.frequency.max(route.frequency);
            }
            None => {
                seen.insert(key, merged.len());
                merged.push(route);
            }
        }
    }
    merged
}

// == Declarative Patterns ==
/// Routes a group of users is known to hit.
#[derive(Debug, Clone)]
pub struct UserSegment {
    pub name: String,
    pub routes: Vec<String>,
    pub priority: u32,
}

/// Routes that are hot during `[start_hour, end_hour)` UTC. A range with
/// `start_hour > end_hour` wraps past midnight.
#[derive(Debug, Clone)]
pub struct TimePattern {
    pub start_hour: u32,
    pub end_hour: u32,
    pub routes: Vec<String>,
    pub priority: u32,
}

impl TimePattern {
    pub fn is_active(&self, hour: u32) -> bool {
        if self.start_hour <= self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

/// Routes popular in a region; warmed with a `region=` query.
#[derive(Debug, Clone)]
pub struct GeographicPattern {
    pub region: String,
    pub routes: Vec<String>,
    pub priority: u32,
}

#[derive(Debug, Clone, Default)]
pub struct IntelligentWarmup {
    pub user_segments: Vec<UserSegment>,
    pub time_patterns: Vec<TimePattern>,
    pub geographic_patterns: Vec<GeographicPattern>,
}

/// Expands patterns into routes for the given UTC hour.
///
/// Inactive time patterns are left out; active ones get
/// [`TIME_PATTERN_BOOST`]. A route named by several patterns keeps the
/// highest priority.
pub fn expand_patterns(patterns: &IntelligentWarmup, hour: u32) -> Vec<WarmupRoute> {
    let mut expanded: Vec<WarmupRoute> = Vec::new();

    for segment in &patterns.user_segments {
        for path in &segment.routes {
            expanded.push(WarmupRoute::get(path.clone()).priority(segment.priority));
        }
    }

    for pattern in patterns.time_patterns.iter().filter(|p| p.is_active(hour)) {
        for path in &pattern.routes {
            let boosted = pattern.priority.saturating_add(TIME_PATTERN_BOOST);
            expanded.push(WarmupRoute::get(path.clone()).priority(boosted));
        }
    }

    for pattern in &patterns.geographic_patterns {
        for path in &pattern.routes {
            expanded.push(
                WarmupRoute::get(path.clone())
                    .query(format!("region={}", pattern.region))
                    .priority(pattern.priority),
            );
        }
    }

    merge_routes(expanded)
}
