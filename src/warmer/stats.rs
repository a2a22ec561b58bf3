//! Warmer lifecycle state and counters.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Where the warmer is within a warm cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarmerState {
    #[default]
    Idle,
    Selecting,
    Dispatching,
    Completed,
}

/// Summary of one `warm_cache` or `precompute_routes` run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WarmupReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub batches: usize,
    pub duration_ms: u64,
}

/// Counters reported by [`CacheWarmer::stats`](crate::warmer::CacheWarmer::stats).
#[derive(Debug, Clone, Default, Serialize)]
pub struct WarmerStats {
    pub state: WarmerState,
    pub registered_routes: usize,
    pub cycles: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Attempts that lost the race against the timeout
    pub timeouts: u64,
    /// Attempts beyond the first
    pub retries: u64,
    pub precomputed: u64,
    pub precompute_failures: u64,
    /// Running mean over successful route warms, in milliseconds
    pub average_duration_ms: f64,
    pub last_warmup: Option<DateTime<Utc>>,
}

/// Result of warming one route, retries included.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RouteOutcome {
    pub succeeded: bool,
    pub attempts: u32,
    pub timeouts: u32,
    pub elapsed_ms: f64,
}

#[derive(Debug, Default)]
pub(crate) struct WarmerCounters {
    pub cycles: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub timeouts: u64,
    pub retries: u64,
    pub precomputed: u64,
    pub precompute_failures: u64,
    pub average_duration_ms: f64,
    pub last_warmup: Option<DateTime<Utc>>,
}

impl WarmerCounters {
    pub fn record(&mut self, outcome: &RouteOutcome) {
        self.timeouts += u64::from(outcome.timeouts);
        self.retries += u64::from(outcome.attempts.saturating_sub(1));
        if outcome.succeeded {
            self.succeeded += 1;
            self.average_duration_ms +=
                (outcome.elapsed_ms - self.average_duration_ms) / self.succeeded as f64;
        } else {
            self.failed += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_outcomes() {
        let mut counters = WarmerCounters::default();
        counters.record(&RouteOutcome {
            succeeded: true,
            attempts: 1,
            timeouts: 0,
            elapsed_ms: 10.0,
        });
        counters.record(&RouteOutcome {
            succeeded: true,
            attempts: 2,
            timeouts: 1,
            elapsed_ms: 30.0,
        });
        counters.record(&RouteOutcome {
            succeeded: false,
            attempts: 3,
            timeouts: 3,
            elapsed_ms: 90.0,
        });

        assert_eq!(counters.succeeded, 2);
        assert_eq!(counters.failed, 1);
        assert_eq!(counters.timeouts, 4);
        assert_eq!(counters.retries, 3);
        assert!((counters.average_duration_ms - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_state_serializes_snake_case() {
        let json = serde_json::to_string(&WarmerState::Dispatching).unwrap();
        assert_eq!(json, "\"dispatching\"");
    }
}
