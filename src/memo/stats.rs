//! Memoization statistics.

use serde::Serialize;

/// Aggregate counters reported by [`Memoizer::stats`](crate::memo::Memoizer::stats).
#[derive(Debug, Clone, Default, Serialize)]
pub struct MemoStats {
    /// Calls that went through the cache (hits + misses)
    pub total_calls: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    /// Calls whose key could not be derived and ran uncached
    pub bypassed: u64,
    /// Wrapped executions that returned an error
    pub errors: u64,
    pub hit_rate: f64,
    /// Running mean over successful executions, in milliseconds
    pub average_execution_ms: f64,
    /// Sum of the recorded execution time of every hit, in milliseconds
    pub total_time_saved_ms: f64,
    pub entries: usize,
    pub evictions: u64,
    pub approx_memory_bytes: usize,
}

/// Mutable counters behind [`MemoStats`].
#[derive(Debug, Default)]
pub(crate) struct MemoCounters {
    pub hits: u64,
    pub misses: u64,
    pub bypassed: u64,
    pub errors: u64,
    pub executions: u64,
    pub average_execution_ms: f64,
    pub total_time_saved_ms: f64,
}

impl MemoCounters {
    /// Folds one execution time into the running mean.
    pub fn record_execution(&mut self, elapsed_ms: f64) {
        self.executions += 1;
        self.average_execution_ms +=
            (elapsed_ms - self.average_execution_ms) / self.executions as f64;
    }

    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_mean() {
        let mut counters = MemoCounters::default();
        for ms in [10.0, 20.0, 30.0] {
            counters.record_execution(ms);
        }
        assert!((counters.average_execution_ms - 20.0).abs() < 1e-9);
        assert_eq!(counters.executions, 3);
    }

    #[test]
    fn test_hit_rate_zero_when_idle() {
        assert_eq!(MemoCounters::default().hit_rate(), 0.0);
    }
}
