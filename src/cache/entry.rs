//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::time::{Duration, Instant};

// == Cache Entry ==
/// Represents a single cache entry with value and access metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// When the value was (re)written
    pub inserted_at: Instant,
    /// Last successful, non-expired read (or the write time)
    pub last_accessed_at: Instant,
    /// Number of successful reads since the last write
    pub access_count: u64,
    /// Lifetime measured from `inserted_at`, None = no expiration
    pub ttl: Option<Duration>,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new cache entry written at `now`.
    pub fn new(value: V, ttl: Option<Duration>, now: Instant) -> Self {
        Self {
            value,
            inserted_at: now,
            last_accessed_at: now,
            access_count: 0,
            ttl,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once strictly more than `ttl` has elapsed since it
    /// was written. Entries without a TTL never expire.
    pub fn is_expired(&self, now: Instant) -> bool {
        match self.ttl {
            Some(ttl) => now.saturating_duration_since(self.inserted_at) > ttl,
            None => false,
        }
    }

    // == Time To Live ==
    /// Returns remaining lifetime, or None if no expiration is set.
    ///
    /// Returns `Some(Duration::ZERO)` once the entry has expired.
    pub fn ttl_remaining(&self, now: Instant) -> Option<Duration> {
        self.ttl.map(|ttl| {
            let age = now.saturating_duration_since(self.inserted_at);
            ttl.saturating_sub(age)
        })
    }

    // == Touch ==
    /// Records a successful read.
    pub fn touch(&mut self, now: Instant) {
        self.last_accessed_at = now;
        self.access_count += 1;
    }
}
