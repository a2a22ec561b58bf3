//! LRU Store Module
//!
//! Main cache engine combining a hash index with an arena-backed recency list
//! and lazy TTL expiration.

use std::collections::HashMap;
use std::hash::Hash;
use std::mem;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::debug;

use crate::cache::{CacheEntry, CacheStats, Clock, LruList, SystemClock};
use crate::error::{CacheError, Result};

/// Store shared between tasks. The list and the index are only ever mutated
/// together under the write lock.
pub type SharedLruStore<K, V> = Arc<RwLock<LruStore<K, V>>>;

/// Callback invoked with every entry the store drops on its own.
pub type EvictionCallback<K, V> = Box<dyn FnMut(&K, &V, EvictionReason) + Send + Sync>;

// == Eviction Reason ==
/// Why an entry left the store without an explicit delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    /// Tail removed to make room for a new entry
    Capacity,
    /// TTL elapsed, found on access or by `prune`
    Expired,
    /// Removed by `clear`
    Cleared,
    /// Removed by `resize` shrinking the capacity
    Resized,
}

// == LRU Config ==
/// Construction parameters for [`LruStore`].
#[derive(Debug, Clone)]
pub struct LruConfig {
    /// Maximum number of entries, must be greater than 0
    pub max_entries: usize,
    /// TTL applied when `set` is called without one
    pub default_ttl: Option<Duration>,
    /// Refresh recency and access count on successful reads
    pub update_age_on_get: bool,
    /// Serve an expired value once (then drop it) instead of missing
    pub allow_stale: bool,
}

impl LruConfig {
    /// Capacity-only configuration with no TTL.
    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            max_entries,
            ..Self::default()
        }
    }

    /// Sets the default TTL.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }
}

impl Default for LruConfig {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            default_ttl: None,
            update_age_on_get: true,
            allow_stale: false,
        }
    }
}

// == LRU Store ==
/// Bounded key/value store with LRU eviction and optional per-entry TTL.
pub struct LruStore<K, V, C = SystemClock> {
    /// Key to slot index
    index: HashMap<K, usize>,
    /// Recency list owning the entries
    list: LruList<K, CacheEntry<V>>,
    /// Performance statistics
    stats: CacheStats,
    config: LruConfig,
    on_evict: Option<EvictionCallback<K, V>>,
    clock: C,
}

impl<K, V> LruStore<K, V, SystemClock>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    // == Constructor ==
    /// Creates a store using the system clock.
    ///
    /// Fails with [`CacheError::Configuration`] when the capacity is zero or
    /// the default TTL is zero.
    pub fn new(config: LruConfig) -> Result<Self> {
        Self::with_clock(config, SystemClock)
    }
}

impl<K, V, C> LruStore<K, V, C>
where
    K: Eq + Hash + Clone,
    V: Clone,
    C: Clock,
{
    /// Creates a store with a custom clock.
    pub fn with_clock(config: LruConfig, clock: C) -> Result<Self> {
        if config.max_entries == 0 {
            return Err(CacheError::Configuration(
                "max_entries must be greater than 0".to_string(),
            ));
        }
        if config.default_ttl == Some(Duration::ZERO) {
            return Err(CacheError::Configuration(
                "default_ttl must be greater than 0".to_string(),
            ));
        }

        let mut stats = CacheStats::new();
        stats.max_entries = config.max_entries;

        Ok(Self {
            index: HashMap::with_capacity(config.max_entries.min(4096)),
            list: LruList::with_capacity(config.max_entries.min(4096)),
            stats,
            config,
            on_evict: None,
            clock,
        })
    }

    /// Installs the eviction callback.
    pub fn on_evict<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&K, &V, EvictionReason) + Send + Sync + 'static,
    {
        self.on_evict = Some(Box::new(callback));
        self
    }

    /// Wraps the store for sharing between tasks.
    pub fn shared(self) -> Arc<RwLock<Self>> {
        Arc::new(RwLock::new(self))
    }

    // == Get ==
    /// Retrieves a value by key.
    ///
    /// Expired entries are dropped and counted as misses, unless `allow_stale`
    /// is set, in which case the stale value is returned once and then dropped.
    pub fn get(&mut self, key: &K) -> Option<V> {
        let idx = match self.index.get(key) {
            Some(&idx) => idx,
            None => {
                self.stats.record_miss();
                return None;
            }
        };

        let now = self.clock.now();
        let expired = self.list.get(idx).map_or(true, |e| e.is_expired(now));
        if expired {
            let stale = self.remove_slot(key, idx, Some(EvictionReason::Expired));
            if self.config.allow_stale {
                self.stats.record_hit();
                return stale;
            }
            self.stats.record_miss();
            return None;
        }

        self.stats.record_hit();
        if self.config.update_age_on_get {
            self.list.move_to_front(idx);
            if let Some(entry) = self.list.get_mut(idx) {
                entry.touch(now);
            }
        }
        self.list.get(idx).map(|entry| entry.value.clone())
    }

    /// Like [`get`](Self::get) but hands out a mutable reference.
    ///
    /// Stale values are never served through this method.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let idx = match self.index.get(key) {
            Some(&idx) => idx,
            None => {
                self.stats.record_miss();
                return None;
            }
        };

        let now = self.clock.now();
        if self.list.get(idx).map_or(true, |e| e.is_expired(now)) {
            self.remove_slot(key, idx, Some(EvictionReason::Expired));
            self.stats.record_miss();
            return None;
        }

        self.stats.record_hit();
        if self.config.update_age_on_get {
            self.list.move_to_front(idx);
            if let Some(entry) = self.list.get_mut(idx) {
                entry.touch(now);
            }
        }
        self.list.get_mut(idx).map(|entry| &mut entry.value)
    }

    /// Reads a live value without touching recency or statistics.
    pub fn peek(&self, key: &K) -> Option<&V> {
        let entry = self.list.get(*self.index.get(key)?)?;
        (!entry.is_expired(self.clock.now())).then_some(&entry.value)
    }

    // == Set ==
    /// Stores a value, overwriting and promoting an existing key.
    ///
    /// `ttl` of None falls back to the configured default. A single call adds
    /// at most one entry, so at most one tail eviction happens.
    pub fn set(&mut self, key: K, value: V, ttl: Option<Duration>) {
        let now = self.clock.now();
        let entry = CacheEntry::new(value, ttl.or(self.config.default_ttl), now);

        if let Some(&idx) = self.index.get(&key) {
            if let Some(slot) = self.list.get_mut(idx) {
                *slot = entry;
            }
            self.list.move_to_front(idx);
            return;
        }

        let idx = self.list.push_front(key.clone(), entry);
        self.index.insert(key, idx);

        if self.list.len() > self.config.max_entries {
            self.evict_tail(EvictionReason::Capacity);
        }
        self.stats.set_total_entries(self.list.len());
    }

    // == Delete ==
    /// Removes an entry by key. Returns true if it was present.
    pub fn delete(&mut self, key: &K) -> bool {
        match self.index.get(key) {
            Some(&idx) => {
                self.remove_slot(key, idx, None);
                true
            }
            None => false,
        }
    }

    // == Has ==
    /// True when the key is present and not expired. Never touches recency.
    pub fn has(&self, key: &K) -> bool {
        self.peek(key).is_some()
    }

    // == Clear ==
    /// Removes every entry, reporting each to the eviction callback.
    pub fn clear(&mut self) {
        self.index.clear();
        let drained = self.list.drain();
        if let Some(callback) = self.on_evict.as_mut() {
            for (key, entry) in &drained {
                callback(key, &entry.value, EvictionReason::Cleared);
            }
        }
        self.stats.set_total_entries(0);
    }

    // == Keys / Values ==
    /// Live keys, most recently used first.
    pub fn keys(&self) -> Vec<K> {
        let now = self.clock.now();
        self.list
            .iter()
            .filter(|(_, entry)| !entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Live values, most recently used first.
    pub fn values(&self) -> Vec<V> {
        let now = self.clock.now();
        self.list
            .iter()
            .filter(|(_, entry)| !entry.is_expired(now))
            .map(|(_, entry)| entry.value.clone())
            .collect()
    }

    /// Every stored entry with its metadata, most recently used first.
    pub fn entries(&self) -> impl Iterator<Item = (&K, &CacheEntry<V>)> {
        self.list.iter()
    }

    // == Prune ==
    /// Removes all expired entries and returns how many were dropped.
    pub fn prune(&mut self) -> usize {
        let now = self.clock.now();
        let expired: Vec<(K, usize)> = self
            .index
            .iter()
            .filter(|(_, &idx)| self.list.get(idx).map_or(false, |e| e.is_expired(now)))
            .map(|(key, &idx)| (key.clone(), idx))
            .collect();

        let count = expired.len();
        for (key, idx) in expired {
            self.remove_slot(&key, idx, Some(EvictionReason::Expired));
        }
        if count > 0 {
            debug!(removed = count, "Pruned expired entries");
        }
        count
    }

    // == Resize ==
    /// Changes the capacity, evicting from the tail until the store fits.
    ///
    /// Returns the number of evicted entries.
    pub fn resize(&mut self, max_entries: usize) -> Result<usize> {
        if max_entries == 0 {
            return Err(CacheError::Configuration(
                "max_entries must be greater than 0".to_string(),
            ));
        }
        self.config.max_entries = max_entries;
        self.stats.max_entries = max_entries;

        let mut evicted = 0;
        while self.list.len() > max_entries {
            self.evict_tail(EvictionReason::Resized);
            evicted += 1;
        }
        self.stats.set_total_entries(self.list.len());
        Ok(evicted)
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.list.len());
        stats.approx_memory_bytes = self.approx_memory_bytes();
        stats
    }

    /// Per-entry bookkeeping cost times the entry count.
    fn approx_memory_bytes(&self) -> usize {
        let per_entry = mem::size_of::<K>() * 2
            + mem::size_of::<CacheEntry<V>>()
            + mem::size_of::<usize>() * 3;
        self.list.len() * per_entry
    }

    // == Length ==
    /// Returns the current number of entries in the cache.
    pub fn len(&self) -> usize {
        self.list.len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.config.max_entries
    }

    fn evict_tail(&mut self, reason: EvictionReason) {
        if let Some((key, entry)) = self.list.pop_back() {
            self.index.remove(&key);
            self.stats.record_eviction();
            debug!(reason = ?reason, "Evicted least recently used entry");
            if let Some(callback) = self.on_evict.as_mut() {
                callback(&key, &entry.value, reason);
            }
        }
    }

    fn remove_slot(&mut self, key: &K, idx: usize, reason: Option<EvictionReason>) -> Option<V> {
        self.index.remove(key);
        let (key, entry) = self.list.remove(idx)?;
        if let Some(reason) = reason {
            if reason == EvictionReason::Expired {
                self.stats.record_expiration();
            }
            if let Some(callback) = self.on_evict.as_mut() {
                callback(&key, &entry.value, reason);
            }
        }
        self.stats.set_total_entries(self.list.len());
        Some(entry.value)
    }
}

impl<K, V, C> std::fmt::Debug for LruStore<K, V, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LruStore")
            .field("len", &self.list.len())
            .field("max_entries", &self.config.max_entries)
            .field("stats", &self.stats)
            .finish()
    }
}
