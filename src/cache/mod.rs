//! Cache Module
//!
//! Bounded LRU store with TTL expiration, built on an arena-backed recency list.

mod clock;
mod entry;
mod lru;
mod stats;
mod store;


// Re-export public types
pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::CacheEntry;
pub use lru::LruList;
pub use stats::CacheStats;
pub use store::{EvictionCallback, EvictionReason, LruConfig, LruStore, SharedLruStore};
