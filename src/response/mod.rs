//! Response Module
//!
//! Streaming response cache: full response snapshots, ETag validators,
//! conditional (304) answers and non-destructive body replay.

mod cached;
mod policy;
mod store;

pub use cached::{generate_etag, gunzip, gzip, CachedResponse};
pub use policy::{response_cache_key, should_cache};
pub use store::{
    CacheOutcome, CacheResponseOptions, ResponseCache, ResponseCacheConfig, ResponseCacheStats,
};
