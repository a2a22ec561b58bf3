//! Route Cache - an in-process caching engine for HTTP services
//!
//! Provides a bounded LRU store with TTL expiry, a streaming response cache
//! with ETag support, a memoization layer and a bounded-concurrency cache
//! warmer.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod memo;
pub mod models;
pub mod response;
pub mod tasks;
pub mod warmer;

pub use api::AppState;
pub use config::Config;
pub use error::{CacheError, Result};
pub use tasks::spawn_prune_task;
