//! Memoization Module
//!
//! Caches the results of request handlers and pure functions under keys
//! derived from their inputs.

mod key;
mod memoizer;
mod stats;


pub use key::{
    default_request_key, fingerprint, stable_args_key, tag_pattern, tag_suffix, user_pattern,
    AuthenticatedUser, RequestInfo,
};
pub use memoizer::{
    InvalidationPattern, KeyGenerator, MemoConfig, MemoizeOptions, MemoizedFunction,
    MemoizedHandler, MemoizedResult, Memoizer, PopularResult, ShouldMemoize,
};
pub use stats::MemoStats;
