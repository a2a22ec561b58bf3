//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Prune: drops expired entries from every registered cache

mod prune;

pub use prune::{spawn_prune_task, Prune};
