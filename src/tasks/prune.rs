//! Prune Task
//!
//! Background task that periodically removes expired entries so memory is
//! reclaimed even for keys that are never read again.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::SharedLruStore;
use crate::memo::Memoizer;
use crate::response::ResponseCache;

/// A cache whose expired entries can be dropped in bulk.
#[async_trait]
pub trait Prune: Send + Sync {
    /// Label used in log lines.
    fn name(&self) -> &'static str;

    /// Removes expired entries and returns how many were dropped.
    async fn prune(&self) -> usize;
}

#[async_trait]
impl Prune for ResponseCache {
    fn name(&self) -> &'static str {
        "responses"
    }

    async fn prune(&self) -> usize {
        ResponseCache::prune(self).await
    }
}

#[async_trait]
impl<V> Prune for Memoizer<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        "memo"
    }

    async fn prune(&self) -> usize {
        Memoizer::prune(self).await
    }
}

#[async_trait]
impl<K, V> Prune for SharedLruStore<K, V>
where
    K: std::hash::Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        "store"
    }

    async fn prune(&self) -> usize {
        self.write().await.prune()
    }
}

/// Spawns a background task that prunes every target once per interval.
///
/// # Arguments
/// * `targets` - caches to prune, visited in order
/// * `interval_secs` - seconds between prune passes
///
/// # Returns
/// A JoinHandle for the spawned task, aborted during graceful shutdown.
pub fn spawn_prune_task(targets: Vec<Arc<dyn Prune>>, interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs);

    tokio::spawn(async move {
        info!(
            "Starting prune task with interval of {} seconds",
            interval_secs
        );

        loop {
            tokio::time::sleep(interval).await;

            for target in &targets {
                let removed = target.prune().await;
                if removed > 0 {
                    info!("Prune: removed {} expired {} entries", removed, target.name());
                } else {
                    debug!("Prune: no expired {} entries", target.name());
                }
            }
        }
    })
}
