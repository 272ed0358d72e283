//! Cached sorted views of listing indices and their invalidation.
//!
//! A sorted view is a materialized, ordered copy of a listing index (for
//! example users sorted by username). Views are registered per index in
//! `{index}!fsort` and carry a `created_at` field. Invalidating an index
//! drops every view created at or before the given timestamp and advances
//! the index's horizon in `fsort-bust`.

use crate::{
    errors::Result,
    indices::key,
    service::check_pipeline,
    traits::CacheInvalidator,
    types::current_timestamp_millis,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;
use zero_users_storage::{KeyValueStore, Pipeline};

/// Registry suffix: `{index}!fsort` lists the cached views of `index`
pub const FSORT_REGISTRY: &str = "fsort";

/// Hash of index → last invalidation timestamp
pub const FSORT_BUST: &str = "fsort-bust";

/// View field holding its creation timestamp
pub const VIEW_CREATED_AT_FIELD: &str = "created_at";

static LAST_TIMESTAMP: AtomicU64 = AtomicU64::new(0);

/// Millisecond timestamp, strictly greater than any previously returned one
///
/// Falls back to `previous + 1` when the wall clock stalls or steps back.
pub fn next_timestamp() -> u64 {
    let now = current_timestamp_millis();
    let previous = LAST_TIMESTAMP
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(now.max(last + 1))
        })
        .unwrap_or_else(|last| last);
    now.max(previous + 1)
}

/// Store-backed cache of sorted listing views
pub struct SortedViewCache<S: KeyValueStore> {
    storage: Arc<S>,
    /// Serializes the read-compare-write of horizons
    horizon_lock: Mutex<()>,
}

impl<S: KeyValueStore> SortedViewCache<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self {
            storage,
            horizon_lock: Mutex::new(()),
        }
    }

    fn registry_key(index: &str) -> String {
        key(&[index, FSORT_REGISTRY])
    }

    /// Record a materialized view of `index` created at `created_at`
    pub async fn register_view(&self, index: &str, view_key: &str, created_at: u64) -> Result<()> {
        self.storage
            .hset(view_key, VIEW_CREATED_AT_FIELD, &created_at.to_string())
            .await?;
        self.storage
            .sadd(&Self::registry_key(index), view_key)
            .await?;
        Ok(())
    }

    /// Views of `index` currently registered
    pub async fn views(&self, index: &str) -> Result<Vec<String>> {
        Ok(self.storage.smembers(&Self::registry_key(index)).await?)
    }

    /// Timestamp of the latest invalidation of `index`
    pub async fn horizon(&self, index: &str) -> Result<Option<u64>> {
        Ok(self
            .storage
            .hget(FSORT_BUST, index)
            .await?
            .and_then(|raw| raw.parse().ok()))
    }
}

#[async_trait]
impl<S: KeyValueStore + 'static> CacheInvalidator for SortedViewCache<S> {
    async fn invalidate(&self, index: &str, timestamp: u64) -> Result<()> {
        let registry = Self::registry_key(index);
        let mut pipeline = Pipeline::new();

        for view in self.storage.smembers(&registry).await? {
            // Views without a readable creation time are treated as stale
            let created_at = self
                .storage
                .hget(&view, VIEW_CREATED_AT_FIELD)
                .await?
                .and_then(|raw| raw.parse::<u64>().ok())
                .unwrap_or(0);

            if created_at <= timestamp {
                pipeline.del(view.as_str()).srem(registry.as_str(), view.as_str());
            }
        }

        if !pipeline.is_empty() {
            let results = self.storage.exec(&pipeline).await?;
            check_pipeline(&pipeline, results)?;
        }

        // Horizons only move forward, also under concurrent removals
        {
            let _guard = self.horizon_lock.lock().await;
            if self.horizon(index).await?.map_or(true, |current| current < timestamp) {
                self.storage
                    .hset(FSORT_BUST, index, &timestamp.to_string())
                    .await?;
            }
        }

        debug!(
            "Invalidated {} cached view(s) of {} at {}",
            pipeline.len() / 2,
            index,
            timestamp
        );
        Ok(())
    }
}
