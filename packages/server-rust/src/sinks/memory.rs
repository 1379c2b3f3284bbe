//! In-memory [`PersistenceSink`] keeping running totals per post.
//!
//! Totals live in a [`DashMap`] so reads from request handlers never
//! contend with a batch being applied for other posts. Only totals and an
//! apply count are kept, so memory grows with distinct posts, not flushes.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use postviews_core::{FlushBatch, PersistenceSink, PostId};

/// Sink that accumulates persisted totals in process memory.
#[derive(Default)]
pub struct MemorySink {
    totals: DashMap<PostId, u64>,
    applied: AtomicUsize,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Persisted total for `post`, zero if never flushed.
    #[must_use]
    pub fn total(&self, post: &str) -> u64 {
        self.totals.get(post).map_or(0, |entry| *entry.value())
    }

    /// Number of distinct posts with a persisted total.
    #[must_use]
    pub fn post_count(&self) -> usize {
        self.totals.len()
    }

    /// Number of `apply` calls that succeeded.
    #[must_use]
    pub fn apply_count(&self) -> usize {
        self.applied.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl PersistenceSink for MemorySink {
    async fn apply(&self, batch: &FlushBatch) -> anyhow::Result<()> {
        for (post, count) in batch.iter() {
            let mut slot = self.totals.entry(post.clone()).or_insert(0);
            *slot = slot.saturating_add(count);
        }
        self.applied.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn persisted_views(&self, post: &PostId) -> anyhow::Result<Option<u64>> {
        Ok(Some(self.total(post.as_str())))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
