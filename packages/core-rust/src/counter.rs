//! In-memory accumulation of pending view increments.
//!
//! [`ViewCounterStore`] is the hot path of the system: every view event
//! lands here, and a flush drains it in one swap. Nothing in this module
//! touches durable storage.

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::debug;

use crate::types::{FlushBatch, PostId};

/// Process-local map of post id to pending view increment.
///
/// Shared as `Arc<ViewCounterStore>` between request handlers and the
/// flush trigger. Increments hold the lock for a single map update;
/// [`drain_all`](Self::drain_all) holds it only long enough to swap in an
/// empty map, so writers never wait on persistence.
#[derive(Debug, Default)]
pub struct ViewCounterStore {
    pending: Mutex<HashMap<PostId, u64>>,
}

impl ViewCounterStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one view of `post`.
    pub fn record_view(&self, post: &PostId) {
        self.record_views(post, 1);
    }

    /// Records `count` views of `post`. Zero is a no-op.
    pub fn record_views(&self, post: &PostId, count: u64) {
        if count == 0 {
            return;
        }
        let mut pending = self.pending.lock();
        // get_mut first so the common case does not clone the id
        if let Some(slot) = pending.get_mut(post.as_str()) {
            *slot = slot.saturating_add(count);
        } else {
            pending.insert(post.clone(), count);
        }
    }

    /// Atomically takes every pending increment, leaving the store empty.
    ///
    /// An increment racing with the drain ends up either in the returned
    /// batch or in the store afterwards, never in both.
    #[must_use]
    pub fn drain_all(&self) -> FlushBatch {
        let drained = std::mem::take(&mut *self.pending.lock());
        FlushBatch::from_counts(drained)
    }

    /// Merges a previously drained batch back into the pending counts.
    ///
    /// Used by callers that choose to retry a batch whose persist failed.
    pub fn restore(&self, batch: &FlushBatch) {
        if batch.is_empty() {
            return;
        }
        let mut pending = self.pending.lock();
        for (post, count) in batch.iter() {
            let slot = pending.entry(post.clone()).or_insert(0);
            *slot = slot.saturating_add(count);
        }
        debug!(
            posts = batch.len(),
            views = batch.total_views(),
            "restored batch into pending counts"
        );
    }

    /// Pending (not yet flushed) views of `post`.
    #[must_use]
    pub fn pending(&self, post: &PostId) -> u64 {
        self.pending
            .lock()
            .get(post.as_str())
            .copied()
            .unwrap_or(0)
    }

    /// Number of posts with pending views.
    #[must_use]
    pub fn pending_posts(&self) -> usize {
        self.pending.lock().len()
    }

    /// Total pending views across all posts.
    #[must_use]
    pub fn pending_views(&self) -> u64 {
        self.pending
            .lock()
            .values()
            .fold(0u64, |acc, count| acc.saturating_add(*count))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}
