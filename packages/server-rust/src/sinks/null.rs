//! No-op [`PersistenceSink`] implementation.
//!
//! [`NullSink`] accepts and discards every batch. Useful for load tests and
//! deployments where view counts are only needed while the process lives.

use async_trait::async_trait;
use postviews_core::{FlushBatch, PersistenceSink};
use tracing::trace;

/// Sink that discards every batch.
///
/// `apply` always succeeds and `persisted_views` always reports `None`.
pub struct NullSink;

#[async_trait]
impl PersistenceSink for NullSink {
    async fn apply(&self, batch: &FlushBatch) -> anyhow::Result<()> {
        trace!(posts = batch.len(), "null sink discarding batch");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "null"
    }
}
