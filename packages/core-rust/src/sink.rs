//! Durable destination for drained view increments.

use async_trait::async_trait;

use crate::types::{FlushBatch, PostId};

/// Applies batches of view increments to durable storage.
///
/// Implementations: in-memory, `redb`, `PostgreSQL`, and a no-op sink.
/// Delivery is at-least-once: a caller that retries a batch after an
/// ambiguous failure may double-count.
///
/// Used as `Arc<dyn PersistenceSink>`.
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    /// Applies every increment in `batch`.
    ///
    /// Transactional backends commit the whole batch or nothing.
    async fn apply(&self, batch: &FlushBatch) -> anyhow::Result<()>;

    /// Durable view total of `post`, if the backend can report it.
    ///
    /// Returns `Ok(None)` by default.
    async fn persisted_views(&self, _post: &PostId) -> anyhow::Result<Option<u64>> {
        Ok(None)
    }

    /// Whether dropping an unfinished `apply` guarantees nothing was written.
    ///
    /// Callers may bound cancel-safe sinks with a timeout. Sinks returning
    /// `false` must be awaited to completion, otherwise a batch reported as
    /// failed may already be committed. Defaults to `true`.
    fn cancel_safe(&self) -> bool {
        true
    }

    /// Short backend name for logs and metric labels.
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct DiscardingSink;

    #[async_trait]
    impl PersistenceSink for DiscardingSink {
        async fn apply(&self, _batch: &FlushBatch) -> anyhow::Result<()> {
            Ok(())
        }

        fn name(&self) -> &'static str {
            "discard"
        }
    }

    #[tokio::test]
    async fn persisted_views_defaults_to_unknown() {
        let sink = DiscardingSink;
        let post = PostId::new("abc").unwrap();
        assert_eq!(sink.persisted_views(&post).await.unwrap(), None);
        assert!(sink.cancel_safe());
    }
}
