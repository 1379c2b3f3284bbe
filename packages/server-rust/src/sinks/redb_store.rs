//! Embedded on-disk [`PersistenceSink`] backed by [`redb`].
//!
//! Each batch is applied in a single write transaction against the
//! `post_views` table, so a batch is either fully committed or not at all.
//! `redb` is synchronous; all access runs on the blocking thread pool. A
//! blocking task cannot be abandoned, so the sink is not cancel-safe: once
//! `apply` starts, the transaction runs to commit or abort.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use postviews_core::{FlushBatch, PersistenceSink, PostId};
use redb::{Database, ReadableTable, TableDefinition};
use tracing::info;

/// Table of post id -> persisted view total.
const POST_VIEWS: TableDefinition<&str, u64> = TableDefinition::new("post_views");

/// Sink persisting view totals in a local `redb` database file.
pub struct RedbSink {
    db: Arc<Database>,
}

impl RedbSink {
    /// Opens (or creates) the database at `path` and ensures the table exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or the table cannot be
    /// created.
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let db = Database::create(path)
            .with_context(|| format!("failed to open redb database at {}", path.display()))?;

        // Opening the table in a write transaction creates it, so later
        // read transactions never see a missing table.
        let txn = db.begin_write()?;
        txn.open_table(POST_VIEWS)?;
        txn.commit()?;

        info!(path = %path.display(), "opened redb view store");
        Ok(Self { db: Arc::new(db) })
    }

    fn apply_blocking(db: &Database, batch: &FlushBatch) -> anyhow::Result<()> {
        let txn = db.begin_write()?;
        {
            let mut table = txn.open_table(POST_VIEWS)?;
            for (post, count) in batch.iter() {
                let current = table.get(post.as_str())?.map_or(0, |v| v.value());
                table.insert(post.as_str(), current.saturating_add(count))?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    fn read_blocking(db: &Database, post: &str) -> anyhow::Result<Option<u64>> {
        let txn = db.begin_read()?;
        let table = txn.open_table(POST_VIEWS)?;
        Ok(Some(table.get(post)?.map_or(0, |v| v.value())))
    }
}

#[async_trait]
impl PersistenceSink for RedbSink {
    async fn apply(&self, batch: &FlushBatch) -> anyhow::Result<()> {
        let db = Arc::clone(&self.db);
        let batch = batch.clone();
        tokio::task::spawn_blocking(move || Self::apply_blocking(&db, &batch))
            .await
            .context("redb apply task panicked")?
    }

    async fn persisted_views(&self, post: &PostId) -> anyhow::Result<Option<u64>> {
        let db = Arc::clone(&self.db);
        let post = post.clone();
        tokio::task::spawn_blocking(move || Self::read_blocking(&db, post.as_str()))
            .await
            .context("redb read task panicked")?
    }

    fn cancel_safe(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "redb"
    }
}
