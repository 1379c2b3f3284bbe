//! `PostgreSQL` [`PersistenceSink`] adding flushed views to `posts.view_count`.
//!
//! All increments of a batch are applied inside one transaction, one
//! `UPDATE` per post in post id order. Views of posts that do not exist
//! (deleted between the view and the flush) are dropped by the `UPDATE`
//! matching zero rows.
//!
//! A dropped `apply` racing `COMMIT` leaves the outcome unknown, so the sink
//! is not cancel-safe. Each statement is instead bounded server-side by
//! `statement_timeout`.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use postviews_core::{FlushBatch, PersistenceSink, PostId};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use tracing::{debug, info};

const INCREMENT_VIEWS: &str = "UPDATE posts SET view_count = view_count + $1 WHERE id = $2";
const SELECT_VIEWS: &str = "SELECT view_count FROM posts WHERE id = $1";

/// Server-side limit for a single statement, in milliseconds.
const STATEMENT_TIMEOUT_MS: u64 = 10_000;

/// Sink writing view increments to the application's `posts` table.
pub struct PostgresSink {
    pool: PgPool,
}

impl PostgresSink {
    /// Connects a small pool to `database_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the database is unreachable.
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let options = database_url
            .parse::<PgConnectOptions>()
            .context("invalid PostgreSQL connection string")?
            .options([("statement_timeout", STATEMENT_TIMEOUT_MS)]);
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await
            .context("failed to connect to PostgreSQL")?;
        info!("connected PostgreSQL view sink");
        Ok(Self { pool })
    }

    /// Wraps an existing pool.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PersistenceSink for PostgresSink {
    async fn apply(&self, batch: &FlushBatch) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        let mut missing = 0usize;
        for (post, count) in batch.iter() {
            let count = i64::try_from(count).context("view increment exceeds i64")?;
            let result = sqlx::query(INCREMENT_VIEWS)
                .bind(count)
                .bind(post.as_str())
                .execute(&mut *tx)
                .await?;
            if result.rows_affected() == 0 {
                missing += 1;
            }
        }
        tx.commit().await?;

        if missing > 0 {
            debug!(missing, "views flushed for posts that no longer exist");
        }
        Ok(())
    }

    async fn persisted_views(&self, post: &PostId) -> anyhow::Result<Option<u64>> {
        let views: Option<i64> = sqlx::query_scalar(SELECT_VIEWS)
            .bind(post.as_str())
            .fetch_optional(&self.pool)
            .await?;
        // negative totals cannot be produced by this sink
        Ok(views.map(|v| u64::try_from(v).unwrap_or(0)))
    }

    fn cancel_safe(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}
