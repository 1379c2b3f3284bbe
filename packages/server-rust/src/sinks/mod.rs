//! [`PersistenceSink`] implementations and the factory that selects one.
//!
//! - [`NullSink`] discards batches
//! - [`MemorySink`] keeps totals in process memory
//! - [`RedbSink`] persists totals in an embedded `redb` file (feature `redb`)
//! - [`PostgresSink`] updates `posts.view_count` (feature `postgres`)

mod memory;
mod null;
#[cfg(feature = "postgres")]
mod postgres;
#[cfg(feature = "redb")]
mod redb_store;

use std::sync::Arc;

use postviews_core::PersistenceSink;

pub use memory::MemorySink;
pub use null::NullSink;
#[cfg(feature = "postgres")]
pub use postgres::PostgresSink;
#[cfg(feature = "redb")]
pub use redb_store::RedbSink;

use crate::config::{SinkConfig, SinkKind};

/// Builds the sink selected by `config`.
///
/// # Errors
///
/// Returns an error if the backend cannot be opened, if required settings
/// are missing, or if the backend was not compiled in.
pub async fn build_sink(config: &SinkConfig) -> anyhow::Result<Arc<dyn PersistenceSink>> {
    let sink: Arc<dyn PersistenceSink> = match config.kind {
        SinkKind::Null => Arc::new(NullSink),
        SinkKind::Memory => Arc::new(MemorySink::new()),
        SinkKind::Redb => open_redb(config)?,
        SinkKind::Postgres => connect_postgres(config).await?,
    };
    Ok(sink)
}

#[cfg(feature = "redb")]
fn open_redb(config: &SinkConfig) -> anyhow::Result<Arc<dyn PersistenceSink>> {
    Ok(Arc::new(RedbSink::open(&config.redb_path)?))
}

#[cfg(not(feature = "redb"))]
fn open_redb(_config: &SinkConfig) -> anyhow::Result<Arc<dyn PersistenceSink>> {
    anyhow::bail!("redb sink requested but the `redb` feature is disabled")
}

#[cfg(feature = "postgres")]
async fn connect_postgres(config: &SinkConfig) -> anyhow::Result<Arc<dyn PersistenceSink>> {
    let url = config
        .database_url
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("postgres sink requires --database-url"))?;
    Ok(Arc::new(PostgresSink::connect(url).await?))
}

#[cfg(not(feature = "postgres"))]
#[allow(clippy::unused_async)]
async fn connect_postgres(_config: &SinkConfig) -> anyhow::Result<Arc<dyn PersistenceSink>> {
    anyhow::bail!("postgres sink requested but the `postgres` feature is disabled")
}
