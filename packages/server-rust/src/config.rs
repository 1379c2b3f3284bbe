//! Command-line and environment configuration for the server binary.
//!
//! [`Cli`] is parsed once at startup and split into the plain config
//! structs consumed by each module.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::network::NetworkConfig;

/// Which [`PersistenceSink`](postviews_core::PersistenceSink) to flush into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SinkKind {
    /// Discard flushed batches.
    Null,
    /// Keep totals in memory.
    #[default]
    Memory,
    /// Embedded `redb` database file.
    Redb,
    /// `PostgreSQL` `posts.view_count`.
    Postgres,
}

/// What a flush caller does with a batch whose persist failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum FailurePolicy {
    /// Log the failure and drop the batch.
    #[default]
    Drop,
    /// Merge the batch back into the pending counts for the next flush.
    Requeue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Flush scheduling and failure handling.
#[derive(Debug, Clone)]
pub struct FlushConfig {
    /// Interval between periodic flushes.
    pub interval: Duration,
    /// Upper bound on a single sink `apply` call.
    pub persist_timeout: Duration,
    pub failure_policy: FailurePolicy,
}

impl Default for FlushConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            persist_timeout: Duration::from_secs(10),
            failure_policy: FailurePolicy::Drop,
        }
    }
}

/// Sink selection and backend settings.
#[derive(Debug, Clone)]
pub struct SinkConfig {
    pub kind: SinkKind,
    /// Database file used by [`SinkKind::Redb`].
    pub redb_path: PathBuf,
    /// Connection string used by [`SinkKind::Postgres`].
    pub database_url: Option<String>,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            kind: SinkKind::Memory,
            redb_path: PathBuf::from("postviews.redb"),
            database_url: None,
        }
    }
}

/// Batched post view counter service.
#[derive(Debug, Clone, Parser)]
#[command(name = "postviews-server", version, about)]
pub struct Cli {
    /// Bind address.
    #[arg(long, env = "POSTVIEWS_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on. 0 lets the OS pick one.
    #[arg(long, env = "POSTVIEWS_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Milliseconds between periodic flushes.
    #[arg(
        long,
        env = "POSTVIEWS_FLUSH_INTERVAL_MS",
        default_value_t = 30_000,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub flush_interval_ms: u64,

    /// Milliseconds a sink may take to apply one batch.
    #[arg(
        long,
        env = "POSTVIEWS_PERSIST_TIMEOUT_MS",
        default_value_t = 10_000,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub persist_timeout_ms: u64,

    #[arg(long, env = "POSTVIEWS_FAILURE_POLICY", value_enum, default_value_t = FailurePolicy::Drop)]
    pub failure_policy: FailurePolicy,

    #[arg(long, env = "POSTVIEWS_SINK", value_enum, default_value_t = SinkKind::Memory)]
    pub sink: SinkKind,

    #[arg(long, env = "POSTVIEWS_REDB_PATH", default_value = "postviews.redb")]
    pub redb_path: PathBuf,

    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Maximum time to process one HTTP request.
    #[arg(
        long,
        env = "POSTVIEWS_REQUEST_TIMEOUT_MS",
        default_value_t = 30_000,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub request_timeout_ms: u64,

    /// Allowed CORS origin; repeat or comma-separate. `*` allows any.
    #[arg(
        long = "cors-origin",
        env = "POSTVIEWS_CORS_ORIGINS",
        value_delimiter = ',',
        default_value = "*"
    )]
    pub cors_origins: Vec<String>,

    #[arg(long, env = "POSTVIEWS_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Address for the Prometheus scrape endpoint. Disabled when unset.
    #[arg(long, env = "POSTVIEWS_METRICS_ADDR")]
    pub metrics_addr: Option<SocketAddr>,
}

impl Cli {
    #[must_use]
    pub fn network_config(&self) -> NetworkConfig {
        NetworkConfig {
            host: self.host.clone(),
            port: self.port,
            cors_origins: self.cors_origins.clone(),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            ..NetworkConfig::default()
        }
    }

    #[must_use]
    pub fn flush_config(&self) -> FlushConfig {
        FlushConfig {
            interval: Duration::from_millis(self.flush_interval_ms),
            persist_timeout: Duration::from_millis(self.persist_timeout_ms),
            failure_policy: self.failure_policy,
        }
    }

    #[must_use]
    pub fn sink_config(&self) -> SinkConfig {
        SinkConfig {
            kind: self.sink,
            redb_path: self.redb_path.clone(),
            database_url: self.database_url.clone(),
        }
    }
}
