//! `postviews` server: counts post views in memory and flushes them to a
//! persistence sink on a schedule or on demand.

pub mod config;
pub mod error;
pub mod flush;
pub mod network;
pub mod server;
pub mod sinks;
pub mod telemetry;

pub use config::{Cli, FailurePolicy, FlushConfig, SinkConfig, SinkKind};
pub use error::ApiError;
pub use flush::{FlushTrigger, FlushWorker};
pub use network::{AppState, NetworkModule};
