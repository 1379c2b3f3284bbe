//! HTTP handler definitions for the view counter server.
//!
//! Defines [`AppState`] (the shared state carried through axum extractors)
//! and re-exports all handler functions for building the router.

pub mod flush;
pub mod health;
pub mod views;

pub use flush::flush_handler;
pub use health::{health_handler, liveness_handler, readiness_handler};
pub use views::{record_view_handler, view_count_handler};

use std::sync::Arc;
use std::time::Instant;

use postviews_core::ViewCounterStore;

use super::ShutdownController;
use crate::config::FailurePolicy;
use crate::flush::FlushTrigger;

/// Shared application state passed to all axum handlers via `State` extraction.
///
/// Holds `Arc` references so cloning per request is cheap. The store is
/// injected here rather than reached through a global.
#[derive(Clone)]
pub struct AppState {
    /// Pending view counts.
    pub store: Arc<ViewCounterStore>,
    /// Drain-and-persist entrypoint, shared with the flush worker.
    pub trigger: Arc<FlushTrigger>,
    /// What `POST /flush` does with a failed batch.
    pub failure_policy: FailurePolicy,
    /// Health state and in-flight tracking.
    pub shutdown: Arc<ShutdownController>,
    /// Server process start time, used for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    #[must_use]
    pub fn new(
        trigger: Arc<FlushTrigger>,
        failure_policy: FailurePolicy,
        shutdown: Arc<ShutdownController>,
    ) -> Self {
        Self {
            store: Arc::clone(trigger.store()),
            trigger,
            failure_policy,
            shutdown,
            start_time: Instant::now(),
        }
    }
}
