//! Drain-and-persist cycle over a [`ViewCounterStore`].
//!
//! [`FlushTrigger`] owns the only code path that empties the store. It
//! serializes flushes with an async gate, publishes its [`FlushState`]
//! through `ArcSwap` for health reporting, and never re-queues a failed
//! batch itself: the batch is returned inside [`FlushOutcome`] and the
//! caller applies its [`FailurePolicy`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use arc_swap::ArcSwap;
use postviews_core::{FlushOutcome, PersistError, PersistenceSink, ViewCounterStore};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::{FailurePolicy, FlushConfig};

/// Flush state machine: `Idle` -> `Flushing` -> `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushState {
    Idle,
    Flushing,
}

/// Point-in-time copy of the trigger's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FlushStats {
    pub flushed: u64,
    pub empty: u64,
    pub failed: u64,
    pub views_persisted: u64,
    /// Unix millis of the last successful flush, 0 if none yet.
    pub last_flush_millis: u64,
}

#[derive(Debug, Default)]
struct FlushCounters {
    flushed: AtomicU64,
    empty: AtomicU64,
    failed: AtomicU64,
    views_persisted: AtomicU64,
    last_flush_millis: AtomicU64,
}

/// Drains the view store and hands each batch to a [`PersistenceSink`].
pub struct FlushTrigger {
    store: Arc<ViewCounterStore>,
    sink: Arc<dyn PersistenceSink>,
    persist_timeout: Duration,
    gate: Mutex<()>,
    state: ArcSwap<FlushState>,
    counters: FlushCounters,
}

impl FlushTrigger {
    #[must_use]
    pub fn new(
        store: Arc<ViewCounterStore>,
        sink: Arc<dyn PersistenceSink>,
        persist_timeout: Duration,
    ) -> Self {
        Self {
            store,
            sink,
            persist_timeout,
            gate: Mutex::new(()),
            state: ArcSwap::from_pointee(FlushState::Idle),
            counters: FlushCounters::default(),
        }
    }

    #[must_use]
    pub fn from_config(
        store: Arc<ViewCounterStore>,
        sink: Arc<dyn PersistenceSink>,
        config: &FlushConfig,
    ) -> Self {
        Self::new(store, sink, config.persist_timeout)
    }

    #[must_use]
    pub fn store(&self) -> &Arc<ViewCounterStore> {
        &self.store
    }

    #[must_use]
    pub fn sink(&self) -> &Arc<dyn PersistenceSink> {
        &self.sink
    }

    #[must_use]
    pub fn state(&self) -> FlushState {
        **self.state.load()
    }

    #[must_use]
    pub fn stats(&self) -> FlushStats {
        FlushStats {
            flushed: self.counters.flushed.load(Ordering::Relaxed),
            empty: self.counters.empty.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            views_persisted: self.counters.views_persisted.load(Ordering::Relaxed),
            last_flush_millis: self.counters.last_flush_millis.load(Ordering::Relaxed),
        }
    }

    /// Runs one drain-and-persist cycle.
    ///
    /// Waits for any flush already in progress on this trigger. If the
    /// future is dropped after the drain, the drained batch is lost and the
    /// state still returns to `Idle`.
    pub async fn flush(&self) -> FlushOutcome {
        let _gate = self.gate.lock().await;
        let _flushing = FlushingGuard::enter(&self.state);

        let started = Instant::now();
        let outcome = self.drain_and_persist().await;
        self.record(&outcome, started.elapsed());
        outcome
    }

    /// Flushes, then applies `policy` to a failed batch.
    pub async fn flush_with_policy(&self, policy: FailurePolicy) -> FlushOutcome {
        let outcome = self.flush().await;
        self.apply_failure_policy(&outcome, policy);
        outcome
    }

    /// Re-queues or drops the batch of a failed flush.
    pub fn apply_failure_policy(&self, outcome: &FlushOutcome, policy: FailurePolicy) {
        let FlushOutcome::PersistFailed { batch, .. } = outcome else {
            return;
        };
        match policy {
            FailurePolicy::Drop => {
                metrics::counter!("postviews_views_dropped_total").increment(batch.total_views());
            }
            FailurePolicy::Requeue => {
                self.store.restore(batch);
                metrics::counter!("postviews_views_requeued_total")
                    .increment(batch.total_views());
                info!(
                    posts = batch.len(),
                    views = batch.total_views(),
                    "re-queued failed batch"
                );
            }
        }
    }

    async fn drain_and_persist(&self) -> FlushOutcome {
        let batch = self.store.drain_all();
        if batch.is_empty() {
            debug!("flush found no pending views");
            return FlushOutcome::Empty;
        }

        let posts = batch.len();
        let views = batch.total_views();
        let sink = self.sink.name();

        let started = Instant::now();
        let result = if self.sink.cancel_safe() {
            tokio::time::timeout(self.persist_timeout, self.sink.apply(&batch)).await
        } else {
            // Abandoning this sink mid-apply could still commit the batch.
            Ok(self.sink.apply(&batch).await)
        };

        let error = match result {
            Ok(Ok(())) => {
                let elapsed = started.elapsed();
                if elapsed > self.persist_timeout {
                    warn!(sink, elapsed = ?elapsed, "sink exceeded persist timeout");
                }
                info!(sink, posts, views, "flushed views");
                return FlushOutcome::Flushed { posts, views };
            }
            Ok(Err(e)) => PersistError::Sink(format!("{e:#}")),
            Err(_elapsed) => PersistError::Timeout {
                timeout_ms: u64::try_from(self.persist_timeout.as_millis()).unwrap_or(u64::MAX),
            },
        };

        warn!(sink, posts, views, error = %error, "persisting views failed");
        FlushOutcome::PersistFailed { batch, error }
    }

    fn record(&self, outcome: &FlushOutcome, elapsed: Duration) {
        match outcome {
            FlushOutcome::Flushed { views, .. } => {
                self.counters.flushed.fetch_add(1, Ordering::Relaxed);
                self.counters
                    .views_persisted
                    .fetch_add(*views, Ordering::Relaxed);
                self.counters
                    .last_flush_millis
                    .store(unix_millis(), Ordering::Relaxed);
                metrics::counter!("postviews_views_persisted_total").increment(*views);
            }
            FlushOutcome::Empty => {
                self.counters.empty.fetch_add(1, Ordering::Relaxed);
            }
            FlushOutcome::PersistFailed { .. } => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
            }
        }

        metrics::counter!("postviews_flushes_total", "outcome" => outcome.as_str()).increment(1);
        metrics::histogram!("postviews_flush_duration_seconds").record(elapsed.as_secs_f64());
        #[allow(clippy::cast_precision_loss)]
        let pending_posts = self.store.pending_posts() as f64;
        metrics::gauge!("postviews_pending_posts").set(pending_posts);
    }
}

/// Holds the state at `Flushing` and resets it to `Idle` on drop, so a
/// cancelled flush cannot leave the trigger stuck.
struct FlushingGuard<'a> {
    state: &'a ArcSwap<FlushState>,
}

impl<'a> FlushingGuard<'a> {
    fn enter(state: &'a ArcSwap<FlushState>) -> Self {
        state.store(Arc::new(FlushState::Flushing));
        Self { state }
    }
}

impl Drop for FlushingGuard<'_> {
    fn drop(&mut self) {
        self.state.store(Arc::new(FlushState::Idle));
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}
