//! Background task that drives periodic and on-demand flushes.
//!
//! The task flushes on every interval tick, on [`FlushWorker::flush_now`],
//! and once more when stopped so a clean exit does not lose pending views.

use std::sync::Arc;
use std::time::Duration;

use postviews_core::FlushOutcome;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::trigger::FlushTrigger;
use crate::config::{FailurePolicy, FlushConfig};

/// Shortest accepted flush interval. `tokio::time::interval` panics on zero.
pub const MIN_FLUSH_INTERVAL: Duration = Duration::from_millis(1);

/// Queued on-demand flush requests beyond which `flush_now` waits.
const REQUEST_CAPACITY: usize = 64;

type Reply = oneshot::Sender<FlushOutcome>;

/// Handle to the flush task owned by the server.
pub struct FlushWorker {
    requests: Option<mpsc::Sender<Reply>>,
    stop_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl FlushWorker {
    /// Starts periodic flushing of `trigger` per `config`.
    ///
    /// An interval below [`MIN_FLUSH_INTERVAL`] is raised to it.
    #[must_use]
    pub fn spawn(trigger: Arc<FlushTrigger>, config: &FlushConfig) -> Self {
        let interval = if config.interval < MIN_FLUSH_INTERVAL {
            warn!(
                requested = ?config.interval,
                "flush interval too small, using minimum"
            );
            MIN_FLUSH_INTERVAL
        } else {
            config.interval
        };
        let policy = config.failure_policy;
        info!(interval = ?interval, policy = ?policy, "starting flush worker");

        let (requests, rx) = mpsc::channel(REQUEST_CAPACITY);
        let (stop_tx, stop_rx) = oneshot::channel();
        let handle = tokio::spawn(flush_loop(trigger, policy, interval, rx, stop_rx));

        Self {
            requests: Some(requests),
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        }
    }

    /// Requests an immediate flush and waits for its outcome.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker has been stopped or exits before
    /// replying.
    pub async fn flush_now(&self) -> anyhow::Result<FlushOutcome> {
        let Some(requests) = &self.requests else {
            anyhow::bail!("flush worker not running");
        };
        let (reply, rx) = oneshot::channel();
        requests
            .send(reply)
            .await
            .map_err(|_| anyhow::anyhow!("flush worker exited"))?;
        rx.await
            .map_err(|_| anyhow::anyhow!("flush worker dropped the request"))
    }

    /// Stops the worker and waits for its final flush.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        self.requests.take();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                error!(error = %e, "flush worker task failed");
            }
        }
    }
}

async fn flush_loop(
    trigger: Arc<FlushTrigger>,
    policy: FailurePolicy,
    interval: Duration,
    mut requests: mpsc::Receiver<Reply>,
    mut stop_rx: oneshot::Receiver<()>,
) {
    let mut ticks = tokio::time::interval(interval);
    // A slow flush delays the next tick instead of causing a burst.
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticks.tick().await;

    loop {
        tokio::select! {
            request = requests.recv() => {
                let Some(reply) = request else { break };
                let outcome = trigger.flush_with_policy(policy).await;
                // requester may have given up waiting
                let _ = reply.send(outcome);
            }
            _ = ticks.tick() => {
                let outcome = trigger.flush_with_policy(policy).await;
                debug!(outcome = outcome.as_str(), "periodic flush");
            }
            _ = &mut stop_rx => break,
        }
    }

    let outcome = trigger.flush_with_policy(policy).await;
    info!(outcome = outcome.as_str(), "final flush on shutdown");
}
