//! Process wiring: sink, store, flush worker and HTTP module.

use std::sync::Arc;

use postviews_core::{PersistenceSink, ViewCounterStore};
use tokio::signal::ctrl_c;
use tracing::{info, warn};

use crate::config::Cli;
use crate::flush::{FlushTrigger, FlushWorker};
use crate::network::NetworkModule;
use crate::sinks::build_sink;

/// Runs the server until Ctrl+C or SIGTERM.
///
/// # Errors
///
/// Returns an error if the sink cannot be opened or the listener fails.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    run_until(cli, shutdown_signal()).await
}

/// Runs the server until `shutdown` resolves.
///
/// Shutdown order: stop accepting views, drain in-flight requests, then
/// stop the flush worker, whose shutdown hook runs the final flush.
///
/// # Errors
///
/// Returns an error if the sink cannot be opened or the listener fails.
pub async fn run_until(
    cli: Cli,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let sink = build_sink(&cli.sink_config()).await?;
    info!(sink = sink.name(), "persistence sink ready");

    run_with_sink(cli, sink, Arc::new(ViewCounterStore::new()), shutdown).await
}

/// Runs the server over an already opened `sink` and `store` until
/// `shutdown` resolves. The sink settings in `cli` are ignored.
///
/// # Errors
///
/// Returns an error if the listener fails.
pub async fn run_with_sink(
    cli: Cli,
    sink: Arc<dyn PersistenceSink>,
    store: Arc<ViewCounterStore>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let flush_config = cli.flush_config();
    let trigger = Arc::new(FlushTrigger::from_config(
        Arc::clone(&store),
        sink,
        &flush_config,
    ));
    let mut worker = FlushWorker::spawn(Arc::clone(&trigger), &flush_config);

    let mut network = NetworkModule::new(
        cli.network_config(),
        Arc::clone(&trigger),
        flush_config.failure_policy,
    );
    let served = match network.start().await {
        Ok(_) => network.serve(shutdown).await,
        Err(e) => Err(e),
    };

    worker.stop().await;
    if !store.is_empty() {
        warn!(
            posts = store.pending_posts(),
            views = store.pending_views(),
            "pending views lost at exit"
        );
    }
    info!("server stopped");
    served
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            warn!("failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
        info!("received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("received SIGTERM, shutting down");
            }
            Err(e) => {
                warn!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use clap::Parser;
    use postviews_core::PostId;
    use tokio::sync::oneshot;

    use super::*;
    use crate::sinks::MemorySink;

    fn local_cli(extra: &[&str]) -> Cli {
        let mut args = vec!["postviews-server", "--host", "127.0.0.1", "--port", "0"];
        args.extend_from_slice(extra);
        Cli::try_parse_from(args).unwrap()
    }

    #[tokio::test]
    async fn shutdown_flushes_views_recorded_while_serving() {
        let sink = Arc::new(MemorySink::new());
        let store = Arc::new(ViewCounterStore::new());
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let server = run_with_sink(
            local_cli(&[]),
            sink.clone(),
            Arc::clone(&store),
            async move {
                let _ = stop_rx.await;
            },
        );
        let traffic = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            store.record_views(&PostId::new("abc").unwrap(), 4);
            assert_eq!(sink.total("abc"), 0, "default interval must not have flushed yet");
            stop_tx.send(()).unwrap();
        };

        let (served, ()) = tokio::join!(server, traffic);
        served.unwrap();

        assert_eq!(sink.total("abc"), 4);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn run_until_opens_configured_sink() {
        run_until(local_cli(&["--sink", "null"]), std::future::ready(()))
            .await
            .unwrap();
    }
}
