//! Network module with deferred startup lifecycle.
//!
//! `new()` wires shared state, `start()` binds the TCP listener, and
//! `serve()` accepts requests until the shutdown future resolves. Binding
//! separately from serving lets callers learn the OS-assigned port first.

use std::future::Future;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::config::NetworkConfig;
use super::handlers::{
    flush_handler, health_handler, liveness_handler, readiness_handler, record_view_handler,
    view_count_handler, AppState,
};
use super::middleware::with_http_layers;
use super::shutdown::ShutdownController;
use crate::config::FailurePolicy;
use crate::flush::FlushTrigger;

/// Owns the HTTP listener and the router state.
pub struct NetworkModule {
    config: NetworkConfig,
    listener: Option<TcpListener>,
    state: AppState,
}

impl NetworkModule {
    /// Creates the module without binding any port.
    #[must_use]
    pub fn new(
        config: NetworkConfig,
        trigger: Arc<FlushTrigger>,
        failure_policy: FailurePolicy,
    ) -> Self {
        let state = AppState::new(
            trigger,
            failure_policy,
            Arc::new(ShutdownController::new()),
        );
        Self {
            config,
            listener: None,
            state,
        }
    }

    /// Shared shutdown controller, for health inspection by other modules.
    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.state.shutdown)
    }

    /// Assembles the router with all routes and middleware.
    ///
    /// Routes:
    /// - `POST /posts/{post_id}/views` -- record one view
    /// - `GET /posts/{post_id}/views` -- pending and persisted counts
    /// - `POST /flush` -- drain and persist now
    /// - `GET /health`, `/health/live`, `/health/ready` -- probes
    #[must_use]
    pub fn build_router(&self) -> Router {
        build_router(self.state.clone(), &self.config)
    }

    /// Binds the TCP listener and returns the bound port.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound (e.g., port in use).
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();

        info!("TCP listener bound to {}:{}", self.config.host, port);

        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves requests until `shutdown` resolves, then drains.
    ///
    /// On the shutdown signal the health state moves to `Draining`, so new
    /// view events get 503 while in-flight requests finish. Afterwards it
    /// waits up to `drain_timeout` for the in-flight count to reach zero.
    ///
    /// # Errors
    ///
    /// Returns an error if `start()` was not called or the server hits a
    /// fatal I/O error.
    pub async fn serve(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let listener = self
            .listener
            .ok_or_else(|| anyhow::anyhow!("start() must be called before serve()"))?;
        let controller = Arc::clone(&self.state.shutdown);
        let router = build_router(self.state, &self.config);

        controller.set_ready();
        info!("serving HTTP requests");

        let draining = Arc::clone(&controller);
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown.await;
                draining.trigger_shutdown();
            })
            .await?;

        if controller.wait_for_drain(self.config.drain_timeout).await {
            info!("all in-flight requests drained");
        } else {
            warn!(
                in_flight = controller.in_flight_count(),
                "drain timeout expired with requests in flight"
            );
        }
        Ok(())
    }
}

fn build_router(state: AppState, config: &NetworkConfig) -> Router {
    let router = Router::new()
        .route(
            "/posts/{post_id}/views",
            post(record_view_handler).get(view_count_handler),
        )
        .route("/flush", post(flush_handler))
        .route("/health", get(health_handler))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .with_state(state);

    with_http_layers(router, config)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use postviews_core::ViewCounterStore;

    use super::*;
    use crate::network::HealthState;
    use crate::sinks::NullSink;

    fn module() -> NetworkModule {
        let trigger = Arc::new(FlushTrigger::new(
            Arc::new(ViewCounterStore::new()),
            Arc::new(NullSink),
            Duration::from_secs(5),
        ));
        NetworkModule::new(
            NetworkConfig {
                host: "127.0.0.1".to_string(),
                ..NetworkConfig::default()
            },
            trigger,
            FailurePolicy::Drop,
        )
    }

    #[test]
    fn new_creates_module_without_binding() {
        assert!(module().listener.is_none());
    }

    #[test]
    fn shutdown_controller_returns_shared_arc() {
        let module = module();
        assert!(Arc::ptr_eq(
            &module.shutdown_controller(),
            &module.shutdown_controller()
        ));
    }

    #[tokio::test]
    async fn start_binds_to_os_assigned_port() {
        let mut module = module();
        let port = module.start().await.unwrap();
        assert!(port > 0);
        assert!(module.listener.is_some());
    }

    #[tokio::test]
    async fn serve_without_start_fails() {
        let result = module().serve(std::future::ready(())).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn serve_stops_on_shutdown_signal() {
        let mut module = module();
        module.start().await.unwrap();
        let controller = module.shutdown_controller();

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(module.serve(async move {
            let _ = rx.await;
        }));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(controller.health_state(), HealthState::Ready);

        tx.send(()).unwrap();
        server.await.unwrap().unwrap();
        assert_eq!(controller.health_state(), HealthState::Stopped);
    }
}
