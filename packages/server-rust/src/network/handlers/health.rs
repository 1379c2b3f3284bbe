//! Health, liveness, and readiness endpoint handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

use super::AppState;

/// Returns detailed health information as JSON.
///
/// Always 200; the `state` field tells whether the server is serving,
/// draining or stopped. Includes pending counts and flush bookkeeping so
/// operators can see views piling up when the sink is failing.
pub async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let stats = state.trigger.stats();

    Json(json!({
        "state": state.shutdown.health_state().as_str(),
        "in_flight": state.shutdown.in_flight_count(),
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "pending": {
            "posts": state.store.pending_posts(),
            "views": state.store.pending_views(),
        },
        "flush": {
            "state": state.trigger.state(),
            "sink": state.trigger.sink().name(),
            "stats": stats,
        },
    }))
}

/// Liveness probe: always 200 while the process responds.
pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

/// Readiness probe: 200 when ready, 503 while starting, draining or stopped.
pub async fn readiness_handler(State(state): State<AppState>) -> StatusCode {
    if state.shutdown.is_accepting() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use postviews_core::{PostId, ViewCounterStore};

    use super::*;
    use crate::config::FailurePolicy;
    use crate::flush::FlushTrigger;
    use crate::network::ShutdownController;
    use crate::sinks::NullSink;

    fn test_state() -> AppState {
        let trigger = Arc::new(FlushTrigger::new(
            Arc::new(ViewCounterStore::new()),
            Arc::new(NullSink),
            Duration::from_secs(5),
        ));
        AppState::new(
            trigger,
            FailurePolicy::Drop,
            Arc::new(ShutdownController::new()),
        )
    }

    #[tokio::test]
    async fn health_reports_pending_and_flush_state() {
        let state = test_state();
        state.shutdown.set_ready();
        state.store.record_views(&PostId::new("abc").unwrap(), 3);
        state.store.record_view(&PostId::new("xyz").unwrap());

        let json = health_handler(State(state)).await.0;
        assert_eq!(json["state"], "ready");
        assert_eq!(json["pending"]["posts"], 2);
        assert_eq!(json["pending"]["views"], 4);
        assert_eq!(json["flush"]["state"], "idle");
        assert_eq!(json["flush"]["sink"], "null");
        assert_eq!(json["flush"]["stats"]["flushed"], 0);
        assert!(json["uptime_secs"].is_number());
    }

    #[tokio::test]
    async fn health_reflects_completed_flush() {
        let state = test_state();
        state.store.record_view(&PostId::new("abc").unwrap());
        state.trigger.flush().await;

        let json = health_handler(State(state)).await.0;
        assert_eq!(json["state"], "starting");
        assert_eq!(json["pending"]["views"], 0);
        assert_eq!(json["flush"]["stats"]["flushed"], 1);
        assert_eq!(json["flush"]["stats"]["views_persisted"], 1);
    }

    #[tokio::test]
    async fn liveness_always_ok() {
        assert_eq!(liveness_handler().await, StatusCode::OK);
    }

    #[tokio::test]
    async fn readiness_follows_health_state() {
        let state = test_state();
        assert_eq!(
            readiness_handler(State(state.clone())).await,
            StatusCode::SERVICE_UNAVAILABLE
        );

        state.shutdown.set_ready();
        assert_eq!(readiness_handler(State(state.clone())).await, StatusCode::OK);

        state.shutdown.trigger_shutdown();
        assert_eq!(
            readiness_handler(State(state)).await,
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
