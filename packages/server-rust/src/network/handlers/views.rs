//! View event ingestion and per-post count lookup.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use postviews_core::PostId;
use serde::Serialize;

use super::AppState;
use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct RecordedView {
    pub post_id: PostId,
    pub pending: u64,
}

#[derive(Debug, Serialize)]
pub struct ViewCount {
    pub post_id: PostId,
    pub pending: u64,
    /// Durable total, `None` when the sink cannot report it.
    pub persisted: Option<u64>,
}

/// `POST /posts/{post_id}/views`: records one view.
///
/// Returns 202 because the view is only counted in memory until the next
/// flush. Rejected with 503 once shutdown has begun, since a view accepted
/// after the final flush would be lost.
pub async fn record_view_handler(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<(StatusCode, Json<RecordedView>), ApiError> {
    let _in_flight = state.shutdown.in_flight_guard();
    if !state.shutdown.is_accepting() {
        return Err(ApiError::Draining);
    }

    let post_id = PostId::new(&raw_id)?;
    state.store.record_view(&post_id);
    metrics::counter!("postviews_views_recorded_total").increment(1);

    let pending = state.store.pending(&post_id);
    Ok((StatusCode::ACCEPTED, Json(RecordedView { post_id, pending })))
}

/// `GET /posts/{post_id}/views`: pending and persisted counts.
pub async fn view_count_handler(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<ViewCount>, ApiError> {
    let post_id = PostId::new(&raw_id)?;
    let pending = state.store.pending(&post_id);
    let persisted = state.trigger.sink().persisted_views(&post_id).await?;

    Ok(Json(ViewCount {
        post_id,
        pending,
        persisted,
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use postviews_core::ViewCounterStore;

    use super::*;
    use crate::config::FailurePolicy;
    use crate::flush::FlushTrigger;
    use crate::network::ShutdownController;
    use crate::sinks::MemorySink;

    fn test_state() -> AppState {
        let trigger = Arc::new(FlushTrigger::new(
            Arc::new(ViewCounterStore::new()),
            Arc::new(MemorySink::new()),
            Duration::from_secs(5),
        ));
        let state = AppState::new(
            trigger,
            FailurePolicy::Drop,
            Arc::new(ShutdownController::new()),
        );
        state.shutdown.set_ready();
        state
    }

    #[tokio::test]
    async fn records_view_and_reports_pending() {
        let state = test_state();
        let (status, body) =
            record_view_handler(State(state.clone()), Path("abc".to_string()))
                .await
                .unwrap();
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body.pending, 1);

        let (_, body) = record_view_handler(State(state.clone()), Path("abc".to_string()))
            .await
            .unwrap();
        assert_eq!(body.pending, 2);
        assert_eq!(state.shutdown.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn rejects_blank_post_id() {
        let state = test_state();
        let err = record_view_handler(State(state.clone()), Path("  ".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidPostId(_)));
        assert!(state.store.is_empty());
    }

    #[tokio::test]
    async fn rejects_views_while_draining() {
        let state = test_state();
        state.shutdown.trigger_shutdown();
        let err = record_view_handler(State(state.clone()), Path("abc".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Draining));
        assert!(state.store.is_empty());
    }

    #[tokio::test]
    async fn count_combines_pending_and_persisted() {
        let state = test_state();
        let abc = PostId::new("abc").unwrap();
        state.store.record_views(&abc, 2);
        state.trigger.flush().await;
        state.store.record_view(&abc);

        let body = view_count_handler(State(state), Path("abc".to_string()))
            .await
            .unwrap();
        assert_eq!(body.pending, 1);
        assert_eq!(body.persisted, Some(2));
    }
}
