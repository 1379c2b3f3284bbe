//! On-demand flush entrypoint for external schedulers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use postviews_core::FlushOutcome;
use serde_json::{json, Value};

use super::AppState;

/// `POST /flush`: drains pending views and persists them.
///
/// Takes no input. Responds 200 for `flushed` and `empty`, 500 for
/// `persist_failed`. The configured failure policy decides whether a failed
/// batch is re-queued or dropped.
pub async fn flush_handler(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let _in_flight = state.shutdown.in_flight_guard();
    let outcome = state.trigger.flush_with_policy(state.failure_policy).await;
    outcome_response(&outcome)
}

fn outcome_response(outcome: &FlushOutcome) -> (StatusCode, Json<Value>) {
    match outcome {
        FlushOutcome::Flushed { posts, views } => (
            StatusCode::OK,
            Json(json!({ "status": outcome.as_str(), "posts": posts, "views": views })),
        ),
        FlushOutcome::Empty => (StatusCode::OK, Json(json!({ "status": outcome.as_str() }))),
        FlushOutcome::PersistFailed { batch, error } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "status": outcome.as_str(),
                "posts": batch.len(),
                "views": batch.total_views(),
                "error": error.to_string(),
            })),
        ),
    }
}
