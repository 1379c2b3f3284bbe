use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use postviews_core::InvalidPostId;
use serde_json::json;
use thiserror::Error;

/// Errors surfaced by HTTP handlers.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("invalid post id: {0}")]
    InvalidPostId(#[from] InvalidPostId),

    #[error("server is shutting down")]
    Draining,

    #[error("storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidPostId(_) => StatusCode::BAD_REQUEST,
            Self::Draining => StatusCode::SERVICE_UNAVAILABLE,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}
