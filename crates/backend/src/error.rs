use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use color_eyre::eyre;
use serde_json::json;
use tracing::error;

#[derive(Debug)]
pub enum ApiError {
    NotFound(&'static str),
    Internal(eyre::Report),
}

impl From<eyre::Report> for ApiError {
    fn from(e: eyre::Report) -> Self {
        Self::Internal(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Internal(e) => {
                error!(error = ?e, "Failed to serve request");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
