//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use saga_runtime::RuntimeError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// Saga runtime error.
    Runtime(RuntimeError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Runtime(err) => runtime_error_to_response(err),
        };

        if status.is_server_error() {
            tracing::error!(error = %message, "internal server error");
        }

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn runtime_error_to_response(err: RuntimeError) -> (StatusCode, String) {
    match &err {
        RuntimeError::Rejected(_) | RuntimeError::Order(_) => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        RuntimeError::SagaNotFound(_) | RuntimeError::OrderNotFound(_) => {
            (StatusCode::NOT_FOUND, err.to_string())
        }
        RuntimeError::ConflictRetriesExhausted { .. } => (StatusCode::CONFLICT, err.to_string()),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

impl From<RuntimeError> for ApiError {
    fn from(err: RuntimeError) -> Self {
        ApiError::Runtime(err)
    }
}
