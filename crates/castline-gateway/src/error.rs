//! Mapping from [`CastlineError`] to HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use castline_core::CastlineError;

/// Error body returned by the control surface: `{"error": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

fn status_for(err: &CastlineError) -> StatusCode {
    match err {
        CastlineError::InvalidNumber(_)
        | CastlineError::UnknownCommand(_)
        | CastlineError::MissingArgument(_)
        | CastlineError::NestedBroadcast(_) => StatusCode::BAD_REQUEST,
        CastlineError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        CastlineError::Busy => StatusCode::CONFLICT,
        CastlineError::NoRecipients => StatusCode::UNPROCESSABLE_ENTITY,
        CastlineError::Delivery(_) | CastlineError::DirectoryUnavailable(_) => {
            StatusCode::BAD_GATEWAY
        }
        CastlineError::Session(_) | CastlineError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
        CastlineError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        CastlineError::Config(_) | CastlineError::Io(_) | CastlineError::Json(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<CastlineError> for ApiError {
    fn from(err: CastlineError) -> Self {
        let status = status_for(&err);
        if status.is_server_error() {
            tracing::error!("Request failed: {err}");
        } else {
            tracing::warn!("Request rejected: {err}");
        }
        Self {
            status,
            message: err.user_message(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({ "error": self.message }))).into_response()
    }
}
