//! HTTP error type.
//!
//! Every handler returns `Result<_, ApiError>`; the error renders as
//! `{"error": "<message>"}` with the matching status code.

use axum::{http::StatusCode, response::IntoResponse, Json};
use tracing::error;

/// Error returned by HTTP handlers.
#[derive(Debug)]
pub enum ApiError {
    /// Unexpected failure. Logged, reported to the client generically.
    Internal(quill_core::Error),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    ServiceUnavailable(String),
}

impl From<quill_core::Error> for ApiError {
    fn from(err: quill_core::Error) -> Self {
        use quill_core::Error;

        match &err {
            Error::NotFound(msg) => ApiError::NotFound(msg.clone()),
            Error::NoteNotFound(_) => ApiError::NotFound("Note not found".to_string()),
            Error::InvalidInput(msg) => ApiError::BadRequest(msg.clone()),
            Error::Unauthorized(msg) => ApiError::Unauthorized(msg.clone()),
            Error::Forbidden(msg) => ApiError::Forbidden(msg.clone()),
            Error::Database(sqlx_err) => {
                let msg = sqlx_err.to_string();
                if msg.contains("duplicate key") || msg.contains("unique constraint") {
                    let friendly_msg = if msg.contains("uq_tag_name_user") {
                        "A tag with this name already exists".to_string()
                    } else {
                        msg
                    };
                    return ApiError::Conflict(friendly_msg);
                }
                ApiError::Internal(err)
            }
            _ => ApiError::Internal(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::Internal(err) => {
                error!(error = %err, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        };

        let body = Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}
