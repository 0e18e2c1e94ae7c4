pub mod credits;
pub mod status;
pub mod webhooks;

pub use credits::*;
pub use status::*;
pub use webhooks::*;

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use tracing::error;

use crate::error::LedgerError;

/// Standard `{"error": message}` response
pub fn json_error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// Map a JSON body rejection to a 400. An unreadable body gets
/// `empty_message`; a readable one with the wrong shape gets the
/// deserializer's explanation.
pub fn body_rejection(rejection: JsonRejection, empty_message: &str) -> Response {
    match rejection {
        JsonRejection::JsonDataError(e) => {
            json_error(StatusCode::BAD_REQUEST, &e.body_text())
        }
        _ => json_error(StatusCode::BAD_REQUEST, empty_message),
    }
}

impl IntoResponse for LedgerError {
    fn into_response(self) -> Response {
        match self {
            LedgerError::Validation(message) => {
                json_error(StatusCode::BAD_REQUEST, &message)
            }
            LedgerError::NotFound(_) => {
                json_error(StatusCode::NOT_FOUND, "User not found")
            }
            LedgerError::Conflict(user_id) => (
                StatusCode::CONFLICT,
                Json(json!({
                    "error": "User already exists",
                    "user_id": user_id.to_string(),
                })),
            )
                .into_response(),
            LedgerError::InsufficientCredits {
                available,
                requested,
            } => (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": "Insufficient credits",
                    "available_credits": available,
                    "requested_credits": requested,
                })),
            )
                .into_response(),
            e @ (LedgerError::DuplicateEvent(_)
            | LedgerError::MalformedEnvelope(_)
            | LedgerError::Internal(_)) => {
                error!(error = ?e, "Internal error");
                json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}
