use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::error::BrokerError;

/// Maps `BrokerError` onto the status codes spec.md §6/§7 fix. The façade
/// never invents new error semantics here, only a wire encoding of the
/// four kinds the core already defines.
impl IntoResponse for BrokerError {
    fn into_response(self) -> Response {
        match &self {
            BrokerError::MalformedRequest(msg) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response()
            }
            BrokerError::NotFound => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "job not found" })),
            )
                .into_response(),
            BrokerError::Conflict(reason) => (
                StatusCode::CONFLICT,
                Json(json!({ "error": reason })),
            )
                .into_response(),
            BrokerError::NoJobAvailable => StatusCode::NO_CONTENT.into_response(),
        }
    }
}
