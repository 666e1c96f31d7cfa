//! Response construction.
//!
//! Every outcome of a lookup maps to exactly one response shape here.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub const NO_MATCH_MESSAGE: &str = "could not match host to any redirection rule";

/// 404 with a JSON message body.
pub fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "message": NO_MATCH_MESSAGE }))).into_response()
}

/// 401 carrying a Basic challenge.
pub fn unauthorized(challenge: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, challenge.to_string())],
        "Unauthorized",
    )
        .into_response()
}

/// 307 or 308 to `location`.
pub fn redirect(status: StatusCode, location: &str) -> Response {
    (status, [(header::LOCATION, location.to_string())]).into_response()
}

/// 503 while the config manager is shutting down.
pub fn unavailable() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({ "message": "server is shutting down" })),
    )
        .into_response()
}
