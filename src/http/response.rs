//! Responses produced by the gateway itself.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Served for any request that does not resolve to a running event.
pub async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Event not found").into_response()
}
