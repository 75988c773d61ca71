//! Health endpoint.

use axum::{response::IntoResponse, Json};
use serde_json::json;

/// Liveness probe.
pub async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
