//! HTTP handlers.

use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub backend: &'static str,
    /// Bulk deletes recorded in the registry and not yet finished.
    pub pending_deletes: usize,
}

/// Health check endpoint for load balancers and probes.
///
/// Reports 503 when the object store or the pending-delete registry cannot be
/// read.
pub async fn health_check(State(state): State<AppState>) -> Response {
    if let Err(e) = state.storage.health_check().await {
        tracing::warn!(error = %e, "storage health check failed");
        return unavailable("storage unreachable");
    }

    match state.blobstore.registry().entries().await {
        Ok(entries) => Json(HealthResponse {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
            backend: state.storage.backend_name(),
            pending_deletes: entries.len(),
        })
        .into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "failed to read pending deletes");
            unavailable("pending delete registry unreadable")
        }
    }
}

fn unavailable(reason: &'static str) -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(serde_json::json!({ "status": "unavailable", "reason": reason })),
    )
        .into_response()
}
