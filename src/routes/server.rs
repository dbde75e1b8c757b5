//! Routes serving information about the server itself

use crate::config::VERSION;
use axum::Json;
use serde::Serialize;

/// Response detailing the liveness of this server
#[derive(Serialize)]
pub struct HealthResponse {
    /// Fixed "ok" marker
    status: &'static str,
    /// The server version
    version: &'static str,
}

/// GET /api/v1/health
///
/// Liveness probe used by deployment tooling
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: VERSION,
    })
}
