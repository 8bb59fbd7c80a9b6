//! Health check endpoint

use axum::Json;

use crate::dto::HealthResponse;

/// GET /health - liveness and version
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}
