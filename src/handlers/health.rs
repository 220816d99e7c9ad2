use axum::{extract::State, http::StatusCode, Json};
use tracing::{debug, error};

use crate::models::HealthResponse;
use crate::AppState;

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    debug!("Health check requested");
    Json(HealthResponse {
        status: "ok".to_string(),
        message: "Server is running".to_string(),
    })
}

/// Readiness check endpoint. Ready once the batch store answers.
pub async fn ready_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    debug!("Readiness check requested");
    match state.batches.list().await {
        Ok(_) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok".to_string(),
                message: "Service is ready".to_string(),
            }),
        ),
        Err(e) => {
            error!("Readiness check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unavailable".to_string(),
                    message: "Batch store is not reachable".to_string(),
                }),
            )
        }
    }
}
