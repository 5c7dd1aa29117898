// Liveness and storage health

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::app::AppState;

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let storage_healthy = state.store.health_check().await;

    let response = json!({
        "status": if storage_healthy { "healthy" } else { "degraded" },
        "service": "referral-service",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "components": {
            "storage": {
                "backend": state.config.storage_backend.to_string(),
                "status": if storage_healthy { "healthy" } else { "unhealthy" }
            }
        }
    });

    if storage_healthy {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}
