use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

use super::AppState;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};

pub fn routes() -> Router<AppState> {
    Router::new().route("/", get(root)).route("/health", get(health))
}

/// GET / - service banner
async fn root() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": "InfoLine API",
            "version": env!("CARGO_PKG_VERSION"),
            "endpoints": {
                "public": ["/", "/health"],
                "protected": [
                    "/api/auth/whoami",
                    "/api/regions", "/api/sectors", "/api/schools",
                    "/api/categories", "/api/profiles", "/api/forms",
                    "/api/notifications", "/api/statistics/forms", "/api/reports"
                ]
            }
        }
    }))
}

/// GET /health - backend reachability
async fn health(State(state): State<AppState>) -> ApiResult<Value> {
    state.store.health_check().await.map_err(|e| {
        tracing::warn!("Health check failed: {}", e);
        ApiError::service_unavailable("Storage unavailable")
    })?;
    Ok(ApiResponse::success(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })))
}
