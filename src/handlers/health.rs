use axum::extract::State;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};

/// GET /healthz and /api/healthz - Liveness plus store reachability
pub async fn health(State(state): State<AppState>) -> ApiResult<Value> {
    if let Err(e) = state.tickets.facade().ping().await {
        tracing::error!("Ticket store health check failed: {}", e);
        return Err(ApiError::service_unavailable("ticket store unavailable"));
    }
    if let Err(e) = state.users.ping().await {
        tracing::error!("User store health check failed: {}", e);
        return Err(ApiError::service_unavailable("user store unavailable"));
    }

    Ok(ApiResponse::success(json!({
        "status": "ok",
        "store": {
            "backend": state.config.database.backend.as_str(),
            "capabilities": state.tickets.facade().capabilities(),
        }
    })))
}
