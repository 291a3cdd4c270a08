use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
};
use serde_json::{json, Value};
use tracing::info;

use crate::error::AppResult;
use crate::state::AppState;

/// Health check endpoint
pub async fn health_handler(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let metrics = state.limiter.metrics();
    let timestamp = chrono::Utc::now().to_rfc3339();

    let response = json!({
        "status": "healthy",
        "timestamp": timestamp,
        "version": env!("CARGO_PKG_VERSION"),
        "model": state.config.llm.model,
        "limits": {
            "max_file_uploads": state.config.max_file_uploads,
            "max_file_size_mb": state.config.max_file_size_mb,
            "max_prompt_chars": state.config.max_prompt_chars,
            "allowed_extensions": crate::models::DocumentKind::ALLOWED_EXTENSIONS,
        },
        "rate_limiting": {
            "total_requests": metrics.total_requests,
            "rejected_requests": metrics.rejected_requests,
            "available_permits": metrics.available_permits,
            "rejection_rate": if metrics.total_requests > 0 {
                (metrics.rejected_requests as f64 / metrics.total_requests as f64 * 100.0).round() / 100.0
            } else {
                0.0
            }
        }
    });

    info!(
        available_permits = metrics.available_permits,
        "Health check completed"
    );

    Ok(Json(response))
}

/// Readiness check endpoint. Templates and the HTTP client are built
/// before the listener binds, so a running process is ready.
pub async fn ready_handler() -> StatusCode {
    StatusCode::OK
}
