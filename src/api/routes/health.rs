//! Health Routes
//!
//! Health check endpoints for monitoring and Kubernetes probes.
//!
//! - GET /health/live - Liveness probe (process is alive)
//! - GET /health/ready - Readiness probe (ready to serve traffic)
//! - GET /health - Full health status

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::api::dto::HealthResponse;
use crate::api::state::AppState;

/// GET /health/live
///
/// Kubernetes liveness probe.
/// Returns 200 if the process is alive, no dependency checks.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// GET /health/ready
///
/// Returns 200 once the store answers reads.
pub async fn readiness(State(state): State<Arc<AppState>>) -> StatusCode {
    if check_storage_health(&state) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// GET /health
///
/// Full health status with component details.
pub async fn full_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let storage_ok = check_storage_health(&state);
    let ledger = state.tracker.ledger_status();

    let scheduler = match &state.scheduler {
        Some(scheduler) if scheduler.is_running().await => "running",
        Some(_) => "stopped",
        None => "disabled",
    };

    let status = if !storage_ok {
        "unhealthy"
    } else if scheduler == "stopped" {
        "degraded"
    } else {
        "healthy"
    };

    Json(HealthResponse {
        status: status.to_string(),
        storage: if storage_ok { "ok" } else { "error" }.to_string(),
        ledger: if ledger.enabled { "enabled" } else { "disabled" }.to_string(),
        scheduler: scheduler.to_string(),
        ws_connections: state.ws_connection_count().await,
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

fn check_storage_health(state: &AppState) -> bool {
    match state.tracker.users() {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Storage health check failed");
            false
        }
    }
}
