//! Scheduler Routes
//!
//! - POST /api/v1/scheduler/run - Run one reminder/digest pass now

use axum::{extract::State, Json};
use chrono::Utc;
use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::scheduler::TickReport;

pub async fn run_now(State(state): State<Arc<AppState>>) -> ApiResult<Json<TickReport>> {
    let scheduler = state
        .scheduler
        .as_ref()
        .ok_or_else(|| ApiError::ServiceUnavailable("Scheduler is disabled".to_string()))?;

    Ok(Json(scheduler.tick(Utc::now()).await?))
}
