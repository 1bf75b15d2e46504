//! Badge Routes
//!
//! - GET /api/v1/users/:id/badges - Catalog with unlock state and progress
//! - GET /api/v1/users/:id/badges/eligible - Reached but unclaimed
//! - POST /api/v1/users/:id/badges/:milestone/claim - Claim one

use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::api::dto::BadgesResponse;
use crate::api::error::ApiResult;
use crate::api::state::AppState;
use crate::model::Badge;

pub async fn list_badges(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<BadgesResponse>> {
    Ok(Json(BadgesResponse {
        badges: state.tracker.badges(&user_id)?,
        progress: state.tracker.badge_progress(&user_id)?,
    }))
}

pub async fn eligible_badges(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<Vec<Badge>>> {
    Ok(Json(state.tracker.eligible_badges(&user_id)?))
}

pub async fn claim_badge(
    State(state): State<Arc<AppState>>,
    Path((user_id, milestone)): Path<(String, u32)>,
) -> ApiResult<Json<Badge>> {
    Ok(Json(state.tracker.claim_badge(&user_id, milestone).await?))
}
