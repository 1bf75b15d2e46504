//! Settings and Profile Routes
//!
//! - GET/PUT /api/v1/users/:id/settings
//! - GET/PUT /api/v1/users/:id/profile

use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::api::error::ApiResult;
use crate::api::state::AppState;
use crate::model::{Profile, Settings};

pub async fn get_settings(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<Settings>> {
    Ok(Json(state.tracker.settings(&user_id)?))
}

pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(settings): Json<Settings>,
) -> ApiResult<Json<Settings>> {
    Ok(Json(state.tracker.update_settings(&user_id, settings).await?))
}

pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<Profile>> {
    Ok(Json(state.tracker.profile(&user_id)?))
}

pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(profile): Json<Profile>,
) -> ApiResult<Json<Profile>> {
    Ok(Json(state.tracker.update_profile(&user_id, profile).await?))
}
