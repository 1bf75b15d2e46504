//! User and Session Routes
//!
//! - POST /api/v1/users - Register
//! - GET /api/v1/users/:id - Fetch a user
//! - GET /api/v1/users/:id/stats - Learning stats
//! - POST /api/v1/session - Sign in by email
//! - GET /api/v1/session - Current user
//! - DELETE /api/v1/session - Sign out

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::api::dto::{RegisterRequest, SessionResponse, SignInRequest};
use crate::api::error::ApiResult;
use crate::api::state::AppState;
use crate::model::User;
use crate::stats::UserStats;

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let user = state
        .tracker
        .register_user(&request.username, &request.email)
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<User>> {
    Ok(Json(state.tracker.user(&user_id)?))
}

pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<UserStats>> {
    Ok(Json(state.tracker.stats(&user_id)?))
}

pub async fn sign_in(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SignInRequest>,
) -> ApiResult<Json<SessionResponse>> {
    let user = state.tracker.sign_in(&request.email).await?;
    Ok(Json(SessionResponse { user: Some(user) }))
}

pub async fn current_session(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<SessionResponse>> {
    Ok(Json(SessionResponse {
        user: state.tracker.current_user()?,
    }))
}

pub async fn sign_out(State(state): State<Arc<AppState>>) -> ApiResult<StatusCode> {
    state.tracker.sign_out()?;
    Ok(StatusCode::NO_CONTENT)
}
