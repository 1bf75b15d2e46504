//! Backup Routes
//!
//! - GET /api/v1/users/:id/backup - JSON backup download
//! - GET /api/v1/users/:id/export - Entries as CSV
//! - POST /api/v1/backup/restore - Restore a JSON backup (raw body)

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use std::sync::Arc;

use crate::api::error::ApiResult;
use crate::api::state::AppState;
use crate::backup::{backup_filename, entries_to_csv, BackupBundle};
use crate::tracker::RestoreSummary;

pub async fn download_backup(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> ApiResult<Response> {
    let bundle = state.tracker.create_backup(&user_id)?;
    let body = bundle.to_json()?;
    let filename = backup_filename(Utc::now().date_naive());

    tracing::info!(user_id = %user_id, entries = bundle.entries.len(), "Backup downloaded");

    Ok(attachment("application/json", &filename, body))
}

pub async fn export_csv(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> ApiResult<Response> {
    let entries = state.tracker.entries(&user_id, None)?;
    let body = entries_to_csv(&entries)?;
    let filename = format!(
        "devchain-entries-{}.csv",
        Utc::now().date_naive().format("%Y-%m-%d")
    );

    Ok(attachment("text/csv", &filename, body))
}

/// The body is the backup file as downloaded; `version` and `user` are required
pub async fn restore_backup(
    State(state): State<Arc<AppState>>,
    body: String,
) -> ApiResult<Json<RestoreSummary>> {
    let bundle = BackupBundle::from_json(&body)?;
    Ok(Json(state.tracker.restore_backup(bundle).await?))
}

fn attachment(content_type: &str, filename: &str, body: String) -> Response {
    let disposition = format!("attachment; filename=\"{}\"", filename);
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition.as_str()),
        ],
        Body::from(body),
    )
        .into_response()
}
