//! Entry Routes
//!
//! - GET /api/v1/users/:id/entries?category=tutorial - List entries, newest first
//! - POST /api/v1/users/:id/entries - Submit an entry
//! - PUT /api/v1/users/:id/entries/:entry_id - Edit an unanchored entry
//! - DELETE /api/v1/users/:id/entries/:entry_id - Delete an unanchored entry
//! - POST /api/v1/validate/entry - Check form fields without saving
//!
//! Writes count against the per-user rate limit.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, Utc};
use std::sync::Arc;

use crate::api::dto::{EntriesQuery, ValidateEntryRequest, ValidateEntryResponse};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::model::{Category, Entry, NewEntry};
use crate::tracker::EntrySubmission;
use crate::validation::{self, ValidationErrors};

pub async fn list_entries(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(query): Query<EntriesQuery>,
) -> ApiResult<Json<Vec<Entry>>> {
    let category = match query.category.as_deref() {
        Some(raw) if !raw.is_empty() => Some(
            raw.parse::<Category>()
                .map_err(ApiError::BadRequest)?,
        ),
        _ => None,
    };

    Ok(Json(state.tracker.entries(&user_id, category)?))
}

pub async fn submit_entry(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(entry): Json<NewEntry>,
) -> ApiResult<(StatusCode, Json<EntrySubmission>)> {
    state.check_rate_limit(&user_id)?;
    let submission = state.tracker.submit_entry(&user_id, entry).await?;
    Ok((StatusCode::CREATED, Json(submission)))
}

pub async fn update_entry(
    State(state): State<Arc<AppState>>,
    Path((user_id, entry_id)): Path<(String, String)>,
    Json(entry): Json<NewEntry>,
) -> ApiResult<Json<Entry>> {
    state.check_rate_limit(&user_id)?;
    Ok(Json(
        state.tracker.update_entry(&user_id, &entry_id, entry).await?,
    ))
}

pub async fn delete_entry(
    State(state): State<Arc<AppState>>,
    Path((user_id, entry_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    state.check_rate_limit(&user_id)?;
    state.tracker.delete_entry(&user_id, &entry_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/validate/entry
///
/// Always 200; `valid` is false when any field has a message.
pub async fn validate_entry(
    Json(request): Json<ValidateEntryRequest>,
) -> Json<ValidateEntryResponse> {
    let errors = validate_form(&request, Utc::now().date_naive());
    Json(ValidateEntryResponse {
        valid: errors.is_empty(),
        errors: errors.fields().clone(),
    })
}

fn validate_form(request: &ValidateEntryRequest, today: NaiveDate) -> ValidationErrors {
    let title = validation::sanitize_input(&request.title);
    let description = validation::sanitize_input(&request.description);

    let mut errors = ValidationErrors::new();
    errors.check("title", validation::validate_title(&title));
    errors.check("description", validation::validate_description(&description));
    errors.check("category", validation::validate_category(&request.category));

    let date = match NaiveDate::parse_from_str(request.date.trim(), "%Y-%m-%d") {
        Ok(date) => validation::validate_date(date, today),
        Err(_) => Some("Please enter a valid date".to_string()),
    };
    errors.check("date", date);

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    #[test]
    fn test_validate_form_accepts_good_entry() {
        let request = ValidateEntryRequest {
            title: "Learned Rust ownership".to_string(),
            description: "Borrowing finally clicked".to_string(),
            category: "tutorial".to_string(),
            date: "2026-10-16".to_string(),
        };
        assert!(validate_form(&request, today()).is_empty());
    }

    #[test]
    fn test_validate_form_reports_each_field() {
        let request = ValidateEntryRequest {
            title: "  ".to_string(),
            description: "short".to_string(),
            category: "cooking".to_string(),
            date: "16/10/2026".to_string(),
        };
        let errors = validate_form(&request, today());

        for field in ["title", "description", "category", "date"] {
            assert!(errors.get(field).is_some(), "missing error for {}", field);
        }
    }

    #[test]
    fn test_validate_form_rejects_future_date() {
        let request = ValidateEntryRequest {
            title: "Learned Rust ownership".to_string(),
            description: "Borrowing finally clicked".to_string(),
            category: "tutorial".to_string(),
            date: "2026-10-17".to_string(),
        };
        let errors = validate_form(&request, today());
        assert_eq!(errors.fields().len(), 1);
        assert!(errors.get("date").is_some());
    }
}
