//! API Error Types
//!
//! Defines error types for the API layer and implements conversion
//! to HTTP responses with appropriate status codes.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::backup::BackupError;
use crate::ledger::LedgerError;
use crate::scheduler::SchedulerError;
use crate::storage::StorageError;
use crate::tracker::TrackerError;
use crate::validation::ValidationErrors;

/// API error types
#[derive(Error, Debug)]
pub enum ApiError {
    /// Field-level validation failed
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// Malformed request outside field validation
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Entry already anchored on the ledger
    #[error("{0}")]
    Immutable(String),

    #[error("{0}")]
    NotEligible(String),

    #[error("Too many entry writes, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Backup error: {0}")]
    Backup(#[from] BackupError),

    /// Storage layer error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Service unavailable (dependency down or disabled)
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<TrackerError> for ApiError {
    fn from(e: TrackerError) -> Self {
        match e {
            TrackerError::Validation(errors) => ApiError::Validation(errors),
            TrackerError::NotFound(what) => ApiError::NotFound(what),
            TrackerError::Conflict(what) => ApiError::Conflict(what),
            e @ TrackerError::Immutable(_) => ApiError::Immutable(e.to_string()),
            e @ TrackerError::NotEligible { .. } => ApiError::NotEligible(e.to_string()),
            TrackerError::Storage(e) => ApiError::Storage(e),
            TrackerError::Ledger(e) => ApiError::Ledger(e),
            TrackerError::Backup(e) => ApiError::Backup(e),
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        ApiError::Validation(errors)
    }
}

impl From<SchedulerError> for ApiError {
    fn from(e: SchedulerError) -> Self {
        match e {
            SchedulerError::Storage(e) => ApiError::Storage(e),
            SchedulerError::Notify(e) => ApiError::ServiceUnavailable(e.to_string()),
            SchedulerError::Config(msg) => ApiError::Internal(msg),
        }
    }
}

/// Error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
    pub request_id: String,
}

/// Error details
#[derive(Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    /// Per-field messages for validation failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<BTreeMap<String, String>>,
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            ApiError::Immutable(_) => (StatusCode::CONFLICT, "ENTRY_IMMUTABLE"),
            ApiError::NotEligible(_) => (StatusCode::CONFLICT, "BADGE_NOT_ELIGIBLE"),
            ApiError::RateLimited { .. } => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED"),
            ApiError::Ledger(e) => match e {
                LedgerError::NotFound(_) => (StatusCode::NOT_FOUND, "TRANSACTION_NOT_FOUND"),
                LedgerError::LocalTransaction(_) => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "LOCAL_TRANSACTION")
                }
                LedgerError::NotConfigured(_) => {
                    (StatusCode::SERVICE_UNAVAILABLE, "LEDGER_DISABLED")
                }
                _ => (StatusCode::BAD_GATEWAY, "LEDGER_ERROR"),
            },
            ApiError::Backup(e) => match e {
                BackupError::Csv(_) | BackupError::Serialization(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "BACKUP_ERROR")
                }
                _ => (StatusCode::BAD_REQUEST, "INVALID_BACKUP"),
            },
            ApiError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            ApiError::ServiceUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE")
            }
            ApiError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let request_id = uuid::Uuid::new_v4().to_string();

        if status.is_server_error() {
            tracing::error!(
                request_id = %request_id,
                error_code = %code,
                error_message = %self,
                "API error occurred"
            );
        } else {
            tracing::debug!(
                request_id = %request_id,
                error_code = %code,
                error_message = %self,
                "Request rejected"
            );
        }

        let fields = match &self {
            ApiError::Validation(errors) => Some(errors.fields().clone()),
            _ => None,
        };
        let retry_after = match &self {
            ApiError::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: self.to_string(),
                fields,
            },
            request_id,
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;
