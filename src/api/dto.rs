//! Data Transfer Objects
//!
//! Request and response types for the API endpoints that are not
//! domain types already.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::badges::BadgeProgress;
use crate::model::{Badge, User};

// ============================================
// USER DTOs
// ============================================

#[derive(Debug, Deserialize, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SignInRequest {
    pub email: String,
}

/// Signed-in user, if any
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub user: Option<User>,
}

// ============================================
// ENTRY DTOs
// ============================================

/// Query string for listing entries
#[derive(Debug, Default, Deserialize)]
pub struct EntriesQuery {
    /// Only entries in this category
    #[serde(default)]
    pub category: Option<String>,
}

/// Raw form fields for pre-submit validation.
/// Everything is a string so malformed values come back as field errors.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ValidateEntryRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    /// `YYYY-MM-DD`
    #[serde(default)]
    pub date: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ValidateEntryResponse {
    pub valid: bool,
    pub errors: BTreeMap<String, String>,
}

// ============================================
// BADGE DTOs
// ============================================

#[derive(Debug, Serialize)]
pub struct BadgesResponse {
    pub badges: Vec<Badge>,
    pub progress: BadgeProgress,
}

// ============================================
// HEALTH DTOs
// ============================================

/// Full health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall status: "healthy", "degraded", or "unhealthy"
    pub status: String,
    pub storage: String,
    /// "enabled" or "disabled"
    pub ledger: String,
    pub scheduler: String,
    pub ws_connections: usize,
    pub uptime_seconds: u64,
    pub version: String,
}
