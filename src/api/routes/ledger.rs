//! Ledger Routes
//!
//! - GET /api/v1/ledger/status - Network and fallback settings
//! - GET /api/v1/ledger/transactions/:id - Look a transaction up on the mirror node

use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::api::error::ApiResult;
use crate::api::state::AppState;
use crate::ledger::{LedgerStatus, TransactionStatus};

pub async fn ledger_status(State(state): State<Arc<AppState>>) -> Json<LedgerStatus> {
    Json(state.tracker.ledger_status())
}

pub async fn verify_transaction(
    State(state): State<Arc<AppState>>,
    Path(transaction_id): Path<String>,
) -> ApiResult<Json<TransactionStatus>> {
    Ok(Json(state.tracker.verify_transaction(&transaction_id).await?))
}
