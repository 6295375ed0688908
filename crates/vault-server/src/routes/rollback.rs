//! Rollback endpoints.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use vault_core::{time, RollbackLogEntry};

use crate::error::ApiResult;
use crate::state::AppState;

/// Request body for a rollback.
#[derive(Debug, Deserialize)]
pub struct RollbackRequest {
    pub timestamp: String,
}

/// Response for a rollback.
#[derive(Debug, Serialize)]
pub struct RollbackResponse {
    pub message: String,
    pub timestamp: String,
    pub affected_records: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollback_log: Option<RollbackLogEntry>,
}

/// Roll the record set back to a timestamp.
/// POST /rollback
pub async fn rollback(
    State(state): State<AppState>,
    Json(request): Json<RollbackRequest>,
) -> ApiResult<Json<RollbackResponse>> {
    let target = time::parse_timestamp(&request.timestamp)?;
    let summary = state.vault.rollback(target)?;

    Ok(Json(RollbackResponse {
        message: summary.message,
        timestamp: summary.target_timestamp.to_rfc3339(),
        affected_records: summary.affected_count,
        rollback_log: summary.log_entry,
    }))
}

/// Query parameters for rollback history.
#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<usize>,
}

/// Rollback audit entries, newest first.
/// GET /rollback/history?limit=
pub async fn rollback_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> ApiResult<Json<Vec<RollbackLogEntry>>> {
    let limit = params.limit.unwrap_or(10);
    let entries = state.vault.rollback_history(limit)?;
    Ok(Json(entries))
}
