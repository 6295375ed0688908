//! Record comparison endpoint.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use vault_core::{time, CompareResult};

use crate::error::ApiResult;
use crate::state::AppState;

/// Query parameters for comparison.
#[derive(Debug, Deserialize)]
pub struct CompareParams {
    pub record_id: String,
    /// Defaults to the record's first known timestamp.
    pub start: Option<String>,
    /// Defaults to the record's last known timestamp.
    pub end: Option<String>,
}

/// Compare a record between two points in time.
/// GET /compare?record_id=&start=&end=
pub async fn compare_records(
    State(state): State<AppState>,
    Query(params): Query<CompareParams>,
) -> ApiResult<Json<CompareResult>> {
    let start = params
        .start
        .as_deref()
        .map(time::parse_timestamp)
        .transpose()?;
    let end = params
        .end
        .as_deref()
        .map(time::parse_timestamp)
        .transpose()?;

    let result = state.vault.compare(&params.record_id, start, end)?;
    Ok(Json(result))
}
