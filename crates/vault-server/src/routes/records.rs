//! Record mutation endpoint.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::state::AppState;

/// Query parameters for creating a record version.
#[derive(Debug, Deserialize)]
pub struct CreateRecordParams {
    pub record_id: String,
    /// JSON-encoded payload; non-JSON input is stored as opaque text.
    pub data: String,
}

/// Response for creating a record version.
#[derive(Debug, Serialize)]
pub struct CreateRecordResponse {
    pub message: String,
    pub version: String,
}

/// Create the next version of a record.
/// POST /records?record_id=&data=
pub async fn create_record(
    State(state): State<AppState>,
    Query(params): Query<CreateRecordParams>,
) -> ApiResult<Json<CreateRecordResponse>> {
    let stored = state.vault.create_version(&params.record_id, &params.data)?;

    Ok(Json(CreateRecordResponse {
        message: "Record created successfully".to_string(),
        version: stored.version,
    }))
}
