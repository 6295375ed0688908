//! Point-in-time read endpoints.

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use vault_core::{time, RecordVersion};

use crate::error::ApiResult;
use crate::state::AppState;

/// Query parameters for as-of reads.
#[derive(Debug, Deserialize)]
pub struct QueryParams {
    /// Omitted: list every record as of `timestamp`.
    pub record_id: Option<String>,
    pub timestamp: String,
}

/// Bulk listing response.
#[derive(Debug, Serialize)]
pub struct QueryAllResponse {
    pub timestamp: String,
    pub records: Vec<RecordVersion>,
}

/// Resolve record state as of a timestamp.
/// GET /query?record_id=&timestamp=
///
/// With `record_id`, responds with the single resolved version (404
/// `Record not found` when none qualifies). Without it, responds with
/// every record's resolved state as of the timestamp.
pub async fn query_records(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Response> {
    let as_of = time::parse_timestamp(&params.timestamp)?;

    match params.record_id {
        Some(record_id) => {
            let resolved = state.vault.query_record(&record_id, as_of)?;
            Ok(Json(resolved).into_response())
        }
        None => {
            let records = state.vault.query_all(as_of)?;
            Ok(Json(QueryAllResponse {
                timestamp: as_of.to_rfc3339(),
                records,
            })
            .into_response())
        }
    }
}
