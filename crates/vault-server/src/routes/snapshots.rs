//! Snapshot endpoint.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::error::ApiResult;
use crate::state::AppState;

/// Response for taking a snapshot.
#[derive(Debug, Serialize)]
pub struct SnapshotResponse {
    pub snapshot_id: String,
    pub timestamp: String,
    pub record_count: usize,
}

/// Materialize a snapshot of the full record set as of now.
/// POST /snapshots
pub async fn take_snapshot(State(state): State<AppState>) -> ApiResult<Json<SnapshotResponse>> {
    let snapshot = state.vault.take_snapshot()?;

    Ok(Json(SnapshotResponse {
        snapshot_id: snapshot.snapshot_id.to_string(),
        timestamp: snapshot.timestamp.to_rfc3339(),
        record_count: snapshot.records.len(),
    }))
}
