//! Route definitions for the REST API.

mod compare;
mod health;
mod query;
mod records;
mod rollback;
mod snapshots;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

/// Create the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Record mutation
        .route("/records", post(records::create_record))
        // Point-in-time reads
        .route("/query", get(query::query_records))
        // Rollback
        .route("/rollback", post(rollback::rollback))
        .route("/rollback/history", get(rollback::rollback_history))
        // Comparison
        .route("/compare", get(compare::compare_records))
        // Snapshots
        .route("/snapshots", post(snapshots::take_snapshot))
        // Attach state
        .with_state(state)
}

pub use compare::*;
pub use health::*;
pub use query::*;
pub use records::*;
pub use rollback::*;
pub use snapshots::*;
