//! Detection Status Route

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::runtime::StatusSnapshot;
use crate::AppState;

/// Current detection state, status line and session counters
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusSnapshot> {
    Json(state.runtime.read().await.snapshot())
}
