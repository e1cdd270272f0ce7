use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

/// GET /healthz — liveness probe. Spec requires only a 200 while the
/// process is up; we additionally surface the Coordinator's mode since the
/// teacher's `/health` handler similarly reports subsystem status rather
/// than a bare 200.
pub async fn healthz_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "coordinator_distributed": state.coordinator.is_distributed(),
        "active_calls": state.active_calls.len(),
    }))
}
