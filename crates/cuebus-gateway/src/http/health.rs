use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

/// GET /health — liveness probe, returns server metadata.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let snapshot = state.engine.state();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "groups": snapshot.groups.len(),
        "targets": snapshot.targets.len(),
        "ws_clients": state.ws_clients.len(),
        "subscribers": state.engine.subscriber_count(),
        "iteration_mode": state.config.scheduler.iteration,
    }))
}
