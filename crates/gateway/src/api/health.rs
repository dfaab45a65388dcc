//! Health probe.

use axum::extract::State;
use axum::response::{IntoResponse, Json};

use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "weft-orchestrator",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_s": state.uptime_s(),
        "tools": state.tools.len(),
        "templates": state.templates.len(),
        "active_executions": state.executions.active_count(),
    }))
}
