//! Execution query and control endpoints.
//!
//! - `GET  /executions`             — recent executions (limit 1–100, status filter)
//! - `GET  /executions/:id`         — full snapshot
//! - `POST /executions/:id/cancel`  — set the cancel signal
//! - `GET  /executions/:id/trace`   — steps and errors only

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use uuid::Uuid;

use weft_domain::execution::ExecutionStatus;
use weft_domain::Error;

use super::error::error_response;
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Query shapes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct ListExecutionsQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub status: Option<String>,
}

fn default_limit() -> usize {
    20
}

/// Clamp the caller's limit into the documented 1–100 window.
pub fn clamp_limit(limit: usize) -> usize {
    limit.clamp(1, 100)
}

pub fn parse_status(s: &str) -> Option<ExecutionStatus> {
    match s {
        "pending" => Some(ExecutionStatus::Pending),
        "running" => Some(ExecutionStatus::Running),
        "completed" => Some(ExecutionStatus::Completed),
        "failed" => Some(ExecutionStatus::Failed),
        "cancelled" => Some(ExecutionStatus::Cancelled),
        "timeout" => Some(ExecutionStatus::Timeout),
        _ => None,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /executions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn list_executions(
    State(state): State<AppState>,
    Query(query): Query<ListExecutionsQuery>,
) -> impl IntoResponse {
    let status = match &query.status {
        Some(raw) => match parse_status(raw) {
            Some(status) => Some(status),
            None => {
                return error_response(
                    &Error::Validation(format!("unknown status filter `{raw}`")),
                    None,
                );
            }
        },
        None => None,
    };

    let limit = clamp_limit(query.limit);
    let executions = state.executions.list_recent(limit, status);
    let count = executions.len();

    Json(serde_json::json!({
        "executions": executions,
        "count": count,
        "limit": limit,
    }))
    .into_response()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /executions/:id
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn get_execution(
    State(state): State<AppState>,
    Path(execution_id): Path<Uuid>,
) -> impl IntoResponse {
    match state.executions.get(execution_id) {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(err) => error_response(&err, Some(execution_id)),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /executions/:id/cancel
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn cancel_execution(
    State(state): State<AppState>,
    Path(execution_id): Path<Uuid>,
) -> impl IntoResponse {
    match state.executions.cancel(execution_id) {
        Ok(()) => Json(serde_json::json!({
            "execution_id": execution_id,
            "cancelled": true,
        }))
        .into_response(),
        Err(err) => error_response(&err, Some(execution_id)),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /executions/:id/trace
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn get_trace(
    State(state): State<AppState>,
    Path(execution_id): Path<Uuid>,
) -> impl IntoResponse {
    match state.executions.get(execution_id) {
        Ok(snapshot) => Json(serde_json::json!({
            "execution_id": snapshot.execution_id,
            "workflow_name": snapshot.workflow_name,
            "status": snapshot.status,
            "steps": snapshot.steps,
            "errors": snapshot.errors,
        }))
        .into_response(),
        Err(err) => error_response(&err, Some(execution_id)),
    }
}
