//! Workflow submission endpoints.
//!
//! - `POST /workflows/execute`       — submit an inline definition (202)
//! - `POST /workflows/from-template` — submit from a named template (201)
//! - `GET  /workflows/templates`     — list the template library

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use serde_json::{Map, Value};

use weft_domain::workflow::WorkflowDefinition;
use weft_engine::{compile, SubmitOptions};

use super::error::error_response;
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request shapes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct ExecuteInlineRequest {
    pub definition: WorkflowDefinition,
    #[serde(default)]
    pub input: Map<String, Value>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub deadline_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct ExecuteTemplateRequest {
    pub template: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub deadline_ms: Option<u64>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /workflows/execute
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn execute_inline(
    State(state): State<AppState>,
    Json(body): Json<ExecuteInlineRequest>,
) -> impl IntoResponse {
    let compiled = match compile(&body.definition, &state.conditions) {
        Ok(compiled) => Arc::new(compiled),
        Err(err) => return error_response(&err, None),
    };

    let options = SubmitOptions {
        user_id: body.user_id,
        max_retries: body.max_retries,
        deadline_ms: body.deadline_ms,
    };

    match state.executions.submit(compiled, body.input, options) {
        Ok(execution_id) => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({ "execution_id": execution_id })),
        )
            .into_response(),
        Err(err) => error_response(&err, None),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /workflows/from-template
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn execute_from_template(
    State(state): State<AppState>,
    Json(body): Json<ExecuteTemplateRequest>,
) -> impl IntoResponse {
    let (compiled, input) = match state.templates.instantiate(&body.template, &body.parameters) {
        Ok(instantiated) => instantiated,
        Err(err) => return error_response(&err, None),
    };

    let options = SubmitOptions {
        user_id: body.user_id,
        max_retries: body.max_retries,
        deadline_ms: body.deadline_ms,
    };

    match state.executions.submit(compiled, input, options) {
        Ok(execution_id) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "execution_id": execution_id })),
        )
            .into_response(),
        Err(err) => error_response(&err, None),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /workflows/templates
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn list_templates(State(state): State<AppState>) -> impl IntoResponse {
    let templates = state.templates.list();
    Json(serde_json::json!({ "templates": templates }))
}
