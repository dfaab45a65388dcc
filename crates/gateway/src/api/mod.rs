pub mod error;
pub mod executions;
pub mod health;
pub mod workflows;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// The fixed route table.
pub fn router() -> Router<AppState> {
    Router::new()
        // Workflows
        .route("/workflows/execute", post(workflows::execute_inline))
        .route("/workflows/from-template", post(workflows::execute_from_template))
        .route("/workflows/templates", get(workflows::list_templates))
        // Executions
        .route("/executions", get(executions::list_executions))
        .route("/executions/:id", get(executions::get_execution))
        .route("/executions/:id/cancel", post(executions::cancel_execution))
        .route("/executions/:id/trace", get(executions::get_trace))
        // Health
        .route("/health", get(health::health))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
