//! Shared application state handed to every API handler.

use std::sync::Arc;
use std::time::Instant;

use weft_domain::config::Config;
use weft_engine::{ConditionRegistry, ExecutionRegistry, TemplateLibrary};
use weft_tools::ToolRegistry;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub tools: Arc<ToolRegistry>,
    pub conditions: Arc<ConditionRegistry>,
    pub templates: Arc<TemplateLibrary>,
    pub executions: Arc<ExecutionRegistry>,
    pub started_at: Instant,
}

impl AppState {
    pub fn uptime_s(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
