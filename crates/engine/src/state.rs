//! Per-execution mutable state.
//!
//! One [`ExecutionState`] exists per execution, owned by the registry and
//! written through an `Arc<RwLock<..>>` handle held by the executor. Steps,
//! errors, and log entries are append-only; nothing mutates an entry after
//! it is committed. `snapshot()` deep-copies under the read lock so status
//! queries never alias live state.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use weft_domain::execution::{
    ErrorRecord, ExecutionSnapshot, ExecutionStatus, LogEntry, LogLevel, StepRecord,
};

#[derive(Debug, Clone)]
pub struct ExecutionState {
    pub execution_id: Uuid,
    pub workflow_name: String,
    pub workflow_version: String,
    pub status: ExecutionStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub current_node: Option<String>,
    pub input_data: Map<String, Value>,
    pub output_data: Map<String, Value>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub steps: Vec<StepRecord>,
    pub errors: Vec<ErrorRecord>,
    pub user_id: Option<String>,
    pub correlation_id: Uuid,
    pub log_entries: Vec<LogEntry>,
    next_step_id: u32,
}

impl ExecutionState {
    pub fn new(
        workflow_name: impl Into<String>,
        workflow_version: impl Into<String>,
        input_data: Map<String, Value>,
        user_id: Option<String>,
        max_retries: u32,
    ) -> Self {
        Self {
            execution_id: Uuid::new_v4(),
            workflow_name: workflow_name.into(),
            workflow_version: workflow_version.into(),
            status: ExecutionStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            current_node: None,
            input_data,
            output_data: Map::new(),
            retry_count: 0,
            max_retries,
            steps: Vec::new(),
            errors: Vec::new(),
            user_id,
            correlation_id: Uuid::new_v4(),
            log_entries: Vec::new(),
            next_step_id: 1,
        }
    }

    // ── data access ─────────────────────────────────────────────────

    /// Resolve a dotted path against the state.
    ///
    /// `input.…` reads the immutable input map, `output.…` (or a bare
    /// path) reads the data map. The bare roots `input` and `output`
    /// return the whole map as an object.
    pub fn get(&self, path: &str) -> Option<Value> {
        let (map, rest) = match path.split_once('.') {
            Some(("input", rest)) => (&self.input_data, rest),
            Some(("output", rest)) => (&self.output_data, rest),
            None if path == "input" => return Some(Value::Object(self.input_data.clone())),
            None if path == "output" => return Some(Value::Object(self.output_data.clone())),
            Some(_) | None => (&self.output_data, path),
        };

        let mut current: &Value = map.get(rest.split('.').next()?)?;
        for segment in rest.split('.').skip(1) {
            current = current.as_object()?.get(segment)?;
        }
        Some(current.clone())
    }

    /// Write a value at a dotted path in the data map, creating
    /// intermediate objects as needed. Non-object intermediates are
    /// replaced.
    pub fn set(&mut self, path: &str, value: Value) {
        let path = path.strip_prefix("output.").unwrap_or(path);
        let mut segments = path.split('.').peekable();
        let mut map = &mut self.output_data;

        while let Some(segment) = segments.next() {
            if segments.peek().is_none() {
                map.insert(segment.to_owned(), value);
                return;
            }
            let entry = map
                .entry(segment.to_owned())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            match entry.as_object_mut() {
                Some(next) => map = next,
                None => return,
            }
        }
    }

    /// Merge an object's top-level fields into the data map.
    pub fn merge_output(&mut self, fields: Map<String, Value>) {
        for (key, value) in fields {
            self.output_data.insert(key, value);
        }
    }

    // ── provenance ──────────────────────────────────────────────────

    /// Allocate the next step id (strictly increasing from 1).
    pub fn next_step_id(&mut self) -> u32 {
        let id = self.next_step_id;
        self.next_step_id += 1;
        id
    }

    pub fn append_step(&mut self, step: StepRecord) {
        self.steps.push(step);
    }

    pub fn append_error(&mut self, error: ErrorRecord) {
        self.log_entries.push(LogEntry::new(
            LogLevel::Error,
            error.message.clone(),
            serde_json::json!({ "kind": error.kind, "node": error.node_name }),
        ));
        self.errors.push(error);
    }

    pub fn push_log(&mut self, level: LogLevel, message: impl Into<String>, data: Value) {
        self.log_entries.push(LogEntry::new(level, message, data));
    }

    /// Whether any step has already run for the named node.
    pub fn has_visited(&self, node_name: &str) -> bool {
        self.steps.iter().any(|s| s.node_name == node_name)
    }

    // ── retry ───────────────────────────────────────────────────────

    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }

    pub fn increment_retry(&mut self) -> u32 {
        self.retry_count += 1;
        self.push_log(
            LogLevel::Info,
            format!("retry attempt {}/{}", self.retry_count, self.max_retries),
            serde_json::json!({ "retry_count": self.retry_count }),
        );
        self.retry_count
    }

    // ── lifecycle ───────────────────────────────────────────────────

    pub fn mark_running(&mut self, entry_point: &str) {
        self.status = ExecutionStatus::Running;
        self.started_at = Some(Utc::now());
        self.current_node = Some(entry_point.to_owned());
    }

    /// Transition to a terminal status. Idempotent against double
    /// finalization: the first terminal status wins.
    pub fn finalize(&mut self, status: ExecutionStatus) {
        if self.status.is_terminal() {
            return;
        }
        self.status = status;
        self.completed_at = Some(Utc::now());
        if status == ExecutionStatus::Completed {
            self.current_node = None;
        }
    }

    // ── snapshot ────────────────────────────────────────────────────

    /// Deep copy for external callers; never aliases live state.
    pub fn snapshot(&self) -> ExecutionSnapshot {
        ExecutionSnapshot {
            execution_id: self.execution_id,
            workflow_name: self.workflow_name.clone(),
            workflow_version: self.workflow_version.clone(),
            status: self.status,
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            current_node: self.current_node.clone(),
            input_data: self.input_data.clone(),
            output_data: self.output_data.clone(),
            retry_count: self.retry_count,
            max_retries: self.max_retries,
            steps: self.steps.clone(),
            errors: self.errors.clone(),
            user_id: self.user_id.clone(),
            correlation_id: self.correlation_id,
            log_entries: self.log_entries.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use weft_domain::error::ErrorKind;

    fn state() -> ExecutionState {
        let input = json!({"document_id": "doc_1", "options": {"deep": true}})
            .as_object()
            .unwrap()
            .clone();
        ExecutionState::new("document_analysis", "1.0.0", input, None, 3)
    }

    // ── get / set ───────────────────────────────────────────────────

    #[test]
    fn get_reads_input_and_output_prefixes() {
        let mut s = state();
        s.set("summary", json!("fine"));

        assert_eq!(s.get("input.document_id"), Some(json!("doc_1")));
        assert_eq!(s.get("input.options.deep"), Some(json!(true)));
        assert_eq!(s.get("output.summary"), Some(json!("fine")));
        assert_eq!(s.get("summary"), Some(json!("fine")));
        assert_eq!(s.get("input.missing"), None);
        assert_eq!(s.get("output.missing.deeper"), None);
    }

    #[test]
    fn bare_roots_return_whole_maps() {
        let mut s = state();
        s.set("x", json!(1));
        assert_eq!(
            s.get("output"),
            Some(json!({"x": 1}))
        );
        assert_eq!(
            s.get("input"),
            Some(json!({"document_id": "doc_1", "options": {"deep": true}}))
        );
    }

    #[test]
    fn set_creates_intermediate_objects() {
        let mut s = state();
        s.set("report.sections.intro", json!("hello"));
        assert_eq!(s.get("report.sections.intro"), Some(json!("hello")));

        // Overwriting a scalar intermediate replaces it with an object.
        s.set("leaf", json!(1));
        s.set("leaf.inner", json!(2));
        assert_eq!(s.get("leaf.inner"), Some(json!(2)));
    }

    #[test]
    fn set_strips_output_prefix() {
        let mut s = state();
        s.set("output.summary", json!("s"));
        assert_eq!(s.get("summary"), Some(json!("s")));
    }

    #[test]
    fn merge_output_lands_at_root() {
        let mut s = state();
        s.merge_output(
            json!({"summary": "s", "key_concepts": ["a"]})
                .as_object()
                .unwrap()
                .clone(),
        );
        assert_eq!(s.get("summary"), Some(json!("s")));
        assert_eq!(s.get("key_concepts"), Some(json!(["a"])));
    }

    // ── provenance ──────────────────────────────────────────────────

    #[test]
    fn step_ids_increase_from_one() {
        let mut s = state();
        assert_eq!(s.next_step_id(), 1);
        assert_eq!(s.next_step_id(), 2);
        assert_eq!(s.next_step_id(), 3);
    }

    #[test]
    fn append_error_also_logs() {
        let mut s = state();
        s.append_error(
            ErrorRecord::new(ErrorKind::ToolHttp, "connection refused").at_node("analyze"),
        );
        assert_eq!(s.errors.len(), 1);
        assert_eq!(s.log_entries.len(), 1);
        assert_eq!(s.log_entries[0].level, LogLevel::Error);
    }

    // ── retry ───────────────────────────────────────────────────────

    #[test]
    fn retry_counter_and_budget() {
        let mut s = state();
        assert!(s.can_retry());
        assert_eq!(s.increment_retry(), 1);
        assert_eq!(s.increment_retry(), 2);
        assert_eq!(s.increment_retry(), 3);
        assert!(!s.can_retry());
        // Each increment leaves an audit log entry.
        assert_eq!(s.log_entries.len(), 3);
    }

    // ── lifecycle / snapshot ────────────────────────────────────────

    #[test]
    fn finalize_is_idempotent() {
        let mut s = state();
        s.mark_running("fetch_document");
        s.finalize(ExecutionStatus::Failed);
        let completed_at = s.completed_at;

        s.finalize(ExecutionStatus::Completed);
        assert_eq!(s.status, ExecutionStatus::Failed);
        assert_eq!(s.completed_at, completed_at);
    }

    #[test]
    fn completion_clears_current_node() {
        let mut s = state();
        s.mark_running("fetch_document");
        assert_eq!(s.current_node.as_deref(), Some("fetch_document"));
        s.finalize(ExecutionStatus::Completed);
        assert_eq!(s.current_node, None);
    }

    #[test]
    fn failure_keeps_current_node() {
        let mut s = state();
        s.mark_running("fetch_document");
        s.current_node = Some("store_results".into());
        s.finalize(ExecutionStatus::Cancelled);
        assert_eq!(s.current_node.as_deref(), Some("store_results"));
    }

    #[test]
    fn snapshot_is_a_deep_copy() {
        let mut s = state();
        s.set("summary", json!("v1"));
        let snap = s.snapshot();
        s.set("summary", json!("v2"));

        assert_eq!(snap.output_data.get("summary"), Some(&json!("v1")));
        assert_eq!(s.get("summary"), Some(json!("v2")));
    }
}
