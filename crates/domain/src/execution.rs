//! Execution records — status, per-step provenance, and the snapshot shape
//! returned to callers.
//!
//! Step and error records are append-only: the executor appends, nothing
//! mutates an entry once committed. The snapshot is a deep copy; live state
//! is never aliased out of the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ErrorKind;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Execution status
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    Timeout,
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled | Self::Timeout
        )
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Step records
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    ToolCall,
    Composite,
    ConditionalRouter,
    Retry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Success,
    Error,
    Skipped,
}

/// Snapshot of one tool invocation inside a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub service: String,
    pub tool: String,
    pub request_snapshot: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_snapshot: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Strictly increasing, starting at 1.
    pub step_id: u32,
    pub node_name: String,
    pub kind: StepKind,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: StepOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_invocation: Option<ToolInvocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Branch label chosen by a conditional edge, when one applied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Error records
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caused_by: Option<Box<ErrorRecord>>,
    pub occurred_at: DateTime<Utc>,
}

impl ErrorRecord {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            node_name: None,
            message: message.into(),
            caused_by: None,
            occurred_at: Utc::now(),
        }
    }

    pub fn at_node(mut self, node_name: impl Into<String>) -> Self {
        self.node_name = Some(node_name.into());
        self
    }

    pub fn caused_by(mut self, cause: ErrorRecord) -> Self {
        self.caused_by = Some(Box::new(cause));
        self
    }
}

impl From<&crate::error::Error> for ErrorRecord {
    fn from(err: &crate::error::Error) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Log entries
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// One entry in the execution's in-record audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            level,
            message: message.into(),
            data,
            timestamp: Utc::now(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Snapshot
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Deep copy of an execution record, as returned to external callers and
/// written by the persistence sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSnapshot {
    pub execution_id: Uuid,
    pub workflow_name: String,
    pub workflow_version: String,
    pub status: ExecutionStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub current_node: Option<String>,
    pub input_data: serde_json::Map<String, serde_json::Value>,
    pub output_data: serde_json::Map<String, serde_json::Value>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub steps: Vec<StepRecord>,
    pub errors: Vec<ErrorRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub correlation_id: Uuid,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub log_entries: Vec<LogEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── ExecutionStatus ─────────────────────────────────────────────

    #[test]
    fn status_is_terminal() {
        assert!(!ExecutionStatus::Pending.is_terminal());
        assert!(!ExecutionStatus::Running.is_terminal());
        assert!(ExecutionStatus::Completed.is_terminal());
        assert!(ExecutionStatus::Failed.is_terminal());
        assert!(ExecutionStatus::Cancelled.is_terminal());
        assert!(ExecutionStatus::Timeout.is_terminal());
    }

    #[test]
    fn status_snake_case_serialization() {
        assert_eq!(
            serde_json::to_string(&ExecutionStatus::Cancelled).unwrap(),
            "\"cancelled\""
        );
        assert_eq!(
            serde_json::to_string(&ExecutionStatus::Timeout).unwrap(),
            "\"timeout\""
        );
    }

    // ── StepRecord ──────────────────────────────────────────────────

    #[test]
    fn step_kind_serialization() {
        assert_eq!(
            serde_json::to_string(&StepKind::ConditionalRouter).unwrap(),
            "\"conditional_router\""
        );
        assert_eq!(serde_json::to_string(&StepKind::Retry).unwrap(), "\"retry\"");
    }

    #[test]
    fn step_record_omits_empty_optionals() {
        let step = StepRecord {
            step_id: 1,
            node_name: "fetch_document".into(),
            kind: StepKind::ToolCall,
            started_at: Utc::now(),
            finished_at: Utc::now(),
            outcome: StepOutcome::Success,
            tool_invocation: None,
            error_message: None,
            branch: None,
        };
        let json = serde_json::to_value(&step).unwrap();
        assert!(json.get("tool_invocation").is_none());
        assert!(json.get("error_message").is_none());
        assert!(json.get("branch").is_none());
    }

    // ── ErrorRecord ─────────────────────────────────────────────────

    #[test]
    fn error_record_nesting() {
        let inner = ErrorRecord::new(ErrorKind::ToolHttp, "connection refused");
        let outer = ErrorRecord::new(ErrorKind::NodeException, "analyze failed")
            .at_node("analyze_document")
            .caused_by(inner);

        let json = serde_json::to_value(&outer).unwrap();
        assert_eq!(json["kind"], "node_exception");
        assert_eq!(json["node_name"], "analyze_document");
        assert_eq!(json["caused_by"]["kind"], "tool_http");
    }

    // ── Snapshot ────────────────────────────────────────────────────

    #[test]
    fn snapshot_roundtrip() {
        let snapshot = ExecutionSnapshot {
            execution_id: Uuid::new_v4(),
            workflow_name: "document_analysis".into(),
            workflow_version: "1.0.0".into(),
            status: ExecutionStatus::Completed,
            created_at: Utc::now(),
            started_at: Some(Utc::now()),
            completed_at: Some(Utc::now()),
            current_node: None,
            input_data: serde_json::Map::new(),
            output_data: serde_json::Map::new(),
            retry_count: 0,
            max_retries: 3,
            steps: vec![],
            errors: vec![],
            user_id: None,
            correlation_id: Uuid::new_v4(),
            log_entries: vec![],
        };
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: ExecutionSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }

    #[test]
    fn snapshot_nullable_fields_serialize_as_null() {
        let snapshot = ExecutionSnapshot {
            execution_id: Uuid::nil(),
            workflow_name: "w".into(),
            workflow_version: "1.0.0".into(),
            status: ExecutionStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            current_node: None,
            input_data: serde_json::Map::new(),
            output_data: serde_json::Map::new(),
            retry_count: 0,
            max_retries: 3,
            steps: vec![],
            errors: vec![],
            user_id: None,
            correlation_id: Uuid::nil(),
            log_entries: vec![],
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert!(json["started_at"].is_null());
        assert!(json["completed_at"].is_null());
        assert!(json["current_node"].is_null());
    }
}
