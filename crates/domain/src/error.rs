//! Shared error type used across all weft crates.
//!
//! Every failure the engine can surface maps onto a stable, user-visible
//! [`ErrorKind`]. Transport-level failures are wrapped into these kinds at
//! the service-client boundary so the executor only ever sees engine-native
//! error values.

use serde::{Deserialize, Serialize};

/// Stable error-kind tags, surfaced on the wire as `error.kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    UnknownTemplate,
    UnknownTool,
    UnknownNode,
    UnknownCondition,
    DuplicateTool,
    InvalidDescriptor,
    InvalidParameterSchema,
    CapacityExceeded,
    ToolHttp,
    ToolTimeout,
    #[serde(rename = "tool_non_2xx")]
    ToolNon2xx,
    NodeException,
    Cancelled,
    Timeout,
    InfiniteLoop,
    UnreachableNodes,
    AmbiguousTransition,
    NotFound,
    AlreadyTerminal,
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::UnknownTemplate => "unknown_template",
            Self::UnknownTool => "unknown_tool",
            Self::UnknownNode => "unknown_node",
            Self::UnknownCondition => "unknown_condition",
            Self::DuplicateTool => "duplicate_tool",
            Self::InvalidDescriptor => "invalid_descriptor",
            Self::InvalidParameterSchema => "invalid_parameter_schema",
            Self::CapacityExceeded => "capacity_exceeded",
            Self::ToolHttp => "tool_http",
            Self::ToolTimeout => "tool_timeout",
            Self::ToolNon2xx => "tool_non_2xx",
            Self::NodeException => "node_exception",
            Self::Cancelled => "cancelled",
            Self::Timeout => "timeout",
            Self::InfiniteLoop => "infinite_loop",
            Self::UnreachableNodes => "unreachable_nodes",
            Self::AmbiguousTransition => "ambiguous_transition",
            Self::NotFound => "not_found",
            Self::AlreadyTerminal => "already_terminal",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared error type used across all weft crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("validation: {0}")]
    Validation(String),

    #[error("unknown template: {0}")]
    UnknownTemplate(String),

    #[error("unknown tool: {service}/{tool}")]
    UnknownTool { service: String, tool: String },

    #[error("unknown node: {0}")]
    UnknownNode(String),

    #[error("unknown condition function: {0}")]
    UnknownCondition(String),

    #[error("duplicate tool: {service}/{tool}")]
    DuplicateTool { service: String, tool: String },

    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("invalid parameter schema: {0}")]
    InvalidParameterSchema(String),

    #[error("capacity exceeded: {0}")]
    CapacityExceeded(String),

    #[error("tool transport failure: {0}")]
    ToolHttp(String),

    #[error("tool call timed out after {0}ms")]
    ToolTimeout(u64),

    #[error("tool returned HTTP {status}")]
    ToolNon2xx { status: u16, body: serde_json::Value },

    #[error("node failure: {0}")]
    NodeException(String),

    #[error("execution cancelled")]
    Cancelled,

    #[error("execution deadline exceeded")]
    DeadlineExceeded,

    #[error("workflow contains an unbreakable cycle: {0}")]
    InfiniteLoop(String),

    #[error("unreachable nodes: {0}")]
    UnreachableNodes(String),

    #[error("ambiguous transition from node {0}")]
    AmbiguousTransition(String),

    #[error("execution not found: {0}")]
    ExecutionNotFound(uuid::Uuid),

    #[error("execution already terminal: {0}")]
    AlreadyTerminal(uuid::Uuid),

    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// The stable kind tag for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::UnknownTemplate(_) => ErrorKind::UnknownTemplate,
            Self::UnknownTool { .. } => ErrorKind::UnknownTool,
            Self::UnknownNode(_) => ErrorKind::UnknownNode,
            Self::UnknownCondition(_) => ErrorKind::UnknownCondition,
            Self::DuplicateTool { .. } => ErrorKind::DuplicateTool,
            Self::InvalidDescriptor(_) => ErrorKind::InvalidDescriptor,
            Self::InvalidParameterSchema(_) => ErrorKind::InvalidParameterSchema,
            Self::CapacityExceeded(_) => ErrorKind::CapacityExceeded,
            Self::ToolHttp(_) => ErrorKind::ToolHttp,
            Self::ToolTimeout(_) => ErrorKind::ToolTimeout,
            Self::ToolNon2xx { .. } => ErrorKind::ToolNon2xx,
            Self::NodeException(_) => ErrorKind::NodeException,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::DeadlineExceeded => ErrorKind::Timeout,
            Self::InfiniteLoop(_) => ErrorKind::InfiniteLoop,
            Self::UnreachableNodes(_) => ErrorKind::UnreachableNodes,
            Self::AmbiguousTransition(_) => ErrorKind::AmbiguousTransition,
            Self::ExecutionNotFound(_) => ErrorKind::NotFound,
            Self::AlreadyTerminal(_) => ErrorKind::AlreadyTerminal,
            Self::Io(_) | Self::Json(_) => ErrorKind::Internal,
        }
    }

    /// Whether the executor's retry policy may re-attempt after this error.
    ///
    /// Transport failures and timeouts are transient; a non-2xx response is
    /// retryable only for the gateway-class statuses 502/503/504.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ToolHttp(_) | Self::ToolTimeout(_) => true,
            Self::ToolNon2xx { status, .. } => matches!(*status, 502 | 503 | 504),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
