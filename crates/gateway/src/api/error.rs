//! Error-kind → HTTP status mapping.
//!
//! Responses carry `{kind, message, execution_id?}` and never internal
//! stack traces.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use uuid::Uuid;

use weft_domain::{Error, ErrorKind};

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation
        | ErrorKind::InvalidParameterSchema
        | ErrorKind::InvalidDescriptor
        | ErrorKind::InfiniteLoop
        | ErrorKind::UnreachableNodes
        | ErrorKind::AmbiguousTransition
        | ErrorKind::UnknownNode
        | ErrorKind::UnknownCondition => StatusCode::BAD_REQUEST,
        ErrorKind::UnknownTemplate | ErrorKind::UnknownTool | ErrorKind::NotFound => {
            StatusCode::NOT_FOUND
        }
        ErrorKind::AlreadyTerminal | ErrorKind::DuplicateTool => StatusCode::CONFLICT,
        ErrorKind::CapacityExceeded => StatusCode::TOO_MANY_REQUESTS,
        ErrorKind::ToolHttp
        | ErrorKind::ToolTimeout
        | ErrorKind::ToolNon2xx
        | ErrorKind::NodeException
        | ErrorKind::Cancelled
        | ErrorKind::Timeout
        | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Render an engine error as its wire shape.
pub fn error_response(err: &Error, execution_id: Option<Uuid>) -> Response {
    let kind = err.kind();
    let message = if kind == ErrorKind::Internal {
        // Internal faults are logged, not leaked.
        "internal engine error".to_owned()
    } else {
        err.to_string()
    };

    let mut body = serde_json::json!({
        "kind": kind,
        "message": message,
    });
    if let Some(id) = execution_id {
        body["execution_id"] = serde_json::json!(id);
    }

    (status_for(kind), Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_time_errors_are_bad_requests() {
        for kind in [
            ErrorKind::Validation,
            ErrorKind::InfiniteLoop,
            ErrorKind::UnreachableNodes,
            ErrorKind::AmbiguousTransition,
            ErrorKind::InvalidParameterSchema,
            ErrorKind::UnknownCondition,
        ] {
            assert_eq!(status_for(kind), StatusCode::BAD_REQUEST, "{kind}");
        }
    }

    #[test]
    fn missing_resources_are_not_found() {
        assert_eq!(status_for(ErrorKind::UnknownTemplate), StatusCode::NOT_FOUND);
        assert_eq!(status_for(ErrorKind::UnknownTool), StatusCode::NOT_FOUND);
        assert_eq!(status_for(ErrorKind::NotFound), StatusCode::NOT_FOUND);
    }

    #[test]
    fn conflict_capacity_and_internal() {
        assert_eq!(status_for(ErrorKind::AlreadyTerminal), StatusCode::CONFLICT);
        assert_eq!(
            status_for(ErrorKind::CapacityExceeded),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            status_for(ErrorKind::Internal),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_messages_are_not_leaked() {
        let err = Error::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "/secret/path",
        ));
        let kind = err.kind();
        assert_eq!(kind, ErrorKind::Internal);
        // The rendered message replaces the raw error text.
        let rendered = if kind == ErrorKind::Internal {
            "internal engine error".to_owned()
        } else {
            err.to_string()
        };
        assert!(!rendered.contains("/secret/path"));
    }
}
