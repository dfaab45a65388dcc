//! Document analysis: fetch a document, analyze it, store the results,
//! notify stakeholders.

use std::collections::BTreeMap;

use serde_json::json;

use weft_domain::workflow::{ParamSpec, ParamType, ValueSource, WorkflowDefinition};

use super::{chain_edges, tool_node};

pub const DESCRIPTION: &str =
    "Analyze a document end-to-end: fetch, analyze, store results, notify stakeholders";

const NODE_ORDER: [&str; 4] = [
    "fetch_document",
    "analyze_document",
    "store_results",
    "notify_stakeholders",
];

pub fn definition() -> WorkflowDefinition {
    let nodes = BTreeMap::from([
        (
            "fetch_document".to_string(),
            tool_node(
                "doc_store",
                "get_document",
                &[("document_id", ValueSource::state("input.document_id"))],
                Some("document"),
            ),
        ),
        (
            "analyze_document".to_string(),
            tool_node(
                "analysis_service",
                "analyze_document",
                &[
                    ("document_id", ValueSource::state("input.document_id")),
                    ("content", ValueSource::state("output.document.content")),
                    ("analysis_type", ValueSource::state("input.analysis_type")),
                ],
                // The binding's response shape plucks summary, key_concepts,
                // and consistency_analysis; merging at the root puts them
                // directly into output_data.
                None,
            ),
        ),
        (
            "store_results".to_string(),
            tool_node(
                "doc_store",
                "store_document",
                &[
                    ("content", ValueSource::state("output.summary")),
                    (
                        "metadata",
                        ValueSource::literal(json!({"type": "document_analysis"})),
                    ),
                    ("source", ValueSource::literal(json!("workflow_orchestrator"))),
                ],
                Some("stored_analysis_id"),
            ),
        ),
        (
            "notify_stakeholders".to_string(),
            tool_node(
                "notification_service",
                "send_notification",
                &[
                    (
                        "message",
                        ValueSource::literal(json!("Document analysis completed")),
                    ),
                    ("channels", ValueSource::state("input.notify_channels")),
                    ("priority", ValueSource::literal(json!("normal"))),
                ],
                Some("notification"),
            ),
        ),
    ]);

    WorkflowDefinition {
        name: "document_analysis".into(),
        version: "1.0.0".into(),
        nodes,
        edges: chain_edges(&NODE_ORDER),
        conditional_edges: vec![],
        entry_point: "fetch_document".into(),
        parameter_schema: BTreeMap::from([
            (
                "document_id".to_string(),
                ParamSpec::required(ParamType::String),
            ),
            (
                "analysis_type".to_string(),
                ParamSpec::optional(ParamType::String, Some(json!("quality"))),
            ),
            (
                "notify_channels".to_string(),
                ParamSpec::optional(ParamType::Array, Some(json!(["email"]))),
            ),
        ]),
    }
}
