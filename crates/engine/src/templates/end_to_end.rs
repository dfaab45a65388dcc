//! End-to-end ecosystem test: generate mock data, push it through storage,
//! analysis, and summarization, then report and clean up.
//!
//! The `analyze` node is a composite running the consistency and quality
//! analyses serially over the stored corpus.

use std::collections::BTreeMap;

use serde_json::json;

use weft_domain::workflow::{NodeSpec, ParamSpec, ParamType, ValueSource, WorkflowDefinition};

use super::{chain_edges, tool_node};

pub const DESCRIPTION: &str =
    "Exercise the whole service ecosystem with mock data, from storage through \
     analysis to a final report and cleanup";

const NODE_ORDER: [&str; 9] = [
    "generate_mock_data",
    "store_documents",
    "prepare_analysis",
    "analyze",
    "store_results",
    "summarize",
    "unify",
    "final_report",
    "cleanup",
];

pub fn definition() -> WorkflowDefinition {
    let mut nodes = BTreeMap::from([
        (
            "generate_mock_data".to_string(),
            tool_node(
                "source_agent",
                "fetch_docs",
                &[
                    ("source_url", ValueSource::literal(json!("mock://ecosystem"))),
                    ("source_type", ValueSource::literal(json!("mock"))),
                    ("filters", ValueSource::state("input")),
                ],
                Some("mock_documents"),
            ),
        ),
        (
            "store_documents".to_string(),
            tool_node(
                "doc_store",
                "store_document",
                &[
                    ("content", ValueSource::literal(json!("end-to-end mock corpus"))),
                    ("metadata", ValueSource::state("output.mock_documents")),
                    ("source", ValueSource::literal(json!("end_to_end_test"))),
                ],
                Some("stored_documents"),
            ),
        ),
        (
            "prepare_analysis".to_string(),
            tool_node(
                "prompt_store",
                "select_prompt",
                &[
                    ("task_type", ValueSource::literal(json!("document_analysis"))),
                    ("context", ValueSource::state("output.stored_documents")),
                ],
                Some("analysis_prompt"),
            ),
        ),
        (
            "analyze".to_string(),
            NodeSpec::Composite {
                children: vec!["analyze_consistency".into(), "analyze_quality".into()],
            },
        ),
        (
            "analyze_consistency".to_string(),
            tool_node(
                "analysis_service",
                "analyze_document",
                &[
                    ("document_id", ValueSource::state("output.stored_documents.id")),
                    ("analysis_type", ValueSource::literal(json!("consistency"))),
                ],
                Some("consistency_results"),
            ),
        ),
        (
            "analyze_quality".to_string(),
            tool_node(
                "analysis_service",
                "analyze_document",
                &[
                    ("document_id", ValueSource::state("output.stored_documents.id")),
                    ("analysis_type", ValueSource::literal(json!("quality"))),
                ],
                Some("quality_results"),
            ),
        ),
        (
            "store_results".to_string(),
            tool_node(
                "doc_store",
                "store_document",
                &[
                    (
                        "content",
                        ValueSource::literal(json!("end-to-end analysis results")),
                    ),
                    ("metadata", ValueSource::state("output")),
                    ("source", ValueSource::literal(json!("end_to_end_test"))),
                ],
                Some("stored_analysis_results"),
            ),
        ),
        (
            "summarize".to_string(),
            tool_node(
                "summarizer_hub",
                "summarize_document",
                &[
                    (
                        "content",
                        ValueSource::literal(json!(
                            "Summarize the end-to-end analysis results"
                        )),
                    ),
                    ("max_length", ValueSource::literal(json!(500))),
                ],
                Some("individual_summaries"),
            ),
        ),
        (
            "unify".to_string(),
            tool_node(
                "summarizer_hub",
                "summarize_document",
                &[
                    (
                        "content",
                        ValueSource::literal(json!(
                            "Produce a unified summary of the ecosystem test"
                        )),
                    ),
                    ("format", ValueSource::literal(json!("markdown"))),
                ],
                Some("unified_summary"),
            ),
        ),
        (
            "final_report".to_string(),
            tool_node(
                "analysis_service",
                "generate_report",
                &[
                    ("report_type", ValueSource::literal(json!("end_to_end_test"))),
                    ("data", ValueSource::state("output")),
                ],
                Some("final_report"),
            ),
        ),
    ]);

    nodes.insert(
        "cleanup".to_string(),
        tool_node(
            "doc_store",
            "delete_document",
            &[("document_id", ValueSource::state("output.stored_documents.id"))],
            Some("cleanup_result"),
        ),
    );

    WorkflowDefinition {
        name: "end_to_end_test".into(),
        version: "1.0.0".into(),
        nodes,
        edges: chain_edges(&NODE_ORDER),
        conditional_edges: vec![],
        entry_point: "generate_mock_data".into(),
        parameter_schema: BTreeMap::from([
            (
                "document_count".to_string(),
                ParamSpec::optional(ParamType::Number, Some(json!(3))),
            ),
            (
                "cleanup".to_string(),
                ParamSpec::optional(ParamType::Boolean, Some(json!(true))),
            ),
        ]),
    }
}
