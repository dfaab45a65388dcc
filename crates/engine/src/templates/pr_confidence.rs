//! PR confidence analysis: score a pull request against its Jira
//! requirements and Confluence documentation, then report and notify.

use std::collections::BTreeMap;

use serde_json::json;

use weft_domain::workflow::{ParamSpec, ParamType, ValueSource, WorkflowDefinition};

use super::{chain_edges, tool_node};

pub const DESCRIPTION: &str =
    "Score a pull request against requirements and documentation, with gap analysis \
     and recommendations";

const NODE_ORDER: [&str; 10] = [
    "extract_pr_context",
    "fetch_jira",
    "fetch_confluence",
    "align_requirements",
    "check_docs",
    "score",
    "identify_gaps",
    "recommend",
    "report",
    "notify",
];

pub fn definition() -> WorkflowDefinition {
    let nodes = BTreeMap::from([
        (
            "extract_pr_context".to_string(),
            tool_node(
                "source_agent",
                "fetch_pr",
                &[("pr_url", ValueSource::state("input.pr_url"))],
                Some("pr_context"),
            ),
        ),
        (
            "fetch_jira".to_string(),
            tool_node(
                "source_agent",
                "fetch_docs",
                &[
                    ("source_url", ValueSource::state("input.jira_ticket")),
                    ("source_type", ValueSource::literal(json!("jira"))),
                ],
                Some("jira_requirements"),
            ),
        ),
        (
            "fetch_confluence".to_string(),
            tool_node(
                "source_agent",
                "fetch_docs",
                &[
                    ("source_url", ValueSource::state("input.confluence_space")),
                    ("source_type", ValueSource::literal(json!("confluence"))),
                ],
                Some("confluence_docs"),
            ),
        ),
        (
            "align_requirements".to_string(),
            tool_node(
                "analysis_service",
                "align_requirements",
                &[
                    ("pr_context", ValueSource::state("output.pr_context")),
                    ("requirements", ValueSource::state("output.jira_requirements")),
                ],
                Some("requirements_alignment"),
            ),
        ),
        (
            "check_docs".to_string(),
            tool_node(
                "analysis_service",
                "check_documentation",
                &[
                    ("pr_context", ValueSource::state("output.pr_context")),
                    ("documents", ValueSource::state("output.confluence_docs")),
                ],
                Some("documentation_consistency"),
            ),
        ),
        (
            "score".to_string(),
            tool_node(
                "analysis_service",
                "score_confidence",
                &[
                    ("alignment", ValueSource::state("output.requirements_alignment")),
                    (
                        "documentation",
                        ValueSource::state("output.documentation_consistency"),
                    ),
                ],
                Some("confidence_score"),
            ),
        ),
        (
            "identify_gaps".to_string(),
            tool_node(
                "analysis_service",
                "identify_gaps",
                &[("analysis", ValueSource::state("output.confidence_score"))],
                Some("gaps"),
            ),
        ),
        (
            "recommend".to_string(),
            tool_node(
                "analysis_service",
                "generate_recommendations",
                &[("gaps", ValueSource::state("output.gaps"))],
                Some("recommendations"),
            ),
        ),
        (
            "report".to_string(),
            tool_node(
                "analysis_service",
                "generate_report",
                &[
                    ("report_type", ValueSource::literal(json!("pr_confidence"))),
                    ("data", ValueSource::state("output")),
                ],
                Some("final_report"),
            ),
        ),
        (
            "notify".to_string(),
            tool_node(
                "notification_service",
                "send_notification",
                &[
                    (
                        "message",
                        ValueSource::literal(json!("PR confidence analysis completed")),
                    ),
                    ("channels", ValueSource::state("input.notify_channels")),
                    ("priority", ValueSource::literal(json!("high"))),
                ],
                Some("notification"),
            ),
        ),
    ]);

    WorkflowDefinition {
        name: "pr_confidence_analysis".into(),
        version: "1.0.0".into(),
        nodes,
        edges: chain_edges(&NODE_ORDER),
        conditional_edges: vec![],
        entry_point: "extract_pr_context".into(),
        parameter_schema: BTreeMap::from([
            ("pr_url".to_string(), ParamSpec::required(ParamType::String)),
            ("jira_ticket".to_string(), ParamSpec::required(ParamType::String)),
            (
                "confluence_space".to_string(),
                ParamSpec::optional(ParamType::String, Some(json!(""))),
            ),
            (
                "notify_channels".to_string(),
                ParamSpec::optional(ParamType::Array, Some(json!(["email"]))),
            ),
        ]),
    }
}
