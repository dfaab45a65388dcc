//! Built-in descriptors for the downstream ecosystem services.
//!
//! The orchestrator knows the stock endpoint surface of its companion
//! services out of the box; the gateway feeds these descriptors through the
//! discovery adapter at startup. Base URLs come from the `[services]`
//! config table, with compose-network defaults for anything unlisted.

use std::collections::BTreeMap;

use weft_domain::binding::{
    EndpointParam, EndpointSpec, HttpMethod, ParamLocation, ResponseShape, ServiceDescriptor,
};
use weft_domain::config::ServicesConfig;

/// Descriptors for every catalog service that resolves to a base URL.
pub fn default_descriptors(services: &ServicesConfig) -> Vec<ServiceDescriptor> {
    CATALOG
        .iter()
        .filter_map(|(service, build)| {
            services
                .base_url(service)
                .map(|base_url| build(service, base_url))
        })
        .collect()
}

type Builder = fn(&str, String) -> ServiceDescriptor;

const CATALOG: &[(&str, Builder)] = &[
    ("doc_store", doc_store),
    ("prompt_store", prompt_store),
    ("summarizer_hub", summarizer_hub),
    ("analysis_service", analysis_service),
    ("notification_service", notification_service),
    ("source_agent", source_agent),
    ("interpreter", interpreter),
    ("secure_analyzer", secure_analyzer),
];

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Per-service endpoint tables
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn doc_store(name: &str, base_url: String) -> ServiceDescriptor {
    descriptor(
        name,
        base_url,
        vec![
            ep("store_document", "/api/v1/documents", HttpMethod::Post)
                .with_params(vec![
                    body("content", "string", true),
                    body("metadata", "object", false),
                    body("source", "string", false),
                ])
                .with_description("Store a document"),
            ep(
                "get_document",
                "/api/v1/documents/{document_id}",
                HttpMethod::Get,
            )
            .with_params(vec![path("document_id", "string")])
            .with_description("Retrieve a document by id"),
            ep("search_documents", "/api/v1/search", HttpMethod::Get)
                .with_params(vec![query("q", "string", true), query("limit", "number", false)])
                .with_description("Full-text document search"),
            ep(
                "delete_document",
                "/api/v1/documents/{document_id}",
                HttpMethod::Delete,
            )
            .with_params(vec![path("document_id", "string")]),
        ],
    )
}

fn prompt_store(name: &str, base_url: String) -> ServiceDescriptor {
    descriptor(
        name,
        base_url,
        vec![
            ep("create_prompt", "/api/v1/prompts", HttpMethod::Post).with_params(vec![
                body("name", "string", true),
                body("category", "string", true),
                body("content", "string", true),
                body("variables", "array", false),
            ]),
            ep(
                "get_prompt",
                "/api/v1/prompts/search/{category}/{name}",
                HttpMethod::Get,
            )
            .with_params(vec![path("category", "string"), path("name", "string")]),
            ep(
                "select_prompt",
                "/api/v1/orchestration/prompts/select",
                HttpMethod::Post,
            )
            .with_params(vec![body("task_type", "string", true), body("context", "object", false)])
            .with_description("Pick the optimal prompt for a task"),
        ],
    )
}

fn summarizer_hub(name: &str, base_url: String) -> ServiceDescriptor {
    descriptor(
        name,
        base_url,
        vec![ep("summarize_document", "/summarize", HttpMethod::Post)
            .with_params(vec![
                body("content", "string", true),
                body("format", "string", false),
                body("max_length", "number", false),
            ])
            .with_description("Summarize content")],
    )
}

fn analysis_service(name: &str, base_url: String) -> ServiceDescriptor {
    descriptor(
        name,
        base_url,
        vec![
            ep("analyze_document", "/analyze", HttpMethod::Post)
                .with_params(vec![
                    body("targets", "array", false),
                    body("document_id", "string", false),
                    body("content", "string", false),
                    body("analysis_type", "string", false),
                    body("criteria", "object", false),
                ])
                .with_shape(&[
                    ("summary", "summary"),
                    ("key_concepts", "key_concepts"),
                    ("consistency_analysis", "consistency_analysis"),
                ])
                .with_description("Analyze one or more documents"),
            ep("align_requirements", "/requirements/align", HttpMethod::Post).with_params(vec![
                body("pr_context", "object", true),
                body("requirements", "object", false),
            ]),
            ep("check_documentation", "/documentation/check", HttpMethod::Post).with_params(vec![
                body("pr_context", "object", true),
                body("documents", "object", false),
            ]),
            ep("score_confidence", "/confidence/score", HttpMethod::Post).with_params(vec![
                body("alignment", "object", false),
                body("documentation", "object", false),
            ]),
            ep("identify_gaps", "/gaps/identify", HttpMethod::Post)
                .with_params(vec![body("analysis", "object", true)]),
            ep(
                "generate_recommendations",
                "/recommendations/generate",
                HttpMethod::Post,
            )
            .with_params(vec![body("gaps", "object", true)]),
            ep("generate_report", "/reports/generate", HttpMethod::Post).with_params(vec![
                body("report_type", "string", true),
                body("data", "object", false),
            ]),
        ],
    )
}

fn notification_service(name: &str, base_url: String) -> ServiceDescriptor {
    descriptor(
        name,
        base_url,
        vec![ep("send_notification", "/notify", HttpMethod::Post).with_params(vec![
            body("message", "string", true),
            body("channels", "array", false),
            body("priority", "string", false),
        ])],
    )
}

fn source_agent(name: &str, base_url: String) -> ServiceDescriptor {
    descriptor(
        name,
        base_url,
        vec![
            ep("fetch_docs", "/docs/fetch", HttpMethod::Post)
                .with_params(vec![
                    body("source_url", "string", true),
                    body("source_type", "string", false),
                    body("filters", "object", false),
                ])
                .with_description("Ingest documents from an external source"),
            ep("fetch_pr", "/pr/fetch", HttpMethod::Post)
                .with_params(vec![body("pr_url", "string", true)])
                .with_description("Fetch pull-request context"),
        ],
    )
}

fn interpreter(name: &str, base_url: String) -> ServiceDescriptor {
    descriptor(
        name,
        base_url,
        vec![
            ep("interpret_query", "/interpret", HttpMethod::Post)
                .with_params(vec![body("query", "string", true), body("context", "object", false)]),
            ep("execute_workflow", "/execute", HttpMethod::Post)
                .with_params(vec![body("query", "string", true), body("user_id", "string", false)]),
        ],
    )
}

fn secure_analyzer(name: &str, base_url: String) -> ServiceDescriptor {
    descriptor(
        name,
        base_url,
        vec![
            ep("detect_risks", "/detect", HttpMethod::Post)
                .with_params(vec![body("content", "string", true)]),
            ep("sanitize_content", "/sanitize", HttpMethod::Post).with_params(vec![
                body("content", "string", true),
                body("policies", "array", false),
            ]),
        ],
    )
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Construction helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn descriptor(name: &str, base_url: String, endpoints: Vec<EndpointSpec>) -> ServiceDescriptor {
    ServiceDescriptor {
        service_name: name.to_owned(),
        base_url,
        version: semver::Version::new(1, 0, 0),
        endpoints,
    }
}

fn ep(tool: &str, path: &str, method: HttpMethod) -> EndpointSpec {
    EndpointSpec {
        tool_name: tool.to_owned(),
        path: path.to_owned(),
        method,
        parameters: vec![],
        response_shape: None,
        description: None,
    }
}

fn param(name: &str, location: ParamLocation, param_type: &str, required: bool) -> EndpointParam {
    EndpointParam {
        name: name.to_owned(),
        location,
        param_type: param_type.to_owned(),
        required,
    }
}

fn body(name: &str, param_type: &str, required: bool) -> EndpointParam {
    param(name, ParamLocation::Body, param_type, required)
}

fn query(name: &str, param_type: &str, required: bool) -> EndpointParam {
    param(name, ParamLocation::Query, param_type, required)
}

fn path(name: &str, param_type: &str) -> EndpointParam {
    param(name, ParamLocation::Path, param_type, true)
}

trait EndpointSpecExt {
    fn with_params(self, params: Vec<EndpointParam>) -> Self;
    fn with_description(self, description: &str) -> Self;
    fn with_shape(self, fields: &[(&str, &str)]) -> Self;
}

impl EndpointSpecExt for EndpointSpec {
    fn with_params(mut self, params: Vec<EndpointParam>) -> Self {
        self.parameters = params;
        self
    }

    fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_owned());
        self
    }

    fn with_shape(mut self, fields: &[(&str, &str)]) -> Self {
        self.response_shape = Some(ResponseShape {
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::discovery::DiscoveryAdapter;
    use crate::registry::ToolRegistry;

    #[test]
    fn every_catalog_descriptor_applies_cleanly() {
        let registry = Arc::new(ToolRegistry::new());
        let adapter = DiscoveryAdapter::new(registry.clone());
        for descriptor in default_descriptors(&ServicesConfig::default()) {
            let report = adapter.apply(&descriptor).unwrap();
            assert!(report.warnings.is_empty(), "{}: {:?}", report.service, report.warnings);
        }
        assert!(registry.len() >= 20);
    }

    #[test]
    fn template_tools_are_present() {
        let registry = Arc::new(ToolRegistry::new());
        let adapter = DiscoveryAdapter::new(registry.clone());
        for descriptor in default_descriptors(&ServicesConfig::default()) {
            adapter.apply(&descriptor).unwrap();
        }
        for (service, tool) in [
            ("doc_store", "get_document"),
            ("doc_store", "store_document"),
            ("doc_store", "delete_document"),
            ("analysis_service", "analyze_document"),
            ("analysis_service", "generate_report"),
            ("notification_service", "send_notification"),
            ("summarizer_hub", "summarize_document"),
            ("prompt_store", "select_prompt"),
            ("source_agent", "fetch_pr"),
            ("source_agent", "fetch_docs"),
        ] {
            registry.lookup(service, tool).unwrap();
        }
    }

    #[test]
    fn base_urls_come_from_config() {
        let services: ServicesConfig = serde_json::from_value(serde_json::json!({
            "doc_store": "http://docs.test:9000"
        }))
        .unwrap();
        let descriptors = default_descriptors(&services);
        let doc_store = descriptors
            .iter()
            .find(|d| d.service_name == "doc_store")
            .unwrap();
        assert_eq!(doc_store.base_url, "http://docs.test:9000");
    }
}
