//! Template library — named, pre-validated workflow definitions.
//!
//! Templates are compiled at registration, so a definition that would be
//! rejected at submission never makes it into the library. Instantiation
//! validates caller parameters against the template's schema, applies
//! defaults, and hands back the compiled graph plus the initial input map.

mod document_analysis;
mod end_to_end;
mod pr_confidence;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::{Map, Value};

use weft_domain::workflow::{NodeSpec, ParamSpec, ValueSource, WorkflowDefinition};
use weft_domain::{Error, Result};

use crate::compiler::{compile, CompiledWorkflow};
use crate::conditions::ConditionRegistry;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Library
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Listing entry for one template.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TemplateInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    pub parameter_schema: BTreeMap<String, ParamSpec>,
}

struct TemplateEntry {
    description: String,
    compiled: Arc<CompiledWorkflow>,
}

pub struct TemplateLibrary {
    templates: RwLock<HashMap<String, Arc<TemplateEntry>>>,
}

impl TemplateLibrary {
    pub fn new() -> Self {
        Self {
            templates: RwLock::new(HashMap::new()),
        }
    }

    /// The stock library: document analysis, PR confidence, end-to-end test.
    pub fn with_builtins(conditions: &ConditionRegistry) -> Result<Self> {
        let library = Self::new();
        library.register(
            document_analysis::definition(),
            document_analysis::DESCRIPTION,
            conditions,
        )?;
        library.register(
            pr_confidence::definition(),
            pr_confidence::DESCRIPTION,
            conditions,
        )?;
        library.register(end_to_end::definition(), end_to_end::DESCRIPTION, conditions)?;
        Ok(library)
    }

    /// Compile and add (or replace) a template.
    pub fn register(
        &self,
        definition: WorkflowDefinition,
        description: &str,
        conditions: &ConditionRegistry,
    ) -> Result<()> {
        let compiled = Arc::new(compile(&definition, conditions)?);
        let name = compiled.name.clone();
        self.templates.write().insert(
            name.clone(),
            Arc::new(TemplateEntry {
                description: description.to_owned(),
                compiled,
            }),
        );
        tracing::info!(template = %name, "workflow template registered");
        Ok(())
    }

    /// Listing, ordered by template name.
    pub fn list(&self) -> Vec<TemplateInfo> {
        let templates = self.templates.read();
        let mut out: Vec<TemplateInfo> = templates
            .values()
            .map(|entry| TemplateInfo {
                name: entry.compiled.name.clone(),
                version: entry.compiled.version.clone(),
                description: entry.description.clone(),
                parameter_schema: entry.compiled.parameter_schema.clone(),
            })
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    pub fn len(&self) -> usize {
        self.templates.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.read().is_empty()
    }

    /// Validate parameters against the template's schema and produce the
    /// compiled workflow plus the initial input map.
    ///
    /// Declared parameters are type-checked and defaults applied;
    /// undeclared extras pass through untouched.
    pub fn instantiate(
        &self,
        name: &str,
        parameters: &Map<String, Value>,
    ) -> Result<(Arc<CompiledWorkflow>, Map<String, Value>)> {
        let entry = self
            .templates
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownTemplate(name.to_owned()))?;

        let mut input = Map::new();
        for (param_name, spec) in &entry.compiled.parameter_schema {
            match parameters.get(param_name) {
                Some(value) => {
                    if !spec.param_type.matches(value) {
                        return Err(Error::Validation(format!(
                            "parameter type mismatch: `{param_name}` expects {}",
                            spec.param_type
                        )));
                    }
                    input.insert(param_name.clone(), value.clone());
                }
                None if spec.required => {
                    return Err(Error::Validation(format!(
                        "missing required parameter `{param_name}`"
                    )));
                }
                None => {
                    if let Some(default) = &spec.default {
                        input.insert(param_name.clone(), default.clone());
                    }
                }
            }
        }

        for (key, value) in parameters {
            if !input.contains_key(key) {
                input.insert(key.clone(), value.clone());
            }
        }

        Ok((entry.compiled.clone(), input))
    }
}

impl Default for TemplateLibrary {
    fn default() -> Self {
        Self::new()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Definition construction helpers (shared by the template modules)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn tool_node(
    service: &str,
    tool: &str,
    input_mapping: &[(&str, ValueSource)],
    output_mapping: Option<&str>,
) -> NodeSpec {
    NodeSpec::ToolCall {
        service: service.to_owned(),
        tool: tool.to_owned(),
        input_mapping: input_mapping
            .iter()
            .map(|(name, source)| (name.to_string(), source.clone()))
            .collect(),
        output_mapping: output_mapping.map(str::to_owned),
    }
}

/// Unconditional edges along a chain of nodes, ending at the terminal
/// sentinel.
fn chain_edges(names: &[&str]) -> Vec<(String, String)> {
    use weft_domain::workflow::TERMINAL;
    names
        .windows(2)
        .map(|pair| (pair[0].to_string(), pair[1].to_string()))
        .chain(
            names
                .last()
                .map(|last| (last.to_string(), TERMINAL.to_string())),
        )
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn library() -> TemplateLibrary {
        TemplateLibrary::with_builtins(&ConditionRegistry::with_builtins()).unwrap()
    }

    fn params(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn builtins_register_and_list() {
        let library = library();
        let listing = library.list();
        let names: Vec<&str> = listing.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["document_analysis", "end_to_end_test", "pr_confidence_analysis"]
        );
        for info in &listing {
            assert_eq!(info.version, "1.0.0");
            assert!(!info.description.is_empty());
        }
    }

    #[test]
    fn unknown_template_is_rejected() {
        let err = library()
            .instantiate("no_such_template", &Map::new())
            .unwrap_err();
        assert!(matches!(err, Error::UnknownTemplate(_)));
    }

    #[test]
    fn missing_required_parameter_is_rejected() {
        let err = library()
            .instantiate("document_analysis", &Map::new())
            .unwrap_err();
        assert!(matches!(&err, Error::Validation(m) if m.contains("missing required parameter")));
    }

    #[test]
    fn type_mismatch_is_rejected() {
        let err = library()
            .instantiate("document_analysis", &params(json!({"document_id": 7})))
            .unwrap_err();
        assert!(matches!(&err, Error::Validation(m) if m.contains("type mismatch")));
    }

    #[test]
    fn defaults_are_applied() {
        let (_, input) = library()
            .instantiate("document_analysis", &params(json!({"document_id": "doc_1"})))
            .unwrap();
        assert_eq!(input.get("analysis_type"), Some(&json!("quality")));
        assert_eq!(input.get("notify_channels"), Some(&json!(["email"])));
    }

    #[test]
    fn explicit_parameters_override_defaults() {
        let (_, input) = library()
            .instantiate(
                "document_analysis",
                &params(json!({"document_id": "doc_1", "analysis_type": "consistency"})),
            )
            .unwrap();
        assert_eq!(input.get("analysis_type"), Some(&json!("consistency")));
    }

    #[test]
    fn undeclared_extras_pass_through() {
        let (_, input) = library()
            .instantiate(
                "document_analysis",
                &params(json!({"document_id": "doc_1", "trace_tag": "t-17"})),
            )
            .unwrap();
        assert_eq!(input.get("trace_tag"), Some(&json!("t-17")));
    }

    #[test]
    fn document_analysis_has_expected_node_sequence() {
        let (compiled, _) = library()
            .instantiate("document_analysis", &params(json!({"document_id": "doc_1"})))
            .unwrap();
        assert_eq!(compiled.entry_point, "fetch_document");
        let names: Vec<&String> = compiled.nodes.keys().collect();
        assert_eq!(names.len(), 4);
        for expected in [
            "fetch_document",
            "analyze_document",
            "store_results",
            "notify_stakeholders",
        ] {
            assert!(compiled.nodes.contains_key(expected), "missing {expected}");
        }
    }

    #[test]
    fn pr_confidence_requires_pr_url_and_jira_ticket() {
        let library = library();
        let err = library
            .instantiate("pr_confidence_analysis", &params(json!({"pr_url": "u"})))
            .unwrap_err();
        assert!(matches!(&err, Error::Validation(m) if m.contains("jira_ticket")));

        let (compiled, _) = library
            .instantiate(
                "pr_confidence_analysis",
                &params(json!({"pr_url": "https://git/pr/1", "jira_ticket": "PROJ-42"})),
            )
            .unwrap();
        assert_eq!(compiled.nodes.len(), 10);
        assert_eq!(compiled.entry_point, "extract_pr_context");
    }

    #[test]
    fn end_to_end_test_has_composite_analyze() {
        let (compiled, input) = library()
            .instantiate("end_to_end_test", &Map::new())
            .unwrap();
        assert_eq!(input.get("document_count"), Some(&json!(3)));
        assert_eq!(input.get("cleanup"), Some(&json!(true)));
        match compiled.nodes.get("analyze") {
            Some(NodeSpec::Composite { children }) => {
                assert_eq!(children, &vec!["analyze_consistency".to_string(),
                                           "analyze_quality".to_string()]);
            }
            other => panic!("analyze should be a composite, got {other:?}"),
        }
    }
}
