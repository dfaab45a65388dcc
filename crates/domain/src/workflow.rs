//! Workflow definitions — the declarative form callers submit.
//!
//! A [`WorkflowDefinition`] names typed nodes, unconditional edges,
//! conditional edges, and an entry point. The graph compiler in
//! `weft-engine` validates and indexes it; nothing here is executable on
//! its own.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Distinguished node name signifying graph exit. Not a real node.
pub const TERMINAL: &str = "__end__";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Workflow definition
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub name: String,
    pub version: String,
    pub nodes: BTreeMap<String, NodeSpec>,
    /// Ordered `(from, to)` pairs; `to` may be [`TERMINAL`].
    #[serde(default)]
    pub edges: Vec<(String, String)>,
    #[serde(default)]
    pub conditional_edges: Vec<ConditionalEdge>,
    pub entry_point: String,
    #[serde(default)]
    pub parameter_schema: BTreeMap<String, ParamSpec>,
}

/// A conditional transition: after `from` runs, `condition` is evaluated
/// against the state and the returned branch label selects the next node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalEdge {
    pub from: String,
    pub condition: String,
    /// branch label → destination node (or [`TERMINAL`]).
    pub branches: BTreeMap<String, String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Node specs
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeSpec {
    /// Invoke one registered tool; arguments are built from the state via
    /// `input_mapping`, the response lands at `output_mapping` (dotted path
    /// into the data map; absent ⇒ object responses merge at the root).
    ToolCall {
        service: String,
        tool: String,
        #[serde(default)]
        input_mapping: BTreeMap<String, ValueSource>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output_mapping: Option<String>,
    },
    /// Execute the named child nodes serially with the same state.
    Composite { children: Vec<String> },
    /// Evaluate the named condition function; its label picks the next node
    /// from this node's conditional-edge branch map.
    ConditionalRouter { condition: String },
    /// Explicit exit node.
    Terminal,
}

impl NodeSpec {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::ToolCall { .. } => "tool_call",
            Self::Composite { .. } => "composite",
            Self::ConditionalRouter { .. } => "conditional_router",
            Self::Terminal => "terminal",
        }
    }
}

/// Where a tool argument's value comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ValueSource {
    /// Dotted path into the execution state (`input.…` or `output.…`).
    State { path: String },
    Literal { value: serde_json::Value },
}

impl ValueSource {
    pub fn state(path: impl Into<String>) -> Self {
        Self::State { path: path.into() }
    }

    pub fn literal(value: serde_json::Value) -> Self {
        Self::Literal { value }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Parameter schema
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    #[serde(rename = "type")]
    pub param_type: ParamType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

impl ParamSpec {
    pub fn required(param_type: ParamType) -> Self {
        Self { param_type, required: true, default: None }
    }

    pub fn optional(param_type: ParamType, default: Option<serde_json::Value>) -> Self {
        Self { param_type, required: false, default }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Number,
    Boolean,
    Object,
    Array,
}

impl ParamType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        }
    }

    /// Parse a descriptor-supplied type name. `None` for unknown names —
    /// discovery downgrades those to `string` with a warning.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "string" => Some(Self::String),
            "number" | "integer" | "float" => Some(Self::Number),
            "boolean" => Some(Self::Boolean),
            "object" => Some(Self::Object),
            "array" => Some(Self::Array),
            _ => None,
        }
    }

    /// Whether a JSON value inhabits this type.
    pub fn matches(self, value: &serde_json::Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
        }
    }
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn node_spec_tagged_serialization() {
        let node = NodeSpec::ToolCall {
            service: "doc_store".into(),
            tool: "get_document".into(),
            input_mapping: BTreeMap::from([(
                "document_id".to_string(),
                ValueSource::state("input.document_id"),
            )]),
            output_mapping: Some("document".into()),
        };
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["kind"], "tool_call");
        assert_eq!(json["input_mapping"]["document_id"]["source"], "state");

        let back: NodeSpec = serde_json::from_value(json).unwrap();
        assert_eq!(back, node);
    }

    #[test]
    fn router_spec_roundtrip() {
        let node = NodeSpec::ConditionalRouter { condition: "should_retry".into() };
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["kind"], "conditional_router");
        assert_eq!(serde_json::from_value::<NodeSpec>(json).unwrap(), node);
    }

    #[test]
    fn param_type_parse_unknown_is_none() {
        assert_eq!(ParamType::parse("string"), Some(ParamType::String));
        assert_eq!(ParamType::parse("integer"), Some(ParamType::Number));
        assert_eq!(ParamType::parse("uuid"), None);
    }

    #[test]
    fn param_type_matches_json_values() {
        assert!(ParamType::String.matches(&json!("x")));
        assert!(ParamType::Number.matches(&json!(3)));
        assert!(ParamType::Number.matches(&json!(3.5)));
        assert!(ParamType::Boolean.matches(&json!(true)));
        assert!(ParamType::Object.matches(&json!({})));
        assert!(ParamType::Array.matches(&json!([])));
        assert!(!ParamType::String.matches(&json!(1)));
        assert!(!ParamType::Array.matches(&json!({})));
    }

    #[test]
    fn definition_deserializes_with_defaults() {
        let def: WorkflowDefinition = serde_json::from_value(json!({
            "name": "minimal",
            "version": "1.0.0",
            "nodes": { "only": { "kind": "terminal" } },
            "entry_point": "only",
        }))
        .unwrap();
        assert!(def.edges.is_empty());
        assert!(def.conditional_edges.is_empty());
        assert!(def.parameter_schema.is_empty());
    }
}
