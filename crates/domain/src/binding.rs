//! Tool bindings and service descriptors.
//!
//! A [`ToolBinding`] is a plain record describing one invocable HTTP
//! endpoint on a downstream service. Bindings are synthesized from
//! [`ServiceDescriptor`]s by the discovery adapter and dispatched through a
//! single generic interpreter in `weft-client` — no codegen, no reflection.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::workflow::ParamType;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// HTTP method / parameter location
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    /// Whether a request body is permitted for this method.
    pub fn allows_body(self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a declared parameter rides in the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamLocation {
    Query,
    Body,
    Path,
    Header,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool binding
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolParam {
    #[serde(rename = "type")]
    pub param_type: ParamType,
    #[serde(default)]
    pub required: bool,
    pub location: ParamLocation,
}

/// The registered mapping from `(service, tool)` to an invocable endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolBinding {
    pub service: String,
    /// Unique within the service.
    pub tool: String,
    pub version: semver::Version,
    /// Absolute URL, optionally with `{path_param}` placeholders.
    pub url_template: String,
    pub http_method: HttpMethod,
    #[serde(default)]
    pub parameter_schema: BTreeMap<String, ToolParam>,
    /// Declarative response normalization; absent ⇒ pass-through.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_shape: Option<ResponseShape>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ToolBinding {
    /// The registry key for this binding.
    pub fn key(&self) -> (String, String) {
        (self.service.clone(), self.tool.clone())
    }
}

/// Flat field-pluck normalization: each output field is filled from a
/// dotted path into the response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseShape {
    pub fields: BTreeMap<String, String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Service descriptors (discovery input)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Discovery input: one downstream service and its endpoint list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub service_name: String,
    pub base_url: String,
    #[serde(default = "d_descriptor_version")]
    pub version: semver::Version,
    pub endpoints: Vec<EndpointSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointSpec {
    pub tool_name: String,
    /// Path relative to the descriptor's `base_url`.
    pub path: String,
    pub method: HttpMethod,
    #[serde(default)]
    pub parameters: Vec<EndpointParam>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_shape: Option<ResponseShape>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointParam {
    pub name: String,
    #[serde(rename = "in")]
    pub location: ParamLocation,
    /// Raw type name; unknown names downgrade to `string` at discovery.
    #[serde(rename = "type", default = "d_string_type")]
    pub param_type: String,
    #[serde(default)]
    pub required: bool,
}

fn d_descriptor_version() -> semver::Version {
    semver::Version::new(0, 1, 0)
}

fn d_string_type() -> String {
    "string".into()
}
