//! Discovery adapter — service descriptors in, registered bindings out.
//!
//! Descriptors are applied atomically in two phases: synthesize and
//! validate every endpoint first, then hand the whole batch to the
//! registry's atomic insert. A bad endpoint anywhere rejects the entire
//! descriptor.

use std::collections::HashSet;
use std::sync::Arc;

use weft_domain::binding::{
    EndpointSpec, ParamLocation, ServiceDescriptor, ToolBinding, ToolParam,
};
use weft_domain::workflow::ParamType;
use weft_domain::{Error, Result};

use crate::registry::ToolRegistry;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Reports
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Non-fatal oddity found while synthesizing a descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryWarning {
    pub service: String,
    pub tool: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct DiscoveryReport {
    pub service: String,
    pub registered: usize,
    pub warnings: Vec<DiscoveryWarning>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct DiscoveryAdapter {
    registry: Arc<ToolRegistry>,
}

impl DiscoveryAdapter {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    /// Synthesize bindings from a descriptor and register them atomically.
    pub fn apply(&self, descriptor: &ServiceDescriptor) -> Result<DiscoveryReport> {
        let (bindings, warnings) = synthesize(descriptor)?;
        let registered = bindings.len();

        for warning in &warnings {
            tracing::warn!(
                service = %warning.service,
                tool = %warning.tool,
                "{}",
                warning.message
            );
        }

        self.registry.register_all(bindings)?;

        tracing::info!(
            service = %descriptor.service_name,
            tools = registered,
            "service descriptor applied"
        );

        Ok(DiscoveryReport {
            service: descriptor.service_name.clone(),
            registered,
            warnings,
        })
    }
}

/// Translate a descriptor into bindings without touching the registry.
///
/// Rejects the whole descriptor on a duplicate `tool_name` or on a
/// GET/DELETE endpoint declaring a body parameter. Unknown parameter types
/// downgrade to `string` and produce a warning.
pub fn synthesize(
    descriptor: &ServiceDescriptor,
) -> Result<(Vec<ToolBinding>, Vec<DiscoveryWarning>)> {
    if descriptor.base_url.is_empty() {
        return Err(Error::InvalidDescriptor(format!(
            "{}: base_url must not be empty",
            descriptor.service_name
        )));
    }

    let mut seen = HashSet::new();
    let mut bindings = Vec::with_capacity(descriptor.endpoints.len());
    let mut warnings = Vec::new();

    for endpoint in &descriptor.endpoints {
        if !seen.insert(endpoint.tool_name.as_str()) {
            return Err(Error::InvalidDescriptor(format!(
                "{}: duplicate tool name `{}`",
                descriptor.service_name, endpoint.tool_name
            )));
        }
        bindings.push(synthesize_endpoint(descriptor, endpoint, &mut warnings)?);
    }

    Ok((bindings, warnings))
}

fn synthesize_endpoint(
    descriptor: &ServiceDescriptor,
    endpoint: &EndpointSpec,
    warnings: &mut Vec<DiscoveryWarning>,
) -> Result<ToolBinding> {
    let mut parameter_schema = std::collections::BTreeMap::new();

    for param in &endpoint.parameters {
        if param.location == ParamLocation::Body && !endpoint.method.allows_body() {
            return Err(Error::InvalidDescriptor(format!(
                "{}/{}: body parameter `{}` on {} endpoint",
                descriptor.service_name, endpoint.tool_name, param.name, endpoint.method
            )));
        }

        let param_type = match ParamType::parse(&param.param_type) {
            Some(t) => t,
            None => {
                warnings.push(DiscoveryWarning {
                    service: descriptor.service_name.clone(),
                    tool: endpoint.tool_name.clone(),
                    message: format!(
                        "unknown parameter type `{}` for `{}`, treating as string",
                        param.param_type, param.name
                    ),
                });
                ParamType::String
            }
        };

        parameter_schema.insert(
            param.name.clone(),
            ToolParam {
                param_type,
                required: param.required,
                location: param.location,
            },
        );
    }

    let base = descriptor.base_url.trim_end_matches('/');
    let path = if endpoint.path.starts_with('/') {
        endpoint.path.clone()
    } else {
        format!("/{}", endpoint.path)
    };

    Ok(ToolBinding {
        service: descriptor.service_name.clone(),
        tool: endpoint.tool_name.clone(),
        version: descriptor.version.clone(),
        url_template: format!("{base}{path}"),
        http_method: endpoint.method,
        parameter_schema,
        response_shape: endpoint.response_shape.clone(),
        description: endpoint.description.clone(),
    })
}
