//! The generic binding interpreter.
//!
//! Every tool call in the engine goes through [`ToolInvoker::invoke`] with a
//! [`ToolBinding`] record and a JSON argument map. One interpreter composes
//! the request from the binding's parameter schema — no per-tool code is
//! ever generated. The executor depends only on the trait, so tests drive
//! workflows against scripted stubs.

use async_trait::async_trait;
use serde_json::{Map, Value};

use weft_domain::binding::{ParamLocation, ResponseShape, ToolBinding};
use weft_domain::{Error, Result};

use crate::http::ServiceClient;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Normalized result of one tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResponse {
    pub status: u16,
    pub body: Value,
}

/// The seam between the executor and the network.
///
/// Implementations return the raw decoded body; response-shape
/// normalization is the caller's job so every invoker is treated alike.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    async fn invoke(&self, binding: &ToolBinding, arguments: &Map<String, Value>)
        -> Result<ToolResponse>;
}

#[async_trait]
impl ToolInvoker for ServiceClient {
    async fn invoke(
        &self,
        binding: &ToolBinding,
        arguments: &Map<String, Value>,
    ) -> Result<ToolResponse> {
        let composed = compose_request(binding, arguments)?;

        tracing::debug!(
            service = %binding.service,
            tool = %binding.tool,
            method = %binding.http_method,
            url = %composed.url,
            "invoking tool"
        );

        let resp = self
            .request(
                binding.http_method,
                &composed.url,
                &composed.query,
                &composed.headers,
                composed.body.as_ref(),
            )
            .await?;

        // Response-shape normalization happens in the executor so every
        // invoker implementation is treated alike; the raw decoded body is
        // returned here.
        Ok(ToolResponse { status: resp.status, body: resp.body.into_value() })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request composition
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq)]
pub struct ComposedRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

/// Split the argument map by each parameter's declared location and fill
/// the URL template's `{path_param}` placeholders.
///
/// Arguments not declared in the binding's schema ride at the method's
/// default location: the JSON body for POST/PUT/PATCH, the query string
/// otherwise.
pub fn compose_request(
    binding: &ToolBinding,
    arguments: &Map<String, Value>,
) -> Result<ComposedRequest> {
    let mut url = binding.url_template.clone();
    let mut query = Vec::new();
    let mut headers = Vec::new();
    let mut body_fields = Map::new();

    for (name, value) in arguments {
        let location = binding
            .parameter_schema
            .get(name)
            .map(|p| p.location)
            .unwrap_or(if binding.http_method.allows_body() {
                ParamLocation::Body
            } else {
                ParamLocation::Query
            });

        match location {
            ParamLocation::Path => {
                let placeholder = format!("{{{name}}}");
                if !url.contains(&placeholder) {
                    return Err(Error::Validation(format!(
                        "path parameter {name} has no {{{name}}} placeholder in {}",
                        binding.url_template
                    )));
                }
                url = url.replace(&placeholder, &scalar_text(value));
            }
            ParamLocation::Query => query.push((name.clone(), scalar_text(value))),
            ParamLocation::Header => headers.push((name.clone(), scalar_text(value))),
            ParamLocation::Body => {
                body_fields.insert(name.clone(), value.clone());
            }
        }
    }

    if let Some(open) = url.find('{') {
        let close = url[open..].find('}').map(|i| open + i + 1).unwrap_or(url.len());
        return Err(Error::Validation(format!(
            "unfilled path placeholder {} in {}",
            &url[open..close],
            binding.url_template
        )));
    }

    let body = if body_fields.is_empty() {
        None
    } else {
        Some(Value::Object(body_fields))
    };

    Ok(ComposedRequest { url, query, headers, body })
}

/// Render a JSON value for a query/path/header slot. Strings pass through
/// unquoted; everything else uses its JSON text.
fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response normalization
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Pluck each shaped field from the response body by dotted path.
/// Missing paths yield `null` rather than failing the call.
pub fn apply_shape(shape: &ResponseShape, body: &Value) -> Value {
    let mut out = Map::new();
    for (field, path) in &shape.fields {
        let value = lookup_path(body, path).cloned().unwrap_or(Value::Null);
        out.insert(field.clone(), value);
    }
    Value::Object(out)
}

/// Resolve a dotted path (`a.b.c`) against a JSON value.
pub fn lookup_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use serde_json::json;
    use weft_domain::binding::{HttpMethod, ToolParam};
    use weft_domain::workflow::ParamType;

    fn binding(method: HttpMethod, url: &str) -> ToolBinding {
        ToolBinding {
            service: "doc_store".into(),
            tool: "get_document".into(),
            version: semver_version(),
            url_template: url.into(),
            http_method: method,
            parameter_schema: BTreeMap::new(),
            response_shape: None,
            description: None,
        }
    }

    fn semver_version() -> semver::Version {
        semver::Version::new(1, 0, 0)
    }

    fn param(param_type: ParamType, location: ParamLocation) -> ToolParam {
        ToolParam { param_type, required: true, location }
    }

    fn args(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    // ── compose_request ─────────────────────────────────────────────

    #[test]
    fn splits_arguments_by_declared_location() {
        let mut b = binding(HttpMethod::Post, "http://svc/api/{doc_id}/analyze");
        b.parameter_schema = BTreeMap::from([
            ("doc_id".to_string(), param(ParamType::String, ParamLocation::Path)),
            ("verbose".to_string(), param(ParamType::Boolean, ParamLocation::Query)),
            ("x_trace".to_string(), param(ParamType::String, ParamLocation::Header)),
            ("content".to_string(), param(ParamType::String, ParamLocation::Body)),
        ]);

        let composed = compose_request(
            &b,
            &args(&[
                ("doc_id", json!("doc_1")),
                ("verbose", json!(true)),
                ("x_trace", json!("t-9")),
                ("content", json!("hello")),
            ]),
        )
        .unwrap();

        assert_eq!(composed.url, "http://svc/api/doc_1/analyze");
        assert_eq!(composed.query, vec![("verbose".to_string(), "true".to_string())]);
        assert_eq!(composed.headers, vec![("x_trace".to_string(), "t-9".to_string())]);
        assert_eq!(composed.body, Some(json!({"content": "hello"})));
    }

    #[test]
    fn undeclared_arguments_ride_at_default_location() {
        let post = binding(HttpMethod::Post, "http://svc/analyze");
        let composed = compose_request(&post, &args(&[("extra", json!(1))])).unwrap();
        assert_eq!(composed.body, Some(json!({"extra": 1})));
        assert!(composed.query.is_empty());

        let get = binding(HttpMethod::Get, "http://svc/search");
        let composed = compose_request(&get, &args(&[("q", json!("rust"))])).unwrap();
        assert_eq!(composed.query, vec![("q".to_string(), "rust".to_string())]);
        assert!(composed.body.is_none());
    }

    #[test]
    fn unfilled_placeholder_is_validation_error() {
        let b = binding(HttpMethod::Get, "http://svc/api/{doc_id}");
        let err = compose_request(&b, &Map::new()).unwrap_err();
        assert!(matches!(err, Error::Validation(_)), "got {err:?}");
    }

    #[test]
    fn path_argument_without_placeholder_is_validation_error() {
        let mut b = binding(HttpMethod::Get, "http://svc/api/documents");
        b.parameter_schema = BTreeMap::from([(
            "doc_id".to_string(),
            param(ParamType::String, ParamLocation::Path),
        )]);
        let err = compose_request(&b, &args(&[("doc_id", json!("doc_1"))])).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn non_string_scalars_render_as_json_text() {
        let get = binding(HttpMethod::Get, "http://svc/search");
        let composed =
            compose_request(&get, &args(&[("limit", json!(25)), ("deep", json!(false))])).unwrap();
        let mut query = composed.query;
        query.sort();
        assert_eq!(
            query,
            vec![
                ("deep".to_string(), "false".to_string()),
                ("limit".to_string(), "25".to_string()),
            ]
        );
    }

    // ── response shaping ────────────────────────────────────────────

    #[test]
    fn shape_plucks_dotted_paths() {
        let shape = ResponseShape {
            fields: BTreeMap::from([
                ("summary".to_string(), "result.summary".to_string()),
                ("score".to_string(), "result.metrics.score".to_string()),
                ("missing".to_string(), "nope".to_string()),
            ]),
        };
        let body = json!({
            "result": { "summary": "fine", "metrics": { "score": 0.9 } }
        });
        assert_eq!(
            apply_shape(&shape, &body),
            json!({"summary": "fine", "score": 0.9, "missing": null})
        );
    }

    #[test]
    fn lookup_path_resolves_nested_and_rejects_non_objects() {
        let value = json!({"a": {"b": {"c": 1}}, "s": "leaf"});
        assert_eq!(lookup_path(&value, "a.b.c"), Some(&json!(1)));
        assert_eq!(lookup_path(&value, "s"), Some(&json!("leaf")));
        assert_eq!(lookup_path(&value, "a.b.c.d"), None);
        assert_eq!(lookup_path(&value, "a.x"), None);
    }
}
