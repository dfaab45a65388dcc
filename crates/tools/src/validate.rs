//! Argument validation against a binding's parameter schema.
//!
//! Runs in the executor immediately before invocation; failures are
//! `validation` errors and are never retried.

use serde_json::{Map, Value};

use weft_domain::binding::ToolBinding;
use weft_domain::{Error, Result};

/// Check required parameters and value types. Arguments not declared in
/// the schema pass through untouched.
pub fn validate_arguments(binding: &ToolBinding, arguments: &Map<String, Value>) -> Result<()> {
    for (name, param) in &binding.parameter_schema {
        match arguments.get(name) {
            None => {
                if param.required {
                    return Err(Error::Validation(format!(
                        "{}/{}: missing required argument `{name}`",
                        binding.service, binding.tool
                    )));
                }
            }
            Some(Value::Null) if !param.required => {}
            Some(value) => {
                if !param.param_type.matches(value) {
                    return Err(Error::Validation(format!(
                        "{}/{}: argument `{name}` must be {}, got {}",
                        binding.service,
                        binding.tool,
                        param.param_type,
                        json_type_name(value)
                    )));
                }
            }
        }
    }
    Ok(())
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use serde_json::json;
    use weft_domain::binding::{HttpMethod, ParamLocation, ToolParam};
    use weft_domain::workflow::ParamType;

    fn binding() -> ToolBinding {
        ToolBinding {
            service: "summarizer_hub".into(),
            tool: "summarize_document".into(),
            version: semver::Version::new(1, 0, 0),
            url_template: "http://localhost:5160/summarize".into(),
            http_method: HttpMethod::Post,
            parameter_schema: BTreeMap::from([
                (
                    "content".to_string(),
                    ToolParam {
                        param_type: ParamType::String,
                        required: true,
                        location: ParamLocation::Body,
                    },
                ),
                (
                    "max_length".to_string(),
                    ToolParam {
                        param_type: ParamType::Number,
                        required: false,
                        location: ParamLocation::Body,
                    },
                ),
            ]),
            response_shape: None,
            description: None,
        }
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn accepts_well_typed_arguments() {
        validate_arguments(&binding(), &args(json!({"content": "hi", "max_length": 200})))
            .unwrap();
    }

    #[test]
    fn optional_arguments_may_be_absent() {
        validate_arguments(&binding(), &args(json!({"content": "hi"}))).unwrap();
    }

    #[test]
    fn missing_required_argument_fails() {
        let err = validate_arguments(&binding(), &args(json!({"max_length": 5}))).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(err.to_string().contains("content"));
    }

    #[test]
    fn type_mismatch_fails_with_both_types_named() {
        let err =
            validate_arguments(&binding(), &args(json!({"content": 42}))).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("string"));
        assert!(msg.contains("number"));
    }

    #[test]
    fn undeclared_arguments_pass_through() {
        validate_arguments(
            &binding(),
            &args(json!({"content": "hi", "anything": {"nested": true}})),
        )
        .unwrap();
    }
}
