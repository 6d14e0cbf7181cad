//! Parameter resolution and placeholder substitution.

use crate::dynamic::config::TaskParameter;
use crate::error::TaskError;
use serde_json::{Map, Value};

/// Resolve call arguments against the declared parameters, in
/// declaration order: a supplied value wins, then the default, and a
/// missing required parameter is an error. Unknown arguments pass
/// through untouched.
pub fn resolve_parameters(
    declared: &[TaskParameter],
    supplied: &Value,
) -> Result<Map<String, Value>, TaskError> {
    let mut resolved = supplied.as_object().cloned().unwrap_or_default();

    for param in declared {
        match resolved.get(&param.name) {
            Some(value) => {
                if !type_matches(&param.param_type, value) {
                    return Err(TaskError::InvalidParameterType {
                        name: param.name.clone(),
                        expected: param.param_type.clone(),
                    });
                }
            }
            None => {
                if let Some(default) = &param.default {
                    resolved.insert(param.name.clone(), default.clone());
                } else if param.required {
                    return Err(TaskError::MissingParameter(param.name.clone()));
                }
            }
        }
    }

    Ok(resolved)
}

/// Best-effort type check; unknown type names accept anything.
fn type_matches(declared: &str, value: &Value) -> bool {
    match declared {
        "string" | "str" => value.is_string(),
        "integer" | "int" => value.is_i64() || value.is_u64(),
        "number" | "float" | "double" => value.is_number(),
        "boolean" | "bool" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        _ => true,
    }
}

/// JSON Schema type for a declared parameter type. The numeric aliases
/// all collapse to "number".
pub fn json_schema_type(declared: &str) -> &'static str {
    match declared {
        "integer" | "int" | "number" | "float" | "double" => "number",
        "boolean" | "bool" => "boolean",
        "object" => "object",
        "array" => "array",
        _ => "string",
    }
}

/// Replace `{name}` tokens in a template from the environment.
///
/// One left-to-right pass: a token is replaced only when `name` is a
/// known variable (strings verbatim, anything else JSON-encoded);
/// everything else, including `{` with no matching variable, stays
/// literal. Replaced text is never re-scanned.
pub fn substitute_str(template: &str, env: &Map<String, Value>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after_open = &rest[open + 1..];

        match after_open.find('}') {
            Some(close) => {
                let name = &after_open[..close];
                match env.get(name) {
                    Some(value) if !name.is_empty() => {
                        match value {
                            Value::String(s) => out.push_str(s),
                            other => out.push_str(&other.to_string()),
                        }
                        rest = &after_open[close + 1..];
                    }
                    _ => {
                        out.push('{');
                        rest = after_open;
                    }
                }
            }
            None => {
                out.push('{');
                rest = after_open;
            }
        }
    }

    out.push_str(rest);
    out
}

/// Apply [`substitute_str`] to every string value in a JSON tree.
/// Recursion covers object values and array elements; keys are never
/// rewritten.
pub fn substitute_value(value: &Value, env: &Map<String, Value>) -> Value {
    match value {
        Value::String(s) => Value::String(substitute_str(s, env)),
        Value::Object(obj) => Value::Object(
            obj.iter()
                .map(|(k, v)| (k.clone(), substitute_value(v, env)))
                .collect(),
        ),
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| substitute_value(v, env)).collect())
        }
        other => other.clone(),
    }
}
