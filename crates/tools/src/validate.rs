//! Argument validation against a tool's JSON-Schema-shaped parameter
//! descriptor.
//!
//! Model-produced arguments are an open shape; this checks the pieces a
//! tool schema actually declares: the top-level object shape, required
//! property presence, and per-property primitive types.

use serde_json::{Map, Value};

use maestro_domain::error::{Error, ErrorKind, Result};
use maestro_domain::ToolSchema;

/// Validate `arguments` against `schema.parameters` and return the
/// decoded argument object. `null` is accepted as an empty object when
/// the schema requires nothing.
pub fn validate_arguments(
    schema: &ToolSchema,
    arguments: &Value,
) -> Result<Map<String, Value>> {
    let args: Map<String, Value> = match arguments {
        Value::Object(map) => map.clone(),
        Value::Null => Map::new(),
        other => {
            return Err(Error::new(
                ErrorKind::InvalidArguments,
                format!(
                    "tool '{}' arguments must be an object, got {}",
                    schema.name,
                    type_name(other)
                ),
            ));
        }
    };

    let params = &schema.parameters;

    if let Some(required) = params.get("required").and_then(|r| r.as_array()) {
        for key in required.iter().filter_map(|k| k.as_str()) {
            if !args.contains_key(key) {
                return Err(Error::new(
                    ErrorKind::InvalidArguments,
                    format!("tool '{}' missing required argument '{key}'", schema.name),
                ));
            }
        }
    }

    let properties = params.get("properties").and_then(|p| p.as_object());
    let additional_allowed = params
        .get("additionalProperties")
        .and_then(|a| a.as_bool())
        .unwrap_or(true);

    for (key, value) in &args {
        let Some(prop) = properties.and_then(|p| p.get(key)) else {
            if !additional_allowed {
                return Err(Error::new(
                    ErrorKind::InvalidArguments,
                    format!("tool '{}' does not accept argument '{key}'", schema.name),
                ));
            }
            continue;
        };
        if let Some(expected) = prop.get("type").and_then(|t| t.as_str()) {
            if !type_matches(expected, value) {
                return Err(Error::new(
                    ErrorKind::InvalidArguments,
                    format!(
                        "tool '{}' argument '{key}' should be {expected}, got {}",
                        schema.name,
                        type_name(value)
                    ),
                ));
            }
        }
    }

    Ok(args)
}

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        // Unknown schema type: accept rather than reject.
        _ => true,
    }
}

fn type_name(value: &Value) -> &'static str {
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

    fn schema() -> ToolSchema {
        ToolSchema {
            name: "lookup".into(),
            description: "test tool".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string" },
                    "limit": { "type": "integer" },
                    "verbose": { "type": "boolean" },
                },
                "required": ["query"],
            }),
        }
    }

    #[test]
    fn accepts_well_formed_arguments() {
        let args = serde_json::json!({ "query": "rust", "limit": 5 });
        let decoded = validate_arguments(&schema(), &args).unwrap();
        assert_eq!(decoded["query"], "rust");
    }

    #[test]
    fn rejects_missing_required() {
        let args = serde_json::json!({ "limit": 5 });
        let err = validate_arguments(&schema(), &args).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArguments);
        assert!(err.to_string().contains("query"));
    }

    #[test]
    fn rejects_wrong_type() {
        let args = serde_json::json!({ "query": "rust", "limit": "five" });
        let err = validate_arguments(&schema(), &args).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArguments);
    }

    #[test]
    fn rejects_non_object_arguments() {
        let err = validate_arguments(&schema(), &serde_json::json!([1, 2])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArguments);
    }

    #[test]
    fn null_is_empty_object_when_nothing_required() {
        let schema = ToolSchema {
            name: "noop".into(),
            description: String::new(),
            parameters: serde_json::json!({ "type": "object", "properties": {} }),
        };
        let decoded = validate_arguments(&schema, &Value::Null).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn extra_arguments_allowed_unless_schema_forbids() {
        let args = serde_json::json!({ "query": "rust", "debug": true });
        assert!(validate_arguments(&schema(), &args).is_ok());

        let mut strict = schema();
        strict.parameters["additionalProperties"] = serde_json::json!(false);
        let err = validate_arguments(&strict, &args).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArguments);
    }

    #[test]
    fn number_accepts_integers_but_not_reverse() {
        let mut s = schema();
        s.parameters["properties"]["limit"]["type"] = serde_json::json!("number");
        assert!(validate_arguments(&s, &serde_json::json!({ "query": "q", "limit": 3 })).is_ok());

        let s2 = schema(); // limit: integer
        let err =
            validate_arguments(&s2, &serde_json::json!({ "query": "q", "limit": 3.5 })).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArguments);
    }
}
