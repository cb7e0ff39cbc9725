//! Tool argument validation against the declared input schema.
//!
//! Runs before any Kibo call is made:
//!
//! 1. Arguments must be an object (`null` counts as `{}`).
//! 2. Every `required` name must be present and non-null.
//! 3. Keys not declared under `properties` are dropped.
//! 4. Declared types are checked, with safe coercions:
//!    `"25"` → `25` for integers and numbers, `"true"` → `true` for booleans.
//!    Array items are checked against `items.type`.
//! 5. `enum`, `minimum` / `maximum` and `minLength` / `maxLength` are enforced.

use std::fmt::Write as _;

use serde_json::{Map, Value};

/// One problem with one argument
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    /// Argument name (empty for whole-object problems)
    pub param: String,
    /// What is wrong
    pub message: String,
}

impl Violation {
    fn new(param: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            param: param.into(),
            message: message.into(),
        }
    }
}

/// Outcome of [`validate_arguments`]
#[derive(Debug, Clone)]
pub struct Validated {
    /// Problems found; empty means valid
    pub violations: Vec<Violation>,
    /// Declared arguments after coercion, unknown keys removed
    pub arguments: Value,
}

impl Validated {
    /// No violations
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// Single-line summary of all violations
    #[must_use]
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for (i, v) in self.violations.iter().enumerate() {
            if i > 0 {
                out.push_str("; ");
            }
            if v.param.is_empty() {
                out.push_str(&v.message);
            } else {
                let _ = write!(out, "{}: {}", v.param, v.message);
            }
        }
        out
    }
}

/// Validate `arguments` against `schema` (an `object` JSON Schema)
#[must_use]
pub fn validate_arguments(arguments: &Value, schema: &Value) -> Validated {
    let empty = Map::new();
    let properties = schema
        .get("properties")
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    let args = match arguments {
        Value::Object(m) => m,
        Value::Null => &empty,
        other => {
            return Validated {
                violations: vec![Violation::new(
                    "",
                    format!("arguments must be an object, got {}", json_type_name(other)),
                )],
                arguments: Value::Object(Map::new()),
            };
        }
    };

    let mut violations = Vec::new();
    let required = schema
        .get("required")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str);
    for name in required {
        match args.get(name) {
            None => violations.push(Violation::new(name, "required parameter is missing")),
            Some(Value::Null) => {
                violations.push(Violation::new(name, "required parameter must not be null"));
            }
            Some(_) => {}
        }
    }

    let mut cleaned = Map::new();
    for (name, prop_schema) in properties {
        let Some(value) = args.get(name) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        match check_property(name, value, prop_schema) {
            Ok(v) => {
                cleaned.insert(name.clone(), v);
            }
            Err(mut found) => violations.append(&mut found),
        }
    }

    Validated {
        violations,
        arguments: Value::Object(cleaned),
    }
}

fn check_property(name: &str, value: &Value, prop_schema: &Value) -> Result<Value, Vec<Violation>> {
    let coerced = match prop_schema.get("type").and_then(Value::as_str) {
        Some(ty) => coerce(value, ty).map_err(|msg| vec![Violation::new(name, msg)])?,
        None => value.clone(),
    };

    let mut violations = Vec::new();

    if let Some(options) = prop_schema.get("enum").and_then(Value::as_array) {
        if !options.contains(&coerced) {
            let listed: Vec<String> = options.iter().map(Value::to_string).collect();
            violations.push(Violation::new(
                name,
                format!("must be one of: {}", listed.join(", ")),
            ));
        }
    }

    if let Some(n) = coerced.as_f64() {
        if let Some(min) = prop_schema.get("minimum").and_then(Value::as_f64) {
            if n < min {
                violations.push(Violation::new(name, format!("must be >= {min}")));
            }
        }
        if let Some(max) = prop_schema.get("maximum").and_then(Value::as_f64) {
            if n > max {
                violations.push(Violation::new(name, format!("must be <= {max}")));
            }
        }
    }

    if let Some(s) = coerced.as_str() {
        let len = s.chars().count() as u64;
        if let Some(min) = prop_schema.get("minLength").and_then(Value::as_u64) {
            if len < min {
                violations.push(Violation::new(
                    name,
                    format!("must be at least {min} characters long"),
                ));
            }
        }
        if let Some(max) = prop_schema.get("maxLength").and_then(Value::as_u64) {
            if len > max {
                violations.push(Violation::new(
                    name,
                    format!("must be at most {max} characters long"),
                ));
            }
        }
    }

    if let (Some(items), Some(item_type)) = (
        coerced.as_array(),
        prop_schema
            .get("items")
            .and_then(|i| i.get("type"))
            .and_then(Value::as_str),
    ) {
        for (i, item) in items.iter().enumerate() {
            if let Err(msg) = coerce(item, item_type) {
                violations.push(Violation::new(format!("{name}[{i}]"), msg));
            }
        }
    }

    if violations.is_empty() {
        Ok(coerced)
    } else {
        Err(violations)
    }
}

fn coerce(value: &Value, declared: &str) -> Result<Value, String> {
    match (declared, value) {
        ("string", Value::String(_))
        | ("number", Value::Number(_))
        | ("boolean", Value::Bool(_))
        | ("array", Value::Array(_))
        | ("object", Value::Object(_)) => Ok(value.clone()),
        ("string", Value::Number(n)) => Ok(Value::String(n.to_string())),
        ("integer", Value::Number(n)) => {
            if n.is_i64() || n.is_u64() {
                Ok(value.clone())
            } else {
                match n.as_f64() {
                    #[allow(clippy::cast_possible_truncation)]
                    Some(f) if f.fract() == 0.0 => Ok(Value::from(f as i64)),
                    _ => Err(format!("expected integer, got {n}")),
                }
            }
        }
        ("integer", Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| format!("expected integer, got \"{s}\"")),
        ("number", Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| format!("expected number, got \"{s}\"")),
        ("boolean", Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(format!("expected boolean, got \"{s}\"")),
        },
        ("string" | "integer" | "number" | "boolean" | "array" | "object", other) => Err(format!(
            "expected {declared}, got {}",
            json_type_name(other)
        )),
        _ => Ok(value.clone()),
    }
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
