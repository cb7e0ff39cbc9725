//! Query-string helpers shared by the tool groups: OData-style filters,
//! `responseFields` projections, path segments and collection reshaping.

use std::fmt::Display;

use serde_json::{Value, json};

/// Collection metadata requested alongside every list projection
const COLLECTION_META: &str = "totalCount,pageCount,pageSize,startIndex";

/// Builds a Kibo `filter` expression; clauses are joined with ` and `
#[derive(Debug, Default, Clone)]
pub struct Filter {
    clauses: Vec<String>,
}

impl Filter {
    /// Empty filter
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `field eq 'value'`
    #[must_use]
    pub fn eq(mut self, field: &str, value: Option<&str>) -> Self {
        if let Some(v) = value {
            self.clauses.push(format!("{field} eq {}", quote(v)));
        }
        self
    }

    /// `field eq value`, for numbers, booleans and bare codes
    #[must_use]
    pub fn eq_bare(mut self, field: &str, value: Option<impl Display>) -> Self {
        if let Some(v) = value {
            self.clauses.push(format!("{field} eq {v}"));
        }
        self
    }

    /// `field ge datetime'value'`
    #[must_use]
    pub fn since(mut self, field: &str, value: Option<&str>) -> Self {
        if let Some(v) = value {
            self.clauses.push(format!("{field} ge datetime{}", quote(v)));
        }
        self
    }

    /// `field le datetime'value'`
    #[must_use]
    pub fn until(mut self, field: &str, value: Option<&str>) -> Self {
        if let Some(v) = value {
            self.clauses.push(format!("{field} le datetime{}", quote(v)));
        }
        self
    }

    /// The joined expression, or `None` when no clause was added
    #[must_use]
    pub fn build(self) -> Option<String> {
        if self.clauses.is_empty() {
            None
        } else {
            Some(self.clauses.join(" and "))
        }
    }
}

/// Optional text argument, with `""` treated as absent
#[must_use]
pub fn present(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|s| !s.is_empty())
}

/// Single-quote a literal, doubling embedded quotes
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Percent-encode one path segment
#[must_use]
pub fn segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// `a,b,c`
#[must_use]
pub fn fields(names: &[&str]) -> String {
    names.join(",")
}

/// `items(a,b,c),totalCount,pageCount,pageSize,startIndex`
#[must_use]
pub fn collection_fields(item_names: &[&str]) -> String {
    format!("items({}),{COLLECTION_META}", item_names.join(","))
}

/// Reshape a Kibo collection into `{<key>: [...], pagination: {...}}`.
/// Missing items become `[]`, missing counters `0`.
#[must_use]
pub fn paginated(response: &Value, key: &str) -> Value {
    let mut out = serde_json::Map::new();
    out.insert(key.to_string(), items(response));
    out.insert(
        "pagination".to_string(),
        json!({
            "totalCount": counter(response, "totalCount"),
            "pageCount": counter(response, "pageCount"),
            "pageSize": counter(response, "pageSize"),
            "startIndex": counter(response, "startIndex"),
        }),
    );
    Value::Object(out)
}

/// `response.items`, or `[]`
#[must_use]
pub fn items(response: &Value) -> Value {
    response
        .get("items")
        .filter(|v| v.is_array())
        .cloned()
        .unwrap_or_else(|| json!([]))
}

/// Numeric field of `response`, or `0`
#[must_use]
pub fn counter(response: &Value, field: &str) -> Value {
    response
        .get(field)
        .filter(|v| v.is_number())
        .cloned()
        .unwrap_or_else(|| json!(0))
}
