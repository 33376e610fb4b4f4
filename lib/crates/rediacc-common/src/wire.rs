//! Multi-table response shape returned by every `StoredProcedure` endpoint.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One data row of a result table.
pub type Row = Map<String, Value>;

/// One ordered block of rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultTable {
    #[serde(default)]
    pub data: Vec<Row>,
}

impl ResultTable {
    #[must_use]
    pub fn first_row(&self) -> Option<&Row> {
        self.data.first()
    }
}

/// Response body of a `StoredProcedure` call.
///
/// Table 0 conventionally carries the rotated request token; domain data
/// starts at table 1.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    #[serde(default)]
    pub result_sets: Vec<ResultTable>,
    /// Non-zero (or `true`) marks an application-level failure on HTTP 200.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ApiResponse {
    /// Returns `true` when the body carries a non-zero `failure` marker.
    #[must_use]
    pub fn has_failure(&self) -> bool {
        match &self.failure {
            Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => !s.is_empty() && s != "0",
            _ => false,
        }
    }

    #[must_use]
    pub fn table(&self, index: usize) -> Option<&ResultTable> {
        self.result_sets.get(index)
    }

    /// First row of table `index`, if both exist.
    #[must_use]
    pub fn first_row(&self, index: usize) -> Option<&Row> {
        self.table(index).and_then(ResultTable::first_row)
    }

    /// Rows of table `index`, empty when the table is absent.
    #[must_use]
    pub fn rows(&self, index: usize) -> &[Row] {
        self.table(index).map_or(&[], |t| t.data.as_slice())
    }
}

/// Looks up `name` in a row, falling back to its PascalCase spelling.
///
/// The API emits both `taskId` and `TaskId` depending on the endpoint.
#[must_use]
pub fn row_field<'a>(row: &'a Row, name: &str) -> Option<&'a Value> {
    row.get(name).or_else(|| row.get(&pascal_case(name)))
}

/// String-valued variant of [`row_field`]. Non-string values are ignored.
#[must_use]
pub fn row_str<'a>(row: &'a Row, name: &str) -> Option<&'a str> {
    row_field(row, name).and_then(Value::as_str)
}

fn pascal_case(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
