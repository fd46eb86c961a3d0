//! Shared data model for DataBridge.
//!
//! Both backends produce and consume the same row representation so that the
//! HTTP layer never needs to know which storage model sits behind a request.

use std::collections::{BTreeMap, HashMap, HashSet};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Universal cell value.
///
/// The relational engine only ever produces scalars. The document store may
/// also produce binary data, lists and maps; those survive the read path but
/// are rejected by the relational write path.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(untagged)]
pub enum Value {
    /// SQL NULL or missing attribute
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    /// Integer outside the `i64` range, kept exactly
    Number(serde_json::Number),
    Float(f64),
    String(String),
    /// Binary data, serialized as base64
    Bytes(#[serde(serialize_with = "serialize_base64")] Vec<u8>),
    /// List or set of values
    Array(Vec<Value>),
    /// Nested map
    Object(BTreeMap<String, Value>),
}

#[allow(clippy::ptr_arg)]
fn serialize_base64<S: Serializer>(bytes: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&STANDARD.encode(bytes))
}

impl Value {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether the value is a list or map
    #[must_use]
    pub fn is_nested(&self) -> bool {
        matches!(self, Value::Array(_) | Value::Object(_))
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Textual form used for TEXT columns and CSV cells. `None` means NULL.
    #[must_use]
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Bool(b) => Some(b.to_string()),
            Value::Integer(i) => Some(i.to_string()),
            Value::Number(n) => Some(n.to_string()),
            Value::Float(f) => Some(float_text(*f)),
            Value::String(s) => Some(s.clone()),
            Value::Bytes(b) => Some(STANDARD.encode(b)),
            Value::Array(_) | Value::Object(_) => {
                Some(serde_json::Value::from(self.clone()).to_string())
            }
        }
    }

    /// Get the type name for error messages
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Integer(_) | Value::Number(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }
}

/// Shortest text that parses back to `f`, in JSON number notation
/// (`1.0`, `1e21`). Non-finite values fall back to Rust's formatting.
fn float_text(f: f64) -> String {
    serde_json::Number::from_f64(f).map_or_else(|| f.to_string(), |n| n.to_string())
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        match i64::try_from(v) {
            Ok(i) => Value::Integer(i),
            Err(_) => Value::Number(v.into()),
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Integer(i)
                } else if n.is_u64() {
                    Value::Number(n)
                } else {
                    Value::Float(n.as_f64().unwrap_or_default())
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(a) => Value::Array(a.into_iter().map(Value::from).collect()),
            serde_json::Value::Object(o) => {
                Value::Object(o.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Integer(i) => serde_json::Value::Number(i.into()),
            Value::Number(n) => serde_json::Value::Number(n),
            Value::Float(f) => serde_json::Number::from_f64(f)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Value::String(s) => serde_json::Value::String(s),
            Value::Bytes(b) => serde_json::Value::String(STANDARD.encode(b)),
            Value::Array(a) => serde_json::Value::Array(a.into_iter().map(Into::into).collect()),
            Value::Object(o) => {
                serde_json::Value::Object(o.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

/// A named cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub value: Value,
}

/// One row: ordered named cells.
///
/// Serializes as a JSON object whose key order follows the column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    pub columns: Vec<Column>,
}

impl Row {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            columns: Vec::with_capacity(capacity),
        }
    }

    /// Add a column to the row
    pub fn push(&mut self, name: impl Into<String>, value: Value) {
        self.columns.push(Column {
            name: name.into(),
            value,
        });
    }

    /// Get a column value by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| &c.value)
    }

    /// Column names in order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Rebuild the row with exactly `columns`, in that order. Absent cells
    /// become `Null`; cells not listed are dropped.
    #[must_use]
    pub fn aligned_to(self, columns: &[String]) -> Row {
        let mut cells: HashMap<String, Value> = self
            .columns
            .into_iter()
            .map(|c| (c.name, c.value))
            .collect();

        columns
            .iter()
            .map(|name| {
                let value = cells.remove(name).unwrap_or_default();
                (name.clone(), value)
            })
            .collect()
    }

    /// Build a row from a JSON object, keeping its key order
    #[must_use]
    pub fn from_json_object(object: serde_json::Map<String, serde_json::Value>) -> Self {
        object
            .into_iter()
            .map(|(name, value)| (name, Value::from(value)))
            .collect()
    }
}

impl FromIterator<(String, Value)> for Row {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            columns: iter
                .into_iter()
                .map(|(name, value)| Column { name, value })
                .collect(),
        }
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for column in &self.columns {
            map.serialize_entry(&column.name, &column.value)?;
        }
        map.end()
    }
}

/// Normalized tabular result shared by every backend.
///
/// Invariant: every row holds exactly `columns`, in the same order, with
/// `Null` standing in for attributes a schemaless record did not carry.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TableRecord {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl TableRecord {
    /// Build a record over a known column list, aligning every row to it.
    #[must_use]
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        let rows = rows
            .into_iter()
            .map(|row| {
                if row.names().eq(columns.iter().map(String::as_str)) {
                    row
                } else {
                    row.aligned_to(&columns)
                }
            })
            .collect();
        Self { columns, rows }
    }

    /// Build a record from heterogeneous rows.
    ///
    /// Columns are the first row's names followed by every name first seen in
    /// a later row; all rows are then padded to that list.
    #[must_use]
    pub fn from_rows(rows: Vec<Row>) -> Self {
        let mut seen = HashSet::new();
        let mut columns = Vec::new();
        for row in &rows {
            for name in row.names() {
                if seen.insert(name.to_string()) {
                    columns.push(name.to_string());
                }
            }
        }
        Self::new(columns, rows)
    }

    /// The first `n` rows, for previews
    #[must_use]
    pub fn samples(&self, n: usize) -> &[Row] {
        &self.rows[..self.rows.len().min(n)]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Coarse column type exposed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColumnType {
    Text,
    Numeric,
    Unknown,
}

impl ColumnType {
    /// Map a native SQL type name (`VARCHAR(255)`, `int unsigned`,
    /// `double precision`, ...) onto the coarse type.
    #[must_use]
    pub fn from_sql_type(native: &str) -> Self {
        let lowered = native.to_ascii_lowercase();
        let base = lowered
            .split('(')
            .next()
            .unwrap_or_default()
            .replace("unsigned", "")
            .trim()
            .to_string();

        match base.as_str() {
            "tinyint" | "smallint" | "mediumint" | "int" | "integer" | "bigint" | "int2"
            | "int4" | "int8" | "decimal" | "numeric" | "dec" | "real" | "float" | "float4"
            | "float8" | "double" | "double precision" | "serial" | "smallserial"
            | "bigserial" | "money" => ColumnType::Numeric,
            "char" | "character" | "varchar" | "character varying" | "nchar" | "nvarchar"
            | "text" | "tinytext" | "mediumtext" | "longtext" | "clob" | "enum" | "set"
            | "json" | "jsonb" | "uuid" => ColumnType::Text,
            _ => ColumnType::Unknown,
        }
    }
}

/// A column name with its coarse type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDef {
    pub name: String,
    pub inferred_type: ColumnType,
}

/// Ordered column list of a table.
///
/// Authoritative for the relational engine; derived from a sampled record (or
/// the declared key attributes of an empty table) for the document store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColumnSchema {
    pub columns: Vec<ColumnDef>,
}

impl ColumnSchema {
    /// Schema whose types are all unknown, as derived from schemaless data
    #[must_use]
    pub fn untyped<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: names
                .into_iter()
                .map(|name| ColumnDef {
                    name: name.into(),
                    inferred_type: ColumnType::Unknown,
                })
                .collect(),
        }
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Outcome of an ad-hoc query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum QueryResult {
    /// Row-producing statement, fully materialized
    Rows { columns: Vec<String>, rows: Vec<Row> },
    /// Any other statement
    Status { message: String, rows_affected: u64 },
}

impl QueryResult {
    #[must_use]
    pub fn is_rows(&self) -> bool {
        matches!(self, QueryResult::Rows { .. })
    }
}
