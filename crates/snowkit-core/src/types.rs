//! Core types for snowkit

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One cell of a warehouse result or bind parameter.
///
/// Variants follow the Snowflake type families rather than a generic SQL
/// model; `NUMBER` with a non-zero scale stays textual so no digits are lost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    /// `BOOLEAN`
    Bool(bool),
    /// `NUMBER(p, 0)` that fits in 64 bits
    Int64(i64),
    /// `FLOAT` / `DOUBLE`
    Float64(f64),
    /// `NUMBER(p, s)` with `s > 0`, or wider than 64 bits
    Decimal(String),
    /// `VARCHAR` and friends
    String(String),
    /// `BINARY`, hex on the wire
    Bytes(Vec<u8>),
    /// `DATE`
    Date(NaiveDate),
    /// `TIME`
    Time(NaiveTime),
    /// `TIMESTAMP_NTZ`
    DateTime(NaiveDateTime),
    /// `TIMESTAMP_LTZ` / `TIMESTAMP_TZ`, normalised to UTC
    DateTimeUtc(DateTime<Utc>),
    /// `VARIANT`, `OBJECT`, `ARRAY`
    Json(serde_json::Value),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Borrow text content; other variants are not stringified
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integer view, parsing decimal and text forms
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(v) => Some(*v),
            Value::Decimal(s) | Value::String(s) => s.parse::<i64>().ok(),
            _ => None,
        }
    }

    /// Floating-point view, widening integers and parsing text
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float64(v) => Some(*v),
            Value::Int64(v) => Some(*v as f64),
            Value::Decimal(s) | Value::String(s) => s.parse::<f64>().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Name of the variant, used when inferring column types for bulk loads.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int64(_) => "integer",
            Value::Float64(_) => "float",
            Value::Decimal(_) => "decimal",
            Value::String(_) => "string",
            Value::Bytes(_) => "binary",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::DateTime(_) => "datetime",
            Value::DateTimeUtc(_) => "datetime_utc",
            Value::Json(_) => "json",
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::Float64(v) => write!(f, "{}", v),
            Value::Decimal(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "{}", v),
            Value::Bytes(v) => {
                for byte in v {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
            Value::Date(v) => write!(f, "{}", v),
            Value::Time(v) => write!(f, "{}", v),
            Value::DateTime(v) => write!(f, "{}", v),
            Value::DateTimeUtc(v) => write!(f, "{}", v.to_rfc3339()),
            Value::Json(v) => write!(f, "{}", v),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int64(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Positional values plus the column names of the table they belong to.
///
/// Names are shared between every row of a table.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub values: Vec<Value>,
    names: Arc<[String]>,
}

impl Row {
    pub fn new(names: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { values, names }
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Value under the exact (case-sensitive) column name
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        let idx = self.names.iter().position(|c| c == name)?;
        self.values.get(idx)
    }

    pub fn columns(&self) -> &[String] {
        &self.names
    }

    /// `(name, value)` pairs in column order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.names.iter().map(String::as_str).zip(self.values.iter())
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

/// Column metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ColumnMeta {
    /// Column name
    #[serde(default)]
    pub name: String,
    /// Data type (warehouse-specific string)
    #[serde(default)]
    pub data_type: String,
    /// Whether the column can be NULL
    #[serde(default)]
    pub nullable: bool,
    /// Column ordinal position (0-based)
    #[serde(default)]
    pub ordinal: usize,
    /// Numeric precision
    #[serde(default)]
    pub precision: Option<i32>,
    /// Numeric scale
    #[serde(default)]
    pub scale: Option<i32>,
}

impl ColumnMeta {
    /// Column with only a name known, as inferred from cursor metadata.
    pub fn named(name: impl Into<String>, ordinal: usize) -> Self {
        Self {
            name: name.into(),
            nullable: true,
            ordinal,
            ..Default::default()
        }
    }
}

/// An in-memory tabular result with named columns and ordered rows
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    /// Column metadata
    pub columns: Vec<ColumnMeta>,
    /// Result rows
    pub rows: Vec<Row>,
}

impl Table {
    /// Create an empty table with the given columns
    pub fn new(columns: Vec<ColumnMeta>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a table from column names and positional records.
    ///
    /// Records shorter than the header are padded with NULL.
    pub fn from_records<S: Into<String>>(
        column_names: impl IntoIterator<Item = S>,
        records: Vec<Vec<Value>>,
    ) -> Self {
        let columns: Vec<ColumnMeta> = column_names
            .into_iter()
            .enumerate()
            .map(|(ordinal, name)| ColumnMeta::named(name, ordinal))
            .collect();
        let mut table = Self::new(columns);
        let names = table.shared_names();
        table.rows = records
            .into_iter()
            .map(|record| table.row_from(names.clone(), record))
            .collect();
        table
    }

    /// Append a positional record as a row
    pub fn push_record(&mut self, values: Vec<Value>) {
        let names = match self.rows.last() {
            Some(last) if last.names.iter().eq(self.columns.iter().map(|c| &c.name)) => last.names.clone(),
            _ => self.shared_names(),
        };
        let row = self.row_from(names, values);
        self.rows.push(row);
    }

    fn shared_names(&self) -> Arc<[String]> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    fn row_from(&self, names: Arc<[String]>, mut values: Vec<Value>) -> Row {
        if values.len() < self.columns.len() {
            values.resize(self.columns.len(), Value::Null);
        }
        Row::new(names, values)
    }

    /// Column names in order
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// All values of one column, if the column exists
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.columns.iter().position(|c| c.name == name)?;
        Some(
            self.rows
                .iter()
                .map(|row| row.get(idx).unwrap_or(&Value::Null))
                .collect(),
        )
    }

    /// Rows as positional value vectors
    pub fn records(&self) -> Vec<Vec<Value>> {
        self.rows.iter().map(|r| r.values.clone()).collect()
    }

    /// Check if the table has rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Get the number of columns
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Get the number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Result of a read: a table when tabular output was requested, raw rows otherwise
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutput {
    Table(Table),
    Rows(Vec<Vec<Value>>),
}

impl QueryOutput {
    /// Borrow the table, if this output is tabular
    pub fn as_table(&self) -> Option<&Table> {
        match self {
            QueryOutput::Table(table) => Some(table),
            QueryOutput::Rows(_) => None,
        }
    }

    /// Convert into a table; raw rows get positional column names
    pub fn into_table(self) -> Table {
        match self {
            QueryOutput::Table(table) => table,
            QueryOutput::Rows(rows) => {
                let width = rows.iter().map(Vec::len).max().unwrap_or(0);
                Table::from_records((0..width).map(|i| format!("column_{}", i)), rows)
            }
        }
    }

    /// Rows as positional value vectors regardless of shape
    pub fn records(&self) -> Vec<Vec<Value>> {
        match self {
            QueryOutput::Table(table) => table.records(),
            QueryOutput::Rows(rows) => rows.clone(),
        }
    }

    /// Get the number of rows
    pub fn row_count(&self) -> usize {
        match self {
            QueryOutput::Table(table) => table.row_count(),
            QueryOutput::Rows(rows) => rows.len(),
        }
    }
}
