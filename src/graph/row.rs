//! Record, table and result types for query results.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value as JsonValue;

use crate::error::AppError;

/// Parameters for graph queries.
///
/// A map of parameter names to JSON values that can be passed to queries.
pub type Params = HashMap<String, JsonValue>;

/// A single record from a query result.
///
/// Columns keep the order they were given in. Values are JSON, with typed
/// extraction via [`Row::get`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<JsonValue>,
}

impl Row {
    /// Creates a row from `(column, value)` pairs in column order.
    pub fn new(fields: impl IntoIterator<Item = (String, JsonValue)>) -> Self {
        let (columns, values) = fields.into_iter().unzip();
        Self { columns, values }
    }

    /// Gets a value from the row by column name, deserializing to the requested type.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is not found or if deserialization fails.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let name: String = row.get("name")?;
    /// let count: i64 = row.get("count")?;
    /// ```
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T, AppError> {
        self.get_raw(key)
            .ok_or_else(|| AppError::Internal(format!("column not found: {}", key)))
            .and_then(|v| {
                serde_json::from_value(v.clone()).map_err(|e| {
                    AppError::Internal(format!("failed to deserialize '{}': {}", key, e))
                })
            })
    }

    /// Gets a value from the row, returning `None` if the key doesn't exist or is null.
    ///
    /// Still returns an error if the key exists but deserialization fails.
    pub fn get_opt<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AppError> {
        match self.get_raw(key) {
            Some(v) if v.is_null() => Ok(None),
            Some(v) => serde_json::from_value(v.clone())
                .map(Some)
                .map_err(|e| AppError::Internal(format!("failed to deserialize '{}': {}", key, e))),
            None => Ok(None),
        }
    }

    /// Returns the raw JSON value for a column, if it exists.
    pub fn get_raw(&self, key: &str) -> Option<&JsonValue> {
        self.columns
            .iter()
            .position(|c| c == key)
            .map(|idx| &self.values[idx])
    }

    /// Returns all column names in this row, in order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|s| s.as_str())
    }

    /// Returns the number of columns in this row.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Consumes the row and returns its data as a map.
    pub fn into_map(self) -> HashMap<String, JsonValue> {
        self.columns.into_iter().zip(self.values).collect()
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (column, value) in self.columns.iter().zip(&self.values) {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// Tabular view of a result: one row of values per record.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<JsonValue>>,
}

impl Table {
    /// Builds a table from records. Columns follow the first record's order;
    /// columns only present in later records are appended. Missing cells are null.
    pub fn from_rows(records: &[Row]) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for record in records {
            for column in record.columns() {
                if !columns.iter().any(|c| c == column) {
                    columns.push(column.to_string());
                }
            }
        }

        let rows = records
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|c| record.get_raw(c).cloned().unwrap_or(JsonValue::Null))
                    .collect()
            })
            .collect();

        Self { columns, rows }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns every value of a column, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<&JsonValue>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|row| &row[idx]).collect())
    }
}

/// The materialized result of [`GraphDataSource::run_query`](crate::graph::GraphDataSource::run_query).
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum QueryResult {
    /// Records with named columns (property graph backends).
    Records(Vec<Row>),
    /// Tabular form, when requested with `as_table`.
    Table(Table),
    /// Raw response values (Gremlin backends).
    Values(Vec<JsonValue>),
}

impl QueryResult {
    /// Number of records, rows or values.
    pub fn len(&self) -> usize {
        match self {
            QueryResult::Records(rows) => rows.len(),
            QueryResult::Table(table) => table.len(),
            QueryResult::Values(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the records, failing if the result has another shape.
    pub fn into_records(self) -> Result<Vec<Row>, AppError> {
        match self {
            QueryResult::Records(rows) => Ok(rows),
            other => Err(AppError::Internal(format!(
                "expected records, got {}",
                other.shape()
            ))),
        }
    }

    /// Returns the table, failing if the result has another shape.
    pub fn into_table(self) -> Result<Table, AppError> {
        match self {
            QueryResult::Table(table) => Ok(table),
            other => Err(AppError::Internal(format!(
                "expected a table, got {}",
                other.shape()
            ))),
        }
    }

    /// Returns the raw values. Records are converted to JSON objects.
    pub fn into_values(self) -> Vec<JsonValue> {
        match self {
            QueryResult::Values(values) => values,
            QueryResult::Records(rows) => rows
                .into_iter()
                .map(|row| serde_json::to_value(row).unwrap_or(JsonValue::Null))
                .collect(),
            QueryResult::Table(table) => table.rows.into_iter().map(JsonValue::Array).collect(),
        }
    }

    fn shape(&self) -> &'static str {
        match self {
            QueryResult::Records(_) => "records",
            QueryResult::Table(_) => "a table",
            QueryResult::Values(_) => "raw values",
        }
    }
}
