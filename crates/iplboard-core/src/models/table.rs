//! Tabular query results
//!
//! Column names are normalized to upper case on construction, matching what
//! Snowflake returns for unquoted aliases, so `total`, `Total` and `TOTAL`
//! all address the same column regardless of the warehouse behind it.

use super::value::Value;
use crate::error::CoreError;
use serde::{Deserialize, Serialize};

/// Ordered rows over an ordered list of column names
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultTable {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl ResultTable {
    /// Create an empty table with the given columns
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            columns: columns
                .into_iter()
                .map(|c| normalize_column(c.as_ref()))
                .collect(),
            rows: Vec::new(),
        }
    }

    /// Create a table and fill it with rows
    ///
    /// Rows shorter than the column list are padded with nulls; extra cells
    /// are dropped.
    pub fn with_rows<I, S>(columns: I, rows: Vec<Vec<Value>>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut table = Self::new(columns);
        for row in rows {
            table.push_row(row);
        }
        table
    }

    pub fn push_row(&mut self, mut row: Vec<Value>) {
        row.resize(self.columns.len(), Value::Null);
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Case-insensitive column lookup
    pub fn column_index(&self, name: &str) -> Option<usize> {
        let wanted = normalize_column(name);
        self.columns.iter().position(|c| *c == wanted)
    }

    /// Like `column_index`, but fails with `MissingColumn`
    pub fn require_column(&self, name: &str) -> Result<usize, CoreError> {
        self.column_index(name)
            .ok_or_else(|| CoreError::MissingColumn {
                column: normalize_column(name),
                available: self.columns.clone(),
            })
    }

    pub fn row(&self, index: usize) -> Option<RowView<'_>> {
        (index < self.rows.len()).then_some(RowView { table: self, index })
    }

    pub fn rows(&self) -> impl Iterator<Item = RowView<'_>> + '_ {
        (0..self.rows.len()).map(move |index| RowView { table: self, index })
    }

    /// First `n` rows as a new table, order preserved
    pub fn head(&self, n: usize) -> ResultTable {
        Self {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    /// Rows as column-name → value records (for JSON consumers)
    pub fn to_records(&self) -> Vec<serde_json::Map<String, serde_json::Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .zip(row)
                    .map(|(col, value)| {
                        (
                            col.clone(),
                            serde_json::to_value(value).unwrap_or(serde_json::Value::Null),
                        )
                    })
                    .collect()
            })
            .collect()
    }
}

/// Borrowed view of one row with typed accessors
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    table: &'a ResultTable,
    index: usize,
}

impl<'a> RowView<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn values(&self) -> &'a [Value] {
        &self.table.rows[self.index]
    }

    pub fn get(&self, column: &str) -> Result<&'a Value, CoreError> {
        let idx = self.table.require_column(column)?;
        Ok(&self.table.rows[self.index][idx])
    }

    /// Integer cell; NULL reads as 0 (SUM over no rows)
    pub fn int(&self, column: &str) -> Result<i64, CoreError> {
        let value = self.get(column)?;
        if value.is_null() {
            return Ok(0);
        }
        value.as_i64().ok_or_else(|| type_error(column, "integer", value))
    }

    /// Float cell; NULL reads as 0.0
    pub fn float(&self, column: &str) -> Result<f64, CoreError> {
        let value = self.get(column)?;
        if value.is_null() {
            return Ok(0.0);
        }
        value.as_f64().ok_or_else(|| type_error(column, "float", value))
    }

    /// Text cell; numbers are rendered as their label, NULL is an error
    pub fn text(&self, column: &str) -> Result<String, CoreError> {
        let value = self.get(column)?;
        if value.is_null() {
            return Err(type_error(column, "text", value));
        }
        Ok(value.to_label())
    }
}

fn type_error(column: &str, expected: &'static str, found: &Value) -> CoreError {
    CoreError::UnexpectedType {
        column: normalize_column(column),
        expected,
        found: found.type_name().to_string(),
    }
}

pub(crate) fn normalize_column(name: &str) -> String {
    name.trim().to_uppercase()
}
