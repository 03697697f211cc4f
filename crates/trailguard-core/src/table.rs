//! Tabular input model
//!
//! Ingestion hands the masking engine either a single string or a rectangular
//! table of named columns. Cells are heterogeneous: only [`Cell::Text`] values
//! carry content that can hold personal data; everything else passes through
//! masking untouched.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A single table cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    /// Missing value
    Null,

    /// Boolean value
    Bool(bool),

    /// Integer value
    Int(i64),

    /// Floating point value
    Float(f64),

    /// Free-text or categorical value
    Text(String),
}

impl Cell {
    /// Borrow the string content of a text cell
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Cell::Text(_))
    }

    /// Convert a JSON value into a cell. Nested arrays and objects are kept
    /// as their JSON text so nothing is silently dropped.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Cell::Null,
            Value::Bool(b) => Cell::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Cell::Int(i),
                None => Cell::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => Cell::Text(s.clone()),
            other => Cell::Text(other.to_string()),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Bool(b) => write!(f, "{}", b),
            Cell::Int(i) => write!(f, "{}", i),
            Cell::Float(x) => write!(f, "{}", x),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Int(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Float(value)
    }
}

impl From<bool> for Cell {
    fn from(value: bool) -> Self {
        Cell::Bool(value)
    }
}

/// A named column of cells
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub cells: Vec<Cell>,
}

impl Column {
    pub fn new(name: impl Into<String>, cells: Vec<Cell>) -> Self {
        Self {
            name: name.into(),
            cells,
        }
    }

    /// Whether the column holds any string content.
    ///
    /// Mirrors an "object" column in dataframe terms: a single text cell is
    /// enough for the column to go through masking.
    pub fn is_textual(&self) -> bool {
        self.cells.iter().any(Cell::is_text)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Rectangular table of named columns
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    columns: Vec<Column>,
}

#[derive(Deserialize)]
struct ColumnarTable {
    columns: Vec<Column>,
}

impl Table {
    /// Create a table, checking every column has the same number of rows
    /// and column names are unique.
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        if let Some(first) = columns.first() {
            let rows = first.len();
            if let Some(bad) = columns.iter().find(|c| c.len() != rows) {
                return Err(Error::InvalidTable(format!(
                    "column '{}' has {} rows, expected {}",
                    bad.name,
                    bad.len(),
                    rows
                )));
            }
        }

        for (i, column) in columns.iter().enumerate() {
            if columns[..i].iter().any(|c| c.name == column.name) {
                return Err(Error::InvalidTable(format!(
                    "duplicate column name '{}'",
                    column.name
                )));
            }
        }

        Ok(Self { columns })
    }

    /// Build a table from a header row and data rows
    pub fn from_rows(headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Result<Self> {
        let mut columns: Vec<Column> = headers
            .into_iter()
            .map(|name| Column::new(name, Vec::with_capacity(rows.len())))
            .collect();

        for (index, row) in rows.into_iter().enumerate() {
            if row.len() != columns.len() {
                return Err(Error::InvalidTable(format!(
                    "row {} has {} cells, expected {}",
                    index,
                    row.len(),
                    columns.len()
                )));
            }
            for (column, cell) in columns.iter_mut().zip(row) {
                column.cells.push(cell);
            }
        }

        Self::new(columns)
    }

    /// Parse a table from JSON.
    ///
    /// Two layouts are accepted:
    /// - an array of row objects (`[{"User": "alice", "Action": "Login"}, ...]`);
    ///   column order follows first appearance, missing keys become `Null`
    /// - a columnar object (`{"columns": [{"name": "User", "cells": [...]}]}`)
    pub fn from_json(input: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(input)?;

        match value {
            Value::Array(records) => Self::from_records(&records),
            Value::Object(ref map) if map.contains_key("columns") => {
                let columnar: ColumnarTable = serde_json::from_value(value)?;
                Self::new(columnar.columns)
            }
            _ => Err(Error::UnsupportedInput(
                "expected an array of row objects or an object with 'columns'".to_string(),
            )),
        }
    }

    fn from_records(records: &[Value]) -> Result<Self> {
        let mut headers: Vec<String> = Vec::new();
        for (index, record) in records.iter().enumerate() {
            let Value::Object(map) = record else {
                return Err(Error::InvalidTable(format!("row {} is not an object", index)));
            };
            for key in map.keys() {
                if !headers.contains(key) {
                    headers.push(key.clone());
                }
            }
        }

        let rows = records
            .iter()
            .map(|record| {
                headers
                    .iter()
                    .map(|h| record.get(h).map(Cell::from_json).unwrap_or(Cell::Null))
                    .collect()
            })
            .collect();

        Self::from_rows(headers, rows)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn into_columns(self) -> Vec<Column> {
        self.columns
    }

    pub fn column(&self, name: &str) -> Result<&Column> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| Error::ColumnNotFound(name.to_string()))
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Borrow row `index` as a vector of cells
    pub fn row(&self, index: usize) -> Option<Vec<&Cell>> {
        if index >= self.row_count() {
            return None;
        }
        Some(self.columns.iter().map(|c| &c.cells[index]).collect())
    }

    /// Copy of the first `n` rows
    pub fn head(&self, n: usize) -> Table {
        Table {
            columns: self
                .columns
                .iter()
                .map(|c| Column::new(c.name.clone(), c.cells.iter().take(n).cloned().collect()))
                .collect(),
        }
    }

    /// Serialize as an array of row objects (the same layout `from_json` reads)
    pub fn to_records(&self) -> Value {
        let rows = (0..self.row_count())
            .map(|i| {
                let map = self
                    .columns
                    .iter()
                    .map(|c| {
                        let value = serde_json::to_value(&c.cells[i]).unwrap_or(Value::Null);
                        (c.name.clone(), value)
                    })
                    .collect::<serde_json::Map<String, Value>>();
                Value::Object(map)
            })
            .collect();
        Value::Array(rows)
    }
}
