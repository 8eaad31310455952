//! Tabular values threaded through pipelines.
//!
//! A [`Table`] is an ordered sequence of rows. Every row of a table carries
//! the same column set; the only exception is the output of a join, which is
//! built with [`Table::from_join_rows`]. Tables are never mutated once a
//! stage has produced them; operations return new tables.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

use crate::error::{BlockflowError, Result};

pub mod value;

pub use value::Value;

/// Single row represented as a mapping from column name to value.
pub type Row = BTreeMap<String, Value>;

/// Name of the column holding the group key after a `Group` stage.
pub const INDEX_COLUMN: &str = "Index";

/// One group of a grouped table: its key and the block of rows it spans.
#[derive(Clone, Debug, PartialEq)]
pub struct Group {
    /// Group key taken verbatim from the grouping column.
    pub key: Value,
    /// Rows of the group within the table, contiguous.
    pub rows: Range<usize>,
}

/// Ordered collection of rows with optional group structure.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    rows: Vec<Row>,
    groups: Option<Vec<Group>>,
}

impl Table {
    /// Creates an empty table.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a table, checking that all rows share the first row's columns.
    pub fn from_rows(rows: Vec<Row>) -> Result<Self> {
        if let Some(first) = rows.first() {
            for (idx, row) in rows.iter().enumerate().skip(1) {
                if !same_columns(first, row) {
                    return Err(BlockflowError::SchemaMismatch {
                        row: idx,
                        expected: join_keys(first),
                        found: join_keys(row),
                    });
                }
            }
        }
        Ok(Self { rows, groups: None })
    }

    /// Builds a table from join output, where rows may differ in shape.
    pub fn from_join_rows(rows: Vec<Row>) -> Self {
        Self { rows, groups: None }
    }

    /// Builds a grouped table. Group ranges must tile `rows` in order.
    pub(crate) fn grouped(rows: Vec<Row>, groups: Vec<Group>) -> Self {
        debug_assert_eq!(
            groups.last().map(|g| g.rows.end).unwrap_or(0),
            rows.len(),
            "group ranges must cover every row"
        );
        Self {
            rows,
            groups: Some(groups),
        }
    }

    /// Builds a table from a JSON array of objects.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let items = value.as_array().ok_or_else(|| {
            BlockflowError::InvalidDataset("dataset must be an array of objects".into())
        })?;
        let mut rows = Vec::with_capacity(items.len());
        for (idx, item) in items.iter().enumerate() {
            let object = item.as_object().ok_or_else(|| {
                BlockflowError::InvalidDataset(format!("row {idx} is not an object"))
            })?;
            let mut row = Row::new();
            for (key, cell) in object {
                row.insert(key.clone(), Value::from_json(cell)?);
            }
            rows.push(row);
        }
        Self::from_rows(rows)
    }

    /// Renders the rows as a JSON array of objects.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Array(self.rows.iter().map(row_to_json).collect())
    }

    /// Rows in stored order.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Copy of the rows with any group structure dropped.
    pub fn without_groups(&self) -> Table {
        Self {
            rows: self.rows.clone(),
            groups: None,
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true when the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Group structure left by a preceding `Group` stage, if any.
    pub fn groups(&self) -> Option<&[Group]> {
        self.groups.as_deref()
    }

    /// Column set of the table, taken from the first row.
    pub fn columns(&self) -> BTreeSet<&str> {
        self.rows
            .first()
            .map(|row| row.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Fails with `UnknownColumn` unless the table is empty or has `column`.
    pub fn require_column(&self, column: &str) -> Result<()> {
        match self.rows.first() {
            Some(row) if !row.contains_key(column) => Err(BlockflowError::unknown_column(column)),
            _ => Ok(()),
        }
    }

    /// Values of one column in row order. Rows lacking the column yield
    /// `UnknownColumn`.
    pub fn column_values(&self, column: &str) -> Result<Vec<Value>> {
        slice_values(&self.rows, column)
    }
}

/// Values of `column` across a slice of rows.
pub(crate) fn slice_values(rows: &[Row], column: &str) -> Result<Vec<Value>> {
    rows.iter()
        .map(|row| {
            row.get(column)
                .cloned()
                .ok_or_else(|| BlockflowError::unknown_column(column))
        })
        .collect()
}

/// Renders one row as a JSON object.
pub fn row_to_json(row: &Row) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for (key, value) in row {
        map.insert(key.clone(), value.to_json());
    }
    serde_json::Value::Object(map)
}

fn same_columns(a: &Row, b: &Row) -> bool {
    a.len() == b.len() && a.keys().zip(b.keys()).all(|(x, y)| x == y)
}

fn join_keys(row: &Row) -> String {
    row.keys().map(String::as_str).collect::<Vec<_>>().join(", ")
}

/// Builds a row from `(column, value)` pairs.
pub fn row<K, V, I>(cells: I) -> Row
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    cells
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
