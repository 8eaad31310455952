//! Relational operations over [`Table`]s.
//!
//! Every operation reads its input by reference and returns a new table;
//! inputs are never modified.

use std::collections::BTreeSet;

use tracing::trace;

use crate::env::catalog::Catalog;
use crate::error::{BlockflowError, Result};
use crate::eval::{evaluate_column, evaluate_row};
use crate::program::ast::Expression;
use crate::table::{Group, Row, Table, Value, INDEX_COLUMN};

pub mod plot;

/// Name of the column holding the matched key after a join.
pub const JOIN_COLUMN: &str = "_join_";
/// Prefix applied to non-key columns of the left join input.
pub const LEFT_PREFIX: &str = "left_";
/// Prefix applied to non-key columns of the right join input.
pub const RIGHT_PREFIX: &str = "right_";

/// Returns the catalog table registered under `name`.
pub fn load(catalog: &Catalog, name: &str) -> Result<Table> {
    catalog
        .get(name)
        .cloned()
        .ok_or_else(|| BlockflowError::UnknownDataset {
            name: name.to_owned(),
        })
}

/// Projects every row onto exactly `columns`.
pub fn select(table: &Table, columns: &BTreeSet<String>) -> Result<Table> {
    for column in columns {
        table.require_column(column)?;
    }
    let rows = table
        .rows()
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|c| {
                    row.get(c)
                        .cloned()
                        .map(|v| (c.clone(), v))
                        .ok_or_else(|| BlockflowError::unknown_column(c))
                })
                .collect::<Result<Row>>()
        })
        .collect::<Result<Vec<_>>>()?;
    Table::from_rows(rows)
}

/// Keeps the rows for which `predicate` is truthy, in order.
pub fn filter(table: &Table, predicate: &Expression) -> Result<Table> {
    let mut rows = Vec::new();
    for row in table.rows() {
        if evaluate_row(predicate, row)?.is_truthy() {
            rows.push(row.clone());
        }
    }
    trace!(kept = rows.len(), total = table.len(), "ops.filter");
    Table::from_rows(rows)
}

/// Adds (or overwrites) `column` with the per-row value of `expr`.
pub fn mutate(table: &Table, column: &str, expr: &Expression) -> Result<Table> {
    let rows = table
        .rows()
        .iter()
        .map(|row| {
            let value = evaluate_row(expr, row)?;
            let mut out = row.clone();
            out.insert(column.to_owned(), value);
            Ok(out)
        })
        .collect::<Result<Vec<_>>>()?;
    Table::from_rows(rows)
}

/// Partitions rows by the distinct values of `column`.
///
/// Groups are emitted in first-encounter order, each as a contiguous block
/// of its rows in their original relative order. The grouping column is
/// replaced by [`INDEX_COLUMN`] holding the group key.
pub fn group(table: &Table, column: &str) -> Result<Table> {
    table.require_column(column)?;
    let mut buckets: Vec<(Value, Vec<Row>)> = Vec::new();
    for row in table.rows() {
        let mut out = row.clone();
        let key = out
            .remove(column)
            .ok_or_else(|| BlockflowError::unknown_column(column))?;
        out.insert(INDEX_COLUMN.to_owned(), key.clone());
        match buckets.iter_mut().find(|(k, _)| k.key_eq(&key)) {
            Some((_, rows)) => rows.push(out),
            None => buckets.push((key, vec![out])),
        }
    }
    let mut rows = Vec::with_capacity(table.len());
    let mut groups = Vec::with_capacity(buckets.len());
    for (key, bucket) in buckets {
        let start = rows.len();
        rows.extend(bucket);
        groups.push(Group {
            key,
            rows: start..rows.len(),
        });
    }
    trace!(groups = groups.len(), "ops.group");
    Ok(Table::grouped(rows, groups))
}

/// Reduces the table to one row, or one row per group when the input came
/// straight from [`group`].
///
/// Each aggregate contributes a column named after its input column, or
/// `<column>_<function>` when that name is already taken in the output.
pub fn summarize(table: &Table, aggregates: &[Expression]) -> Result<Table> {
    let names = output_names(aggregates)?;
    let rows = match table.groups() {
        Some(groups) => groups
            .iter()
            .map(|group| {
                let slice = &table.rows()[group.rows.clone()];
                let mut out = summarize_slice(slice, aggregates, &names)?;
                out.insert(INDEX_COLUMN.to_owned(), group.key.clone());
                Ok(out)
            })
            .collect::<Result<Vec<_>>>()?,
        None => vec![summarize_slice(table.rows(), aggregates, &names)?],
    };
    Table::from_rows(rows)
}

fn summarize_slice(rows: &[Row], aggregates: &[Expression], names: &[String]) -> Result<Row> {
    let mut out = Row::new();
    for (expr, name) in aggregates.iter().zip(names) {
        out.insert(name.clone(), evaluate_column(expr, rows)?);
    }
    Ok(out)
}

fn output_names(aggregates: &[Expression]) -> Result<Vec<String>> {
    let mut used: BTreeSet<String> = BTreeSet::from([INDEX_COLUMN.to_owned()]);
    let mut names = Vec::with_capacity(aggregates.len());
    for expr in aggregates {
        let Expression::Aggregate { func, column } = expr else {
            return Err(BlockflowError::TypeMismatch {
                context: "summarize",
                left: "column",
                right: "row expression",
            });
        };
        let mut name = column.clone();
        if used.contains(&name) {
            name = format!("{column}_{}", func.code());
        }
        used.insert(name.clone());
        names.push(name);
    }
    Ok(names)
}

/// Nested-loop equi-join of two tables.
///
/// Rows pair up in left-major order wherever `left[left_column]` equals
/// `right[right_column]`. The key columns collapse into [`JOIN_COLUMN`];
/// every other column gets a [`LEFT_PREFIX`] or [`RIGHT_PREFIX`]. Missing
/// keys never match.
pub fn join(left: &Table, left_column: &str, right: &Table, right_column: &str) -> Result<Table> {
    let mut rows = Vec::new();
    for l in left.rows() {
        let l_key = l
            .get(left_column)
            .ok_or_else(|| BlockflowError::unknown_column(left_column))?;
        for r in right.rows() {
            let r_key = r
                .get(right_column)
                .ok_or_else(|| BlockflowError::unknown_column(right_column))?;
            if l_key.is_null() || !l_key.key_eq(r_key) {
                continue;
            }
            let mut out = Row::new();
            out.insert(JOIN_COLUMN.to_owned(), l_key.clone());
            prefixed(&mut out, l, left_column, LEFT_PREFIX);
            prefixed(&mut out, r, right_column, RIGHT_PREFIX);
            rows.push(out);
        }
    }
    trace!(matched = rows.len(), "ops.join");
    Ok(Table::from_join_rows(rows))
}

fn prefixed(out: &mut Row, row: &Row, key: &str, prefix: &str) {
    for (column, value) in row {
        if column != key {
            out.insert(format!("{prefix}{column}"), value.clone());
        }
    }
}
