//! Plot specifications handed to display sinks.
//!
//! Specs follow the Vega-Lite layout: inline data, a mark, and an encoding
//! per channel. Rendering is left to whoever consumes the sink.

use serde_json::{json, Value as Json};

use crate::error::{BlockflowError, Result};
use crate::program::ast::Visualization;
use crate::table::Table;

/// Renderer-agnostic description of one plot.
pub type PlotSpec = Json;

/// Builds the spec for `vis` over `table`.
pub fn plot_spec(table: &Table, vis: &Visualization) -> Result<PlotSpec> {
    match vis {
        Visualization::Histogram { column, bins } => histogram(table, column, *bins),
        Visualization::Bar { x, y } => {
            table.require_column(x)?;
            table.require_column(y)?;
            Ok(json!({
                "data": {"values": table.to_json()},
                "mark": "bar",
                "encoding": {
                    "x": {"field": x, "type": "nominal"},
                    "y": {"field": y, "type": "quantitative"},
                },
            }))
        }
        Visualization::Scatter { x, y, color } => {
            table.require_column(x)?;
            table.require_column(y)?;
            let mut encoding = json!({
                "x": {"field": x, "type": "quantitative"},
                "y": {"field": y, "type": "quantitative"},
            });
            if let Some(color) = color {
                table.require_column(color)?;
                encoding["color"] = json!({"field": color, "type": "nominal"});
            }
            Ok(json!({
                "data": {"values": table.to_json()},
                "mark": "point",
                "encoding": encoding,
            }))
        }
    }
}

fn histogram(table: &Table, column: &str, bins: usize) -> Result<PlotSpec> {
    if bins == 0 {
        return Err(BlockflowError::TypeMismatch {
            context: "histogram",
            left: "bin count",
            right: "zero",
        });
    }
    table.require_column(column)?;
    let (extent, step) = match numeric_extent(table, column)? {
        Some((min, max)) => (json!([min, max]), (max - min) / bins as f64),
        None => (Json::Null, 0.0),
    };
    Ok(json!({
        "data": {"values": table.to_json()},
        "mark": "bar",
        "encoding": {
            "x": {
                "field": column,
                "type": "quantitative",
                "bin": {"maxbins": bins, "extent": extent, "step": step},
            },
            "y": {"aggregate": "count", "type": "quantitative"},
        },
    }))
}

/// Smallest and largest numeric value of `column`; missing values are
/// skipped and any other non-number is a type error.
fn numeric_extent(table: &Table, column: &str) -> Result<Option<(f64, f64)>> {
    let mut extent: Option<(f64, f64)> = None;
    for value in table.column_values(column)? {
        if value.is_null() {
            continue;
        }
        let Some(v) = value.as_f64() else {
            return Err(BlockflowError::TypeMismatch {
                context: "histogram",
                left: "number",
                right: value.type_name(),
            });
        };
        if v.is_nan() {
            continue;
        }
        extent = Some(match extent {
            Some((lo, hi)) => (lo.min(v), hi.max(v)),
            None => (v, v),
        });
    }
    Ok(extent)
}
