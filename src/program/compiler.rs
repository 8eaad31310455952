//! Block tree to [`Program`] compiler.
//!
//! Compilation is a recursive descent over the serialized tree: each
//! top-level stack whose first block is a pipeline source becomes a
//! [`Pipeline`], blocks chained through `next` become [`Stage`]s, and
//! blocks plugged into expression sockets become [`Expression`]s. Stacks
//! that do not start with a source are stray: they are skipped and counted,
//! never fatal.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::error::{BlockflowError, Result};
use crate::program::ast::{
    AggregateFn, ArithmeticOp, CompareOp, Expression, Pipeline, Program, Stage, Visualization,
};
use crate::program::blocks::{Block, BlockTree, FieldValue};
use crate::table::Value;

/// Bin count used by histogram blocks that omit `bins`.
pub const DEFAULT_BINS: usize = 10;

/// Prefix of dataset blocks, e.g. `data_colors`.
const DATA_PREFIX: &str = "data_";
/// Prefix of aggregate blocks, e.g. `stats_mean`.
const STATS_PREFIX: &str = "stats_";

/// Result of compiling a block tree.
#[derive(Clone, Debug, PartialEq)]
pub struct CompileOutput {
    /// Runnable program.
    pub program: Program,
    /// Number of top-level stacks skipped because they cannot run.
    pub stray_count: usize,
}

/// Compiler settings.
#[derive(Clone, Debug)]
pub struct Compiler {
    default_bins: usize,
}

impl Default for Compiler {
    fn default() -> Self {
        Self {
            default_bins: DEFAULT_BINS,
        }
    }
}

/// Whether an expression appears in a row or in a summarize socket.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Socket {
    Row,
    Summary,
}

impl Compiler {
    /// Creates a compiler with the default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the bin count used when a histogram block omits `bins`.
    pub fn with_default_bins(mut self, bins: usize) -> Self {
        self.default_bins = bins.max(1);
        self
    }

    /// Compiles a block tree into a program.
    pub fn build(&self, tree: &BlockTree) -> Result<CompileOutput> {
        let mut pipelines = Vec::new();
        let mut stray_count = 0;
        for (stack_idx, head) in tree.stacks.iter().enumerate() {
            match classify(&head.kind) {
                BlockClass::Source => pipelines.push(self.compile_stack(stack_idx, head)?),
                BlockClass::Stage | BlockClass::Expression => {
                    debug!(stack = stack_idx, head = %head.kind, "compiler.stray_stack");
                    stray_count += 1;
                }
                BlockClass::Unknown => {
                    return Err(unknown_kind(
                        &block_id(head, &stack_path(stack_idx, 0)),
                        &head.kind,
                    ))
                }
            }
        }
        if stray_count > 0 {
            warn!(stray_count, "compiler.stray_stacks");
        }
        debug!(
            pipelines = pipelines.len(),
            stray_count, "compiler.build.complete"
        );
        Ok(CompileOutput {
            program: Program::new(pipelines),
            stray_count,
        })
    }

    fn compile_stack(&self, stack_idx: usize, head: &Block) -> Result<Pipeline> {
        let blocks: Vec<&Block> = head.stack().collect();
        let mut stages = Vec::with_capacity(blocks.len());
        for (depth, block) in blocks.iter().enumerate() {
            let id = block_id(block, &stack_path(stack_idx, depth));
            let stage = self.compile_stage(block, &id)?;
            if depth > 0 && stage.is_source() {
                return Err(BlockflowError::compile(
                    id,
                    format!("'{}' must start its own stack", block.kind),
                ));
            }
            if matches!(stage, Stage::Visualize(_)) && depth + 1 != blocks.len() {
                return Err(BlockflowError::compile(
                    id,
                    "plot blocks must be the last block of their stack",
                ));
            }
            stages.push(stage);
        }
        Ok(Pipeline::new(stages))
    }

    fn compile_stage(&self, block: &Block, id: &str) -> Result<Stage> {
        let kind = block.kind.as_str();
        let stage = match kind {
            "data_user" => Stage::Load {
                source: text_field(block, id, "name")?,
            },
            "plumbing_join" => Stage::Join {
                left_name: text_field(block, id, "leftName")?,
                left_column: column_field(block, id, "leftColumn")?,
                right_name: text_field(block, id, "rightName")?,
                right_column: column_field(block, id, "rightColumn")?,
            },
            "dplyr_select" => Stage::Select {
                columns: column_list(block, id, "Column")?,
            },
            "dplyr_filter" => Stage::Filter {
                predicate: expr_field(block, id, "Column", Socket::Row)?,
            },
            "dplyr_mutate" => Stage::Mutate {
                column: text_field(block, id, "newCol")?,
                value: expr_field(block, id, "Column", Socket::Row)?,
            },
            "dplyr_groupby" => Stage::Group {
                column: column_field(block, id, "Column")?,
            },
            "dplyr_summarize" => Stage::Summarize {
                aggregates: aggregate_list(block, id, "Column")?,
            },
            "plumbing_notify" => Stage::Notify {
                name: text_field(block, id, "name")?,
            },
            "ggplot_hist" => Stage::Visualize(Visualization::Histogram {
                column: column_field(block, id, "Column")?,
                bins: match block.fields.get("bins") {
                    None => self.default_bins,
                    Some(value) => bin_count(value, id)?,
                },
            }),
            "ggplot_bar" => Stage::Visualize(Visualization::Bar {
                x: column_field(block, id, "X_axis")?,
                y: column_field(block, id, "Y_axis")?,
            }),
            "ggplot_point" => Stage::Visualize(Visualization::Scatter {
                x: column_field(block, id, "X_axis")?,
                y: column_field(block, id, "Y_axis")?,
                color: match block.fields.get("color") {
                    None => None,
                    Some(value) => Some(column_value(value, id, "color")?),
                },
            }),
            _ if kind.starts_with(DATA_PREFIX) => {
                let source = &kind[DATA_PREFIX.len()..];
                if source.is_empty() {
                    return Err(BlockflowError::compile(id, "dataset block has no name"));
                }
                Stage::Load {
                    source: source.to_owned(),
                }
            }
            _ if classify(kind) == BlockClass::Expression => {
                return Err(BlockflowError::compile(
                    id,
                    format!("'{kind}' is an expression block, not a stage"),
                ))
            }
            _ => return Err(unknown_kind(id, kind)),
        };
        Ok(stage)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum BlockClass {
    Source,
    Stage,
    Expression,
    Unknown,
}

fn classify(kind: &str) -> BlockClass {
    match kind {
        "plumbing_join" => BlockClass::Source,
        "dplyr_select" | "dplyr_filter" | "dplyr_mutate" | "dplyr_groupby"
        | "dplyr_summarize" | "plumbing_notify" | "ggplot_hist" | "ggplot_bar"
        | "ggplot_point" => BlockClass::Stage,
        "variable_number" | "variable_text" | "variable_missing" | "logic_boolean"
        | "variable_column" | "variable_compare" | "stats_arithmetic" => BlockClass::Expression,
        _ if kind.starts_with(DATA_PREFIX) => BlockClass::Source,
        _ if kind
            .strip_prefix(STATS_PREFIX)
            .and_then(AggregateFn::from_code)
            .is_some() =>
        {
            BlockClass::Expression
        }
        _ => BlockClass::Unknown,
    }
}

fn stack_path(stack_idx: usize, depth: usize) -> String {
    format!("#{stack_idx}.{depth}")
}

fn block_id(block: &Block, fallback: &str) -> String {
    block.id.clone().unwrap_or_else(|| fallback.to_owned())
}

fn nested_id(block: &Block, parent: &str, field: &str) -> String {
    block_id(block, &format!("{parent}/{field}"))
}

fn required<'a>(block: &'a Block, id: &str, field: &str) -> Result<&'a FieldValue> {
    block
        .fields
        .get(field)
        .ok_or_else(|| BlockflowError::compile(id, format!("missing field '{field}'")))
}

fn unknown_kind(id: &str, kind: &str) -> BlockflowError {
    if kind.is_empty() {
        BlockflowError::compile(id, "missing field 'type'")
    } else {
        BlockflowError::compile(id, format!("unknown block type '{kind}'"))
    }
}

fn wrong_kind(id: &str, field: &str, expected: &str, found: &FieldValue) -> BlockflowError {
    BlockflowError::compile(
        id,
        format!(
            "field '{field}' expects {expected}, found {}",
            found.kind()
        ),
    )
}

fn text_field(block: &Block, id: &str, field: &str) -> Result<String> {
    match required(block, id, field)? {
        FieldValue::Text(text) if !text.is_empty() => Ok(text.clone()),
        FieldValue::Text(_) => Err(BlockflowError::compile(
            id,
            format!("field '{field}' is empty"),
        )),
        other => Err(wrong_kind(id, field, "text", other)),
    }
}

fn column_field(block: &Block, id: &str, field: &str) -> Result<String> {
    column_value(required(block, id, field)?, id, field)
}

/// Accepts a bare column name or a `variable_column` block.
fn column_value(value: &FieldValue, id: &str, field: &str) -> Result<String> {
    match value {
        FieldValue::Text(name) if !name.is_empty() => Ok(name.clone()),
        FieldValue::Block(inner) => column_block(inner, &nested_id(inner, id, field)),
        other => Err(wrong_kind(id, field, "a column", other)),
    }
}

fn column_block(block: &Block, id: &str) -> Result<String> {
    if block.kind.is_empty() {
        return Err(unknown_kind(id, &block.kind));
    }
    if block.kind != "variable_column" {
        return Err(BlockflowError::compile(
            id,
            format!("expected a column block, found '{}'", block.kind),
        ));
    }
    text_field(block, id, "TEXT")
}

fn column_list(block: &Block, id: &str, field: &str) -> Result<BTreeSet<String>> {
    let columns = match required(block, id, field)? {
        FieldValue::Blocks(blocks) => blocks
            .iter()
            .map(|inner| column_block(inner, &nested_id(inner, id, field)))
            .collect::<Result<BTreeSet<_>>>()?,
        single => BTreeSet::from([column_value(single, id, field)?]),
    };
    if columns.is_empty() {
        return Err(BlockflowError::compile(id, "select needs at least one column"));
    }
    Ok(columns)
}

fn bin_count(value: &FieldValue, id: &str) -> Result<usize> {
    let literal = match value {
        FieldValue::Block(inner) => {
            let inner_id = nested_id(inner, id, "bins");
            match compile_expr(inner, &inner_id, Socket::Row)? {
                Expression::Literal(v) => v,
                _ => {
                    return Err(BlockflowError::compile(
                        inner_id,
                        "bin count must be a number",
                    ))
                }
            }
        }
        other => number_value(other, id, "bins")?,
    };
    match literal {
        Value::Int(n) if n >= 1 => Ok(n as usize),
        Value::Float(f) if f >= 1.0 && f.fract() == 0.0 => Ok(f as usize),
        _ => Err(BlockflowError::compile(
            id,
            "bin count must be a positive whole number",
        )),
    }
}

fn number_value(value: &FieldValue, id: &str, field: &str) -> Result<Value> {
    let parsed = match value {
        FieldValue::Number(n) => n
            .as_i64()
            .map(Value::Int)
            .or_else(|| n.as_f64().map(Value::Float)),
        FieldValue::Text(text) => {
            let text = text.trim();
            text.parse::<i64>().map(Value::Int).ok().or_else(|| {
                text.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(Value::Float)
            })
        }
        _ => None,
    };
    parsed.ok_or_else(|| wrong_kind(id, field, "a number", value))
}

fn expr_field(block: &Block, id: &str, field: &str, socket: Socket) -> Result<Expression> {
    match block.fields.get(field) {
        Some(FieldValue::Block(inner)) => compile_expr(inner, &nested_id(inner, id, field), socket),
        Some(other) => Err(wrong_kind(id, field, "an expression block", other)),
        None => Err(BlockflowError::compile(
            id,
            format!("missing operand '{field}'"),
        )),
    }
}

fn aggregate_list(block: &Block, id: &str, field: &str) -> Result<Vec<Expression>> {
    match required(block, id, field)? {
        FieldValue::Block(inner) => Ok(vec![compile_expr(
            inner,
            &nested_id(inner, id, field),
            Socket::Summary,
        )?]),
        FieldValue::Blocks(blocks) if !blocks.is_empty() => blocks
            .iter()
            .map(|inner| compile_expr(inner, &nested_id(inner, id, field), Socket::Summary))
            .collect(),
        other => Err(wrong_kind(id, field, "aggregate blocks", other)),
    }
}

fn compile_expr(block: &Block, id: &str, socket: Socket) -> Result<Expression> {
    let kind = block.kind.as_str();
    if let Some(func) = kind.strip_prefix(STATS_PREFIX).and_then(AggregateFn::from_code) {
        if socket == Socket::Row {
            return Err(BlockflowError::compile(
                id,
                format!("aggregate '{func}' can only be used in a summarize block"),
            ));
        }
        return Ok(Expression::Aggregate {
            func,
            column: column_field(block, id, "Column")?,
        });
    }
    if socket == Socket::Summary {
        return Err(BlockflowError::compile(
            id,
            format!("summarize expects an aggregate block, found '{kind}'"),
        ));
    }
    match kind {
        "variable_number" => Ok(Expression::Literal(number_value(
            required(block, id, "NUM")?,
            id,
            "NUM",
        )?)),
        "variable_text" => match required(block, id, "TEXT")? {
            FieldValue::Text(text) => Ok(Expression::Literal(Value::String(text.clone()))),
            other => Err(wrong_kind(id, "TEXT", "text", other)),
        },
        "variable_missing" => Ok(Expression::Literal(Value::Null)),
        "logic_boolean" => match text_field(block, id, "BOOL")?.as_str() {
            "TRUE" => Ok(Expression::Literal(Value::Bool(true))),
            "FALSE" => Ok(Expression::Literal(Value::Bool(false))),
            other => Err(BlockflowError::compile(
                id,
                format!("boolean must be TRUE or FALSE, found '{other}'"),
            )),
        },
        "variable_column" => Ok(Expression::Column(text_field(block, id, "TEXT")?)),
        "variable_compare" => {
            let op = op_field(block, id, CompareOp::from_code)?;
            Ok(Expression::compare(
                op,
                expr_field(block, id, "A", socket)?,
                expr_field(block, id, "B", socket)?,
            ))
        }
        "stats_arithmetic" => {
            let op = op_field(block, id, ArithmeticOp::from_code)?;
            Ok(Expression::arithmetic(
                op,
                expr_field(block, id, "A", socket)?,
                expr_field(block, id, "B", socket)?,
            ))
        }
        _ if classify(kind) == BlockClass::Unknown => Err(unknown_kind(id, kind)),
        _ => Err(BlockflowError::compile(
            id,
            format!("'{kind}' cannot be used as an expression"),
        )),
    }
}

fn op_field<T>(block: &Block, id: &str, parse: fn(&str) -> Option<T>) -> Result<T> {
    let code = text_field(block, id, "OP")?;
    parse(&code).ok_or_else(|| BlockflowError::compile(id, format!("unknown operator '{code}'")))
}
