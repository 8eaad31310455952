//! Renders a [`Program`] back into the block tree format it was compiled from.
//!
//! Compiling the emitted tree yields a program equal to the input.

use crate::program::ast::{Expression, Pipeline, Program, Stage, Visualization};
use crate::program::blocks::{Block, BlockTree};
use crate::table::Value;

/// Emits one stack per pipeline.
pub fn to_block_tree(program: &Program) -> BlockTree {
    BlockTree::from_stacks(program.pipelines.iter().map(pipeline_blocks))
}

fn pipeline_blocks(pipeline: &Pipeline) -> Vec<Block> {
    pipeline.stages.iter().map(stage_block).collect()
}

fn stage_block(stage: &Stage) -> Block {
    match stage {
        Stage::Load { source } => Block::new("data_user").field("name", source.as_str()),
        Stage::Select { columns } => Block::new("dplyr_select").field(
            "Column",
            columns.iter().map(|c| Block::column(c)).collect::<Vec<_>>(),
        ),
        Stage::Filter { predicate } => {
            Block::new("dplyr_filter").field("Column", expr_block(predicate))
        }
        Stage::Mutate { column, value } => Block::new("dplyr_mutate")
            .field("newCol", column.as_str())
            .field("Column", expr_block(value)),
        Stage::Group { column } => {
            Block::new("dplyr_groupby").field("Column", Block::column(column))
        }
        Stage::Summarize { aggregates } => Block::new("dplyr_summarize").field(
            "Column",
            aggregates.iter().map(expr_block).collect::<Vec<_>>(),
        ),
        Stage::Notify { name } => Block::new("plumbing_notify").field("name", name.as_str()),
        Stage::Join {
            left_name,
            left_column,
            right_name,
            right_column,
        } => Block::new("plumbing_join")
            .field("leftName", left_name.as_str())
            .field("leftColumn", Block::column(left_column))
            .field("rightName", right_name.as_str())
            .field("rightColumn", Block::column(right_column)),
        Stage::Visualize(Visualization::Histogram { column, bins }) => Block::new("ggplot_hist")
            .field("Column", Block::column(column))
            .field("bins", Block::number(*bins as u64)),
        Stage::Visualize(Visualization::Bar { x, y }) => Block::new("ggplot_bar")
            .field("X_axis", Block::column(x))
            .field("Y_axis", Block::column(y)),
        Stage::Visualize(Visualization::Scatter { x, y, color }) => {
            let block = Block::new("ggplot_point")
                .field("X_axis", Block::column(x))
                .field("Y_axis", Block::column(y));
            match color {
                Some(color) => block.field("color", Block::column(color)),
                None => block,
            }
        }
    }
}

fn expr_block(expr: &Expression) -> Block {
    match expr {
        Expression::Literal(value) => literal_block(value),
        Expression::Column(name) => Block::column(name),
        Expression::Compare { op, left, right } => Block::new("variable_compare")
            .field("OP", op.code())
            .field("A", expr_block(left))
            .field("B", expr_block(right)),
        Expression::Arithmetic { op, left, right } => Block::new("stats_arithmetic")
            .field("OP", op.code())
            .field("A", expr_block(left))
            .field("B", expr_block(right)),
        Expression::Aggregate { func, column } => {
            Block::new(format!("stats_{}", func.code())).field("Column", Block::column(column))
        }
    }
}

fn literal_block(value: &Value) -> Block {
    match value {
        Value::Null => Block::new("variable_missing"),
        Value::Int(v) => Block::number(*v),
        Value::Float(v) => Block::float(*v),
        Value::String(v) => Block::text(v),
        Value::Bool(v) => {
            Block::new("logic_boolean").field("BOOL", if *v { "TRUE" } else { "FALSE" })
        }
    }
}
