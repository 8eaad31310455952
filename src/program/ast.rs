//! Program representation produced by the compiler.
//!
//! A [`Program`] is an ordered list of [`Pipeline`]s, one per runnable
//! stack of blocks. Stages and expressions are plain sum types so the
//! evaluator and scheduler match on them exhaustively.

use std::collections::BTreeSet;
use std::fmt;

use crate::table::Value;

/// Compiled block program.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Program {
    /// Pipelines in document order.
    pub pipelines: Vec<Pipeline>,
}

impl Program {
    /// Creates a program from its pipelines.
    pub fn new(pipelines: Vec<Pipeline>) -> Self {
        Self { pipelines }
    }
}

/// One connected stack of blocks.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Pipeline {
    /// Stages executed in order.
    pub stages: Vec<Stage>,
}

impl Pipeline {
    /// Creates a pipeline from its stages.
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }
}

/// One relational operation within a pipeline.
#[derive(Clone, Debug, PartialEq)]
pub enum Stage {
    /// Reads a dataset from the catalog.
    Load {
        /// Dataset name.
        source: String,
    },
    /// Projects onto the listed columns.
    Select {
        /// Columns to keep.
        columns: BTreeSet<String>,
    },
    /// Keeps rows whose predicate is truthy.
    Filter {
        /// Row predicate.
        predicate: Expression,
    },
    /// Adds or overwrites one computed column.
    Mutate {
        /// Output column name.
        column: String,
        /// Per-row value.
        value: Expression,
    },
    /// Partitions rows by the distinct values of a column.
    Group {
        /// Grouping column.
        column: String,
    },
    /// Reduces the table (or each group) to one row.
    Summarize {
        /// Aggregate expressions, one output column each.
        aggregates: Vec<Expression>,
    },
    /// Registers the current table in the run registry.
    Notify {
        /// Registry name.
        name: String,
    },
    /// Equi-joins two registered tables.
    Join {
        /// Registry name of the left table.
        left_name: String,
        /// Key column of the left table.
        left_column: String,
        /// Registry name of the right table.
        right_name: String,
        /// Key column of the right table.
        right_column: String,
    },
    /// Sends the table and a plot spec to the display sinks.
    Visualize(Visualization),
}

impl Stage {
    /// Returns true for stages that start a pipeline instead of consuming one.
    pub fn is_source(&self) -> bool {
        matches!(self, Stage::Load { .. } | Stage::Join { .. })
    }

    /// Short lowercase name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Load { .. } => "load",
            Stage::Select { .. } => "select",
            Stage::Filter { .. } => "filter",
            Stage::Mutate { .. } => "mutate",
            Stage::Group { .. } => "group",
            Stage::Summarize { .. } => "summarize",
            Stage::Notify { .. } => "notify",
            Stage::Join { .. } => "join",
            Stage::Visualize(_) => "visualize",
        }
    }
}

/// Plot requested by a `Visualize` stage.
#[derive(Clone, Debug, PartialEq)]
pub enum Visualization {
    /// Histogram of one numeric column.
    Histogram {
        /// Column to bin.
        column: String,
        /// Maximum number of bins.
        bins: usize,
    },
    /// Bar chart of `y` against `x`.
    Bar {
        /// Category axis column.
        x: String,
        /// Value axis column.
        y: String,
    },
    /// Scatter plot of `y` against `x`, optionally colored by a column.
    Scatter {
        /// Horizontal axis column.
        x: String,
        /// Vertical axis column.
        y: String,
        /// Optional color column.
        color: Option<String>,
    },
}

/// Scalar sub-computation used inside a stage.
#[derive(Clone, Debug, PartialEq)]
pub enum Expression {
    /// Constant value.
    Literal(Value),
    /// Value of a column in the current row.
    Column(String),
    /// Comparison of two operands, yielding a boolean.
    Compare {
        /// Operator.
        op: CompareOp,
        /// Left operand.
        left: Box<Expression>,
        /// Right operand.
        right: Box<Expression>,
    },
    /// Arithmetic on two numeric operands.
    Arithmetic {
        /// Operator.
        op: ArithmeticOp,
        /// Left operand.
        left: Box<Expression>,
        /// Right operand.
        right: Box<Expression>,
    },
    /// Aggregate over a column slice.
    Aggregate {
        /// Aggregate function.
        func: AggregateFn,
        /// Aggregated column.
        column: String,
    },
}

impl Expression {
    /// Column reference helper.
    pub fn column(name: impl Into<String>) -> Self {
        Expression::Column(name.into())
    }

    /// Literal helper.
    pub fn literal(value: impl Into<Value>) -> Self {
        Expression::Literal(value.into())
    }

    /// Comparison helper.
    pub fn compare(op: CompareOp, left: Expression, right: Expression) -> Self {
        Expression::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Arithmetic helper.
    pub fn arithmetic(op: ArithmeticOp, left: Expression, right: Expression) -> Self {
        Expression::Arithmetic {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Aggregate helper.
    pub fn aggregate(func: AggregateFn, column: impl Into<String>) -> Self {
        Expression::Aggregate {
            func,
            column: column.into(),
        }
    }
}

/// Comparison operators.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CompareOp {
    /// `==`
    Eq,
    /// `!=`
    Neq,
    /// `>`
    Gt,
    /// `>=`
    Gte,
    /// `<`
    Lt,
    /// `<=`
    Lte,
}

/// Arithmetic operators.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ArithmeticOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`, always fractional.
    Div,
    /// Remainder.
    Mod,
    /// Power.
    Exp,
}

/// Aggregate functions over a column slice.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AggregateFn {
    /// Sum of numbers.
    Sum,
    /// Arithmetic mean of numbers.
    Mean,
    /// Number of non-missing values.
    Count,
    /// Smallest value.
    Min,
    /// Largest value.
    Max,
}

/// Generates the block-tree code <-> operator tables.
macro_rules! op_codes {
    ($ty:ident { $($variant:ident => $code:literal),+ $(,)? }) => {
        impl $ty {
            /// Code used in serialized block trees.
            pub fn code(self) -> &'static str {
                match self {
                    $($ty::$variant => $code,)+
                }
            }

            /// Parses a serialized operator code.
            pub fn from_code(code: &str) -> Option<Self> {
                match code {
                    $($code => Some($ty::$variant),)+
                    _ => None,
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.code())
            }
        }
    };
}

op_codes!(CompareOp {
    Eq => "EQ",
    Neq => "NEQ",
    Gt => "GT",
    Gte => "GTE",
    Lt => "LT",
    Lte => "LTE",
});

op_codes!(ArithmeticOp {
    Add => "ADD",
    Sub => "SUB",
    Mul => "MUL",
    Div => "DIV",
    Mod => "MOD",
    Exp => "EXP",
});

op_codes!(AggregateFn {
    Sum => "sum",
    Mean => "mean",
    Count => "count",
    Min => "min",
    Max => "max",
});
