#![forbid(unsafe_code)]

use std::fmt;
use std::io;

use thiserror::Error;
use tracing::error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, BlockflowError>;

/// Identifier of a block in the serialized tree, used to anchor compile errors.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct BlockId(pub String);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BlockId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Errors raised while compiling or running a block program.
///
/// Compile errors are reported before any stage executes. Every other
/// variant aborts the run at the stage that raised it.
#[derive(Debug, Error)]
pub enum BlockflowError {
    /// The block tree is malformed or references something the compiler
    /// cannot resolve.
    #[error("block '{block_id}': {reason}")]
    Compile {
        /// Block the error is anchored on.
        block_id: BlockId,
        /// What is wrong with it.
        reason: String,
    },
    /// A `Load` stage named a dataset that is not in the catalog.
    #[error("unknown dataset '{name}'")]
    UnknownDataset {
        /// Dataset name as written in the block.
        name: String,
    },
    /// A row or table lacks a referenced column.
    #[error("unknown column '{column}'")]
    UnknownColumn {
        /// Missing column name.
        column: String,
    },
    /// Operand types are incompatible for the requested operation.
    #[error("{context}: cannot combine {left} with {right}")]
    TypeMismatch {
        /// Operation that failed, e.g. `histogram`.
        context: &'static str,
        /// Left operand type, or the kind that was expected.
        left: &'static str,
        /// Right operand type, or the kind that was found.
        right: &'static str,
    },
    /// A `Join` referenced a name that no earlier `Notify` registered.
    #[error("no table registered under '{name}'")]
    UnregisteredName {
        /// Name the join asked for.
        name: String,
    },
    /// Division or modulo with a zero divisor.
    #[error("division by zero")]
    DivisionByZero,
    /// A row does not carry the same columns as the rest of its table.
    #[error("row {row} has columns [{found}], expected [{expected}]")]
    SchemaMismatch {
        /// Zero-based position of the offending row.
        row: usize,
        /// Columns of the first row, comma separated.
        expected: String,
        /// Columns of the offending row, comma separated.
        found: String,
    },
    /// Dataset payload could not be turned into a table.
    #[error("invalid dataset: {0}")]
    InvalidDataset(String),
    /// Configuration file could not be read or parsed.
    #[error("configuration error: {0}")]
    Config(String),
    /// JSON (de)serialization failure.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// I/O failure.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl BlockflowError {
    /// Builds a [`BlockflowError::Compile`] for the given block.
    pub fn compile(block_id: impl Into<BlockId>, reason: impl Into<String>) -> Self {
        let err = BlockflowError::Compile {
            block_id: block_id.into(),
            reason: reason.into(),
        };
        error!(%err, "compiler.error");
        err
    }

    /// Builds a [`BlockflowError::UnknownColumn`].
    pub fn unknown_column(column: impl Into<String>) -> Self {
        BlockflowError::UnknownColumn {
            column: column.into(),
        }
    }

    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            BlockflowError::Compile { .. } => "CompileError",
            BlockflowError::UnknownDataset { .. } => "UnknownDataset",
            BlockflowError::UnknownColumn { .. } => "UnknownColumn",
            BlockflowError::TypeMismatch { .. } => "TypeMismatch",
            BlockflowError::UnregisteredName { .. } => "UnregisteredName",
            BlockflowError::DivisionByZero => "DivisionByZero",
            BlockflowError::SchemaMismatch { .. } => "SchemaMismatch",
            BlockflowError::InvalidDataset(_) => "InvalidDataset",
            BlockflowError::Config(_) => "Config",
            BlockflowError::Json(_) => "Json",
            BlockflowError::Io(_) => "Io",
        }
    }
}

impl From<String> for BlockId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Formats an error prefixed with its code, e.g. `[UnknownColumn] unknown column 'x'`.
pub struct ErrorWithCode<'a>(pub &'a BlockflowError);

impl fmt::Display for ErrorWithCode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.0.code(), self.0)
    }
}
