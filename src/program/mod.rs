//! Block programs: the serialized tree, its compiled form, and the
//! conversions between them.

pub mod ast;
pub mod blocks;
pub mod compiler;
pub mod emit;

pub use ast::{Expression, Pipeline, Program, Stage, Visualization};
pub use blocks::{Block, BlockTree, FieldValue};
pub use compiler::{CompileOutput, Compiler};
