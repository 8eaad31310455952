//! Blockflow compiles block-based data programs into pipelines of
//! relational stages and runs them over in-memory tables.
//!
//! The usual flow is [`program::blocks::BlockTree`] (as saved by the visual
//! editor) through [`program::compiler::Compiler`] into a
//! [`program::ast::Program`], which [`exec::Runner`] executes against an
//! [`env::Environment`].

#![warn(missing_docs)]

pub mod config;
pub mod env;
pub mod error;
pub mod eval;
pub mod exec;
pub mod logging;
pub mod ops;
pub mod program;
pub mod table;

pub use config::RunOptions;
pub use env::{Catalog, DisplaySink, Environment, NullSink, RecordingSink};
pub use error::{BlockflowError, Result};
pub use exec::{RunReport, Runner};
pub use program::{BlockTree, Compiler, Program};
pub use table::{Row, Table, Value};
