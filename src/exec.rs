//! Pipeline scheduler.
//!
//! Pipelines run one after another in program order, and so do the stages
//! within each pipeline, each receiving the table produced by its
//! predecessor. `Notify` must therefore sit in an earlier pipeline than the
//! `Join` that reads it. The first failing stage stops the run; side effects
//! that already happened (registrations, displayed tables, log entries)
//! are kept.

use std::time::Instant;

use tracing::{debug, info, info_span};

use crate::config::RunOptions;
use crate::env::Environment;
use crate::error::{ErrorWithCode, Result};
use crate::ops::{self, plot};
use crate::program::ast::{Pipeline, Program, Stage};
use crate::program::blocks::BlockTree;
use crate::program::compiler::Compiler;
use crate::table::Table;

/// Summary of a finished run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Pipelines that ran to completion.
    pub pipelines_run: usize,
    /// Top-level stacks the compiler skipped.
    pub stray_count: usize,
}

/// Executes compiled programs against an [`Environment`].
#[derive(Clone, Debug, Default)]
pub struct Runner {
    options: RunOptions,
}

impl Runner {
    /// Creates a runner with the given options.
    pub fn new(options: RunOptions) -> Self {
        Self { options }
    }

    /// Compiles `tree` and runs the result. Compile errors abort before any
    /// stage executes.
    pub fn run_tree(&self, tree: &BlockTree, env: &mut Environment<'_>) -> Result<RunReport> {
        let compiled = Compiler::new()
            .with_default_bins(self.options.default_bins)
            .build(tree)
            .map_err(|err| {
                env.log_mut().error(ErrorWithCode(&err).to_string());
                err
            })?;
        if compiled.stray_count > 0 {
            env.log_mut()
                .warn(format!("{} stray stacks found", compiled.stray_count));
        }
        let mut report = self.run(&compiled.program, env)?;
        report.stray_count = compiled.stray_count;
        Ok(report)
    }

    /// Runs every pipeline of `program` in order.
    pub fn run(&self, program: &Program, env: &mut Environment<'_>) -> Result<RunReport> {
        let started = Instant::now();
        let mut report = RunReport::default();
        for (idx, pipeline) in program.pipelines.iter().enumerate() {
            let span = info_span!("exec.pipeline", pipeline = idx);
            let _guard = span.enter();
            if self.options.verbose_log {
                env.log_mut().info(format!("pipeline {idx} started"));
            }
            if let Err(err) = self.run_pipeline(pipeline, env) {
                env.log_mut()
                    .error(format!("pipeline {idx}: {}", ErrorWithCode(&err)));
                return Err(err);
            }
            if self.options.verbose_log {
                env.log_mut().info(format!("pipeline {idx} finished"));
            }
            report.pipelines_run += 1;
        }
        info!(
            pipelines = report.pipelines_run,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "exec.run.completed"
        );
        Ok(report)
    }

    fn run_pipeline(&self, pipeline: &Pipeline, env: &mut Environment<'_>) -> Result<()> {
        let mut table = Table::empty();
        for stage in &pipeline.stages {
            debug!(stage = stage.name(), rows_in = table.len(), "exec.stage");
            table = run_stage(stage, &table, env)?;
        }
        let ends_in_plot = matches!(pipeline.stages.last(), Some(Stage::Visualize(_)));
        if self.options.display_pipeline_results && !ends_in_plot {
            env.show_table(&table);
        }
        Ok(())
    }
}

fn run_stage(stage: &Stage, input: &Table, env: &mut Environment<'_>) -> Result<Table> {
    match stage {
        Stage::Load { source } => ops::load(env.catalog(), source),
        Stage::Select { columns } => ops::select(input, columns),
        Stage::Filter { predicate } => ops::filter(input, predicate),
        Stage::Mutate { column, value } => ops::mutate(input, column, value),
        Stage::Group { column } => ops::group(input, column),
        Stage::Summarize { aggregates } => ops::summarize(input, aggregates),
        Stage::Notify { name } => {
            let output = input.without_groups();
            env.register(name, &output);
            Ok(output)
        }
        Stage::Join {
            left_name,
            left_column,
            right_name,
            right_column,
        } => {
            let left = env.lookup(left_name)?;
            let right = env.lookup(right_name)?;
            ops::join(left, left_column, right, right_column)
        }
        Stage::Visualize(vis) => {
            let spec = plot::plot_spec(input, vis)?;
            env.show_table(input);
            env.show_plot(&spec);
            Ok(input.without_groups())
        }
    }
}
