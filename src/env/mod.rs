//! Per-run execution environment.
//!
//! An [`Environment`] bundles what stages may touch besides their input
//! table: the dataset catalog (read-only), the registry of notified tables,
//! the diagnostic log, and the display sink.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{BlockflowError, Result};
use crate::ops::plot::PlotSpec;
use crate::table::{Row, Table};

pub mod catalog;
pub mod log;

pub use catalog::Catalog;
pub use log::{DiagnosticLog, LogEntry, Severity};

/// Receiver for displayed tables and plots.
pub trait DisplaySink {
    /// Called with a table to show.
    fn on_table(&mut self, rows: &[Row]);
    /// Called with a plot to show.
    fn on_plot(&mut self, spec: &PlotSpec);
}

/// Sink that discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl DisplaySink for NullSink {
    fn on_table(&mut self, _rows: &[Row]) {}
    fn on_plot(&mut self, _spec: &PlotSpec) {}
}

/// Sink that keeps every displayed table and plot in order.
#[derive(Clone, Debug, Default)]
pub struct RecordingSink {
    /// Displayed tables, oldest first.
    pub tables: Vec<Vec<Row>>,
    /// Displayed plots, oldest first.
    pub plots: Vec<PlotSpec>,
}

impl RecordingSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recently displayed table.
    pub fn last_table(&self) -> Option<&[Row]> {
        self.tables.last().map(Vec::as_slice)
    }

    /// Most recently displayed plot.
    pub fn last_plot(&self) -> Option<&PlotSpec> {
        self.plots.last()
    }
}

impl DisplaySink for RecordingSink {
    fn on_table(&mut self, rows: &[Row]) {
        self.tables.push(rows.to_vec());
    }

    fn on_plot(&mut self, spec: &PlotSpec) {
        self.plots.push(spec.clone());
    }
}

/// State shared by the stages of one run.
pub struct Environment<'a> {
    catalog: &'a Catalog,
    registry: BTreeMap<String, Table>,
    log: DiagnosticLog,
    sink: &'a mut dyn DisplaySink,
}

impl<'a> Environment<'a> {
    /// Creates a fresh environment over `catalog` that displays to `sink`.
    pub fn new(catalog: &'a Catalog, sink: &'a mut dyn DisplaySink) -> Self {
        Self {
            catalog,
            registry: BTreeMap::new(),
            log: DiagnosticLog::new(),
            sink,
        }
    }

    /// Dataset catalog.
    pub fn catalog(&self) -> &Catalog {
        self.catalog
    }

    /// Stores a copy of `table` under `name`, replacing any earlier entry.
    pub fn register(&mut self, name: &str, table: &Table) {
        let replaced = self.registry.insert(name.to_owned(), table.clone()).is_some();
        debug!(name, rows = table.len(), replaced, "env.registry.insert");
    }

    /// Looks up a registered table.
    pub fn lookup(&self, name: &str) -> Result<&Table> {
        self.registry
            .get(name)
            .ok_or_else(|| BlockflowError::UnregisteredName {
                name: name.to_owned(),
            })
    }

    /// Registered names in sorted order.
    pub fn registered_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.registry.keys().map(String::as_str)
    }

    /// Diagnostic log.
    pub fn log(&self) -> &DiagnosticLog {
        &self.log
    }

    /// Mutable diagnostic log.
    pub fn log_mut(&mut self) -> &mut DiagnosticLog {
        &mut self.log
    }

    /// Consumes the environment, returning its log.
    pub fn into_log(self) -> DiagnosticLog {
        self.log
    }

    /// Sends a table to the display sink.
    pub fn show_table(&mut self, table: &Table) {
        self.sink.on_table(table.rows());
    }

    /// Sends a plot to the display sink.
    pub fn show_plot(&mut self, spec: &PlotSpec) {
        self.sink.on_plot(spec);
    }
}
