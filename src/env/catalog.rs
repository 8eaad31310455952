//! Named datasets available to `Load` stages.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{BlockflowError, Result};
use crate::table::Table;

const BUILTINS: &[(&str, &str)] = &[
    ("colors", include_str!("../../data/colors.json")),
    ("single", include_str!("../../data/single.json")),
    ("double", include_str!("../../data/double.json")),
];

/// Read-only map from dataset name to table. Outlives individual runs.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    tables: BTreeMap<String, Table>,
}

impl Catalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a catalog holding the bundled datasets.
    pub fn with_builtins() -> Result<Self> {
        let mut catalog = Self::new();
        for (name, text) in BUILTINS {
            let json: serde_json::Value = serde_json::from_str(text)?;
            let table = Table::from_json(&json).map_err(|err| {
                BlockflowError::InvalidDataset(format!("built-in dataset '{name}': {err}"))
            })?;
            debug!(dataset = name, rows = table.len(), "catalog.builtin.loaded");
            catalog.insert(*name, table);
        }
        Ok(catalog)
    }

    /// Registers `table` under `name`, replacing any previous entry.
    pub fn insert(&mut self, name: impl Into<String>, table: Table) {
        self.tables.insert(name.into(), table);
    }

    /// Looks up a dataset.
    pub fn get(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    /// Dataset names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.tables.keys().map(String::as_str)
    }
}
