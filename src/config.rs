//! Run options and their TOML config file.
//!
//! ```toml
//! [run]
//! display_pipeline_results = true
//! verbose_log = false
//! default_bins = 10
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{BlockflowError, Result};
use crate::program::compiler::DEFAULT_BINS;

/// Options controlling one run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunOptions {
    /// Send the final table of every pipeline without a plot to the sink.
    pub display_pipeline_results: bool,
    /// Write pipeline start and finish entries to the diagnostic log.
    pub verbose_log: bool,
    /// Bin count for histogram blocks that leave it out.
    pub default_bins: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            display_pipeline_results: true,
            verbose_log: false,
            default_bins: DEFAULT_BINS,
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    run: RunSection,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct RunSection {
    display_pipeline_results: Option<bool>,
    verbose_log: Option<bool>,
    default_bins: Option<usize>,
}

/// Location of the user config file, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("blockflow").join("config.toml"))
}

/// Loads run options.
///
/// An explicit `path` must exist. Without one, the default path is read
/// when present and defaults apply otherwise.
pub fn load(path: Option<&Path>) -> Result<RunOptions> {
    match path {
        Some(path) => read_file(path),
        None => match default_config_path() {
            Some(path) if path.exists() => read_file(&path),
            _ => Ok(RunOptions::default()),
        },
    }
}

/// Parses run options from TOML text.
pub fn parse(text: &str) -> Result<RunOptions> {
    let raw: RawConfig =
        toml::from_str(text).map_err(|err| BlockflowError::Config(err.to_string()))?;
    let defaults = RunOptions::default();
    let default_bins = raw.run.default_bins.unwrap_or(defaults.default_bins);
    if default_bins == 0 {
        return Err(BlockflowError::Config(
            "run.default_bins must be at least 1".into(),
        ));
    }
    Ok(RunOptions {
        display_pipeline_results: raw
            .run
            .display_pipeline_results
            .unwrap_or(defaults.display_pipeline_results),
        verbose_log: raw.run.verbose_log.unwrap_or(defaults.verbose_log),
        default_bins,
    })
}

fn read_file(path: &Path) -> Result<RunOptions> {
    let contents = fs::read_to_string(path).map_err(|err| {
        BlockflowError::Config(format!("failed to read {}: {err}", path.display()))
    })?;
    let options = parse(&contents).map_err(|err| match err {
        BlockflowError::Config(msg) => {
            BlockflowError::Config(format!("{}: {msg}", path.display()))
        }
        other => other,
    })?;
    debug!(path = %path.display(), ?options, "config.loaded");
    Ok(options)
}
