//! Tracing subscriber installation for the CLI and embedders.

use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{BlockflowError, Result};

/// Installs a global `fmt` subscriber filtered by `level`, which accepts
/// any `EnvFilter` directive (`info`, `blockflow=debug`, ...).
pub fn init_logging(level: &str) -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_new(level)
                .map_err(|e| BlockflowError::Config(format!("invalid log level: {e}")))?,
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|_| BlockflowError::Config("logging already initialized".into()))
}
