#![forbid(unsafe_code)]

use concord_os::{LogFormat, LoggingConfig};
use tracing_subscriber::EnvFilter;

use crate::error::ToolError;

/// Installs the global subscriber on stderr. `RUST_LOG` overrides the
/// configured filter.
pub fn init_logging(config: &LoggingConfig) -> Result<(), ToolError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(from_env) => from_env,
        Err(_) => EnvFilter::try_new(&config.filter)
            .map_err(|e| ToolError::Logging(format!("filter {:?}: {e}", config.filter)))?,
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let installed = match config.format {
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|e| ToolError::Logging(e.to_string()))?;
    tracing::debug!(format = ?config.format, "logging initialized");
    Ok(())
}
