#![forbid(unsafe_code)]

use std::io;
use std::path::PathBuf;

use concord_os::ConfigError;
use concord_storage::kv::StoreFault;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("script line {line}: {reason}")]
    Script { line: usize, reason: String },

    #[error("snapshot {path}: {fault}")]
    Snapshot { path: PathBuf, fault: StoreFault },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("logging setup failed: {0}")]
    Logging(String),
}

impl ToolError {
    /// Process exit status for the `concord` binary.
    pub fn exit_code(&self) -> i32 {
        match self {
            ToolError::Script { .. } => 2,
            _ => 1,
        }
    }
}
