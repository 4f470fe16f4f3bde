#![forbid(unsafe_code)]

pub mod config;
pub mod dispatcher;

pub use config::{ConcordConfig, ConfigError, LogFormat, LoggingConfig};
pub use dispatcher::{Dispatcher, InvocationResponse, Operation};
