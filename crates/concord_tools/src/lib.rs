#![forbid(unsafe_code)]

pub mod error;
pub mod logging;
pub mod replay;

pub use error::ToolError;
