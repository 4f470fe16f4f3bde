#![forbid(unsafe_code)]

pub mod codec;
pub mod common;
pub mod error;
pub mod record;
pub mod selector;

pub use common::{normalize_arg, require_non_empty, ContractViolation, SchemaVersion, Validate};
pub use error::LedgerError;
